//! Executes protocol commands against a gesture machine.
//!
//! The daemon and `screenpilot run` share this: the daemon wraps one
//! [`Engine`] in a mutex so gestures never interleave, the script runner
//! drives a fresh one directly.

use screenpilot_core::error::ApiError;
use screenpilot_core::gesture::{GestureMachine, Notify, ScrollOptions, TypeOptions};
use screenpilot_core::keys::Modifiers;
use screenpilot_core::point::ScreenPoint;
use screenpilot_core::port::InputPort;
use screenpilot_core::protocol::{Command, ResponseData};
use screenpilot_core::timing::TimingPolicy;
use tracing::{debug, warn};

use crate::handles::{HandleId, HandleRegistry};

/// Maximum wheel notches per scroll request.
pub const MAX_SCROLL_COUNT: u32 = 1000;

pub type BoxedPort = Box<dyn InputPort + Send>;

pub struct Engine<P = BoxedPort> {
    machine: GestureMachine<P>,
    handles: HandleRegistry,
}

impl<P: InputPort> Engine<P> {
    pub fn new(port: P, timing: TimingPolicy) -> Self {
        Self {
            machine: GestureMachine::new(port, timing),
            handles: HandleRegistry::new(),
        }
    }

    #[cfg(test)]
    pub fn machine(&self) -> &GestureMachine<P> {
        &self.machine
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Run one command to completion.
    pub fn execute(&mut self, command: Command) -> Result<ResponseData, ApiError> {
        debug!("Executing command: {:?}", command);

        match command {
            Command::OpenHandle { x, y, label, name } => {
                let mut point = ScreenPoint::new(x, y);
                point.label = label;
                let id = self.handles.open(point, name)?;
                self.handle_data(&id)
            }

            Command::CloseHandle { handle } => {
                let id = self.handles.resolve(handle.as_deref())?;
                self.close(&id)?;
                Ok(ResponseData::ok(format!("Handle {} closed", id)))
            }

            Command::ListHandles => Ok(ResponseData::Handles {
                handles: self.handles.list(),
            }),

            Command::Move { x, y } => {
                let point = ScreenPoint::new(x, y);
                self.machine.move_cursor_to(&point)?;
                Ok(ResponseData::ok(format!("Cursor at {}", point)))
            }

            Command::MoveTo {
                destination,
                handle,
            } => {
                let id = self.handles.resolve(handle.as_deref())?;
                let session = &mut self.handles.get_mut(&id)?.session;
                self.machine.move_to(session, destination, Notify::Emit)?;
                self.handle_data(&id)
            }

            Command::Click { x, y } => {
                let point = ScreenPoint::new(x, y);
                self.machine.click(&point, Notify::Emit)?;
                Ok(ResponseData::ok(format!("Clicked {}", point)))
            }

            Command::RightClick { x, y } => {
                let point = ScreenPoint::new(x, y);
                self.machine.right_click(&point, Notify::Emit)?;
                Ok(ResponseData::ok(format!("Right-clicked {}", point)))
            }

            Command::DoubleClick { x, y } => {
                let point = ScreenPoint::new(x, y);
                self.machine.double_click(&point, Notify::Emit)?;
                Ok(ResponseData::ok(format!("Double-clicked {}", point)))
            }

            Command::MouseDown { x, y, button } => {
                let point = ScreenPoint::new(x, y);
                self.machine.mouse_down(&point, button, Notify::Emit)?;
                Ok(ResponseData::ok(format!("{:?} button down at {}", button, point)))
            }

            Command::MouseUp { x, y, button } => {
                let point = ScreenPoint::new(x, y);
                self.machine.mouse_up(&point, button, Notify::Emit)?;
                Ok(ResponseData::ok(format!("{:?} button up at {}", button, point)))
            }

            Command::Scroll {
                x,
                y,
                direction,
                count,
                click,
                modifiers,
            } => {
                if count > MAX_SCROLL_COUNT {
                    return Err(ApiError::invalid_argument_with_suggestion(
                        format!("Scroll count {} exceeds maximum {}", count, MAX_SCROLL_COUNT),
                        "Split the scroll into several smaller requests",
                    ));
                }
                let point = ScreenPoint::new(x, y);
                let options = ScrollOptions {
                    direction,
                    count,
                    click,
                    modifiers: parse_modifiers(modifiers.as_deref())?,
                };
                self.machine.scroll(&point, options, Notify::Emit)?;
                Ok(ResponseData::ok(format!(
                    "Scrolled {:?} {} time(s) at {}",
                    direction, count, point
                )))
            }

            Command::Type {
                x,
                y,
                text,
                modifiers,
                click,
                press_enter,
            } => {
                let point = ScreenPoint::new(x, y);
                let options = TypeOptions {
                    modifiers: parse_modifiers(modifiers.as_deref())?,
                    click,
                    press_enter,
                    click_type_delay: None,
                };
                self.machine.type_text(&point, &text, options, Notify::Emit)?;
                Ok(ResponseData::ok(format!(
                    "Typed {} character(s) at {}",
                    text.chars().count(),
                    point
                )))
            }

            Command::EnterText {
                x,
                y,
                text,
                modifiers,
                click,
            } => {
                let point = ScreenPoint::new(x, y);
                let options = TypeOptions {
                    modifiers: parse_modifiers(modifiers.as_deref())?,
                    click,
                    ..TypeOptions::default()
                };
                #[allow(deprecated)]
                self.machine.enter_text(&point, &text, options, Notify::Emit)?;
                Ok(ResponseData::ok(format!("Entered text at {}", point)))
            }

            Command::SampleColor { x, y } => {
                let color = self.machine.sample_color(&ScreenPoint::new(x, y))?;
                Ok(ResponseData::color(color))
            }

            Command::DragTo {
                destination,
                handle,
            } => {
                let id = self.handles.resolve(handle.as_deref())?;
                let session = &mut self.handles.get_mut(&id)?.session;
                self.machine.drag_to(session, destination, Notify::Emit)?;
                self.handle_data(&id)
            }

            Command::Drop { handle } => {
                let id = self.handles.resolve(handle.as_deref())?;
                let session = &mut self.handles.get_mut(&id)?.session;
                self.machine.drop(session, Notify::Emit)?;
                self.handle_data(&id)
            }

            Command::DragAndDrop {
                destination,
                handle,
            } => {
                let id = self.handles.resolve(handle.as_deref())?;
                let session = &mut self.handles.get_mut(&id)?.session;
                self.machine
                    .drag_and_drop(session, destination, Notify::Emit)?;
                self.handle_data(&id)
            }

            Command::Shutdown => {
                self.close_all();
                Ok(ResponseData::ok("Shutting down"))
            }
        }
    }

    /// Close a handle, releasing its button first if a drag is in progress.
    ///
    /// The handle stays open when the release fails.
    pub fn close(&mut self, id: &HandleId) -> Result<(), ApiError> {
        let session = &mut self.handles.get_mut(id)?.session;
        if session.is_held() {
            self.machine.drop(session, Notify::Suppress)?;
        }
        self.handles.remove(id)?;
        Ok(())
    }

    /// Close every handle, logging failures instead of stopping.
    pub fn close_all(&mut self) {
        for id in self.handles.ids() {
            if let Err(e) = self.close(&id) {
                warn!("Failed to close handle {} during shutdown: {}", id, e);
            }
        }
    }

    fn handle_data(&self, id: &HandleId) -> Result<ResponseData, ApiError> {
        Ok(ResponseData::Handle {
            handle: self.handles.get(id)?.info(),
        })
    }
}

fn parse_modifiers(modifiers: Option<&str>) -> Result<Modifiers, ApiError> {
    modifiers.map_or(Ok(Modifiers::NONE), Modifiers::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenpilot_core::error::ErrorCode;
    use screenpilot_core::gesture::{ButtonState, Destination, ScrollDirection};
    use screenpilot_core::port::{Button, PortEvent, RecordingPort, Transition};

    fn engine() -> Engine<RecordingPort> {
        Engine::new(RecordingPort::new(), TimingPolicy::instant())
    }

    fn open(engine: &mut Engine<RecordingPort>, x: i32, y: i32, name: &str) {
        engine
            .execute(Command::OpenHandle {
                x,
                y,
                label: None,
                name: Some(name.into()),
            })
            .unwrap();
    }

    fn handle_of(data: ResponseData) -> screenpilot_core::protocol::HandleInfo {
        match data {
            ResponseData::Handle { handle } => handle,
            other => panic!("Expected handle response, got {:?}", other),
        }
    }

    #[test]
    fn test_drag_and_drop_through_handle() {
        let mut engine = engine();
        open(&mut engine, 0, 0, "h");

        let held = handle_of(
            engine
                .execute(Command::DragTo {
                    destination: Destination::Point { x: 10, y: 0 },
                    handle: None,
                })
                .unwrap(),
        );
        assert_eq!(held.state, ButtonState::Held(Button::Left));
        assert_eq!(held.point.xy(), (10, 0));

        let dropped = handle_of(
            engine
                .execute(Command::Drop {
                    handle: Some("h".into()),
                })
                .unwrap(),
        );
        assert_eq!(dropped.state, ButtonState::Idle);

        let err = engine.execute(Command::Drop { handle: None }).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[test]
    fn test_move_to_updates_handle() {
        let mut engine = engine();
        open(&mut engine, 0, 0, "h");
        let info = handle_of(
            engine
                .execute(Command::MoveTo {
                    destination: Destination::Point { x: 100, y: 37 },
                    handle: Some("h".into()),
                })
                .unwrap(),
        );
        assert_eq!(info.point.xy(), (100, 37));
        assert_eq!(engine.machine().port().cursor(), (100, 37));
    }

    #[test]
    fn test_close_releases_held_button() {
        let mut engine = engine();
        open(&mut engine, 0, 0, "h");
        engine
            .execute(Command::DragTo {
                destination: Destination::Point { x: 5, y: 5 },
                handle: None,
            })
            .unwrap();

        engine
            .execute(Command::CloseHandle { handle: None })
            .unwrap();
        assert!(engine.handles().is_empty());

        let last = engine.machine().port().events().last().cloned();
        assert_eq!(
            last,
            Some(PortEvent::Button {
                button: Button::Left,
                transition: Transition::Up,
                x: 5,
                y: 5
            })
        );
    }

    #[test]
    fn test_shutdown_closes_all_handles() {
        let mut engine = engine();
        open(&mut engine, 0, 0, "a");
        open(&mut engine, 1, 1, "b");
        engine.execute(Command::Shutdown).unwrap();
        assert!(engine.handles().is_empty());
    }

    #[test]
    fn test_scroll_rejects_large_count() {
        let mut engine = engine();
        let err = engine
            .execute(Command::Scroll {
                x: 0,
                y: 0,
                direction: ScrollDirection::Forward,
                count: MAX_SCROLL_COUNT + 1,
                click: false,
                modifiers: None,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert!(engine.machine().port().events().is_empty());
    }

    #[test]
    fn test_unknown_modifier_is_unsupported_usage() {
        let mut engine = engine();
        let err = engine
            .execute(Command::Type {
                x: 0,
                y: 0,
                text: "x".into(),
                modifiers: Some("Hyper".into()),
                click: true,
                press_enter: false,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedUsage);
        assert!(engine.machine().port().events().is_empty());
    }

    #[test]
    fn test_sample_color_response() {
        let port = RecordingPort::new().with_pixel(screenpilot_core::point::Color::new(1, 2, 3));
        let mut engine = Engine::new(port, TimingPolicy::instant());
        let data = engine
            .execute(Command::SampleColor { x: 0, y: 0 })
            .unwrap();
        assert!(matches!(data, ResponseData::Color { ref hex, .. } if hex == "#010203"));
    }

    #[test]
    fn test_click_message_names_point() {
        let mut engine = engine();
        let data = engine.execute(Command::Click { x: 4, y: 5 }).unwrap();
        assert_eq!(data, ResponseData::ok("Clicked ScreenPoint(4, 5)"));
    }
}

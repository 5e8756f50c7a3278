//! Gestures: clicks, drags, scrolling and typing at screen points.
//!
//! [`GestureMachine`] owns an [`InputPort`] and a [`TimingPolicy`] and turns
//! each gesture into a paced sequence of port calls. Stateless gestures take a
//! [`ScreenPoint`]; gestures that span several calls (moves and drags) take a
//! [`GestureSession`], which carries the live pointer position and whether a
//! button is held.
//!
//! # Drag state machine
//!
//! ```text
//!            drag_to                 drag_to
//!   Idle ──────────────▶ Held ◀──────────────┐
//!    ▲                    │ └────────────────┘
//!    └────── drop ────────┘
//! ```
//!
//! `drop` while `Idle` is an [`ErrorCode::InvalidState`](crate::error::ErrorCode)
//! error. If the port fails halfway through a gesture the session keeps the
//! state it had reached; it is not reconciled with the physical button.
//!
//! # Notifications
//!
//! Every public gesture takes a [`Notify`]. With [`Notify::Emit`] a single
//! INFO event is logged on the `screenpilot::gesture` target once the gesture
//! completes. Gestures built from other gestures suppress the inner events.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::keys::{text_to_keys, Key, Modifier, Modifiers};
use crate::path::LinePath;
use crate::point::{integral_delta, Color, ScreenPoint};
use crate::port::{Button, InputPort, PortError, Transition};
use crate::timing::{pause, TimingPolicy};

/// Whether a gesture logs its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    Emit,
    Suppress,
}

/// Mouse button state of a [`GestureSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "button", rename_all = "snake_case")]
pub enum ButtonState {
    #[default]
    Idle,
    Held(Button),
}

impl ButtonState {
    pub fn is_held(&self) -> bool {
        matches!(self, ButtonState::Held(_))
    }

    pub fn held_button(&self) -> Option<Button> {
        match self {
            ButtonState::Held(button) => Some(*button),
            ButtonState::Idle => None,
        }
    }
}

/// A pointer that remembers where it is and whether it is dragging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureSession {
    point: ScreenPoint,
    state: ButtonState,
}

impl GestureSession {
    pub fn new(point: impl Into<ScreenPoint>) -> Self {
        Self {
            point: point.into(),
            state: ButtonState::Idle,
        }
    }

    /// Live position.
    pub fn point(&self) -> &ScreenPoint {
        &self.point
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    pub fn is_held(&self) -> bool {
        self.state.is_held()
    }

    /// Move the live position, keeping the label.
    fn relocate(&mut self, to: &ScreenPoint) {
        self.point.x = to.x;
        self.point.y = to.y;
    }
}

/// Where an interpolated move or drag ends.
///
/// Serialized without a tag: `{"x":1,"y":2}` or `{"x":1,"y":2,"delay_ms":8}`.
/// Unknown fields and a `delay_ms` that is not a whole number of
/// milliseconds are rejected rather than dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "RawDestination")]
pub enum Destination {
    /// Target with a custom pause between interpolated steps.
    PointWithDelay { x: i32, y: i32, delay_ms: u64 },
    Point { x: i32, y: i32 },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDestination {
    x: i32,
    y: i32,
    #[serde(default)]
    delay_ms: Option<u64>,
}

impl From<RawDestination> for Destination {
    fn from(raw: RawDestination) -> Self {
        match raw.delay_ms {
            Some(delay_ms) => Destination::PointWithDelay {
                x: raw.x,
                y: raw.y,
                delay_ms,
            },
            None => Destination::Point { x: raw.x, y: raw.y },
        }
    }
}

impl Destination {
    /// Resolve loosely typed values: `[x, y]` or `[x, y, delay_seconds]`.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        match *values {
            [x, y] => Ok(Destination::Point {
                x: integral_delta(x)?,
                y: integral_delta(y)?,
            }),
            [x, y, delay] => {
                if !delay.is_finite() || delay < 0.0 {
                    return Err(ApiError::invalid_argument_with_suggestion(
                        format!("Step delay {} is not a valid duration", delay),
                        "Give the delay in seconds, e.g. 0.005",
                    ));
                }
                Ok(Destination::PointWithDelay {
                    x: integral_delta(x)?,
                    y: integral_delta(y)?,
                    delay_ms: (delay * 1000.0).round() as u64,
                })
            }
            _ => Err(ApiError::unsupported_usage_with_suggestion(
                format!(
                    "A destination needs 2 or 3 values (x, y[, delay]), got {}",
                    values.len()
                ),
                "Pass x and y, optionally followed by a per-step delay in seconds",
            )),
        }
    }

    pub fn target(&self) -> ScreenPoint {
        match *self {
            Destination::Point { x, y } | Destination::PointWithDelay { x, y, .. } => {
                ScreenPoint::new(x, y)
            }
        }
    }

    fn step_delay(&self, default: Duration) -> Duration {
        match *self {
            Destination::PointWithDelay { delay_ms, .. } => Duration::from_millis(delay_ms),
            Destination::Point { .. } => default,
        }
    }
}

impl From<ScreenPoint> for Destination {
    fn from(p: ScreenPoint) -> Self {
        Destination::Point { x: p.x, y: p.y }
    }
}

impl From<(i32, i32)> for Destination {
    fn from((x, y): (i32, i32)) -> Self {
        Destination::Point { x, y }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Point { x, y } => write!(f, "({}, {})", x, y),
            Destination::PointWithDelay { x, y, delay_ms } => {
                write!(f, "({}, {}) every {}ms", x, y, delay_ms)
            }
        }
    }
}

/// Wheel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    /// Away from the user (content moves down, view moves up).
    Forward,
    Backward,
}

impl ScrollDirection {
    pub fn notch(self) -> i32 {
        match self {
            ScrollDirection::Forward => 1,
            ScrollDirection::Backward => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOptions {
    pub direction: ScrollDirection,
    pub count: u32,
    /// Click first so the target has focus.
    pub click: bool,
    pub modifiers: Modifiers,
}

impl ScrollOptions {
    pub fn new(direction: ScrollDirection, count: u32) -> Self {
        Self {
            direction,
            count,
            click: true,
            modifiers: Modifiers::NONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeOptions {
    pub modifiers: Modifiers,
    /// Click first so the target has focus.
    pub click: bool,
    pub press_enter: bool,
    /// Pause between the focusing click and the first key. `None` uses the
    /// timing policy.
    pub click_type_delay: Option<Duration>,
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            modifiers: Modifiers::NONE,
            click: true,
            press_enter: false,
            click_type_delay: None,
        }
    }
}

/// Executes gestures against an input port.
#[derive(Debug)]
pub struct GestureMachine<P> {
    port: P,
    timing: TimingPolicy,
}

impl<P: InputPort> GestureMachine<P> {
    pub fn new(port: P, timing: TimingPolicy) -> Self {
        Self { port, timing }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn timing(&self) -> &TimingPolicy {
        &self.timing
    }

    /// Place the cursor on `point` and wait for the UI to settle.
    pub fn move_cursor_to(&mut self, point: &ScreenPoint) -> Result<()> {
        self.move_cursor_with_delay(point, self.timing.move_settle())
    }

    /// Place the cursor on `point`, then pause for `delay`.
    pub fn move_cursor_with_delay(&mut self, point: &ScreenPoint, delay: Duration) -> Result<()> {
        self.port
            .set_cursor_position(point.x, point.y)
            .map_err(|e| ApiError::port_failed("cursor move", &e))?;
        pause(delay);
        Ok(())
    }

    /// Read the color of the pixel under `point`.
    pub fn sample_color(&mut self, point: &ScreenPoint) -> Result<Color> {
        let buffer = self
            .port
            .capture_pixel_region(point.x, point.y, 1, 1)
            .map_err(|e| ApiError::port_failed("pixel capture", &e))?;
        Color::from_bgr(&buffer).ok_or_else(|| {
            ApiError::port_failed(
                "pixel capture",
                &PortError::Capture(format!("{} bytes returned for one pixel", buffer.len())),
            )
        })
    }

    pub fn click(&mut self, point: &ScreenPoint, notify: Notify) -> Result<()> {
        self.click_cycle(point, Button::Left, self.timing.after_click())?;
        announce(notify, "click", point, format_args!("click on {}", point));
        Ok(())
    }

    pub fn right_click(&mut self, point: &ScreenPoint, notify: Notify) -> Result<()> {
        self.click_cycle(point, Button::Right, self.timing.after_click())?;
        announce(
            notify,
            "right_click",
            point,
            format_args!("right click on {}", point),
        );
        Ok(())
    }

    pub fn double_click(&mut self, point: &ScreenPoint, notify: Notify) -> Result<()> {
        self.move_cursor_to(point)?;
        self.press_release(point, Button::Left)?;
        pause(self.timing.double_click_gap());
        self.press_release(point, Button::Left)?;
        pause(self.timing.after_click());
        announce(
            notify,
            "double_click",
            point,
            format_args!("double click on {}", point),
        );
        Ok(())
    }

    pub fn mouse_down(&mut self, point: &ScreenPoint, button: Button, notify: Notify) -> Result<()> {
        self.move_cursor_to(point)?;
        self.button(point, button, Transition::Down)?;
        announce(
            notify,
            "mouse_down",
            point,
            format_args!("{:?} button down on {}", button, point),
        );
        Ok(())
    }

    pub fn mouse_up(&mut self, point: &ScreenPoint, button: Button, notify: Notify) -> Result<()> {
        self.move_cursor_to(point)?;
        self.button(point, button, Transition::Up)?;
        announce(
            notify,
            "mouse_up",
            point,
            format_args!("{:?} button up on {}", button, point),
        );
        Ok(())
    }

    /// Turn the wheel `count` notches over `point`.
    ///
    /// Modifiers are released again even when a wheel event fails.
    pub fn scroll(&mut self, point: &ScreenPoint, options: ScrollOptions, notify: Notify) -> Result<()> {
        self.press_modifiers(options.modifiers)?;
        let scrolled = self.scroll_held(point, &options);
        let released = self.release_modifiers(options.modifiers);
        scrolled?;
        released?;

        announce(
            notify,
            "scroll",
            point,
            format_args!(
                "scroll on {}; direction={:?}, count={}, click={}, modifiers={}",
                point, options.direction, options.count, options.click, options.modifiers
            ),
        );
        Ok(())
    }

    fn scroll_held(&mut self, point: &ScreenPoint, options: &ScrollOptions) -> Result<()> {
        self.move_cursor_to(point)?;
        if options.click {
            self.click(point, Notify::Suppress)?;
        }
        debug!(
            "{} scrolling: direction={:?}, count={}",
            point, options.direction, options.count
        );
        for _ in 0..options.count {
            self.port
                .inject_wheel(point.x, point.y, options.direction.notch())
                .map_err(|e| ApiError::port_failed("scroll", &e))?;
            pause(self.timing.press_hold());
        }
        Ok(())
    }

    /// Type literal text, optionally after a focusing click.
    pub fn type_text(
        &mut self,
        point: &ScreenPoint,
        text: &str,
        options: TypeOptions,
        notify: Notify,
    ) -> Result<()> {
        if options.click {
            let delay = options
                .click_type_delay
                .unwrap_or_else(|| self.timing.click_to_type());
            self.click_cycle(point, Button::Left, delay)?;
        }

        let mut keys = text_to_keys(text);
        if options.press_enter {
            keys.push(Key::Enter);
        }
        self.type_keys(&keys, options.modifiers)?;

        announce(
            notify,
            "type",
            point,
            format_args!(
                "type on {} {:?}; modifiers={}, click={}",
                point, text, options.modifiers, options.click
            ),
        );
        Ok(())
    }

    /// Select everything in the focused field with Ctrl+A, then type `text`
    /// followed by Enter.
    #[deprecated(note = "Ctrl+A does not select all in every application; use type_text")]
    pub fn enter_text(
        &mut self,
        point: &ScreenPoint,
        text: &str,
        options: TypeOptions,
        notify: Notify,
    ) -> Result<()> {
        if options.click {
            let delay = options
                .click_type_delay
                .unwrap_or_else(|| self.timing.click_to_type());
            self.click_cycle(point, Button::Left, delay)?;
        }

        self.type_keys(&[Key::Char('a')], Modifiers::CTRL)?;
        pause(self.timing.select_all_settle());

        let mut keys = text_to_keys(text);
        keys.push(Key::Enter);
        self.type_keys(&keys, options.modifiers)?;

        announce(
            notify,
            "enter_text",
            point,
            format_args!(
                "enter text on {} {:?}; modifiers={}, click={}",
                point, text, options.modifiers, options.click
            ),
        );
        warn!("enter_text is deprecated and should be replaced by type_text");
        Ok(())
    }

    /// Walk the cursor to `dest` along a straight line, no button involved.
    pub fn move_to(
        &mut self,
        session: &mut GestureSession,
        dest: Destination,
        notify: Notify,
    ) -> Result<()> {
        let from = session.point.clone();
        let target = dest.target();
        self.walk(&from, &target, dest.step_delay(self.timing.path_step_delay()))?;
        session.relocate(&target);

        announce(
            notify,
            "move_to",
            &from,
            format_args!("move {} to {}", from, dest),
        );
        Ok(())
    }

    /// Drag from the session's position to `dest`.
    ///
    /// The first call presses the left button; later calls continue the same
    /// drag without pressing again.
    pub fn drag_to(
        &mut self,
        session: &mut GestureSession,
        dest: Destination,
        notify: Notify,
    ) -> Result<()> {
        if !session.is_held() {
            self.mouse_down(&session.point, Button::Left, Notify::Suppress)?;
            session.state = ButtonState::Held(Button::Left);
        }

        let from = session.point.clone();
        let target = dest.target();
        self.walk(&from, &target, dest.step_delay(self.timing.path_step_delay()))?;
        session.relocate(&target);

        announce(
            notify,
            "drag_to",
            &from,
            format_args!("drag {} to {}", from, dest),
        );
        Ok(())
    }

    /// Release the button held by a previous [`drag_to`](Self::drag_to).
    pub fn drop(&mut self, session: &mut GestureSession, notify: Notify) -> Result<()> {
        let Some(button) = session.state.held_button() else {
            return Err(ApiError::not_dragged(&session.point));
        };
        self.mouse_up(&session.point, button, Notify::Suppress)?;
        session.state = ButtonState::Idle;

        announce(
            notify,
            "drop",
            &session.point,
            format_args!("drop {}", session.point),
        );
        Ok(())
    }

    pub fn drag_and_drop(
        &mut self,
        session: &mut GestureSession,
        dest: Destination,
        notify: Notify,
    ) -> Result<()> {
        let source = session.point.clone();
        self.drag_to(session, dest, Notify::Suppress)?;
        self.drop(session, Notify::Suppress)?;

        announce(
            notify,
            "drag_and_drop",
            &source,
            format_args!("drag {} to {} and drop", source, dest),
        );
        Ok(())
    }

    /// Step the cursor along the line from `from` to `to`.
    ///
    /// The cursor stops on the last whole step; callers record `to` as the
    /// live position.
    fn walk(&mut self, from: &ScreenPoint, to: &ScreenPoint, delay: Duration) -> Result<()> {
        for step in LinePath::new(from, to, self.timing.path_step) {
            self.move_cursor_with_delay(&step, delay)?;
        }
        Ok(())
    }

    fn click_cycle(&mut self, point: &ScreenPoint, button: Button, after: Duration) -> Result<()> {
        self.move_cursor_to(point)?;
        self.press_release(point, button)?;
        pause(after);
        Ok(())
    }

    fn press_release(&mut self, point: &ScreenPoint, button: Button) -> Result<()> {
        self.button(point, button, Transition::Down)?;
        pause(self.timing.press_hold());
        self.button(point, button, Transition::Up)
    }

    fn button(&mut self, point: &ScreenPoint, button: Button, transition: Transition) -> Result<()> {
        self.port
            .inject_button(button, transition, point.x, point.y)
            .map_err(|e| ApiError::port_failed("button event", &e))
    }

    fn key(&mut self, key: Key, transition: Transition) -> Result<()> {
        self.port
            .inject_key(key, transition)
            .map_err(|e| ApiError::port_failed("key event", &e))
    }

    fn press_modifiers(&mut self, modifiers: Modifiers) -> Result<()> {
        for m in modifiers.iter() {
            self.key(Key::Modifier(m), Transition::Down)?;
        }
        Ok(())
    }

    /// Release in reverse press order; keeps going past failures so no
    /// modifier is left stuck, reporting the first error.
    fn release_modifiers(&mut self, modifiers: Modifiers) -> Result<()> {
        let mut first_error = None;
        let held: Vec<Modifier> = modifiers.iter().rev().collect();
        for m in held {
            if let Err(e) = self.key(Key::Modifier(m), Transition::Up) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn type_keys(&mut self, keys: &[Key], modifiers: Modifiers) -> Result<()> {
        self.press_modifiers(modifiers)?;
        let typed: Result<()> = keys.iter().try_for_each(|key| {
            self.key(*key, Transition::Down)?;
            self.key(*key, Transition::Up)?;
            pause(self.timing.key_press());
            Ok(())
        });
        let released = self.release_modifiers(modifiers);
        typed?;
        released
    }
}

fn announce(notify: Notify, op: &str, point: &ScreenPoint, message: fmt::Arguments<'_>) {
    if notify == Notify::Emit {
        info!(target: "screenpilot::gesture", op, point = %point, "{}", message);
    }
}

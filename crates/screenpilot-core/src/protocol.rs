//! Protocol types for CLI-daemon communication.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::gesture::{ButtonState, Destination, ScrollDirection};
use crate::point::{Color, ScreenPoint};
use crate::port::Button;

/// A request from CLI to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub command: Command,
}

fn default_true() -> bool {
    true
}

/// Commands the daemon can execute.
///
/// Modifier lists travel as strings (`"Ctrl+Shift"`) and are parsed by the
/// daemon, so unknown names come back as structured errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Create a named pointer handle at a point.
    OpenHandle {
        x: i32,
        y: i32,
        label: Option<String>,
        name: Option<String>,
    },
    /// Forget a handle, releasing its button if a drag is in progress.
    CloseHandle { handle: Option<String> },
    ListHandles,
    /// Place the cursor and let the UI settle.
    Move { x: i32, y: i32 },
    /// Walk a handle's pointer to a destination without pressing a button.
    MoveTo {
        destination: Destination,
        handle: Option<String>,
    },
    Click { x: i32, y: i32 },
    RightClick { x: i32, y: i32 },
    DoubleClick { x: i32, y: i32 },
    MouseDown {
        x: i32,
        y: i32,
        #[serde(default)]
        button: Button,
    },
    MouseUp {
        x: i32,
        y: i32,
        #[serde(default)]
        button: Button,
    },
    Scroll {
        x: i32,
        y: i32,
        direction: ScrollDirection,
        count: u32,
        #[serde(default = "default_true")]
        click: bool,
        modifiers: Option<String>,
    },
    Type {
        x: i32,
        y: i32,
        text: String,
        modifiers: Option<String>,
        #[serde(default = "default_true")]
        click: bool,
        #[serde(default)]
        press_enter: bool,
    },
    /// Select all, then type text followed by Enter.
    EnterText {
        x: i32,
        y: i32,
        text: String,
        modifiers: Option<String>,
        #[serde(default = "default_true")]
        click: bool,
    },
    SampleColor { x: i32, y: i32 },
    DragTo {
        destination: Destination,
        handle: Option<String>,
    },
    Drop { handle: Option<String> },
    DragAndDrop {
        destination: Destination,
        handle: Option<String>,
    },
    /// Shutdown the daemon gracefully.
    Shutdown,
}

/// A response from daemon to CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl Response {
    pub fn success(id: impl Into<String>, data: ResponseData) -> Self {
        Self {
            id: id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, error: ApiError) -> Self {
        Self {
            id: id.into(),
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Response payload variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// Generic success message.
    Ok { message: String },
    /// A handle after the command ran.
    Handle { handle: HandleInfo },
    Handles { handles: Vec<HandleInfo> },
    /// Sampled pixel, with its `#rrggbb` form for display.
    Color { color: Color, hex: String },
}

impl ResponseData {
    pub fn ok(message: impl Into<String>) -> Self {
        ResponseData::Ok {
            message: message.into(),
        }
    }

    pub fn color(color: Color) -> Self {
        ResponseData::Color {
            color,
            hex: color.to_string(),
        }
    }
}

/// Information about an open handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleInfo {
    pub id: String,
    pub name: Option<String>,
    pub point: ScreenPoint,
    pub state: ButtonState,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_request_json() {
        let request = Request {
            id: "1".into(),
            command: Command::Click { x: 10, y: 20 },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"id":"1","command":{"action":"click","x":10,"y":20}}"#
        );
    }

    #[test]
    fn test_scroll_defaults() {
        let cmd: Command = serde_json::from_str(
            r#"{"action":"scroll","x":1,"y":2,"direction":"backward","count":3}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::Scroll {
                x: 1,
                y: 2,
                direction: ScrollDirection::Backward,
                count: 3,
                click: true,
                modifiers: None,
            }
        );
    }

    #[test]
    fn test_mouse_down_defaults_to_left_button() {
        let cmd: Command =
            serde_json::from_str(r#"{"action":"mouse_down","x":0,"y":0}"#).unwrap();
        assert!(matches!(
            cmd,
            Command::MouseDown {
                button: Button::Left,
                ..
            }
        ));
    }

    #[test]
    fn test_drag_to_with_step_delay() {
        let cmd: Command = serde_json::from_str(
            r#"{"action":"drag_to","destination":{"x":5,"y":6,"delay_ms":2},"handle":"h"}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::DragTo {
                destination: Destination::PointWithDelay {
                    x: 5,
                    y: 6,
                    delay_ms: 2
                },
                handle: Some("h".into()),
            }
        );
    }

    #[test]
    fn test_drag_to_rejects_malformed_step_delay() {
        for delay in ["-5", "2.5", "\"8\""] {
            let json = format!(
                r#"{{"action":"drag_to","destination":{{"x":5,"y":6,"delay_ms":{}}}}}"#,
                delay
            );
            assert!(
                serde_json::from_str::<Command>(&json).is_err(),
                "delay_ms {} should be rejected",
                delay
            );
        }
    }

    #[test]
    fn test_unit_commands() {
        let cmd: Command = serde_json::from_str(r#"{"action":"list_handles"}"#).unwrap();
        assert_eq!(cmd, Command::ListHandles);
        let cmd: Command = serde_json::from_str(r#"{"action":"shutdown"}"#).unwrap();
        assert_eq!(cmd, Command::Shutdown);
    }

    #[test]
    fn test_error_response_omits_data() {
        let response = Response::error("7", ApiError::no_handles());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["error"]["code"], "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_color_response() {
        let data = ResponseData::color(Color::new(255, 0, 16));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "color");
        assert_eq!(json["hex"], "#ff0010");
        assert_eq!(json["color"]["r"], 255);
    }
}

//! Commands that run in-process instead of through the daemon.

use anyhow::{Context, Result};
use screenpilot_core::error::ApiError;
use screenpilot_core::point::{integral_delta, ScreenPoint};
use screenpilot_core::port::InputPort;
use screenpilot_core::protocol::{Command, ResponseData};
use serde::Serialize;
use tracing::{debug, info};

use crate::args::OffsetArgs;
use crate::engine::Engine;

/// Result of `screenpilot offset`.
#[derive(Debug, Serialize)]
pub struct OffsetReport {
    pub from: ScreenPoint,
    pub to: ScreenPoint,
    pub midpoint: ScreenPoint,
    pub distance: f64,
}

/// Apply the directional and signed shifts in `args` to its point.
pub fn offset(args: &OffsetArgs) -> Result<OffsetReport, ApiError> {
    let from = ScreenPoint::new(args.point.x, args.point.y);
    let mut to = from.clone();

    if let Some(px) = args.above {
        to = to.above(integral_delta(px)?)?;
    }
    if let Some(px) = args.below {
        to = to.below(integral_delta(px)?)?;
    }
    if let Some(px) = args.left {
        to = to.left(integral_delta(px)?)?;
    }
    if let Some(px) = args.right {
        to = to.right(integral_delta(px)?)?;
    }
    to = to.offset(integral_delta(args.dx)?, integral_delta(args.dy)?)?;

    Ok(OffsetReport {
        midpoint: from.midpoint_to(&to),
        distance: from.distance_to(&to),
        from,
        to,
    })
}

/// Execute a script of JSON commands, one per line, against `engine`.
///
/// Blank lines and lines starting with `#` are skipped. A `shutdown` line
/// ends the script early. Handles still open at the end are closed, which
/// releases any button left held. Returns the number of commands run.
pub fn run_script<P: InputPort>(
    script: &str,
    engine: &mut Engine<P>,
    mut on_result: impl FnMut(&ResponseData),
) -> Result<usize> {
    let mut executed = 0;

    for (index, raw) in script.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let command: Command = serde_json::from_str(line)
            .map_err(|e| {
                ApiError::unsupported_usage_with_suggestion(
                    format!("Invalid command: {}", e),
                    "Each line must be a JSON object with an 'action' field",
                )
            })
            .with_context(|| format!("line {}", line_no))?;

        if let Command::Shutdown = command {
            info!("Script requested shutdown at line {}", line_no);
            break;
        }

        debug!("Script line {}: {:?}", line_no, command);
        let data = engine
            .execute(command)
            .with_context(|| format!("line {}", line_no))?;
        on_result(&data);
        executed += 1;
    }

    if !engine.handles().is_empty() {
        debug!("Closing {} handle(s) left open by the script", engine.handles().len());
        engine.close_all();
    }

    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::PointArgs;
    use screenpilot_core::error::ErrorCode;
    use screenpilot_core::port::{Button, PortEvent, RecordingPort, Transition};
    use screenpilot_core::timing::TimingPolicy;

    fn offset_args(x: i32, y: i32) -> OffsetArgs {
        OffsetArgs {
            point: PointArgs { x, y },
            above: None,
            below: None,
            left: None,
            right: None,
            dx: 0.0,
            dy: 0.0,
        }
    }

    fn engine() -> Engine<RecordingPort> {
        Engine::new(RecordingPort::new(), TimingPolicy::instant())
    }

    #[test]
    fn test_offset_directions() {
        let mut args = offset_args(10, 10);
        args.above = Some(5.0);
        let report = offset(&args).unwrap();
        assert_eq!(report.to.xy(), (10, 5));

        let mut args = offset_args(0, 0);
        args.right = Some(3.0);
        args.below = Some(4.0);
        let report = offset(&args).unwrap();
        assert_eq!(report.to.xy(), (3, 4));
        assert_eq!(report.distance, 5.0);
        assert_eq!(report.midpoint.xy(), (1, 2));
    }

    #[test]
    fn test_offset_signed_shift() {
        let mut args = offset_args(100, 100);
        args.dx = -5.0;
        args.dy = 20.0;
        assert_eq!(offset(&args).unwrap().to.xy(), (95, 120));
    }

    #[test]
    fn test_offset_rejects_bad_deltas() {
        let mut args = offset_args(0, 0);
        args.above = Some(1.5);
        assert_eq!(offset(&args).unwrap_err().code, ErrorCode::InvalidArgument);

        let mut args = offset_args(0, 0);
        args.left = Some(-1.0);
        assert_eq!(offset(&args).unwrap_err().code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_run_script_drags_and_reports() {
        let script = r#"
# drag a slider
{"action":"open_handle","x":0,"y":0,"name":"slider"}
{"action":"drag_to","destination":{"x":20,"y":0}}

{"action":"drop","handle":"slider"}
"#;
        let mut engine = engine();
        let mut results = Vec::new();
        let count = run_script(script, &mut engine, |data| results.push(data.clone())).unwrap();

        assert_eq!(count, 3);
        assert_eq!(results.len(), 3);
        assert!(engine.handles().is_empty());
        assert_eq!(engine.machine().port().cursor(), (20, 0));
    }

    #[test]
    fn test_run_script_stops_at_first_error() {
        let script = r#"{"action":"click","x":1,"y":1}
{"action":"drop"}
{"action":"click","x":2,"y":2}"#;
        let mut engine = engine();
        let err = run_script(script, &mut engine, |_| {}).unwrap_err();

        assert!(format!("{:#}", err).starts_with("line 2"));
        let api = err.downcast_ref::<ApiError>().expect("api error");
        assert_eq!(api.code, ErrorCode::SessionNotFound);
        assert_eq!(engine.machine().port().cursor_trail(), vec![(1, 1)]);
    }

    #[test]
    fn test_run_script_rejects_malformed_line() {
        let mut engine = engine();
        let err = run_script("{\"action\":\"teleport\"}", &mut engine, |_| {}).unwrap_err();
        let api = err.downcast_ref::<ApiError>().expect("api error");
        assert_eq!(api.code, ErrorCode::UnsupportedUsage);
    }

    #[test]
    fn test_run_script_releases_open_drag() {
        let script = r#"{"action":"open_handle","x":0,"y":0}
{"action":"drag_to","destination":{"x":10,"y":0}}
{"action":"shutdown"}
{"action":"click","x":9,"y":9}"#;
        let mut engine = engine();
        let count = run_script(script, &mut engine, |_| {}).unwrap();

        assert_eq!(count, 2);
        let last = engine.machine().port().events().last().cloned();
        assert_eq!(
            last,
            Some(PortEvent::Button {
                button: Button::Left,
                transition: Transition::Up,
                x: 10,
                y: 0
            })
        );
    }
}

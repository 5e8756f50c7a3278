//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::backend::Backend;

const HANDLE_HELP: &str = "Target handle by name or ID [default: the only open handle]";

/// Mouse and keyboard automation at screen coordinates.
///
/// Clicks, drags, scrolls and types at absolute screen positions. A
/// background daemon keeps pointer handles alive between invocations so a
/// drag started by one command can be dropped by another.
#[derive(Debug, Parser)]
#[command(name = "screenpilot", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open a pointer handle at a screen point
    #[command(after_help = "\
Examples:
  screenpilot open 100 200                  # Anonymous handle
  screenpilot open 100 200 --name slider    # Named handle for later commands
  screenpilot open 100 200 --label knob     # Label shown in logs")]
    Open(OpenArgs),

    /// Close a handle, releasing its button if a drag is in progress
    Close(HandleArgs),

    /// List open handles
    Handles,

    /// Move the cursor to a point and wait for the UI to settle
    Move(PointArgs),

    /// Walk a handle's pointer to a destination without pressing a button
    #[command(after_help = "\
Examples:
  screenpilot move-to 300 200               # Walk the only handle to (300, 200)
  screenpilot move-to 300 200 0.01          # Pause 10ms at each step
  screenpilot move-to 300 200 --handle slider")]
    MoveTo(DestinationArgs),

    /// Left-click at a point
    Click(PointArgs),

    /// Right-click at a point
    RightClick(PointArgs),

    /// Double-click at a point
    DoubleClick(PointArgs),

    /// Press a mouse button at a point without releasing it
    MouseDown(ButtonArgs),

    /// Release a mouse button at a point
    MouseUp(ButtonArgs),

    /// Turn the mouse wheel over a point
    #[command(after_help = "\
Examples:
  screenpilot scroll 500 400 backward 3     # Three notches toward the user
  screenpilot scroll 500 400 forward --no-click
  screenpilot scroll 500 400 forward 2 --modifiers Ctrl   # Zoom in many apps")]
    Scroll(ScrollArgs),

    /// Click a point and type text
    #[command(
        name = "type",
        after_help = "\
Examples:
  screenpilot type 200 50 'hello'           # Click the field, then type
  screenpilot type 200 50 'query' --enter   # Type and press Enter
  screenpilot type 200 50 'C:\\temp\\new'     # Backslashes are typed as-is
  screenpilot type 0 0 'x' --no-click --modifiers Ctrl"
    )]
    Type(TypeArgs),

    /// Select all with Ctrl+A, type text, then press Enter (deprecated)
    EnterText(EnterTextArgs),

    /// Sample the color of the pixel at a point
    Color(PointArgs),

    /// Press the left button on a handle and drag it to a destination
    #[command(after_help = "\
Examples:
  screenpilot open 100 100 --name item
  screenpilot drag-to 200 100               # Press at (100, 100), move to (200, 100)
  screenpilot drag-to 200 300               # Continue the same drag
  screenpilot drop                          # Release at (200, 300)")]
    DragTo(DestinationArgs),

    /// Release the button held by drag-to
    Drop(HandleArgs),

    /// Drag a handle to a destination and release it there
    DragAndDrop(DestinationArgs),

    /// Compute a point relative to another (no daemon needed)
    #[command(after_help = "\
Examples:
  screenpilot offset 100 100 --above 10     # (100, 90)
  screenpilot offset 100 100 --dx -5 --dy 20
  screenpilot offset 0 0 --right 3 --below 4  # distance 5")]
    Offset(OffsetArgs),

    /// Execute a file of JSON commands without the daemon
    #[command(after_help = "\
Each non-empty line is one command object, exactly as sent to the daemon.
Lines starting with '#' are comments. Execution stops at the first error.

Example script:
  # drag a slider
  {\"action\":\"open_handle\",\"x\":100,\"y\":200,\"name\":\"slider\"}
  {\"action\":\"drag_to\",\"destination\":{\"x\":180,\"y\":200}}
  {\"action\":\"drop\"}")]
    Run(RunArgs),

    /// Show an end-to-end usage example
    Examples,

    /// Start the daemon process (usually auto-started)
    Daemon(DaemonArgs),

    /// Stop the daemon process
    Stop,
}

/// Where the pacing delays come from.
#[derive(Debug, Default, clap::Args)]
pub struct TimingArgs {
    /// JSON file with timing overrides (see SCREENPILOT_TIMING)
    #[arg(long, value_name = "FILE")]
    pub timing: Option<PathBuf>,

    /// Skip every delay between events
    #[arg(long)]
    pub instant: bool,
}

#[derive(Debug, clap::Args)]
pub struct DaemonArgs {
    /// Input backend
    #[arg(long, value_enum, default_value_t = Backend::default())]
    pub backend: Backend,

    #[command(flatten)]
    pub timing: TimingArgs,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Script with one JSON command per line
    pub script: PathBuf,

    /// Input backend
    #[arg(long, value_enum, default_value_t = Backend::default())]
    pub backend: Backend,

    #[command(flatten)]
    pub timing: TimingArgs,
}

#[derive(Debug, clap::Args)]
pub struct PointArgs {
    /// Horizontal screen coordinate
    #[arg(allow_negative_numbers = true)]
    pub x: i32,

    /// Vertical screen coordinate
    #[arg(allow_negative_numbers = true)]
    pub y: i32,
}

#[derive(Debug, clap::Args)]
pub struct OpenArgs {
    #[command(flatten)]
    pub point: PointArgs,

    /// Give this handle a name for later commands
    #[arg(short, long)]
    pub name: Option<String>,

    /// Label shown with the point in logs
    #[arg(short, long)]
    pub label: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct HandleArgs {
    #[arg(long, help = HANDLE_HELP)]
    pub handle: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct DestinationArgs {
    /// X and Y of the destination, optionally followed by a per-step delay in seconds
    #[arg(
        required = true,
        num_args = 1..,
        allow_negative_numbers = true,
        value_name = "X Y [DELAY]"
    )]
    pub values: Vec<f64>,

    #[arg(long, help = HANDLE_HELP)]
    pub handle: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
}

#[derive(Debug, clap::Args)]
pub struct ButtonArgs {
    #[command(flatten)]
    pub point: PointArgs,

    #[arg(short, long, value_enum, default_value_t = MouseButton::Left)]
    pub button: MouseButton,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScrollDirection {
    /// Away from the user
    #[value(alias = "up")]
    Forward,
    /// Toward the user
    #[value(alias = "down")]
    Backward,
}

#[derive(Debug, clap::Args)]
pub struct ScrollArgs {
    #[command(flatten)]
    pub point: PointArgs,

    #[arg(value_enum)]
    pub direction: ScrollDirection,

    /// Number of wheel notches (max 1000)
    #[arg(default_value_t = 1)]
    pub count: u32,

    /// Do not click the point before scrolling
    #[arg(long)]
    pub no_click: bool,

    /// Modifiers held while scrolling, e.g. Ctrl or Ctrl+Shift
    #[arg(short, long)]
    pub modifiers: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct TypeArgs {
    #[command(flatten)]
    pub point: PointArgs,

    /// Text to type
    pub text: String,

    /// Modifiers held while typing
    #[arg(short, long)]
    pub modifiers: Option<String>,

    /// Do not click the point before typing
    #[arg(long)]
    pub no_click: bool,

    /// Press Enter after the text
    #[arg(long)]
    pub enter: bool,
}

#[derive(Debug, clap::Args)]
pub struct EnterTextArgs {
    #[command(flatten)]
    pub point: PointArgs,

    /// Text to type
    pub text: String,

    /// Modifiers held while typing
    #[arg(short, long)]
    pub modifiers: Option<String>,

    /// Do not click the point before typing
    #[arg(long)]
    pub no_click: bool,
}

#[derive(Debug, clap::Args)]
pub struct OffsetArgs {
    #[command(flatten)]
    pub point: PointArgs,

    /// Pixels up (whole, non-negative)
    #[arg(long, value_name = "PX")]
    pub above: Option<f64>,

    /// Pixels down (whole, non-negative)
    #[arg(long, value_name = "PX")]
    pub below: Option<f64>,

    /// Pixels left (whole, non-negative)
    #[arg(long, value_name = "PX")]
    pub left: Option<f64>,

    /// Pixels right (whole, non-negative)
    #[arg(long, value_name = "PX")]
    pub right: Option<f64>,

    /// Signed horizontal shift
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    pub dx: f64,

    /// Signed vertical shift
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    pub dy: f64,
}

/// End-to-end example text for the `examples` command.
pub const EXAMPLES_TEXT: &str = r#"End-to-end example: move a slider and confirm a dialog

# 1. Check the slider knob is where you expect (prints its color)
screenpilot color 120 340

# 2. Open a named handle on the knob
screenpilot open 120 340 --name volume

# 3. Drag it 200 pixels to the right in 10 px steps
screenpilot drag-to 320 340 --handle volume

# 4. Release it
screenpilot drop --handle volume

# 5. Type into the dialog's input field and submit
screenpilot type 400 500 "42" --enter

# 6. Click OK
screenpilot click 460 580

# 7. Clean up
screenpilot close --handle volume
screenpilot stop
"#;

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, ScrollDirection};
    use clap::Parser;

    #[test]
    fn test_click_accepts_negative_coordinates() {
        let cli = Cli::parse_from(["screenpilot", "click", "-1920", "40"]);
        match cli.command {
            Commands::Click(args) => {
                assert_eq!((args.x, args.y), (-1920, 40));
            }
            _ => panic!("Expected click command"),
        }
    }

    #[test]
    fn test_drag_to_collects_values() {
        let cli = Cli::parse_from([
            "screenpilot",
            "drag-to",
            "200",
            "-5",
            "0.01",
            "--handle",
            "knob",
        ]);
        match cli.command {
            Commands::DragTo(args) => {
                assert_eq!(args.values, vec![200.0, -5.0, 0.01]);
                assert_eq!(args.handle.as_deref(), Some("knob"));
            }
            _ => panic!("Expected drag-to command"),
        }
    }

    #[test]
    fn test_scroll_direction_aliases() {
        let cli = Cli::parse_from(["screenpilot", "scroll", "1", "2", "down", "4"]);
        match cli.command {
            Commands::Scroll(args) => {
                assert!(matches!(args.direction, ScrollDirection::Backward));
                assert_eq!(args.count, 4);
                assert!(!args.no_click);
            }
            _ => panic!("Expected scroll command"),
        }
    }

    #[test]
    fn test_type_flags() {
        let cli = Cli::parse_from([
            "screenpilot",
            "type",
            "5",
            "6",
            "hello",
            "--enter",
            "-m",
            "Shift",
        ]);
        match cli.command {
            Commands::Type(args) => {
                assert_eq!(args.text, "hello");
                assert!(args.enter);
                assert_eq!(args.modifiers.as_deref(), Some("Shift"));
            }
            _ => panic!("Expected type command"),
        }
    }

    #[test]
    fn test_daemon_timing_flags() {
        let cli = Cli::parse_from(["screenpilot", "daemon", "--backend", "record", "--instant"]);
        match cli.command {
            Commands::Daemon(args) => {
                assert!(args.timing.instant);
                assert!(args.timing.timing.is_none());
            }
            _ => panic!("Expected daemon command"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

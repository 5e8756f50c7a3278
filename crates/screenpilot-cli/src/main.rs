//! screenpilot CLI and daemon entry point.

mod args;
mod backend;
mod config;
mod daemon;
mod engine;
mod handles;
mod local;

use anyhow::Context;
use clap::Parser;
use screenpilot_core::gesture::{Destination, ScrollDirection};
use screenpilot_core::port::Button;
use screenpilot_core::protocol::{Command, ResponseData};
use tracing::{error, info};

use crate::args::{Cli, Commands, DaemonArgs, MouseButton, RunArgs};
use crate::daemon::client::DaemonClient;
use crate::daemon::server::DaemonServer;
use crate::engine::Engine;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Daemon(args) => {
            run_daemon(args);
            return;
        }
        Commands::Run(args) => run_script(args),
        Commands::Offset(args) => local::offset(&args)
            .map_err(anyhow::Error::from)
            .and_then(|report| print_json(&report)),
        Commands::Examples => {
            println!("{}", args::EXAMPLES_TEXT);
            Ok(())
        }
        Commands::Stop => stop_daemon(),
        command => run_client_command(command),
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }
}

fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<screenpilot_core::error::ApiError>() {
        Some(_) => eprintln!("Error: {:#}", e),
        None => error!("{:#}", e),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_data(data: &ResponseData) -> anyhow::Result<()> {
    match data {
        ResponseData::Ok { message } => {
            println!("{}", message);
            Ok(())
        }
        other => print_json(other),
    }
}

fn button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
    }
}

fn scroll_direction(direction: args::ScrollDirection) -> ScrollDirection {
    match direction {
        args::ScrollDirection::Forward => ScrollDirection::Forward,
        args::ScrollDirection::Backward => ScrollDirection::Backward,
    }
}

/// Convert CLI args to a protocol Command.
fn cli_to_command(command: Commands) -> anyhow::Result<Command> {
    let command = match command {
        Commands::Open(args) => Command::OpenHandle {
            x: args.point.x,
            y: args.point.y,
            label: args.label,
            name: args.name,
        },
        Commands::Close(args) => Command::CloseHandle {
            handle: args.handle,
        },
        Commands::Handles => Command::ListHandles,
        Commands::Move(p) => Command::Move { x: p.x, y: p.y },
        Commands::MoveTo(args) => Command::MoveTo {
            destination: Destination::from_values(&args.values)?,
            handle: args.handle,
        },
        Commands::Click(p) => Command::Click { x: p.x, y: p.y },
        Commands::RightClick(p) => Command::RightClick { x: p.x, y: p.y },
        Commands::DoubleClick(p) => Command::DoubleClick { x: p.x, y: p.y },
        Commands::MouseDown(args) => Command::MouseDown {
            x: args.point.x,
            y: args.point.y,
            button: button(args.button),
        },
        Commands::MouseUp(args) => Command::MouseUp {
            x: args.point.x,
            y: args.point.y,
            button: button(args.button),
        },
        Commands::Scroll(args) => Command::Scroll {
            x: args.point.x,
            y: args.point.y,
            direction: scroll_direction(args.direction),
            count: args.count,
            click: !args.no_click,
            modifiers: args.modifiers,
        },
        Commands::Type(args) => Command::Type {
            x: args.point.x,
            y: args.point.y,
            text: args.text,
            modifiers: args.modifiers,
            click: !args.no_click,
            press_enter: args.enter,
        },
        Commands::EnterText(args) => Command::EnterText {
            x: args.point.x,
            y: args.point.y,
            text: args.text,
            modifiers: args.modifiers,
            click: !args.no_click,
        },
        Commands::Color(p) => Command::SampleColor { x: p.x, y: p.y },
        Commands::DragTo(args) => Command::DragTo {
            destination: Destination::from_values(&args.values)?,
            handle: args.handle,
        },
        Commands::Drop(args) => Command::Drop {
            handle: args.handle,
        },
        Commands::DragAndDrop(args) => Command::DragAndDrop {
            destination: Destination::from_values(&args.values)?,
            handle: args.handle,
        },
        Commands::Offset(_)
        | Commands::Run(_)
        | Commands::Examples
        | Commands::Daemon(_)
        | Commands::Stop => anyhow::bail!("command does not talk to the daemon"),
    };
    Ok(command)
}

/// Run a client command by connecting to the daemon.
fn run_client_command(command: Commands) -> anyhow::Result<()> {
    let command = cli_to_command(command)?;

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        // Connect to daemon (auto-starts if not running)
        let mut client = DaemonClient::connect().await?;

        let response = client.send(command).await?;

        if response.success {
            if let Some(data) = response.data {
                print_data(&data)?;
            }
        } else if let Some(err) = response.error {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }

        Ok(())
    })
}

fn stop_daemon() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let Some(mut client) = DaemonClient::connect_existing().await? else {
            println!("Daemon is not running");
            return Ok(());
        };

        let response = client.send(Command::Shutdown).await?;
        if let Some(data) = response.data {
            print_data(&data)?;
        }
        Ok(())
    })
}

/// Execute a script file in-process.
fn run_script(args: RunArgs) -> anyhow::Result<()> {
    let timing = config::load_timing(&args.timing)?;
    let port = backend::open(args.backend)?;
    let mut engine = Engine::new(port, timing);

    let script = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script {:?}", args.script))?;

    let mut printed = Ok(());
    let count = local::run_script(&script, &mut engine, |data| {
        if printed.is_ok() {
            printed = print_data(data);
        }
    })?;
    printed?;

    info!("Ran {} command(s) from {:?}", count, args.script);
    Ok(())
}

/// Run the daemon server with graceful signal handling.
///
/// The DaemonServer's Drop impl cleans up socket and PID files.
fn run_daemon(args: DaemonArgs) {
    let engine = match config::load_timing(&args.timing)
        .and_then(|timing| Ok(Engine::new(backend::open(args.backend)?, timing)))
    {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to start daemon: {:#}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let server = match DaemonServer::bind(engine).await {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to start daemon: {:#}", e);
                std::process::exit(1);
            }
        };

        tokio::select! {
            result = server.run() => {
                if let Err(e) = result {
                    error!("Daemon error: {}", e);
                    std::process::exit(1);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down gracefully");
            }
            _ = sigterm() => {
                info!("Received SIGTERM, shutting down gracefully");
            }
        }
        // Server is dropped here, removing the socket and PID files
    });
}

/// Wait for SIGTERM.
///
/// If the handler cannot be registered, logs a warning and waits forever.
#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(
                "Failed to register SIGTERM handler: {}, daemon will only respond to SIGINT",
                e
            );
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}

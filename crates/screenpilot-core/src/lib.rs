//! Core types and logic for screenpilot.
//!
//! This crate drives the mouse and keyboard at absolute screen coordinates.
//! It holds the geometry, the gesture sequencing and the protocol shared by
//! the CLI and the daemon; talking to the operating system is left to an
//! [`port::InputPort`] implementation supplied by the caller.
//!
//! # Modules
//!
//! - [`vector`]: real-valued 2-D vector algebra
//! - [`point`]: integer screen points, offsets and sampled colors
//! - [`path`]: straight-line pointer paths with a fixed step
//! - [`gesture`]: clicks, drags, scrolling and typing
//! - [`port`]: the input/capture boundary and an in-memory recorder
//! - [`keys`]: keys, modifiers and text-to-key conversion
//! - [`timing`]: pacing delays between synthesized events
//! - [`protocol`]: JSON-line request/response protocol
//! - [`error`]: API error types with actionable suggestions
//!
//! # Example
//!
//! ```
//! use screenpilot_core::gesture::{GestureMachine, GestureSession, Notify};
//! use screenpilot_core::port::RecordingPort;
//! use screenpilot_core::timing::TimingPolicy;
//!
//! let mut machine = GestureMachine::new(RecordingPort::new(), TimingPolicy::instant());
//! let mut slider = GestureSession::new((100, 200));
//!
//! machine.drag_to(&mut slider, (160, 200).into(), Notify::Emit).unwrap();
//! assert!(slider.is_held());
//! machine.drop(&mut slider, Notify::Emit).unwrap();
//! assert_eq!(slider.point().xy(), (160, 200));
//! ```

pub mod error;
pub mod gesture;
pub mod keys;
pub mod path;
pub mod point;
pub mod port;
pub mod protocol;
pub mod timing;
pub mod vector;

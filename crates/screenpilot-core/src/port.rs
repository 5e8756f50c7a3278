//! The boundary to the operating system's input and capture facilities.
//!
//! The gesture machine needs exactly five primitives from the platform:
//! place the cursor, press/release a mouse button, turn the wheel,
//! press/release a key, and read back a block of pixels. [`InputPort`] names
//! them; backends live outside this crate except for [`RecordingPort`], which
//! keeps everything in memory for tests and dry runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::keys::Key;
use crate::point::Color;

/// A mouse button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    #[default]
    Left,
    Right,
}

/// Press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Down,
    Up,
}

#[derive(Debug, Error)]
pub enum PortError {
    #[error("injection failed: {0}")]
    Injection(String),
    #[error("capture failed: {0}")]
    Capture(String),
}

pub type PortResult<T> = Result<T, PortError>;

/// OS-level input injection and pixel capture.
pub trait InputPort {
    /// Place the system cursor at absolute screen coordinates.
    fn set_cursor_position(&mut self, x: i32, y: i32) -> PortResult<()>;

    fn inject_button(
        &mut self,
        button: Button,
        transition: Transition,
        x: i32,
        y: i32,
    ) -> PortResult<()>;

    /// Turn the wheel one notch: `+1` forward (away from the user), `-1` backward.
    fn inject_wheel(&mut self, x: i32, y: i32, direction: i32) -> PortResult<()>;

    fn inject_key(&mut self, key: Key, transition: Transition) -> PortResult<()>;

    /// Capture a `w`×`h` block as row-major BGR triples.
    fn capture_pixel_region(&mut self, x: i32, y: i32, w: u32, h: u32) -> PortResult<Vec<u8>>;
}

impl<P: InputPort + ?Sized> InputPort for Box<P> {
    fn set_cursor_position(&mut self, x: i32, y: i32) -> PortResult<()> {
        (**self).set_cursor_position(x, y)
    }

    fn inject_button(
        &mut self,
        button: Button,
        transition: Transition,
        x: i32,
        y: i32,
    ) -> PortResult<()> {
        (**self).inject_button(button, transition, x, y)
    }

    fn inject_wheel(&mut self, x: i32, y: i32, direction: i32) -> PortResult<()> {
        (**self).inject_wheel(x, y, direction)
    }

    fn inject_key(&mut self, key: Key, transition: Transition) -> PortResult<()> {
        (**self).inject_key(key, transition)
    }

    fn capture_pixel_region(&mut self, x: i32, y: i32, w: u32, h: u32) -> PortResult<Vec<u8>> {
        (**self).capture_pixel_region(x, y, w, h)
    }
}

/// One call recorded by [`RecordingPort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PortEvent {
    Cursor {
        x: i32,
        y: i32,
    },
    Button {
        button: Button,
        transition: Transition,
        x: i32,
        y: i32,
    },
    Wheel {
        x: i32,
        y: i32,
        direction: i32,
    },
    Key {
        key: Key,
        transition: Transition,
    },
    Capture {
        x: i32,
        y: i32,
        w: u32,
        h: u32,
    },
}

/// In-memory port that records every call.
#[derive(Debug, Clone)]
pub struct RecordingPort {
    events: Vec<PortEvent>,
    cursor: (i32, i32),
    pixel: Color,
    calls: usize,
    fail_at: Option<usize>,
}

impl Default for RecordingPort {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPort {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            cursor: (0, 0),
            pixel: Color::new(0, 0, 0),
            calls: 0,
            fail_at: None,
        }
    }

    /// Color every capture reports.
    pub fn with_pixel(mut self, color: Color) -> Self {
        self.pixel = color;
        self
    }

    /// Make the call with zero-based index `n` fail once.
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn events(&self) -> &[PortEvent] {
        &self.events
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.cursor
    }

    /// Cursor positions in the order they were set.
    pub fn cursor_trail(&self) -> Vec<(i32, i32)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PortEvent::Cursor { x, y } => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, event: PortEvent) -> PortResult<()> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            return Err(PortError::Injection(format!("refused {:?}", event)));
        }
        debug!(?event, "port event");
        self.events.push(event);
        Ok(())
    }
}

impl InputPort for RecordingPort {
    fn set_cursor_position(&mut self, x: i32, y: i32) -> PortResult<()> {
        self.record(PortEvent::Cursor { x, y })?;
        self.cursor = (x, y);
        Ok(())
    }

    fn inject_button(
        &mut self,
        button: Button,
        transition: Transition,
        x: i32,
        y: i32,
    ) -> PortResult<()> {
        self.record(PortEvent::Button {
            button,
            transition,
            x,
            y,
        })
    }

    fn inject_wheel(&mut self, x: i32, y: i32, direction: i32) -> PortResult<()> {
        self.record(PortEvent::Wheel { x, y, direction })
    }

    fn inject_key(&mut self, key: Key, transition: Transition) -> PortResult<()> {
        self.record(PortEvent::Key { key, transition })
    }

    fn capture_pixel_region(&mut self, x: i32, y: i32, w: u32, h: u32) -> PortResult<Vec<u8>> {
        self.record(PortEvent::Capture { x, y, w, h })?;
        let pixel = [self.pixel.b, self.pixel.g, self.pixel.r];
        Ok(pixel.repeat((w as usize) * (h as usize)))
    }
}

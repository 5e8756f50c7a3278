//! Pacing delays for synthesized input.
//!
//! Target applications need time to react between events. Rather than probing
//! the UI for readiness, every gesture pauses for fixed, human-plausible
//! durations. The values are gathered here so the gesture machine can be
//! built with realistic pacing in production and [`TimingPolicy::instant`] in
//! tests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delays (in milliseconds) and step size used by the gesture machine.
///
/// Missing fields in a JSON config fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingPolicy {
    /// Pause after placing the cursor, letting hover effects settle.
    pub move_settle_ms: u64,
    /// Time a button is held between press and release.
    pub press_hold_ms: u64,
    /// Gap between the two clicks of a double click.
    pub double_click_gap_ms: u64,
    /// Pause after a completed click.
    pub after_click_ms: u64,
    /// Pause between the focusing click and typing (defaults to `after_click_ms`).
    pub click_to_type_ms: u64,
    /// Pause between key presses when typing text.
    pub key_press_ms: u64,
    /// Pause after Ctrl+A in the deprecated enter-text gesture.
    pub select_all_settle_ms: u64,
    /// Pause at each intermediate point of an interpolated move.
    pub path_step_delay_ms: u64,
    /// Pixels advanced along the dominant axis per interpolated point.
    pub path_step: u32,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            move_settle_ms: 500,
            press_hold_ms: 100,
            double_click_gap_ms: 100,
            after_click_ms: 300,
            click_to_type_ms: 300,
            key_press_ms: 20,
            select_all_settle_ms: 500,
            path_step_delay_ms: 5,
            path_step: 10,
        }
    }
}

impl TimingPolicy {
    /// Zero delays, default step size. Meant for tests and dry runs.
    pub fn instant() -> Self {
        Self {
            move_settle_ms: 0,
            press_hold_ms: 0,
            double_click_gap_ms: 0,
            after_click_ms: 0,
            click_to_type_ms: 0,
            key_press_ms: 0,
            select_all_settle_ms: 0,
            path_step_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn move_settle(&self) -> Duration {
        Duration::from_millis(self.move_settle_ms)
    }

    pub fn press_hold(&self) -> Duration {
        Duration::from_millis(self.press_hold_ms)
    }

    pub fn double_click_gap(&self) -> Duration {
        Duration::from_millis(self.double_click_gap_ms)
    }

    pub fn after_click(&self) -> Duration {
        Duration::from_millis(self.after_click_ms)
    }

    pub fn click_to_type(&self) -> Duration {
        Duration::from_millis(self.click_to_type_ms)
    }

    pub fn key_press(&self) -> Duration {
        Duration::from_millis(self.key_press_ms)
    }

    pub fn select_all_settle(&self) -> Duration {
        Duration::from_millis(self.select_all_settle_ms)
    }

    pub fn path_step_delay(&self) -> Duration {
        Duration::from_millis(self.path_step_delay_ms)
    }
}

/// Block the current thread; zero-length pauses return immediately.
pub fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

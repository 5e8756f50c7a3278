//! OS input injection through enigo, pixel capture through xcap.

use anyhow::{Context, Result};
use enigo::{
    Axis, Button as EnigoButton, Coordinate, Direction, Enigo, Key as EnigoKey, Keyboard, Mouse,
    Settings,
};
use screenpilot_core::keys::{Key, Modifier};
use screenpilot_core::port::{Button, InputPort, PortError, PortResult, Transition};
use tracing::debug;
use xcap::image::RgbaImage;
use xcap::Monitor;

pub struct EnigoPort {
    enigo: Enigo,
}

impl EnigoPort {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("Failed to connect to the input system")?;
        Ok(Self { enigo })
    }
}

fn direction(transition: Transition) -> Direction {
    match transition {
        Transition::Down => Direction::Press,
        Transition::Up => Direction::Release,
    }
}

fn injection<E: std::fmt::Display>(e: E) -> PortError {
    PortError::Injection(e.to_string())
}

fn capture<E: std::fmt::Display>(e: E) -> PortError {
    PortError::Capture(e.to_string())
}

/// Read a `w`×`h` block out of a monitor capture as row-major BGR.
///
/// `left`/`top` are offsets from the monitor origin in screen coordinates;
/// `scale` is image pixels per screen pixel.
fn region_bgr(
    image: &RgbaImage,
    left: i32,
    top: i32,
    w: u32,
    h: u32,
    scale: f64,
) -> PortResult<Vec<u8>> {
    if left < 0 || top < 0 {
        return Err(PortError::Capture(format!(
            "region starts off the monitor at offset ({}, {})",
            left, top
        )));
    }

    let mut buffer = Vec::with_capacity(w as usize * h as usize * 3);
    for row in 0..h {
        for col in 0..w {
            let px = ((f64::from(left) + f64::from(col)) * scale) as u32;
            let py = ((f64::from(top) + f64::from(row)) * scale) as u32;
            let pixel = image.get_pixel_checked(px, py).ok_or_else(|| {
                PortError::Capture(format!(
                    "pixel ({}, {}) is outside the {}x{} capture",
                    px,
                    py,
                    image.width(),
                    image.height()
                ))
            })?;
            let [r, g, b, _] = pixel.0;
            buffer.extend_from_slice(&[b, g, r]);
        }
    }
    Ok(buffer)
}

fn map_key(key: Key) -> EnigoKey {
    match key {
        Key::Char(c) => EnigoKey::Unicode(c),
        Key::Modifier(Modifier::Ctrl) => EnigoKey::Control,
        Key::Modifier(Modifier::Alt) => EnigoKey::Alt,
        Key::Modifier(Modifier::Shift) => EnigoKey::Shift,
        Key::Modifier(Modifier::Meta) => EnigoKey::Meta,
        Key::Enter => EnigoKey::Return,
        Key::Tab => EnigoKey::Tab,
    }
}

impl InputPort for EnigoPort {
    fn set_cursor_position(&mut self, x: i32, y: i32) -> PortResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(injection)
    }

    fn inject_button(
        &mut self,
        button: Button,
        transition: Transition,
        x: i32,
        y: i32,
    ) -> PortResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(injection)?;
        let button = match button {
            Button::Left => EnigoButton::Left,
            Button::Right => EnigoButton::Right,
        };
        self.enigo
            .button(button, direction(transition))
            .map_err(injection)
    }

    fn inject_wheel(&mut self, x: i32, y: i32, direction: i32) -> PortResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(injection)?;
        // enigo scrolls toward the user for positive lengths.
        self.enigo
            .scroll(-direction, Axis::Vertical)
            .map_err(injection)
    }

    fn inject_key(&mut self, key: Key, transition: Transition) -> PortResult<()> {
        self.enigo
            .key(map_key(key), direction(transition))
            .map_err(injection)
    }

    fn capture_pixel_region(&mut self, x: i32, y: i32, w: u32, h: u32) -> PortResult<Vec<u8>> {
        let monitor = Monitor::from_point(x, y).map_err(capture)?;
        let image = monitor.capture_image().map_err(capture)?;
        // HiDPI captures come back in physical pixels.
        let scale = match monitor.width() {
            0 => 1.0,
            width => f64::from(image.width()) / f64::from(width),
        };
        debug!(
            "Captured {}x{} from monitor at ({}, {}), scale {}",
            image.width(),
            image.height(),
            monitor.x(),
            monitor.y(),
            scale
        );
        region_bgr(&image, x - monitor.x(), y - monitor.y(), w, h, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcap::image::Rgba;

    fn gradient() -> RgbaImage {
        RgbaImage::from_fn(8, 4, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 7, 255]))
    }

    #[test]
    fn test_key_mapping() {
        assert!(matches!(map_key(Key::Enter), EnigoKey::Return));
        assert!(matches!(map_key(Key::Char('x')), EnigoKey::Unicode('x')));
        assert!(matches!(
            map_key(Key::Modifier(Modifier::Ctrl)),
            EnigoKey::Control
        ));
    }

    #[test]
    fn test_region_is_bgr_row_major() {
        let buffer = region_bgr(&gradient(), 2, 1, 2, 1, 1.0).unwrap();
        assert_eq!(buffer, vec![7, 10, 20, 7, 10, 30]);
    }

    #[test]
    fn test_region_scales_to_physical_pixels() {
        let buffer = region_bgr(&gradient(), 1, 1, 1, 1, 2.0).unwrap();
        assert_eq!(buffer, vec![7, 20, 20]);
    }

    #[test]
    fn test_region_outside_capture_fails() {
        assert!(matches!(
            region_bgr(&gradient(), 8, 0, 1, 1, 1.0),
            Err(PortError::Capture(_))
        ));
        assert!(matches!(
            region_bgr(&gradient(), -1, 0, 1, 1, 1.0),
            Err(PortError::Capture(_))
        ));
    }
}

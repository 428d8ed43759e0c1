//! The native layer the app loop runs on.

#[cfg(target_os = "macos")]
pub mod macos;

use std::time::Duration;

use thiserror::Error;

use crate::notch::{Point, Rect, WindowHost};

/// Something the native layer reports back to the app loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A frame animation finished on the window with this serial.
    ResizeCompleted { window: u64 },
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("the app must be started on the main thread")]
    NotMainThread,
    #[error("no screen is attached")]
    NoScreen,
    #[error("notchify only runs on macOS")]
    Unsupported,
}

pub trait Platform {
    type Host: WindowHost;

    /// Frame of the screen the overlay lives on, bottom-left origin. On macOS
    /// this is `NSScreen::mainScreen`, the screen holding the key window.
    fn main_screen(&self) -> Option<Rect>;
    /// Global pointer position, or `None` when it is not over the main screen.
    fn pointer_location(&self) -> Option<Point>;
    /// Dispatches native events for up to `timeout` and returns host events.
    fn pump_events(&mut self, timeout: Duration) -> Vec<HostEvent>;
    fn window_host(&self) -> Self::Host;
}

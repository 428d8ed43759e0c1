//! Frame computation for the compact and expanded overlay.
//!
//! Coordinates use the AppKit convention: origin at the bottom-left of the
//! screen, y growing upward. Both frames are horizontally centered and their
//! top edge sits on the top edge of the screen.

use serde::Serialize;

use super::profile::DeviceProfile;

pub const EXPANDED_WIDTH_MULTIPLIER: f64 = 3.0;
pub const EXPANDED_HEIGHT_MULTIPLIER: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Edges are inclusive so a pointer pinned to the top of the screen
    /// still counts as inside a top-anchored frame.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.max_x() && point.y >= self.y && point.y <= self.max_y()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.max_x() <= self.max_x()
            && other.y >= self.y
            && other.max_y() <= self.max_y()
    }
}

/// A frame of the given size centered on the screen's top edge.
fn top_centered(screen: &Rect, width: f64, height: f64) -> Rect {
    Rect {
        x: screen.x + (screen.width - width) / 2.0,
        y: screen.y + screen.height - height,
        width,
        height,
    }
}

pub fn compact_frame(screen: &Rect, profile: &DeviceProfile) -> Rect {
    top_centered(screen, profile.base_width, profile.base_height)
}

pub fn expanded_frame(screen: &Rect, profile: &DeviceProfile) -> Rect {
    top_centered(
        screen,
        profile.base_width * EXPANDED_WIDTH_MULTIPLIER,
        profile.base_height * EXPANDED_HEIGHT_MULTIPLIER,
    )
}

/// Frame for the given expansion flag.
pub fn frame_for(screen: &Rect, profile: &DeviceProfile, expanded: bool) -> Rect {
    if expanded {
        expanded_frame(screen, profile)
    } else {
        compact_frame(screen, profile)
    }
}

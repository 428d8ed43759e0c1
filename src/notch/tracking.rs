//! Pointer tracking surface.
//!
//! Turns raw pointer samples into enter/exit transitions for the region the
//! overlay currently occupies. The hit region is replaced in a single step on
//! resize, and the last known pointer position is re-tested against the new
//! region so a boundary crossed during the resize yields exactly one event.

use super::geometry::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Entered,
    Exited,
}

#[derive(Debug, Clone)]
pub struct TrackingSurface {
    region: Rect,
    last_pointer: Option<Point>,
    inside: bool,
}

impl TrackingSurface {
    pub fn new(bounds: Rect) -> Self {
        Self {
            region: bounds,
            last_pointer: None,
            inside: false,
        }
    }

    pub fn region(&self) -> Rect {
        self.region
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Feeds a pointer sample in screen coordinates.
    pub fn pointer_moved(&mut self, point: Point) -> Option<PointerEvent> {
        self.last_pointer = Some(point);
        self.transition(self.region.contains(point))
    }

    /// The pointer is no longer on this screen.
    pub fn pointer_left_screen(&mut self) -> Option<PointerEvent> {
        self.last_pointer = None;
        self.transition(false)
    }

    /// Replaces the hit region and reconciles against the last pointer sample.
    pub fn on_resize(&mut self, bounds: Rect) -> Option<PointerEvent> {
        self.region = bounds;
        let now_inside = self
            .last_pointer
            .map(|p| bounds.contains(p))
            .unwrap_or(self.inside);
        let event = self.transition(now_inside);
        if let Some(event) = event {
            log::trace!("Tracking region resized, reconciled {:?}", event);
        }
        event
    }

    fn transition(&mut self, now_inside: bool) -> Option<PointerEvent> {
        match (self.inside, now_inside) {
            (false, true) => {
                self.inside = true;
                Some(PointerEvent::Entered)
            }
            (true, false) => {
                self.inside = false;
                Some(PointerEvent::Exited)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact() -> Rect {
        Rect::new(635.0, 868.0, 170.0, 32.0)
    }

    fn expanded() -> Rect {
        Rect::new(465.0, 580.0, 510.0, 320.0)
    }

    // -- Stationary region --------------------------------------------------

    #[test]
    fn enter_then_exit_once_each() {
        let mut surface = TrackingSurface::new(compact());
        assert_eq!(surface.pointer_moved(Point::new(10.0, 10.0)), None);
        assert_eq!(
            surface.pointer_moved(Point::new(700.0, 890.0)),
            Some(PointerEvent::Entered)
        );
        assert_eq!(surface.pointer_moved(Point::new(710.0, 880.0)), None);
        assert_eq!(
            surface.pointer_moved(Point::new(10.0, 10.0)),
            Some(PointerEvent::Exited)
        );
        assert_eq!(surface.pointer_moved(Point::new(20.0, 10.0)), None);
    }

    #[test]
    fn leaving_screen_exits_only_when_inside() {
        let mut surface = TrackingSurface::new(compact());
        assert_eq!(surface.pointer_left_screen(), None);
        surface.pointer_moved(Point::new(700.0, 890.0));
        assert_eq!(surface.pointer_left_screen(), Some(PointerEvent::Exited));
    }

    // -- Resize -------------------------------------------------------------

    #[test]
    fn grow_under_stationary_inside_pointer_emits_nothing() {
        let mut surface = TrackingSurface::new(compact());
        surface.pointer_moved(Point::new(700.0, 890.0));
        assert_eq!(surface.on_resize(expanded()), None);
        assert!(surface.is_inside());
    }

    #[test]
    fn grow_onto_pointer_emits_single_enter() {
        let mut surface = TrackingSurface::new(compact());
        surface.pointer_moved(Point::new(500.0, 700.0));
        assert_eq!(surface.on_resize(expanded()), Some(PointerEvent::Entered));
        assert_eq!(surface.on_resize(expanded()), None);
    }

    #[test]
    fn shrink_away_from_pointer_emits_single_exit() {
        let mut surface = TrackingSurface::new(expanded());
        surface.pointer_moved(Point::new(500.0, 700.0));
        assert_eq!(surface.on_resize(compact()), Some(PointerEvent::Exited));
        assert_eq!(surface.pointer_moved(Point::new(501.0, 700.0)), None);
    }

    #[test]
    fn resize_without_samples_keeps_state() {
        let mut surface = TrackingSurface::new(compact());
        assert_eq!(surface.on_resize(expanded()), None);
        assert_eq!(surface.region(), expanded());
    }
}

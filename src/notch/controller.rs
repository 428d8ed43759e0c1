//! Hover-driven expand/collapse state machine for the notch overlay.
//!
//! All methods run on the event-loop thread. The controller resumes only from
//! a pointer event, a debounce timer firing, or an animation completion, and
//! it owns both the host window and the interaction state outright.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use super::geometry::{self, Point, Rect};
use super::profile::DeviceProfile;
use super::timer::{Clock, Scheduler, TimerToken};
use super::tracking::{PointerEvent, TrackingSurface};

pub const EXPAND_DURATION: Duration = Duration::from_millis(250);
pub const COLLAPSE_DURATION: Duration = Duration::from_millis(200);
pub const COLLAPSE_DEBOUNCE: Duration = Duration::from_millis(300);
pub const SETTLE_GRACE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Collapsed,
    Expanding,
    Expanded,
    PendingCollapse,
    Collapsing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Collapsed => "collapsed",
            Phase::Expanding => "expanding",
            Phase::Expanded => "expanded",
            Phase::PendingCollapse => "pending_collapse",
            Phase::Collapsing => "collapsing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    EaseIn,
    EaseOut,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimingsError {
    #[error("collapse debounce must be longer than zero")]
    ZeroDebounce,
}

/// Animation and hover timing constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub expand: Duration,
    pub collapse: Duration,
    pub debounce: Duration,
    pub grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            expand: EXPAND_DURATION,
            collapse: COLLAPSE_DURATION,
            debounce: COLLAPSE_DEBOUNCE,
            grace: SETTLE_GRACE,
        }
    }
}

impl Timings {
    pub fn new(
        expand: Duration,
        collapse: Duration,
        debounce: Duration,
        grace: Duration,
    ) -> Result<Self, TimingsError> {
        if debounce.is_zero() {
            return Err(TimingsError::ZeroDebounce);
        }
        Ok(Self {
            expand,
            collapse,
            debounce,
            grace,
        })
    }
}

/// The controller's single piece of mutable interaction state.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionState {
    pub phase: Phase,
    pub pending_collapse_deadline: Option<Instant>,
    pub expansion_settled_at: Option<Instant>,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            phase: Phase::Collapsed,
            pending_collapse_deadline: None,
            expansion_settled_at: None,
        }
    }
}

/// The on-screen window. Only the controller may move it.
pub trait HostWindow {
    /// Animates to `frame`; the host reports completion through
    /// `resize_completed_for` with this window's serial.
    fn animate_frame(&mut self, frame: Rect, duration: Duration, easing: Easing);
    fn close(&mut self);
}

/// Creates host windows.
pub trait WindowHost {
    type Window: HostWindow;

    fn open_window(&mut self, frame: Rect, serial: u64) -> Self::Window;
}

pub struct NotchController<H: WindowHost, S: Scheduler, C: Clock> {
    host: H,
    window: H::Window,
    window_serial: u64,
    scheduler: S,
    clock: C,
    screen: Rect,
    profile: DeviceProfile,
    timings: Timings,
    state: InteractionState,
    surface: TrackingSurface,
    pending_timer: Option<TimerToken>,
    next_token: u64,
    pointer_inside: bool,
    /// Last pointer event that arrived while a resize was animating.
    deferred_pointer: Option<PointerEvent>,
}

impl<H: WindowHost, S: Scheduler, C: Clock> NotchController<H, S, C> {
    pub fn new(
        mut host: H,
        scheduler: S,
        clock: C,
        screen: Rect,
        profile: DeviceProfile,
        timings: Timings,
    ) -> Self {
        let compact = geometry::compact_frame(&screen, &profile);
        let window_serial = 1;
        let window = host.open_window(compact, window_serial);
        log::info!(
            "Notch window for '{}' at ({}, {}) size {}x{}",
            profile.id,
            compact.x,
            compact.y,
            compact.width,
            compact.height
        );

        Self {
            host,
            window,
            window_serial,
            scheduler,
            clock,
            screen,
            profile,
            timings,
            state: InteractionState::default(),
            surface: TrackingSurface::new(compact),
            pending_timer: None,
            next_token: 0,
            pointer_inside: false,
            deferred_pointer: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn window_serial(&self) -> u64 {
        self.window_serial
    }

    pub fn tracking_region(&self) -> Rect {
        self.surface.region()
    }

    pub fn compact_frame(&self) -> Rect {
        geometry::compact_frame(&self.screen, &self.profile)
    }

    pub fn expanded_frame(&self) -> Rect {
        geometry::expanded_frame(&self.screen, &self.profile)
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Applies to transitions started after this call.
    pub fn set_timings(&mut self, timings: Timings) {
        self.timings = timings;
    }

    // -- Pointer input ------------------------------------------------------

    pub fn pointer_moved(&mut self, point: Point) {
        if let Some(event) = self.surface.pointer_moved(point) {
            self.dispatch(event);
        }
    }

    pub fn pointer_left_screen(&mut self) {
        if let Some(event) = self.surface.pointer_left_screen() {
            self.dispatch(event);
        }
    }

    pub fn pointer_enter(&mut self) {
        self.pointer_inside = true;
        match self.state.phase {
            Phase::Collapsed => {
                self.cancel_debounce();
                self.begin_expand();
            }
            Phase::PendingCollapse => {
                self.cancel_debounce();
                self.set_phase(Phase::Expanded);
            }
            Phase::Expanding | Phase::Collapsing => {
                log::trace!("Pointer enter deferred while {}", self.state.phase);
                self.deferred_pointer = Some(PointerEvent::Entered);
            }
            Phase::Expanded => log::trace!("Pointer enter ignored while expanded"),
        }
    }

    pub fn pointer_exit(&mut self) {
        self.pointer_inside = false;
        match self.state.phase {
            Phase::Expanded => {
                self.arm_debounce();
                self.set_phase(Phase::PendingCollapse);
            }
            Phase::Expanding | Phase::Collapsing => {
                log::trace!("Pointer exit deferred while {}", self.state.phase);
                self.deferred_pointer = Some(PointerEvent::Exited);
            }
            phase => log::trace!("Pointer exit ignored while {}", phase),
        }
    }

    fn dispatch(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Entered => self.pointer_enter(),
            PointerEvent::Exited => self.pointer_exit(),
        }
    }

    // -- Host and timer callbacks -------------------------------------------

    /// Settles the in-flight resize. A pointer that crossed the boundary
    /// during the animation is acted on only once the new region is in place.
    pub fn resize_completed(&mut self) {
        match self.state.phase {
            Phase::Expanding => {
                let deferred = self.deferred_pointer.take();
                self.state.expansion_settled_at = Some(self.clock.now());
                self.set_phase(Phase::Expanded);
                self.refresh_tracking(true);
                if deferred == Some(PointerEvent::Exited)
                    && !self.pointer_inside
                    && self.state.phase == Phase::Expanded
                {
                    log::debug!("Pointer left during expansion");
                    self.pointer_exit();
                }
            }
            Phase::Collapsing => {
                let deferred = self.deferred_pointer.take();
                self.set_phase(Phase::Collapsed);
                self.refresh_tracking(false);
                if deferred == Some(PointerEvent::Entered)
                    && self.pointer_inside
                    && self.state.phase == Phase::Collapsed
                {
                    log::debug!("Pointer returned during collapse");
                    self.pointer_enter();
                }
            }
            phase => log::debug!("Resize completion ignored while {}", phase),
        }
    }

    /// Drops completions from a window that has since been replaced.
    pub fn resize_completed_for(&mut self, window_serial: u64) {
        if window_serial != self.window_serial {
            log::debug!(
                "Ignoring resize completion from window {} (current {})",
                window_serial,
                self.window_serial
            );
            return;
        }
        self.resize_completed();
    }

    pub fn timer_fired(&mut self, token: TimerToken) {
        if self.pending_timer != Some(token) || self.state.phase != Phase::PendingCollapse {
            log::debug!("Ignoring stale collapse timer {:?}", token);
            return;
        }
        self.pending_timer = None;
        self.state.pending_collapse_deadline = None;

        let now = self.clock.now();
        let grace_elapsed = self
            .state
            .expansion_settled_at
            .map_or(true, |settled| {
                now.saturating_duration_since(settled) >= self.timings.grace
            });

        if grace_elapsed && !self.pointer_inside {
            self.begin_collapse();
        } else {
            log::debug!(
                "Collapse timer inside settle grace (pointer_inside={}), staying expanded",
                self.pointer_inside
            );
            self.set_phase(Phase::Expanded);
        }
    }

    // -- Explicit commands --------------------------------------------------

    pub fn expand(&mut self) {
        match self.state.phase {
            Phase::Collapsed => self.begin_expand(),
            Phase::PendingCollapse => {
                self.cancel_debounce();
                self.set_phase(Phase::Expanded);
            }
            phase => log::trace!("Expand is a no-op while {}", phase),
        }
    }

    /// Collapses right away; debounce and grace only filter hover noise.
    pub fn collapse(&mut self) {
        match self.state.phase {
            Phase::Expanded | Phase::PendingCollapse => {
                self.cancel_debounce();
                self.begin_collapse();
            }
            phase => log::trace!("Collapse is a no-op while {}", phase),
        }
    }

    pub fn toggle(&mut self) {
        match self.state.phase {
            Phase::Collapsed | Phase::Collapsing => self.expand(),
            _ => self.collapse(),
        }
    }

    /// Replaces the window with one sized for `profile`, without animation.
    pub fn change_profile(&mut self, profile: DeviceProfile) {
        self.cancel_debounce();
        self.window.close();

        self.profile = profile;
        self.state = InteractionState::default();
        self.pointer_inside = false;
        self.deferred_pointer = None;
        self.window_serial += 1;

        let compact = self.compact_frame();
        self.window = self.host.open_window(compact, self.window_serial);
        self.surface = TrackingSurface::new(compact);
        log::info!(
            "Recreated notch window {} for profile '{}' ({}x{})",
            self.window_serial,
            profile.id,
            compact.width,
            compact.height
        );
    }

    // -- Internals ----------------------------------------------------------

    fn begin_expand(&mut self) {
        self.deferred_pointer = None;
        let frame = self.expanded_frame();
        self.window
            .animate_frame(frame, self.timings.expand, Easing::EaseOut);
        self.set_phase(Phase::Expanding);
    }

    fn begin_collapse(&mut self) {
        self.deferred_pointer = None;
        let frame = self.compact_frame();
        self.window
            .animate_frame(frame, self.timings.collapse, Easing::EaseIn);
        self.set_phase(Phase::Collapsing);
    }

    fn arm_debounce(&mut self) {
        self.cancel_debounce();
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.scheduler.arm(self.timings.debounce, token);
        self.pending_timer = Some(token);
        self.state.pending_collapse_deadline = Some(self.clock.now() + self.timings.debounce);
    }

    fn cancel_debounce(&mut self) {
        if let Some(token) = self.pending_timer.take() {
            self.scheduler.cancel(token);
        }
        self.state.pending_collapse_deadline = None;
    }

    fn refresh_tracking(&mut self, expanded: bool) {
        let frame = geometry::frame_for(&self.screen, &self.profile, expanded);
        if let Some(event) = self.surface.on_resize(frame) {
            self.dispatch(event);
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.state.phase != phase {
            log::debug!("Notch {} -> {}", self.state.phase, phase);
            self.state.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notch::profile::{MACBOOK_14, MACBOOK_16};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum HostCall {
        Open { frame: Rect, serial: u64 },
        Animate { frame: Rect, duration: Duration, easing: Easing },
        Close { serial: u64 },
    }

    type CallLog = Rc<RefCell<Vec<HostCall>>>;

    struct FakeHost {
        calls: CallLog,
    }

    struct FakeWindow {
        serial: u64,
        calls: CallLog,
    }

    impl HostWindow for FakeWindow {
        fn animate_frame(&mut self, frame: Rect, duration: Duration, easing: Easing) {
            self.calls.borrow_mut().push(HostCall::Animate {
                frame,
                duration,
                easing,
            });
        }

        fn close(&mut self) {
            self.calls
                .borrow_mut()
                .push(HostCall::Close { serial: self.serial });
        }
    }

    impl WindowHost for FakeHost {
        type Window = FakeWindow;

        fn open_window(&mut self, frame: Rect, serial: u64) -> FakeWindow {
            self.calls
                .borrow_mut()
                .push(HostCall::Open { frame, serial });
            FakeWindow {
                serial,
                calls: Rc::clone(&self.calls),
            }
        }
    }

    #[derive(Default)]
    struct FakeScheduler {
        live: Vec<TimerToken>,
        armed: Vec<(TimerToken, Duration)>,
        cancelled: Vec<TimerToken>,
    }

    impl Scheduler for FakeScheduler {
        fn arm(&mut self, delay: Duration, token: TimerToken) {
            self.live.push(token);
            self.armed.push((token, delay));
        }

        fn cancel(&mut self, token: TimerToken) {
            self.live.retain(|t| *t != token);
            self.cancelled.push(token);
        }
    }

    #[derive(Clone)]
    struct ManualClock {
        now: Rc<Cell<Instant>>,
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    struct Harness {
        controller: NotchController<FakeHost, FakeScheduler, ManualClock>,
        calls: CallLog,
        clock: ManualClock,
    }

    fn screen() -> Rect {
        Rect::new(0.0, 0.0, 1440.0, 900.0)
    }

    fn harness() -> Harness {
        let calls: CallLog = Rc::new(RefCell::new(Vec::new()));
        let clock = ManualClock {
            now: Rc::new(Cell::new(Instant::now())),
        };
        let controller = NotchController::new(
            FakeHost {
                calls: Rc::clone(&calls),
            },
            FakeScheduler::default(),
            clock.clone(),
            screen(),
            MACBOOK_14,
            Timings::default(),
        );
        Harness {
            controller,
            calls,
            clock,
        }
    }

    impl Harness {
        fn advance_ms(&self, ms: u64) {
            self.clock
                .now
                .set(self.clock.now.get() + Duration::from_millis(ms));
        }

        fn animations(&self) -> Vec<(Rect, Duration, Easing)> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|call| match call {
                    HostCall::Animate {
                        frame,
                        duration,
                        easing,
                    } => Some((*frame, *duration, *easing)),
                    _ => None,
                })
                .collect()
        }

        fn live_timer(&mut self) -> Option<TimerToken> {
            self.controller.scheduler_mut().live.last().copied()
        }

        fn fire_live_timer(&mut self) {
            let token = self.live_timer().expect("no live timer");
            self.controller.scheduler_mut().live.retain(|t| *t != token);
            self.controller.timer_fired(token);
        }

        fn settle_expanded(&mut self) {
            self.controller.pointer_enter();
            self.controller.resize_completed();
            assert_eq!(self.controller.phase(), Phase::Expanded);
        }
    }

    fn compact() -> Rect {
        Rect::new(635.0, 868.0, 170.0, 32.0)
    }

    fn expanded() -> Rect {
        Rect::new(465.0, 580.0, 510.0, 320.0)
    }

    // -- Construction -------------------------------------------------------

    #[test]
    fn starts_collapsed_with_compact_window() {
        let h = harness();
        assert_eq!(h.controller.phase(), Phase::Collapsed);
        assert_eq!(h.controller.state(), &InteractionState::default());
        assert_eq!(
            h.calls.borrow()[0],
            HostCall::Open {
                frame: compact(),
                serial: 1
            }
        );
        assert_eq!(h.controller.tracking_region(), compact());
    }

    // -- Full hover cycle ---------------------------------------------------

    #[test]
    fn hover_cycle_expands_then_collapses_after_debounce() {
        let mut h = harness();

        h.controller.pointer_enter();
        assert_eq!(h.controller.phase(), Phase::Expanding);
        assert_eq!(
            h.animations(),
            vec![(expanded(), EXPAND_DURATION, Easing::EaseOut)]
        );

        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::Expanded);
        assert!(h.controller.state().expansion_settled_at.is_some());
        assert_eq!(h.controller.tracking_region(), expanded());

        h.controller.pointer_exit();
        assert_eq!(h.controller.phase(), Phase::PendingCollapse);
        let armed = &h.controller.scheduler_mut().armed;
        assert_eq!(armed.len(), 1);
        assert_eq!(armed[0].1, COLLAPSE_DEBOUNCE);

        h.advance_ms(300);
        h.fire_live_timer();
        assert_eq!(h.controller.phase(), Phase::Collapsing);
        assert_eq!(
            h.animations().last(),
            Some(&(compact(), COLLAPSE_DURATION, Easing::EaseIn))
        );

        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::Collapsed);
        assert_eq!(h.controller.tracking_region(), compact());
    }

    #[test]
    fn pending_deadline_tracks_debounce() {
        let mut h = harness();
        h.settle_expanded();
        let now = h.clock.now();
        h.controller.pointer_exit();
        assert_eq!(
            h.controller.state().pending_collapse_deadline,
            Some(now + COLLAPSE_DEBOUNCE)
        );
        h.controller.pointer_enter();
        assert_eq!(h.controller.state().pending_collapse_deadline, None);
    }

    // -- Grace period -------------------------------------------------------

    #[test]
    fn timer_inside_grace_keeps_expanded_without_rearming() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_exit();
        h.advance_ms(100);
        h.fire_live_timer();

        assert_eq!(h.controller.phase(), Phase::Expanded);
        assert_eq!(h.animations().len(), 1);
        assert_eq!(h.controller.scheduler_mut().armed.len(), 1);
        assert!(h.live_timer().is_none());
    }

    #[test]
    fn timer_at_grace_boundary_collapses() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_exit();
        h.advance_ms(150);
        h.fire_live_timer();
        assert_eq!(h.controller.phase(), Phase::Collapsing);
    }

    #[test]
    fn new_exit_after_spurious_firing_rearms() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_exit();
        h.fire_live_timer();
        assert_eq!(h.controller.phase(), Phase::Expanded);

        h.controller.pointer_enter();
        h.controller.pointer_exit();
        assert_eq!(h.controller.phase(), Phase::PendingCollapse);
        assert_eq!(h.controller.scheduler_mut().armed.len(), 2);
    }

    // -- Debounce -----------------------------------------------------------

    #[test]
    fn enter_before_timer_cancels_collapse() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_exit();
        let token = h.live_timer().unwrap();

        h.advance_ms(200);
        h.controller.pointer_enter();
        assert_eq!(h.controller.phase(), Phase::Expanded);
        assert_eq!(h.controller.scheduler_mut().cancelled, vec![token]);

        h.advance_ms(200);
        h.controller.timer_fired(token);
        assert_eq!(h.controller.phase(), Phase::Expanded);
        assert_eq!(h.animations().len(), 1);
    }

    #[test]
    fn rearming_cancels_previous_timer() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_exit();
        h.controller.pointer_enter();
        h.controller.pointer_exit();
        assert_eq!(h.controller.scheduler_mut().live.len(), 1);
        assert_eq!(h.controller.scheduler_mut().cancelled.len(), 1);
    }

    // -- Ignored events -----------------------------------------------------

    #[test]
    fn exit_while_expanding_does_not_abort_expansion() {
        let mut h = harness();
        h.controller.pointer_enter();
        h.controller.pointer_exit();
        assert_eq!(h.controller.phase(), Phase::Expanding);
        assert!(h.live_timer().is_none());

        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::PendingCollapse);
    }

    #[test]
    fn explicit_expand_without_hover_stays_expanded() {
        let mut h = harness();
        h.controller.expand();
        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::Expanded);
        assert!(h.live_timer().is_none());
    }

    #[test]
    fn duplicate_enter_while_expanded_is_ignored() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_enter();
        assert_eq!(h.controller.phase(), Phase::Expanded);
        assert_eq!(h.animations().len(), 1);
    }

    #[test]
    fn enter_during_collapse_waits_for_completion() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.collapse();
        assert_eq!(h.controller.phase(), Phase::Collapsing);

        h.controller.pointer_enter();
        h.controller.pointer_exit();
        h.controller.pointer_enter();
        assert_eq!(h.controller.phase(), Phase::Collapsing);
        assert_eq!(h.animations().len(), 2);

        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::Expanding);
        assert_eq!(h.animations().len(), 3);
    }

    #[test]
    fn exit_during_collapse_leaves_it_collapsed() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.collapse();
        h.controller.pointer_enter();
        h.controller.pointer_exit();
        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::Collapsed);
    }

    #[test]
    fn unexpected_completion_is_ignored() {
        let mut h = harness();
        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::Collapsed);
    }

    // -- Positional tracking ------------------------------------------------

    #[test]
    fn pointer_leaving_during_expansion_arms_collapse_after_settle() {
        let mut h = harness();
        h.controller.pointer_moved(Point::new(720.0, 890.0));
        assert_eq!(h.controller.phase(), Phase::Expanding);

        h.controller.pointer_moved(Point::new(100.0, 100.0));
        assert_eq!(h.controller.phase(), Phase::Expanding);

        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::PendingCollapse);
        assert!(h.live_timer().is_some());
    }

    #[test]
    fn pointer_moving_into_panel_keeps_expanded() {
        let mut h = harness();
        h.controller.pointer_moved(Point::new(720.0, 890.0));
        h.controller.pointer_moved(Point::new(600.0, 700.0));
        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::Expanded);
        assert!(h.live_timer().is_none());
    }

    #[test]
    fn pointer_back_over_notch_during_collapse_reexpands_after_settle() {
        let mut h = harness();
        h.controller.pointer_moved(Point::new(720.0, 890.0));
        h.controller.resize_completed();
        h.controller.pointer_moved(Point::new(100.0, 100.0));
        h.advance_ms(300);
        h.fire_live_timer();
        assert_eq!(h.controller.phase(), Phase::Collapsing);

        h.controller.pointer_moved(Point::new(720.0, 890.0));
        assert_eq!(h.controller.phase(), Phase::Collapsing);

        h.controller.resize_completed();
        assert_eq!(h.controller.phase(), Phase::Expanding);
    }

    #[test]
    fn pointer_leaving_screen_counts_as_exit() {
        let mut h = harness();
        h.controller.pointer_moved(Point::new(720.0, 890.0));
        h.controller.resize_completed();
        h.controller.pointer_left_screen();
        assert_eq!(h.controller.phase(), Phase::PendingCollapse);
    }

    // -- Explicit commands --------------------------------------------------

    #[test]
    fn double_expand_requests_one_resize() {
        let mut h = harness();
        h.controller.expand();
        h.controller.expand();
        assert_eq!(h.animations().len(), 1);
        h.controller.resize_completed();
        h.controller.expand();
        assert_eq!(h.animations().len(), 1);
    }

    #[test]
    fn expand_from_pending_collapse_cancels_timer() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_exit();
        h.controller.expand();
        assert_eq!(h.controller.phase(), Phase::Expanded);
        assert!(h.live_timer().is_none());
        assert_eq!(h.animations().len(), 1);
    }

    #[test]
    fn collapse_is_noop_when_collapsed_or_collapsing() {
        let mut h = harness();
        h.controller.collapse();
        assert!(h.animations().is_empty());

        h.settle_expanded();
        h.controller.collapse();
        h.controller.collapse();
        assert_eq!(h.animations().len(), 2);
    }

    #[test]
    fn collapse_during_expansion_is_ignored() {
        let mut h = harness();
        h.controller.expand();
        h.controller.collapse();
        assert_eq!(h.controller.phase(), Phase::Expanding);
    }

    #[test]
    fn collapse_from_pending_cancels_timer_and_collapses_now() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_exit();
        h.controller.collapse();
        assert_eq!(h.controller.phase(), Phase::Collapsing);
        assert!(h.live_timer().is_none());
    }

    #[test]
    fn toggle_dispatches_on_phase() {
        let mut h = harness();
        h.controller.toggle();
        assert_eq!(h.controller.phase(), Phase::Expanding);
        h.controller.toggle();
        assert_eq!(h.controller.phase(), Phase::Expanding);
        h.controller.resize_completed();
        h.controller.toggle();
        assert_eq!(h.controller.phase(), Phase::Collapsing);
        h.controller.toggle();
        assert_eq!(h.controller.phase(), Phase::Collapsing);
        h.controller.resize_completed();
        h.controller.toggle();
        assert_eq!(h.controller.phase(), Phase::Expanding);
    }

    // -- Profile change -----------------------------------------------------

    #[test]
    fn profile_change_recreates_window_and_resets_state() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.change_profile(MACBOOK_16);

        assert_eq!(h.controller.state(), &InteractionState::default());
        assert_eq!(h.controller.window_serial(), 2);
        let new_compact = Rect::new(620.0, 863.0, 200.0, 37.0);
        let calls = h.calls.borrow();
        assert_eq!(calls[calls.len() - 2], HostCall::Close { serial: 1 });
        assert_eq!(
            calls[calls.len() - 1],
            HostCall::Open {
                frame: new_compact,
                serial: 2
            }
        );
        drop(calls);
        assert_eq!(h.controller.tracking_region(), new_compact);
        assert_eq!(h.animations().len(), 1);
    }

    #[test]
    fn timer_from_torn_down_window_is_ignored() {
        let mut h = harness();
        h.settle_expanded();
        h.controller.pointer_exit();
        let token = h.live_timer().unwrap();

        h.controller.change_profile(MACBOOK_16);
        h.advance_ms(300);
        h.controller.timer_fired(token);
        assert_eq!(h.controller.phase(), Phase::Collapsed);
        assert_eq!(h.animations().len(), 1);
    }

    #[test]
    fn completion_from_torn_down_window_is_ignored() {
        let mut h = harness();
        h.controller.pointer_enter();
        h.controller.change_profile(MACBOOK_16);
        h.controller.pointer_enter();
        h.controller.resize_completed_for(1);
        assert_eq!(h.controller.phase(), Phase::Expanding);
        h.controller.resize_completed_for(2);
        assert_eq!(h.controller.phase(), Phase::Expanded);
    }

    // -- Invariants over arbitrary input ------------------------------------

    #[test]
    fn arbitrary_event_sequences_keep_state_consistent() {
        let mut h = harness();
        let mut seed: u64 = 0x5eed;
        let mut resize_requests = 0;

        for _ in 0..5_000 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            match (seed >> 33) % 8 {
                0 => h.controller.pointer_enter(),
                1 => h.controller.pointer_exit(),
                2 => h.controller.resize_completed(),
                3 => {
                    if let Some(token) = h.live_timer() {
                        h.controller.scheduler_mut().live.retain(|t| *t != token);
                        h.controller.timer_fired(token);
                    }
                }
                4 => h.controller.toggle(),
                5 => h.advance_ms((seed >> 40) % 400),
                6 => h.controller.timer_fired(TimerToken(seed >> 50)),
                _ => h.controller.pointer_moved(Point::new(
                    ((seed >> 20) % 1440) as f64,
                    ((seed >> 10) % 900) as f64,
                )),
            }

            let state = h.controller.state().clone();
            let live = h.controller.scheduler_mut().live.len();
            assert!(live <= 1, "more than one debounce timer armed");
            assert_eq!(
                state.phase == Phase::PendingCollapse,
                state.pending_collapse_deadline.is_some()
            );
            assert_eq!(state.phase == Phase::PendingCollapse, live == 1);
            if matches!(state.phase, Phase::Expanded | Phase::PendingCollapse) {
                assert!(state.expansion_settled_at.is_some());
            }

            let animations = h.animations().len();
            assert!(animations >= resize_requests);
            resize_requests = animations;
        }
    }

    // -- Timings ------------------------------------------------------------

    #[test]
    fn zero_debounce_is_rejected() {
        let result = Timings::new(
            EXPAND_DURATION,
            COLLAPSE_DURATION,
            Duration::ZERO,
            SETTLE_GRACE,
        );
        assert_eq!(result, Err(TimingsError::ZeroDebounce));
    }

    #[test]
    fn default_timings_match_tuned_constants() {
        let timings = Timings::default();
        assert_eq!(timings.expand, Duration::from_millis(250));
        assert_eq!(timings.collapse, Duration::from_millis(200));
        assert_eq!(timings.debounce, Duration::from_millis(300));
        assert_eq!(timings.grace, Duration::from_millis(150));
    }
}

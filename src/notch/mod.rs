//! The notch overlay core: device profiles, frame geometry, pointer
//! tracking, timers, and the interaction controller that ties them together.

pub mod controller;
pub mod geometry;
pub mod profile;
pub mod timer;
pub mod tracking;

pub use controller::{
    Easing, HostWindow, InteractionState, NotchController, Phase, Timings, TimingsError,
    WindowHost,
};
pub use geometry::{Point, Rect};
pub use profile::{DeviceProfile, DEFAULT_PROFILE, PROFILES};
pub use timer::{Clock, DeadlineScheduler, Scheduler, SystemClock, TimerToken};

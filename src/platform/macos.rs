//! AppKit windows and the manual event loop.

use std::time::Duration;

use async_channel::{Receiver, Sender};
use block2::RcBlock;
use objc2::rc::Retained;
use objc2::runtime::{AnyClass, AnyObject};
use objc2::{class, define_class, msg_send, MainThreadMarker, MainThreadOnly};
use objc2_app_kit::{
    NSApplication, NSApplicationActivationPolicy, NSBackingStoreType, NSColor, NSEvent,
    NSEventMask, NSScreen, NSWindow, NSWindowCollectionBehavior, NSWindowStyleMask,
};
use objc2_foundation::{NSDate, NSPoint, NSRect, NSSize, NSString};

use super::{HostEvent, Platform, PlatformError};
use crate::notch::{Easing, HostWindow, Point, Rect, WindowHost};

/// kCGStatusWindowLevel, so the overlay sits above the menu bar.
const NOTCH_WINDOW_LEVEL: isize = 25;

define_class!(
    #[unsafe(super(NSWindow))]
    #[thread_kind = MainThreadOnly]
    #[name = "NotchifyWindow"]
    struct NotchWindow;

    impl NotchWindow {
        #[unsafe(method(canBecomeKeyWindow))]
        fn can_become_key_window(&self) -> bool {
            false
        }

        #[unsafe(method(canBecomeMainWindow))]
        fn can_become_main_window(&self) -> bool {
            false
        }
    }
);

impl NotchWindow {
    fn new(mtm: MainThreadMarker, frame: NSRect) -> Retained<Self> {
        unsafe {
            msg_send![
                Self::alloc(mtm),
                initWithContentRect: frame,
                styleMask: NSWindowStyleMask::Borderless,
                backing: NSBackingStoreType::Buffered,
                defer: false
            ]
        }
    }
}

fn to_ns_rect(rect: Rect) -> NSRect {
    NSRect::new(
        NSPoint::new(rect.x, rect.y),
        NSSize::new(rect.width, rect.height),
    )
}

fn from_ns_rect(rect: NSRect) -> Rect {
    Rect::new(rect.origin.x, rect.origin.y, rect.size.width, rect.size.height)
}

fn timing_function(easing: Easing) -> Option<Retained<AnyObject>> {
    let class = AnyClass::get(c"CAMediaTimingFunction")?;
    let name = NSString::from_str(match easing {
        Easing::EaseIn => "easeIn",
        Easing::EaseOut => "easeOut",
    });
    unsafe { msg_send![class, functionWithName: &*name] }
}

pub struct MacWindow {
    window: Retained<NSWindow>,
    serial: u64,
    events: Sender<HostEvent>,
}

impl HostWindow for MacWindow {
    fn animate_frame(&mut self, frame: Rect, duration: Duration, easing: Easing) {
        let target = to_ns_rect(frame);
        let secs = duration.as_secs_f64();
        let timing = timing_function(easing);
        let window = self.window.clone();

        let changes = RcBlock::new(move |context: *mut AnyObject| unsafe {
            if let Some(context) = context.as_ref() {
                let _: () = msg_send![context, setDuration: secs];
                if let Some(timing) = timing.as_deref() {
                    let _: () = msg_send![context, setTimingFunction: timing];
                }
            }
            let animator: Retained<AnyObject> = msg_send![&*window, animator];
            let _: () = msg_send![&*animator, setFrame: target, display: true];
        });

        let events = self.events.clone();
        let serial = self.serial;
        let completion = RcBlock::new(move || {
            let _ = events.try_send(HostEvent::ResizeCompleted { window: serial });
        });

        log::trace!(
            "Animating window {} to {}x{} over {:?}",
            self.serial,
            frame.width,
            frame.height,
            duration
        );
        unsafe {
            let _: () = msg_send![
                class!(NSAnimationContext),
                runAnimationGroup: &*changes,
                completionHandler: &*completion
            ];
        }
    }

    fn close(&mut self) {
        log::debug!("Closing notch window {}", self.serial);
        self.window.orderOut(None);
        self.window.close();
    }
}

pub struct MacWindowHost {
    mtm: MainThreadMarker,
    events: Sender<HostEvent>,
}

impl WindowHost for MacWindowHost {
    type Window = MacWindow;

    fn open_window(&mut self, frame: Rect, serial: u64) -> MacWindow {
        let window: Retained<NSWindow> =
            Retained::into_super(NotchWindow::new(self.mtm, to_ns_rect(frame)));

        // The controller keeps ownership; AppKit must not free it on close.
        unsafe { window.setReleasedWhenClosed(false) };
        window.setLevel(NOTCH_WINDOW_LEVEL);
        window.setCollectionBehavior(
            NSWindowCollectionBehavior::CanJoinAllSpaces
                | NSWindowCollectionBehavior::Stationary
                | NSWindowCollectionBehavior::FullScreenAuxiliary
                | NSWindowCollectionBehavior::IgnoresCycle,
        );
        window.setOpaque(false);
        window.setHasShadow(false);
        window.setBackgroundColor(Some(&NSColor::blackColor()));
        window.setExcludedFromWindowsMenu(true);
        window.setIgnoresMouseEvents(false);
        window.setTitle(&NSString::from_str("Notchify"));
        window.orderFrontRegardless();

        log::debug!(
            "Opened notch window {} at ({}, {}) size {}x{}",
            serial,
            frame.x,
            frame.y,
            frame.width,
            frame.height
        );

        MacWindow {
            window,
            serial,
            events: self.events.clone(),
        }
    }
}

pub struct MacPlatform {
    mtm: MainThreadMarker,
    app: Retained<NSApplication>,
    events_tx: Sender<HostEvent>,
    events_rx: Receiver<HostEvent>,
}

impl MacPlatform {
    pub fn new() -> Result<Self, PlatformError> {
        let mtm = MainThreadMarker::new().ok_or(PlatformError::NotMainThread)?;
        let app = NSApplication::sharedApplication(mtm);
        // Accessory policy: no dock icon, no menu bar
        app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);

        let (events_tx, events_rx) = async_channel::unbounded();
        Ok(Self {
            mtm,
            app,
            events_tx,
            events_rx,
        })
    }
}

impl Platform for MacPlatform {
    type Host = MacWindowHost;

    fn main_screen(&self) -> Option<Rect> {
        let screen = NSScreen::mainScreen(self.mtm)
            .or_else(|| NSScreen::screens(self.mtm).firstObject())?;
        Some(from_ns_rect(screen.frame()))
    }

    fn pointer_location(&self) -> Option<Point> {
        let location = NSEvent::mouseLocation();
        let point = Point::new(location.x, location.y);
        self.main_screen()
            .filter(|screen| screen.contains(point))
            .map(|_| point)
    }

    fn pump_events(&mut self, timeout: Duration) -> Vec<HostEvent> {
        let date = NSDate::dateWithTimeIntervalSinceNow(timeout.as_secs_f64());
        while let Some(event) = unsafe {
            self.app.nextEventMatchingMask_untilDate_inMode_dequeue(
                NSEventMask::Any,
                Some(&date),
                objc2_foundation::NSDefaultRunLoopMode,
                true,
            )
        } {
            self.app.sendEvent(&event);
            self.app.updateWindows();
        }

        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn window_host(&self) -> MacWindowHost {
        MacWindowHost {
            mtm: self.mtm,
            events: self.events_tx.clone(),
        }
    }
}

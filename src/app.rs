use std::sync::RwLockReadGuard;
use std::time::Duration;

use async_channel::Receiver;

use crate::config::{Config, ConfigWatcher, SharedConfig};
use crate::ipc::{self, IpcCommand, StatusSnapshot};
use crate::notch::{Clock, DeadlineScheduler, NotchController, Timings};
use crate::platform::{HostEvent, Platform, PlatformError};

/// Upper bound on how long one tick waits for native events.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

type Controller<P, C> = NotchController<<P as Platform>::Host, DeadlineScheduler<C>, C>;

pub struct App<P: Platform, C: Clock + Clone> {
    platform: P,
    controller: Controller<P, C>,
    clock: C,
    config: SharedConfig,
    config_watcher: Option<ConfigWatcher>,
    commands: Receiver<IpcCommand>,
    last_status: Option<StatusSnapshot>,
}

fn read_config(config: &SharedConfig) -> RwLockReadGuard<'_, Config> {
    match config.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn timings_from(config: &Config) -> Timings {
    config.timings.to_timings().unwrap_or_else(|e| {
        log::warn!("Invalid timings ({}), using defaults", e);
        Timings::default()
    })
}

impl<P: Platform, C: Clock + Clone> App<P, C> {
    pub fn new(
        platform: P,
        config: SharedConfig,
        commands: Receiver<IpcCommand>,
        clock: C,
    ) -> Result<Self, PlatformError> {
        let screen = platform.main_screen().ok_or(PlatformError::NoScreen)?;
        let (profile, timings) = {
            let cfg = read_config(&config);
            (cfg.profile(), timings_from(&cfg))
        };
        log::info!(
            "Screen {}x{} at ({}, {}), profile '{}'",
            screen.width,
            screen.height,
            screen.x,
            screen.y,
            profile.id
        );

        let controller = NotchController::new(
            platform.window_host(),
            DeadlineScheduler::with_clock(clock.clone()),
            clock.clone(),
            screen,
            profile,
            timings,
        );

        let mut app = Self {
            platform,
            controller,
            clock,
            config,
            config_watcher: None,
            commands,
            last_status: None,
        };
        app.publish_status();
        Ok(app)
    }

    pub fn with_config_watcher(mut self, watcher: ConfigWatcher) -> Self {
        self.config_watcher = Some(watcher);
        self
    }

    pub fn controller(&self) -> &Controller<P, C> {
        &self.controller
    }

    pub fn run(mut self) -> ! {
        log::info!("Entering event loop");
        loop {
            let now = self.clock.now();
            let timeout = self
                .controller
                .scheduler_mut()
                .time_until_next(now)
                .map_or(FRAME_INTERVAL, |due| due.min(FRAME_INTERVAL));
            self.tick(timeout);
        }
    }

    /// One pass of the loop: native events, pointer, timers, IPC, config.
    pub fn tick(&mut self, timeout: Duration) {
        for event in self.platform.pump_events(timeout) {
            match event {
                HostEvent::ResizeCompleted { window } => {
                    self.controller.resize_completed_for(window)
                }
            }
        }

        match self.platform.pointer_location() {
            Some(point) => self.controller.pointer_moved(point),
            None => self.controller.pointer_left_screen(),
        }

        let now = self.clock.now();
        let due = self.controller.scheduler_mut().take_due(now);
        for token in due {
            self.controller.timer_fired(token);
        }

        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command);
        }

        let reloaded = self
            .config_watcher
            .as_ref()
            .is_some_and(|watcher| watcher.check_and_reload());
        if reloaded {
            log::info!("Config reloaded");
            self.apply_config();
        }

        self.publish_status();
    }

    fn handle_command(&mut self, command: IpcCommand) {
        log::debug!("IPC command: {:?}", command);
        match command {
            IpcCommand::Toggle => self.controller.toggle(),
            IpcCommand::Expand => self.controller.expand(),
            IpcCommand::Collapse => self.controller.collapse(),
            IpcCommand::SetProfile(profile) => {
                if profile != *self.controller.profile() {
                    self.controller.change_profile(profile);
                }
            }
        }
    }

    /// Pushes the shared config's profile and timings into the controller.
    fn apply_config(&mut self) {
        let (profile, timings) = {
            let cfg = read_config(&self.config);
            (cfg.profile(), timings_from(&cfg))
        };
        self.controller.set_timings(timings);
        if profile != *self.controller.profile() {
            self.controller.change_profile(profile);
        }
    }

    fn publish_status(&mut self) {
        let status = StatusSnapshot {
            phase: self.controller.phase(),
            profile: self.controller.profile().id,
        };
        if self.last_status.as_ref() != Some(&status) {
            ipc::publish_status(status.clone());
            self.last_status = Some(status);
        }
    }
}

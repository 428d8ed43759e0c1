//! Playback commands sent to whichever player last reported a track.

use super::now_playing::{lock, MediaError, MediaSource, NowPlaying, NowPlayingState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Next,
    Previous,
}

impl PlaybackCommand {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "play" => Some(Self::Play),
            "pause" => Some(Self::Pause),
            "next" => Some(Self::Next),
            "previous" | "prev" => Some(Self::Previous),
            _ => None,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Next => "next track",
            Self::Previous => "previous track",
        }
    }

    fn script(&self, source: MediaSource) -> String {
        format!(
            "tell application \"{}\" to {}",
            source.app_name(),
            self.verb()
        )
    }
}

fn seek_script(source: MediaSource, secs: f64) -> String {
    // Spotify only accepts whole seconds.
    let position = match source {
        MediaSource::Spotify => format!("{}", secs.trunc() as u64),
        MediaSource::Music => format!("{}", secs),
    };
    format!(
        "tell application \"{}\"\n    try\n        set player position to {}\n    end try\nend tell",
        source.app_name(),
        position
    )
}

fn volume_script(volume: f32) -> String {
    format!("set volume output volume {}", (volume * 100.0).round() as u32)
}

impl NowPlaying {
    pub fn send(&self, command: PlaybackCommand) -> Result<(), MediaError> {
        let source = self.target();
        log::debug!("Media command {:?} -> {}", command, source.app_name());
        self.runner.run(&command.script(source))?;

        let playing = match command {
            PlaybackCommand::Play => Some(true),
            PlaybackCommand::Pause => Some(false),
            _ => None,
        };
        if let Some(playing) = playing {
            self.update_snapshot(|snapshot| snapshot.is_playing = playing);
        }
        Ok(())
    }

    pub fn play(&self) -> Result<(), MediaError> {
        self.send(PlaybackCommand::Play)
    }

    pub fn pause(&self) -> Result<(), MediaError> {
        self.send(PlaybackCommand::Pause)
    }

    pub fn toggle(&self) -> Result<(), MediaError> {
        let playing = self.state().snapshot().is_some_and(|s| s.is_playing);
        if playing {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn next(&self) -> Result<(), MediaError> {
        self.send(PlaybackCommand::Next)
    }

    pub fn previous(&self) -> Result<(), MediaError> {
        self.send(PlaybackCommand::Previous)
    }

    /// Seeks within the current track, clamped to its duration.
    /// Does nothing when no track is loaded.
    pub fn seek(&self, secs: f64) -> Result<(), MediaError> {
        let Some((source, duration)) = self
            .state()
            .snapshot()
            .map(|s| (s.source, s.duration_secs))
        else {
            log::debug!("Seek ignored, nothing loaded");
            return Ok(());
        };
        let target = if secs.is_finite() { secs } else { 0.0 };
        let clamped = target.clamp(0.0, duration.max(0.0));

        self.update_snapshot(|snapshot| snapshot.position_secs = clamped);
        self.runner.run(&seek_script(source, clamped))?;
        Ok(())
    }

    /// Sets the system output volume, clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f32) -> Result<(), MediaError> {
        let clamped = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        *lock(&self.volume) = clamped;
        self.runner.run(&volume_script(clamped))?;
        Ok(())
    }

    fn update_snapshot(&self, apply: impl FnOnce(&mut super::TrackSnapshot)) {
        let mut state = lock(&self.state);
        if let NowPlayingState::Active(snapshot) = &mut *state {
            apply(snapshot);
        }
    }
}

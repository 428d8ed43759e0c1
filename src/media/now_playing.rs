//! Now-playing information polled from Spotify and Music.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

const NO_DATA: &str = "NO_DATA";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to run osascript: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("script exited with {status}: {stderr}")]
    Script { status: i32, stderr: String },
    #[error("artwork request failed: {0}")]
    Artwork(#[from] reqwest::Error),
}

/// Runs an AppleScript source and returns its trimmed stdout.
pub trait ScriptRunner: Send + Sync {
    fn run(&self, script: &str) -> Result<String, MediaError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Osascript;

impl ScriptRunner for Osascript {
    fn run(&self, script: &str) -> Result<String, MediaError> {
        let output = Command::new("osascript").args(["-e", script]).output()?;
        if !output.status.success() {
            return Err(MediaError::Script {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Fetches artwork bytes for a URL.
pub trait ArtworkFetcher: Send {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError>;
}

pub struct HttpArtwork {
    client: reqwest::blocking::Client,
}

impl HttpArtwork {
    pub fn new() -> Result<Self, MediaError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client })
    }
}

impl ArtworkFetcher for HttpArtwork {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        Ok(bytes.to_vec())
    }
}

/// Which artwork an entry holds.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArtworkKey {
    Url(String),
    Track {
        title: String,
        artist: String,
        album: String,
    },
}

const MUSIC_ARTWORK_SCRIPT: &str = r#"tell application "Music"
    try
        return raw data of artwork 1 of current track
    on error
        return "missing value"
    end try
end tell"#;

/// Artwork for the current track only. A failed lookup is remembered as
/// well, so a broken URL is requested once per track rather than once per
/// poll.
pub struct ArtworkCache {
    fetcher: Option<Box<dyn ArtworkFetcher>>,
    current: Option<(ArtworkKey, Option<Arc<Vec<u8>>>)>,
}

impl ArtworkCache {
    pub fn new(fetcher: Option<Box<dyn ArtworkFetcher>>) -> Self {
        Self {
            fetcher,
            current: None,
        }
    }

    /// Artwork downloaded from `url`.
    pub fn get(&mut self, url: &str) -> Option<Arc<Vec<u8>>> {
        if url.is_empty() || url == "missing value" {
            return None;
        }
        let key = ArtworkKey::Url(url.to_string());
        if let Some(hit) = self.cached(&key) {
            return hit;
        }
        let result = self.fetcher.as_ref()?.fetch(url);
        self.remember(key, result)
    }

    /// Artwork embedded in the track Music is playing, read through
    /// AppleScript as a `«data ...»` literal.
    pub fn music(
        &mut self,
        runner: &dyn ScriptRunner,
        title: &str,
        artist: &str,
        album: &str,
    ) -> Option<Arc<Vec<u8>>> {
        let key = ArtworkKey::Track {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
        };
        if let Some(hit) = self.cached(&key) {
            return hit;
        }
        let result = runner
            .run(MUSIC_ARTWORK_SCRIPT)
            .map(|output| parse_artwork_data(&output).unwrap_or_default());
        self.remember(key, result)
    }

    fn cached(&self, key: &ArtworkKey) -> Option<Option<Arc<Vec<u8>>>> {
        match &self.current {
            Some((current, entry)) if current == key => Some(entry.clone()),
            _ => None,
        }
    }

    fn remember(
        &mut self,
        key: ArtworkKey,
        result: Result<Vec<u8>, MediaError>,
    ) -> Option<Arc<Vec<u8>>> {
        let artwork = match result {
            Ok(bytes) if !bytes.is_empty() => Some(Arc::new(bytes)),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Artwork lookup for {:?} failed: {}", key, e);
                None
            }
        };
        self.current = Some((key, artwork.clone()));
        artwork
    }
}

/// Decodes an AppleScript `«data TYPE0123ABCD»` literal. The four characters
/// after `data ` name the type; the rest is hex.
fn parse_artwork_data(output: &str) -> Option<Vec<u8>> {
    let body = output.trim().strip_prefix("«data ")?.strip_suffix('»')?;
    let hex = body.get(4..)?;
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaSource {
    Spotify,
    Music,
}

impl MediaSource {
    /// Polling order.
    pub const ALL: [MediaSource; 2] = [MediaSource::Spotify, MediaSource::Music];

    pub fn app_name(&self) -> &'static str {
        match self {
            MediaSource::Spotify => "Spotify",
            MediaSource::Music => "Music",
        }
    }

    fn status_script(&self) -> String {
        let artwork = match self {
            MediaSource::Spotify => " & \"|\" & (artwork url of current track)",
            MediaSource::Music => "",
        };
        format!(
            r#"tell application "System Events"
    set isRunning to (name of processes) contains "{app}"
end tell
if isRunning then
    tell application "{app}"
        if player state is playing or player state is paused then
            return (name of current track) & "|" & (artist of current track) & "|" & (album of current track) & "|" & (duration of current track) & "|" & (player position) & "|" & (player state is playing){artwork}
        end if
    end tell
end if
return "{no_data}""#,
            app = self.app_name(),
            artwork = artwork,
            no_data = NO_DATA,
        )
    }

    fn field_count(&self) -> usize {
        match self {
            MediaSource::Spotify => 7,
            MediaSource::Music => 6,
        }
    }

    /// Parses one status line. Spotify reports duration in milliseconds.
    fn parse_status(&self, line: &str) -> Option<ParsedTrack> {
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() != self.field_count() {
            log::debug!(
                "{} status has {} fields, expected {}",
                self.app_name(),
                fields.len(),
                self.field_count()
            );
            return None;
        }
        let duration = parse_number(fields[3]);
        let duration_secs = match self {
            MediaSource::Spotify => duration / 1000.0,
            MediaSource::Music => duration,
        };
        Some(ParsedTrack {
            title: fields[0].to_string(),
            artist: fields[1].to_string(),
            album: fields[2].to_string(),
            duration_secs,
            position_secs: parse_number(fields[4]),
            is_playing: fields[5].trim().eq_ignore_ascii_case("true"),
            artwork_url: fields.get(6).map(|s| s.trim().to_string()),
        })
    }
}

/// AppleScript prints reals with the locale's decimal separator.
fn parse_number(field: &str) -> f64 {
    field
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

struct ParsedTrack {
    title: String,
    artist: String,
    album: String,
    duration_secs: f64,
    position_secs: f64,
    is_playing: bool,
    artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    #[serde(skip)]
    pub artwork: Option<Arc<Vec<u8>>>,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub is_playing: bool,
    pub source: MediaSource,
}

impl TrackSnapshot {
    /// Playback progress in `[0, 1]`, zero when the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
    }

    pub fn formatted_position(&self) -> String {
        format_time(self.position_secs)
    }

    pub fn formatted_duration(&self) -> String {
        format_time(self.duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NowPlayingState {
    Unavailable { reason: String },
    Idle,
    Active(TrackSnapshot),
}

impl NowPlayingState {
    pub fn snapshot(&self) -> Option<&TrackSnapshot> {
        match self {
            NowPlayingState::Active(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Formats seconds as `m:ss`.
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Asks each source in turn. The first one with a loaded track wins.
/// Script failures only make the result unavailable when no source answered.
pub fn poll_sources(runner: &dyn ScriptRunner, artwork: &mut ArtworkCache) -> NowPlayingState {
    let mut last_error = None;
    let mut answered = false;

    for source in MediaSource::ALL {
        let output = match runner.run(&source.status_script()) {
            Ok(output) => output,
            Err(e) => {
                log::debug!("{} status script failed: {}", source.app_name(), e);
                last_error = Some(e);
                continue;
            }
        };
        answered = true;
        if output.is_empty() || output == NO_DATA {
            continue;
        }
        let Some(track) = source.parse_status(&output) else {
            continue;
        };
        let artwork_bytes = match source {
            MediaSource::Spotify => track.artwork_url.as_deref().and_then(|url| artwork.get(url)),
            MediaSource::Music => artwork.music(runner, &track.title, &track.artist, &track.album),
        };
        return NowPlayingState::Active(TrackSnapshot {
            title: track.title,
            artist: track.artist,
            album: track.album,
            artwork_url: track.artwork_url.filter(|u| !u.is_empty()),
            artwork: artwork_bytes,
            position_secs: track.position_secs,
            duration_secs: track.duration_secs,
            is_playing: track.is_playing,
            source,
        });
    }

    match (answered, last_error) {
        (false, Some(e)) => NowPlayingState::Unavailable {
            reason: e.to_string(),
        },
        _ => NowPlayingState::Idle,
    }
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Shared now-playing state, refreshed by a background thread.
pub struct NowPlaying {
    pub(super) runner: Arc<dyn ScriptRunner>,
    pub(super) state: Arc<Mutex<NowPlayingState>>,
    /// Source that commands go to: the last one that reported a track.
    pub(super) target: Arc<Mutex<MediaSource>>,
    pub(super) volume: Mutex<f32>,
    artwork: Arc<Mutex<ArtworkCache>>,
    stop: Arc<AtomicBool>,
}

impl NowPlaying {
    /// Creates a provider without a polling thread. Call `refresh` to update.
    pub fn new(runner: Arc<dyn ScriptRunner>, artwork: ArtworkCache) -> Self {
        Self {
            runner,
            state: Arc::new(Mutex::new(NowPlayingState::Idle)),
            target: Arc::new(Mutex::new(MediaSource::Spotify)),
            volume: Mutex::new(0.5),
            artwork: Arc::new(Mutex::new(artwork)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a provider that polls every `interval` until dropped.
    pub fn spawn(runner: Arc<dyn ScriptRunner>, artwork: ArtworkCache, interval: Duration) -> Self {
        let provider = Self::new(runner, artwork);

        let runner = Arc::clone(&provider.runner);
        let state = Arc::clone(&provider.state);
        let target = Arc::clone(&provider.target);
        let artwork = Arc::clone(&provider.artwork);
        let stop = Arc::clone(&provider.stop);
        std::thread::spawn(move || {
            log::debug!("Now-playing poller started ({:?})", interval);
            while !stop.load(Ordering::Relaxed) {
                let next = poll_sources(runner.as_ref(), &mut lock(&artwork));
                store(&state, &target, next);
                std::thread::sleep(interval);
            }
            log::debug!("Now-playing poller stopped");
        });

        provider
    }

    /// Polls once on the calling thread. Returns true if the state changed.
    pub fn refresh(&self) -> bool {
        let next = poll_sources(self.runner.as_ref(), &mut lock(&self.artwork));
        store(&self.state, &self.target, next)
    }

    pub fn state(&self) -> NowPlayingState {
        lock(&self.state).clone()
    }

    pub fn target(&self) -> MediaSource {
        *lock(&self.target)
    }

    pub fn volume(&self) -> f32 {
        *lock(&self.volume)
    }
}

impl Drop for NowPlaying {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn store(
    state: &Mutex<NowPlayingState>,
    target: &Mutex<MediaSource>,
    next: NowPlayingState,
) -> bool {
    if let NowPlayingState::Active(snapshot) = &next {
        *lock(target) = snapshot.source;
    }
    let mut current = lock(state);
    if *current == next {
        return false;
    }
    log::trace!("Now playing: {:?}", next);
    *current = next;
    true
}

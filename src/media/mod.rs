//! Media playback: now-playing polling and player control.

pub mod control;
pub mod now_playing;

pub use control::PlaybackCommand;
pub use now_playing::{
    format_time, ArtworkCache, ArtworkFetcher, HttpArtwork, MediaError, MediaSource, NowPlaying,
    NowPlayingState, Osascript, ScriptRunner, TrackSnapshot,
};

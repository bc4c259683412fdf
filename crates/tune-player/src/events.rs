//! Typed events exchanged between controllers.
//!
//! Controllers never call each other.  Each operation returns the events it
//! produced and `PlayerCore` routes them to their consumers.

use std::time::Duration;

use crate::notice::{Severity, DEFAULT_NOTICE};
use crate::song::Song;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playback position moved; `fraction` is in [0, 1].
    ProgressChanged { fraction: f64 },
    /// Track length became known, in seconds.
    DurationKnown(f64),
    /// The current track played to its end.
    TrackEnded,
    /// `play()` was called with nothing loaded.
    AdvanceRequested,
    /// A song was picked for playback (list click, Enter, search result).
    SongSelected(Song),
    PausePlayback,
    ResumePlayback,
    /// Jump to a progress fraction of the current track.
    SeekTo(f64),
    /// Short audible feedback for a pointer interaction.
    InteractionTone,
    Notice {
        text: String,
        severity: Severity,
        duration: Duration,
    },
    PauseImage,
    ResumeImage,
    VolumeChanged(u8),
}

impl PlayerEvent {
    pub fn info(text: impl Into<String>) -> Self {
        PlayerEvent::Notice {
            text: text.into(),
            severity: Severity::Info,
            duration: DEFAULT_NOTICE,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        PlayerEvent::Notice {
            text: text.into(),
            severity: Severity::Error,
            duration: DEFAULT_NOTICE,
        }
    }
}

//! Playback engine: wraps the media backend and mirrors its state.
//!
//! Every operation returns the `PlayerEvent`s it produced.  Backend failures
//! are logged and never stop the player.

use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tune_proto::SongId;

use crate::cooldown::{Cooldown, Debounce};
use crate::events::PlayerEvent;
use crate::media::{MediaBackend, MediaEvent};
use crate::song::Song;

/// Delay before playback resumes after the last scrub of a burst.
const SCRUB_RESUME_DELAY: Duration = Duration::from_millis(100);
/// Minimum gap between confirmation tones while changing volume.
const VOLUME_TONE_GAP: Duration = Duration::from_millis(150);
/// Minimum gap between tones while dragging the seek bar.
const SEEK_TONE_GAP: Duration = Duration::from_millis(60);

pub struct PlaybackEngine<M> {
    media: M,
    current: Option<SongId>,
    source: Option<String>,
    paused: bool,
    /// Duration is known for the loaded source.
    ready: bool,
    time: f64,
    duration: Option<f64>,
    volume: u8,
    scrub_resume: Debounce,
    volume_tone: Cooldown,
    seek_tone: Cooldown,
}

impl<M: MediaBackend> PlaybackEngine<M> {
    pub fn new(media: M, volume: u8) -> Self {
        Self {
            media,
            current: None,
            source: None,
            paused: true,
            ready: false,
            time: 0.0,
            duration: None,
            volume: volume.min(100),
            scrub_resume: Debounce::new(SCRUB_RESUME_DELAY),
            volume_tone: Cooldown::new(VOLUME_TONE_GAP),
            seek_tone: Cooldown::new(SEEK_TONE_GAP),
        }
    }

    #[cfg(test)]
    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn current(&self) -> Option<SongId> {
        self.current
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn current_time(&self) -> f64 {
        self.time
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Position as a fraction of the track, 0.0 while the duration is unknown.
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(d) if d > 0.0 => (self.time / d).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    fn log_failure(&self, what: &str, result: anyhow::Result<()>) {
        if let Err(e) = result {
            warn!("playback: {} failed: {:#}", what, e);
        }
    }

    /// Push the persisted volume to a freshly started backend.
    pub async fn apply_volume(&self) {
        let r = self.media.set_volume(self.volume).await;
        self.log_failure("set volume", r);
    }

    /// Load `song` from `url`.  Playback stays paused until `play`.
    pub async fn set_song(&mut self, song: &Song, url: String) -> Vec<PlayerEvent> {
        debug!("playback: loading song {} from {}", song.id, url);
        let r = self.media.load(&url).await;
        self.log_failure("load", r);
        self.current = Some(song.id);
        self.source = Some(url);
        self.paused = true;
        self.ready = false;
        self.time = 0.0;
        self.duration = None;
        self.scrub_resume.cancel();
        vec![
            PlayerEvent::PauseImage,
            PlayerEvent::ProgressChanged { fraction: 0.0 },
        ]
    }

    pub async fn play(&mut self) -> Vec<PlayerEvent> {
        if self.source.is_none() {
            return vec![PlayerEvent::AdvanceRequested];
        }
        let r = self.media.set_paused(false).await;
        self.log_failure("play", r);
        self.paused = false;
        if self.ready {
            vec![PlayerEvent::ResumeImage]
        } else {
            Vec::new()
        }
    }

    pub async fn pause(&mut self) -> Vec<PlayerEvent> {
        if self.source.is_none() {
            return Vec::new();
        }
        let r = self.media.set_paused(true).await;
        self.log_failure("pause", r);
        self.paused = true;
        vec![PlayerEvent::PauseImage]
    }

    pub async fn toggle(&mut self) -> Vec<PlayerEvent> {
        if self.paused {
            self.play().await
        } else {
            self.pause().await
        }
    }

    /// Start the loaded track over from the beginning.
    pub async fn restart(&mut self) -> Vec<PlayerEvent> {
        let Some(url) = self.source.clone() else {
            return Vec::new();
        };
        let r = self.media.load(&url).await;
        self.log_failure("reload", r);
        self.time = 0.0;
        let mut events = vec![PlayerEvent::ProgressChanged { fraction: 0.0 }];
        events.extend(self.play().await);
        events
    }

    /// Jump to `fraction` of the track, clamped to [0, 1].  No-op while the
    /// duration is unknown.
    pub async fn set_progress_fraction(&mut self, fraction: f64) -> Vec<PlayerEvent> {
        let Some(duration) = self.duration else {
            return Vec::new();
        };
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.time = fraction * duration;
        let r = self.media.seek(self.time).await;
        self.log_failure("seek", r);
        vec![PlayerEvent::ProgressChanged { fraction }]
    }

    /// Pause, move by `delta` seconds, and resume once scrubbing settles.
    pub async fn scrub(&mut self, delta: f64, now: Instant) -> Vec<PlayerEvent> {
        if self.source.is_none() {
            return Vec::new();
        }
        let mut events = Vec::new();
        if !self.paused {
            events.extend(self.pause().await);
        }
        let upper = self.duration.unwrap_or(f64::MAX);
        self.time = (self.time + delta).clamp(0.0, upper);
        let r = self.media.seek(self.time).await;
        self.log_failure("scrub", r);
        self.scrub_resume.arm(now);
        events.push(PlayerEvent::ProgressChanged {
            fraction: self.progress(),
        });
        events
    }

    pub async fn tick(&mut self, now: Instant) -> Vec<PlayerEvent> {
        if self.scrub_resume.fire_if_due(now) {
            return self.play().await;
        }
        Vec::new()
    }

    /// Set the volume, clamped to 0..=100.
    pub async fn set_volume(&mut self, volume: i32) -> Vec<PlayerEvent> {
        let volume = volume.clamp(0, 100) as u8;
        self.volume = volume;
        let r = self.media.set_volume(volume).await;
        self.log_failure("set volume", r);
        vec![PlayerEvent::VolumeChanged(volume)]
    }

    /// Step the volume: by 1 at the quiet end (5 and below), by 5 elsewhere.
    pub async fn change_volume(&mut self, increase: bool, now: Instant) -> Vec<PlayerEvent> {
        let v = i32::from(self.volume);
        let target = match (increase, v) {
            (true, v) if v < 5 => v + 1,
            (true, v) => v + 5,
            (false, v) if v <= 5 => v - 1,
            (false, v) => v - 5,
        };
        let mut events = self.set_volume(target).await;
        if self.volume_tone.try_acquire(now) {
            let r = self.media.play_tone(self.volume).await;
            self.log_failure("tone", r);
        }
        events.push(PlayerEvent::info(format!("{}%", self.volume)));
        events
    }

    /// Seek-drag feedback beep, rate-limited.
    pub async fn play_interaction_tone(&mut self, now: Instant) {
        if self.seek_tone.try_acquire(now) {
            let r = self.media.play_tone(self.volume).await;
            self.log_failure("tone", r);
        }
    }

    pub fn handle_media(&mut self, event: MediaEvent) -> Vec<PlayerEvent> {
        match event {
            MediaEvent::TimeUpdate(t) => {
                self.time = t.max(0.0);
                vec![PlayerEvent::ProgressChanged {
                    fraction: self.progress(),
                }]
            }
            MediaEvent::DurationKnown(d) if d > 0.0 => {
                self.duration = Some(d);
                let first = !self.ready;
                self.ready = true;
                let mut events = vec![PlayerEvent::DurationKnown(d)];
                if first && !self.paused {
                    events.push(PlayerEvent::ResumeImage);
                }
                events
            }
            MediaEvent::DurationKnown(_) => Vec::new(),
            MediaEvent::Paused(p) => {
                self.paused = p;
                Vec::new()
            }
            MediaEvent::Ended => {
                self.paused = true;
                vec![PlayerEvent::PauseImage, PlayerEvent::TrackEnded]
            }
        }
    }
}

/// `m:ss`, seconds zero-padded.
pub fn format_minutes(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "0:00".to_string();
    }
    let s = secs as u64;
    format!("{}:{:02}", s / 60, s % 60)
}

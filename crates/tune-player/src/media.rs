//! The media element the playback engine drives.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_DURATION, OBS_PAUSE, OBS_TIME_POS};

/// Observations pushed by the media backend.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    TimeUpdate(f64),
    DurationKnown(f64),
    Paused(bool),
    /// The loaded track played to its end.
    Ended,
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Replace the current source.  Playback starts paused.
    async fn load(&self, url: &str) -> anyhow::Result<()>;
    async fn set_paused(&self, paused: bool) -> anyhow::Result<()>;
    async fn seek(&self, secs: f64) -> anyhow::Result<()>;
    async fn set_volume(&self, volume: u8) -> anyhow::Result<()>;
    /// Short confirmation beep at `volume`.
    async fn play_tone(&self, volume: u8) -> anyhow::Result<()>;
}

/// lavfi source for the confirmation beep.
const TONE_SOURCE: &str = "av://lavfi:sine=frequency=880:duration=0.06";

/// Two mpv processes: one for songs, one for the tone.
pub struct MpvBackend {
    song: MpvHandle,
    tone: MpvHandle,
    _drivers: (MpvDriver, MpvDriver),
}

impl MpvBackend {
    /// Spawn both players.  Song observations arrive on `events`.
    pub async fn start(volume: u8, events: mpsc::Sender<MediaEvent>) -> anyhow::Result<Self> {
        let (raw_tx, mut raw_rx) = mpsc::channel::<MpvEvent>(256);
        let mut song_driver = MpvDriver::new("song");
        let song = song_driver.spawn_and_connect(volume, raw_tx).await?;
        song.observe_playback().await;

        tokio::spawn(async move {
            while let Some(evt) = raw_rx.recv().await {
                if let Some(media) = translate(&evt) {
                    if events.send(media).await.is_err() {
                        break;
                    }
                }
            }
            debug!("mpv event forwarder exiting");
        });

        // The tone player's events are of no interest; its receiver is dropped.
        let (tone_tx, _) = mpsc::channel::<MpvEvent>(1);
        let mut tone_driver = MpvDriver::new("tone");
        let tone = tone_driver.spawn_and_connect(volume, tone_tx).await?;

        info!("media: song and tone players ready");
        Ok(Self {
            song,
            tone,
            _drivers: (song_driver, tone_driver),
        })
    }
}

#[async_trait]
impl MediaBackend for MpvBackend {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        self.song.set_pause(true).await?;
        self.song.load(url).await
    }

    async fn set_paused(&self, paused: bool) -> anyhow::Result<()> {
        self.song.set_pause(paused).await
    }

    async fn seek(&self, secs: f64) -> anyhow::Result<()> {
        self.song.seek_to(secs).await
    }

    async fn set_volume(&self, volume: u8) -> anyhow::Result<()> {
        self.song.set_volume(volume).await
    }

    async fn play_tone(&self, volume: u8) -> anyhow::Result<()> {
        self.tone.set_volume(volume).await?;
        self.tone.load(TONE_SOURCE).await
    }
}

/// Map a raw mpv event to the observations the engine cares about.
pub fn translate(evt: &MpvEvent) -> Option<MediaEvent> {
    if let Some((id, data)) = evt.as_property_change() {
        return match id {
            OBS_TIME_POS => data.as_f64().map(MediaEvent::TimeUpdate),
            OBS_DURATION => data.as_f64().map(MediaEvent::DurationKnown),
            OBS_PAUSE => data.as_bool().map(MediaEvent::Paused),
            _ => None,
        };
    }
    match evt.event_name() {
        // "stop" (replaced by another loadfile) and errors are not track ends.
        Some("end-file") if evt.raw.get("reason").and_then(|r| r.as_str()) == Some("eof") => {
            Some(MediaEvent::Ended)
        }
        _ => None,
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory media backend that records every call.

    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Load(String),
        Paused(bool),
        Seek(f64),
        Volume(u8),
        Tone(u8),
    }

    #[derive(Default)]
    pub struct RecordingBackend {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingBackend {
        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        pub fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }

        pub fn tones(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, Call::Tone(_)))
                .count()
        }
    }

    #[async_trait]
    impl MediaBackend for RecordingBackend {
        async fn load(&self, url: &str) -> anyhow::Result<()> {
            self.push(Call::Load(url.to_string()));
            Ok(())
        }

        async fn set_paused(&self, paused: bool) -> anyhow::Result<()> {
            self.push(Call::Paused(paused));
            Ok(())
        }

        async fn seek(&self, secs: f64) -> anyhow::Result<()> {
            self.push(Call::Seek(secs));
            Ok(())
        }

        async fn set_volume(&self, volume: u8) -> anyhow::Result<()> {
            self.push(Call::Volume(volume));
            Ok(())
        }

        async fn play_tone(&self, volume: u8) -> anyhow::Result<()> {
            self.push(Call::Tone(volume));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evt(raw: serde_json::Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn test_translate_observations() {
        assert_eq!(
            translate(&evt(json!({"event":"property-change","id":OBS_TIME_POS,"data":3.5}))),
            Some(MediaEvent::TimeUpdate(3.5))
        );
        assert_eq!(
            translate(&evt(json!({"event":"property-change","id":OBS_DURATION,"data":200.0}))),
            Some(MediaEvent::DurationKnown(200.0))
        );
        assert_eq!(
            translate(&evt(json!({"event":"property-change","id":OBS_PAUSE,"data":true}))),
            Some(MediaEvent::Paused(true))
        );
        // time-pos is null while nothing is loaded
        assert_eq!(
            translate(&evt(json!({"event":"property-change","id":OBS_TIME_POS,"data":null}))),
            None
        );
    }

    #[test]
    fn test_only_eof_ends_a_track() {
        assert_eq!(
            translate(&evt(json!({"event":"end-file","reason":"eof"}))),
            Some(MediaEvent::Ended)
        );
        assert_eq!(translate(&evt(json!({"event":"end-file","reason":"stop"}))), None);
        assert_eq!(translate(&evt(json!({"event":"file-loaded"}))), None);
    }
}

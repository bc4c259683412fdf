//! Seek bar interaction: pointer drag, hover enlargement, marker visuals, and
//! the marker-upload notice timing.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tune_proto::SongId;

use crate::cooldown::{Cooldown, Debounce};
use crate::events::PlayerEvent;
use crate::notice::{Severity, DEFAULT_NOTICE};
use crate::playback::format_minutes;

/// At most one drag update per this much event time.
const DRAG_UPDATE_GAP: Duration = Duration::from_millis(4);
/// Horizontal travel, in columns, that earns another feedback tone.
const TONE_TRAVEL: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekState {
    pub shrunken: bool,
    pub mouse_over: bool,
    pub drag_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerVisual {
    pub id: u64,
    pub fraction: f64,
}

pub struct SeekController {
    state: SeekState,
    /// Usable bar width in columns.
    width: u16,
    progress: f64,
    duration: Option<f64>,
    /// Time shown next to the pointer while dragging.
    readout: Option<String>,
    markers: Vec<MarkerVisual>,
    next_marker: u64,
    drag_gate: Cooldown,
    last_x: f64,
    travel: f64,
}

impl SeekController {
    pub fn new() -> Self {
        Self {
            state: SeekState {
                shrunken: true,
                mouse_over: false,
                drag_active: false,
            },
            width: 0,
            progress: 0.0,
            duration: None,
            readout: None,
            markers: Vec::new(),
            next_marker: 1,
            drag_gate: Cooldown::new(DRAG_UPDATE_GAP),
            last_x: 0.0,
            travel: 0.0,
        }
    }

    pub fn state(&self) -> SeekState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn readout(&self) -> Option<&str> {
        self.readout.as_deref()
    }

    pub fn duration_text(&self) -> String {
        self.duration.map(format_minutes).unwrap_or_default()
    }

    pub fn markers(&self) -> &[MarkerVisual] {
        &self.markers
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = width;
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = Some(duration);
    }

    /// New track: empty bar, no markers, unknown duration.
    pub fn reset_for_song(&mut self) {
        self.progress = 0.0;
        self.duration = None;
        self.readout = None;
        self.markers.clear();
    }

    /// Follow playback, except while the user is dragging.
    pub fn sync_progress(&mut self, fraction: f64) {
        if !self.state.drag_active {
            self.progress = fraction.clamp(0.0, 1.0);
        }
    }

    fn fraction_at(&self, x: u16) -> f64 {
        if self.width <= 1 {
            return 0.0;
        }
        (f64::from(x) / f64::from(self.width - 1)).clamp(0.0, 1.0)
    }

    fn update(&mut self, x: u16) -> Vec<PlayerEvent> {
        let fraction = self.fraction_at(x);
        self.progress = fraction;
        self.readout = self.duration.map(|d| format_minutes(d * fraction));

        let mut events = vec![PlayerEvent::SeekTo(fraction)];
        let x = f64::from(x);
        self.travel += (x - self.last_x).abs();
        self.last_x = x;
        if self.travel > TONE_TRAVEL {
            self.travel = 0.0;
            events.push(PlayerEvent::InteractionTone);
        }
        events
    }

    pub fn pointer_down(&mut self, x: u16, now: Instant) -> Vec<PlayerEvent> {
        self.state.drag_active = true;
        self.state.shrunken = false;
        self.last_x = f64::from(x);
        self.travel = 0.0;
        self.drag_gate.reset();
        self.drag_gate.try_acquire(now);
        let mut events = vec![PlayerEvent::PausePlayback];
        events.extend(self.update(x));
        events
    }

    pub fn pointer_move(&mut self, x: u16, now: Instant) -> Vec<PlayerEvent> {
        if !self.state.drag_active || !self.drag_gate.try_acquire(now) {
            return Vec::new();
        }
        self.update(x)
    }

    pub fn pointer_up(&mut self, x: u16) -> Vec<PlayerEvent> {
        if !self.state.drag_active {
            return Vec::new();
        }
        let mut events = self.update(x);
        self.state.drag_active = false;
        self.readout = None;
        if !self.state.mouse_over {
            self.state.shrunken = true;
        }
        events.push(PlayerEvent::ResumePlayback);
        events
    }

    /// Pointer entered or left the bar.  Leaving collapses it unless a drag
    /// is in progress or playback is paused.
    pub fn hover(&mut self, over: bool, paused: bool) {
        self.state.mouse_over = over;
        if over {
            self.state.shrunken = false;
        } else if !self.state.drag_active && !paused {
            self.state.shrunken = true;
        }
    }

    /// Replace visuals with the song's stored markers.
    pub fn show_markers(&mut self, fractions: &[f64]) {
        self.markers.clear();
        for &f in fractions {
            self.add_marker_visual(f);
        }
    }

    pub fn add_marker_visual(&mut self, fraction: f64) -> u64 {
        let id = self.next_marker;
        self.next_marker += 1;
        self.markers.push(MarkerVisual {
            id,
            fraction: fraction.clamp(0.0, 1.0),
        });
        id
    }

    pub fn remove_marker_visual(&mut self, id: u64) {
        self.markers.retain(|m| m.id != id);
    }

    pub fn clear_marker_visuals(&mut self) {
        self.markers.clear();
    }
}

impl Default for SeekController {
    fn default() -> Self {
        Self::new()
    }
}

/// Round trips shorter than this show no success notice at all.
const UPLOAD_NOTICE_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerJob {
    /// Added at `fraction`, shown optimistically as visual `visual`.
    Add { visual: u64, fraction: f64 },
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadTicket(pub u64);

/// Marker uploads in flight and the delayed success notice.
pub struct MarkerUploads {
    in_flight: HashMap<u64, (SongId, MarkerJob)>,
    next_ticket: u64,
    notice: Debounce,
    notice_text: &'static str,
}

impl MarkerUploads {
    pub fn new() -> Self {
        Self {
            in_flight: HashMap::new(),
            next_ticket: 1,
            notice: Debounce::new(UPLOAD_NOTICE_DELAY),
            notice_text: "",
        }
    }

    pub fn begin(&mut self, song: SongId, job: MarkerJob, now: Instant) -> UploadTicket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.insert(ticket, (song, job));
        self.notice_text = match job {
            MarkerJob::Add { .. } => "Marked",
            MarkerJob::Clear => "Cleared",
        };
        self.notice.arm(now);
        UploadTicket(ticket)
    }

    /// Forget `ticket`.  A failure cancels the pending success notice.
    pub fn finish(&mut self, ticket: UploadTicket, ok: bool) -> Option<(SongId, MarkerJob)> {
        if !ok {
            self.notice.cancel();
        }
        self.in_flight.remove(&ticket.0)
    }

    pub fn tick(&mut self, now: Instant) -> Vec<PlayerEvent> {
        if self.notice.fire_if_due(now) {
            return vec![PlayerEvent::Notice {
                text: self.notice_text.to_string(),
                severity: Severity::Success,
                duration: DEFAULT_NOTICE,
            }];
        }
        Vec::new()
    }
}

impl Default for MarkerUploads {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn bar() -> SeekController {
        let mut s = SeekController::new();
        s.set_width(101);
        s.set_duration(200.0);
        s
    }

    fn tones(events: &[PlayerEvent]) -> usize {
        events
            .iter()
            .filter(|e| **e == PlayerEvent::InteractionTone)
            .count()
    }

    #[test]
    fn test_drag_pauses_seeks_and_resumes() {
        let t0 = Instant::now();
        let mut s = bar();
        s.hover(true, false);

        let down = s.pointer_down(50, t0);
        assert_eq!(down[0], PlayerEvent::PausePlayback);
        assert!(down.contains(&PlayerEvent::SeekTo(0.5)));
        assert_eq!(s.readout(), Some("1:40"));

        let up = s.pointer_up(25);
        assert!(up.contains(&PlayerEvent::SeekTo(0.25)));
        assert_eq!(up.last(), Some(&PlayerEvent::ResumePlayback));
        assert!(!s.state().drag_active);
        // Still hovering: stays enlarged.
        assert!(!s.state().shrunken);
        assert!(s.readout().is_none());
    }

    #[test]
    fn test_moves_are_rate_limited_and_ignored_without_drag() {
        let t0 = Instant::now();
        let mut s = bar();
        assert!(s.pointer_move(10, t0).is_empty());

        s.pointer_down(10, t0);
        assert!(s.pointer_move(11, t0 + 2 * MS).is_empty());
        assert_eq!(s.pointer_move(12, t0 + 4 * MS), vec![PlayerEvent::SeekTo(0.12)]);
    }

    #[test]
    fn test_tone_needs_cumulative_travel() {
        let t0 = Instant::now();
        let mut s = bar();
        assert_eq!(tones(&s.pointer_down(10, t0)), 0);
        assert_eq!(tones(&s.pointer_move(11, t0 + 5 * MS)), 0);
        assert_eq!(tones(&s.pointer_move(12, t0 + 10 * MS)), 0);
        // 3 columns travelled since the last tone.
        assert_eq!(tones(&s.pointer_move(13, t0 + 15 * MS)), 1);
        assert_eq!(tones(&s.pointer_move(14, t0 + 20 * MS)), 0);
    }

    #[test]
    fn test_progress_sync_is_ignored_while_dragging() {
        let t0 = Instant::now();
        let mut s = bar();
        s.pointer_down(80, t0);
        s.sync_progress(0.1);
        assert_eq!(s.progress(), 0.8);
        s.pointer_up(80);
        s.sync_progress(0.1);
        assert_eq!(s.progress(), 0.1);
    }

    #[test]
    fn test_leave_keeps_enlarged_when_paused_or_dragging() {
        let t0 = Instant::now();
        let mut s = bar();
        s.hover(true, false);
        s.hover(false, true);
        assert!(!s.state().shrunken);

        s.hover(true, false);
        s.pointer_down(5, t0);
        s.hover(false, false);
        assert!(!s.state().shrunken);
        s.pointer_up(5);
        assert!(s.state().shrunken);
    }

    #[test]
    fn test_marker_visuals() {
        let mut s = bar();
        s.show_markers(&[0.1, 0.9]);
        let id = s.add_marker_visual(0.5);
        assert_eq!(s.markers().len(), 3);
        s.remove_marker_visual(id);
        let fractions: Vec<f64> = s.markers().iter().map(|m| m.fraction).collect();
        assert_eq!(fractions, vec![0.1, 0.9]);
        s.reset_for_song();
        assert!(s.markers().is_empty());
    }

    #[test]
    fn test_fast_upload_success_still_notifies_after_delay() {
        let t0 = Instant::now();
        let mut u = MarkerUploads::new();
        let ticket = u.begin(3, MarkerJob::Clear, t0);
        assert_eq!(u.finish(ticket, true), Some((3, MarkerJob::Clear)));
        assert!(u.tick(t0 + 10 * MS).is_empty());
        let fired = u.tick(t0 + 20 * MS);
        assert!(matches!(&fired[..], [PlayerEvent::Notice { text, .. }] if text == "Cleared"));
        assert!(u.tick(t0 + 40 * MS).is_empty());
    }

    #[test]
    fn test_failed_upload_cancels_pending_notice() {
        let t0 = Instant::now();
        let mut u = MarkerUploads::new();
        let job = MarkerJob::Add {
            visual: 4,
            fraction: 0.3,
        };
        let ticket = u.begin(3, job, t0);
        assert_eq!(u.finish(ticket, false), Some((3, job)));
        assert!(u.tick(t0 + 50 * MS).is_empty());
        assert_eq!(u.finish(ticket, false), None);
    }
}

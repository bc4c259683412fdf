//! Search overlay: debounced query input, result list, keyboard highlight.

use ratatui::crossterm::event::KeyEvent;
use std::time::{Duration, Instant};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::cooldown::Debounce;
use crate::song::{sort_newest_first, Song, SortOrder};

const QUERY_DEBOUNCE: Duration = Duration::from_millis(200);
/// Matches the close transition; text and results clear afterwards.
const CLOSE_CLEAR_DELAY: Duration = Duration::from_millis(100);

pub struct SearchController {
    input: Input,
    results: Vec<Song>,
    /// `None` means the input line has focus.
    highlighted: Option<usize>,
    visible: bool,
    query: Debounce,
    close_clear: Debounce,
}

impl SearchController {
    pub fn new() -> Self {
        Self {
            input: Input::default(),
            results: Vec::new(),
            highlighted: None,
            visible: false,
            query: Debounce::new(QUERY_DEBOUNCE),
            close_clear: Debounce::new(CLOSE_CLEAR_DELAY),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn input_focused(&self) -> bool {
        self.visible && self.highlighted.is_none()
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn results(&self) -> &[Song] {
        &self.results
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// Show the overlay.  `seed` is the key that opened it, if any.
    pub fn open(&mut self, seed: Option<KeyEvent>, now: Instant) {
        self.close_clear.cancel();
        self.visible = true;
        self.highlighted = None;
        if let Some(key) = seed {
            self.edit(key, now);
        }
    }

    /// Feed a key to the input line.
    pub fn edit(&mut self, key: KeyEvent, now: Instant) {
        let before = self.input.value().to_string();
        self.input
            .handle_event(&ratatui::crossterm::event::Event::Key(key));
        if self.input.value() == before {
            return;
        }
        if self.input.value().trim().is_empty() {
            self.query.cancel();
            self.results.clear();
            self.highlighted = None;
        } else {
            self.query.arm(now);
        }
    }

    /// The settled query text, once per debounce.
    pub fn take_due_query(&mut self, now: Instant) -> Option<String> {
        if !self.query.fire_if_due(now) {
            return None;
        }
        let text = self.input.value().trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    pub fn apply_results(&mut self, mut songs: Vec<Song>, sort: SortOrder) {
        if !self.visible {
            return;
        }
        if sort.is_modified() {
            sort_newest_first(&mut songs);
        }
        self.highlighted = if songs.is_empty() { None } else { Some(0) };
        self.results = songs;
    }

    /// Down: input → first result → … → last result → input.
    pub fn highlight_next(&mut self) {
        let len = self.results.len();
        self.highlighted = match self.highlighted {
            _ if len == 0 => None,
            None => Some(0),
            Some(i) if i + 1 < len => Some(i + 1),
            Some(_) => None,
        };
    }

    pub fn highlight_previous(&mut self) {
        let len = self.results.len();
        self.highlighted = match self.highlighted {
            _ if len == 0 => None,
            None => Some(len - 1),
            Some(0) => None,
            Some(i) => Some(i - 1),
        };
    }

    /// The highlighted result; closes the overlay when there is one.
    pub fn confirm(&mut self, now: Instant) -> Option<Song> {
        let song = self.highlighted.and_then(|i| self.results.get(i)).cloned()?;
        self.close(now);
        Some(song)
    }

    pub fn close(&mut self, now: Instant) {
        if !self.visible {
            return;
        }
        self.visible = false;
        self.query.cancel();
        self.close_clear.arm(now);
    }

    pub fn tick(&mut self, now: Instant) {
        if self.close_clear.fire_if_due(now) {
            self.input.reset();
            self.results.clear();
            self.highlighted = None;
        }
    }
}

impl Default for SearchController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::MarkerState;
    use chrono::{TimeZone, Utc};
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    const MS: Duration = Duration::from_millis(1);

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn song(id: u64, minute: u32) -> Song {
        Song {
            id,
            title: format!("song {}", id),
            artist: "a".into(),
            has_image: false,
            modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            markers: MarkerState::NotLoaded,
        }
    }

    #[test]
    fn test_cleared_input_never_queries() {
        let t0 = Instant::now();
        let mut s = SearchController::new();
        s.open(Some(key(KeyCode::Char('x'))), t0);
        s.edit(key(KeyCode::Char('y')), t0 + 50 * MS);
        s.edit(key(KeyCode::Backspace), t0 + 100 * MS);
        s.edit(key(KeyCode::Backspace), t0 + 150 * MS);
        assert_eq!(s.input().value(), "");
        for step in 0..10 {
            assert_eq!(s.take_due_query(t0 + (150 + step * 50) * MS), None);
        }
    }

    #[test]
    fn test_query_fires_once_after_typing_settles() {
        let t0 = Instant::now();
        let mut s = SearchController::new();
        s.open(Some(key(KeyCode::Char('a'))), t0);
        s.edit(key(KeyCode::Char('b')), t0 + 150 * MS);
        assert_eq!(s.take_due_query(t0 + 300 * MS), None);
        assert_eq!(s.take_due_query(t0 + 350 * MS), Some("ab".to_string()));
        assert_eq!(s.take_due_query(t0 + 600 * MS), None);
    }

    #[test]
    fn test_results_resorted_and_first_highlighted() {
        let t0 = Instant::now();
        let mut s = SearchController::new();
        s.open(None, t0);
        s.apply_results(vec![song(1, 5), song(2, 30), song(3, 10)], SortOrder::Modified);
        let order: Vec<u64> = s.results().iter().map(|x| x.id).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert_eq!(s.highlighted(), Some(0));
        assert!(!s.input_focused());
    }

    #[test]
    fn test_navigation_wraps_through_input() {
        let t0 = Instant::now();
        let mut s = SearchController::new();
        s.open(None, t0);
        s.apply_results(vec![song(1, 1), song(2, 2)], SortOrder::Id);
        s.highlight_next();
        assert_eq!(s.highlighted(), Some(1));
        s.highlight_next();
        assert_eq!(s.highlighted(), None);
        s.highlight_previous();
        assert_eq!(s.highlighted(), Some(1));
    }

    #[test]
    fn test_confirm_closes_then_clears_after_delay() {
        let t0 = Instant::now();
        let mut s = SearchController::new();
        s.open(Some(key(KeyCode::Char('q'))), t0);
        s.apply_results(vec![song(7, 1)], SortOrder::Id);
        assert_eq!(s.confirm(t0).map(|x| x.id), Some(7));
        assert!(!s.is_visible());
        s.tick(t0 + 50 * MS);
        assert_eq!(s.results().len(), 1);
        s.tick(t0 + 100 * MS);
        assert!(s.results().is_empty());
        assert_eq!(s.input().value(), "");
    }

    #[test]
    fn test_reopen_cancels_pending_clear() {
        let t0 = Instant::now();
        let mut s = SearchController::new();
        s.open(Some(key(KeyCode::Char('q'))), t0);
        s.close(t0);
        s.open(None, t0 + 50 * MS);
        s.tick(t0 + 200 * MS);
        assert_eq!(s.input().value(), "q");
    }
}

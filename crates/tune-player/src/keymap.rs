//! Key bindings.
//!
//! Legacy terminals report some ctrl chords as other keys: ctrl+] arrives as
//! ctrl+5 and ctrl+/ as ctrl+7.  Both spellings are accepted.  ctrl+M is only
//! distinguishable from Enter when keyboard enhancement is active.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Where keyboard focus is with respect to the search overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFocus {
    Closed,
    Input,
    Results,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    TogglePlayback,
    /// Move the playhead by this many seconds.
    Scrub(i32),
    SelectPrevious,
    SelectNext,
    PlayActive,
    VolumeUp,
    VolumeDown,
    ToggleRepeat,
    ToggleAnimations,
    AddMarker,
    ClearMarkers,
    ToggleSort,
    RotatePlayMode,
    RotateEndpoint,
    /// Open search seeded with this key.
    OpenSearch(KeyEvent),
    SearchEdit(KeyEvent),
    SearchPrevious,
    SearchNext,
    SearchConfirm,
    CloseSearch,
}

pub fn map_key(key: &KeyEvent, focus: SearchFocus) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        // Settling on a row plays it.  Only seen with keyboard enhancement.
        return match (key.code, focus) {
            (KeyCode::Up | KeyCode::Down, SearchFocus::Closed) => Some(Command::PlayActive),
            _ => None,
        };
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    if ctrl {
        if let Some(cmd) = map_ctrl(key.code, focus) {
            return Some(cmd);
        }
    }

    if focus == SearchFocus::Closed {
        return match key.code {
            KeyCode::Left => Some(Command::Scrub(-scrub_step(ctrl, shift))),
            KeyCode::Right => Some(Command::Scrub(scrub_step(ctrl, shift))),
            KeyCode::Up => Some(Command::SelectPrevious),
            KeyCode::Down => Some(Command::SelectNext),
            KeyCode::Enter => Some(Command::PlayActive),
            KeyCode::Char(' ') if key.kind == KeyEventKind::Press => {
                Some(Command::TogglePlayback)
            }
            KeyCode::Char(c) if c.is_ascii_alphanumeric() && !ctrl => {
                Some(Command::OpenSearch(*key))
            }
            _ => None,
        };
    }

    match key.code {
        KeyCode::Up => Some(Command::SearchPrevious),
        KeyCode::Down => Some(Command::SearchNext),
        KeyCode::Enter => Some(Command::SearchConfirm),
        KeyCode::Esc => Some(Command::CloseSearch),
        _ => Some(Command::SearchEdit(*key)),
    }
}

fn scrub_step(ctrl: bool, shift: bool) -> i32 {
    if ctrl {
        20
    } else if shift {
        1
    } else {
        5
    }
}

fn map_ctrl(code: KeyCode, focus: SearchFocus) -> Option<Command> {
    let KeyCode::Char(c) = code else {
        return None;
    };
    match c.to_ascii_lowercase() {
        'q' => Some(Command::Quit),
        ']' | '5' => Some(Command::VolumeUp),
        '/' | '7' => Some(Command::VolumeDown),
        'r' => Some(Command::ToggleRepeat),
        'e' => Some(Command::ToggleAnimations),
        'm' => Some(Command::AddMarker),
        'c' => Some(Command::ClearMarkers),
        'o' => Some(Command::ToggleSort),
        // ctrl+A is line-start while typing a query.
        'a' if focus != SearchFocus::Input => Some(Command::RotatePlayMode),
        'd' => Some(Command::RotateEndpoint),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEventState;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn release(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_scrub_steps_follow_modifiers() {
        let closed = SearchFocus::Closed;
        assert_eq!(
            map_key(&press(KeyCode::Left, KeyModifiers::NONE), closed),
            Some(Command::Scrub(-5))
        );
        assert_eq!(
            map_key(&press(KeyCode::Right, KeyModifiers::SHIFT), closed),
            Some(Command::Scrub(1))
        );
        assert_eq!(
            map_key(&press(KeyCode::Left, KeyModifiers::CONTROL), closed),
            Some(Command::Scrub(-20))
        );
    }

    #[test]
    fn test_volume_accepts_legacy_spellings() {
        for c in [']', '5'] {
            assert_eq!(
                map_key(&press(KeyCode::Char(c), KeyModifiers::CONTROL), SearchFocus::Closed),
                Some(Command::VolumeUp)
            );
        }
        for c in ['/', '7'] {
            assert_eq!(
                map_key(&press(KeyCode::Char(c), KeyModifiers::CONTROL), SearchFocus::Results),
                Some(Command::VolumeDown)
            );
        }
    }

    #[test]
    fn test_alphanumeric_opens_search() {
        let k = press(KeyCode::Char('b'), KeyModifiers::NONE);
        assert_eq!(map_key(&k, SearchFocus::Closed), Some(Command::OpenSearch(k)));
        assert_eq!(map_key(&k, SearchFocus::Input), Some(Command::SearchEdit(k)));
        assert_eq!(
            map_key(&press(KeyCode::Char('-'), KeyModifiers::NONE), SearchFocus::Closed),
            None
        );
    }

    #[test]
    fn test_ctrl_a_yields_to_the_input_line() {
        let k = press(KeyCode::Char('a'), KeyModifiers::CONTROL);
        assert_eq!(map_key(&k, SearchFocus::Closed), Some(Command::RotatePlayMode));
        assert_eq!(map_key(&k, SearchFocus::Results), Some(Command::RotatePlayMode));
        assert_eq!(map_key(&k, SearchFocus::Input), Some(Command::SearchEdit(k)));
    }

    #[test]
    fn test_arrow_release_plays_only_outside_search() {
        assert_eq!(map_key(&release(KeyCode::Down), SearchFocus::Closed), Some(Command::PlayActive));
        assert_eq!(map_key(&release(KeyCode::Down), SearchFocus::Results), None);
        assert_eq!(map_key(&release(KeyCode::Char(' ')), SearchFocus::Closed), None);
    }

    #[test]
    fn test_search_keys() {
        let f = SearchFocus::Results;
        assert_eq!(map_key(&press(KeyCode::Up, KeyModifiers::NONE), f), Some(Command::SearchPrevious));
        assert_eq!(map_key(&press(KeyCode::Enter, KeyModifiers::NONE), f), Some(Command::SearchConfirm));
        assert_eq!(map_key(&press(KeyCode::Esc, KeyModifiers::NONE), f), Some(Command::CloseSearch));
        assert_eq!(
            map_key(&press(KeyCode::Char('q'), KeyModifiers::CONTROL), f),
            Some(Command::Quit)
        );
    }
}

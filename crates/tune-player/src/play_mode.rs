use serde::{Deserialize, Serialize};

/// What happens when the current track finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    #[default]
    Autoplay,
    Random,
    Repeat,
    Once,
}

impl PlayMode {
    pub fn next(self) -> Self {
        match self {
            PlayMode::Autoplay => PlayMode::Random,
            PlayMode::Random => PlayMode::Repeat,
            PlayMode::Repeat => PlayMode::Once,
            PlayMode::Once => PlayMode::Autoplay,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayMode::Autoplay => "Autoplay",
            PlayMode::Random => "Random",
            PlayMode::Repeat => "Repeat",
            PlayMode::Once => "Once",
        }
    }
}

/// Current play mode plus the mode to return to when repeat is toggled off.
#[derive(Debug, Clone)]
pub struct PlayModeSelector {
    mode: PlayMode,
    before_repeat: Option<PlayMode>,
}

impl PlayModeSelector {
    pub fn new(mode: PlayMode) -> Self {
        Self {
            mode,
            before_repeat: None,
        }
    }

    pub fn current(&self) -> PlayMode {
        self.mode
    }

    /// Advance Autoplay → Random → Repeat → Once → Autoplay.
    pub fn rotate(&mut self) -> PlayMode {
        self.mode = self.mode.next();
        self.before_repeat = None;
        self.mode
    }

    /// Flip between Repeat and whatever was selected before it.
    pub fn toggle_repeat(&mut self) -> PlayMode {
        if self.mode == PlayMode::Repeat {
            self.mode = self.before_repeat.take().unwrap_or_default();
        } else {
            self.before_repeat = Some(self.mode);
            self.mode = PlayMode::Repeat;
        }
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_cycles_all_modes() {
        let mut s = PlayModeSelector::new(PlayMode::Autoplay);
        let seen: Vec<PlayMode> = (0..4).map(|_| s.rotate()).collect();
        assert_eq!(
            seen,
            vec![
                PlayMode::Random,
                PlayMode::Repeat,
                PlayMode::Once,
                PlayMode::Autoplay
            ]
        );
    }

    #[test]
    fn test_toggle_repeat_restores_previous_mode() {
        let mut s = PlayModeSelector::new(PlayMode::Random);
        assert_eq!(s.toggle_repeat(), PlayMode::Repeat);
        assert_eq!(s.toggle_repeat(), PlayMode::Random);

        // Reached Repeat by rotation: toggling off falls back to Autoplay.
        let mut s = PlayModeSelector::new(PlayMode::Random);
        s.rotate();
        assert_eq!(s.toggle_repeat(), PlayMode::Autoplay);
    }

    #[test]
    fn test_serialized_form_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&PlayMode::Once).unwrap(),
            "\"once\""
        );
    }
}

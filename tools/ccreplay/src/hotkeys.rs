use crate::types::PlaybackMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Space,
    Enter,
    Left,
    Right,
    Up,
    Down,
    Esc,
    /// Ctrl+C. Raw mode delivers it as a key instead of a signal.
    Interrupt,
    Other,
}

impl From<KeyEvent> for Key {
    fn from(event: KeyEvent) -> Self {
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            return match event.code {
                KeyCode::Char('c') | KeyCode::Char('C') => Key::Interrupt,
                _ => Key::Other,
            };
        }
        match event.code {
            KeyCode::Char(' ') => Key::Space,
            KeyCode::Char(ch) => Key::Char(ch),
            KeyCode::Enter => Key::Enter,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Esc => Key::Esc,
            _ => Key::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub key: &'static str,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    Next,
    Previous,
    ToggleAutoplay,
    SpeedUp,
    SpeedDown,
    Clear,
    Restart,
    Help,
    Quit,
    Interrupt,
}

impl PlaybackAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
            Self::ToggleAutoplay => "toggle_autoplay",
            Self::SpeedUp => "speed_up",
            Self::SpeedDown => "speed_down",
            Self::Clear => "clear",
            Self::Restart => "restart",
            Self::Help => "help",
            Self::Quit => "quit",
            Self::Interrupt => "interrupt",
        }
    }

    pub fn ends_session(self) -> bool {
        matches!(self, Self::Quit | Self::Interrupt)
    }
}

pub const SEEK_BINDINGS: [HotkeyBinding; 9] = [
    HotkeyBinding {
        key: "Space",
        action: "pause/resume",
    },
    HotkeyBinding {
        key: "→",
        action: "next message",
    },
    HotkeyBinding {
        key: "←",
        action: "previous message",
    },
    HotkeyBinding {
        key: "↑",
        action: "speed up",
    },
    HotkeyBinding {
        key: "↓",
        action: "slow down",
    },
    HotkeyBinding {
        key: "c",
        action: "clear screen",
    },
    HotkeyBinding {
        key: "r",
        action: "restart",
    },
    HotkeyBinding {
        key: "h",
        action: "help",
    },
    HotkeyBinding {
        key: "q",
        action: "quit",
    },
];

pub const FLOW_BINDINGS: [HotkeyBinding; 10] = [
    HotkeyBinding {
        key: "Enter",
        action: "next message",
    },
    HotkeyBinding {
        key: "→",
        action: "show hidden / next",
    },
    HotkeyBinding {
        key: "←",
        action: "hide last message",
    },
    HotkeyBinding {
        key: "a",
        action: "autoplay on/off",
    },
    HotkeyBinding {
        key: "↑",
        action: "speed up",
    },
    HotkeyBinding {
        key: "↓",
        action: "slow down",
    },
    HotkeyBinding {
        key: "c",
        action: "clear screen",
    },
    HotkeyBinding {
        key: "r",
        action: "restart",
    },
    HotkeyBinding {
        key: "h",
        action: "help",
    },
    HotkeyBinding {
        key: "q",
        action: "quit",
    },
];

/// Compact legend shown in the flow-mode status bar.
pub const STATUS_BINDINGS: [HotkeyBinding; 5] = [
    HotkeyBinding {
        key: "Enter",
        action: "next",
    },
    HotkeyBinding {
        key: "←",
        action: "hide",
    },
    HotkeyBinding {
        key: "a",
        action: "autoplay",
    },
    HotkeyBinding {
        key: "c",
        action: "clear",
    },
    HotkeyBinding {
        key: "q",
        action: "quit",
    },
];

pub fn bindings_for_mode(mode: PlaybackMode) -> &'static [HotkeyBinding] {
    match mode {
        PlaybackMode::Seek => &SEEK_BINDINGS,
        PlaybackMode::Flow => &FLOW_BINDINGS,
        PlaybackMode::Batch => &[],
    }
}

pub fn action_for_key(key: Key, mode: PlaybackMode) -> Option<PlaybackAction> {
    if key == Key::Interrupt {
        return Some(PlaybackAction::Interrupt);
    }
    match mode {
        PlaybackMode::Batch => None,
        PlaybackMode::Seek => match key {
            Key::Space | Key::Char('a') => Some(PlaybackAction::ToggleAutoplay),
            Key::Right | Key::Enter => Some(PlaybackAction::Next),
            Key::Left => Some(PlaybackAction::Previous),
            _ => common_action(key),
        },
        PlaybackMode::Flow => match key {
            Key::Enter | Key::Space | Key::Right => Some(PlaybackAction::Next),
            Key::Left => Some(PlaybackAction::Previous),
            Key::Char('a') => Some(PlaybackAction::ToggleAutoplay),
            _ => common_action(key),
        },
    }
}

fn common_action(key: Key) -> Option<PlaybackAction> {
    match key {
        Key::Up => Some(PlaybackAction::SpeedUp),
        Key::Down => Some(PlaybackAction::SpeedDown),
        Key::Char('c') => Some(PlaybackAction::Clear),
        Key::Char('r') => Some(PlaybackAction::Restart),
        Key::Char('h') | Key::Char('?') => Some(PlaybackAction::Help),
        Key::Char('q') => Some(PlaybackAction::Quit),
        _ => None,
    }
}

/// Resolves a binding's display label back to a key.
pub fn key_for_label(label: &str) -> Option<Key> {
    match label {
        "Space" => Some(Key::Space),
        "Enter" => Some(Key::Enter),
        "→" => Some(Key::Right),
        "←" => Some(Key::Left),
        "↑" => Some(Key::Up),
        "↓" => Some(Key::Down),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Some(Key::Char(ch)),
                _ => None,
            }
        }
    }
}

pub fn controls_legend(mode: PlaybackMode) -> String {
    format_bindings("Keys: ", bindings_for_mode(mode))
}

pub fn status_legend() -> String {
    format_bindings("", &STATUS_BINDINGS)
}

fn format_bindings(prefix: &str, bindings: &[HotkeyBinding]) -> String {
    let parts = bindings
        .iter()
        .map(|binding| format!("{}:{}", binding.key, binding.action))
        .collect::<Vec<_>>();
    format!("{prefix}{}", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::{action_for_key, Key, PlaybackAction};
    use crate::types::PlaybackMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn ctrl_c_maps_to_interrupt_in_every_mode() {
        let key = Key::from(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(key, Key::Interrupt);
        for mode in [PlaybackMode::Batch, PlaybackMode::Seek, PlaybackMode::Flow] {
            assert_eq!(action_for_key(key, mode), Some(PlaybackAction::Interrupt));
        }
    }

    #[test]
    fn plain_c_clears_instead_of_interrupting() {
        let key = Key::from(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE));
        assert_eq!(key, Key::Char('c'));
        assert_eq!(
            action_for_key(key, PlaybackMode::Flow),
            Some(PlaybackAction::Clear)
        );
    }

    #[test]
    fn space_differs_between_seek_and_flow() {
        let space = Key::from(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE));
        assert_eq!(
            action_for_key(space, PlaybackMode::Seek),
            Some(PlaybackAction::ToggleAutoplay)
        );
        assert_eq!(
            action_for_key(space, PlaybackMode::Flow),
            Some(PlaybackAction::Next)
        );
    }
}

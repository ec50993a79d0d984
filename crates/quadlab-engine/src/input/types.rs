/// Keyboard key identifier, by physical position on a US layout.
///
/// Keys without a variant map to `Key::Unknown` carrying a stable platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    // Letters
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    // Digits
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    Unknown(u32),
}

/// What happened to a key.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyAction {
    Pressed,
    Released,
    /// Auto-repeat while the key is held.
    Repeated,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KeyEvent {
    pub key: Key,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn new(key: Key, action: KeyAction) -> Self {
        Self { key, action }
    }

    /// Initial press of `key`, ignoring auto-repeat.
    pub fn is_press_of(&self, key: Key) -> bool {
        self.key == key && self.action == KeyAction::Pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_matches_only_the_initial_press() {
        assert!(KeyEvent::new(Key::Q, KeyAction::Pressed).is_press_of(Key::Q));
        assert!(!KeyEvent::new(Key::Q, KeyAction::Repeated).is_press_of(Key::Q));
        assert!(!KeyEvent::new(Key::Q, KeyAction::Released).is_press_of(Key::Q));
        assert!(!KeyEvent::new(Key::W, KeyAction::Pressed).is_press_of(Key::Q));
    }
}

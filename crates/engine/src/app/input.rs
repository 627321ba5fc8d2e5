/// Keys the engine reacts to. Everything else arrives as text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Backspace,
    Semicolon,
    Slash,
}

const KEY_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct KeyStates {
    down: [bool; KEY_COUNT],
}

impl KeyStates {
    pub(crate) fn set(&mut self, key: Key, is_down: bool) {
        self.down[key.index()] = is_down;
    }

    pub(crate) fn is_down(&self, key: Key) -> bool {
        self.down[key.index()]
    }
}

impl Key {
    const fn index(self) -> usize {
        match self {
            Key::Escape => 0,
            Key::Enter => 1,
            Key::Backspace => 2,
            Key::Semicolon => 3,
            Key::Slash => 4,
        }
    }
}

/// Keyboard state captured once per frame. Edges compare this frame's key
/// set against the previous frame's.
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    current: KeyStates,
    previous: KeyStates,
    text: String,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        current: KeyStates,
        previous: KeyStates,
        text: String,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            current,
            previous,
            text,
            window_width,
            window_height,
        }
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.current.is_down(key) && !self.previous.is_down(key)
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.current.is_down(key)
    }

    pub fn is_released(&self, key: Key) -> bool {
        !self.current.is_down(key) && self.previous.is_down(key)
    }

    /// Characters typed this frame, in order.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn with_key_pressed(mut self, key: Key) -> Self {
        self.current.set(key, true);
        self.previous.set(key, false);
        self
    }

    pub fn with_key_held(mut self, key: Key) -> Self {
        self.current.set(key, true);
        self.previous.set(key, true);
        self
    }

    pub fn with_key_released(mut self, key: Key) -> Self {
        self.current.set(key, false);
        self.previous.set(key, true);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_compare_current_and_previous_frames() {
        let pressed = InputSnapshot::empty().with_key_pressed(Key::Enter);
        assert!(pressed.is_pressed(Key::Enter));
        assert!(pressed.is_held(Key::Enter));
        assert!(!pressed.is_released(Key::Enter));

        let held = InputSnapshot::empty().with_key_held(Key::Enter);
        assert!(!held.is_pressed(Key::Enter));
        assert!(held.is_held(Key::Enter));

        let released = InputSnapshot::empty().with_key_released(Key::Escape);
        assert!(released.is_released(Key::Escape));
        assert!(!released.is_held(Key::Escape));
        assert!(!released.is_pressed(Key::Backspace));
    }
}

// 🔢 PIN Entry - four digit slots, keyboard or keypad, never shown in cleartext

use crate::device::Clipboard;
use serde::{Serialize, Serializer};
use std::fmt;

pub const PIN_LENGTH: usize = 4;

// ============================================================================
// PIN VALUE
// ============================================================================

/// A complete 4-digit PIN. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    /// Accepts exactly four ASCII digits, nothing else
    pub fn parse(value: &str) -> Option<Pin> {
        if value.len() == PIN_LENGTH && value.bytes().all(|b| b.is_ascii_digit()) {
            Some(Pin(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl Serialize for Pin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// ============================================================================
// INPUT EVENTS
// ============================================================================

/// Keyboard input addressed at the focused slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKey {
    Digit(char),
    Backspace,
    Left,
    Right,
}

/// On-screen numeric keypad buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadButton {
    Digit(u8),
    Backspace,
    Clear,
}

// ============================================================================
// ENTRY WIDGET STATE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PinEntry {
    slots: [Option<char>; PIN_LENGTH],
    focus: usize,
    disabled: bool,
    /// Set once the full buffer has been reported; re-armed when a slot empties
    completed: bool,
}

impl PinEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn filled_len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Filled/empty state per slot, for rendering dots
    pub fn indicators(&self) -> [bool; PIN_LENGTH] {
        let mut out = [false; PIN_LENGTH];
        for (i, slot) in self.slots.iter().enumerate() {
            out[i] = slot.is_some();
        }
        out
    }

    /// Reset after a rejected PIN or a step change
    pub fn clear(&mut self) {
        self.slots = [None; PIN_LENGTH];
        self.focus = 0;
        self.completed = false;
    }

    pub fn handle_key(&mut self, key: PinKey) -> Option<Pin> {
        if self.disabled {
            return None;
        }

        match key {
            PinKey::Digit(c) => {
                if !c.is_ascii_digit() || self.completed {
                    return None;
                }
                self.slots[self.focus] = Some(c);
                if self.focus < PIN_LENGTH - 1 {
                    self.focus += 1;
                }
                self.check_complete()
            }
            PinKey::Backspace => {
                if self.slots[self.focus].is_some() {
                    self.slots[self.focus] = None;
                } else if self.focus > 0 {
                    self.focus -= 1;
                    self.slots[self.focus] = None;
                }
                self.completed = false;
                None
            }
            PinKey::Left => {
                self.focus = self.focus.saturating_sub(1);
                None
            }
            PinKey::Right => {
                if self.focus < PIN_LENGTH - 1 {
                    self.focus += 1;
                }
                None
            }
        }
    }

    /// Keypad taps fill slots left to right and share the keyboard's completion
    pub fn press(&mut self, button: KeypadButton) -> Option<Pin> {
        if self.disabled {
            return None;
        }

        match button {
            KeypadButton::Digit(d) if d <= 9 => {
                if self.completed {
                    return None;
                }
                let next = self.slots.iter().position(|s| s.is_none())?;
                self.slots[next] = Some(char::from(b'0' + d));
                self.focus = (next + 1).min(PIN_LENGTH - 1);
                self.check_complete()
            }
            KeypadButton::Digit(_) => None,
            KeypadButton::Backspace => {
                if let Some(last) = self.slots.iter().rposition(|s| s.is_some()) {
                    self.slots[last] = None;
                    self.focus = last;
                }
                self.completed = false;
                None
            }
            KeypadButton::Clear => {
                self.clear();
                None
            }
        }
    }

    /// Only a paste of exactly four digits is accepted; anything else is ignored
    pub fn paste(&mut self, text: &str) -> Option<Pin> {
        if self.disabled || self.completed {
            return None;
        }
        let pin = Pin::parse(text)?;

        for (slot, c) in self.slots.iter_mut().zip(pin.as_str().chars()) {
            *slot = Some(c);
        }
        self.focus = PIN_LENGTH - 1;
        self.check_complete()
    }

    pub fn paste_from(&mut self, clipboard: &dyn Clipboard) -> Option<Pin> {
        let text = clipboard.read_text()?;
        self.paste(&text)
    }

    fn check_complete(&mut self) -> Option<Pin> {
        if self.completed {
            return None;
        }
        let value: String = self.slots.iter().flatten().collect();
        let pin = Pin::parse(&value)?;
        self.completed = true;
        Some(pin)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn type_digits(entry: &mut PinEntry, digits: &str) -> Vec<Pin> {
        digits
            .chars()
            .filter_map(|c| entry.handle_key(PinKey::Digit(c)))
            .collect()
    }

    #[test]
    fn test_digit_by_digit_completes_once() {
        for candidate in ["0000", "1234", "9081", "5555"] {
            let mut entry = PinEntry::new();
            let completions = type_digits(&mut entry, candidate);

            assert_eq!(completions.len(), 1);
            assert_eq!(completions[0].as_str(), candidate);
        }
    }

    #[test]
    fn test_no_second_completion_until_cleared() {
        let mut entry = PinEntry::new();
        assert!(entry.handle_key(PinKey::Digit('1')).is_none());
        type_digits(&mut entry, "234");

        // Further typing while the parent has not reacted is ignored
        assert!(entry.handle_key(PinKey::Digit('9')).is_none());
        assert!(entry.paste("4321").is_none());

        entry.clear();
        let again = type_digits(&mut entry, "4321");
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].as_str(), "4321");
    }

    #[test]
    fn test_paste_four_digits() {
        let mut entry = PinEntry::new();
        let pin = entry.paste("8642").expect("valid paste completes");
        assert_eq!(pin.as_str(), "8642");
        assert_eq!(entry.indicators(), [true; 4]);
    }

    #[test]
    fn test_bad_paste_leaves_buffer_unchanged() {
        let mut entry = PinEntry::new();
        type_digits(&mut entry, "12");
        let before = entry.indicators();

        for text in ["12a4", "123", "12345", "", "abcd", " 123", "１２３４"] {
            assert!(entry.paste(text).is_none(), "paste {:?} must be ignored", text);
            assert_eq!(entry.indicators(), before);
            assert_eq!(entry.focus(), 2);
        }
    }

    #[test]
    fn test_backspace_clears_current_then_steps_back() {
        let mut entry = PinEntry::new();
        type_digits(&mut entry, "12");
        assert_eq!(entry.focus(), 2);

        // Slot 2 empty: step back and clear slot 1
        entry.handle_key(PinKey::Backspace);
        assert_eq!(entry.focus(), 1);
        assert_eq!(entry.indicators(), [true, false, false, false]);

        // Move left onto a filled slot: backspace clears in place
        entry.handle_key(PinKey::Left);
        entry.handle_key(PinKey::Backspace);
        assert_eq!(entry.focus(), 0);
        assert_eq!(entry.filled_len(), 0);
    }

    #[test]
    fn test_backspace_after_completion_rearms() {
        let mut entry = PinEntry::new();
        type_digits(&mut entry, "1234");
        entry.handle_key(PinKey::Backspace);
        assert_eq!(entry.filled_len(), 3);

        let pin = entry.handle_key(PinKey::Digit('7')).expect("completes again");
        assert_eq!(pin.as_str(), "1237");
    }

    #[test]
    fn test_arrow_navigation_is_bounded() {
        let mut entry = PinEntry::new();
        entry.handle_key(PinKey::Left);
        assert_eq!(entry.focus(), 0);
        for _ in 0..10 {
            entry.handle_key(PinKey::Right);
        }
        assert_eq!(entry.focus(), PIN_LENGTH - 1);
    }

    #[test]
    fn test_keypad_matches_keyboard_semantics() {
        let mut entry = PinEntry::new();
        let mut completions = Vec::new();
        for d in [4u8, 0, 7, 1] {
            completions.extend(entry.press(KeypadButton::Digit(d)));
        }
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].as_str(), "4071");

        entry.press(KeypadButton::Backspace);
        assert_eq!(entry.filled_len(), 3);
        entry.press(KeypadButton::Clear);
        assert_eq!(entry.filled_len(), 0);
        assert!(entry.press(KeypadButton::Digit(10)).is_none());
    }

    #[test]
    fn test_disabled_freezes_input() {
        let mut entry = PinEntry::new();
        entry.set_disabled(true);
        assert!(type_digits(&mut entry, "1234").is_empty());
        assert!(entry.paste("1234").is_none());
        assert!(entry.press(KeypadButton::Digit(1)).is_none());
        assert_eq!(entry.filled_len(), 0);
    }

    #[test]
    fn test_non_digit_keys_ignored() {
        let mut entry = PinEntry::new();
        assert!(entry.handle_key(PinKey::Digit('x')).is_none());
        assert_eq!(entry.filled_len(), 0);
    }

    #[test]
    fn test_pin_debug_is_redacted() {
        let pin = Pin::parse("1234").unwrap();
        assert_eq!(format!("{:?}", pin), "Pin(****)");
        assert_eq!(serde_json::to_string(&pin).unwrap(), "\"1234\"");
    }

    struct FixedClipboard(&'static str);

    impl Clipboard for FixedClipboard {
        fn read_text(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn test_paste_from_clipboard_capability() {
        let mut entry = PinEntry::new();
        assert_eq!(
            entry.paste_from(&FixedClipboard("2468")).map(|p| p.as_str().to_string()),
            Some("2468".to_string())
        );

        let mut noop = PinEntry::new();
        assert!(noop.paste_from(&crate::device::NoopDevice).is_none());
    }
}

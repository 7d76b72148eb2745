//! Canonical input-event model and translation to native event sequences.
//!
//! Translation is pure: one call produces one ordered batch of [`InputEvent`]s
//! which the platform adapter then delivers event by event. Keys that resolve
//! to no native code are dropped from the batch without aborting it.

pub mod keymap;

use serde::Serialize;
use tracing::debug;

use crate::capability::Platform;
use keymap::{resolve, KeyCode};

/// Pointer button, defaulting to left for absent or unrecognized names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

impl PointerButton {
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(|n| n.to_lowercase()).as_deref() {
            Some("right") => PointerButton::Right,
            Some("middle") => PointerButton::Middle,
            _ => PointerButton::Left,
        }
    }
}

/// One canonical input event, consumed within a single translation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEventKind {
    PointerMove { x: i32, y: i32 },
    PointerDown { button: PointerButton, x: i32, y: i32 },
    PointerUp { button: PointerButton, x: i32, y: i32 },
    KeyDown { code: u32 },
    KeyUp { code: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: InputEventKind,
    /// Position within the translated batch; delivery must preserve it.
    pub index: u32,
}

/// Translates canonical pointer/keyboard requests into native event batches
/// for one platform.
#[derive(Debug, Clone, Copy)]
pub struct EventTranslator {
    platform: Platform,
}

impl EventTranslator {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn pointer_move(&self, x: i32, y: i32) -> Vec<InputEvent> {
        vec![InputEvent {
            kind: InputEventKind::PointerMove { x, y },
            index: 0,
        }]
    }

    pub fn click(&self, x: i32, y: i32, button: Option<&str>) -> Vec<InputEvent> {
        let button = PointerButton::parse(button);
        vec![
            InputEvent {
                kind: InputEventKind::PointerDown { button, x, y },
                index: 0,
            },
            InputEvent {
                kind: InputEventKind::PointerUp { button, x, y },
                index: 1,
            },
        ]
    }

    /// A single key press: key-down immediately followed by key-up.
    ///
    /// An unmapped key yields an empty batch.
    pub fn key_press(&self, key: &str) -> Vec<InputEvent> {
        let mut events = Vec::with_capacity(2);
        self.push_press(key, &mut events);
        events
    }

    /// Decomposes text into per-character press sequences, preserving strict
    /// left-to-right order: each character's key-down is immediately followed
    /// by its key-up before the next character begins. Unmapped characters
    /// are skipped without aborting the rest of the batch.
    pub fn translate_text(&self, text: &str) -> Vec<InputEvent> {
        let mut events = Vec::with_capacity(text.len() * 2);
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.push_press(ch.encode_utf8(&mut buf), &mut events);
        }
        events
    }

    fn push_press(&self, key: &str, events: &mut Vec<InputEvent>) {
        let code = match resolve(self.platform, key) {
            KeyCode::Native(code) => code,
            KeyCode::Unknown => {
                debug!(platform = self.platform.name(), key, "dropping unmapped key");
                return;
            }
        };
        let index = events.len() as u32;
        events.push(InputEvent {
            kind: InputEventKind::KeyDown { code },
            index,
        });
        events.push(InputEvent {
            kind: InputEventKind::KeyUp { code },
            index: index + 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> EventTranslator {
        EventTranslator::new(Platform::Android)
    }

    #[test]
    fn text_interleaves_down_up_per_character() {
        let events = translator().translate_text("ab");
        let a = 29;
        let b = 30;
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InputEventKind::KeyDown { code: a },
                InputEventKind::KeyUp { code: a },
                InputEventKind::KeyDown { code: b },
                InputEventKind::KeyUp { code: b },
            ]
        );
        let indices: Vec<_> = events.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn unmapped_character_is_dropped_without_aborting() {
        // '%' has no Android mapping; 'a' and 'b' around it must survive.
        let events = translator().translate_text("a%b");
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].kind, InputEventKind::KeyDown { code: 29 });
        assert_eq!(events[2].kind, InputEventKind::KeyDown { code: 30 });
    }

    #[test]
    fn click_emits_down_then_up_with_named_button() {
        let events = translator().click(10, 20, Some("right"));
        assert_eq!(
            events[0].kind,
            InputEventKind::PointerDown {
                button: PointerButton::Right,
                x: 10,
                y: 20
            }
        );
        assert_eq!(
            events[1].kind,
            InputEventKind::PointerUp {
                button: PointerButton::Right,
                x: 10,
                y: 20
            }
        );
    }

    #[test]
    fn click_defaults_to_left_button() {
        for button in [None, Some("trackball")] {
            let events = translator().click(1, 2, button);
            assert_eq!(
                events[0].kind,
                InputEventKind::PointerDown {
                    button: PointerButton::Left,
                    x: 1,
                    y: 2
                }
            );
        }
    }

    #[test]
    fn pointer_move_is_a_single_event() {
        let events = translator().pointer_move(5, 6);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, InputEventKind::PointerMove { x: 5, y: 6 });
    }

    #[test]
    fn named_key_press_is_down_then_up() {
        let events = translator().key_press("Enter");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, InputEventKind::KeyDown { code: 66 });
        assert_eq!(events[1].kind, InputEventKind::KeyUp { code: 66 });
    }

    #[test]
    fn unknown_key_press_is_empty() {
        assert!(translator().key_press("hyper-modifier").is_empty());
    }
}

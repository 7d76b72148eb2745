//! Canonical key-name to native key-code translation tables.
//!
//! Resolution is two-stage: an explicit named-key table, then a
//! platform-scoped fallback for single ASCII letter/digit keys absent from
//! the table. Keys resolvable by neither yield [`KeyCode::Unknown`] and are
//! dropped from the translated sequence by the caller.

use crate::capability::Platform;

/// Native key code, or `Unknown` when the key has no mapping on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Native(u32),
    Unknown,
}

/// Resolves a canonical key name (case-insensitive) to a native code.
pub fn resolve(platform: Platform, key: &str) -> KeyCode {
    let name = key.to_lowercase();

    if let Some(code) = named(platform, &name) {
        return KeyCode::Native(code);
    }

    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if let Some(code) = fallback(platform, ch) {
            return KeyCode::Native(code);
        }
    }

    KeyCode::Unknown
}

/// Explicit named-key table.
fn named(platform: Platform, name: &str) -> Option<u32> {
    match platform {
        Platform::Linux => linux_named(name),
        Platform::MacOs => macos_named(name),
        Platform::Windows => windows_named(name),
        Platform::Android => android_named(name),
    }
}

/// Single-character fallback over printable ASCII letters and digits.
fn fallback(platform: Platform, ch: char) -> Option<u32> {
    if !ch.is_ascii_alphanumeric() {
        return None;
    }
    match platform {
        // X11 keysyms are identical to ASCII for the printable range.
        Platform::Linux => Some(ch as u32),
        // Virtual-key codes for letters use the uppercase ASCII value;
        // digits use the ASCII value directly.
        Platform::Windows => Some(ch.to_ascii_uppercase() as u32),
        // KEYCODE_A = 29 and KEYCODE_0 = 7, both ranges contiguous.
        Platform::Android => match ch.to_ascii_lowercase() {
            c @ 'a'..='z' => Some(29 + (c as u32 - 'a' as u32)),
            c @ '0'..='9' => Some(7 + (c as u32 - '0' as u32)),
            _ => None,
        },
        // CGKeyCode values are not contiguous; letters and digits need an
        // explicit table.
        Platform::MacOs => macos_char(ch.to_ascii_lowercase()),
    }
}

/// X11 keysym values.
fn linux_named(name: &str) -> Option<u32> {
    match name {
        "enter" | "return" => Some(0xff0d),
        "backspace" => Some(0xff08),
        "space" => Some(0x0020),
        "tab" => Some(0xff09),
        "escape" | "esc" => Some(0xff1b),
        "delete" => Some(0xffff),
        "home" => Some(0xff50),
        "end" => Some(0xff57),
        "pageup" => Some(0xff55),
        "pagedown" => Some(0xff56),
        "left" => Some(0xff51),
        "up" => Some(0xff52),
        "right" => Some(0xff53),
        "down" => Some(0xff54),
        "shift" => Some(0xffe1),
        "control" | "ctrl" => Some(0xffe3),
        "alt" => Some(0xffe9),
        _ => None,
    }
}

/// CGKeyCode values (ANSI layout).
fn macos_named(name: &str) -> Option<u32> {
    match name {
        "enter" | "return" => Some(0x24),
        "backspace" | "delete" => Some(0x33),
        "space" => Some(0x31),
        "tab" => Some(0x30),
        "escape" | "esc" => Some(0x35),
        "forwarddelete" => Some(0x75),
        "home" => Some(0x73),
        "end" => Some(0x77),
        "pageup" => Some(0x74),
        "pagedown" => Some(0x79),
        "left" => Some(0x7b),
        "right" => Some(0x7c),
        "down" => Some(0x7d),
        "up" => Some(0x7e),
        "shift" => Some(0x38),
        "control" | "ctrl" => Some(0x3b),
        "alt" | "option" => Some(0x3a),
        "command" | "cmd" => Some(0x37),
        _ => None,
    }
}

/// Win32 virtual-key codes.
fn windows_named(name: &str) -> Option<u32> {
    match name {
        "enter" | "return" => Some(0x0d),
        "backspace" => Some(0x08),
        "space" => Some(0x20),
        "tab" => Some(0x09),
        "escape" | "esc" => Some(0x1b),
        "delete" => Some(0x2e),
        "home" => Some(0x24),
        "end" => Some(0x23),
        "pageup" => Some(0x21),
        "pagedown" => Some(0x22),
        "left" => Some(0x25),
        "up" => Some(0x26),
        "right" => Some(0x27),
        "down" => Some(0x28),
        "shift" => Some(0x10),
        "control" | "ctrl" => Some(0x11),
        "alt" => Some(0x12),
        _ => None,
    }
}

/// Android KeyEvent key codes.
fn android_named(name: &str) -> Option<u32> {
    match name {
        "enter" | "return" => Some(66),
        "backspace" => Some(67),
        "space" => Some(62),
        "tab" => Some(61),
        "escape" | "esc" => Some(111),
        "delete" => Some(112),
        "home" => Some(122),
        "end" => Some(123),
        "pageup" => Some(92),
        "pagedown" => Some(93),
        "up" => Some(19),
        "down" => Some(20),
        "left" => Some(21),
        "right" => Some(22),
        "shift" => Some(59),
        "control" | "ctrl" => Some(113),
        "alt" => Some(57),
        _ => None,
    }
}

fn macos_char(ch: char) -> Option<u32> {
    match ch {
        'a' => Some(0x00),
        'b' => Some(0x0b),
        'c' => Some(0x08),
        'd' => Some(0x02),
        'e' => Some(0x0e),
        'f' => Some(0x03),
        'g' => Some(0x05),
        'h' => Some(0x04),
        'i' => Some(0x22),
        'j' => Some(0x26),
        'k' => Some(0x28),
        'l' => Some(0x25),
        'm' => Some(0x2e),
        'n' => Some(0x2d),
        'o' => Some(0x1f),
        'p' => Some(0x23),
        'q' => Some(0x0c),
        'r' => Some(0x0f),
        's' => Some(0x01),
        't' => Some(0x11),
        'u' => Some(0x20),
        'v' => Some(0x09),
        'w' => Some(0x0d),
        'x' => Some(0x07),
        'y' => Some(0x10),
        'z' => Some(0x06),
        '0' => Some(0x1d),
        '1' => Some(0x12),
        '2' => Some(0x13),
        '3' => Some(0x14),
        '4' => Some(0x15),
        '5' => Some(0x17),
        '6' => Some(0x16),
        '7' => Some(0x1a),
        '8' => Some(0x1c),
        '9' => Some(0x19),
        _ => None,
    }
}

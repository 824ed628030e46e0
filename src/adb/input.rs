//! Text input helpers for ADB devices.

use base64::{engine::general_purpose::STANDARD, Engine};

/// IME id of ADB Keyboard.
pub const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";

/// Encode text for the `ADB_INPUT_B64` broadcast understood by ADB Keyboard.
///
/// See: https://github.com/senzhk/ADBKeyBoard
pub fn encode_ime_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Escape text for `adb shell input text`.
///
/// Spaces become `%s`, which `input` translates back to a space.
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '&' => escaped.push_str("\\&"),
            ' ' => escaped.push_str("%s"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Whether the `broadcast` output indicates a receiver handled the intent.
pub fn broadcast_delivered(stdout: &str) -> bool {
    stdout.contains("result=0") || stdout.contains("Broadcast completed")
}

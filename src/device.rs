//! Device capability contract used by the action handler and agent loop.
//!
//! Every operation reports success as a plain `bool` (or `Option`) instead of
//! an error: a failed gesture is something to tell the model about, not a
//! reason to abort the task.

/// Android key codes used by the agent.
pub mod keycode {
    pub const HOME: u32 = 3;
    pub const BACK: u32 = 4;
    pub const VOLUME_UP: u32 = 24;
    pub const VOLUME_DOWN: u32 = 25;
    pub const ENTER: u32 = 66;
    pub const DEL: u32 = 67;
    pub const SYSRQ: u32 = 120;
    pub const MOVE_END: u32 = 123;
    pub const APP_SWITCH: u32 = 187;
}

/// Resolve a key name used in `KeyPress` directives to its key code.
pub fn keycode_for(name: &str) -> Option<u32> {
    let code = match name.to_ascii_lowercase().as_str() {
        "enter" => keycode::ENTER,
        "delete" => keycode::DEL,
        "volume_up" => keycode::VOLUME_UP,
        "volume_down" => keycode::VOLUME_DOWN,
        "app_switch" => keycode::APP_SWITCH,
        "snapshot" => keycode::SYSRQ,
        "back" => keycode::BACK,
        "home" => keycode::HOME,
        _ => return None,
    };
    Some(code)
}

/// A controllable Android device.
///
/// Implementations assume exclusive access for the lifetime of a task.
pub trait Device: Send + Sync {
    /// Serial or address identifying the device.
    fn device_id(&self) -> &str;

    /// Physical screen size in pixels, `(width, height)`.
    fn screen_size(&self) -> (u32, u32);

    /// Capture the screen as PNG bytes, downscaled by `scale` when below 1.0.
    fn screenshot(&self, scale: f64) -> Option<Vec<u8>>;

    fn tap(&self, x: i32, y: i32) -> bool;

    fn double_tap(&self, x: i32, y: i32) -> bool;

    fn long_press(&self, x: i32, y: i32, duration_ms: u64) -> bool;

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> bool;

    fn press_key(&self, keycode: u32) -> bool;

    fn press_back(&self) -> bool {
        self.press_key(keycode::BACK)
    }

    fn press_home(&self) -> bool {
        self.press_key(keycode::HOME)
    }

    /// Start the launcher activity of `package`.
    fn launch_app(&self, package: &str) -> bool;

    fn stop_app(&self, package: &str) -> bool;

    /// Plain `input text` injection (ASCII-safe).
    fn input_text(&self, text: &str) -> bool;

    /// IME broadcast injection supporting any Unicode text.
    ///
    /// Devices without an injection IME return `false` so callers fall back
    /// to [`Device::input_text`].
    fn input_text_ime(&self, _text: &str) -> bool {
        false
    }

    /// Package id of the foreground app.
    fn get_current_app(&self) -> Option<String>;

    /// Installed third-party package ids.
    fn list_packages(&self) -> Vec<String> {
        Vec::new()
    }
}

//! ADB-backed device controller.

use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::connection::run_adb;
use super::input::{broadcast_delivered, encode_ime_text, escape_input_text, ADB_KEYBOARD_IME};
use super::screenshot::process_screenshot;
use crate::device::Device;

/// Fallback screen size when `wm size` cannot be read.
pub const DEFAULT_SCREEN_SIZE: (u32, u32) = (1080, 1920);

static FOCUS_PACKAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+(?:\.\w+)+)/").unwrap());

static WM_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)x(\d+)").unwrap());

/// Controls one Android device through the `adb` binary.
///
/// # Example
/// ```rust,no_run
/// use phone_pilot::adb::AdbDevice;
/// use phone_pilot::device::Device;
///
/// let device = AdbDevice::new("emulator-5554");
/// device.press_home();
/// ```
pub struct AdbDevice {
    adb_path: String,
    device_id: String,
    screen_size: OnceLock<(u32, u32)>,
    double_tap_interval: Duration,
}

impl AdbDevice {
    /// Create a controller for `device_id` using `adb` from `PATH`.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_id: device_id.into(),
            screen_size: OnceLock::new(),
            double_tap_interval: Duration::from_millis(100),
        }
    }

    /// Use a custom ADB binary.
    pub fn with_adb_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    /// Pause between the two taps of a double tap.
    pub fn with_double_tap_interval(mut self, interval: Duration) -> Self {
        self.double_tap_interval = interval;
        self
    }

    /// Run `adb shell <args>`, returning stdout when the command exited cleanly.
    fn shell(&self, args: &[&str]) -> Option<String> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);

        let output = run_adb(&self.adb_path, Some(&self.device_id), &full)?;
        if !output.status.success() {
            tracing::warn!(
                "adb shell {:?} exited with {}: {}",
                args,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn shell_ok(&self, args: &[&str]) -> bool {
        self.shell(args).is_some()
    }

    fn read_screen_size(&self) -> (u32, u32) {
        let Some(output) = self.shell(&["wm", "size"]) else {
            return DEFAULT_SCREEN_SIZE;
        };
        // "Override size" wins over "Physical size" when both are present.
        let line = output
            .lines()
            .find(|l| l.contains("Override size"))
            .or_else(|| output.lines().find(|l| l.contains("Physical size")));
        line.and_then(parse_size).unwrap_or(DEFAULT_SCREEN_SIZE)
    }
}

fn parse_size(line: &str) -> Option<(u32, u32)> {
    let caps = WM_SIZE.captures(line)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Extract the focused package from `dumpsys window` output.
pub fn parse_focused_package(dumpsys: &str) -> Option<String> {
    dumpsys
        .lines()
        .filter(|line| line.contains("mCurrentFocus") || line.contains("mFocusedApp"))
        .find_map(|line| FOCUS_PACKAGE.captures(line).map(|c| c[1].to_string()))
}

impl Device for AdbDevice {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn screen_size(&self) -> (u32, u32) {
        *self.screen_size.get_or_init(|| self.read_screen_size())
    }

    fn screenshot(&self, scale: f64) -> Option<Vec<u8>> {
        // exec-out streams the PNG to stdout without touching device storage
        let output = run_adb(
            &self.adb_path,
            Some(&self.device_id),
            &["exec-out", "screencap", "-p"],
        )?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Status: -1") || stderr.contains("Failed") {
            tracing::warn!("Screenshot blocked (sensitive screen?): {}", stderr.trim());
            return None;
        }
        process_screenshot(&output.stdout, scale)
    }

    fn tap(&self, x: i32, y: i32) -> bool {
        self.shell_ok(&["input", "tap", &x.to_string(), &y.to_string()])
    }

    fn double_tap(&self, x: i32, y: i32) -> bool {
        if !self.tap(x, y) {
            return false;
        }
        thread::sleep(self.double_tap_interval);
        self.tap(x, y)
    }

    fn long_press(&self, x: i32, y: i32, duration_ms: u64) -> bool {
        let (x, y) = (x.to_string(), y.to_string());
        self.shell_ok(&["input", "swipe", &x, &y, &x, &y, &duration_ms.to_string()])
    }

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> bool {
        self.shell_ok(&[
            "input",
            "swipe",
            &x1.to_string(),
            &y1.to_string(),
            &x2.to_string(),
            &y2.to_string(),
            &duration_ms.to_string(),
        ])
    }

    fn press_key(&self, keycode: u32) -> bool {
        self.shell_ok(&["input", "keyevent", &keycode.to_string()])
    }

    fn launch_app(&self, package: &str) -> bool {
        match self.shell(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ]) {
            Some(out) => !out.contains("No activities found") && !out.contains("aborted"),
            None => false,
        }
    }

    fn stop_app(&self, package: &str) -> bool {
        self.shell_ok(&["am", "force-stop", package])
    }

    fn input_text(&self, text: &str) -> bool {
        let escaped = format!("\"{}\"", escape_input_text(text));
        self.shell_ok(&["input", "text", &escaped])
    }

    fn input_text_ime(&self, text: &str) -> bool {
        let current = self
            .shell(&["settings", "get", "secure", "default_input_method"])
            .unwrap_or_default();
        if !current.contains(ADB_KEYBOARD_IME) && !self.shell_ok(&["ime", "set", ADB_KEYBOARD_IME]) {
            return false;
        }

        let delivered = self
            .shell(&[
                "am",
                "broadcast",
                "-a",
                "ADB_INPUT_B64",
                "--es",
                "msg",
                &encode_ime_text(text),
            ])
            .map(|out| broadcast_delivered(&out))
            .unwrap_or(false);

        let original = current.trim();
        if !original.is_empty() && !original.contains(ADB_KEYBOARD_IME) {
            self.shell_ok(&["ime", "set", original]);
        }
        delivered
    }

    fn get_current_app(&self) -> Option<String> {
        let output = self.shell(&["dumpsys", "window"])?;
        parse_focused_package(&output)
    }

    fn list_packages(&self) -> Vec<String> {
        self.shell(&["pm", "list", "packages", "-3"])
            .map(|out| {
                out.lines()
                    .filter_map(|l| l.trim().strip_prefix("package:"))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_focused_package() {
        let dumpsys = "  mCurrentFocus=Window{1a2b u0 com.android.settings/com.android.settings.Settings}\n\
                       mFocusedApp=ActivityRecord{3c4d u0 com.android.settings/.Settings t12}";
        assert_eq!(
            parse_focused_package(dumpsys).as_deref(),
            Some("com.android.settings")
        );
        assert_eq!(parse_focused_package("nothing focused"), None);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("Physical size: 1080x2400"), Some((1080, 2400)));
        assert_eq!(parse_size("garbage"), None);
    }

    #[test]
    fn test_device_id() {
        let device = AdbDevice::new("emulator-5554");
        assert_eq!(device.device_id(), "emulator-5554");
    }
}

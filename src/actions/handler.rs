//! Action handler: executes parsed directives against a device.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use super::directive::{ActionDirective, LaunchTarget, Point, SwipeDirection, SwipeGesture};
use crate::config::{get_package, keyword_hints};
use crate::device::{keycode, Device};

/// Upper bound of the normalized coordinate space.
pub const COORDINATE_MAX: f64 = 1000.0;

/// Tunables for gesture timing.
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// `Wait` seconds are clamped into `[wait_min_secs, wait_max_secs]`.
    pub wait_min_secs: f64,
    pub wait_max_secs: f64,
    /// Pause between tapping a field and typing into it.
    pub focus_delay: Duration,
    /// Delete presses sent when `TapAndType` clears a field.
    pub clear_key_presses: u32,
    pub swipe_duration_ms: u64,
    /// Length of a canned directional swipe, as a fraction of the screen.
    pub swipe_distance: f64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            wait_min_secs: 1.0,
            wait_max_secs: 30.0,
            focus_delay: Duration::from_millis(500),
            clear_key_presses: 50,
            swipe_duration_ms: 300,
            swipe_distance: 0.5,
        }
    }
}

/// Result of an action execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    pub should_finish: bool,
    pub message: Option<String>,
    /// Set when the model asked the operator to take over.
    pub paused: bool,
}

impl ActionOutcome {
    /// Create a successful result.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            should_finish: false,
            message: Some(message.into()),
            paused: false,
        }
    }

    /// Create a failure result.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            should_finish: false,
            message: Some(message.into()),
            paused: false,
        }
    }

    /// Create a finish result.
    pub fn finish(message: impl Into<String>) -> Self {
        Self {
            success: true,
            should_finish: true,
            message: Some(message.into()),
            paused: false,
        }
    }

    pub fn pause(message: impl Into<String>) -> Self {
        Self {
            paused: true,
            ..Self::finish(message)
        }
    }

    fn from_bool(ok: bool, done: String, failed: &str) -> Self {
        if ok {
            Self::success(done)
        } else {
            Self::failure(failed)
        }
    }
}

/// Convert a normalized 0-1000 point to device pixels.
pub fn to_pixel(point: Point, screen: (u32, u32)) -> (i32, i32) {
    let scale = |n: f64, dim: u32| {
        let n = if n.is_finite() { n.clamp(0.0, COORDINATE_MAX) } else { 0.0 };
        (n / COORDINATE_MAX * dim as f64).round() as i32
    };
    (scale(point.0, screen.0), scale(point.1, screen.1))
}

/// Find an installed package whose id contains the app name or one of its
/// keyword hints.
pub fn search_installed(packages: &[String], app_name: &str) -> Option<String> {
    let keywords = keyword_hints(app_name);
    packages
        .iter()
        .find(|pkg| {
            let pkg = pkg.to_lowercase();
            keywords.iter().any(|kw| !kw.is_empty() && pkg.contains(kw.as_str()))
        })
        .cloned()
}

fn preview(text: &str) -> String {
    let mut short: String = text.chars().take(20).collect();
    if text.chars().count() > 20 {
        short.push_str("...");
    }
    short
}

/// Executes model directives on a device.
pub struct ActionHandler {
    device: Arc<dyn Device>,
    config: ActionConfig,
}

impl ActionHandler {
    pub fn new(device: Arc<dyn Device>, config: ActionConfig) -> Self {
        Self { device, config }
    }

    pub fn config(&self) -> &ActionConfig {
        &self.config
    }

    /// Parse and execute one directive.
    ///
    /// Malformed directives and device failures come back as unsuccessful
    /// outcomes carrying a message for the model.
    pub async fn execute(&self, directive_json: &str) -> ActionOutcome {
        match ActionDirective::parse(directive_json) {
            Ok(directive) => self.dispatch(&directive).await,
            Err(e) => {
                tracing::warn!("Rejected action directive: {}", e);
                ActionOutcome::failure(e.to_string())
            }
        }
    }

    /// Execute an already parsed directive.
    pub async fn dispatch(&self, directive: &ActionDirective) -> ActionOutcome {
        tracing::debug!("Executing {:?}", directive);
        match directive {
            ActionDirective::Tap {
                point,
                long_press_ms: Some(duration),
            }
            | ActionDirective::LongPress {
                point,
                duration_ms: duration,
            } => {
                let (x, y) = self.resolve(*point);
                ActionOutcome::from_bool(
                    self.device.long_press(x, y, *duration),
                    format!("Long pressed ({}, {}) for {}ms", x, y, duration),
                    "Long press failed",
                )
            }
            ActionDirective::Tap { point, .. } => {
                let (x, y) = self.resolve(*point);
                ActionOutcome::from_bool(self.device.tap(x, y), format!("Tapped ({}, {})", x, y), "Tap failed")
            }
            ActionDirective::DoubleTap { point } => {
                let (x, y) = self.resolve(*point);
                ActionOutcome::from_bool(
                    self.device.double_tap(x, y),
                    format!("Double tapped ({}, {})", x, y),
                    "Double tap failed",
                )
            }
            ActionDirective::Swipe(gesture) => self.swipe(gesture),
            ActionDirective::Drag {
                start,
                end,
                duration_ms,
            } => {
                let (x1, y1) = self.resolve(*start);
                let (x2, y2) = self.resolve(*end);
                ActionOutcome::from_bool(
                    self.device.swipe(x1, y1, x2, y2, *duration_ms),
                    format!("Dragged ({},{}) -> ({},{}) in {}ms", x1, y1, x2, y2, duration_ms),
                    "Drag failed",
                )
            }
            ActionDirective::Type { text } => ActionOutcome::from_bool(
                self.type_text(text),
                format!("Typed: {}", preview(text)),
                "Text input failed",
            ),
            ActionDirective::TapAndType { point, text, clear } => {
                self.tap_and_type(*point, text, *clear).await
            }
            ActionDirective::Launch(target) => self.launch(target),
            ActionDirective::KeyPress { key, keycode } => ActionOutcome::from_bool(
                self.device.press_key(*keycode),
                format!("Pressed key: {}", key),
                &format!("Key press failed: {}", key),
            ),
            ActionDirective::Back => {
                ActionOutcome::from_bool(self.device.press_back(), "Pressed back".to_string(), "Back failed")
            }
            ActionDirective::Home => {
                ActionOutcome::from_bool(self.device.press_home(), "Returned home".to_string(), "Home failed")
            }
            ActionDirective::Wait { seconds } => {
                let seconds = self.clamp_wait(*seconds);
                sleep(Duration::from_secs_f64(seconds)).await;
                ActionOutcome::success(format!("Waited {}s", seconds))
            }
            ActionDirective::Finish { message } => {
                ActionOutcome::finish(message.clone().unwrap_or_else(|| "Task completed".to_string()))
            }
            ActionDirective::Pause { message } => ActionOutcome::pause(format!(
                "[Paused] {}",
                message.as_deref().unwrap_or("Waiting for user")
            )),
        }
    }

    fn resolve(&self, point: Point) -> (i32, i32) {
        to_pixel(point, self.device.screen_size())
    }

    fn clamp_wait(&self, seconds: f64) -> f64 {
        let seconds = if seconds.is_finite() { seconds } else { self.config.wait_min_secs };
        seconds.clamp(self.config.wait_min_secs, self.config.wait_max_secs.max(self.config.wait_min_secs))
    }

    fn swipe(&self, gesture: &SwipeGesture) -> ActionOutcome {
        match gesture {
            SwipeGesture::Between { from, to } => {
                let (x1, y1) = self.resolve(*from);
                let (x2, y2) = self.resolve(*to);
                ActionOutcome::from_bool(
                    self.device.swipe(x1, y1, x2, y2, self.config.swipe_duration_ms),
                    format!("Swiped ({},{}) -> ({},{})", x1, y1, x2, y2),
                    "Swipe failed",
                )
            }
            SwipeGesture::Direction(direction) => {
                let ((x1, y1), (x2, y2)) = self.directional_swipe(*direction);
                ActionOutcome::from_bool(
                    self.device.swipe(x1, y1, x2, y2, self.config.swipe_duration_ms),
                    format!("Swiped {}", direction.as_str()),
                    "Swipe failed",
                )
            }
        }
    }

    /// Pixel endpoints of a canned swipe. Content moves with the finger, so
    /// "up" drags from the lower part of the screen toward the top.
    fn directional_swipe(&self, direction: SwipeDirection) -> ((i32, i32), (i32, i32)) {
        let (w, h) = self.device.screen_size();
        let (w, h) = (w as f64, h as f64);
        let d = self.config.swipe_distance;
        let (from, to) = match direction {
            SwipeDirection::Up => ((0.5, 0.7), (0.5, 0.7 - d)),
            SwipeDirection::Down => ((0.5, 0.3), (0.5, 0.3 + d)),
            SwipeDirection::Left => ((0.8, 0.5), (0.8 - d, 0.5)),
            SwipeDirection::Right => ((0.2, 0.5), (0.2 + d, 0.5)),
        };
        let px = |(fx, fy): (f64, f64)| {
            (
                (fx.clamp(0.0, 1.0) * w).round() as i32,
                (fy.clamp(0.0, 1.0) * h).round() as i32,
            )
        };
        (px(from), px(to))
    }

    fn type_text(&self, text: &str) -> bool {
        if self.device.input_text_ime(text) {
            return true;
        }
        tracing::debug!("IME input unavailable, falling back to input text");
        self.device.input_text(text)
    }

    async fn tap_and_type(&self, point: Point, text: &str, clear: bool) -> ActionOutcome {
        let (x, y) = self.resolve(point);
        if !self.device.tap(x, y) {
            return ActionOutcome::failure(format!("TapAndType failed at tap ({}, {})", x, y));
        }
        sleep(self.config.focus_delay).await;

        if clear {
            let cleared = self.device.press_key(keycode::MOVE_END)
                && (0..self.config.clear_key_presses).all(|_| self.device.press_key(keycode::DEL));
            if !cleared {
                return ActionOutcome::failure("TapAndType failed while clearing the field");
            }
        }

        if !self.type_text(text) {
            return ActionOutcome::failure("TapAndType failed while typing");
        }
        ActionOutcome::success(format!("Tapped ({}, {}) and typed: {}", x, y, preview(text)))
    }

    fn launch(&self, target: &LaunchTarget) -> ActionOutcome {
        let (package, label) = match target {
            LaunchTarget::Package(package) => (package.clone(), package.clone()),
            LaunchTarget::AppName(name) => match self.resolve_package(name) {
                Some(package) => {
                    let label = format!("{} ({})", name, package);
                    (package, label)
                }
                None => return ActionOutcome::failure(format!("App not found: {}", name)),
            },
        };

        ActionOutcome::from_bool(
            self.device.launch_app(&package),
            format!("Launched {}", label),
            &format!("Failed to launch {}", label),
        )
    }

    fn resolve_package(&self, app_name: &str) -> Option<String> {
        if let Some(package) = get_package(app_name) {
            return Some(package.to_string());
        }
        let found = search_installed(&self.device.list_packages(), app_name);
        if let Some(package) = &found {
            tracing::info!("Resolved '{}' to installed package {}", app_name, package);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DeviceCall, MockDevice};

    fn handler(device: Arc<MockDevice>) -> ActionHandler {
        let config = ActionConfig {
            wait_min_secs: 0.0,
            wait_max_secs: 0.01,
            focus_delay: Duration::ZERO,
            clear_key_presses: 3,
            ..ActionConfig::default()
        };
        ActionHandler::new(device, config)
    }

    #[test]
    fn test_to_pixel_boundaries() {
        assert_eq!(to_pixel((0.0, 0.0), (1080, 2400)), (0, 0));
        assert_eq!(to_pixel((1000.0, 1000.0), (1080, 2400)), (1080, 2400));
        assert_eq!(to_pixel((500.0, 500.0), (1080, 2400)), (540, 1200));
        assert_eq!(to_pixel((333.0, 1.0), (1080, 2400)), (360, 2));
        assert_eq!(to_pixel((-5.0, 1200.0), (1080, 2400)), (0, 2400));
    }

    #[test]
    fn test_search_installed() {
        let packages = vec!["com.seasun.jx3.wujie".to_string(), "com.termux".to_string()];
        assert_eq!(search_installed(&packages, "剑网3无界").as_deref(), Some("com.seasun.jx3.wujie"));
        assert_eq!(search_installed(&packages, "Termux").as_deref(), Some("com.termux"));
        assert_eq!(search_installed(&packages, "原神"), None);
    }

    #[tokio::test]
    async fn test_tap_uses_screen_size() {
        let device = Arc::new(MockDevice::new());
        let outcome = handler(device.clone())
            .execute(r#"{"action": "Tap", "params": {"element": [500, 250]}}"#)
            .await;
        assert!(outcome.success);
        assert!(!outcome.should_finish);
        assert_eq!(device.calls(), vec![DeviceCall::Tap(540, 600)]);
    }

    #[tokio::test]
    async fn test_tap_long_press_flag() {
        let device = Arc::new(MockDevice::new());
        handler(device.clone())
            .execute(r#"{"action": "Tap", "params": {"element": [0, 0], "long_press": true, "duration": 1500}}"#)
            .await;
        assert_eq!(device.calls(), vec![DeviceCall::LongPress(0, 0, 1500)]);
    }

    #[tokio::test]
    async fn test_directional_swipe() {
        let device = Arc::new(MockDevice::new());
        let outcome = handler(device.clone())
            .execute(r#"{"action": "Swipe", "params": {"direction": "up"}}"#)
            .await;
        assert!(outcome.success);
        assert_eq!(device.calls(), vec![DeviceCall::Swipe(540, 1680, 540, 480, 300)]);
    }

    #[tokio::test]
    async fn test_type_falls_back_when_ime_fails() {
        let device = Arc::new(MockDevice::new().without_ime());
        let outcome = handler(device.clone())
            .execute(r#"{"action": "Type", "params": {"text": "hello"}}"#)
            .await;
        assert!(outcome.success);
        assert_eq!(
            device.calls(),
            vec![DeviceCall::InputTextIme("hello".into()), DeviceCall::InputText("hello".into())]
        );
    }

    #[tokio::test]
    async fn test_tap_and_type_clears_field() {
        let device = Arc::new(MockDevice::new());
        let outcome = handler(device.clone())
            .execute(r#"{"action": "TapAndType", "params": {"element": [500, 500], "text": "abc", "clear": true}}"#)
            .await;
        assert!(outcome.success);
        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::Tap(540, 1200),
                DeviceCall::PressKey(123),
                DeviceCall::PressKey(67),
                DeviceCall::PressKey(67),
                DeviceCall::PressKey(67),
                DeviceCall::InputTextIme("abc".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_tap_and_type_reports_failed_stage() {
        let device = Arc::new(MockDevice::new().failing());
        let outcome = handler(device.clone())
            .execute(r#"{"action": "TapAndType", "params": {"text": "abc"}}"#)
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("tap"));
        assert_eq!(device.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_launch_by_name_and_search() {
        let device = Arc::new(MockDevice::new().with_packages(&["com.miHoYo.GenshinImpact"]));
        let h = handler(device.clone());

        let outcome = h.execute(r#"{"action": "Launch", "params": {"app_name": "设置"}}"#).await;
        assert!(outcome.success);

        let outcome = h.execute(r#"{"action": "Launch", "params": {"app_name": "原神"}}"#).await;
        assert!(outcome.success);

        let outcome = h.execute(r#"{"action": "Launch", "params": {"app_name": "不存在的应用"}}"#).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("App not found: 不存在的应用"));

        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::Launch("com.android.settings".into()),
                DeviceCall::Launch("com.miHoYo.GenshinImpact".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_wait_is_clamped() {
        let device = Arc::new(MockDevice::new());
        let outcome = handler(device)
            .execute(r#"{"action": "Wait", "params": {"seconds": 120}}"#)
            .await;
        assert_eq!(outcome.message.as_deref(), Some("Waited 0.01s"));
    }

    #[tokio::test]
    async fn test_terminal_actions() {
        let h = handler(Arc::new(MockDevice::new()));

        let outcome = h.execute(r#"{"action": "finish", "params": {"message": "done"}}"#).await;
        assert_eq!(outcome, ActionOutcome::finish("done"));

        let outcome = h.execute(r#"{"action": "pause", "params": {"message": "captcha"}}"#).await;
        assert!(outcome.should_finish && outcome.paused);
        assert_eq!(outcome.message.as_deref(), Some("[Paused] captcha"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_non_fatal() {
        let device = Arc::new(MockDevice::new());
        let h = handler(device.clone());
        for _ in 0..2 {
            let outcome = h.execute("{not json").await;
            assert!(!outcome.success);
            assert!(!outcome.should_finish);
        }
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_device_failure_is_reported() {
        let h = handler(Arc::new(MockDevice::new().failing()));
        let outcome = h.execute(r#"{"action": "Home"}"#).await;
        assert_eq!(outcome, ActionOutcome::failure("Home failed"));
    }
}

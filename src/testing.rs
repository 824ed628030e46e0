//! In-memory device and model doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::device::Device;
use crate::model::{split_response, ConversationMessage, ModelClient, ModelError, ModelResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Tap(i32, i32),
    DoubleTap(i32, i32),
    LongPress(i32, i32, u64),
    Swipe(i32, i32, i32, i32, u64),
    PressKey(u32),
    Launch(String),
    Stop(String),
    InputText(String),
    InputTextIme(String),
}

/// Records every input operation. Screen is 1080x2400.
pub struct MockDevice {
    calls: Mutex<Vec<DeviceCall>>,
    ime: bool,
    ok: bool,
    packages: Vec<String>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            ime: true,
            ok: true,
            packages: Vec::new(),
        }
    }

    pub fn without_ime(mut self) -> Self {
        self.ime = false;
        self
    }

    /// Every operation reports failure.
    pub fn failing(mut self) -> Self {
        self.ok = false;
        self
    }

    pub fn with_packages(mut self, packages: &[&str]) -> Self {
        self.packages = packages.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: DeviceCall) -> bool {
        self.calls.lock().unwrap().push(call);
        self.ok
    }
}

impl Device for MockDevice {
    fn device_id(&self) -> &str {
        "mock"
    }

    fn screen_size(&self) -> (u32, u32) {
        (1080, 2400)
    }

    fn screenshot(&self, _scale: f64) -> Option<Vec<u8>> {
        Some(vec![0x89, b'P', b'N', b'G'])
    }

    fn tap(&self, x: i32, y: i32) -> bool {
        self.record(DeviceCall::Tap(x, y))
    }

    fn double_tap(&self, x: i32, y: i32) -> bool {
        self.record(DeviceCall::DoubleTap(x, y))
    }

    fn long_press(&self, x: i32, y: i32, duration_ms: u64) -> bool {
        self.record(DeviceCall::LongPress(x, y, duration_ms))
    }

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> bool {
        self.record(DeviceCall::Swipe(x1, y1, x2, y2, duration_ms))
    }

    fn press_key(&self, keycode: u32) -> bool {
        self.record(DeviceCall::PressKey(keycode))
    }

    fn launch_app(&self, package: &str) -> bool {
        self.record(DeviceCall::Launch(package.to_string()))
    }

    fn stop_app(&self, package: &str) -> bool {
        self.record(DeviceCall::Stop(package.to_string()))
    }

    fn input_text(&self, text: &str) -> bool {
        self.record(DeviceCall::InputText(text.to_string()))
    }

    fn input_text_ime(&self, text: &str) -> bool {
        self.record(DeviceCall::InputTextIme(text.to_string())) && self.ime
    }

    fn get_current_app(&self) -> Option<String> {
        Some("com.android.launcher".to_string())
    }

    fn list_packages(&self) -> Vec<String> {
        self.packages.clone()
    }
}

/// Replays canned replies in order and errors once they run out.
/// Each call reports 10 prompt and 5 completion tokens.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of messages in each request received so far.
    pub fn request_lengths(&self) -> Vec<usize> {
        self.requests.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn last_request(&self) -> Vec<ConversationMessage> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn request(
        &self,
        messages: &[ConversationMessage],
        _image: Option<&[u8]>,
    ) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let raw = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::ApiError {
                status: 503,
                body: "script exhausted".to_string(),
            })?;
        let (thinking, action) = split_response(&raw);
        Ok(ModelResponse {
            thinking,
            action,
            raw_content: raw,
            prompt_tokens: 10,
            completion_tokens: 5,
        })
    }

    fn provider_name(&self) -> &str {
        "test"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

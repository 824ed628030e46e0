//! Typed action directives parsed from model output.
//!
//! Wire format: `{"action": <kind>, "params": {...}}`. Kind strings are the
//! exact literals models were prompted with, including `"Long Press"`,
//! `"Double Tap"`, `"finish"` and `"pause"`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::device::keycode_for;

/// A point in the normalized 0-1000 coordinate space.
pub type Point = (f64, f64);

const CENTER: Point = (500.0, 500.0);
const DEFAULT_PRESS_MS: u64 = 1000;
const DEFAULT_WAIT_SECS: f64 = 5.0;

/// Errors raised while parsing a directive. None of them are fatal to a task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectiveError {
    #[error("Invalid action JSON: {0}")]
    InvalidJson(String),
    #[error("Missing action field")]
    MissingAction,
    #[error("Unknown action type: {0}")]
    UnknownAction(String),
    #[error("Invalid params for {action}: {reason}")]
    InvalidParams { action: &'static str, reason: String },
    #[error("Missing required parameter for {action}: {param}")]
    MissingParam {
        action: &'static str,
        param: &'static str,
    },
    #[error("Unknown key: {0}")]
    UnknownKey(String),
}

/// Every action kind the interpreter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Tap,
    Swipe,
    Drag,
    Type,
    TapAndType,
    Launch,
    KeyPress,
    Back,
    Home,
    Wait,
    LongPress,
    DoubleTap,
    Finish,
    Pause,
}

impl ActionKind {
    pub const ALL: [ActionKind; 14] = [
        ActionKind::Tap,
        ActionKind::Swipe,
        ActionKind::Drag,
        ActionKind::Type,
        ActionKind::TapAndType,
        ActionKind::Launch,
        ActionKind::KeyPress,
        ActionKind::Back,
        ActionKind::Home,
        ActionKind::Wait,
        ActionKind::LongPress,
        ActionKind::DoubleTap,
        ActionKind::Finish,
        ActionKind::Pause,
    ];

    /// The literal used on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ActionKind::Tap => "Tap",
            ActionKind::Swipe => "Swipe",
            ActionKind::Drag => "Drag",
            ActionKind::Type => "Type",
            ActionKind::TapAndType => "TapAndType",
            ActionKind::Launch => "Launch",
            ActionKind::KeyPress => "KeyPress",
            ActionKind::Back => "Back",
            ActionKind::Home => "Home",
            ActionKind::Wait => "Wait",
            ActionKind::LongPress => "Long Press",
            ActionKind::DoubleTap => "Double Tap",
            ActionKind::Finish => "finish",
            ActionKind::Pause => "pause",
        }
    }

    /// Resolve a wire name. Exact literals first, then a loose match that
    /// ignores case, spaces and underscores ("long_press", "Finish").
    pub fn from_wire(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(kind) = Self::ALL.iter().find(|k| k.wire_name() == name) {
            return Some(*kind);
        }
        let loose = normalize(name);
        Self::ALL
            .iter()
            .find(|k| normalize(k.wire_name()) == loose)
            .copied()
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Direction of a canned swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "up" => Some(SwipeDirection::Up),
            "down" => Some(SwipeDirection::Down),
            "left" => Some(SwipeDirection::Left),
            "right" => Some(SwipeDirection::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwipeGesture {
    Between { from: Point, to: Point },
    Direction(SwipeDirection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaunchTarget {
    /// Display name, resolved through the app table and on-device search.
    AppName(String),
    Package(String),
}

/// One parsed model instruction with typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionDirective {
    Tap {
        point: Point,
        /// Hold duration when the model asked for a long press.
        long_press_ms: Option<u64>,
    },
    Swipe(SwipeGesture),
    Drag {
        start: Point,
        end: Point,
        duration_ms: u64,
    },
    Type {
        text: String,
    },
    TapAndType {
        point: Point,
        text: String,
        clear: bool,
    },
    Launch(LaunchTarget),
    KeyPress {
        key: String,
        keycode: u32,
    },
    Back,
    Home,
    Wait {
        seconds: f64,
    },
    LongPress {
        point: Point,
        duration_ms: u64,
    },
    DoubleTap {
        point: Point,
    },
    Finish {
        message: Option<String>,
    },
    Pause {
        message: Option<String>,
    },
}

fn center() -> Point {
    CENTER
}

fn default_press_ms() -> u64 {
    DEFAULT_PRESS_MS
}

fn default_wait_secs() -> f64 {
    DEFAULT_WAIT_SECS
}

#[derive(Deserialize)]
struct TapParams {
    #[serde(default = "center")]
    element: Point,
    #[serde(default)]
    long_press: bool,
    #[serde(default = "default_press_ms")]
    duration: u64,
}

#[derive(Deserialize)]
struct SwipeParams {
    #[serde(default)]
    element: Option<Vec<f64>>,
    #[serde(default)]
    direction: Option<String>,
}

#[derive(Deserialize)]
struct DragParams {
    #[serde(default = "center")]
    start: Point,
    #[serde(default = "center")]
    end: Point,
    #[serde(default = "default_press_ms")]
    duration: u64,
}

#[derive(Deserialize)]
struct TextParams {
    #[serde(default = "center")]
    element: Point,
    #[serde(default)]
    text: String,
    #[serde(default)]
    clear: bool,
}

#[derive(Deserialize)]
struct LaunchParams {
    #[serde(default)]
    app_name: Option<String>,
    #[serde(default)]
    package: Option<String>,
}

#[derive(Deserialize)]
struct KeyParams {
    #[serde(default)]
    key: String,
}

#[derive(Deserialize)]
struct WaitParams {
    #[serde(default = "default_wait_secs")]
    seconds: f64,
}

#[derive(Deserialize)]
struct PressParams {
    #[serde(default = "center")]
    element: Point,
    #[serde(default = "default_press_ms")]
    duration: u64,
}

#[derive(Deserialize)]
struct MessageParams {
    #[serde(default)]
    message: Option<String>,
}

fn decode<T: DeserializeOwned>(kind: ActionKind, params: &Map<String, Value>) -> Result<T, DirectiveError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|e| DirectiveError::InvalidParams {
        action: kind.wire_name(),
        reason: e.to_string(),
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Whitespace-only counts as missing; anything else is kept verbatim.
fn verbatim(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

impl ActionDirective {
    /// Parse a directive from its JSON wire form.
    pub fn parse(json: &str) -> Result<Self, DirectiveError> {
        let value: Value = serde_json::from_str(json.trim())
            .map_err(|_| DirectiveError::InvalidJson(json.chars().take(100).collect()))?;

        let name = value
            .get("action")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or(DirectiveError::MissingAction)?;
        let kind =
            ActionKind::from_wire(name).ok_or_else(|| DirectiveError::UnknownAction(name.to_string()))?;

        let empty = Map::new();
        let params = match value.get("params") {
            Some(Value::Object(map)) => map,
            None | Some(Value::Null) => &empty,
            Some(other) => {
                return Err(DirectiveError::InvalidParams {
                    action: kind.wire_name(),
                    reason: format!("params must be an object, got {}", other),
                })
            }
        };

        Self::from_params(kind, params)
    }

    fn from_params(kind: ActionKind, params: &Map<String, Value>) -> Result<Self, DirectiveError> {
        let missing = |param| DirectiveError::MissingParam {
            action: kind.wire_name(),
            param,
        };

        let directive = match kind {
            ActionKind::Tap => {
                let p: TapParams = decode(kind, params)?;
                ActionDirective::Tap {
                    point: p.element,
                    long_press_ms: p.long_press.then_some(p.duration),
                }
            }
            ActionKind::Swipe => {
                let p: SwipeParams = decode(kind, params)?;
                match p.element {
                    Some(e) if e.len() >= 4 => ActionDirective::Swipe(SwipeGesture::Between {
                        from: (e[0], e[1]),
                        to: (e[2], e[3]),
                    }),
                    _ => {
                        let raw = p.direction.unwrap_or_else(|| "up".to_string());
                        let direction =
                            SwipeDirection::parse(&raw).ok_or_else(|| DirectiveError::InvalidParams {
                                action: kind.wire_name(),
                                reason: format!("unknown direction '{}'", raw),
                            })?;
                        ActionDirective::Swipe(SwipeGesture::Direction(direction))
                    }
                }
            }
            ActionKind::Drag => {
                let p: DragParams = decode(kind, params)?;
                ActionDirective::Drag {
                    start: p.start,
                    end: p.end,
                    duration_ms: p.duration,
                }
            }
            ActionKind::Type => {
                let p: TextParams = decode(kind, params)?;
                if p.text.is_empty() {
                    return Err(missing("text"));
                }
                ActionDirective::Type { text: p.text }
            }
            ActionKind::TapAndType => {
                let p: TextParams = decode(kind, params)?;
                if p.text.is_empty() {
                    return Err(missing("text"));
                }
                ActionDirective::TapAndType {
                    point: p.element,
                    text: p.text,
                    clear: p.clear,
                }
            }
            ActionKind::Launch => {
                let p: LaunchParams = decode(kind, params)?;
                match (non_empty(p.app_name), non_empty(p.package)) {
                    (Some(name), _) => ActionDirective::Launch(LaunchTarget::AppName(name)),
                    (None, Some(package)) => ActionDirective::Launch(LaunchTarget::Package(package)),
                    (None, None) => return Err(missing("app_name or package")),
                }
            }
            ActionKind::KeyPress => {
                let p: KeyParams = decode(kind, params)?;
                let key = p.key.trim().to_lowercase();
                if key.is_empty() {
                    return Err(missing("key"));
                }
                let keycode = keycode_for(&key).ok_or_else(|| DirectiveError::UnknownKey(p.key.clone()))?;
                ActionDirective::KeyPress { key, keycode }
            }
            ActionKind::Back => ActionDirective::Back,
            ActionKind::Home => ActionDirective::Home,
            ActionKind::Wait => {
                let p: WaitParams = decode(kind, params)?;
                ActionDirective::Wait { seconds: p.seconds }
            }
            ActionKind::LongPress => {
                let p: PressParams = decode(kind, params)?;
                ActionDirective::LongPress {
                    point: p.element,
                    duration_ms: p.duration,
                }
            }
            ActionKind::DoubleTap => {
                let p: PressParams = decode(kind, params)?;
                ActionDirective::DoubleTap { point: p.element }
            }
            ActionKind::Finish => {
                let p: MessageParams = decode(kind, params)?;
                ActionDirective::Finish {
                    message: verbatim(p.message),
                }
            }
            ActionKind::Pause => {
                let p: MessageParams = decode(kind, params)?;
                ActionDirective::Pause {
                    message: verbatim(p.message),
                }
            }
        };
        Ok(directive)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ActionDirective::Tap { .. } => ActionKind::Tap,
            ActionDirective::Swipe(_) => ActionKind::Swipe,
            ActionDirective::Drag { .. } => ActionKind::Drag,
            ActionDirective::Type { .. } => ActionKind::Type,
            ActionDirective::TapAndType { .. } => ActionKind::TapAndType,
            ActionDirective::Launch(_) => ActionKind::Launch,
            ActionDirective::KeyPress { .. } => ActionKind::KeyPress,
            ActionDirective::Back => ActionKind::Back,
            ActionDirective::Home => ActionKind::Home,
            ActionDirective::Wait { .. } => ActionKind::Wait,
            ActionDirective::LongPress { .. } => ActionKind::LongPress,
            ActionDirective::DoubleTap { .. } => ActionKind::DoubleTap,
            ActionDirective::Finish { .. } => ActionKind::Finish,
            ActionDirective::Pause { .. } => ActionKind::Pause,
        }
    }
}

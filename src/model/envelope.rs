//! Tolerant parser for the JSON envelope models reply with.
//!
//! A reply is expected to look like
//!
//! ```json
//! {"thinking": "...", "action": "Tap", "params": {"element": [500, 300]},
//!  "phase": "execute", "task_completed": 1, "current_task_id": 2}
//! ```
//!
//! but models wrap it in markdown fences, add prose around it, or nest the
//! action object. Every field is optional and is extracted independently, so
//! one malformed field never hides the others.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// Keys owned by the envelope itself; anything else at top level is a param.
const ENVELOPE_KEYS: [&str; 7] = [
    "thinking",
    "action",
    "params",
    "phase",
    "tasks",
    "task_completed",
    "current_task_id",
];

/// Phase of a task as declared by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    Plan,
    Execute,
    Finish,
}

impl Phase {
    /// Case-insensitive parse of a phase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "init" => Some(Phase::Init),
            "plan" | "planning" => Some(Phase::Plan),
            "execute" | "executing" => Some(Phase::Execute),
            "finish" | "finished" => Some(Phase::Finish),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Plan => "plan",
            Phase::Execute => "execute",
            Phase::Finish => "finish",
        }
    }
}

/// Structured view of one model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEnvelope {
    pub thinking: Option<String>,
    /// Action directive re-rendered as `{"action": kind, "params": {...}}`.
    pub action: Option<String>,
    pub phase: Option<Phase>,
    /// Sub-task names declared by a planning reply, in order.
    pub tasks: Vec<String>,
    pub task_completed: Option<u32>,
    pub current_task_id: Option<u32>,
}

impl ResponseEnvelope {
    /// Parse a raw reply. Returns `None` when no JSON object can be located.
    pub fn parse(raw: &str) -> Option<Self> {
        locate_object(raw).map(|obj| Self::from_object(&obj))
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            thinking: obj
                .get("thinking")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string()),
            action: render_action(obj),
            phase: obj.get("phase").and_then(Value::as_str).and_then(Phase::parse),
            tasks: obj.get("tasks").map(parse_tasks).unwrap_or_default(),
            task_completed: obj.get("task_completed").and_then(as_task_id),
            current_task_id: obj.get("current_task_id").and_then(as_task_id),
        }
    }

    /// A planning reply that carries no action to execute.
    pub fn is_planning_turn(&self) -> bool {
        self.phase == Some(Phase::Plan) && self.action.is_none()
    }

    /// Whether the reply carries any task-plan metadata.
    pub fn has_plan_update(&self) -> bool {
        !self.tasks.is_empty() || self.task_completed.is_some() || self.current_task_id.is_some()
    }
}

/// Split a raw reply into `(thinking, action)`.
///
/// Unstructured replies yield the whole trimmed text as the action so the
/// interpreter can report it back to the model.
pub fn split_response(raw: &str) -> (String, String) {
    match ResponseEnvelope::parse(raw) {
        Some(envelope) => (
            envelope.thinking.unwrap_or_default(),
            envelope.action.unwrap_or_default(),
        ),
        None => (String::new(), raw.trim().to_string()),
    }
}

fn locate_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if let Some(obj) = as_object(trimmed) {
        return Some(obj);
    }
    if let Some(obj) = FENCED_JSON
        .captures(trimmed)
        .and_then(|caps| as_object(&caps[1]))
    {
        return Some(obj);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    as_object(&trimmed[start..=end])
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn render_action(obj: &Map<String, Value>) -> Option<String> {
    let rendered = match obj.get("action")? {
        Value::String(kind) if !kind.trim().is_empty() => {
            let params = match obj.get("params") {
                Some(params @ Value::Object(_)) => params.clone(),
                // Flat style: params sit next to "action"
                _ => Value::Object(
                    obj.iter()
                        .filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                ),
            };
            json!({ "action": kind.trim(), "params": params })
        }
        nested @ Value::Object(inner) if inner.contains_key("action") => nested.clone(),
        _ => return None,
    };
    Some(rendered.to_string())
}

fn parse_tasks(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name.trim().to_string()),
            Value::Object(task) => ["name", "title", "description"]
                .iter()
                .find_map(|key| task.get(*key).and_then(Value::as_str))
                .map(|name| name.trim().to_string()),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .collect()
}

fn as_task_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let raw = r#"{"thinking": "open settings", "action": "Launch", "params": {"app_name": "设置"}}"#;
        let env = ResponseEnvelope::parse(raw).unwrap();
        assert_eq!(env.thinking.as_deref(), Some("open settings"));
        let action: Value = serde_json::from_str(env.action.as_deref().unwrap()).unwrap();
        assert_eq!(action["action"], "Launch");
        assert_eq!(action["params"]["app_name"], "设置");
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let raw = "Sure, here is my answer:\n```json\n{\"action\": \"Home\", \"params\": {}}\n```\nDone.";
        let (thinking, action) = split_response(raw);
        assert_eq!(thinking, "");
        let action: Value = serde_json::from_str(&action).unwrap();
        assert_eq!(action["action"], "Home");
    }

    #[test]
    fn test_braces_inside_prose() {
        let raw = "I will tap. {\"action\": \"Tap\", \"params\": {\"element\": [1, 2]}} ok";
        let env = ResponseEnvelope::parse(raw).unwrap();
        assert!(env.action.unwrap().contains("\"Tap\""));
    }

    #[test]
    fn test_flat_params() {
        let raw = r#"{"action": "Wait", "seconds": 3, "thinking": "loading"}"#;
        let env = ResponseEnvelope::parse(raw).unwrap();
        let action: Value = serde_json::from_str(&env.action.unwrap()).unwrap();
        assert_eq!(action["params"]["seconds"], 3);
        assert!(action["params"].get("thinking").is_none());
    }

    #[test]
    fn test_nested_action_object() {
        let raw = r#"{"thinking": "x", "action": {"action": "Back", "params": {}}}"#;
        let env = ResponseEnvelope::parse(raw).unwrap();
        let action: Value = serde_json::from_str(&env.action.unwrap()).unwrap();
        assert_eq!(action["action"], "Back");
    }

    #[test]
    fn test_planning_fields() {
        let raw = r#"{"phase": "PLAN", "tasks": ["打开设置", {"id": 2, "name": "关闭WiFi"}, 7], "task_completed": "1", "current_task_id": 2}"#;
        let env = ResponseEnvelope::parse(raw).unwrap();
        assert_eq!(env.phase, Some(Phase::Plan));
        assert_eq!(env.tasks, vec!["打开设置", "关闭WiFi"]);
        assert_eq!(env.task_completed, Some(1));
        assert_eq!(env.current_task_id, Some(2));
        assert!(env.is_planning_turn());
        assert!(env.has_plan_update());
    }

    #[test]
    fn test_bad_field_does_not_hide_others() {
        let raw = r#"{"phase": 42, "task_completed": "abc", "action": "Home", "params": {}}"#;
        let env = ResponseEnvelope::parse(raw).unwrap();
        assert_eq!(env.phase, None);
        assert_eq!(env.task_completed, None);
        assert!(env.action.is_some());
    }

    #[test]
    fn test_unstructured_reply() {
        assert!(ResponseEnvelope::parse("just tap the button").is_none());
        let (thinking, action) = split_response("  just tap the button ");
        assert_eq!(thinking, "");
        assert_eq!(action, "just tap the button");
    }
}

//! Conversation history fed to the model, with summarization.

use serde_json::Value;

use super::plan::{TaskPlan, TaskStatus};
use crate::actions::ActionOutcome;
use crate::config::{get_messages, FAILURE_MARK, SUCCESS_MARK};
use crate::model::{ConversationMessage, ResponseEnvelope, Role};

/// Messages kept verbatim at the tail of a summarized conversation.
pub const KEEP_RECENT: usize = 4;

/// Upper bound on action entries in a summary.
pub const MAX_SUMMARY_ACTIONS: usize = 10;

const THINKING_EXCERPT_CHARS: usize = 50;

/// Ordered message history owned by one running task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    messages: Vec<ConversationMessage>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Compress the history into system prompt, one summary message and the
    /// last [`KEEP_RECENT`] messages.
    ///
    /// Returns an unchanged copy when there is nothing between the system
    /// prompt and the recent tail.
    pub fn summarize(&self, plan: &TaskPlan, lang: &str) -> Self {
        let head = usize::from(self.messages.first().is_some_and(ConversationMessage::is_system));
        let tail_start = self.messages.len().saturating_sub(KEEP_RECENT).max(head);
        if tail_start <= head {
            return self.clone();
        }

        let compressed = &self.messages[head..tail_start];
        let summary = build_summary(compressed, plan, lang);

        let mut messages = Vec::with_capacity(head + 1 + KEEP_RECENT);
        messages.extend_from_slice(&self.messages[..head]);
        messages.push(ConversationMessage::user(summary));
        messages.extend_from_slice(&self.messages[tail_start..]);

        tracing::debug!(
            "Summarized {} messages, history now {} messages",
            compressed.len(),
            messages.len()
        );
        Self { messages }
    }
}

/// One condensed action for the summary.
#[derive(Debug, Clone, PartialEq)]
struct ActionEntry {
    action: String,
    thinking: String,
    marker: Option<&'static str>,
}

impl ActionEntry {
    fn render(&self) -> String {
        let mut line = String::from("- ");
        if let Some(marker) = self.marker {
            line.push_str(marker);
            line.push(' ');
        }
        line.push_str(&self.action);
        if !self.thinking.is_empty() {
            line.push_str(": ");
            line.push_str(&self.thinking);
        }
        line
    }
}

/// Pull action entries out of assistant messages, pairing each with the
/// feedback message that follows it. Unparseable replies are skipped.
fn extract_actions(messages: &[ConversationMessage]) -> Vec<ActionEntry> {
    let mut entries: Vec<ActionEntry> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::Assistant)
        .filter_map(|(i, m)| {
            let envelope = ResponseEnvelope::parse(&m.content)?;
            let action: Value = serde_json::from_str(envelope.action.as_deref()?).ok()?;
            let action = action.get("action")?.as_str()?.to_string();
            let marker = messages
                .get(i + 1)
                .filter(|next| next.role == Role::User)
                .and_then(|next| feedback_marker(&next.content));
            Some(ActionEntry {
                action,
                thinking: excerpt(envelope.thinking.as_deref().unwrap_or_default()),
                marker,
            })
        })
        .collect();

    let overflow = entries.len().saturating_sub(MAX_SUMMARY_ACTIONS);
    entries.drain(..overflow);
    entries
}

fn feedback_marker(content: &str) -> Option<&'static str> {
    let content = content.trim_start();
    if content.starts_with(SUCCESS_MARK) {
        Some(SUCCESS_MARK)
    } else if content.starts_with(FAILURE_MARK) {
        Some(FAILURE_MARK)
    } else {
        None
    }
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    let mut short: String = text.chars().take(THINKING_EXCERPT_CHARS).collect();
    if text.chars().count() > THINKING_EXCERPT_CHARS {
        short.push_str("...");
    }
    short
}

fn build_summary(compressed: &[ConversationMessage], plan: &TaskPlan, lang: &str) -> String {
    let msgs = get_messages(lang);
    let mut lines = vec![msgs.summary_header.to_string()];

    if !plan.is_empty() {
        let completed: Vec<String> = plan
            .completed()
            .map(|t| format!("- [{}] {}", t.id, t.name))
            .collect();
        if !completed.is_empty() {
            lines.push(String::new());
            lines.push(format!("{}:", msgs.completed_tasks));
            lines.extend(completed);
        }

        let outstanding: Vec<String> = plan
            .outstanding()
            .map(|t| match t.status {
                TaskStatus::InProgress => format!("- [{}] {} ({})", t.id, t.name, msgs.current_task),
                _ => format!("- [{}] {}", t.id, t.name),
            })
            .collect();
        if !outstanding.is_empty() {
            lines.push(String::new());
            lines.push(format!("{}:", msgs.pending_tasks));
            lines.extend(outstanding);
        }
    }

    let actions = extract_actions(compressed);
    if !actions.is_empty() {
        lines.push(String::new());
        lines.push(format!("{}:", msgs.recent_actions));
        lines.extend(actions.iter().map(ActionEntry::render));
    }

    lines.push(String::new());
    lines.push(msgs.no_repeat_warning.to_string());
    lines.join("\n")
}

/// Feedback appended after a non-terminal step.
pub fn feedback_message(outcome: &ActionOutcome, plan: &TaskPlan, lang: &str) -> ConversationMessage {
    let msgs = get_messages(lang);
    let mut text = if outcome.success {
        format!("{} {}", SUCCESS_MARK, msgs.action_succeeded)
    } else {
        format!("{} {}", FAILURE_MARK, msgs.action_failed)
    };
    if let Some(message) = &outcome.message {
        text.push_str(": ");
        text.push_str(message);
    }

    if !plan.is_empty() {
        let (done, total) = plan.progress();
        text.push_str(&format!("\n{}: {}/{}", msgs.progress, done, total));
        if let Some(task) = plan.current_task() {
            text.push_str(&format!("\n{}: {}", msgs.current_task, task.name));
        }
    }
    ConversationMessage::user(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant(action: &str, thinking: &str) -> ConversationMessage {
        ConversationMessage::assistant(format!(
            r#"{{"thinking": "{}", "action": "{}", "params": {{}}}}"#,
            thinking, action
        ))
    }

    fn history(steps: usize) -> ConversationState {
        let mut state = ConversationState::new();
        state.append(ConversationMessage::system("system prompt"));
        state.append(ConversationMessage::user("task"));
        for i in 0..steps {
            state.append(assistant("Tap", &format!("step {}", i)));
            let mark = if i % 2 == 0 { SUCCESS_MARK } else { FAILURE_MARK };
            state.append(ConversationMessage::user(format!("{} result {}", mark, i)));
        }
        state
    }

    #[test]
    fn test_append_and_clear() {
        let mut state = ConversationState::new();
        state.append(ConversationMessage::user("a"));
        assert_eq!(state.len(), 1);
        state.clear();
        assert!(state.is_empty());
    }

    #[test]
    fn test_summarize_keeps_system_and_tail() {
        let state = history(6);
        let summarized = state.summarize(&TaskPlan::default(), "en");

        assert_eq!(summarized.len(), 1 + 1 + KEEP_RECENT);
        assert_eq!(summarized.messages()[0], state.messages()[0]);
        assert_eq!(summarized.messages()[1].role, Role::User);
        assert_eq!(
            &summarized.messages()[2..],
            &state.messages()[state.len() - KEEP_RECENT..]
        );
        // Summarizing does not touch the original
        assert_eq!(state.len(), 14);
    }

    #[test]
    fn test_summary_lists_all_pending_tasks() {
        let plan = TaskPlan::from_names(["打开设置", "进入WLAN", "关闭WLAN", "返回桌面"]).complete(1).start(2);
        let summarized = history(5).summarize(&plan, "cn");
        let summary = &summarized.messages()[1].content;

        assert!(summary.contains("已完成的子任务"));
        assert!(summary.contains("[1] 打开设置"));
        assert!(summary.contains("尚未完成的子任务"));
        for name in ["进入WLAN", "关闭WLAN", "返回桌面"] {
            assert!(summary.contains(name), "missing pending task {}", name);
        }
    }

    #[test]
    fn test_summary_action_entries() {
        let summarized = history(4).summarize(&TaskPlan::default(), "en");
        let summary = &summarized.messages()[1].content;
        assert!(summary.contains("- ✅ Tap: step 0"));
        assert!(summary.contains("- ❌ Tap: step 1"));
    }

    #[test]
    fn test_summary_caps_actions_and_skips_garbage() {
        let mut state = history(15);
        state.append(ConversationMessage::assistant("not json at all"));
        state.append(ConversationMessage::user("❌ failed"));
        let entries = extract_actions(&state.messages()[2..]);
        assert_eq!(entries.len(), MAX_SUMMARY_ACTIONS);
        assert_eq!(entries.last().unwrap().thinking, "step 14");
    }

    #[test]
    fn test_short_history_unchanged() {
        let mut state = ConversationState::new();
        state.append(ConversationMessage::system("s"));
        state.append(ConversationMessage::user("task"));
        state.append(assistant("Home", "go home"));
        assert_eq!(state.summarize(&TaskPlan::default(), "en"), state);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(80);
        assert_eq!(excerpt(&long).chars().count(), THINKING_EXCERPT_CHARS + 3);
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn test_feedback_message() {
        let plan = TaskPlan::from_names(["a", "b"]).complete(1).start(2);
        let msg = feedback_message(&ActionOutcome::success("Tapped (1, 2)"), &plan, "en");
        assert_eq!(msg.role, Role::User);
        assert_eq!(
            msg.content,
            "✅ Action succeeded: Tapped (1, 2)\nProgress: 1/2\nCurrent sub-task: b"
        );

        let msg = feedback_message(&ActionOutcome::failure("Tap failed"), &TaskPlan::default(), "cn");
        assert_eq!(msg.content, "❌ 动作执行失败: Tap failed");
    }
}

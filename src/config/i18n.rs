//! Localized strings for feedback messages, summaries and the CLI.

/// Marker prefixed to feedback for a successful action.
pub const SUCCESS_MARK: &str = "✅";

/// Marker prefixed to feedback for a failed action.
pub const FAILURE_MARK: &str = "❌";

/// UI and conversation strings for one language.
#[derive(Debug, Clone)]
pub struct Messages {
    // Conversation
    pub task_prompt: &'static str,
    pub action_succeeded: &'static str,
    pub action_failed: &'static str,
    pub progress: &'static str,
    pub current_task: &'static str,
    pub keyboard_active: &'static str,
    pub screen_text: &'static str,
    pub manual_done: &'static str,
    // Summary
    pub summary_header: &'static str,
    pub completed_tasks: &'static str,
    pub pending_tasks: &'static str,
    pub recent_actions: &'static str,
    pub no_repeat_warning: &'static str,
    // Outcomes
    pub task_completed: &'static str,
    pub task_cancelled: &'static str,
    pub max_steps_reached: &'static str,
    // CLI
    pub thinking: &'static str,
    pub action: &'static str,
    pub step: &'static str,
    pub result: &'static str,
    pub cost: &'static str,
    pub starting_task: &'static str,
    pub operator_prompt: &'static str,
    pub manual_operation_hint: &'static str,
    pub press_enter_when_done: &'static str,
}

/// Chinese messages
pub static MESSAGES_ZH: Messages = Messages {
    task_prompt: "请完成以下任务：",
    action_succeeded: "动作执行成功",
    action_failed: "动作执行失败",
    progress: "进度",
    current_task: "当前子任务",
    keyboard_active: "键盘已弹出",
    screen_text: "屏幕文字",
    manual_done: "用户已手动完成操作，请根据当前屏幕继续。",
    summary_header: "[历史摘要] 之前的步骤已压缩如下：",
    completed_tasks: "已完成的子任务（不要重复）",
    pending_tasks: "⚠️ 尚未完成的子任务（必须继续执行，不能遗漏）",
    recent_actions: "最近的操作",
    no_repeat_warning: "请不要重复已完成的工作，根据当前屏幕继续执行未完成的子任务。",
    task_completed: "任务完成",
    task_cancelled: "任务已取消",
    max_steps_reached: "达到最大步数限制",
    thinking: "思考过程",
    action: "执行动作",
    step: "步骤",
    result: "结果",
    cost: "成本",
    starting_task: "开始执行任务",
    operator_prompt: "继续(c) / 停止(s) / 手动操作后继续(m)？",
    manual_operation_hint: "请在设备上手动完成操作...",
    press_enter_when_done: "完成后按回车继续",
};

/// English messages
pub static MESSAGES_EN: Messages = Messages {
    task_prompt: "Please complete the following task: ",
    action_succeeded: "Action succeeded",
    action_failed: "Action failed",
    progress: "Progress",
    current_task: "Current sub-task",
    keyboard_active: "Keyboard is open",
    screen_text: "Screen text",
    manual_done: "The operator finished a manual step. Continue from the current screen.",
    summary_header: "[History summary] Earlier steps, condensed:",
    completed_tasks: "Completed sub-tasks (do not repeat)",
    pending_tasks: "⚠️ PENDING sub-tasks (still required, do not drop any)",
    recent_actions: "Recent actions",
    no_repeat_warning: "Do not repeat completed work. Continue the pending sub-tasks from the current screen.",
    task_completed: "Task completed",
    task_cancelled: "Task cancelled",
    max_steps_reached: "Max steps reached",
    thinking: "Thinking",
    action: "Action",
    step: "Step",
    result: "Result",
    cost: "Cost",
    starting_task: "Starting task",
    operator_prompt: "Continue (c) / Stop (s) / Manual then continue (m)?",
    manual_operation_hint: "Please complete the operation on the device...",
    press_enter_when_done: "Press Enter when done",
};

/// Get messages by language code, "en" for English and anything else for Chinese.
pub fn get_messages(lang: &str) -> &'static Messages {
    match lang {
        "en" => &MESSAGES_EN,
        _ => &MESSAGES_ZH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_messages() {
        assert_eq!(get_messages("cn").thinking, "思考过程");
        assert_eq!(get_messages("en").thinking, "Thinking");
        assert_eq!(get_messages("fr").task_cancelled, "任务已取消");
    }
}

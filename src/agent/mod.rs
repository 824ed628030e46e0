//! Agent module for orchestrating phone automation.

mod control;
mod conversation;
mod phone_agent;
mod plan;

pub use control::{AgentControl, AgentState};
pub use conversation::{feedback_message, ConversationState, KEEP_RECENT, MAX_SUMMARY_ACTIONS};
pub use phone_agent::{
    AgentConfig, AgentError, AgentOutcome, OcrEngine, OcrHint, OperatorChoice, PhoneAgent,
    ProgressCallback, ProgressPhase, ProgressUpdate, StepCallback, StepResult,
};
pub use plan::{SubTask, TaskPlan, TaskStatus};

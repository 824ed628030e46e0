//! Cross-task control handle for a running agent.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AgentState {
    Idle = 0,
    Running = 1,
    Paused = 2,
    /// Suspended until the host answers an operator prompt.
    AwaitingOperator = 3,
    Finished = 4,
    Cancelled = 5,
    StepLimitReached = 6,
}

impl AgentState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => AgentState::Running,
            2 => AgentState::Paused,
            3 => AgentState::AwaitingOperator,
            4 => AgentState::Finished,
            5 => AgentState::Cancelled,
            6 => AgentState::StepLimitReached,
            _ => AgentState::Idle,
        }
    }

    /// Whether a task invocation has ended in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentState::Finished | AgentState::Cancelled | AgentState::StepLimitReached
        )
    }
}

/// Cloneable handle for pausing, resuming and cancelling an agent from
/// another task or thread. The loop only reads the flags between steps.
#[derive(Debug, Clone)]
pub struct AgentControl {
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl Default for AgentControl {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentControl {
    pub fn new() -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(AgentState::Idle as u8)),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Request cancellation. The current step still completes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> AgentState {
        AgentState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: AgentState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Clear flags left over from a previous task.
    pub(crate) fn reset(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);
        self.set_state(AgentState::Idle);
    }
}

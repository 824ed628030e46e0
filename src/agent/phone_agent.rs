//! Main PhoneAgent loop for orchestrating phone automation.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::Instrument;
use uuid::Uuid;

use super::control::{AgentControl, AgentState};
use super::conversation::{feedback_message, ConversationState};
use super::plan::TaskPlan;
use crate::actions::{ActionConfig, ActionHandler, ActionOutcome};
use crate::billing::{CostLedger, TaskBillingSummary};
use crate::config::{get_messages, DefaultPromptBuilder, PromptBuilder, PromptContext};
use crate::device::Device;
use crate::model::{ConversationMessage, ModelClient, ModelError, ModelResponse, ResponseEnvelope};

/// Agent errors. Only model transport failures abort a task.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("No step is waiting for an operator decision")]
    NotAwaitingOperator,
}

/// Configuration for the PhoneAgent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of steps before stopping.
    pub max_steps: u32,
    /// Pause between steps.
    pub step_delay: Duration,
    /// UI-settle pause after a successful non-terminal action.
    pub action_delay: Duration,
    pub screenshot_scale: f64,
    /// Language code ("cn" for Chinese, "en" for English).
    pub lang: String,
    /// Summarize the conversation every N steps; 0 disables it.
    pub summarize_every: u32,
    pub enable_billing: bool,
    /// Suspend after every step until the host answers.
    pub operator_intervention: bool,
    pub pause_poll_interval: Duration,
    pub action: ActionConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            step_delay: Duration::from_secs(1),
            action_delay: Duration::from_secs(1),
            screenshot_scale: 0.5,
            lang: "cn".to_string(),
            summarize_every: 10,
            enable_billing: true,
            operator_intervention: false,
            pause_poll_interval: Duration::from_millis(200),
            action: ActionConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn with_screenshot_scale(mut self, scale: f64) -> Self {
        self.screenshot_scale = scale;
        self
    }

    pub fn with_summarize_every(mut self, steps: u32) -> Self {
        self.summarize_every = steps;
        self
    }

    pub fn with_billing(mut self, enabled: bool) -> Self {
        self.enable_billing = enabled;
        self
    }

    pub fn with_operator_intervention(mut self, enabled: bool) -> Self {
        self.operator_intervention = enabled;
        self
    }

    pub fn with_action_config(mut self, action: ActionConfig) -> Self {
        self.action = action;
        self
    }
}

/// Result of a single agent step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub step: u32,
    /// Whether the action was successful.
    pub success: bool,
    /// Whether the task is finished.
    pub finished: bool,
    /// The directive that was executed, if any.
    pub action: Option<String>,
    pub thinking: String,
    pub message: Option<String>,
    pub step_cost: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Sub-step phase reported to progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Thinking,
    Action,
    Waiting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub step: u32,
    pub phase: ProgressPhase,
    pub thinking: Option<String>,
    pub action: Option<String>,
    pub message: Option<String>,
}

/// Callback type for completed steps.
pub type StepCallback = Box<dyn Fn(&StepResult) + Send + Sync>;

/// Callback type for sub-step progress.
pub type ProgressCallback = Box<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Text recognized on a screenshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrHint {
    pub keyboard_active: bool,
    pub raw_text: String,
}

/// Optional OCR pass run on every screenshot.
pub trait OcrEngine: Send + Sync {
    fn analyze(&self, screenshot: &[u8]) -> Option<OcrHint>;
}

/// Host answer to an operator prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorChoice {
    Continue,
    Stop,
    /// The operator acted on the device; the model is told so.
    ManualThenContinue,
}

/// How a call to [`PhoneAgent::run`] or [`PhoneAgent::resume_operator`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    /// The model finished the task with this message.
    Finished(String),
    /// The model asked for the user to step in.
    PausedByModel(String),
    Cancelled,
    StepLimitReached,
    /// Suspended after `step`; call [`PhoneAgent::resume_operator`].
    AwaitingOperator { step: u32 },
}

impl AgentOutcome {
    /// Human-readable status in `lang`.
    pub fn message(&self, lang: &str) -> String {
        let msgs = get_messages(lang);
        match self {
            AgentOutcome::Finished(message) | AgentOutcome::PausedByModel(message) => message.clone(),
            AgentOutcome::Cancelled => msgs.task_cancelled.to_string(),
            AgentOutcome::StepLimitReached => msgs.max_steps_reached.to_string(),
            AgentOutcome::AwaitingOperator { step } => format!("{} {}: {}", msgs.step, step, msgs.operator_prompt),
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, AgentOutcome::AwaitingOperator { .. })
    }
}

struct BillingBinding {
    ledger: CostLedger,
    vendor: String,
    model: String,
}

/// A step whose device action ran but whose bookkeeping waits on the operator.
struct PendingStep {
    step: u32,
    response: ModelResponse,
    outcome: ActionOutcome,
    step_cost: f64,
    stopped: bool,
    operator_note: Option<&'static str>,
}

enum StepFlow {
    Continue,
    Done(AgentOutcome),
    Suspend(u32),
}

/// AI-powered agent for automating Android phone interactions.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use phone_pilot::adb::AdbDevice;
/// use phone_pilot::{AgentConfig, ModelConfig, OpenAiClient, PhoneAgent};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let device = Arc::new(AdbDevice::new("emulator-5554"));
///     let model = Arc::new(OpenAiClient::new(ModelConfig::default()));
///     let mut agent = PhoneAgent::new(AgentConfig::default(), device, model);
///
///     let outcome = agent.run("打开设置").await?;
///     println!("{}", outcome.message("cn"));
///     Ok(())
/// }
/// ```
pub struct PhoneAgent {
    config: AgentConfig,
    device: Arc<dyn Device>,
    model: Arc<dyn ModelClient>,
    prompt_builder: Box<dyn PromptBuilder>,
    handler: ActionHandler,
    billing: Option<BillingBinding>,
    ocr: Option<Box<dyn OcrEngine>>,
    on_step: Option<StepCallback>,
    on_progress: Option<ProgressCallback>,
    control: AgentControl,
    conversation: ConversationState,
    plan: TaskPlan,
    step_count: u32,
    pending: Option<PendingStep>,
}

impl PhoneAgent {
    pub fn new(config: AgentConfig, device: Arc<dyn Device>, model: Arc<dyn ModelClient>) -> Self {
        let handler = ActionHandler::new(device.clone(), config.action.clone());
        Self {
            config,
            device,
            model,
            prompt_builder: Box::new(DefaultPromptBuilder),
            handler,
            billing: None,
            ocr: None,
            on_step: None,
            on_progress: None,
            control: AgentControl::new(),
            conversation: ConversationState::new(),
            plan: TaskPlan::default(),
            step_count: 0,
            pending: None,
        }
    }

    pub fn with_prompt_builder(mut self, builder: impl PromptBuilder + 'static) -> Self {
        self.prompt_builder = Box::new(builder);
        self
    }

    /// Record usage in `ledger`, priced as `vendor:model`.
    pub fn with_billing(
        mut self,
        ledger: CostLedger,
        vendor: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.billing = Some(BillingBinding {
            ledger,
            vendor: vendor.into(),
            model: model.into(),
        });
        self
    }

    pub fn with_ocr(mut self, engine: impl OcrEngine + 'static) -> Self {
        self.ocr = Some(Box::new(engine));
        self
    }

    pub fn on_step<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StepResult) + Send + Sync + 'static,
    {
        self.on_step = Some(Box::new(callback));
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressUpdate) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Handle for pausing, resuming or cancelling from elsewhere.
    pub fn control(&self) -> AgentControl {
        self.control.clone()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the current step count.
    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn task_plan(&self) -> &TaskPlan {
        &self.plan
    }

    /// Usage since the current task started, when billing is bound.
    pub fn billing_summary(&self) -> Option<TaskBillingSummary> {
        self.billing.as_ref().map(|b| b.ledger.get_task_summary())
    }

    /// Run a task until it finishes, is cancelled, hits the step limit or
    /// suspends for the operator.
    pub async fn run(&mut self, task: &str) -> Result<AgentOutcome, AgentError> {
        let span = tracing::info_span!("task", id = %Uuid::new_v4());
        self.run_task(task).instrument(span).await
    }

    async fn run_task(&mut self, task: &str) -> Result<AgentOutcome, AgentError> {
        self.reset();
        tracing::info!("Starting task: {}", task);

        let ctx = PromptContext {
            task: task.to_string(),
            current_app: self.device.get_current_app(),
            max_steps: self.config.max_steps,
        };
        let system_prompt = self.prompt_builder.build_system_prompt(&ctx, &self.config.lang);
        let task_prompt = format!("{}{}", get_messages(&self.config.lang).task_prompt, task);
        self.conversation.append(ConversationMessage::system(system_prompt));
        self.conversation.append(ConversationMessage::user(task_prompt));

        self.control.set_state(AgentState::Running);
        self.drive().await
    }

    /// Answer an operator prompt and continue the suspended task.
    pub async fn resume_operator(&mut self, choice: OperatorChoice) -> Result<AgentOutcome, AgentError> {
        let mut pending = self.pending.take().ok_or(AgentError::NotAwaitingOperator)?;
        tracing::info!("Operator chose {:?} after step {}", choice, pending.step);

        match choice {
            OperatorChoice::Continue => {}
            OperatorChoice::Stop => {
                pending.stopped = true;
                pending.outcome.should_finish = true;
            }
            OperatorChoice::ManualThenContinue => {
                pending.operator_note = Some(get_messages(&self.config.lang).manual_done);
            }
        }

        self.control.set_state(AgentState::Running);
        match self.finish_step(pending) {
            StepFlow::Done(outcome) => return Ok(self.conclude(outcome)),
            StepFlow::Suspend(step) => return Ok(AgentOutcome::AwaitingOperator { step }),
            StepFlow::Continue => {}
        }
        if self.stop_condition().is_none() {
            sleep(self.config.step_delay).await;
        }
        self.drive().await
    }

    /// Clear all per-task state.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.plan = TaskPlan::default();
        self.step_count = 0;
        self.pending = None;
        self.control.reset();
        if let Some(billing) = self.billing.as_mut() {
            billing.ledger.reset();
        }
    }

    async fn drive(&mut self) -> Result<AgentOutcome, AgentError> {
        loop {
            if let Some(outcome) = self.stop_condition() {
                return Ok(self.conclude(outcome));
            }
            if !self.wait_while_paused().await {
                return Ok(self.conclude(AgentOutcome::Cancelled));
            }

            let flow = match self.execute_step().await {
                Ok(flow) => flow,
                Err(e) => {
                    tracing::error!("Step {} failed: {}", self.step_count, e);
                    self.control.set_state(AgentState::Idle);
                    return Err(e);
                }
            };
            match flow {
                StepFlow::Continue => {}
                StepFlow::Done(outcome) => return Ok(self.conclude(outcome)),
                StepFlow::Suspend(step) => {
                    self.control.set_state(AgentState::AwaitingOperator);
                    return Ok(AgentOutcome::AwaitingOperator { step });
                }
            }

            if self.stop_condition().is_none() {
                sleep(self.config.step_delay).await;
            }
        }
    }

    fn stop_condition(&self) -> Option<AgentOutcome> {
        if self.control.is_cancelled() {
            Some(AgentOutcome::Cancelled)
        } else if self.step_count >= self.config.max_steps {
            Some(AgentOutcome::StepLimitReached)
        } else {
            None
        }
    }

    /// Spin while paused. Returns `false` if cancelled meanwhile.
    async fn wait_while_paused(&self) -> bool {
        while self.control.is_paused() {
            if self.control.is_cancelled() {
                return false;
            }
            if self.control.state() != AgentState::Paused {
                tracing::info!("Paused before step {}", self.step_count + 1);
                self.control.set_state(AgentState::Paused);
            }
            sleep(self.config.pause_poll_interval).await;
        }
        self.control.set_state(AgentState::Running);
        !self.control.is_cancelled()
    }

    fn conclude(&mut self, outcome: AgentOutcome) -> AgentOutcome {
        let state = match outcome {
            AgentOutcome::Cancelled => AgentState::Cancelled,
            AgentOutcome::StepLimitReached => AgentState::StepLimitReached,
            _ => AgentState::Finished,
        };
        self.control.set_state(state);

        tracing::info!(
            steps = self.step_count,
            "Task ended: {}",
            outcome.message(&self.config.lang)
        );
        if let Some(summary) = self.billing_summary().filter(|s| s.step_count > 0) {
            tracing::info!(
                provider = %summary.provider,
                model = %summary.model,
                prompt_tokens = summary.total_prompt_tokens,
                completion_tokens = summary.total_completion_tokens,
                "Task cost {:.6} {}",
                summary.total_cost,
                summary.currency
            );
        }
        outcome
    }

    async fn execute_step(&mut self) -> Result<StepFlow, AgentError> {
        self.step_count += 1;
        let step = self.step_count;
        self.emit_progress(step, ProgressPhase::Thinking, None, None, None);

        let screenshot = self.device.screenshot(self.config.screenshot_scale);
        if screenshot.is_none() {
            tracing::warn!("Step {}: screenshot unavailable, asking without image", step);
        }

        let hint = match (&self.ocr, &screenshot) {
            (Some(ocr), Some(image)) => ocr.analyze(image),
            _ => None,
        };
        let outgoing = self.outgoing_messages(hint.as_ref());

        let response = self.model.request(&outgoing, screenshot.as_deref()).await?;
        drop(outgoing);
        tracing::debug!("Step {} response: {}", step, response.raw_content);

        let step_cost = self.record_cost(&response);

        let envelope = ResponseEnvelope::parse(&response.raw_content);
        if let Some(envelope) = &envelope {
            self.plan = std::mem::take(&mut self.plan).apply(envelope);
            if envelope.has_plan_update() {
                let (done, total) = self.plan.progress();
                tracing::debug!("Step {}: plan {}/{} done", step, done, total);
            }
        }

        self.emit_progress(
            step,
            ProgressPhase::Action,
            Some(response.thinking.clone()),
            Some(response.action.clone()),
            None,
        );

        let planning_turn = envelope.as_ref().is_some_and(ResponseEnvelope::is_planning_turn);
        let outcome = if planning_turn {
            ActionOutcome::success(format!("Plan recorded ({} sub-tasks)", self.plan.tasks().len()))
        } else {
            self.handler.execute(&response.action).await
        };

        if outcome.success && !outcome.should_finish {
            self.emit_progress(step, ProgressPhase::Waiting, None, None, outcome.message.clone());
            sleep(self.config.action_delay).await;
        }

        let pending = PendingStep {
            step,
            response,
            outcome,
            step_cost,
            stopped: false,
            operator_note: None,
        };
        if self.config.operator_intervention && !pending.outcome.should_finish {
            self.pending = Some(pending);
            return Ok(StepFlow::Suspend(step));
        }
        Ok(self.finish_step(pending))
    }

    /// Conversation as sent to the model, with an OCR hint appended to a copy
    /// of the last message.
    fn outgoing_messages(&self, hint: Option<&OcrHint>) -> Cow<'_, [ConversationMessage]> {
        let messages = self.conversation.messages();
        let Some(hint) = hint else {
            return Cow::Borrowed(messages);
        };

        let msgs = get_messages(&self.config.lang);
        let mut note = String::new();
        if hint.keyboard_active {
            note.push_str(&format!("\n[{}]", msgs.keyboard_active));
        }
        if !hint.raw_text.trim().is_empty() {
            note.push_str(&format!("\n[{}] {}", msgs.screen_text, hint.raw_text.trim()));
        }
        if note.is_empty() {
            return Cow::Borrowed(messages);
        }

        let mut owned = messages.to_vec();
        if let Some(last) = owned.last_mut() {
            last.content.push_str(&note);
        }
        Cow::Owned(owned)
    }

    fn record_cost(&mut self, response: &ModelResponse) -> f64 {
        if !self.config.enable_billing {
            return 0.0;
        }
        match self.billing.as_mut() {
            Some(b) => {
                b.ledger
                    .record_usage(&b.vendor, &b.model, response.prompt_tokens, response.completion_tokens)
                    .total_cost
            }
            None => 0.0,
        }
    }

    /// Update the conversation, notify observers and decide what comes next.
    fn finish_step(&mut self, pending: PendingStep) -> StepFlow {
        let PendingStep {
            step,
            response,
            outcome,
            step_cost,
            stopped,
            operator_note,
        } = pending;
        let lang = self.config.lang.clone();

        self.conversation
            .append(ConversationMessage::assistant(response.raw_content.clone()));
        if !outcome.should_finish {
            let mut feedback = feedback_message(&outcome, &self.plan, &lang);
            if let Some(note) = operator_note {
                feedback.content.push('\n');
                feedback.content.push_str(note);
            }
            self.conversation.append(feedback);
        }

        let result = StepResult {
            step,
            success: outcome.success,
            finished: outcome.should_finish,
            action: Some(response.action.clone()).filter(|a| !a.is_empty()),
            thinking: response.thinking.clone(),
            message: outcome.message.clone(),
            step_cost,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        };
        tracing::info!(
            step,
            success = result.success,
            finished = result.finished,
            cost = step_cost,
            "{}",
            result.message.as_deref().unwrap_or_default()
        );
        if let Some(callback) = &self.on_step {
            callback(&result);
        }

        if self.config.summarize_every > 0 && step % self.config.summarize_every == 0 {
            self.conversation = self.conversation.summarize(&self.plan, &lang);
        }

        if stopped {
            StepFlow::Done(AgentOutcome::Cancelled)
        } else if outcome.paused {
            StepFlow::Done(AgentOutcome::PausedByModel(outcome.message.unwrap_or_default()))
        } else if outcome.should_finish {
            let message = outcome
                .message
                .unwrap_or_else(|| get_messages(&lang).task_completed.to_string());
            StepFlow::Done(AgentOutcome::Finished(message))
        } else {
            StepFlow::Continue
        }
    }

    fn emit_progress(
        &self,
        step: u32,
        phase: ProgressPhase,
        thinking: Option<String>,
        action: Option<String>,
        message: Option<String>,
    ) {
        if let Some(callback) = &self.on_progress {
            callback(&ProgressUpdate {
                step,
                phase,
                thinking,
                action,
                message,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::ModelPricing;
    use crate::model::Role;
    use crate::testing::{DeviceCall, MockDevice, ScriptedModel};
    use std::sync::Mutex;

    fn fast_config() -> AgentConfig {
        AgentConfig {
            step_delay: Duration::ZERO,
            action_delay: Duration::ZERO,
            pause_poll_interval: Duration::from_millis(5),
            action: ActionConfig {
                focus_delay: Duration::ZERO,
                wait_min_secs: 0.0,
                wait_max_secs: 0.0,
                ..ActionConfig::default()
            },
            ..AgentConfig::default()
        }
    }

    fn agent(replies: &[&str], config: AgentConfig) -> (PhoneAgent, Arc<MockDevice>, Arc<ScriptedModel>) {
        let device = Arc::new(MockDevice::new());
        let model = Arc::new(ScriptedModel::new(replies));
        let agent = PhoneAgent::new(config, device.clone(), model.clone());
        (agent, device, model)
    }

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.lang, "cn");
        assert_eq!(config.summarize_every, 10);
        assert!(config.enable_billing);
        assert!(!config.operator_intervention);
    }

    #[test]
    fn test_agent_config_builder() {
        let config = AgentConfig::default()
            .with_lang("en")
            .with_max_steps(5)
            .with_summarize_every(0)
            .with_operator_intervention(true);
        assert_eq!(config.lang, "en");
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.summarize_every, 0);
        assert!(config.operator_intervention);
    }

    #[tokio::test]
    async fn test_open_settings_and_return_home() {
        let (agent, device, _) = agent(
            &[
                r#"{"action":"Launch","params":{"package":"com.android.settings"}}"#,
                r#"{"action":"Home","params":{}}"#,
                r#"{"action":"finish","params":{"message":"done"}}"#,
            ],
            fast_config(),
        );
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        let mut agent = agent.on_step(move |r| sink.lock().unwrap().push(r.clone()));

        let outcome = agent.run("open settings and return to home").await.unwrap();

        assert_eq!(outcome, AgentOutcome::Finished("done".to_string()));
        assert_eq!(agent.step_count(), 3);
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.finished).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert!(results.iter().all(|r| r.success));
        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::Launch("com.android.settings".into()),
                DeviceCall::PressKey(3)
            ]
        );
        assert_eq!(agent.control().state(), AgentState::Finished);
    }

    #[tokio::test]
    async fn test_conversation_shape() {
        let (mut agent, _, model) = agent(
            &[
                r#"{"action":"Home","params":{}}"#,
                r#"{"action":"finish","params":{"message":"ok"}}"#,
            ],
            fast_config().with_lang("en"),
        );
        agent.run("go home").await.unwrap();

        let roles: Vec<Role> = agent.conversation().messages().iter().map(|m| m.role).collect();
        // system, task, reply, feedback, final reply (no feedback after finish)
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(
            agent.conversation().messages()[1].content,
            "Please complete the following task: go home"
        );
        assert!(agent.conversation().messages()[3].content.starts_with("✅"));
        // Second request saw the feedback of the first step
        assert_eq!(model.request_lengths(), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_bad_action_is_fed_back() {
        let (mut agent, _, _) = agent(
            &["tap somewhere nice", r#"{"action":"finish","params":{}}"#],
            fast_config().with_lang("en"),
        );
        let outcome = agent.run("t").await.unwrap();
        assert_eq!(outcome, AgentOutcome::Finished("Task completed".into()));
        let feedback = &agent.conversation().messages()[3].content;
        assert!(feedback.starts_with("❌ Action failed: Invalid action JSON"));
    }

    #[tokio::test]
    async fn test_step_limit() {
        let (mut agent, _, _) = agent(&[r#"{"action":"Back"}"#; 5], fast_config().with_max_steps(2));
        let outcome = agent.run("loop").await.unwrap();
        assert_eq!(outcome, AgentOutcome::StepLimitReached);
        assert_eq!(agent.step_count(), 2);
        assert_eq!(outcome.message("cn"), "达到最大步数限制");
    }

    #[tokio::test]
    async fn test_model_pause_is_terminal() {
        let (mut agent, _, _) = agent(&[r#"{"action":"pause","params":{"message":"login"}}"#], fast_config());
        let outcome = agent.run("t").await.unwrap();
        assert_eq!(outcome, AgentOutcome::PausedByModel("[Paused] login".into()));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let (mut agent, _, _) = agent(&[], fast_config());
        let err = agent.run("t").await.unwrap_err();
        assert!(matches!(err, AgentError::Model(_)));
    }

    #[tokio::test]
    async fn test_cancel_before_next_step() {
        let (agent, _, _) = agent(&[r#"{"action":"Back"}"#; 5], fast_config());
        let control = agent.control();
        let mut agent = agent.on_step(move |r| {
            if r.step == 2 {
                control.cancel();
            }
        });
        let outcome = agent.run("t").await.unwrap();
        assert_eq!(outcome, AgentOutcome::Cancelled);
        assert_eq!(agent.step_count(), 2);
        assert_eq!(agent.control().state(), AgentState::Cancelled);
        assert_eq!(outcome.message("en"), "Task cancelled");
    }

    #[tokio::test]
    async fn test_pause_then_resume() {
        let (agent, _, _) = agent(
            &[r#"{"action":"Back"}"#, r#"{"action":"finish","params":{"message":"ok"}}"#],
            fast_config(),
        );
        let control = agent.control();
        let pauser = control.clone();
        let mut agent = agent.on_step(move |r| {
            if r.step == 1 {
                pauser.pause();
            }
        });

        let resumer = tokio::spawn(async move {
            while control.state() != AgentState::Paused {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            control.resume();
        });

        let outcome = agent.run("t").await.unwrap();
        resumer.await.unwrap();
        assert_eq!(outcome, AgentOutcome::Finished("ok".into()));
        assert_eq!(agent.step_count(), 2);
    }

    #[tokio::test]
    async fn test_cancel_while_paused() {
        let (agent, _, _) = agent(&[r#"{"action":"Back"}"#; 3], fast_config());
        let control = agent.control();
        let inner = control.clone();
        let mut agent = agent.on_step(move |_| inner.pause());

        let canceller = tokio::spawn(async move {
            while control.state() != AgentState::Paused {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            control.cancel();
        });

        let outcome = agent.run("t").await.unwrap();
        canceller.await.unwrap();
        assert_eq!(outcome, AgentOutcome::Cancelled);
        assert_eq!(agent.step_count(), 1);
    }

    #[tokio::test]
    async fn test_operator_intervention() {
        let (mut agent, device, _) = agent(
            &[r#"{"action":"Back"}"#, r#"{"action":"Home"}"#, r#"{"action":"Back"}"#],
            fast_config().with_lang("en").with_operator_intervention(true),
        );

        let outcome = agent.run("t").await.unwrap();
        assert_eq!(outcome, AgentOutcome::AwaitingOperator { step: 1 });
        assert_eq!(agent.control().state(), AgentState::AwaitingOperator);
        // Device action already ran, conversation waits for the decision
        assert_eq!(device.calls(), vec![DeviceCall::PressKey(4)]);
        assert_eq!(agent.conversation().len(), 2);

        let outcome = agent.resume_operator(OperatorChoice::ManualThenContinue).await.unwrap();
        assert_eq!(outcome, AgentOutcome::AwaitingOperator { step: 2 });
        assert!(agent.conversation().messages()[3]
            .content
            .ends_with("The operator finished a manual step. Continue from the current screen."));

        let outcome = agent.resume_operator(OperatorChoice::Stop).await.unwrap();
        assert_eq!(outcome, AgentOutcome::Cancelled);
        assert_eq!(agent.step_count(), 2);
        // Stopped step gets no feedback message
        assert_eq!(agent.conversation().len(), 5);

        assert!(matches!(
            agent.resume_operator(OperatorChoice::Continue).await,
            Err(AgentError::NotAwaitingOperator)
        ));
    }

    #[tokio::test]
    async fn test_billing_per_step() {
        let mut ledger = CostLedger::new();
        ledger.register_pricing(ModelPricing::fixed("test", "scripted", 1_000_000.0, 2_000_000.0));
        let (agent, _, _) = agent(
            &[r#"{"action":"Home"}"#, r#"{"action":"finish","params":{}}"#],
            fast_config(),
        );
        let mut agent = agent.with_billing(ledger, "test", "scripted");

        agent.run("t").await.unwrap();
        let summary = agent.billing_summary().unwrap();
        // ScriptedModel reports 10 prompt and 5 completion tokens per call
        assert_eq!(summary.step_count, 2);
        assert_eq!(summary.total_prompt_tokens, 20);
        assert!((summary.total_cost - 40.0).abs() < 1e-9);

        // A new task starts from an empty ledger
        agent.run("again").await.unwrap_err();
        assert_eq!(agent.billing_summary().unwrap().step_count, 0);
    }

    #[tokio::test]
    async fn test_planning_turn_and_summarization() {
        let (mut agent, device, _) = agent(
            &[
                r#"{"phase":"plan","tasks":["open settings","toggle wifi","go home"]}"#,
                r#"{"phase":"execute","task_completed":1,"current_task_id":2,"action":"Back","params":{}}"#,
                r#"{"action":"Home","params":{}}"#,
                r#"{"action":"finish","params":{"message":"ok"}}"#,
            ],
            fast_config().with_lang("en").with_summarize_every(3),
        );
        agent.run("t").await.unwrap();

        // The planning turn touched no device
        assert_eq!(device.calls(), vec![DeviceCall::PressKey(4), DeviceCall::PressKey(3)]);
        assert_eq!(agent.task_plan().progress(), (1, 3));

        let messages = agent.conversation().messages();
        // system + summary + 4 recent, then the final reply
        assert_eq!(messages.len(), 7);
        let summary = &messages[1].content;
        assert!(summary.contains("toggle wifi"));
        assert!(summary.contains("go home"));
        assert!(summary.contains("[1] open settings"));
    }

    #[tokio::test]
    async fn test_ocr_hint_not_persisted() {
        struct KeyboardOcr;
        impl OcrEngine for KeyboardOcr {
            fn analyze(&self, _screenshot: &[u8]) -> Option<OcrHint> {
                Some(OcrHint {
                    keyboard_active: true,
                    raw_text: "Search".into(),
                })
            }
        }

        let (agent, _, model) = agent(&[r#"{"action":"finish","params":{}}"#], fast_config().with_lang("en"));
        let mut agent = agent.with_ocr(KeyboardOcr);
        agent.run("t").await.unwrap();

        let sent = model.last_request();
        assert!(sent.last().unwrap().content.ends_with("[Keyboard is open]\n[Screen text] Search"));
        assert!(!agent.conversation().messages()[1].content.contains("Keyboard"));
    }
}

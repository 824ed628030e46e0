// Copyright 2025 Zhipu AI (Original Python implementation)
// Copyright 2025 ModerRAS (Rust implementation)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Phone Pilot
//!
//! Vision-language-model driven automation for Android phones.
//!
//! Each step sends the conversation and a fresh screenshot to an
//! OpenAI-compatible model, parses the structured reply into an action
//! directive, executes it through a [`Device`] and feeds the outcome back.
//! A [`CostLedger`] prices every call with fixed or tiered pricing, and the
//! model may declare a [`TaskPlan`] of sub-tasks that is tracked across steps.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phone_pilot::adb::AdbDevice;
//! use phone_pilot::{AgentConfig, CostLedger, ModelConfig, OpenAiClient, PhoneAgent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let model_config = ModelConfig::default()
//!         .with_vendor("OpenAI")
//!         .with_base_url("https://api.openai.com/v1")
//!         .with_api_key("sk-...")
//!         .with_model_name("gpt-4o");
//!     let device = Arc::new(AdbDevice::new("emulator-5554"));
//!     let model = Arc::new(OpenAiClient::new(model_config));
//!
//!     let mut agent = PhoneAgent::new(AgentConfig::default().with_lang("en"), device, model)
//!         .with_billing(CostLedger::with_default_pricing(), "OpenAI", "gpt-4o");
//!
//!     let outcome = agent.run("Open Settings and turn on Wi-Fi").await?;
//!     println!("{}", outcome.message("en"));
//!     if let Some(summary) = agent.billing_summary() {
//!         println!("cost: {:.4} {}", summary.total_cost, summary.currency);
//!     }
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod billing;
pub mod config;
pub mod device;
pub mod model;
pub mod settings;

#[cfg(test)]
mod testing;

pub use actions::{ActionConfig, ActionDirective, ActionHandler, ActionOutcome};
pub use agent::{
    AgentConfig, AgentControl, AgentError, AgentOutcome, AgentState, ConversationState, OcrEngine,
    OcrHint, OperatorChoice, PhoneAgent, ProgressPhase, ProgressUpdate, StepResult, SubTask,
    TaskPlan, TaskStatus,
};
pub use billing::{CostLedger, ModelPricing, PricingPolicy, TaskBillingSummary};
pub use device::Device;
pub use model::{ModelClient, ModelConfig, ModelResponse, OpenAiClient};
pub use settings::AppSettings;

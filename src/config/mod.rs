//! Configuration module: app lookup, localized strings, system prompts and
//! model profiles.

mod apps;
mod i18n;
mod profiles;
mod prompts;

pub use apps::{get_package, keyword_hints, APP_PACKAGES};
pub use i18n::{get_messages, Messages, FAILURE_MARK, MESSAGES_EN, MESSAGES_ZH, SUCCESS_MARK};
pub use profiles::{load_profiles, ModelProfile, ProfileError, ProfileSet, Protocol};
pub use prompts::{
    DefaultPromptBuilder, PromptBuilder, PromptContext, SYSTEM_PROMPT_EN, SYSTEM_PROMPT_ZH,
};

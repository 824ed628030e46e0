//! Named model profiles.
//!
//! A profile file bundles endpoint, credentials and pricing hints per model:
//!
//! ```yaml
//! default_profile: deepseek
//! profiles:
//!   deepseek:
//!     vendor: DeepSeek
//!     protocol: openai
//!     base_url: https://api.deepseek.com/v1
//!     api_key: ${DEEPSEEK_API_KEY}
//!     model: deepseek-chat
//! ```
//!
//! `${VAR}` references in string values are replaced from the environment;
//! unset variables are left as written.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::billing::{ModelPricing, PricingPolicy};
use crate::model::ModelConfig;

static ENV_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile config not found: {0}")]
    NotFound(String),
    #[error("Failed to read profile config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse profile config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Unknown profile: {0}")]
    Unknown(String),
    #[error("Profile {name} uses the {protocol} protocol, only openai is supported")]
    UnsupportedProtocol { name: String, protocol: Protocol },
}

/// Wire protocol spoken by a profile's endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    OpenAi,
    Anthropic,
    Google,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::OpenAi => "openai",
            Protocol::Anthropic => "anthropic",
            Protocol::Google => "google",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelProfile {
    /// Key under `profiles:`
    #[serde(default)]
    pub name: String,
    /// Display vendor, also the pricing vendor key
    pub vendor: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub base_url: Option<String>,
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Calls through this profile are never billed
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vendor, self.model)?;
        if self.is_free {
            f.write_str(" (free)")?;
        }
        Ok(())
    }
}

impl ModelProfile {
    /// Overlay this profile onto `config`. Retry and sampling settings are kept.
    pub fn apply_to(&self, config: ModelConfig) -> Result<ModelConfig, ProfileError> {
        if self.protocol != Protocol::OpenAi {
            return Err(ProfileError::UnsupportedProtocol {
                name: self.name.clone(),
                protocol: self.protocol,
            });
        }

        let mut config = config
            .with_vendor(&self.vendor)
            .with_api_key(&self.api_key)
            .with_model_name(&self.model);
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }
        for (name, value) in &self.extra_headers {
            config = config.with_header(name, value);
        }
        Ok(config)
    }

    /// Free pricing for this vendor/model when the profile is marked free.
    pub fn pricing_override(&self) -> Option<ModelPricing> {
        self.is_free
            .then(|| ModelPricing::new(&self.vendor, &self.model, PricingPolicy::Free))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    default_profile: Option<String>,
    #[serde(default)]
    profiles: Mapping,
}

/// Profiles in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: Vec<ModelProfile>,
    default_profile: Option<String>,
}

impl ProfileSet {
    /// Parse a profile document. Entries that fail to deserialize are
    /// skipped with a warning.
    pub fn from_yaml_str(content: &str) -> Result<Self, ProfileError> {
        let file: ProfileFile = serde_yaml::from_str(content)?;
        let mut profiles: Vec<ModelProfile> = Vec::new();

        for (key, data) in file.profiles {
            let Some(name) = key.as_str().map(str::to_string) else {
                tracing::warn!("Skipping profile with non-string key: {:?}", key);
                continue;
            };
            let mut data = expand_env(data);
            if let Value::Mapping(map) = &mut data {
                map.insert(Value::from("name"), Value::from(name.as_str()));
            }
            match serde_yaml::from_value::<ModelProfile>(data) {
                Ok(profile) => {
                    profiles.retain(|p| p.name != profile.name);
                    profiles.push(profile);
                }
                Err(e) => tracing::warn!("Failed to load profile '{}': {}", name, e),
            }
        }

        Ok(Self {
            profiles,
            default_profile: file.default_profile,
        })
    }

    pub fn get(&self, name: &str) -> Option<&ModelProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// The named profile, or the default one when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<Option<&ModelProfile>, ProfileError> {
        match name {
            Some(name) => self
                .get(name)
                .map(Some)
                .ok_or_else(|| ProfileError::Unknown(name.to_string())),
            None => Ok(self.default_profile()),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn default_profile_name(&self) -> Option<&str> {
        self.default_profile.as_deref()
    }

    pub fn default_profile(&self) -> Option<&ModelProfile> {
        self.default_profile.as_deref().and_then(|name| self.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Load profiles from a YAML file. A missing file is an error.
pub fn load_profiles(path: impl AsRef<Path>) -> Result<ProfileSet, ProfileError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ProfileError::NotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let set = ProfileSet::from_yaml_str(&content)?;
    tracing::info!("Loaded {} profiles from {}", set.len(), path.display());
    Ok(set)
}

fn expand_env(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_env_str(&s)),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, expand_env(v)))
                .collect(),
        ),
        other => other,
    }
}

fn expand_env_str(s: &str) -> String {
    ENV_REF
        .replace_all(s, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_expansion_and_default_profile() {
        std::env::set_var("PHONE_PILOT_TEST_PROFILE_KEY", "sk-from-env");
        let yaml = r#"
default_profile: deepseek
profiles:
  local:
    vendor: Local
    protocol: openai
    base_url: http://localhost:8000/v1
    api_key: EMPTY
    model: autoglm-phone-9b
    is_free: true
  deepseek:
    vendor: DeepSeek
    protocol: openai
    base_url: https://api.deepseek.com/v1
    api_key: ${PHONE_PILOT_TEST_PROFILE_KEY}
    model: deepseek-chat
    extra_headers:
      X-Key: prefix-${PHONE_PILOT_TEST_PROFILE_KEY}
"#;
        let set = ProfileSet::from_yaml_str(yaml).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["local", "deepseek"]);
        assert_eq!(set.default_profile_name(), Some("deepseek"));

        let profile = set.default_profile().unwrap();
        assert_eq!(profile.name, "deepseek");
        assert_eq!(profile.api_key, "sk-from-env");
        assert_eq!(profile.extra_headers["X-Key"], "prefix-sk-from-env");
        assert_eq!(profile.to_string(), "DeepSeek/deepseek-chat");
        assert!(profile.pricing_override().is_none());

        let config = profile.apply_to(ModelConfig::default().with_max_retries(7)).unwrap();
        assert_eq!(config.vendor, "DeepSeek");
        assert_eq!(config.base_url, "https://api.deepseek.com/v1");
        assert_eq!(config.model_name, "deepseek-chat");
        assert_eq!(config.api_key, "sk-from-env");
        assert_eq!(config.extra_headers["X-Key"], "prefix-sk-from-env");
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn test_unset_variable_kept_literally() {
        std::env::remove_var("PHONE_PILOT_TEST_UNSET_VAR");
        assert_eq!(
            expand_env_str("key-${PHONE_PILOT_TEST_UNSET_VAR}"),
            "key-${PHONE_PILOT_TEST_UNSET_VAR}"
        );
    }

    #[test]
    fn test_free_profile_overrides_pricing() {
        let yaml = r#"
profiles:
  local:
    vendor: Local
    api_key: EMPTY
    model: autoglm-phone-9b
    is_free: true
"#;
        let set = ProfileSet::from_yaml_str(yaml).unwrap();
        let profile = set.get("local").unwrap();
        assert_eq!(profile.protocol, Protocol::OpenAi);
        assert_eq!(profile.to_string(), "Local/autoglm-phone-9b (free)");

        let pricing = profile.pricing_override().unwrap();
        assert_eq!(pricing.vendor, "Local");
        assert_eq!(pricing.model, "autoglm-phone-9b");
        assert_eq!(pricing.policy, PricingPolicy::Free);
        assert!(set.default_profile().is_none());
        assert!(set.select(None).unwrap().is_none());
    }

    #[test]
    fn test_bad_profile_skipped() {
        let yaml = r#"
profiles:
  broken:
    vendor: Nobody
  good:
    vendor: OpenAI
    api_key: sk
    model: gpt-4o
"#;
        let set = ProfileSet::from_yaml_str(yaml).unwrap();
        assert_eq!(set.names(), vec!["good"]);
        assert!(!set.contains("broken"));
    }

    #[test]
    fn test_select_unknown_profile() {
        let set = ProfileSet::from_yaml_str("profiles: {}").unwrap();
        assert!(set.is_empty());
        assert!(matches!(set.select(Some("nope")), Err(ProfileError::Unknown(_))));
    }

    #[test]
    fn test_non_openai_protocol_rejected() {
        let yaml = r#"
profiles:
  claude:
    vendor: Anthropic
    protocol: anthropic
    api_key: sk
    model: claude-sonnet-4-20250514
"#;
        let set = ProfileSet::from_yaml_str(yaml).unwrap();
        let err = set.get("claude").unwrap().apply_to(ModelConfig::default()).unwrap_err();
        assert!(matches!(err, ProfileError::UnsupportedProtocol { protocol: Protocol::Anthropic, .. }));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_profiles("/definitely/not/here/profiles.yaml"),
            Err(ProfileError::NotFound(_))
        ));
    }
}

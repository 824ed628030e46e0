//! Pricing and usage data types.

use serde::{Deserialize, Serialize};

/// Default currency code for all prices.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Pricing kind as written in the pricing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    /// Flat per-million rate with optional free allowance.
    Fixed,
    /// Volume ladder; prompt and completion tokens walk the same boundaries.
    Tiered,
    /// Input range x optional output range table; first match wins.
    TieredComplex,
    /// Never billed.
    Free,
}

impl Default for PricingType {
    fn default() -> Self {
        Self::Fixed
    }
}

/// One step of a simple volume ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    #[serde(default)]
    pub min_tokens: u64,
    /// Upper bound of the tier; `None` means unbounded.
    #[serde(default)]
    pub max_tokens: Option<u64>,
    /// Input price per million tokens.
    #[serde(default)]
    pub input_price: f64,
    /// Output price per million tokens.
    #[serde(default)]
    pub output_price: f64,
}

impl PriceTier {
    /// Create a tier covering `[min_tokens, max_tokens)`.
    pub fn new(min_tokens: u64, max_tokens: Option<u64>, input_price: f64, output_price: f64) -> Self {
        Self {
            min_tokens,
            max_tokens,
            input_price,
            output_price,
        }
    }

    /// Number of tokens this tier can absorb.
    pub fn capacity(&self) -> u64 {
        match self.max_tokens {
            Some(max) => max.saturating_sub(self.min_tokens),
            None => u64::MAX,
        }
    }
}

/// One row of a combined input x output pricing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexPriceTier {
    #[serde(default)]
    pub input_min: u64,
    #[serde(default)]
    pub input_max: Option<u64>,
    #[serde(default)]
    pub output_min: Option<u64>,
    #[serde(default)]
    pub output_max: Option<u64>,
    #[serde(default)]
    pub input_price: f64,
    #[serde(default)]
    pub output_price: f64,
}

impl ComplexPriceTier {
    /// Whether the given token counts fall inside this row.
    pub fn matches(&self, prompt_tokens: u64, completion_tokens: u64) -> bool {
        let input_ok = self.input_min <= prompt_tokens
            && self.input_max.map_or(true, |max| prompt_tokens <= max);
        let output_ok = self.output_min.map_or(true, |min| completion_tokens >= min)
            && self.output_max.map_or(true, |max| completion_tokens <= max);
        input_ok && output_ok
    }
}

/// Validated pricing policy attached to a vendor/model pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PricingPolicy {
    Fixed {
        input_rate: f64,
        output_rate: f64,
        free_input_tokens: u64,
        free_output_tokens: u64,
    },
    /// Tiers are kept sorted by `min_tokens`.
    Tiered(Vec<PriceTier>),
    /// Rows are kept in declaration order; the last row is the catch-all.
    TieredComplex(Vec<ComplexPriceTier>),
    Free,
}

impl PricingPolicy {
    /// Build a tiered policy, sorting the tiers by their lower bound.
    pub fn tiered(mut tiers: Vec<PriceTier>) -> Self {
        tiers.sort_by_key(|t| t.min_tokens);
        Self::Tiered(tiers)
    }

    /// Kind of this policy.
    pub fn pricing_type(&self) -> PricingType {
        match self {
            Self::Fixed { .. } => PricingType::Fixed,
            Self::Tiered(_) => PricingType::Tiered,
            Self::TieredComplex(_) => PricingType::TieredComplex,
            Self::Free => PricingType::Free,
        }
    }
}

/// Pricing for one vendor/model pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub vendor: String,
    pub model: String,
    pub display_name: Option<String>,
    pub currency: String,
    pub policy: PricingPolicy,
}

impl ModelPricing {
    /// Create a pricing entry in the default currency.
    pub fn new(vendor: impl Into<String>, model: impl Into<String>, policy: PricingPolicy) -> Self {
        Self {
            vendor: vendor.into(),
            model: model.into(),
            display_name: None,
            currency: DEFAULT_CURRENCY.to_string(),
            policy,
        }
    }

    /// Flat per-million pricing without free allowance.
    pub fn fixed(vendor: impl Into<String>, model: impl Into<String>, input_rate: f64, output_rate: f64) -> Self {
        Self::new(
            vendor,
            model,
            PricingPolicy::Fixed {
                input_rate,
                output_rate,
                free_input_tokens: 0,
                free_output_tokens: 0,
            },
        )
    }

    /// Registry key, `vendor:model`.
    pub fn key(&self) -> String {
        pricing_key(&self.vendor, &self.model)
    }
}

/// Registry key for a vendor/model pair.
pub fn pricing_key(vendor: &str, model: &str) -> String {
    format!("{}:{}", vendor, model)
}

/// Costs of a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CallCost {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl CallCost {
    pub fn new(input_cost: f64, output_cost: f64) -> Self {
        Self {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// One billed model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// RFC 3339 local timestamp.
    pub timestamp: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub currency: String,
}

/// Aggregate billing for the current task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBillingSummary {
    /// Provider of the most recent record.
    pub provider: String,
    /// Model of the most recent record.
    pub model: String,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_input_cost: f64,
    pub total_output_cost: f64,
    pub total_cost: f64,
    pub step_count: usize,
    pub currency: String,
    #[serde(default)]
    pub records: Vec<UsageRecord>,
}

impl TaskBillingSummary {
    /// Summary for a task with no billed calls.
    pub fn empty() -> Self {
        Self {
            provider: "N/A".to_string(),
            model: "N/A".to_string(),
            total_prompt_tokens: 0,
            total_completion_tokens: 0,
            total_input_cost: 0.0,
            total_output_cost: 0.0,
            total_cost: 0.0,
            step_count: 0,
            currency: DEFAULT_CURRENCY.to_string(),
            records: Vec::new(),
        }
    }
}

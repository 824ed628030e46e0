//! Per-task cost ledger.

use std::collections::HashMap;

use chrono::Local;

use super::models::{
    pricing_key, CallCost, ComplexPriceTier, ModelPricing, PriceTier, PricingPolicy,
    TaskBillingSummary, UsageRecord, DEFAULT_CURRENCY,
};

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

fn per_million(tokens: u64, rate: f64) -> f64 {
    tokens as f64 / TOKENS_PER_UNIT * rate
}

/// Converts token usage into cost and accumulates it for the current task.
///
/// Unknown vendor/model pairs are billed at zero; they are simply untracked.
#[derive(Debug, Default)]
pub struct CostLedger {
    pricing: HashMap<String, ModelPricing>,
    records: Vec<UsageRecord>,
    total_prompt_tokens: u64,
    total_completion_tokens: u64,
    total_cost: f64,
}

impl CostLedger {
    /// Create an empty ledger with no pricing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger preloaded with the built-in price table.
    pub fn with_default_pricing() -> Self {
        let mut ledger = Self::new();
        for pricing in default_pricing() {
            ledger.register_pricing(pricing);
        }
        ledger
    }

    /// Insert or overwrite the pricing for `vendor:model`.
    pub fn register_pricing(&mut self, pricing: ModelPricing) {
        self.pricing.insert(pricing.key(), pricing);
    }

    /// Look up pricing for a vendor/model pair.
    pub fn get_pricing(&self, vendor: &str, model: &str) -> Option<&ModelPricing> {
        self.pricing.get(&pricing_key(vendor, model))
    }

    /// Number of registered pricing entries.
    pub fn pricing_count(&self) -> usize {
        self.pricing.len()
    }

    /// Compute the cost of one call without recording it.
    pub fn calculate_cost(
        &self,
        vendor: &str,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> CallCost {
        match self.get_pricing(vendor, model) {
            Some(pricing) => policy_cost(&pricing.policy, prompt_tokens, completion_tokens),
            None => CallCost::zero(),
        }
    }

    /// Compute the cost of one call and append it to the ledger.
    pub fn record_usage(
        &mut self,
        vendor: &str,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> UsageRecord {
        let cost = self.calculate_cost(vendor, model, prompt_tokens, completion_tokens);
        let currency = self
            .get_pricing(vendor, model)
            .map(|p| p.currency.clone())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let record = UsageRecord {
            timestamp: Local::now().to_rfc3339(),
            provider: vendor.to_string(),
            model: model.to_string(),
            prompt_tokens,
            completion_tokens,
            input_cost: cost.input_cost,
            output_cost: cost.output_cost,
            total_cost: cost.total_cost,
            currency,
        };

        tracing::debug!(
            vendor,
            model,
            prompt_tokens,
            completion_tokens,
            cost = cost.total_cost,
            "recorded model usage"
        );

        self.records.push(record.clone());
        self.total_prompt_tokens += prompt_tokens;
        self.total_completion_tokens += completion_tokens;
        self.total_cost += cost.total_cost;

        record
    }

    /// All records since the last reset.
    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    /// Aggregate everything recorded since the last reset.
    ///
    /// `provider` and `model` reflect the most recent record only.
    pub fn get_task_summary(&self) -> TaskBillingSummary {
        let Some(last) = self.records.last() else {
            return TaskBillingSummary::empty();
        };

        TaskBillingSummary {
            provider: last.provider.clone(),
            model: last.model.clone(),
            total_prompt_tokens: self.total_prompt_tokens,
            total_completion_tokens: self.total_completion_tokens,
            total_input_cost: self.records.iter().map(|r| r.input_cost).sum(),
            total_output_cost: self.records.iter().map(|r| r.output_cost).sum(),
            total_cost: self.total_cost,
            step_count: self.records.len(),
            currency: last.currency.clone(),
            records: self.records.clone(),
        }
    }

    /// Clear records and running totals. Pricing stays registered.
    pub fn reset(&mut self) {
        self.records.clear();
        self.total_prompt_tokens = 0;
        self.total_completion_tokens = 0;
        self.total_cost = 0.0;
    }

    /// Serialize the task summary as pretty JSON.
    pub fn export_report(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.get_task_summary())
    }
}

fn policy_cost(policy: &PricingPolicy, prompt_tokens: u64, completion_tokens: u64) -> CallCost {
    match policy {
        PricingPolicy::Free => CallCost::zero(),
        PricingPolicy::Fixed {
            input_rate,
            output_rate,
            free_input_tokens,
            free_output_tokens,
        } => {
            let billable_prompt = prompt_tokens.saturating_sub(*free_input_tokens);
            let billable_completion = completion_tokens.saturating_sub(*free_output_tokens);
            CallCost::new(
                per_million(billable_prompt, *input_rate),
                per_million(billable_completion, *output_rate),
            )
        }
        PricingPolicy::Tiered(tiers) => tiered_cost(tiers, prompt_tokens, completion_tokens),
        PricingPolicy::TieredComplex(tiers) => {
            complex_tiered_cost(tiers, prompt_tokens, completion_tokens)
        }
    }
}

/// Walk the ladder in ascending `min_tokens` order, letting each tier absorb
/// up to its capacity from the prompt and completion counts independently.
fn tiered_cost(tiers: &[PriceTier], prompt_tokens: u64, completion_tokens: u64) -> CallCost {
    let mut ladder: Vec<&PriceTier> = tiers.iter().collect();
    ladder.sort_by_key(|tier| tier.min_tokens);

    let mut input_cost = 0.0;
    let mut output_cost = 0.0;
    let mut remaining_prompt = prompt_tokens;
    let mut remaining_completion = completion_tokens;

    for tier in ladder {
        if remaining_prompt == 0 && remaining_completion == 0 {
            break;
        }
        let capacity = tier.capacity();

        let prompt_in_tier = remaining_prompt.min(capacity);
        input_cost += per_million(prompt_in_tier, tier.input_price);
        remaining_prompt -= prompt_in_tier;

        let completion_in_tier = remaining_completion.min(capacity);
        output_cost += per_million(completion_in_tier, tier.output_price);
        remaining_completion -= completion_in_tier;
    }

    CallCost::new(input_cost, output_cost)
}

/// First matching row prices the whole call; no row matching falls back to
/// the last declared row.
fn complex_tiered_cost(
    tiers: &[ComplexPriceTier],
    prompt_tokens: u64,
    completion_tokens: u64,
) -> CallCost {
    let matched = tiers
        .iter()
        .find(|t| t.matches(prompt_tokens, completion_tokens))
        .or_else(|| tiers.last());

    match matched {
        Some(tier) => CallCost::new(
            per_million(prompt_tokens, tier.input_price),
            per_million(completion_tokens, tier.output_price),
        ),
        None => CallCost::zero(),
    }
}

/// Built-in price table used when no pricing file is configured.
pub fn default_pricing() -> Vec<ModelPricing> {
    vec![
        ModelPricing::fixed("OpenAI", "gpt-4o", 2.50, 10.00),
        ModelPricing::fixed("OpenAI", "gpt-4o-mini", 0.15, 0.60),
        ModelPricing::fixed("DeepSeek", "deepseek-chat", 0.14, 0.28),
        ModelPricing::fixed("Google", "gemini-2.0-flash", 0.075, 0.30),
        ModelPricing::fixed("Anthropic", "claude-sonnet-4-20250514", 3.00, 15.00),
    ]
}

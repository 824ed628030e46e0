//! Billing module for tracking model usage cost.

mod ledger;
mod loader;
mod models;

pub use ledger::{default_pricing, CostLedger};
pub use loader::{load_pricing_config, load_pricing_str, BillingError};
pub use models::{
    pricing_key, CallCost, ComplexPriceTier, ModelPricing, PriceTier, PricingPolicy, PricingType,
    TaskBillingSummary, UsageRecord, DEFAULT_CURRENCY,
};

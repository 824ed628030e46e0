//! Pricing configuration loader.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::ledger::CostLedger;
use super::models::{
    ComplexPriceTier, ModelPricing, PriceTier, PricingPolicy, PricingType, DEFAULT_CURRENCY,
};

/// Pricing configuration errors.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Failed to read pricing config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse pricing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid pricing for {vendor}/{model}: {reason}")]
    InvalidPricing {
        vendor: String,
        model: String,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct PricingFile {
    #[serde(default)]
    models: Vec<PricingEntry>,
}

/// One model entry as written in the YAML file.
#[derive(Debug, Deserialize)]
struct PricingEntry {
    vendor: String,
    model: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    pricing_type: PricingType,
    #[serde(default)]
    input_price_per_million: f64,
    #[serde(default)]
    output_price_per_million: f64,
    #[serde(default)]
    tiers: Vec<PriceTier>,
    #[serde(default)]
    complex_tiers: Vec<ComplexPriceTier>,
    #[serde(default)]
    free_input_tokens: u64,
    #[serde(default)]
    free_output_tokens: u64,
    #[serde(default)]
    currency: Option<String>,
}

impl PricingEntry {
    fn invalid(&self, reason: &str) -> BillingError {
        BillingError::InvalidPricing {
            vendor: self.vendor.clone(),
            model: self.model.clone(),
            reason: reason.to_string(),
        }
    }

    fn into_pricing(self) -> Result<ModelPricing, BillingError> {
        let policy = match self.pricing_type {
            PricingType::Free => PricingPolicy::Free,
            PricingType::Fixed => PricingPolicy::Fixed {
                input_rate: self.input_price_per_million,
                output_rate: self.output_price_per_million,
                free_input_tokens: self.free_input_tokens,
                free_output_tokens: self.free_output_tokens,
            },
            PricingType::Tiered => {
                if self.tiers.is_empty() {
                    return Err(self.invalid("tiered pricing requires at least one tier"));
                }
                PricingPolicy::tiered(self.tiers)
            }
            PricingType::TieredComplex => {
                if !self.complex_tiers.is_empty() {
                    PricingPolicy::TieredComplex(self.complex_tiers)
                } else if !self.tiers.is_empty() {
                    PricingPolicy::tiered(self.tiers)
                } else {
                    return Err(self.invalid("tiered_complex pricing requires complex_tiers"));
                }
            }
        };

        Ok(ModelPricing {
            vendor: self.vendor,
            model: self.model,
            display_name: self.display_name,
            currency: self.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            policy,
        })
    }
}

/// Parse a YAML pricing document into a ledger.
pub fn load_pricing_str(content: &str) -> Result<CostLedger, BillingError> {
    let file: PricingFile = serde_yaml::from_str(content)?;
    let mut ledger = CostLedger::new();

    for entry in file.models {
        ledger.register_pricing(entry.into_pricing()?);
    }

    Ok(ledger)
}

/// Load pricing from a YAML file.
///
/// A missing file yields an empty ledger so billing degrades to zero cost.
pub fn load_pricing_config(path: impl AsRef<Path>) -> Result<CostLedger, BillingError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!("Pricing config not found: {}", path.display());
        return Ok(CostLedger::new());
    }

    let content = fs::read_to_string(path).map_err(|source| BillingError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let ledger = load_pricing_str(&content)?;
    tracing::info!(
        "Loaded {} pricing entries from {}",
        ledger.pricing_count(),
        path.display()
    );
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
models:
  - vendor: OpenAI
    model: gpt-4o
    pricing_type: fixed
    input_price_per_million: 2.5
    output_price_per_million: 10.0
  - vendor: Google
    model: gemini-1.5-pro
    pricing_type: tiered
    tiers:
      - min_tokens: 128000
        input_price: 2.5
        output_price: 10.0
      - min_tokens: 0
        max_tokens: 128000
        input_price: 1.25
        output_price: 5.0
  - vendor: ByteDance
    model: doubao-seed
    pricing_type: tiered_complex
    currency: CNY
    complex_tiers:
      - input_max: 32000
        output_max: 200
        input_price: 0.8
        output_price: 2.0
      - input_min: 32001
        input_price: 2.4
        output_price: 24.0
  - vendor: Local
    model: autoglm-phone-9b
    pricing_type: free
"#;

    #[test]
    fn test_load_sample() {
        let ledger = load_pricing_str(SAMPLE).unwrap();
        assert_eq!(ledger.pricing_count(), 4);

        let gemini = ledger.get_pricing("Google", "gemini-1.5-pro").unwrap();
        match &gemini.policy {
            PricingPolicy::Tiered(tiers) => {
                assert_eq!(tiers[0].min_tokens, 0);
                assert_eq!(tiers[1].max_tokens, None);
            }
            other => panic!("unexpected policy: {:?}", other),
        }

        let doubao = ledger.get_pricing("ByteDance", "doubao-seed").unwrap();
        assert_eq!(doubao.currency, "CNY");
        assert_eq!(doubao.policy.pricing_type(), PricingType::TieredComplex);
    }

    #[test]
    fn test_tiered_without_tiers_is_load_error() {
        let yaml = "models:\n  - vendor: V\n    model: m\n    pricing_type: tiered\n";
        let err = load_pricing_str(yaml).unwrap_err();
        assert!(matches!(err, BillingError::InvalidPricing { .. }));
        assert!(err.to_string().contains("V/m"));
    }

    #[test]
    fn test_complex_without_rows_uses_simple_tiers() {
        let yaml = r#"
models:
  - vendor: V
    model: m
    pricing_type: tiered_complex
    tiers:
      - min_tokens: 0
        input_price: 1.0
        output_price: 1.0
"#;
        let ledger = load_pricing_str(yaml).unwrap();
        let pricing = ledger.get_pricing("V", "m").unwrap();
        assert_eq!(pricing.policy.pricing_type(), PricingType::Tiered);
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            load_pricing_str("models: [ {vendor: "),
            Err(BillingError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_gives_empty_ledger() {
        let ledger = load_pricing_config("/definitely/not/here/pricing.yaml").unwrap();
        assert_eq!(ledger.pricing_count(), 0);
    }
}

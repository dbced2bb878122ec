use crate::dataset::MissingInputPolicy;
use analysis_core::AnalysisError;
use fundamental_analysis::{DcfModel, ValuationConfig};
use quant_analysis::{DistressConfig, FactorFallbacks};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Every tunable of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub valuation: ValuationConfig,
    /// SMB/HML returns used when the input has no factor columns
    pub factor_fallbacks: FactorFallbacks,
    pub distress: DistressConfig,
    /// Decimal places used by the text report
    pub report_digits: usize,
    pub missing_input: MissingInputPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            valuation: ValuationConfig::default(),
            factor_fallbacks: FactorFallbacks::default(),
            distress: DistressConfig::default(),
            report_digits: 2,
            missing_input: MissingInputPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with any of `RISK_FREE_RATE`, `MARKET_RETURN`,
    /// `COST_OF_DEBT`, `TAX_RATE`, `DCF_GROWTH`, `SMB_FALLBACK`, `HML_FALLBACK`,
    /// `REPORT_DIGITS`, `MLP_SEED` and `MISSING_INPUT` found in the process
    /// environment.
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unset keys keep their current value;
    /// set but unparseable keys are an error.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "RISK_FREE_RATE")? {
            self.valuation.risk_free_rate = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_RETURN")? {
            self.valuation.market_return = v;
        }
        if let Some(v) = parse_var(&lookup, "COST_OF_DEBT")? {
            self.valuation.cost_of_debt = v;
        }
        if let Some(v) = parse_var(&lookup, "TAX_RATE")? {
            self.valuation.tax_rate = v;
        }
        if let Some(raw) = lookup("DCF_GROWTH") {
            self.valuation.dcf = if raw.trim().eq_ignore_ascii_case("none") {
                DcfModel::Perpetuity
            } else {
                DcfModel::GrowingPerpetuity {
                    growth: parse_value("DCF_GROWTH", &raw)?,
                }
            };
        }
        if let Some(v) = parse_var(&lookup, "SMB_FALLBACK")? {
            self.factor_fallbacks.smb = v;
        }
        if let Some(v) = parse_var(&lookup, "HML_FALLBACK")? {
            self.factor_fallbacks.hml = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_DIGITS")? {
            self.report_digits = v;
        }
        if let Some(v) = parse_var(&lookup, "MLP_SEED")? {
            self.distress.network.seed = v;
        }
        if let Some(v) = parse_var(&lookup, "MISSING_INPUT")? {
            self.missing_input = v;
        }
        Ok(self)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, AnalysisError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|raw| parse_value(key, &raw)).transpose()
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, AnalysisError> {
    raw.trim()
        .parse()
        .map_err(|_| AnalysisError::InvalidData(format!("{}: cannot parse '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.valuation.risk_free_rate, 0.03);
        assert_eq!(config.valuation.market_return, 0.10);
        assert_eq!(config.valuation.dcf, DcfModel::GrowingPerpetuity { growth: 0.05 });
        assert_eq!(config.report_digits, 2);
        assert_eq!(config.missing_input, MissingInputPolicy::UseSample);
        assert_eq!(config.distress.features.len(), 5);
        assert_eq!(config.factor_fallbacks, FactorFallbacks { smb: 0.05, hml: 0.02 });
    }

    #[test]
    fn test_overlay_overrides_set_keys_only() {
        let config = PipelineConfig::default()
            .overlay(env(&[
                ("RISK_FREE_RATE", "0.04"),
                ("DCF_GROWTH", "none"),
                ("MISSING_INPUT", "fail"),
                ("REPORT_DIGITS", "3"),
            ]))
            .unwrap();

        assert_eq!(config.valuation.risk_free_rate, 0.04);
        assert_eq!(config.valuation.market_return, 0.10);
        assert_eq!(config.valuation.dcf, DcfModel::Perpetuity);
        assert_eq!(config.missing_input, MissingInputPolicy::Fail);
        assert_eq!(config.report_digits, 3);
    }

    #[test]
    fn test_overlay_growth_rate() {
        let config = PipelineConfig::default()
            .overlay(env(&[("DCF_GROWTH", "0.02")]))
            .unwrap();
        assert_eq!(config.valuation.dcf, DcfModel::GrowingPerpetuity { growth: 0.02 });
    }

    #[test]
    fn test_overlay_factor_fallbacks() {
        let config = PipelineConfig::default()
            .overlay(env(&[("SMB_FALLBACK", "0.01")]))
            .unwrap();
        assert_eq!(config.factor_fallbacks.smb, 0.01);
        assert_eq!(config.factor_fallbacks.hml, 0.02);
    }

    #[test]
    fn test_overlay_rejects_garbage() {
        let result = PipelineConfig::default().overlay(env(&[("TAX_RATE", "a quarter")]));
        assert!(matches!(result, Err(AnalysisError::InvalidData(_))));

        let result = PipelineConfig::default().overlay(env(&[("MISSING_INPUT", "maybe")]));
        assert!(result.is_err());
    }
}

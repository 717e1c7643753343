//! Engine configuration
//!
//! Loadable from JSON or from environment variables with the `GST_` prefix.
//! Every field has a default, so a partial document is enough.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::tax::gstin;
use crate::types::{GstError, GstResult};
use crate::utils::money::MONEY_SCALE;

/// What to do when a return is filed twice for the same period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefilingPolicy {
    /// Reject the second filing with `GstError::DuplicateFiling`
    #[default]
    Reject,
    /// Record every filing
    Allow,
}

impl RefilingPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "allow" => Some(Self::Allow),
            _ => None,
        }
    }
}

/// Ratios of |difference| / invoice value at which a discrepancy escalates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    #[serde(default = "default_medium_ratio")]
    pub medium: BigDecimal,
    #[serde(default = "default_high_ratio")]
    pub high: BigDecimal,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            medium: default_medium_ratio(),
            high: default_high_ratio(),
        }
    }
}

fn default_medium_ratio() -> BigDecimal {
    BigDecimal::new(1.into(), 2) // 0.01
}

fn default_high_ratio() -> BigDecimal {
    BigDecimal::new(5.into(), 2) // 0.05
}

/// Compliance engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstConfig {
    /// GSTIN of the registered business
    #[serde(default)]
    pub business_gstin: Option<String>,
    /// Actor recorded on audit entries
    #[serde(default = "default_actor")]
    pub actor: String,
    /// Invoice value from which an e-way bill is required
    #[serde(default = "default_eway_threshold")]
    pub eway_bill_threshold: BigDecimal,
    #[serde(default = "default_eway_validity_hours")]
    pub eway_validity_hours: i64,
    /// Unregistered-buyer invoice value above which a supply is B2C-Large
    #[serde(default = "default_b2cl_threshold")]
    pub b2c_large_threshold: BigDecimal,
    #[serde(default)]
    pub severity: SeverityThresholds,
    /// Absolute difference below which reconciled amounts count as equal
    #[serde(default = "default_match_tolerance")]
    pub match_tolerance: BigDecimal,
    #[serde(default)]
    pub refiling: RefilingPolicy,
    /// Day of the following month on which GSTR-1 falls due
    #[serde(default = "default_gstr1_due_day")]
    pub gstr1_due_day: u32,
    /// Day of the following month on which GSTR-3B falls due
    #[serde(default = "default_gstr3b_due_day")]
    pub gstr3b_due_day: u32,
    /// Decimal places for filed and reported amounts
    #[serde(default = "default_money_scale")]
    pub money_scale: i64,
}

/// Longest e-way bill validity window accepted, one year
pub const MAX_EWAY_VALIDITY_HOURS: i64 = 24 * 365;

fn default_actor() -> String {
    "system".to_string()
}

fn default_eway_threshold() -> BigDecimal {
    BigDecimal::from(50000)
}

fn default_eway_validity_hours() -> i64 {
    24
}

fn default_b2cl_threshold() -> BigDecimal {
    BigDecimal::from(250000)
}

fn default_match_tolerance() -> BigDecimal {
    BigDecimal::from(0)
}

fn default_gstr1_due_day() -> u32 {
    11
}

fn default_gstr3b_due_day() -> u32 {
    20
}

fn default_money_scale() -> i64 {
    MONEY_SCALE
}

impl Default for GstConfig {
    fn default() -> Self {
        Self {
            business_gstin: None,
            actor: default_actor(),
            eway_bill_threshold: default_eway_threshold(),
            eway_validity_hours: default_eway_validity_hours(),
            b2c_large_threshold: default_b2cl_threshold(),
            severity: SeverityThresholds::default(),
            match_tolerance: default_match_tolerance(),
            refiling: RefilingPolicy::default(),
            gstr1_due_day: default_gstr1_due_day(),
            gstr3b_due_day: default_gstr3b_due_day(),
            money_scale: default_money_scale(),
        }
    }
}

impl GstConfig {
    /// Configuration for a registered business, other fields defaulted
    pub fn for_business(gstin: impl Into<String>) -> Self {
        Self {
            business_gstin: Some(gstin.into()),
            ..Self::default()
        }
    }

    /// Parse a JSON document and validate it
    pub fn from_json(json: &str) -> GstResult<Self> {
        let config: GstConfig = serde_json::from_str(json)
            .map_err(|e| GstError::Validation(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `GST_*` environment variables; unset or unparsable values fall back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            business_gstin: env::var("GST_BUSINESS_GSTIN").ok(),
            actor: env::var("GST_ACTOR").unwrap_or(defaults.actor),
            eway_bill_threshold: decimal_var("GST_EWAY_THRESHOLD")
                .unwrap_or(defaults.eway_bill_threshold),
            eway_validity_hours: env::var("GST_EWAY_VALIDITY_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.eway_validity_hours),
            b2c_large_threshold: decimal_var("GST_B2CL_THRESHOLD")
                .unwrap_or(defaults.b2c_large_threshold),
            severity: SeverityThresholds {
                medium: decimal_var("GST_SEVERITY_MEDIUM").unwrap_or(defaults.severity.medium),
                high: decimal_var("GST_SEVERITY_HIGH").unwrap_or(defaults.severity.high),
            },
            match_tolerance: decimal_var("GST_MATCH_TOLERANCE")
                .unwrap_or(defaults.match_tolerance),
            refiling: env::var("GST_REFILING")
                .ok()
                .and_then(|s| RefilingPolicy::parse(&s))
                .unwrap_or(defaults.refiling),
            gstr1_due_day: env::var("GST_GSTR1_DUE_DAY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.gstr1_due_day),
            gstr3b_due_day: env::var("GST_GSTR3B_DUE_DAY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.gstr3b_due_day),
            money_scale: env::var("GST_MONEY_SCALE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.money_scale),
        }
    }

    /// Hard checks applied before a configuration is accepted
    pub fn validate(&self) -> GstResult<()> {
        if let Some(gstin) = &self.business_gstin {
            gstin::require_valid_gstin(gstin, "business_gstin")?;
        }

        if self.eway_validity_hours <= 0 {
            return Err(GstError::Validation(
                "E-way bill validity must be at least one hour".to_string(),
            ));
        }
        if self.eway_validity_hours > MAX_EWAY_VALIDITY_HOURS {
            return Err(GstError::Validation(format!(
                "E-way bill validity of {} hours exceeds the maximum of {MAX_EWAY_VALIDITY_HOURS}",
                self.eway_validity_hours
            )));
        }

        if self.severity.medium > self.severity.high {
            return Err(GstError::Validation(format!(
                "Medium severity ratio {} exceeds high ratio {}",
                self.severity.medium, self.severity.high
            )));
        }

        for (name, day) in [
            ("gstr1_due_day", self.gstr1_due_day),
            ("gstr3b_due_day", self.gstr3b_due_day),
        ] {
            if !(1..=28).contains(&day) {
                return Err(GstError::Validation(format!(
                    "{name} must be between 1 and 28, got {day}"
                )));
            }
        }

        if !(0..=4).contains(&self.money_scale) {
            return Err(GstError::Validation(format!(
                "money_scale must be between 0 and 4, got {}",
                self.money_scale
            )));
        }

        Ok(())
    }
}

fn decimal_var(name: &str) -> Option<BigDecimal> {
    env::var(name)
        .ok()
        .and_then(|s| BigDecimal::from_str(s.trim()).ok())
}

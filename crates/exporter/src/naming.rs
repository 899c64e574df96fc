//! Metric naming.
//!
//! ATA attribute names (`Reallocated_Sector_Ct`, `G-Sense_Error_Rate`) and
//! NVMe log field identifiers (`PowerOnHours`) are folded into lowercase
//! snake case under the `smartmon` namespace. Every function here is pure.

use regex::Regex;
use std::sync::LazyLock;

pub const NAMESPACE: &str = "smartmon";

static UPPERCASE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([A-Z]+)").expect("uppercase run pattern"));

/// Role of one of the three metrics exported per ATA attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Value,
    Worst,
    Threshold,
}

impl Facet {
    pub const ALL: [Facet; 3] = [Facet::Value, Facet::Worst, Facet::Threshold];

    pub fn suffix(self) -> &'static str {
        match self {
            Facet::Value => "value",
            Facet::Worst => "worst",
            Facet::Threshold => "threshold",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Facet::Value => "current normalized value",
            Facet::Worst => "worst normalized value observed",
            Facet::Threshold => "failure threshold",
        }
    }
}

/// Lowercases `raw` and turns hyphens (and anything else outside
/// `[a-z0-9_]`) into underscores. `None` for names that are blank.
pub fn canonical_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() {
                    ch.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect(),
    )
}

/// Prefixes every run of uppercase letters with `_`, then canonicalizes:
/// `PowerOnHours` becomes `_power_on_hours`.
pub fn snake_case_field(raw: &str) -> Option<String> {
    let separated = UPPERCASE_RUN.replace_all(raw.trim(), "_$1");
    canonical_name(&separated)
}

/// `smartmon_<attribute>_<facet>`
pub fn attribute_metric_name(raw: &str, facet: Facet) -> Option<String> {
    canonical_name(raw).map(|name| format!("{}_{}_{}", NAMESPACE, name, facet.suffix()))
}

/// `smartmon` followed directly by the snake-cased field; the separator
/// comes from the field's leading capital.
pub fn field_metric_name(raw: &str) -> Option<String> {
    snake_case_field(raw).map(|name| format!("{}{}", NAMESPACE, name))
}

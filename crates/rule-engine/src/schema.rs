use std::collections::HashSet;
use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// What to do with a request once a decision is reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Block,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => f.write_str("allow"),
            Action::Block => f.write_str("block"),
        }
    }
}

/// Which request field a rule inspects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Ipv4,
    Ipv6,
    Url,
    Domain,
    UserAgent,
    UriSuffix,
    Size,
    Method,
    Header,
}

/// How a rule's value is compared against the request field.
///
/// Legality depends on the rule type: `gte`/`lte` are only meaningful for
/// size rules, `in_range` means CIDR containment for IP rules and an
/// inclusive bounds check for size rules.  An operator that makes no sense
/// for the rule's type simply never matches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Wildcard,
    Gte,
    Lte,
    InRange,
}

impl fmt::Display for MatchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchOperator::Equals => "equals",
            MatchOperator::Contains => "contains",
            MatchOperator::StartsWith => "starts_with",
            MatchOperator::EndsWith => "ends_with",
            MatchOperator::Regex => "regex",
            MatchOperator::Wildcard => "wildcard",
            MatchOperator::Gte => "gte",
            MatchOperator::Lte => "lte",
            MatchOperator::InRange => "in_range",
        };
        f.write_str(s)
    }
}

/// A single filtering rule.
///
/// The serialized field names are the on-disk rule document schema and are
/// identical across the YAML, JSON, and TOML renderings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    /// Unique identifier; no two rules in a set may share an id.
    pub id: String,
    /// Human-readable name, no semantic effect.
    #[serde(default)]
    pub name: String,
    /// Optional longer description, no semantic effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Which request field this rule inspects.
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// How the value is compared.
    pub operator: MatchOperator,
    /// Payload interpreted according to `type` + `operator`.
    #[serde(default)]
    pub value: String,
    /// Decision emitted when this rule matches.
    pub action: Action,
    /// Lower value = evaluated earlier = higher precedence.
    #[serde(default)]
    pub priority: i32,
    /// Disabled rules are retained but never considered during evaluation.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    // Size rules only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,

    // Header rules only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_value: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Run post-deserialization validation over a rule list.
///
/// Every rule must carry a non-empty id and ids must be unique.  Type and
/// action validity are already enforced by the closed enums during
/// deserialization.
pub fn validate_rules(rules: &[Rule]) -> Result<()> {
    let mut seen = HashSet::new();
    for (i, rule) in rules.iter().enumerate() {
        if rule.id.is_empty() {
            bail!("rule at index {i} has no id");
        }
        if !seen.insert(&rule.id) {
            bail!("duplicate rule id: '{}'", rule.id);
        }
    }
    Ok(())
}

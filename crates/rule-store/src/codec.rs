//! Extension-driven rule document codec.
//!
//! A rule document is a single `rules: [...]` record serialized as YAML,
//! JSON, or TOML; the format is derived from the file extension.  The codec
//! round-trips: decoding an encoded rule list reproduces an equivalent
//! list in every supported format.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use rule_engine::{Action, MatchOperator, Rule, RuleType};

/// Supported rule document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Derive the format from a document path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            _ => bail!(
                "unsupported rules file format: '{}'",
                path.display()
            ),
        }
    }
}

/// On-disk shape of a rule document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RulesDocument {
    #[serde(default)]
    rules: Vec<Rule>,
}

/// Parse a rule document into an ordered rule list.
pub fn decode_rules(text: &str, format: DocumentFormat) -> Result<Vec<Rule>> {
    let doc: RulesDocument = match format {
        DocumentFormat::Yaml => {
            serde_yml::from_str(text).context("failed to parse YAML rules")?
        }
        DocumentFormat::Json => {
            serde_json::from_str(text).context("failed to parse JSON rules")?
        }
        DocumentFormat::Toml => toml::from_str(text).context("failed to parse TOML rules")?,
    };
    Ok(doc.rules)
}

/// Serialize a rule list back into document form.
pub fn encode_rules(rules: &[Rule], format: DocumentFormat) -> Result<String> {
    let doc = RulesDocument {
        rules: rules.to_vec(),
    };
    match format {
        DocumentFormat::Yaml => serde_yml::to_string(&doc).context("failed to encode YAML rules"),
        DocumentFormat::Json => {
            serde_json::to_string_pretty(&doc).context("failed to encode JSON rules")
        }
        DocumentFormat::Toml => {
            toml::to_string_pretty(&doc).context("failed to encode TOML rules")
        }
    }
}

/// A representative starter rule set, written by [`write_sample_rules`].
pub fn sample_rules() -> Vec<Rule> {
    let base = Rule {
        id: String::new(),
        name: String::new(),
        description: None,
        rule_type: RuleType::Url,
        operator: MatchOperator::Equals,
        value: String::new(),
        action: Action::Block,
        priority: 100,
        enabled: true,
        min_size: None,
        max_size: None,
        header_name: None,
        header_value: None,
    };

    vec![
        Rule {
            id: "allow-health-checks".to_string(),
            name: "Allow Health Checks".to_string(),
            description: Some("Always allow health check endpoints".to_string()),
            value: "/health".to_string(),
            action: Action::Allow,
            priority: 50,
            ..base.clone()
        },
        Rule {
            id: "block-admin".to_string(),
            name: "Block Admin Access".to_string(),
            description: Some("Block access to admin endpoints".to_string()),
            operator: MatchOperator::StartsWith,
            value: "/admin".to_string(),
            ..base.clone()
        },
        Rule {
            id: "block-large-uploads".to_string(),
            name: "Block Large Uploads".to_string(),
            description: Some("Block uploads larger than 50MB".to_string()),
            rule_type: RuleType::Size,
            operator: MatchOperator::Gte,
            min_size: Some(50 * 1024 * 1024),
            priority: 200,
            ..base.clone()
        },
        Rule {
            id: "block-suspicious-uas".to_string(),
            name: "Block Suspicious User Agents".to_string(),
            description: Some("Block requests from suspicious user agents".to_string()),
            rule_type: RuleType::UserAgent,
            operator: MatchOperator::Regex,
            value: "(?i)(bot|crawler|spider|scraper)".to_string(),
            priority: 300,
            enabled: false,
            ..base.clone()
        },
        Rule {
            id: "block-private-networks".to_string(),
            name: "Block Private Network Access".to_string(),
            description: Some("Block requests from private network ranges".to_string()),
            rule_type: RuleType::Ipv4,
            operator: MatchOperator::InRange,
            value: "192.168.0.0/16".to_string(),
            priority: 150,
            enabled: false,
            ..base
        },
    ]
}

/// Write a sample rule document in the format implied by `path`.
pub fn write_sample_rules(path: &Path) -> Result<()> {
    let format = DocumentFormat::from_path(path)?;
    let text = encode_rules(&sample_rules(), format)?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write sample rules file: {}", path.display()))?;
    Ok(())
}

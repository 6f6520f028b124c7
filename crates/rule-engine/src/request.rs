use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use crate::schema::{Action, Rule};

/// Everything the engine needs to know about one HTTP request.
///
/// Built by the proxy layer from the incoming request; immutable for the
/// duration of one evaluation.  `headers` maps header names to all values
/// seen for that name; lookups by header rules are case-insensitive.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub domain: String,
    pub path: String,
    pub headers: HashMap<String, Vec<String>>,
    pub user_agent: String,
    pub client_ip: IpAddr,
    pub size: u64,
    pub remote_addr: String,
}

impl Default for RequestInfo {
    fn default() -> Self {
        Self {
            method: String::new(),
            url: String::new(),
            domain: String::new(),
            path: String::new(),
            headers: HashMap::new(),
            user_agent: String::new(),
            client_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            size: 0,
            remote_addr: String::new(),
        }
    }
}

/// The outcome of evaluating one request against the rule set.
///
/// Produced fresh per call and never mutated after return.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Whether any enabled rule matched.
    pub matched: bool,
    /// Copy of the rule that matched, if any.
    pub rule: Option<Rule>,
    /// The action to take.
    pub action: Action,
    /// Human-readable explanation of the decision.
    pub reason: String,
}

impl Evaluation {
    /// Decision taken because `rule` matched.
    pub fn matched(rule: Rule, reason: impl Into<String>) -> Self {
        Self {
            matched: true,
            action: rule.action,
            rule: Some(rule),
            reason: reason.into(),
        }
    }

    /// Fallback decision when no rule matched.
    pub fn unmatched(action: Action, reason: impl Into<String>) -> Self {
        Self {
            matched: false,
            rule: None,
            action,
            reason: reason.into(),
        }
    }
}

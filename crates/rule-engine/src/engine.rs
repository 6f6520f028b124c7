use std::collections::HashMap;

use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::matcher::{cidr_contains, string_matches, wildcard_matches};
use crate::request::{Evaluation, RequestInfo};
use crate::schema::{Action, MatchOperator, Rule, RuleType};

/// The live rule set: rules sorted ascending by priority plus the regex
/// cache built from the same rules.  Always swapped as a unit so readers
/// never observe the order of one version with the cache of another.
struct RuleSet {
    rules: Vec<Rule>,
    regexes: HashMap<String, Regex>,
}

impl RuleSet {
    fn build(mut rules: Vec<Rule>) -> Self {
        // Stable sort: equal priorities keep their insertion order.
        rules.sort_by_key(|r| r.priority);
        let regexes = compile_regexes(&rules);
        Self { rules, regexes }
    }
}

/// Compile the patterns of all regex-operator rules, keyed by rule id.
///
/// A pattern that fails to compile is excluded from the cache, which makes
/// its rule permanently unmatchable; the failure is logged so an operator
/// can spot the dead rule.
fn compile_regexes(rules: &[Rule]) -> HashMap<String, Regex> {
    let mut regexes = HashMap::new();
    for rule in rules {
        if rule.operator != MatchOperator::Regex {
            continue;
        }
        let pattern = match rule.rule_type {
            RuleType::Header => rule.header_value.as_deref().unwrap_or(""),
            _ => rule.value.as_str(),
        };
        if pattern.is_empty() {
            continue;
        }
        match Regex::new(pattern) {
            Ok(re) => {
                regexes.insert(rule.id.clone(), re);
            }
            Err(e) => {
                warn!(
                    rule_id = %rule.id,
                    pattern,
                    error = %e,
                    "invalid regex pattern; rule will never match"
                );
            }
        }
    }
    regexes
}

/// Priority-ordered allow/block engine.
///
/// Holds the live rule set behind a reader/writer lock: evaluations run
/// concurrently under the shared lock, every mutation takes the exclusive
/// lock and rebuilds the sorted order and regex cache before releasing it.
pub struct RuleEngine {
    default_action: Action,
    state: RwLock<RuleSet>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("default_action", &self.default_action)
            .field("num_rules", &self.state.read().rules.len())
            .finish()
    }
}

impl RuleEngine {
    /// Create an engine from an initial rule list and a default action.
    pub fn new(rules: Vec<Rule>, default_action: Action) -> Self {
        Self {
            default_action,
            state: RwLock::new(RuleSet::build(rules)),
        }
    }

    /// The action returned when no enabled rule matches.
    pub fn default_action(&self) -> Action {
        self.default_action
    }

    /// Evaluate one request against the rule set.
    ///
    /// Iterates rules in priority order, skipping disabled ones; the first
    /// match wins.  Never fails: unparsable rule values and type mismatches
    /// degrade to no-match, and an empty set yields the default action.
    pub fn evaluate(&self, request: &RequestInfo) -> Evaluation {
        let state = self.state.read();

        for rule in &state.rules {
            if !rule.enabled {
                continue;
            }
            if let Some(reason) = match_rule(rule, request, &state.regexes) {
                trace!(rule_id = %rule.id, reason, "rule matched request");
                return Evaluation::matched(rule.clone(), reason);
            }
        }

        debug!(action = %self.default_action, "no rules matched request");
        Evaluation::unmatched(self.default_action, "no rules matched, using default action")
    }

    /// Replace the entire rule set atomically.
    pub fn replace_all(&self, rules: Vec<Rule>) {
        let mut state = self.state.write();
        *state = RuleSet::build(rules);
    }

    /// Add a rule, re-establishing the sorted order and regex cache.
    pub fn add_rule(&self, rule: Rule) {
        let mut state = self.state.write();
        let mut rules = std::mem::take(&mut state.rules);
        rules.push(rule);
        *state = RuleSet::build(rules);
    }

    /// Remove the rule with the given id.  Returns whether it existed.
    pub fn remove_rule(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let before = state.rules.len();
        state.rules.retain(|r| r.id != id);
        if state.rules.len() == before {
            return false;
        }
        state.regexes.remove(id);
        true
    }

    /// Mark the rule with the given id as enabled.  Returns whether it exists.
    pub fn enable_rule(&self, id: &str) -> bool {
        self.set_enabled(id, true)
    }

    /// Mark the rule with the given id as disabled, keeping it in the set.
    /// Returns whether it exists.
    pub fn disable_rule(&self, id: &str) -> bool {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut state = self.state.write();
        match state.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Copy of all rules in evaluation order.  Mutating the copy has no
    /// effect on the engine.
    pub fn rules(&self) -> Vec<Rule> {
        self.state.read().rules.clone()
    }

    /// Copy of the rule with the given id, if present.
    pub fn rule(&self, id: &str) -> Option<Rule> {
        self.state.read().rules.iter().find(|r| r.id == id).cloned()
    }
}

// ---------------------------------------------------------------------------
// Typed matchers
// ---------------------------------------------------------------------------

/// Check one rule against the request.  Returns the match reason, or `None`
/// if the rule does not apply.
fn match_rule(
    rule: &Rule,
    request: &RequestInfo,
    regexes: &HashMap<String, Regex>,
) -> Option<String> {
    match rule.rule_type {
        RuleType::Ipv4 => {
            if !request.client_ip.is_ipv4() {
                return None;
            }
            match_ip(rule, request.client_ip)
        }
        RuleType::Ipv6 => {
            if !request.client_ip.is_ipv6() {
                return None;
            }
            match_ip(rule, request.client_ip)
        }
        RuleType::Url => match_string_field(rule, &request.url, "URL", regexes),
        RuleType::Domain => match_string_field(rule, &request.domain, "domain", regexes),
        RuleType::UserAgent => {
            match_string_field(rule, &request.user_agent, "user agent", regexes)
        }
        RuleType::UriSuffix => match_uri_suffix(rule, &request.path, regexes),
        RuleType::Size => match_size(rule, request.size),
        RuleType::Method => match_string_field(rule, &request.method, "HTTP method", regexes),
        RuleType::Header => match_header(rule, request, regexes),
    }
}

fn match_ip(rule: &Rule, client_ip: std::net::IpAddr) -> Option<String> {
    match rule.operator {
        MatchOperator::Equals => {
            if client_ip.to_string() == rule.value {
                return Some(format!("IP {client_ip} equals {}", rule.value));
            }
            None
        }
        MatchOperator::InRange => {
            if cidr_contains(&rule.value, client_ip) {
                return Some(format!("IP {client_ip} is in range {}", rule.value));
            }
            None
        }
        _ => None,
    }
}

fn match_string_field(
    rule: &Rule,
    actual: &str,
    field: &str,
    regexes: &HashMap<String, Regex>,
) -> Option<String> {
    let regex = regexes.get(&rule.id);
    if string_matches(rule.operator, &rule.value, actual, regex) {
        return Some(format!(
            "{field} '{actual}' matches '{}' with operator {}",
            rule.value, rule.operator
        ));
    }
    None
}

/// URI-suffix rules are evaluated against the request path only.  `equals`
/// means the path ends with the rule value, matching the historical rule
/// document semantics.
fn match_uri_suffix(rule: &Rule, path: &str, regexes: &HashMap<String, Regex>) -> Option<String> {
    match rule.operator {
        MatchOperator::Equals => {
            if path.ends_with(&rule.value) {
                return Some(format!("URI path {path} ends with {}", rule.value));
            }
            None
        }
        MatchOperator::Wildcard => {
            if wildcard_matches(&rule.value, path) {
                return Some(format!("URI path {path} matches wildcard {}", rule.value));
            }
            None
        }
        MatchOperator::Regex => {
            if regexes.get(&rule.id).is_some_and(|re| re.is_match(path)) {
                return Some(format!("URI path {path} matches regex {}", rule.value));
            }
            None
        }
        _ => None,
    }
}

fn match_size(rule: &Rule, size: u64) -> Option<String> {
    match rule.operator {
        MatchOperator::Gte => {
            let min = rule.min_size?;
            if size >= min {
                return Some(format!("request size {size} >= {min}"));
            }
            None
        }
        MatchOperator::Lte => {
            let max = rule.max_size?;
            if size <= max {
                return Some(format!("request size {size} <= {max}"));
            }
            None
        }
        MatchOperator::InRange => {
            let (min, max) = (rule.min_size?, rule.max_size?);
            if size >= min && size <= max {
                return Some(format!("request size {size} is between {min} and {max}"));
            }
            None
        }
        MatchOperator::Equals => {
            let wanted: u64 = rule.value.parse().ok()?;
            if size == wanted {
                return Some(format!("request size {size} equals {wanted}"));
            }
            None
        }
        _ => None,
    }
}

fn match_header(
    rule: &Rule,
    request: &RequestInfo,
    regexes: &HashMap<String, Regex>,
) -> Option<String> {
    let name = rule.header_name.as_deref().filter(|n| !n.is_empty())?;
    let wanted = rule.header_value.as_deref().unwrap_or("");
    let regex = regexes.get(&rule.id);

    let values = request
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_slice())?;

    for value in values {
        if string_matches(rule.operator, wanted, value, regex) {
            return Some(format!(
                "header {name} value '{value}' matches '{wanted}' with operator {}",
                rule.operator
            ));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

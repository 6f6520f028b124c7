//! Operator primitives shared by the typed rule matchers.

use std::net::IpAddr;

use globset::GlobBuilder;
use ipnet::IpNet;
use regex::Regex;

use crate::schema::MatchOperator;

/// Check whether `input` matches a single-level glob pattern.
///
/// `*` matches any run of characters except `/`, `?` matches a single
/// non-`/` character.  An invalid pattern is treated as a non-match.
pub fn wildcard_matches(pattern: &str, input: &str) -> bool {
    let glob = GlobBuilder::new(pattern).literal_separator(true).build();
    match glob {
        Ok(glob) => glob.compile_matcher().is_match(input),
        Err(e) => {
            tracing::warn!(
                pattern,
                error = %e,
                "failed to compile wildcard pattern; treating as non-match"
            );
            false
        }
    }
}

/// Check whether `ip` falls inside the CIDR block `cidr`.
///
/// A malformed CIDR value never matches, for any address.
pub fn cidr_contains(cidr: &str, ip: IpAddr) -> bool {
    match cidr.parse::<IpNet>() {
        Ok(net) => net.contains(&ip),
        Err(_) => false,
    }
}

/// Apply a string operator to `actual`.
///
/// `equals` is a case-sensitive exact comparison; `contains`,
/// `starts_with`, and `ends_with` are case-insensitive; `wildcard` is a
/// case-sensitive single-level glob; `regex` uses the rule's pre-compiled
/// pattern (`None` when the pattern failed to compile, which never
/// matches).  Size and range operators are meaningless on strings and
/// never match.
pub fn string_matches(
    operator: MatchOperator,
    rule_value: &str,
    actual: &str,
    regex: Option<&Regex>,
) -> bool {
    match operator {
        MatchOperator::Equals => actual == rule_value,
        MatchOperator::Contains => actual.to_lowercase().contains(&rule_value.to_lowercase()),
        MatchOperator::StartsWith => {
            actual.to_lowercase().starts_with(&rule_value.to_lowercase())
        }
        MatchOperator::EndsWith => actual.to_lowercase().ends_with(&rule_value.to_lowercase()),
        MatchOperator::Wildcard => wildcard_matches(rule_value, actual),
        MatchOperator::Regex => regex.is_some_and(|re| re.is_match(actual)),
        MatchOperator::Gte | MatchOperator::Lte | MatchOperator::InRange => false,
    }
}

//! # rule-engine
//!
//! Decision core of the rule-gate proxy: a priority-ordered rule set that
//! classifies each inbound request as allow or block.  Rules are matched by
//! type (client IP, URL, domain, user agent, URI suffix, request size, HTTP
//! method, headers) with a small operator vocabulary (equality, substring,
//! wildcard, regex, CIDR and size ranges).
//!
//! The engine is safe to share across request handlers: evaluation takes a
//! read lock, administrative updates take a write lock and rebuild the
//! sorted order and regex cache atomically.
//!
//! ## Quick start
//!
//! ```rust
//! use rule_engine::{Action, RequestInfo, Rule, RuleEngine};
//!
//! let rules: Vec<Rule> = serde_yml::from_str(
//!     r#"
//! - id: block-admin
//!   type: url
//!   operator: starts_with
//!   value: "/admin"
//!   action: block
//!   priority: 100
//! "#,
//! ).unwrap();
//!
//! let engine = RuleEngine::new(rules, Action::Allow);
//! let request = RequestInfo {
//!     url: "/admin/panel".to_string(),
//!     ..RequestInfo::default()
//! };
//! assert_eq!(engine.evaluate(&request).action, Action::Block);
//! ```

mod engine;
pub mod matcher;
mod request;
mod schema;

// Re-export primary public API at crate root.
pub use engine::RuleEngine;
pub use request::{Evaluation, RequestInfo};
pub use schema::{validate_rules, Action, MatchOperator, Rule, RuleType};

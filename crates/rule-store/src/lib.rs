//! # rule-store
//!
//! Management layer around [`rule_engine::RuleEngine`]: loads the rule set
//! from a YAML, JSON, or TOML document, keeps it synchronized with that
//! document through a polling hot-reload task, and exposes the engine's
//! evaluate/mutate surface with persistence and logging side effects.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rule_store::{RuleStore, StoreConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = StoreConfig {
//!     rules_file: Some("rules.yaml".into()),
//!     watch_rules_file: true,
//!     ..StoreConfig::default()
//! };
//! let store = RuleStore::new(config).await?;
//! let request = rule_engine::RequestInfo::default();
//! println!("{:?}", store.evaluate(&request).action);
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod store;

// Re-export primary public API at crate root.
pub use codec::DocumentFormat;
pub use store::{RuleStore, StoreConfig};

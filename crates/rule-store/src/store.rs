use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rule_engine::{validate_rules, Action, Evaluation, RequestInfo, Rule, RuleEngine};

use crate::codec::{self, DocumentFormat};

/// Configuration for a [`RuleStore`].
///
/// Deserializable as the `rules` section of the gateway configuration;
/// every field has a sensible default so a bare `{}` section works.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Initial rule list.  Replaced entirely by the document contents when
    /// `rules_file` is set and the file exists.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Action returned when no enabled rule matches.
    #[serde(default = "default_action")]
    pub default_action: Action,
    /// Optional backing rule document (.yaml/.yml, .json, or .toml).
    #[serde(default)]
    pub rules_file: Option<PathBuf>,
    /// Whether to poll the document for changes.
    #[serde(default)]
    pub watch_rules_file: bool,
    /// Poll interval in seconds; values below 1 are clamped to 1.
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_action: default_action(),
            rules_file: None,
            watch_rules_file: false,
            reload_interval_secs: default_reload_interval(),
        }
    }
}

fn default_action() -> Action {
    Action::Allow
}

fn default_reload_interval() -> u64 {
    5
}

/// The backing rule document plus the reload bookkeeping.
///
/// `last_loaded` holds the modification time of the last successfully
/// loaded document version.  The mutex is held for the whole of a reload,
/// which serializes poller ticks against manual [`RuleStore::reload`]
/// calls: at most one reload is ever in flight.
#[derive(Debug)]
struct DocumentSource {
    path: PathBuf,
    format: DocumentFormat,
    last_loaded: Mutex<Option<SystemTime>>,
}

impl DocumentSource {
    /// Reload the document into `engine` if its mtime advanced.
    ///
    /// Returns whether the rule set was replaced.  A missing file keeps the
    /// current rules (not an error); an unchanged mtime is a no-op; a parse
    /// or validation failure leaves the live set fully intact.
    async fn reload(&self, engine: &RuleEngine) -> Result<bool> {
        let mut last_loaded = self.last_loaded.lock().await;

        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(
                    path = %self.path.display(),
                    "rules file does not exist, keeping current rules"
                );
                return Ok(false);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to stat rules file: {}", self.path.display())
                })
            }
        };
        let modified = metadata.modified().with_context(|| {
            format!(
                "failed to read modification time of rules file: {}",
                self.path.display()
            )
        })?;

        if let Some(previous) = *last_loaded {
            if modified <= previous {
                return Ok(false);
            }
        }

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read rules file: {}", self.path.display()))?;
        let rules = codec::decode_rules(&text, self.format)
            .with_context(|| format!("failed to parse rules file: {}", self.path.display()))?;
        validate_rules(&rules)
            .with_context(|| format!("invalid rules file: {}", self.path.display()))?;

        let count = rules.len();
        engine.replace_all(rules);
        *last_loaded = Some(modified);

        info!(count, path = %self.path.display(), "loaded rules from file");
        Ok(true)
    }
}

/// Owns a [`RuleEngine`] and keeps it synchronized with an optional backing
/// rule document, both at construction and periodically thereafter.
#[derive(Debug)]
pub struct RuleStore {
    engine: Arc<RuleEngine>,
    source: Option<Arc<DocumentSource>>,
    shutdown: broadcast::Sender<()>,
    poller: Option<JoinHandle<()>>,
}

impl RuleStore {
    /// Build a store from configuration.
    ///
    /// Validates the configured rules, constructs the engine, performs the
    /// initial document load when a rules file is configured (the document
    /// contents replace the configured rules; a missing file is tolerated,
    /// a malformed one fails construction), and starts the background
    /// poller when watching is enabled.
    pub async fn new(config: StoreConfig) -> Result<Self> {
        validate_rules(&config.rules).context("invalid rules in configuration")?;
        let engine = Arc::new(RuleEngine::new(config.rules, config.default_action));

        let source = match &config.rules_file {
            Some(path) => Some(Arc::new(DocumentSource {
                path: path.clone(),
                format: DocumentFormat::from_path(path)?,
                last_loaded: Mutex::new(None),
            })),
            None => None,
        };

        if let Some(source) = &source {
            source
                .reload(&engine)
                .await
                .context("failed to load rules from file")?;
        }

        let (shutdown, _) = broadcast::channel(1);
        let poller = match (&source, config.watch_rules_file) {
            (Some(source), true) => Some(Self::spawn_poller(
                Arc::clone(source),
                Arc::clone(&engine),
                Duration::from_secs(config.reload_interval_secs.max(1)),
                shutdown.subscribe(),
            )),
            _ => None,
        };

        Ok(Self {
            engine,
            source,
            shutdown,
            poller,
        })
    }

    fn spawn_poller(
        source: Arc<DocumentSource>,
        engine: Arc<RuleEngine>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        info!(
            path = %source.path.display(),
            interval_secs = interval.as_secs(),
            "watching rules file for changes"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial load already
            // happened during construction.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = source.reload(&engine).await {
                            warn!(error = %e, "failed to reload rules file");
                        }
                    }
                    _ = shutdown.recv() => {
                        debug!(path = %source.path.display(), "stopping rules file watcher");
                        return;
                    }
                }
            }
        })
    }

    /// Shared handle to the underlying engine, for callers that evaluate on
    /// a hot path and do not need the store's management surface.
    pub fn engine(&self) -> Arc<RuleEngine> {
        Arc::clone(&self.engine)
    }

    /// Evaluate one request against the current rule set.
    pub fn evaluate(&self, request: &RequestInfo) -> Evaluation {
        self.engine.evaluate(request)
    }

    /// Manually trigger a reload from the backing document.
    ///
    /// Returns whether the rule set was replaced.  Errors when no rules
    /// file is configured.
    pub async fn reload(&self) -> Result<bool> {
        let source = self
            .source
            .as_ref()
            .context("no rules file configured")?;
        source.reload(&self.engine).await
    }

    /// Serialize the current rule list back to the backing document,
    /// overwriting it.
    ///
    /// The written file's modification time is recorded as loaded so the
    /// store's own save does not re-trigger a reload on the next tick.
    pub async fn save_to_file(&self) -> Result<()> {
        let source = self
            .source
            .as_ref()
            .context("no rules file configured")?;

        let rules = self.engine.rules();
        let text = codec::encode_rules(&rules, source.format)?;

        let mut last_loaded = source.last_loaded.lock().await;
        tokio::fs::write(&source.path, text)
            .await
            .with_context(|| format!("failed to write rules file: {}", source.path.display()))?;
        if let Ok(metadata) = tokio::fs::metadata(&source.path).await {
            if let Ok(modified) = metadata.modified() {
                *last_loaded = Some(modified);
            }
        }

        info!(count = rules.len(), path = %source.path.display(), "saved rules to file");
        Ok(())
    }

    /// Add a rule.  Fails on an empty or duplicate id; the engine itself
    /// trusts its caller, so the check lives here.
    pub fn add_rule(&self, rule: Rule) -> Result<()> {
        if rule.id.is_empty() {
            bail!("rule has no id");
        }
        if self.engine.rule(&rule.id).is_some() {
            bail!("duplicate rule id: '{}'", rule.id);
        }
        let id = rule.id.clone();
        self.engine.add_rule(rule);
        info!(rule_id = %id, "added rule");
        Ok(())
    }

    /// Remove a rule by id.  Returns whether it existed.
    pub fn remove_rule(&self, id: &str) -> bool {
        let removed = self.engine.remove_rule(id);
        if removed {
            info!(rule_id = %id, "removed rule");
        }
        removed
    }

    /// Enable a rule by id.  Returns whether it exists.
    pub fn enable_rule(&self, id: &str) -> bool {
        let enabled = self.engine.enable_rule(id);
        if enabled {
            info!(rule_id = %id, "enabled rule");
        }
        enabled
    }

    /// Disable a rule by id, keeping it in the set.  Returns whether it
    /// exists.
    pub fn disable_rule(&self, id: &str) -> bool {
        let disabled = self.engine.disable_rule(id);
        if disabled {
            info!(rule_id = %id, "disabled rule");
        }
        disabled
    }

    /// Copy of all rules in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        self.engine.rules()
    }

    /// Copy of the rule with the given id, if present.
    pub fn rule(&self, id: &str) -> Option<Rule> {
        self.engine.rule(id)
    }

    /// Stop the background poller and wait for it to exit.  An in-flight
    /// reload is allowed to finish; evaluations already begun complete
    /// normally.
    pub async fn close(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(poller) = self.poller.take() {
            let _ = poller.await;
        }
    }
}

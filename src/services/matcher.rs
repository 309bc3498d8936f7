//! Hybrid semantic + keyword rule matching.

use super::KeywordMatcher;
use crate::config::{Capabilities, MatcherConfig};
use crate::embedding::{SemanticEmbedder, compose_query_text, compose_rule_text};
use crate::models::{ActionParams, MatchResult, Rule, rule_ids, sort_by_score};
use crate::storage::{CacheManifest, VectorCache, VectorIndex};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::instrument;

/// Lifecycle state of a [`SemanticRuleMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherState {
    /// `initialize` has not been called.
    Uninitialized,
    /// Rule vectors are indexed; queries use the hybrid policy.
    Semantic,
    /// Queries use keyword scoring only.
    KeywordOnly,
}

impl MatcherState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Semantic => "semantic",
            Self::KeywordOnly => "keyword_only",
        }
    }
}

impl fmt::Display for MatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Components that only exist when semantic matching is wired.
#[derive(Debug)]
struct SemanticBackend {
    embedder: SemanticEmbedder,
    index: VectorIndex,
    cache: VectorCache,
}

/// Finds the rules most relevant to an upcoming action.
///
/// Combines vector search over rule embeddings with [`KeywordMatcher`]
/// scoring. Semantic results are trusted alone only when the best score
/// reaches `similarity_threshold` and at least `min_results` came back;
/// otherwise keyword results are mixed in.
///
/// Semantic matching is wired once at construction. If the embedding model,
/// or the vector cache, is unavailable, the matcher is keyword-only for its
/// whole lifetime. A missing native index only downgrades to the flat index.
///
/// # Example
///
/// ```rust
/// use ruleguard::{Capabilities, MatcherConfig, Rule, SemanticRuleMatcher};
///
/// let rules = vec![
///     Rule::new("ERR-004", "File Path Not Found").with_solution("Use Glob to verify paths"),
/// ];
/// let mut matcher = SemanticRuleMatcher::new(MatcherConfig::default(), Capabilities::none());
/// assert!(matcher.initialize(&rules));
///
/// let params = serde_json::json!({ "file_path": "/tmp/missing.txt" });
/// let results = matcher.match_action("Read", params.as_object().expect("object"));
/// assert_eq!(results[0].rule.id, "ERR-004");
/// ```
#[derive(Debug)]
pub struct SemanticRuleMatcher {
    config: MatcherConfig,
    capabilities: Capabilities,
    semantic: Option<SemanticBackend>,
    keyword: KeywordMatcher,
    rules: Vec<Rule>,
    rules_hash: Option<String>,
    state: MatcherState,
}

impl SemanticRuleMatcher {
    /// Creates a matcher, loading the configured embedding model if the
    /// capabilities allow it.
    #[must_use]
    pub fn new(config: MatcherConfig, capabilities: Capabilities) -> Self {
        if !capabilities.supports_semantic() {
            tracing::warn!(
                embedding = capabilities.embedding,
                vector_cache = capabilities.vector_cache,
                "Semantic matching unavailable, using keyword-only matching"
            );
            return Self::build(config, capabilities, None);
        }
        let embedder = SemanticEmbedder::new(&config);
        Self::with_embedder(config, capabilities, embedder)
    }

    /// Creates a matcher around an already constructed embedder.
    #[must_use]
    pub fn with_embedder(
        config: MatcherConfig,
        capabilities: Capabilities,
        embedder: SemanticEmbedder,
    ) -> Self {
        if !capabilities.supports_semantic() || !embedder.is_available() {
            tracing::warn!(
                model = embedder.model_name(),
                "Embedder not available, using keyword-only matching"
            );
            return Self::build(config, capabilities, None);
        }

        let index = VectorIndex::new(embedder.embedding_dim(), &capabilities);
        let cache = VectorCache::from_config(&config);
        tracing::info!(
            model = embedder.model_name(),
            dimensions = embedder.embedding_dim(),
            device_hint = %embedder.device_hint(),
            accelerated = index.is_accelerated(),
            cache_dir = %cache.dir().display(),
            "Semantic matching enabled"
        );
        let backend = SemanticBackend {
            embedder,
            index,
            cache,
        };
        Self::build(config, capabilities, Some(backend))
    }

    /// Creates a matcher that never uses embeddings.
    #[must_use]
    pub fn keyword_only(config: MatcherConfig) -> Self {
        Self::build(config, Capabilities::none(), None)
    }

    fn build(
        config: MatcherConfig,
        capabilities: Capabilities,
        semantic: Option<SemanticBackend>,
    ) -> Self {
        Self {
            config,
            capabilities,
            semantic,
            keyword: KeywordMatcher::new(),
            rules: Vec::new(),
            rules_hash: None,
            state: MatcherState::Uninitialized,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> MatcherState {
        self.state
    }

    /// Returns true if semantic matching was wired at construction.
    ///
    /// A wired matcher can still be keyword-only for one rule-set generation
    /// when embedding that generation failed; see [`state`](Self::state).
    #[must_use]
    pub const fn is_semantic_available(&self) -> bool {
        self.semantic.is_some()
    }

    /// Returns the hash of the current rule-id set, once initialized.
    #[must_use]
    pub fn rules_hash(&self) -> Option<&str> {
        self.rules_hash.as_deref()
    }

    /// Returns the rules passed to the last `initialize`.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Returns the capabilities the matcher was built with.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Returns the number of indexed rule vectors.
    #[must_use]
    pub fn indexed_count(&self) -> usize {
        self.semantic.as_ref().map_or(0, |s| s.index.size())
    }

    /// Deletes the on-disk vector cache.
    ///
    /// Returns false if artifacts could not be removed; true when there is
    /// no cache to remove.
    #[must_use]
    pub fn invalidate_cache(&self) -> bool {
        self.semantic.as_ref().is_none_or(|s| s.cache.invalidate())
    }

    /// Loads a rule set.
    ///
    /// Reuses cached vectors when the cache holds exactly these rule ids,
    /// otherwise embeds every rule and rewrites the cache. Calling it again
    /// with identical rules does not touch the index; edited rule text under
    /// the same ids refreshes the indexed rules from the cached vectors.
    ///
    /// Returns false only when the vector index cannot be rebuilt; the matcher
    /// is then keyword-only for this rule set. An embedding failure also
    /// leaves it keyword-only but still counts as success.
    #[instrument(skip(self, rules), fields(rule_count = rules.len()))]
    pub fn initialize(&mut self, rules: &[Rule]) -> bool {
        let hash = compute_rules_hash(rules);
        self.rules = rules.to_vec();

        let Some(backend) = self.semantic.as_mut() else {
            self.rules_hash = Some(hash);
            self.state = MatcherState::KeywordOnly;
            tracing::debug!("Initialized in keyword-only mode");
            return true;
        };

        if self.state == MatcherState::Semantic
            && self.rules_hash.as_deref() == Some(hash.as_str())
            && backend.index.rules().into_iter().eq(rules.iter())
        {
            tracing::debug!(rules_hash = %hash, "Rule set unchanged, keeping index");
            return true;
        }
        self.rules_hash = Some(hash);

        let (state, ok) = backend.populate(rules, &self.config);
        self.state = state;
        ok
    }

    /// Returns the rules relevant to an action, best first.
    ///
    /// Never fails: without semantic matching, or when embedding the query
    /// fails, keyword results are returned.
    #[instrument(skip(self, params), fields(state = %self.state))]
    pub fn match_action(&self, action_kind: &str, params: &ActionParams) -> Vec<MatchResult> {
        let max_results = self.config.max_results;

        match self.state {
            MatcherState::Uninitialized => {
                tracing::warn!("Matcher not initialized, using keyword fallback");
                self.keyword.match_rules(&self.rules, action_kind, params)
            },
            MatcherState::KeywordOnly => {
                let mut results = self.keyword.match_rules(&self.rules, action_kind, params);
                results.truncate(max_results);
                results
            },
            MatcherState::Semantic => {
                let mut semantic = self.semantic_match(action_kind, params);
                if self.should_augment(&semantic) {
                    tracing::debug!(
                        top_score = semantic.first().map_or(0.0, |r| r.relevance_score),
                        semantic_count = semantic.len(),
                        "Augmenting with keyword results"
                    );
                    return self.hybrid_match(semantic, action_kind, params);
                }

                semantic.truncate(max_results);
                semantic
            },
        }
    }

    /// Keyword results are needed when the best semantic score is below the
    /// threshold or too few semantic results came back.
    fn should_augment(&self, semantic: &[MatchResult]) -> bool {
        let top = semantic.first().map_or(0.0, |r| r.relevance_score);
        top < self.config.similarity_threshold || semantic.len() < self.config.min_results
    }

    fn semantic_match(&self, action_kind: &str, params: &ActionParams) -> Vec<MatchResult> {
        let Some(backend) = self.semantic.as_ref() else {
            return Vec::new();
        };

        let query = compose_query_text(action_kind, params);
        let Some(vector) = backend.embedder.encode(&query) else {
            return Vec::new();
        };

        match backend
            .index
            .search(&vector, self.config.max_results, f32::NEG_INFINITY)
        {
            Ok(hits) => {
                let mut results: Vec<MatchResult> = hits
                    .into_iter()
                    .map(|(rule, score)| MatchResult::semantic(rule, score))
                    .collect();
                sort_by_score(&mut results);
                results
            },
            Err(e) => {
                tracing::warn!(error = %e, "Semantic search failed");
                Vec::new()
            },
        }
    }

    fn hybrid_match(
        &self,
        semantic: Vec<MatchResult>,
        action_kind: &str,
        params: &ActionParams,
    ) -> Vec<MatchResult> {
        let keyword = self.keyword.match_rules(&self.rules, action_kind, params);

        let mut seen: HashSet<String> = semantic.iter().map(|r| r.rule.id.clone()).collect();
        let mut merged = semantic;
        for result in keyword {
            if seen.insert(result.rule.id.clone()) {
                merged.push(result);
            }
        }

        sort_by_score(&mut merged);
        merged.truncate(self.config.max_results);
        merged
    }
}

impl SemanticBackend {
    /// Fills the index for `rules`; returns the resulting state and whether
    /// the index could be rebuilt.
    fn populate(&mut self, rules: &[Rule], config: &MatcherConfig) -> (MatcherState, bool) {
        if let Err(e) = self.index.clear() {
            tracing::warn!(error = %e, "Failed to reset vector index");
            return (MatcherState::KeywordOnly, false);
        }
        if rules.is_empty() {
            return (MatcherState::Semantic, true);
        }

        let ids = rule_ids(rules);
        if self.cache.needs_update(&ids) {
            tracing::info!("Cache invalid or outdated, generating new embeddings");
        } else if let Some(vectors) = self.cached_vectors(rules) {
            return match self.index.add_rules(rules, &vectors) {
                Ok(_) => {
                    tracing::info!(rule_count = rules.len(), "Loaded rule vectors from cache");
                    (MatcherState::Semantic, true)
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Cached vectors rejected by index");
                    self.regenerate(rules, ids, config)
                },
            };
        }

        self.regenerate(rules, ids, config)
    }

    /// Returns cached vectors in `rules` order, or `None` if the cache does
    /// not cover them with the current model.
    fn cached_vectors(&self, rules: &[Rule]) -> Option<Vec<Vec<f32>>> {
        let (vectors, manifest) = self.cache.load()?;
        if manifest.model != self.embedder.model_name() {
            tracing::info!(
                cached = %manifest.model,
                current = self.embedder.model_name(),
                "Cached vectors come from another model"
            );
            return None;
        }

        let by_id: HashMap<&str, &Vec<f32>> = manifest
            .rule_ids
            .iter()
            .map(String::as_str)
            .zip(vectors.iter())
            .collect();
        rules
            .iter()
            .map(|rule| by_id.get(rule.id.as_str()).map(|v| (*v).clone()))
            .collect()
    }

    fn regenerate(
        &mut self,
        rules: &[Rule],
        ids: Vec<String>,
        config: &MatcherConfig,
    ) -> (MatcherState, bool) {
        let start = Instant::now();
        let texts: Vec<String> = rules.iter().map(compose_rule_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let Some(vectors) = self.embedder.encode_batch(&refs) else {
            tracing::warn!("Failed to generate embeddings, using keyword-only matching");
            return (MatcherState::KeywordOnly, true);
        };

        if let Err(e) = self.index.add_rules(rules, &vectors) {
            tracing::warn!(error = %e, "Failed to index rule vectors");
            if let Err(e) = self.index.clear() {
                tracing::warn!(error = %e, "Failed to reset vector index");
            }
            return (MatcherState::KeywordOnly, false);
        }

        let manifest = CacheManifest::new(ids, self.embedder.model_name());
        if !self.cache.save(&vectors, &manifest) {
            tracing::warn!("Continuing without a persisted vector cache");
        }

        if let Some(dir) = &config.index_dir {
            match self.index.save(dir) {
                Ok(true) => {},
                Ok(false) => {
                    tracing::debug!(path = %dir.display(), "Index type has no on-disk form");
                },
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Failed to persist index");
                },
            }
        }

        tracing::info!(
            rule_count = rules.len(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Generated rule embeddings"
        );
        (MatcherState::Semantic, true)
    }
}

/// Hex SHA-256 of the sorted rule ids joined by `|`.
#[must_use]
pub fn compute_rules_hash(rules: &[Rule]) -> String {
    let mut ids = rule_ids(rules);
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(ids.join("|").as_bytes());
    hex::encode(hasher.finalize())
}

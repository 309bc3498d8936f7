//! Integration tests for ruleguard.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]

use ruleguard::embedding::HashEmbedder;
use ruleguard::models::rule_ids;
use ruleguard::storage::FlatIndex;
use ruleguard::{
    ActionParams, Capabilities, Error, MatchType, MatcherConfig, MatcherState, Rule,
    SemanticEmbedder, SemanticRuleMatcher, VectorCache, VectorIndex,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const RULES_JSON: &str = r#"[
    {
        "id": "ERR-004",
        "title": "File Path Not Found",
        "solution": "Use Glob to verify paths"
    },
    {
        "id": "ERR-013",
        "title": "Edit Operation Failed",
        "solution": "Read file first"
    },
    {
        "id": "ERR-022",
        "title": "Instruction Not Followed",
        "problem": "Command ignored the user's explicit instruction",
        "prevention": "Re-read the request before running commands"
    },
    {
        "id": "ERR-023",
        "title": "RC File Encoding",
        "problem": "Resource files saved as UTF-8 fail to compile",
        "solution": "Save .rc files as UTF-16 LE"
    },
    {
        "id": "ERR-601",
        "title": "DLL Architecture Mismatch",
        "problem": "x86 DLL loaded into x64 process"
    }
]"#;

fn rules() -> Vec<Rule> {
    serde_json::from_str(RULES_JSON).expect("rule fixture")
}

fn params(value: &Value) -> ActionParams {
    value.as_object().cloned().unwrap_or_default()
}

fn hash_embedder() -> SemanticEmbedder {
    SemanticEmbedder::with_backend("hash", Arc::new(HashEmbedder::new()))
}

fn semantic_matcher(dir: &TempDir) -> SemanticRuleMatcher {
    let config = MatcherConfig::default().with_cache_dir(dir.path().join("vectors"));
    SemanticRuleMatcher::with_embedder(config, Capabilities::semantic(), hash_embedder())
}

#[test]
fn test_error_types() {
    let err = Error::InvalidInput("empty text".to_string());
    assert!(err.to_string().contains("invalid input"));

    let err = Error::OperationFailed {
        operation: "save_cache".to_string(),
        cause: "disk full".to_string(),
    };
    let display = err.to_string();
    assert!(display.contains("save_cache"));
    assert!(display.contains("disk full"));

    let err = Error::CacheCorrupt("bad magic".to_string());
    assert!(err.to_string().contains("bad magic"));
}

#[test]
fn test_rules_deserialize_with_missing_fields() {
    let rules = rules();
    assert_eq!(rules.len(), 5);
    assert!(rules[0].problem.is_empty());
    assert!(rules[0].prevention.is_empty());
    assert_eq!(rules[2].prevention, "Re-read the request before running commands");
}

#[test]
fn test_keyword_only_read_missing_file() {
    let mut matcher = SemanticRuleMatcher::new(MatcherConfig::default(), Capabilities::none());
    assert!(matcher.initialize(&rules()));
    assert_eq!(matcher.state(), MatcherState::KeywordOnly);

    let results =
        matcher.match_action("Read", &params(&json!({"file_path": "/tmp/missing.txt"})));
    let ids: Vec<&str> = results.iter().map(|r| r.id()).collect();
    let pos = |id: &str| ids.iter().position(|x| *x == id).expect(id);
    assert!(pos("ERR-004") < pos("ERR-013"));
    assert!(results.iter().all(|r| r.match_type == MatchType::Keyword));
    assert!(results.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
}

#[test]
fn test_hash_embedder_needs_semantic_capabilities() {
    let dir = TempDir::new().expect("tempdir");
    let config = MatcherConfig::default().with_cache_dir(dir.path());
    let matcher = SemanticRuleMatcher::with_embedder(config, Capabilities::none(), hash_embedder());
    assert!(!matcher.is_semantic_available());
}

#[test]
fn test_semantic_flow_writes_cache() {
    let dir = TempDir::new().expect("tempdir");
    let mut matcher = semantic_matcher(&dir);
    assert!(matcher.is_semantic_available());
    assert!(matcher.initialize(&rules()));
    assert_eq!(matcher.state(), MatcherState::Semantic);
    assert_eq!(matcher.indexed_count(), 5);

    let cache_dir = dir.path().join("vectors");
    for name in ["embeddings.bin", "metadata.json", "timestamp.txt", "version.txt"] {
        assert!(cache_dir.join(name).is_file(), "missing {name}");
    }
    let version = std::fs::read_to_string(cache_dir.join("version.txt")).expect("version");
    assert_eq!(version.trim(), "1.0.0");

    let results = matcher.match_action(
        "Write",
        &params(&json!({"file_path": "C:/app/resource.rc", "content": "IDD_MAIN"})),
    );
    assert!(!results.is_empty());
    assert!(results.len() <= matcher.config().max_results);
    let unique: HashSet<&str> = results.iter().map(|r| r.id()).collect();
    assert_eq!(unique.len(), results.len());
}

#[test]
fn test_second_process_reuses_cache() {
    let dir = TempDir::new().expect("tempdir");
    let mut first = semantic_matcher(&dir);
    assert!(first.initialize(&rules()));

    let timestamp = dir.path().join("vectors").join("timestamp.txt");
    let written = std::fs::read_to_string(&timestamp).expect("timestamp");

    let mut second = semantic_matcher(&dir);
    assert!(second.initialize(&rules()));
    assert_eq!(second.state(), MatcherState::Semantic);
    assert_eq!(second.rules_hash(), first.rules_hash());
    assert_eq!(
        std::fs::read_to_string(&timestamp).expect("timestamp"),
        written
    );
}

#[test]
fn test_changed_rule_set_rewrites_cache() {
    let dir = TempDir::new().expect("tempdir");
    let mut matcher = semantic_matcher(&dir);
    let mut rules = rules();
    assert!(matcher.initialize(&rules));

    rules.pop();
    assert!(matcher.initialize(&rules));
    assert_eq!(matcher.indexed_count(), 4);

    let cache = VectorCache::new(dir.path().join("vectors"), Duration::from_secs(3600));
    assert!(!cache.needs_update(&rule_ids(&rules)));
    let manifest = cache.manifest().expect("manifest");
    assert_eq!(manifest.count, 4);
    assert_eq!(manifest.model, "hash");
}

#[test]
fn test_invalidate_cache_forces_update() {
    let dir = TempDir::new().expect("tempdir");
    let mut matcher = semantic_matcher(&dir);
    assert!(matcher.initialize(&rules()));
    assert!(matcher.invalidate_cache());

    let cache = VectorCache::from_config(matcher.config());
    assert!(cache.needs_update(&rule_ids(&rules())));
    assert!(cache.load().is_none());
}

#[test]
fn test_rule_is_its_own_nearest_neighbour() {
    let embedder = hash_embedder();
    let rules = rules();
    let texts: Vec<String> = rules.iter().map(ruleguard::compose_rule_text).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vectors = embedder.encode_batch(&refs).expect("vectors");

    let mut index = VectorIndex::Flat(FlatIndex::new(embedder.embedding_dim()));
    assert!(index.add_rules(&rules, &vectors).expect("add"));

    for (rule, vector) in rules.iter().zip(&vectors) {
        let hits = index.search(vector, 1, -1.0).expect("search");
        assert_eq!(hits[0].0.id, rule.id);
        assert!((hits[0].1 - 1.0).abs() < 1e-4);
    }
}

#[test]
fn test_mixed_dimensions_are_rejected() {
    let mut index = VectorIndex::flat(4);
    let err = index
        .add_rules(&rules()[..1], &[vec![1.0, 0.0, 0.0]])
        .expect_err("dimension mismatch");
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 4,
            actual: 3
        }
    ));
    assert!(index.is_empty());
}

#[test]
fn test_empty_rule_set() {
    let dir = TempDir::new().expect("tempdir");
    let mut matcher = semantic_matcher(&dir);
    assert!(matcher.initialize(&[]));
    assert!(matcher.match_action("Read", &params(&json!({"file_path": "/a"}))).is_empty());
}

//! Merge Engine.
//!
//! Collect → detect → resolve → record. Inputs are per-path file variants
//! gathered from every provider that answered a task; outputs are a
//! `path → merged_content` map plus a list of conflicts that strategies
//! could not resolve automatically.
//!
//! Follows a "collect, classify, resolve" shape, split the way the rest
//! of this crate splits a component: detection ([`conflict`]), structural
//! analysis ([`semantic`]), and the strategy table ([`strategies`]) each
//! get their own module.

pub mod conflict;
pub mod semantic;
pub mod strategies;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::AnalysisCache;
use crate::learner::PatternLearner;
use crate::provider::ProviderId;

pub use conflict::detect_conflicts;
pub use semantic::{cyclomatic_complexity, LanguageParser, SemanticModule};
pub use strategies::ResolutionStrategy;

/// One provider's version of a file. `content: None` means the provider's
/// output didn't touch this path at all (used to detect `addition`
/// conflicts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileVariant {
    pub provider: ProviderId,
    pub path: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    FileLevel,
    LineLevel,
    Addition,
}

/// A path whose provider variants disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    pub conflict_type: ConflictType,
    pub variants: Vec<FileVariant>,
}

/// Outcome of resolving one conflict.
#[derive(Debug, Clone)]
pub enum Resolution {
    Merged { content: String },
    Deferred { reason: String },
    AwaitingManualInput,
}

/// Full merge run result: resolved paths plus anything left unresolved.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub merged: HashMap<String, String>,
    pub unresolved: Vec<Conflict>,
}

/// Ties conflict detection, the strategy table, the Analysis Cache, and
/// the Pattern Learner together into the collect→detect→resolve→record
/// pipeline.
#[derive(Clone)]
pub struct MergeEngine {
    cache: AnalysisCache<SemanticModule>,
    learner: PatternLearner,
}

impl MergeEngine {
    pub fn new(cache: AnalysisCache<SemanticModule>, learner: PatternLearner) -> Self {
        Self { cache, learner }
    }

    /// Run the full pipeline over every path's variants.
    pub async fn merge(
        &self,
        variants_by_path: HashMap<String, Vec<FileVariant>>,
        strategy: ResolutionStrategy,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for (path, variants) in variants_by_path {
            match detect_conflicts(&path, &variants) {
                None => {
                    // All variants identical (or only one); take the first present content.
                    if let Some(content) = variants.iter().find_map(|v| v.content.clone()) {
                        outcome.merged.insert(path, content);
                    }
                }
                Some(conflict) => {
                    match strategies::resolve(&conflict, strategy, &self.cache, &self.learner).await {
                        Resolution::Merged { content } => {
                            outcome.merged.insert(path.clone(), content);
                        }
                        Resolution::Deferred { .. } | Resolution::AwaitingManualInput => {
                            outcome.unresolved.push(conflict);
                        }
                    }
                }
            }
        }

        outcome
    }

    /// Record a manual resolution into the Pattern Learner — step 4 of
    /// the pipeline: every manual resolution feeds back into the learner.
    pub async fn record_manual_resolution(
        &self,
        conflict: &Conflict,
        resolution_tag: impl Into<String>,
        chosen_provider: Option<ProviderId>,
    ) {
        let record = crate::learner::ResolutionRecord::from_conflict(conflict, resolution_tag, chosen_provider);
        self.learner.record(record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(provider: ProviderId, content: &str) -> FileVariant {
        FileVariant { provider, path: "main.rs".into(), content: Some(content.into()) }
    }

    #[tokio::test]
    async fn test_merge_no_conflict_uses_identical_content() {
        let engine = MergeEngine::new(AnalysisCache::new(), PatternLearner::new());
        let mut variants_by_path = HashMap::new();
        variants_by_path.insert(
            "main.rs".to_string(),
            vec![variant(ProviderId::OpenAi, "same"), variant(ProviderId::Anthropic, "same")],
        );
        let outcome = engine.merge(variants_by_path, ResolutionStrategy::Auto).await;
        assert_eq!(outcome.merged["main.rs"], "same");
        assert!(outcome.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_merge_conflicting_content_resolves_with_union() {
        let engine = MergeEngine::new(AnalysisCache::new(), PatternLearner::new());
        let mut variants_by_path = HashMap::new();
        variants_by_path.insert(
            "notes.txt".to_string(),
            vec![variant(ProviderId::OpenAi, "line a\nline b"), variant(ProviderId::Anthropic, "line b\nline c")],
        );
        let outcome = engine.merge(variants_by_path, ResolutionStrategy::Union).await;
        let merged = &outcome.merged["notes.txt"];
        assert!(merged.contains("line a"));
        assert!(merged.contains("line c"));
    }
}

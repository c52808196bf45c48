//! Resolution strategies — step 3 ("Resolve") of the Merge Engine
//! pipeline. Ten strategies in total; `resolve` dispatches to the
//! matching function.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::semantic::{cyclomatic_complexity, ParserRegistry};
use super::{Conflict, ConflictType, Resolution};
use crate::cache::{AnalysisCache, CacheKey};
use crate::learner::PatternLearner;
use crate::merge::semantic::SemanticModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    Auto,
    Semantic,
    LastWriteWins,
    FirstWriteWins,
    Union,
    Intersection,
    Voting,
    Hybrid,
    MlRecommended,
    Manual,
}

/// Dispatch to the strategy named by `strategy`.
pub async fn resolve(
    conflict: &Conflict,
    strategy: ResolutionStrategy,
    cache: &AnalysisCache<SemanticModule>,
    learner: &PatternLearner,
) -> Resolution {
    match strategy {
        ResolutionStrategy::Auto => resolve_auto(conflict, cache, learner).await,
        ResolutionStrategy::Semantic => resolve_semantic(conflict, cache).await,
        ResolutionStrategy::LastWriteWins => resolve_write_wins(conflict, true),
        ResolutionStrategy::FirstWriteWins => resolve_write_wins(conflict, false),
        ResolutionStrategy::Union => resolve_union(conflict),
        ResolutionStrategy::Intersection => resolve_intersection(conflict),
        ResolutionStrategy::Voting => resolve_voting(conflict),
        ResolutionStrategy::Hybrid => resolve_hybrid(conflict),
        ResolutionStrategy::MlRecommended => resolve_ml_recommended(conflict, cache, learner).await,
        ResolutionStrategy::Manual => Resolution::AwaitingManualInput,
    }
}

fn present_variants(conflict: &Conflict) -> Vec<(&str, &str)> {
    conflict
        .variants
        .iter()
        .filter_map(|v| v.content.as_deref().map(|c| (v.provider.as_str(), c)))
        .collect()
}

async fn resolve_auto(conflict: &Conflict, cache: &AnalysisCache<SemanticModule>, learner: &PatternLearner) -> Resolution {
    match conflict.conflict_type {
        ConflictType::Addition => resolve_union(conflict),
        ConflictType::LineLevel => resolve_union(conflict),
        ConflictType::FileLevel => {
            let ext = conflict.path.rsplit('.').next().unwrap_or("");
            let known_source = matches!(ext, "rs" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "h" | "py");
            if known_source {
                match resolve_semantic(conflict, cache).await {
                    Resolution::Merged { content } => Resolution::Merged { content },
                    _ => resolve_write_wins(conflict, true),
                }
            } else {
                let _ = learner; // auto does not itself consult the learner; ml_recommended does
                resolve_write_wins(conflict, true)
            }
        }
    }
}

fn resolve_write_wins(conflict: &Conflict, last: bool) -> Resolution {
    let mut variants = present_variants(conflict);
    variants.sort_by_key(|(provider, _)| *provider);
    let picked = if last { variants.last() } else { variants.first() };
    match picked {
        // Reuses the LLM-output preprocessing pipeline (think-tag stripping,
        // trimming) as the raw-text fallback for providers whose content
        // isn't run through a language parser.
        Some((_, content)) => Resolution::Merged { content: crate::output_parser::preprocess(content) },
        None => Resolution::Deferred { reason: "no variant has content".into() },
    }
}

fn resolve_union(conflict: &Conflict) -> Resolution {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for (_, content) in present_variants(conflict) {
        for line in content.lines() {
            if seen.insert(line.to_string()) {
                lines.push(line.to_string());
            }
        }
    }
    Resolution::Merged { content: lines.join("\n") }
}

fn resolve_intersection(conflict: &Conflict) -> Resolution {
    let variants = present_variants(conflict);
    let Some((_, first)) = variants.first() else {
        return Resolution::Deferred { reason: "no variant has content".into() };
    };
    let mut common: Vec<&str> = first.lines().collect();
    for (_, content) in &variants[1..] {
        let lines: HashSet<&str> = content.lines().collect();
        common.retain(|line| lines.contains(line));
    }
    Resolution::Merged { content: common.join("\n") }
}

/// Jaccard similarity between two variants' line sets, used as the
/// "textual similarity to peers" voting signal.
fn line_jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.lines().collect();
    let b: HashSet<&str> = b.lines().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn resolve_voting(conflict: &Conflict) -> Resolution {
    let variants = present_variants(conflict);
    if variants.is_empty() {
        return Resolution::Deferred { reason: "no variant has content".into() };
    }

    let mut scores: Vec<(usize, f64)> = Vec::new();
    for (i, (_, content)) in variants.iter().enumerate() {
        let complexity_score = cyclomatic_complexity(content) as f64;
        let structural_markers = content.matches(['{', '}', ';']).count() as f64;
        let avg_similarity: f64 = variants
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, (_, other))| line_jaccard(content, other))
            .sum::<f64>()
            / (variants.len().saturating_sub(1)).max(1) as f64;
        let length_plausibility = 1.0 - ((content.len() as f64 - 500.0).abs() / 2000.0).min(1.0);

        let score = complexity_score * 0.01 + structural_markers * 0.01 + avg_similarity + length_plausibility;
        scores.push((i, score));
    }

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    let winner = scores[0];
    let runner_up = scores.get(1).map(|(_, s)| *s).unwrap_or(0.0);

    if winner.1 - runner_up > 0.2 {
        Resolution::Merged { content: variants[winner.0].1.to_string() }
    } else {
        resolve_hybrid(conflict)
    }
}

struct FeatureProfile {
    functions: HashSet<String>,
    imports: HashSet<String>,
    has_tests: bool,
    has_docs: bool,
    has_error_handling: bool,
}

impl FeatureProfile {
    fn score(&self) -> usize {
        self.functions.len()
            + self.imports.len()
            + self.has_tests as usize
            + self.has_docs as usize
            + self.has_error_handling as usize
    }

    fn extract(content: &str) -> Self {
        let mut functions = HashSet::new();
        let mut imports = HashSet::new();
        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("fn ").or_else(|| trimmed.strip_prefix("function ")) {
                functions.insert(rest.split(['(', ' ']).next().unwrap_or(rest).to_string());
            }
            if trimmed.starts_with("use ") || trimmed.starts_with("import ") {
                imports.insert(trimmed.to_string());
            }
        }
        Self {
            functions,
            imports,
            has_tests: content.contains("#[test]") || content.contains("def test_"),
            has_docs: content.contains("///") || content.contains("\"\"\""),
            has_error_handling: content.contains("Result<") || content.contains("try") || content.contains("catch"),
        }
    }
}

fn resolve_hybrid(conflict: &Conflict) -> Resolution {
    let variants = present_variants(conflict);
    let best = variants
        .iter()
        .map(|(provider, content)| (*provider, *content, FeatureProfile::extract(content).score()))
        .max_by_key(|(_, _, score)| *score);

    match best {
        Some((_, content, _)) => Resolution::Merged { content: content.to_string() },
        None => Resolution::Deferred { reason: "no variant has content".into() },
    }
}

async fn resolve_semantic(conflict: &Conflict, cache: &AnalysisCache<SemanticModule>) -> Resolution {
    let registry = ParserRegistry::with_defaults();
    let mut parsed = Vec::new();

    for (provider, content) in present_variants(conflict) {
        let key = CacheKey::new("semantic", content);
        let module = match cache.get(&key).await {
            Some(cached) => cached,
            None => {
                let module = registry.parse(&conflict.path, content);
                cache.put(key, module.clone()).await;
                module
            }
        };
        if module.is_raw {
            return resolve_union(conflict);
        }
        parsed.push((provider, module));
    }

    if parsed.is_empty() {
        return Resolution::Deferred { reason: "no variant has content".into() };
    }

    let mut by_signature: std::collections::HashMap<String, (&str, super::semantic::Declaration)> = std::collections::HashMap::new();
    for (provider, module) in &parsed {
        for decl in &module.declarations {
            match by_signature.get(&decl.signature) {
                Some((_, existing)) if existing.complexity >= decl.complexity => {}
                _ => {
                    by_signature.insert(decl.signature.clone(), (provider, decl.clone()));
                }
            }
        }
    }

    let mut signatures: Vec<&String> = by_signature.keys().collect();
    signatures.sort();
    let reconstructed = signatures
        .into_iter()
        .map(|sig| by_signature[sig].1.body.clone())
        .collect::<Vec<_>>()
        .join("\n");

    Resolution::Merged { content: reconstructed }
}

async fn resolve_ml_recommended(conflict: &Conflict, cache: &AnalysisCache<SemanticModule>, learner: &PatternLearner) -> Resolution {
    match learner.predict(conflict).await {
        Some(prediction) if prediction.confidence >= 0.7 => apply_predicted_tag(conflict, &prediction.resolution_tag),
        _ => resolve_auto(conflict, cache, learner).await,
    }
}

fn apply_predicted_tag(conflict: &Conflict, tag: &str) -> Resolution {
    if let Some(provider_name) = tag.strip_prefix("accept_") {
        if let Some((_, content)) = present_variants(conflict).into_iter().find(|(p, _)| *p == provider_name) {
            return Resolution::Merged { content: content.to_string() };
        }
    }
    match tag {
        "merge_union" => resolve_union(conflict),
        "merge_intersection" => resolve_intersection(conflict),
        _ => resolve_write_wins(conflict, true),
    }
}

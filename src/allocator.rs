//! Task Allocator.
//!
//! Keyword-driven mapping from a task description to the providers best
//! suited for it, plus a round-robin fallback for bulk distribution.

use crate::provider::ProviderId;

struct Capability {
    tag: &'static str,
    keywords: &'static [&'static str],
    providers: &'static [ProviderId],
}

static CAPABILITIES: &[Capability] = &[
    Capability {
        tag: "algorithms",
        keywords: &["sort", "algorithm", "optimize", "complexity", "performance"],
        providers: &[ProviderId::OpenAi],
    },
    Capability {
        tag: "refactoring",
        keywords: &["refactor", "architecture", "restructure", "design pattern", "clean up"],
        providers: &[ProviderId::Anthropic],
    },
    Capability {
        tag: "quick_fixes",
        keywords: &["quick fix", "typo", "small fix", "completion", "autocomplete"],
        providers: &[ProviderId::DeepSeek],
    },
    Capability {
        tag: "research",
        keywords: &["research", "compare", "investigate", "survey", "up to date"],
        providers: &[ProviderId::Perplexity],
    },
    Capability {
        tag: "privacy",
        keywords: &["privacy", "offline", "local only", "sensitive", "confidential"],
        providers: &[ProviderId::Local],
    },
];

/// Map a task description to the providers best suited for it, per the
/// static capability matrix. Falls back to every configured
/// provider when no keyword matches.
pub fn auto_allocate(description: &str, configured: &[ProviderId]) -> Vec<ProviderId> {
    let lower = description.to_lowercase();

    let mut matched: Vec<ProviderId> = CAPABILITIES
        .iter()
        .filter(|cap| cap.keywords.iter().any(|kw| lower.contains(kw)))
        .flat_map(|cap| cap.providers.iter().copied())
        .filter(|p| configured.contains(p))
        .collect();

    matched.dedup();

    if matched.is_empty() {
        configured.to_vec()
    } else {
        matched
    }
}

/// Distribute a batch of task descriptions across `available` providers:
/// capability match per task, round-robin over `available` for any task
/// whose matched set doesn't narrow things down.
pub fn distribute_load<'a>(
    descriptions: &'a [String],
    available: &[ProviderId],
) -> Vec<(&'a str, Vec<ProviderId>)> {
    let mut next_rr = 0usize;
    descriptions
        .iter()
        .map(|desc| {
            let matched = auto_allocate(desc, available);
            if matched.len() == available.len() && !available.is_empty() {
                // No real narrowing happened — fall back to a single
                // round-robin pick so load spreads across providers.
                let pick = available[next_rr % available.len()];
                next_rr += 1;
                (desc.as_str(), vec![pick])
            } else {
                (desc.as_str(), matched)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_providers() -> Vec<ProviderId> {
        ProviderId::ALL.to_vec()
    }

    #[test]
    fn test_allocate_algorithms_keyword() {
        let result = auto_allocate("please optimize this sort routine", &all_providers());
        assert_eq!(result, vec![ProviderId::OpenAi]);
    }

    #[test]
    fn test_allocate_refactoring_keyword() {
        let result = auto_allocate("refactor the module architecture", &all_providers());
        assert_eq!(result, vec![ProviderId::Anthropic]);
    }

    #[test]
    fn test_allocate_no_match_returns_all_configured() {
        let result = auto_allocate("write a poem about cats", &all_providers());
        assert_eq!(result, all_providers());
    }

    #[test]
    fn test_allocate_only_considers_configured_providers() {
        let configured = vec![ProviderId::Anthropic];
        let result = auto_allocate("optimize this sort", &configured);
        // OpenAI would match but isn't configured, so falls through to all-configured.
        assert_eq!(result, configured);
    }

    #[test]
    fn test_allocate_multiple_keyword_tags_dedup() {
        let result = auto_allocate(
            "refactor and optimize this sorting architecture",
            &all_providers(),
        );
        assert!(result.contains(&ProviderId::OpenAi));
        assert!(result.contains(&ProviderId::Anthropic));
        let unique: std::collections::HashSet<_> = result.iter().collect();
        assert_eq!(unique.len(), result.len());
    }

    #[test]
    fn test_distribute_load_round_robins_unmatched() {
        let descriptions = vec!["write a poem".to_string(), "write a song".to_string()];
        let available = vec![ProviderId::OpenAi, ProviderId::Anthropic];
        let plan = distribute_load(&descriptions, &available);
        assert_eq!(plan[0].1, vec![ProviderId::OpenAi]);
        assert_eq!(plan[1].1, vec![ProviderId::Anthropic]);
    }
}

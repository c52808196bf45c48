//! Token Counter & Pricing.
//!
//! Heuristic token estimation and a per-model cost table. Kept a plain
//! linear-scan slice rather than pulling in a perfect-hash crate: a few
//! dozen rows scanned per call is not worth the extra dependency, in
//! keeping with the rest of the crate's preference for a small, purposeful
//! dependency set.

use crate::provider::ProviderId;

/// Per-million-token price, in USD, for a model's input and output tokens.
#[derive(Debug, Clone, Copy)]
pub struct PriceRow {
    pub model_prefix: &'static str,
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Prefix-matched pricing table. Longer, more specific prefixes are listed
/// before their shorter fallbacks so prefix matching picks the best match.
static PRICING: &[PriceRow] = &[
    PriceRow { model_prefix: "gpt-4o-mini", input_per_million: 0.15, output_per_million: 0.60 },
    PriceRow { model_prefix: "gpt-4o", input_per_million: 2.50, output_per_million: 10.00 },
    PriceRow { model_prefix: "gpt-4-turbo", input_per_million: 10.00, output_per_million: 30.00 },
    PriceRow { model_prefix: "gpt-4", input_per_million: 30.00, output_per_million: 60.00 },
    PriceRow { model_prefix: "gpt-3.5", input_per_million: 0.50, output_per_million: 1.50 },
    PriceRow { model_prefix: "claude-3-5-sonnet", input_per_million: 3.00, output_per_million: 15.00 },
    PriceRow { model_prefix: "claude-3-5-haiku", input_per_million: 0.80, output_per_million: 4.00 },
    PriceRow { model_prefix: "claude-3-opus", input_per_million: 15.00, output_per_million: 75.00 },
    PriceRow { model_prefix: "claude-3-haiku", input_per_million: 0.25, output_per_million: 1.25 },
    PriceRow { model_prefix: "claude", input_per_million: 3.00, output_per_million: 15.00 },
    PriceRow { model_prefix: "deepseek-reasoner", input_per_million: 0.55, output_per_million: 2.19 },
    PriceRow { model_prefix: "deepseek-chat", input_per_million: 0.14, output_per_million: 0.28 },
    PriceRow { model_prefix: "deepseek", input_per_million: 0.14, output_per_million: 0.28 },
    PriceRow { model_prefix: "sonar-pro", input_per_million: 3.00, output_per_million: 15.00 },
    PriceRow { model_prefix: "sonar", input_per_million: 1.00, output_per_million: 1.00 },
    PriceRow { model_prefix: "cohere.command", input_per_million: 1.50, output_per_million: 2.00 },
    PriceRow { model_prefix: "meta.llama", input_per_million: 0.65, output_per_million: 0.65 },
];

/// Conservative fallback applied when no prefix in [`PRICING`] matches.
const DEFAULT_ROW: PriceRow = PriceRow {
    model_prefix: "",
    input_per_million: 5.00,
    output_per_million: 15.00,
};

/// Estimate the token count of `text` as `ceil(len(text) / 4)`, the
/// standard cheap heuristic (roughly 4 characters per token in English).
pub fn estimate_tokens(text: &str) -> u32 {
    let len = text.chars().count();
    ((len + 3) / 4) as u32
}

fn price_row_for(model: &str) -> &'static PriceRow {
    PRICING
        .iter()
        .find(|row| model.starts_with(row.model_prefix))
        .unwrap_or(&DEFAULT_ROW)
}

/// Compute the estimated USD cost of a call, given input/output token
/// counts. The Local provider is always free regardless of model name.
pub fn cost(provider: ProviderId, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    if provider == ProviderId::Local {
        return 0.0;
    }
    let row = price_row_for(model);
    let input_cost = (input_tokens as f64 / 1_000_000.0) * row.input_per_million;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * row.output_per_million;
    input_cost + output_cost
}

/// Format a USD amount: sub-cent amounts render as `< $0.01`,
/// everything else as four-decimal dollars.
pub fn format_cost(usd: f64) -> String {
    if usd < 0.01 {
        "< $0.01".to_string()
    } else {
        format!("${:.4}", usd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_local_provider_always_free() {
        assert_eq!(cost(ProviderId::Local, "whatever-model", 1_000_000, 1_000_000), 0.0);
    }

    #[test]
    fn test_known_model_prefix_match() {
        let c = cost(ProviderId::OpenAi, "gpt-4o-2024-08-06", 1_000_000, 1_000_000);
        assert!((c - (2.50 + 10.00)).abs() < 1e-9);
    }

    #[test]
    fn test_longer_prefix_wins_over_shorter() {
        let c = cost(ProviderId::OpenAi, "gpt-4o-mini-2024-07-18", 1_000_000, 0);
        assert!((c - 0.15).abs() < 1e-9, "expected gpt-4o-mini rate, got {}", c);
    }

    #[test]
    fn test_unknown_model_uses_default() {
        let c = cost(ProviderId::OpenAi, "totally-unknown-model", 1_000_000, 0);
        assert!((c - DEFAULT_ROW.input_per_million).abs() < 1e-9);
    }

    #[test]
    fn test_format_cost_sub_cent() {
        assert_eq!(format_cost(0.0), "< $0.01");
        assert_eq!(format_cost(0.005), "< $0.01");
    }

    #[test]
    fn test_format_cost_four_decimals() {
        assert_eq!(format_cost(1.5), "$1.5000");
        assert_eq!(format_cost(0.0123), "$0.0123");
    }
}

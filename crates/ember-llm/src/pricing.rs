//! Per-call cost computation — pricing tables per million tokens.

/// Pricing tier per million tokens.
struct PricingTier {
    input_per_million: f64,
    output_per_million: f64,
}

const SONNET: PricingTier = PricingTier {
    input_per_million: 3.0,
    output_per_million: 15.0,
};

const HAIKU: PricingTier = PricingTier {
    input_per_million: 1.0,
    output_per_million: 5.0,
};

const OPUS: PricingTier = PricingTier {
    input_per_million: 15.0,
    output_per_million: 75.0,
};

const GPT_4O: PricingTier = PricingTier {
    input_per_million: 2.5,
    output_per_million: 10.0,
};

const GPT_4O_MINI: PricingTier = PricingTier {
    input_per_million: 0.15,
    output_per_million: 0.6,
};

/// Look up the pricing tier for a model.
///
/// Pattern-matches on model family substrings; returns `None` for unknown
/// models (no implicit fallback pricing).
fn get_pricing_tier(model: &str) -> Option<&'static PricingTier> {
    let lower = model.to_lowercase();
    if lower.contains("opus") {
        return Some(&OPUS);
    }
    if lower.contains("sonnet") {
        return Some(&SONNET);
    }
    if lower.contains("haiku") {
        return Some(&HAIKU);
    }
    if lower.contains("gpt-4o-mini") {
        return Some(&GPT_4O_MINI);
    }
    if lower.contains("gpt-4o") {
        return Some(&GPT_4O);
    }
    None
}

/// Cost in USD for one call, or `0.0` for models with no known tier.
#[must_use]
pub fn cost_for(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let Some(tier) = get_pricing_tier(model) else {
        return 0.0;
    };
    let prompt = prompt_tokens as f64 / 1_000_000.0 * tier.input_per_million;
    let completion = completion_tokens as f64 / 1_000_000.0 * tier.output_per_million;
    prompt + completion
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Per-model token pricing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// USD per token as (input, output). Unknown models cost zero.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    // Prices are per million tokens; longest prefix first.
    let per_million = if model.starts_with("gpt-4o-mini") {
        (dec!(0.15), dec!(0.60))
    } else if model.starts_with("gpt-4o") {
        (dec!(2.50), dec!(10.00))
    } else if model.starts_with("gpt-4.1-mini") {
        (dec!(0.40), dec!(1.60))
    } else if model.starts_with("gpt-4.1") {
        (dec!(2.00), dec!(8.00))
    } else if model.starts_with("claude-3-5-haiku") || model.starts_with("claude-haiku") {
        (dec!(0.80), dec!(4.00))
    } else if model.starts_with("claude-sonnet") || model.starts_with("claude-3-5-sonnet") {
        (dec!(3.00), dec!(15.00))
    } else if model.starts_with("claude-opus") {
        (dec!(15.00), dec!(75.00))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };
    let million = dec!(1_000_000);
    (per_million.0 / million, per_million.1 / million)
}

/// Estimated cost of one call.
pub fn estimate(model: &str, input_tokens: u32, output_tokens: u32) -> Decimal {
    let (input, output) = model_cost(model);
    input * Decimal::from(input_tokens) + output * Decimal::from(output_tokens)
}

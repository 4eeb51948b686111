//! Aggregate accounting — session-scoped running totals.
//!
//! Translates one assistant message's token report into the single UPDATE
//! the session repository applies: additive counters, a set-not-add context
//! size, a `MAX`-folded peak, and model identity back-fill. The dedup
//! decision (exactly once per contributing message) lives in the
//! correlation state; this module only shapes the delta.

use scribe_core::events::payloads::MessagePayload;
use scribe_store::TokenApply;

/// Build the session counter delta for a message, if it contributes.
///
/// Returns `None` when the message carries no token report, or reports zero
/// input and zero output tokens — such an update is not marked applied, so
/// a later, fuller report for the same message id still counts.
pub fn token_apply_for(payload: &MessagePayload) -> Option<TokenApply> {
    let tokens = payload.tokens.as_ref()?;
    if tokens.is_non_contributing() {
        return None;
    }
    Some(TokenApply {
        input_tokens: tokens.input,
        output_tokens: tokens.output,
        reasoning_tokens: tokens.reasoning,
        cache_read_tokens: tokens.cache.read,
        cache_write_tokens: tokens.cache.write,
        cost: payload.cost.unwrap_or(0.0),
        context_tokens: tokens.context_tokens(),
        model_provider: payload.provider_id.clone(),
        model_id: payload.model_id.clone(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> MessagePayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn no_tokens_is_none() {
        let payload = message(json!({
            "id": "msg_1", "sessionId": "ses_1", "role": "assistant"
        }));
        assert!(token_apply_for(&payload).is_none());
    }

    #[test]
    fn zero_input_and_output_is_none() {
        let payload = message(json!({
            "id": "msg_1", "sessionId": "ses_1", "role": "assistant",
            "tokens": {"input": 0, "output": 0, "cache": {"read": 100, "write": 5}}
        }));
        assert!(token_apply_for(&payload).is_none());
    }

    #[test]
    fn contributing_message_maps_all_counters() {
        let payload = message(json!({
            "id": "msg_1", "sessionId": "ses_1", "role": "assistant",
            "providerId": "prov", "modelId": "big-model-1",
            "cost": 0.03,
            "tokens": {
                "input": 1000, "output": 200, "reasoning": 40,
                "cache": {"read": 600, "write": 50}
            }
        }));

        let apply = token_apply_for(&payload).unwrap();
        assert_eq!(apply.input_tokens, 1000);
        assert_eq!(apply.output_tokens, 200);
        assert_eq!(apply.reasoning_tokens, 40);
        assert_eq!(apply.cache_read_tokens, 600);
        assert_eq!(apply.cache_write_tokens, 50);
        assert_eq!(apply.context_tokens, 1600); // input + cache read
        assert!((apply.cost - 0.03).abs() < f64::EPSILON);
        assert_eq!(apply.model_provider.as_deref(), Some("prov"));
        assert_eq!(apply.model_id.as_deref(), Some("big-model-1"));
    }

    #[test]
    fn missing_cost_defaults_to_zero() {
        let payload = message(json!({
            "id": "msg_1", "sessionId": "ses_1", "role": "assistant",
            "tokens": {"input": 10, "output": 1}
        }));
        let apply = token_apply_for(&payload).unwrap();
        assert!(apply.cost.abs() < f64::EPSILON);
    }
}

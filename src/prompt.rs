//! System-prompt injection policy
//!
//! Derives the exact message sequence sent upstream. Callers that supply
//! their own system prompt keep it; everyone else gets the fixed coding
//! persona prepended, exactly once.

use crate::chat::{ConversationTurn, Role};

/// The persona injected when a conversation arrives without its own system
/// prompt. Fixed text, never mutated.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are CODEMASTER, an expert coding AI assistant. \
You help with programming in any language (Python, JavaScript, Java, C++, etc.). \
Provide clear explanations, follow best practices, include comments, handle edge cases, \
and suggest optimizations. If debugging, explain the issue and fix step-by-step. \
Always format code properly with markdown.";

/// Compose the effective prompt for the upstream call
///
/// Pure and structural: the only inspection is the role of element 0. A
/// conversation that already leads with a system turn passes through
/// unchanged (preserves caller-supplied persona/policy); anything else gets
/// [`DEFAULT_SYSTEM_PROMPT`] prepended. Idempotent by construction - the
/// position-0 check means composing twice can never stack a second prompt.
pub fn compose(messages: Vec<ConversationTurn>) -> Vec<ConversationTurn> {
    match messages.first() {
        Some(first) if first.role == Role::System => messages,
        _ => {
            let mut composed = Vec::with_capacity(messages.len() + 1);
            composed.push(ConversationTurn::system(DEFAULT_SYSTEM_PROMPT));
            composed.extend(messages);
            composed
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::System),
            Just(Role::User),
            Just(Role::Assistant),
        ]
    }

    fn arb_conversation() -> impl Strategy<Value = Vec<ConversationTurn>> {
        prop::collection::vec(
            (arb_role(), ".{0,40}").prop_map(|(role, content)| ConversationTurn { role, content }),
            0..8,
        )
    }

    /// Composing never alters the caller's turns: the input is always a
    /// suffix of the output, and at most one turn is added in front.
    proptest! {
        #[test]
        fn compose_preserves_input_as_suffix(messages in arb_conversation()) {
            let composed = compose(messages.clone());
            prop_assert!(composed.len() - messages.len() <= 1);
            prop_assert_eq!(&composed[composed.len() - messages.len()..], &messages[..]);
        }
    }

    /// The composed sequence always leads with a system turn.
    proptest! {
        #[test]
        fn compose_output_leads_with_system(messages in arb_conversation()) {
            let composed = compose(messages);
            prop_assert_eq!(composed[0].role, Role::System);
        }
    }

    /// compose(compose(x)) == compose(x) for every conversation.
    proptest! {
        #[test]
        fn compose_is_idempotent(messages in arb_conversation()) {
            let once = compose(messages);
            let twice = compose(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}

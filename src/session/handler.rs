//! Tool-call protocol handler.
//!
//! Processes one tool-call batch per pass: picks the first invocation
//! whose name matches a declared tool, persists its arguments to the
//! durable store before anything else happens, and produces one
//! acknowledgment per invocation id, matched or not, so the model is
//! never left waiting on an unanswered id mid-turn.

use std::sync::Arc;

use serde_json::Value;

use crate::core::live::{LiveConfig, ToolAck, ToolInvocation};

use super::store::ResultStore;

/// Outcome of one batch pass.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One acknowledgment per received invocation id, in batch order
    pub acks: Vec<ToolAck>,
    /// Extracted result from the first matching invocation, if any
    pub result: Option<Value>,
}

/// Handler for tool-call batches of one session.
///
/// Built from the session's config at connect time and registered on the
/// transport for the Active lifetime; a reconnect builds and registers a
/// fresh handler, replacing this one.
pub struct ToolCallHandler {
    /// Declared tool names, in declaration order
    declared: Vec<String>,
    store: Arc<dyn ResultStore>,
}

impl ToolCallHandler {
    /// Create a handler for the tools declared in `config`.
    pub fn new(config: &LiveConfig, store: Arc<dyn ResultStore>) -> Self {
        Self {
            declared: config.tool_names(),
            store,
        }
    }

    /// Declared tool names.
    pub fn declared(&self) -> &[String] {
        &self.declared
    }

    /// Process one batch.
    ///
    /// The persistence write happens here, synchronously, before the
    /// caller gets the acknowledgments to send; a disconnect racing the
    /// acknowledgment can no longer lose the result. First matching
    /// invocation wins when several match; every id is acknowledged
    /// either way.
    pub fn process(&self, invocations: &[ToolInvocation]) -> BatchOutcome {
        let matched = invocations
            .iter()
            .find(|inv| self.declared.iter().any(|name| name == &inv.name));

        let result = matched.map(|inv| {
            tracing::info!(tool = %inv.name, id = %inv.id, "Tool invocation matched");
            inv.args.clone()
        });

        if let Some(args) = &result
            && let Err(e) = self.store.save(args)
        {
            // Degraded but alive: the live notify path still delivers the
            // result even when the durable slot could not be written.
            tracing::error!("Failed to persist tool result: {}", e);
        }

        let unmatched = invocations.len() - usize::from(matched.is_some());
        if unmatched > 0 {
            tracing::debug!(count = unmatched, "Acknowledging unmatched invocations");
        }

        BatchOutcome {
            acks: invocations
                .iter()
                .map(|inv| ToolAck::success(&inv.id))
                .collect(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::live::{ResponseModality, ToolDeclaration};
    use crate::session::store::MemoryResultStore;
    use serde_json::json;

    fn config_with_tools(names: &[&str]) -> LiveConfig {
        LiveConfig {
            model: "models/test".to_string(),
            response_modality: ResponseModality::Audio,
            system_instruction: String::new(),
            tools: names
                .iter()
                .map(|n| ToolDeclaration {
                    name: n.to_string(),
                    description: String::new(),
                    parameters: json!({ "type": "OBJECT" }),
                })
                .collect(),
        }
    }

    fn invocation(id: &str, name: &str, args: Value) -> ToolInvocation {
        ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn test_matched_batch_acks_all_and_extracts_one() {
        let store = Arc::new(MemoryResultStore::new());
        let handler = ToolCallHandler::new(&config_with_tools(&["generate_feedback"]), store.clone());

        let batch = vec![
            invocation("1", "unrelated_tool", json!({})),
            invocation("2", "generate_feedback", json!({ "score": 80 })),
            invocation("3", "another_tool", json!({})),
        ];
        let outcome = handler.process(&batch);

        // One response per invocation id, matched or not.
        assert_eq!(outcome.acks.len(), 3);
        assert_eq!(
            outcome.acks.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            ["1", "2", "3"]
        );
        assert_eq!(outcome.result, Some(json!({ "score": 80 })));

        // Persisted before the caller ever saw the acknowledgments.
        assert_eq!(store.load_and_clear(), Some(json!({ "score": 80 })));
    }

    #[test]
    fn test_unmatched_batch_acks_without_persisting() {
        let store = Arc::new(MemoryResultStore::new());
        let handler = ToolCallHandler::new(&config_with_tools(&["generate_feedback"]), store.clone());

        let batch = vec![
            invocation("a", "foo", json!({})),
            invocation("b", "bar", json!({})),
        ];
        let outcome = handler.process(&batch);

        assert_eq!(outcome.acks.len(), 2);
        assert!(outcome.result.is_none());
        assert!(store.load_and_clear().is_none());
    }

    #[test]
    fn test_first_match_wins_in_batch_order() {
        let store = Arc::new(MemoryResultStore::new());
        let handler =
            ToolCallHandler::new(&config_with_tools(&["tool_a", "tool_b"]), store.clone());

        // Both invocations match declared tools; the first in batch order
        // is acted on, both are acknowledged.
        let batch = vec![
            invocation("1", "tool_b", json!({ "from": "b" })),
            invocation("2", "tool_a", json!({ "from": "a" })),
        ];
        let outcome = handler.process(&batch);

        assert_eq!(outcome.result, Some(json!({ "from": "b" })));
        assert_eq!(outcome.acks.len(), 2);
        assert_eq!(store.load_and_clear(), Some(json!({ "from": "b" })));
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let store = Arc::new(MemoryResultStore::new());
        let handler = ToolCallHandler::new(&config_with_tools(&["generate_feedback"]), store);

        let outcome = handler.process(&[]);
        assert!(outcome.acks.is_empty());
        assert!(outcome.result.is_none());
    }

    #[test]
    fn test_ack_payload_shape() {
        let store = Arc::new(MemoryResultStore::new());
        let handler = ToolCallHandler::new(&config_with_tools(&[]), store);

        let outcome = handler.process(&[invocation("x", "anything", json!({}))]);
        assert_eq!(
            outcome.acks[0].response,
            json!({ "output": { "success": true } })
        );
    }
}

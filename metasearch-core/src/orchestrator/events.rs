//! Events emitted by the streaming delivery mode.
//!
//! Each event serializes as one JSON object tagged by `type`, so a consumer
//! can write them out one per line.

use std::pin::Pin;

use futures::Stream;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::outcome::{BackendOutcome, ExtensionOutcome, Outcome};

/// Lazy, finite stream of events. [`StreamEvent::Done`] is always the last
/// item.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// One unit of streamed output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A backend finished.
    EngineResult {
        /// Backend name.
        name: String,
        /// What it produced.
        outcome: BackendOutcome,
    },
    /// A pre extension finished.
    PrePluginResult {
        /// Extension name.
        name: String,
        /// What it produced.
        outcome: ExtensionOutcome,
    },
    /// A post extension finished.
    PostPluginResult {
        /// Extension name.
        name: String,
        /// What it produced.
        outcome: ExtensionOutcome,
    },
    /// Total results across successful backends, after truncation.
    ResultCount(usize),
    /// Terminal marker.
    Done,
}

impl StreamEvent {
    /// Wire tag for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EngineResult { .. } => "engine_result",
            Self::PrePluginResult { .. } => "pre_plugin_result",
            Self::PostPluginResult { .. } => "post_plugin_result",
            Self::ResultCount(_) => "number_of_results",
            Self::Done => "done",
        }
    }

    /// Unit name for result events.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::EngineResult { name, .. }
            | Self::PrePluginResult { name, .. }
            | Self::PostPluginResult { name, .. } => Some(name),
            Self::ResultCount(_) | Self::Done => None,
        }
    }

    /// Whether this is the terminal event.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

fn serialize_outcome<M, T>(map: &mut M, outcome: &Outcome<T>) -> Result<(), M::Error>
where
    M: SerializeMap,
    T: Serialize,
{
    match outcome {
        Outcome::Success(value) => map.serialize_entry("result", value),
        Outcome::Failure { error } => map.serialize_entry("error", error),
    }
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind())?;
        match self {
            Self::EngineResult { name, outcome } => {
                map.serialize_entry("name", name)?;
                serialize_outcome(&mut map, outcome)?;
            }
            Self::PrePluginResult { name, outcome } | Self::PostPluginResult { name, outcome } => {
                map.serialize_entry("name", name)?;
                serialize_outcome(&mut map, outcome)?;
            }
            Self::ResultCount(count) => map.serialize_entry("data", count)?,
            Self::Done => map.serialize_entry("data", "[DONE]")?,
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackendResponse, ResultItem};
    use serde_json::json;

    #[test]
    fn engine_result_wire_format() {
        let event = StreamEvent::EngineResult {
            name: "brave".into(),
            outcome: Outcome::Success(BackendResponse::new(vec![ResultItem::new(
                "Rust",
                "https://rust-lang.org",
                "A language",
            )])),
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "engine_result");
        assert_eq!(value["name"], "brave");
        assert_eq!(value["result"]["results"][0]["url"], "https://rust-lang.org");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_carries_error_field() {
        let event = StreamEvent::PostPluginResult {
            name: "summary".into(),
            outcome: Outcome::failure("model unavailable"),
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            value,
            json!({"type": "post_plugin_result", "name": "summary", "error": "model unavailable"})
        );
    }

    #[test]
    fn count_and_done() {
        assert_eq!(
            serde_json::to_value(StreamEvent::ResultCount(7)).expect("serialize"),
            json!({"type": "number_of_results", "data": 7})
        );
        assert_eq!(
            serde_json::to_value(StreamEvent::Done).expect("serialize"),
            json!({"type": "done", "data": "[DONE]"})
        );
        assert!(StreamEvent::Done.is_done());
        assert!(StreamEvent::Done.name().is_none());
    }
}

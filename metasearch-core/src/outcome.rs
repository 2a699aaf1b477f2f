//! The success-or-failure record of one backend or extension invocation.
//!
//! Every delivery mode shares the same [`Outcome`] type, so consumers never
//! have to re-inspect the shape of a result.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::types::BackendResponse;

/// Result of a single task.
///
/// Serializes as the payload itself on success and as `{"error": "..."}` on
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    /// The unit produced a value.
    Success(T),
    /// The unit failed; the message is the error's display string.
    Failure {
        /// Human-readable failure reason.
        error: String,
    },
}

/// Outcome of one backend search.
pub type BackendOutcome = Outcome<BackendResponse>;

/// Outcome of one extension run. The payload is whatever the extension
/// returned.
pub type ExtensionOutcome = Outcome<Value>;

impl<T> Outcome<T> {
    /// Build a failure outcome.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Whether this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The success payload, if any.
    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// The failure message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }

    /// Transform the success payload, leaving failures untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure { error } => Outcome::Failure { error },
        }
    }
}

impl BackendOutcome {
    /// Number of results carried; zero for failures.
    pub fn result_count(&self) -> usize {
        self.success().map_or(0, |r| r.results.len())
    }
}

/// Outcomes keyed by unit name, in dispatch order.
///
/// Each name appears at most once: inserting an existing name replaces its
/// outcome in place. Serializes as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcomes<T> {
    entries: Vec<(String, Outcome<T>)>,
}

impl<T> Default for Outcomes<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Outcomes<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for `name`.
    pub fn insert(&mut self, name: impl Into<String>, outcome: Outcome<T>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = outcome,
            None => self.entries.push((name, outcome)),
        }
    }

    /// Look up the outcome for `name`.
    pub fn get(&self, name: &str) -> Option<&Outcome<T>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| outcome)
    }

    /// Number of recorded units.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, outcome)` pairs in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome<T>)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), o))
    }

    /// Unit names in dispatch order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl Outcomes<BackendResponse> {
    /// Sum of result-list lengths across successful backends.
    pub fn result_count(&self) -> usize {
        self.entries.iter().map(|(_, o)| o.result_count()).sum()
    }
}

impl<T> FromIterator<(String, Outcome<T>)> for Outcomes<T> {
    fn from_iter<I: IntoIterator<Item = (String, Outcome<T>)>>(iter: I) -> Self {
        let mut outcomes = Self::new();
        for (name, outcome) in iter {
            outcomes.insert(name, outcome);
        }
        outcomes
    }
}

impl<T: Serialize> Serialize for Outcomes<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, outcome) in &self.entries {
            map.serialize_entry(name, outcome)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultItem;

    fn response(n: usize) -> BackendResponse {
        BackendResponse::new(
            (0..n)
                .map(|i| ResultItem::new(format!("Title {i}"), format!("https://{i}.example"), ""))
                .collect(),
        )
    }

    #[test]
    fn accessors() {
        let ok: BackendOutcome = Outcome::Success(response(3));
        assert!(ok.is_success());
        assert_eq!(ok.result_count(), 3);
        assert!(ok.error().is_none());

        let failed: BackendOutcome = Outcome::failure("connection reset");
        assert!(!failed.is_success());
        assert_eq!(failed.result_count(), 0);
        assert_eq!(failed.error(), Some("connection reset"));
        assert!(failed.success().is_none());
    }

    #[test]
    fn map_leaves_failures_alone() {
        let failed: Outcome<u32> = Outcome::failure("nope");
        assert_eq!(failed.map(|v| v + 1), Outcome::failure("nope"));
        assert_eq!(Outcome::Success(1).map(|v| v + 1), Outcome::Success(2));
    }

    #[test]
    fn failure_serializes_as_error_object() {
        let failed: ExtensionOutcome = Outcome::failure("timeout");
        let json = serde_json::to_value(&failed).expect("serialize");
        assert_eq!(json, serde_json::json!({"error": "timeout"}));

        let ok: ExtensionOutcome = Outcome::Success(serde_json::json!({"answer": 42}));
        let json = serde_json::to_value(&ok).expect("serialize");
        assert_eq!(json, serde_json::json!({"answer": 42}));
    }

    #[test]
    fn insert_keeps_names_unique() {
        let mut outcomes: Outcomes<Value> = Outcomes::new();
        outcomes.insert("calc", Outcome::failure("first"));
        outcomes.insert("spell", Outcome::Success(Value::Null));
        outcomes.insert("calc", Outcome::Success(Value::Bool(true)));
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.names().collect::<Vec<_>>(), vec!["calc", "spell"]);
        assert_eq!(outcomes.get("calc"), Some(&Outcome::Success(Value::Bool(true))));
    }

    #[test]
    fn result_count_sums_successes_only() {
        let outcomes: Outcomes<BackendResponse> = vec![
            ("a".to_string(), Outcome::Success(response(2))),
            ("b".to_string(), Outcome::failure("down")),
            ("c".to_string(), Outcome::Success(response(5))),
        ]
        .into_iter()
        .collect();
        assert_eq!(outcomes.result_count(), 7);
    }

    #[test]
    fn outcomes_serialize_as_object_in_order() {
        let outcomes: Outcomes<BackendResponse> = vec![
            ("zeta".to_string(), Outcome::failure("down")),
            ("alpha".to_string(), Outcome::Success(response(1))),
        ]
        .into_iter()
        .collect();
        let text = serde_json::to_string(&outcomes).expect("serialize");
        let zeta = text.find("zeta").expect("zeta present");
        let alpha = text.find("alpha").expect("alpha present");
        assert!(zeta < alpha);
        let json: Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(json["zeta"]["error"], "down");
        assert_eq!(json["alpha"]["results"][0]["title"], "Title 0");
    }
}

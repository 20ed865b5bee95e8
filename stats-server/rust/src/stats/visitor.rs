use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::Store;

/// Client-asserted visitor identity. Nothing here is authenticated, the
/// server only guarantees that a visitor without an id gets a fresh one.
#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
#[serde(transparent)]
pub(crate) struct VisitorId {
    value: String,
}

impl VisitorId {
    pub(crate) fn new() -> Self {
        Self {
            value: Uuid::new_v4().to_string(),
        }
    }

    /// Accepts the id the client sent, or issues a new one when it is absent or empty.
    pub(crate) fn resolve(asserted: Option<String>) -> Self {
        match asserted {
            Some(value) if !value.is_empty() => Self { value },
            _ => Self::new(),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
impl From<&str> for VisitorId {
    fn from(value: &str) -> Self {
        Self { value: value.to_owned() }
    }
}

impl Display for VisitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Store {
    pub(crate) fn is_known(&self, visitor: &VisitorId) -> bool {
        self.unique_visitors.contains(visitor)
    }

    /// Returns true when the visitor was not seen before.
    pub(crate) fn register(&mut self, visitor: &VisitorId) -> bool {
        if self.is_known(visitor) {
            return false;
        }
        self.unique_visitors.insert(visitor.clone())
    }

    pub(crate) fn unique_visitor_count(&self) -> usize {
        self.unique_visitors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_asserted_id() {
        let id = VisitorId::resolve(Some("abc".to_owned()));
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn resolve_issues_uuid_when_missing_or_empty() {
        let a = VisitorId::resolve(None);
        let b = VisitorId::resolve(Some(String::new()));

        assert!(Uuid::parse_str(a.as_str()).is_ok());
        assert!(Uuid::parse_str(b.as_str()).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn register_counts_each_visitor_once() {
        let mut store = Store::default();
        let a = VisitorId::from("a");

        assert!(!store.is_known(&a));
        assert!(store.register(&a));
        assert!(!store.register(&a));
        assert!(store.register(&VisitorId::from("b")));

        assert!(store.is_known(&a));
        assert_eq!(store.unique_visitor_count(), 2);
    }
}

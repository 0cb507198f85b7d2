//! Blank-node coalescing: anonymous subjects (`_:b0`-style) in an insert
//! batch are identified by the SHA-1 hash of their predicate/object pairs,
//! in the order they were asserted, and rewritten to a stable `urn:uuid:`
//! IRI before the statement reaches the interpreter. Two blank nodes
//! asserting the same predicates and objects in the same order coalesce to
//! the same resource. Asserting them in a different order does not, since
//! this hashes an ordered byte stream rather than the unordered value set.

use sha1::{Digest, Sha1};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct BlankNodeBuffer {
    /// predicate/object pairs asserted so far for each blank label, in
    /// insertion order.
    pending: HashMap<String, Vec<(String, String)>>,
    /// resolved labels get a stable IRI for the rest of the batch.
    resolved: HashMap<String, String>,
}

impl BlankNodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blank(label: &str) -> bool {
        label.starts_with("_:")
    }

    /// Records one predicate/object pair for `label`, to be folded into its
    /// hash once the batch closes the blank node (via `resolve`).
    pub fn record(&mut self, label: &str, predicate: &str, object: &str) {
        self.pending
            .entry(label.to_string())
            .or_default()
            .push((predicate.to_string(), object.to_string()));
    }

    /// Computes (or returns the cached) stable IRI for `label`. Idempotent
    /// within a batch: the same label always resolves to the same IRI, and
    /// two distinct labels with identical ordered pair sequences resolve to
    /// the same IRI too, since the hash is all that's used to derive it.
    pub fn resolve(&mut self, label: &str) -> String {
        if let Some(iri) = self.resolved.get(label) {
            return iri.clone();
        }
        let pairs = self.pending.get(label).cloned().unwrap_or_default();
        let iri = Self::hash_to_iri(&pairs);
        self.resolved.insert(label.to_string(), iri.clone());
        iri
    }

    fn hash_to_iri(pairs: &[(String, String)]) -> String {
        let mut hasher = Sha1::new();
        for (predicate, object) in pairs {
            hasher.update(predicate.as_bytes());
            hasher.update([0u8]);
            hasher.update(object.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let uuid = Uuid::from_bytes(digest[0..16].try_into().expect("sha1 digest is 20 bytes"));
        format!("urn:uuid:{uuid}")
    }

    /// Clears all per-batch state; called by the update buffer on
    /// `begin()`.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.resolved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_ordered_pairs_coalesce() {
        let mut a = BlankNodeBuffer::new();
        a.record("_:b0", "nco:fullname", "Alice");
        a.record("_:b0", "nco:hasEmail", "alice@example.com");

        let mut b = BlankNodeBuffer::new();
        b.record("_:b1", "nco:fullname", "Alice");
        b.record("_:b1", "nco:hasEmail", "alice@example.com");

        assert_eq!(a.resolve("_:b0"), b.resolve("_:b1"));
    }

    #[test]
    fn different_order_does_not_coalesce() {
        let mut a = BlankNodeBuffer::new();
        a.record("_:b0", "nco:fullname", "Alice");
        a.record("_:b0", "nco:hasEmail", "alice@example.com");

        let mut b = BlankNodeBuffer::new();
        b.record("_:b1", "nco:hasEmail", "alice@example.com");
        b.record("_:b1", "nco:fullname", "Alice");

        assert_ne!(a.resolve("_:b0"), b.resolve("_:b1"));
    }

    #[test]
    fn clear_resets_state() {
        let mut buf = BlankNodeBuffer::new();
        buf.record("_:b0", "p", "o");
        let first = buf.resolve("_:b0");
        buf.clear();
        buf.record("_:b0", "p", "o2");
        let second = buf.resolve("_:b0");
        assert_ne!(first, second);
    }
}

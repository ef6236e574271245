use cvc_store::{ObjectStore, StoreResult};
use cvc_types::ObjectId;

/// Offered ids split by whether a store already holds them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Negotiation {
    pub wants: Vec<ObjectId>,
    pub common: Vec<ObjectId>,
}

/// Computes what has to cross the wire so that nothing is sent twice.
pub struct NegotiationEngine;

impl NegotiationEngine {
    /// Offered ids `store` lacks, deduplicated, in offer order.
    pub fn compute_wants(
        store: &dyn ObjectStore,
        offered: &[ObjectId],
    ) -> StoreResult<Vec<ObjectId>> {
        Ok(Self::negotiate(store, offered)?.wants)
    }

    pub fn negotiate(store: &dyn ObjectStore, offered: &[ObjectId]) -> StoreResult<Negotiation> {
        let mut seen = std::collections::HashSet::new();
        let mut negotiation = Negotiation::default();
        for id in offered {
            if !seen.insert(*id) {
                continue;
            }
            if store.exists(id)? {
                negotiation.common.push(*id);
            } else {
                negotiation.wants.push(*id);
            }
        }
        Ok(negotiation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvc_store::{InMemoryObjectStore, ObjectKind, StoredObject};

    fn source(data: &[u8]) -> StoredObject {
        StoredObject::new(ObjectKind::Source, data.to_vec())
    }

    #[test]
    fn wants_are_the_missing_ids() {
        let store = InMemoryObjectStore::new();
        let held = store.write(&source(b"held")).unwrap();
        let missing = source(b"missing").compute_id();

        let negotiation = NegotiationEngine::negotiate(&store, &[held, missing]).unwrap();
        assert_eq!(negotiation.wants, vec![missing]);
        assert_eq!(negotiation.common, vec![held]);
    }

    #[test]
    fn duplicates_are_offered_once() {
        let store = InMemoryObjectStore::new();
        let id = source(b"x").compute_id();
        let wants = NegotiationEngine::compute_wants(&store, &[id, id, id]).unwrap();
        assert_eq!(wants, vec![id]);
    }

    #[test]
    fn empty_offer_wants_nothing() {
        let store = InMemoryObjectStore::new();
        assert!(NegotiationEngine::compute_wants(&store, &[]).unwrap().is_empty());
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use kylix_consensus::ValidatorCoordinatorHandle;
use kylix_core::{provo, KylixError, TransactionId, Triple, ValidatorId};
use kylix_crypto::canon::{canonical_message, iso8601};
use kylix_crypto::keys::KeyPair;
use kylix_crypto::{hash, sig};
use kylix_dag::{DagStore, Edge, Pattern, TransactionNode};
use tracing::{error, warn};

struct ChainState<S: DagStore> {
    store: S,
    next_id: u64,
    last_appended_id: Option<TransactionId>,
    seen_hashes: HashSet<String>,
}

/// The admission core (spec.md §4.4). Generic over the DAG store variant
/// so the same pipeline serves both the in-memory and persistent stores.
/// The entire pipeline runs under one lock per call, matching the serial
/// actor discipline spec.md §5 requires of C4.
pub struct BlockchainServer<S: DagStore> {
    state: Mutex<ChainState<S>>,
    validators: ValidatorCoordinatorHandle,
    test_key_pair: KeyPair,
}

impl<S: DagStore> BlockchainServer<S> {
    /// Opens the server over `store`, recovering counter/spine/dedup state
    /// from whatever the store already holds. A node reopens the same
    /// persistent store on every CLI invocation, so `new` cannot assume an
    /// empty store the way a fresh in-memory test does: reassigning `tx0`
    /// to an already-populated store would overwrite an existing record.
    pub fn new(mut store: S, validators: ValidatorCoordinatorHandle) -> Self {
        let existing = store.get_all_nodes().unwrap_or_default();
        let mut next_id = 0u64;
        let mut last_appended_id = None;
        let mut seen_hashes = HashSet::with_capacity(existing.len());
        for (id, node) in &existing {
            if id.as_u64() >= next_id {
                next_id = id.as_u64() + 1;
            }
            seen_hashes.insert(node.hash.clone());
        }
        if let Some((max_id, _)) = existing.iter().max_by_key(|(id, _)| id.as_u64()) {
            last_appended_id = Some(*max_id);
        }
        Self {
            state: Mutex::new(ChainState {
                store,
                next_id,
                last_appended_id,
                seen_hashes,
            }),
            validators,
            test_key_pair: KeyPair::generate(),
        }
    }

    /// `add_transaction(s, p, o, v, sig)` (spec.md §4.4): mints the
    /// timestamp fresh (step 5) and runs the pipeline.
    pub fn add_transaction(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        validator: &str,
        signature: &[u8],
    ) -> Result<TransactionId, KylixError> {
        self.admit(subject, predicate, object, validator, Utc::now(), signature)
    }

    /// The admission pipeline proper (spec.md §4.4, steps 1-12), taking an
    /// explicit timestamp so tests can construct a signature against a
    /// known `ts` instead of racing the wall clock.
    ///
    /// Any step may short-circuit with an error; the store is left
    /// unchanged for any rejection.
    fn admit(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        validator: &str,
        timestamp: DateTime<Utc>,
        signature: &[u8],
    ) -> Result<TransactionId, KylixError> {
        let started = Instant::now();

        // Steps 1-2: shape and size.
        let triple = Triple::new(subject, predicate, object);
        triple.validate()?;

        // Step 3: validator membership.
        if !self.validators.contains(validator) {
            return Err(KylixError::UnknownValidator(validator.to_string()));
        }

        // Step 4: PROV-O role shape.
        if !provo::check_shape(subject, predicate, object) {
            return Err(KylixError::InvalidProvenanceRelationship);
        }

        // Step 5 minted `timestamp` above; step 6 hashes it in.
        let canonical = canonical_message(
            subject,
            predicate,
            object,
            validator,
            &iso8601(timestamp),
        );
        let digest = hash::sha256(canonical.as_bytes());
        let hash_hex = hex::encode(digest);

        let mut state = self.state.lock().expect("chain actor poisoned");

        // Step 7: duplicate.
        if state.seen_hashes.contains(&hash_hex) {
            return Err(KylixError::DuplicateTransaction);
        }

        // Step 8: signature.
        let public_key = self
            .validators
            .public_key(validator)
            .ok_or(KylixError::VerificationFailed)?;
        sig::verify(&digest, signature, &public_key)?;

        // Step 9: append.
        let id = TransactionId::new(state.next_id);
        let node = TransactionNode {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            validator: validator.to_string(),
            timestamp,
            signature: signature.to_vec(),
            hash: hash_hex.clone(),
        };
        state.store.add_node(id, node)?;
        state.seen_hashes.insert(hash_hex);
        state.next_id += 1;

        // Step 10: link.
        if let Some(previous) = state.last_appended_id {
            if let Err(e) = state.store.add_edge(Edge::confirms(previous, id)) {
                error!(error = %e, "chain spine linkage failed for a committed node");
            }
        }
        state.last_appended_id = Some(id);
        drop(state);

        // Step 11: telemetry.
        let elapsed_micros = started.elapsed().as_micros() as u64;
        self.validators
            .record_transaction_performance(validator, true, Some(elapsed_micros));

        // Step 12.
        Ok(id)
    }

    /// Asynchronous ingress from network peers (spec.md §4.4): parses the
    /// map back into arguments and calls [`add_transaction`]. Errors are
    /// logged, not propagated, because the caller is a fire-and-forget
    /// network handler rather than the original submitter.
    pub fn receive_transaction(&self, fields: &HashMap<String, String>) {
        let (Some(s), Some(p), Some(o), Some(v), Some(sig_hex)) = (
            fields.get("subject"),
            fields.get("predicate"),
            fields.get("object"),
            fields.get("validator"),
            fields.get("signature"),
        ) else {
            warn!("receive_transaction: missing required field");
            return;
        };
        let signature = match hex::decode(sig_hex) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "receive_transaction: signature is not valid hex");
                return;
            }
        };
        if let Err(e) = self.add_transaction(s, p, o, v, &signature) {
            warn!(error = %e, code = e.code(), "receive_transaction: admission rejected");
        }
    }

    /// Thin passthrough to C2.
    pub fn query(
        &self,
        pattern: &Pattern,
    ) -> Result<Vec<(TransactionId, TransactionNode, Vec<Edge>)>, KylixError> {
        self.state
            .lock()
            .expect("chain actor poisoned")
            .store
            .query(pattern)
    }

    pub fn get_validators(&self) -> Vec<ValidatorId> {
        self.validators.status()
    }

    pub fn add_validator(
        &self,
        id: ValidatorId,
        pk: Vec<u8>,
        vouched_by: &str,
    ) -> Result<(), KylixError> {
        self.validators.add_validator(id, pk, vouched_by)
    }

    /// Test hook: resets the monotonic counter. The counter may only be
    /// rewound when the store is also cleared (spec.md §4.4 "Counter"),
    /// so this clears the store's in-memory tables as part of the same
    /// call rather than leaving that precondition to the caller.
    pub fn reset_tx_count(&self, n: u64) {
        let mut state = self.state.lock().expect("chain actor poisoned");
        state.store.clear_all();
        state.next_id = n;
        state.last_appended_id = None;
        state.seen_hashes.clear();
    }

    /// Test hook: a fixed keypair held by the server, independent of any
    /// registered validator's key.
    pub fn get_test_key_pair(&self) -> &KeyPair {
        &self.test_key_pair
    }
}

//! Escrow store
//!
//! Maps escrow ids to records. Each record sits behind its own mutex, and
//! the map is only held long enough to clone the slot handle, so transitions
//! on different escrows never share a record lock. Creation is serialised by
//! the id allocator.

use std::sync::Arc;

use agentpay_types::{Address, Amount, EscrowError, EscrowId, EscrowRecord, Hash32, Result};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::machine::{self, Transition, TransitionOutcome};

type Slot = Arc<Mutex<EscrowRecord>>;

/// In-process escrow store
pub struct EscrowStore {
    slots: DashMap<EscrowId, Slot>,
    /// Next id to allocate; held for the whole of a create
    next_id: Mutex<u64>,
}

impl EscrowStore {
    /// Create an empty store; the first escrow gets id 0
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_id: Mutex::new(0),
        }
    }

    /// Create and fund a new escrow
    ///
    /// `commit` runs with the candidate record before the id is consumed. It
    /// performs the caller's side effects (locking funds, emitting the
    /// event); if it fails, nothing is stored and the id stays free.
    pub fn create<T, F>(
        &self,
        payer: Address,
        agent: Address,
        amount: Amount,
        task_id: Hash32,
        commit: F,
    ) -> Result<(EscrowRecord, T)>
    where
        F: FnOnce(&EscrowRecord) -> Result<T>,
    {
        machine::validate_create(&agent, amount)?;

        let mut next_id = self.next_id.lock();
        let record = EscrowRecord::new(EscrowId(*next_id), payer, agent, amount, task_id);
        let output = commit(&record)?;

        self.slots.insert(record.id, Arc::new(Mutex::new(record)));
        *next_id += 1;

        Ok((record, output))
    }

    /// Apply a guarded transition to one escrow
    ///
    /// The escrow's lock is held from the precondition check through
    /// `commit` to the state write, so concurrent attempts on the same escrow
    /// are serialised and every loser sees the winner's state. If `commit`
    /// fails the state is left untouched and the error is tagged with the
    /// escrow id.
    pub fn transition<T, F>(
        &self,
        escrow_id: EscrowId,
        caller: &Address,
        transition: Transition,
        commit: F,
    ) -> Result<(EscrowRecord, T)>
    where
        F: FnOnce(&EscrowRecord, &TransitionOutcome) -> Result<T>,
    {
        let slot = self.slot(escrow_id)?;
        let mut record = slot.lock();

        let outcome = machine::apply(&*record, caller, transition)?;
        let output = commit(&*record, &outcome).map_err(|err| err.with_escrow(escrow_id))?;
        record.state = outcome.next;

        Ok((*record, output))
    }

    /// Snapshot of one escrow, `None` if the id was never allocated
    pub fn get(&self, escrow_id: EscrowId) -> Option<EscrowRecord> {
        let slot = self.slot(escrow_id).ok()?;
        let record = *slot.lock();
        Some(record)
    }

    /// Number of escrows created so far
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Id the next successful create will receive
    pub fn next_id(&self) -> EscrowId {
        EscrowId(*self.next_id.lock())
    }

    fn slot(&self, escrow_id: EscrowId) -> Result<Slot> {
        self.slots
            .get(&escrow_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EscrowError::NotFound { escrow_id })
    }
}

impl Default for EscrowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpay_types::{keccak256, EscrowState, TransitionRejection};

    fn payer() -> Address {
        Address::from_label("payer")
    }

    fn agent() -> Address {
        Address::from_label("agent")
    }

    fn create(store: &EscrowStore) -> EscrowRecord {
        store
            .create(payer(), agent(), Amount(100), keccak256(b"task"), |_| Ok(()))
            .unwrap()
            .0
    }

    #[test]
    fn test_ids_are_sequential_from_zero() {
        let store = EscrowStore::new();
        assert_eq!(create(&store).id, EscrowId(0));
        assert_eq!(create(&store).id, EscrowId(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_rejected_create_consumes_no_id() {
        let store = EscrowStore::new();
        let err = store
            .create(payer(), Address::ZERO, Amount(100), Hash32::ZERO, |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, EscrowError::InvalidInput { .. }));

        let err = store
            .create(payer(), agent(), Amount(100), Hash32::ZERO, |_| -> Result<()> {
                Err(EscrowError::unavailable("commit failed"))
            })
            .unwrap_err();
        assert!(err.is_retriable());

        assert!(store.is_empty());
        assert_eq!(store.next_id(), EscrowId(0));
        assert_eq!(create(&store).id, EscrowId(0));
        assert_eq!(store.next_id(), EscrowId(1));
    }

    #[test]
    fn test_unknown_escrow() {
        let store = EscrowStore::new();
        assert_eq!(store.get(EscrowId(7)), None);
        let err = store
            .transition(EscrowId(7), &payer(), Transition::Refund, |_, _| Ok(()))
            .unwrap_err();
        assert_eq!(err, EscrowError::NotFound { escrow_id: EscrowId(7) });
    }

    #[test]
    fn test_failed_commit_leaves_state() {
        let store = EscrowStore::new();
        let id = create(&store).id;

        let err = store
            .transition(id, &payer(), Transition::Refund, |_, _| -> Result<()> {
                Err(EscrowError::TransferFailed {
                    escrow_id: None,
                    from: Address::ZERO,
                    to: payer(),
                    reason: "rejected".to_string(),
                })
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "TRANSFER_FAILED");
        assert_eq!(err.escrow_id(), Some(id));
        assert_eq!(store.get(id).unwrap().state, EscrowState::Pending);
    }

    #[test]
    fn test_proof_is_immutable() {
        let store = EscrowStore::new();
        let id = create(&store).id;
        let first = keccak256(b"first");

        store
            .transition(id, &agent(), Transition::SubmitProof { proof_hash: first }, |_, _| Ok(()))
            .unwrap();
        let err = store
            .transition(
                id,
                &agent(),
                Transition::SubmitProof {
                    proof_hash: keccak256(b"second"),
                },
                |_, _| Ok(()),
            )
            .unwrap_err();

        assert_eq!(err, EscrowError::rejected(id, TransitionRejection::AlreadyCompleted));
        assert_eq!(store.get(id).unwrap().proof_hash(), first);
    }

    #[test]
    fn test_concurrent_release_and_refund_single_winner() {
        let store = Arc::new(EscrowStore::new());
        let id = create(&store).id;
        store
            .transition(
                id,
                &agent(),
                Transition::SubmitProof {
                    proof_hash: keccak256(b"proof"),
                },
                |_, _| Ok(()),
            )
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let transition = if i % 2 == 0 {
                        Transition::Release
                    } else {
                        Transition::Refund
                    };
                    store.transition(id, &payer(), transition, |_, _| Ok(())).is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        assert!(matches!(
            store.get(id).unwrap().state,
            EscrowState::Released { .. }
        ));
    }
}

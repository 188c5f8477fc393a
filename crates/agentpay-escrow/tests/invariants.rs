//! Random interleavings of the escrow transitions against a single escrow.

use agentpay_escrow::{EscrowStore, Transition};
use agentpay_types::{keccak256, Address, Amount, EscrowError, EscrowState, Hash32};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    SubmitProof { by_agent: bool, seed: u8 },
    Release { by_payer: bool },
    Refund { by_payer: bool },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<bool>(), any::<u8>()).prop_map(|(by_agent, seed)| Op::SubmitProof { by_agent, seed }),
        any::<bool>().prop_map(|by_payer| Op::Release { by_payer }),
        any::<bool>().prop_map(|by_payer| Op::Refund { by_payer }),
    ]
}

fn proof(seed: u8) -> Hash32 {
    keccak256(&[b'p', seed])
}

#[derive(Default)]
struct History {
    proof: Option<Hash32>,
    released: bool,
    refunded: bool,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn lifecycle_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let payer = Address::from_label("payer");
        let agent = Address::from_label("agent");
        let stranger = Address::from_label("stranger");

        let store = EscrowStore::new();
        let (record, _) = store
            .create(payer, agent, Amount(1_000), keccak256(b"task"), |_| Ok(()))
            .unwrap();
        let id = record.id;

        let mut history = History::default();

        for op in ops {
            let before = store.get(id).unwrap();
            let (caller, transition) = match op {
                Op::SubmitProof { by_agent, seed } => (
                    if by_agent { agent } else { stranger },
                    Transition::SubmitProof { proof_hash: proof(seed) },
                ),
                Op::Release { by_payer } => (if by_payer { payer } else { stranger }, Transition::Release),
                Op::Refund { by_payer } => (if by_payer { payer } else { stranger }, Transition::Refund),
            };

            let result = store.transition(id, &caller, transition, |_, _| Ok(()));

            match (&result, transition) {
                (Ok(_), Transition::SubmitProof { proof_hash }) => {
                    prop_assert!(history.proof.is_none(), "proof accepted twice");
                    prop_assert!(!history.refunded && !history.released);
                    history.proof = Some(proof_hash);
                }
                (Ok(_), Transition::Release) => {
                    prop_assert!(history.proof.is_some(), "release without proof");
                    prop_assert!(!history.refunded && !history.released);
                    history.released = true;
                }
                (Ok(_), Transition::Refund) => {
                    prop_assert!(history.proof.is_none(), "refund after proof");
                    prop_assert!(!history.refunded && !history.released);
                    history.refunded = true;
                }
                (Err(err), _) => {
                    prop_assert!(matches!(
                        err,
                        EscrowError::Unauthorized { .. } | EscrowError::InvalidStateTransition { .. }
                    ), "unexpected error variant: {:?}", err);
                    prop_assert_eq!(store.get(id).unwrap(), before, "failed call changed state");
                }
            }

            if caller == stranger {
                prop_assert!(result.is_err());
            }

            let after = store.get(id).unwrap();
            let flags = after.state.flags();
            prop_assert!(flags.funded);
            prop_assert!(!(flags.released && flags.refunded));
            prop_assert!(!flags.released || flags.completed);
            prop_assert!(!(flags.refunded && flags.completed));
            prop_assert_eq!(after.proof_hash(), history.proof.unwrap_or(Hash32::ZERO));
            prop_assert_eq!(after.amount, Amount(1_000));
            prop_assert_eq!(after.payer, payer);
            prop_assert_eq!(after.agent, agent);
        }

        let final_state = store.get(id).unwrap().state;
        match final_state {
            EscrowState::Released { .. } => prop_assert!(history.released),
            EscrowState::Refunded => prop_assert!(history.refunded),
            EscrowState::Completed { .. } => prop_assert!(history.proof.is_some()),
            EscrowState::Pending => prop_assert!(history.proof.is_none()),
        }
    }
}

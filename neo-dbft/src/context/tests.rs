use super::*;
use crate::messages::{Commit, ConsensusMessage};
use crate::ChangeViewReason;
use neo_crypto::Keypair;
use proptest::prelude::*;

const NETWORK: u32 = 42;

fn keys(n: usize) -> Vec<Keypair> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| Keypair::generate(&mut rng)).collect()
}

fn context(keys: &[Keypair], my_index: Option<u8>, block_index: u32) -> ConsensusContext {
    let n = keys.len();
    let mut context = ConsensusContext {
        block_index,
        my_index,
        validators: keys.iter().map(|k| k.public_key).collect(),
        preparation_payloads: vec![None; n],
        commit_payloads: vec![None; n],
        change_view_payloads: vec![None; n],
        last_change_view_payloads: vec![None; n],
        ..Default::default()
    };
    context.primary_index = context.primary_index_for(0);
    let m = context.m();
    context.witness_size = Witness {
        invocation_script: vec![0; neo_crypto::script::multisig_invocation_size(m)],
        verification_script: neo_crypto::script::multisig_redeem_script(m, &context.validators)
            .unwrap(),
    }
    .size();
    context
}

fn signed(keys: &[Keypair], index: u8, message: ConsensusMessage) -> Arc<ConsensusPayload> {
    Arc::new(
        ConsensusPayload::sign(0, UInt256::zero(), 10, index, message, &keys[index as usize], NETWORK)
            .unwrap(),
    )
}

fn change_view(keys: &[Keypair], index: u8, view_number: ViewNumber) -> Arc<ConsensusPayload> {
    signed(
        keys,
        index,
        ConsensusMessage::ChangeView(ChangeView {
            view_number,
            timestamp: 0,
            reason: ChangeViewReason::Timeout,
        }),
    )
}

#[test]
fn test_quorum_values() {
    assert_eq!((quorum(1), 1 - quorum(1)), (1, 0));
    assert_eq!((quorum(4), 4 - quorum(4)), (3, 1));
    assert_eq!((quorum(7), 7 - quorum(7)), (5, 2));
    assert_eq!(quorum(0), 0);
}

#[test]
fn test_primary_rotation() {
    let keys = keys(4);
    let ctx = context(&keys, Some(0), 10);
    assert_eq!(ctx.primary_index_for(0), 2);
    assert_eq!(ctx.primary_index_for(1), 1);
    assert_eq!(ctx.primary_index_for(3), 3);

    let ctx = context(&keys, Some(0), 1);
    assert_eq!(ctx.primary_index_for(2), 3);
}

#[test]
fn test_roles() {
    let keys = keys(4);
    let primary = context(&keys, Some(2), 10);
    assert!(primary.is_primary() && !primary.is_backup() && !primary.watch_only());

    let backup = context(&keys, Some(1), 10);
    assert!(backup.is_backup());

    let watcher = context(&keys, None, 10);
    assert!(watcher.watch_only() && !watcher.is_primary() && !watcher.is_backup());
}

#[test]
fn test_view_changing_and_failed_counts() {
    let keys = keys(4);
    let ctx = context(&keys, Some(1), 10);
    // nobody seen yet
    assert_eq!(ctx.count_failed(), 4);
    assert!(ctx.more_than_f_nodes_committed_or_lost());

    let mut ctx = ctx;
    for i in 0..4 {
        ctx = ctx.with_last_seen(i, 10);
    }
    assert_eq!(ctx.count_failed(), 0);

    let ctx = ctx.with_change_view(change_view(&keys, 1, 0)).unwrap();
    assert!(ctx.view_changing());
    assert!(ctx.not_accepting_payloads_due_to_view_changing());

    // two commits push committed + failed above F
    let commit = |i: u8| {
        signed(
            &keys,
            i,
            ConsensusMessage::Commit(Commit {
                view_number: 0,
                signature: vec![0; 64],
            }),
        )
    };
    let ctx = ctx.with_commit(commit(0)).unwrap().with_commit(commit(3)).unwrap();
    assert_eq!(ctx.count_committed(), 2);
    assert!(!ctx.not_accepting_payloads_due_to_view_changing());
    assert!(!ctx.commit_sent());
}

#[test]
fn test_with_view_keeps_matching_change_views() {
    let keys = keys(4);
    let ctx = context(&keys, Some(0), 10)
        .with_change_view(change_view(&keys, 0, 0))
        .unwrap()
        .with_change_view(change_view(&keys, 1, 1))
        .unwrap()
        .with_change_view(change_view(&keys, 2, 1))
        .unwrap();

    let ctx = ctx.with_view(2);
    assert_eq!(ctx.view_number, 2);
    assert_eq!(ctx.primary_index, 0);
    assert!(ctx.is_primary());
    assert!(ctx.last_change_view_payloads[0].is_none());
    assert!(ctx.last_change_view_payloads[1].is_some());
    assert!(ctx.last_change_view_payloads[2].is_some());
    assert_eq!(ctx.last_seen_message.get(&keys[0].public_key), Some(&10));
    assert!(ctx.preparation_payloads.iter().all(Option::is_none));
    assert_eq!(ctx.phase, ConsensusPhase::Initial);
}

#[test]
fn test_slot_index_checked() {
    let keys = keys(4);
    let other = self::keys(5);
    let ctx = context(&keys, Some(0), 10);
    let stray = change_view(&other, 4, 0);
    assert!(matches!(
        ctx.with_change_view(stray),
        Err(ConsensusError::InvariantViolation { .. })
    ));
}

#[test]
fn test_create_block_requires_quorum() {
    let keys = keys(4);
    let ctx = context(&keys, Some(2), 10)
        .with_proposal(Proposal::new(1, 2, vec![]))
        .unwrap();
    assert!(ctx.is_primary());
    assert_eq!(ctx.phase.name(), "RequestSent");

    let header = ctx.ensure_header().unwrap();
    let sign_data = header.sign_data(NETWORK).unwrap();
    let mut ctx = ctx;
    for i in [3u8, 0] {
        let signature = neo_crypto::Secp256r1Sign::secp256r1_sign(
            &keys[i as usize].private_key,
            &sign_data,
        )
        .unwrap();
        ctx = ctx
            .with_commit(signed(
                &keys,
                i,
                ConsensusMessage::Commit(Commit {
                    view_number: 0,
                    signature: signature.to_vec(),
                }),
            ))
            .unwrap();
    }
    assert!(ctx.create_block().is_err());

    let ctx = ctx
        .with_commit(signed(
            &keys,
            1,
            ConsensusMessage::Commit(Commit {
                view_number: 0,
                signature: vec![9; 64],
            }),
        ))
        .unwrap();
    let block = ctx.create_block().unwrap();
    assert_eq!(block.index(), 10);
    assert_eq!(block.header.witness.invocation_script.len(), 3 * 66);
    assert_eq!(block.size().unwrap(), ctx.expected_block_size().unwrap());
}

proptest! {
    #[test]
    fn prop_quorum_tolerates_f(n in 1usize..200) {
        let m = quorum(n);
        let f = n - m;
        prop_assert!(m > 2 * n / 3 || n < 4);
        prop_assert!(3 * f < n);
        prop_assert_eq!(f, (n - 1) / 3);
    }
}

//! End-to-end wallet scenarios
//!
//! Every scenario runs against both policy variants through the same generic
//! ledger, with members {admin, p1, p2} and threshold 2.

use std::sync::Arc;

use bytes::Bytes;
use custodia_common::{AccessError, CustodiaError, LedgerError, Principal, RegistryError};
use custodia_quorum::{
    AdminRegistry, ExtendedWallet, FixedRegistry, FixedWallet, LedgerBuilder, PrincipalRegistry,
    QuorumLedger, RecordingExecutor,
};

fn admin() -> Principal {
    Principal::new("0xadmin")
}

fn p1() -> Principal {
    Principal::new("0xp1")
}

fn p2() -> Principal {
    Principal::new("0xp2")
}

fn stranger() -> Principal {
    Principal::new("0xstranger")
}

fn ledger<R: PrincipalRegistry>(executor: Arc<RecordingExecutor>) -> QuorumLedger<R> {
    LedgerBuilder::new()
        .executor(executor)
        .create(admin(), vec![p1(), p2()], 2)
        .unwrap()
}

fn is_unauthorized<T>(result: &custodia_common::Result<T>) -> bool {
    matches!(result, Err(e) if e.is_unauthorized())
}

fn is_already_executed<T>(result: &custodia_common::Result<T>) -> bool {
    matches!(result, Err(CustodiaError::Ledger(LedgerError::AlreadyExecuted(_))))
}

// ============ SCENARIO A: HAPPY PATH ============

fn happy_path<R: PrincipalRegistry>() {
    let executor = Arc::new(RecordingExecutor::new());
    let ledger = ledger::<R>(executor.clone());

    let id = ledger.submit(&admin(), p2(), 10, vec![0x12, 0x34]).unwrap();
    assert_eq!(id.0, 0);
    assert_eq!(ledger.action(id).unwrap().approval_count(), 0);

    assert_eq!(ledger.approve(&admin(), id).unwrap(), 1);
    assert_eq!(ledger.approve(&p1(), id).unwrap(), 2);

    ledger.execute(&p2(), id).unwrap();

    let action = ledger.action(id).unwrap();
    assert!(action.executed);
    assert!(!action.denied);

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, p2());
    assert_eq!(calls[0].value, 10);
    assert_eq!(calls[0].payload.as_ref(), &[0x12, 0x34]);
}

#[test]
fn test_happy_path_fixed() {
    happy_path::<FixedRegistry>();
}

#[test]
fn test_happy_path_extended() {
    happy_path::<AdminRegistry>();
}

// ============ SCENARIO B: QUORUM NOT MET ============

fn quorum_not_met<R: PrincipalRegistry>() {
    let executor = Arc::new(RecordingExecutor::new());
    let ledger = ledger::<R>(executor.clone());

    let id = ledger.submit(&admin(), p2(), 10, vec![0x12, 0x34]).unwrap();
    ledger.approve(&admin(), id).unwrap();

    let result = ledger.execute(&admin(), id);
    assert!(matches!(
        result,
        Err(CustodiaError::Ledger(LedgerError::QuorumNotMet { .. }))
    ));
    assert!(!ledger.action(id).unwrap().executed);
    assert_eq!(executor.call_count(), 0);
}

#[test]
fn test_quorum_not_met_fixed() {
    quorum_not_met::<FixedRegistry>();
}

#[test]
fn test_quorum_not_met_extended() {
    quorum_not_met::<AdminRegistry>();
}

// ============ SCENARIO C: NON-MEMBER CALLER ============

fn non_member_rejected<R: PrincipalRegistry>() {
    let executor = Arc::new(RecordingExecutor::new());
    let ledger = ledger::<R>(executor.clone());

    let id = ledger.submit(&admin(), p2(), 10, Bytes::new()).unwrap();
    ledger.approve(&admin(), id).unwrap();
    ledger.approve(&p1(), id).unwrap();
    let before = ledger.action(id).unwrap();

    assert!(is_unauthorized(&ledger.submit(&stranger(), p2(), 1, Bytes::new())));
    assert!(is_unauthorized(&ledger.approve(&stranger(), id)));
    assert!(is_unauthorized(&ledger.execute(&stranger(), id)));

    assert_eq!(ledger.action_count(), 1);
    assert_eq!(ledger.action(id).unwrap(), before);
    assert!(!ledger.is_authorized(&stranger()));
    assert_eq!(executor.call_count(), 0);
}

#[test]
fn test_non_member_rejected_fixed() {
    non_member_rejected::<FixedRegistry>();
}

#[test]
fn test_non_member_rejected_extended() {
    non_member_rejected::<AdminRegistry>();
}

// ============ SCENARIO D: TERMINAL ACTION ============

fn executed_is_terminal<R: PrincipalRegistry>() {
    let executor = Arc::new(RecordingExecutor::new());
    let ledger: QuorumLedger<R> = LedgerBuilder::new()
        .executor(executor.clone())
        .create(admin(), vec![p1(), p2()], 1)
        .unwrap();

    let id = ledger.submit(&admin(), p2(), 10, Bytes::new()).unwrap();
    ledger.approve(&admin(), id).unwrap();
    ledger.execute(&admin(), id).unwrap();
    let snapshot = ledger.action(id).unwrap();

    assert!(is_already_executed(&ledger.approve(&p1(), id)));
    assert!(is_already_executed(&ledger.revoke(&admin(), id)));
    assert!(is_already_executed(&ledger.execute(&admin(), id)));

    assert_eq!(ledger.action(id).unwrap(), snapshot);
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn test_executed_is_terminal_fixed() {
    executed_is_terminal::<FixedRegistry>();
}

#[test]
fn test_executed_is_terminal_extended() {
    executed_is_terminal::<AdminRegistry>();
}

// ============ SCENARIO E: REMOVED MEMBER'S APPROVAL SURVIVES ============

#[test]
fn test_removed_member_approval_still_counts() {
    let executor = Arc::new(RecordingExecutor::new());
    let ledger = ledger::<AdminRegistry>(executor.clone());

    let id = ledger.submit(&admin(), p2(), 10, Bytes::new()).unwrap();
    ledger.approve(&p1(), id).unwrap();

    ledger.remove_member(&admin(), &p1()).unwrap();
    assert!(!ledger.is_authorized(&p1()));

    let action = ledger.action(id).unwrap();
    assert_eq!(action.approval_count(), 1);
    assert!(action.is_approved_by(&p1()));

    ledger.approve(&admin(), id).unwrap();
    ledger.execute(&admin(), id).unwrap();
    assert!(ledger.action(id).unwrap().executed);
}

#[test]
fn test_removed_member_cannot_approve_further() {
    let ledger = ledger::<AdminRegistry>(Arc::new(RecordingExecutor::new()));
    ledger.remove_member(&admin(), &p1()).unwrap();

    let id = ledger.submit(&admin(), p2(), 10, Bytes::new()).unwrap();
    assert!(is_unauthorized(&ledger.approve(&p1(), id)));
}

// ============ VARIANT SHAPE ============

#[test]
fn test_member_counts() {
    let fixed = FixedWallet::new(admin(), vec![p1(), p2()], 2).unwrap();
    assert_eq!(fixed.member_count(), 3);
    assert_eq!(fixed.administrator(), None);

    // creator listed again collapses into one membership
    let fixed = FixedWallet::new(admin(), vec![admin(), p1(), p1()], 1).unwrap();
    assert_eq!(fixed.member_count(), 2);

    // administrator is added on top of the initial list
    let extended = ExtendedWallet::new(admin(), vec![p1(), p2()], 2).unwrap();
    assert_eq!(extended.member_count(), 3);
    assert_eq!(extended.administrator(), Some(admin()));
}

#[test]
fn test_only_administrator_manages_wallet() {
    let wallet = ExtendedWallet::new(admin(), vec![p1(), p2()], 2).unwrap();
    let members = wallet.members();

    for caller in [p1(), p2(), stranger()] {
        assert!(is_unauthorized(&wallet.add_member(&caller, Principal::new("0xp3"))));
        assert!(is_unauthorized(&wallet.remove_member(&caller, &p2())));
        assert!(matches!(
            wallet.change_threshold(&caller, 1),
            Err(CustodiaError::Access(AccessError::NotAdministrator { .. }))
        ));
    }

    assert_eq!(wallet.members(), members);
    assert_eq!(wallet.threshold(), 2);
}

#[test]
fn test_membership_errors() {
    let wallet = ExtendedWallet::new(admin(), vec![p1()], 1).unwrap();

    assert!(matches!(
        wallet.add_member(&admin(), p1()),
        Err(CustodiaError::Registry(RegistryError::AlreadyMember(_)))
    ));
    assert!(matches!(
        wallet.remove_member(&admin(), &stranger()),
        Err(CustodiaError::Registry(RegistryError::NotMember(_)))
    ));
    assert!(matches!(
        wallet.remove_member(&admin(), &admin()),
        Err(CustodiaError::Registry(RegistryError::CannotRemoveAdministrator(_)))
    ));
    assert_eq!(wallet.member_count(), 2);
}

#[test]
fn test_threshold_snapshot() {
    let wallet = ExtendedWallet::new(admin(), vec![p1(), p2()], 2).unwrap();
    let first = wallet.submit(&admin(), p2(), 1, Bytes::new()).unwrap();

    wallet.change_threshold(&admin(), 5).unwrap();
    let second = wallet.submit(&admin(), p2(), 1, Bytes::new()).unwrap();

    assert_eq!(wallet.action(first).unwrap().required_approvals, 2);
    assert_eq!(wallet.action(second).unwrap().required_approvals, 5);

    wallet.approve(&admin(), first).unwrap();
    wallet.approve(&p1(), first).unwrap();
    wallet.execute(&admin(), first).unwrap();

    // threshold above the member count is accepted but unreachable
    for member in [admin(), p1(), p2()] {
        wallet.approve(&member, second).unwrap();
    }
    assert!(matches!(
        wallet.execute(&admin(), second),
        Err(CustodiaError::Ledger(LedgerError::QuorumNotMet { approvals: 3, required: 5, .. }))
    ));
}

#[test]
fn test_lookup_of_missing_action() {
    let wallet = FixedWallet::new(admin(), vec![p1()], 1).unwrap();
    let missing = custodia_common::ActionId(3);

    assert!(matches!(
        wallet.action(missing),
        Err(CustodiaError::Ledger(LedgerError::ActionNotFound(_)))
    ));
    assert!(matches!(
        wallet.revoke(&p1(), missing),
        Err(CustodiaError::Ledger(LedgerError::ActionNotFound(_)))
    ));
    assert!(matches!(
        wallet.execute(&p1(), missing),
        Err(CustodiaError::Ledger(LedgerError::ActionNotFound(_)))
    ));
}

mod common;

use std::sync::Arc;

use chrono::Duration;
use progress_core::model::{Path, RemoteId, RemoteRecord, SnapshotRecord};
use progress_core::time::fixed_now;
use services::sync::SyncAction;
use services::{
    AuthService, AuthSession, Clock, NodeSyncOutcome, RemoteCall, SyncError, SyncStart,
};

use common::{built, course_with_unit, node, set_completed, signed_in, sync_service};

fn reading() -> Path {
    Path::from([1, 1, 0])
}

#[tokio::test]
async fn completed_node_converges_after_one_create() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    set_completed(&mut ctx, &reading(), Some(fixed_now()));
    let outcome = sync.sync_node(&mut ctx, &reading()).await.unwrap();

    let NodeSyncOutcome::Created(id) = outcome else {
        panic!("expected create, got {outcome:?}");
    };
    let synced = node(&ctx, &reading());
    assert_eq!(synced.remote_id(), Some(id));
    assert!(!synced.is_dirty());
    assert!(!synced.is_in_flight());

    let again = sync.sync_node(&mut ctx, &reading()).await.unwrap();
    assert_eq!(again, NodeSyncOutcome::Clean);
    assert_eq!(remote.calls(), vec![RemoteCall::Create(reading())]);
    assert_eq!(remote.records().len(), 1);
}

#[tokio::test]
async fn failed_update_keeps_node_dirty_and_id_unchanged() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    let id = remote.seed(reading(), fixed_now());
    ctx.tree_mut().unwrap().merge_record(&SnapshotRecord {
        path: reading(),
        completed_on: fixed_now(),
        remote_id: Some(id),
    });
    let later = fixed_now() + Duration::hours(1);
    set_completed(&mut ctx, &reading(), Some(later));

    remote.fail_next(SyncError::Transport("connection reset".into()));
    let err = sync.sync_node(&mut ctx, &reading()).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert!(err.is_transient());

    let failed = node(&ctx, &reading());
    assert!(failed.is_dirty());
    assert!(!failed.is_in_flight());
    assert_eq!(failed.remote_id(), Some(id));

    let retried = sync.sync_node(&mut ctx, &reading()).await.unwrap();
    assert_eq!(retried, NodeSyncOutcome::Updated(id));
    assert!(!node(&ctx, &reading()).is_dirty());
    assert_eq!(remote.records()[0].completed_on, later);
}

#[tokio::test]
async fn cleared_node_deletes_its_remote_record() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    set_completed(&mut ctx, &reading(), Some(fixed_now()));
    sync.sync_node(&mut ctx, &reading()).await.unwrap();
    set_completed(&mut ctx, &reading(), None);

    let outcome = sync.sync_node(&mut ctx, &reading()).await.unwrap();
    assert_eq!(outcome, NodeSyncOutcome::Deleted);
    let cleared = node(&ctx, &reading());
    assert_eq!(cleared.remote_id(), None);
    assert!(!cleared.is_dirty());
    assert!(remote.records().is_empty());
}

#[tokio::test]
async fn incomplete_unsynced_node_settles_without_remote_call() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    set_completed(&mut ctx, &reading(), Some(fixed_now()));
    set_completed(&mut ctx, &reading(), None);

    let outcome = sync.sync_node(&mut ctx, &reading()).await.unwrap();
    assert_eq!(outcome, NodeSyncOutcome::SettledLocally);
    assert!(!node(&ctx, &reading()).is_dirty());
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn fetch_skips_records_without_a_local_node() {
    let course = course_with_unit(2);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    let later = fixed_now() + Duration::minutes(30);
    remote.seed_record(RemoteRecord {
        id: RemoteId::new(42),
        path: Path::from([1, 1, 0]),
        completed_on: later,
    });
    remote.seed_record(RemoteRecord {
        id: RemoteId::new(43),
        path: Path::from([2, 1, 1]),
        completed_on: later,
    });
    set_completed(&mut ctx, &Path::from([2, 1, 1]), Some(fixed_now()));

    let merged = sync.fetch_all(&mut ctx).await.unwrap();
    assert_eq!(merged, 1);

    let lab = node(&ctx, &Path::from([2, 1, 1]));
    assert_eq!(lab.completed_on(), Some(later));
    assert_eq!(lab.remote_id(), Some(RemoteId::new(43)));
    assert!(!lab.is_dirty());
    assert!(ctx.tree().unwrap().lookup(&Path::from([1, 1, 0])).is_none());
}

#[tokio::test]
async fn second_begin_on_in_flight_node_is_rejected() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    set_completed(&mut ctx, &reading(), Some(fixed_now()));
    let SyncStart::Pending(ticket) = sync.begin(&mut ctx, &reading()).unwrap() else {
        panic!("expected a pending ticket");
    };
    assert_eq!(
        ticket.action(),
        &SyncAction::Create {
            completed_on: fixed_now()
        }
    );
    assert!(node(&ctx, &reading()).is_in_flight());

    assert!(matches!(
        sync.begin(&mut ctx, &reading()),
        Err(SyncError::InFlight(path)) if path == reading()
    ));
    let report = sync.sync_dirty(&mut ctx).await.unwrap();
    assert_eq!(report.attempted(), 0);
    assert!(remote.calls().is_empty());

    let completion = ticket.execute(sync.remote()).await;
    let outcome = sync.apply(&mut ctx, completion).unwrap();
    assert!(matches!(outcome, NodeSyncOutcome::Created(_)));
    assert!(!node(&ctx, &reading()).is_in_flight());
}

#[tokio::test]
async fn result_from_reset_tree_is_discarded() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    set_completed(&mut ctx, &reading(), Some(fixed_now()));
    let SyncStart::Pending(ticket) = sync.begin(&mut ctx, &reading()).unwrap() else {
        panic!("expected a pending ticket");
    };

    ctx.reset();
    ctx.build(&course).unwrap();

    let completion = ticket.execute(sync.remote()).await;
    assert!(completion.is_success());
    assert_eq!(
        sync.apply(&mut ctx, completion).unwrap(),
        NodeSyncOutcome::Discarded
    );

    let fresh = node(&ctx, &reading());
    assert_eq!(fresh.remote_id(), None);
    assert!(!fresh.is_dirty());
    assert!(!fresh.is_in_flight());
}

#[tokio::test]
async fn change_during_flight_keeps_node_dirty_then_converges() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    set_completed(&mut ctx, &reading(), Some(fixed_now()));
    let SyncStart::Pending(ticket) = sync.begin(&mut ctx, &reading()).unwrap() else {
        panic!("expected a pending ticket");
    };
    set_completed(&mut ctx, &reading(), None);

    let completion = ticket.execute(sync.remote()).await;
    let NodeSyncOutcome::Created(id) = sync.apply(&mut ctx, completion).unwrap() else {
        panic!("expected create");
    };
    let pending = node(&ctx, &reading());
    assert_eq!(pending.remote_id(), Some(id));
    assert!(pending.is_dirty());

    assert_eq!(
        sync.sync_node(&mut ctx, &reading()).await.unwrap(),
        NodeSyncOutcome::Deleted
    );
    assert!(remote.records().is_empty());
    assert!(!node(&ctx, &reading()).is_dirty());
}

#[tokio::test]
async fn missing_and_expired_credentials_are_distinct() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    set_completed(&mut ctx, &reading(), Some(fixed_now()));

    let signed_out = sync_service(&remote, &AuthSession::new());
    let err = signed_out.sync_node(&mut ctx, &reading()).await.unwrap_err();
    assert!(matches!(err, SyncError::Unauthenticated));
    assert!(!node(&ctx, &reading()).is_in_flight());

    remote.revoke_sessions();
    let sync = sync_service(&remote, &session);
    let err = sync.sync_node(&mut ctx, &reading()).await.unwrap_err();
    assert!(matches!(err, SyncError::AuthExpired));
    assert!(err.needs_login());
    assert!(!session.is_signed_in());

    let still_dirty = node(&ctx, &reading());
    assert!(still_dirty.is_dirty());
    assert_eq!(still_dirty.remote_id(), None);
}

#[tokio::test]
async fn sync_dirty_reports_per_path_and_retries_failures() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    for section in 0..3 {
        set_completed(&mut ctx, &Path::from([1, 1, section]), Some(fixed_now()));
    }
    remote.fail_next(SyncError::Transport("timeout".into()));

    let first = sync.sync_dirty(&mut ctx).await.unwrap();
    assert_eq!(first.synced.len(), 2);
    assert_eq!(first.failed.len(), 1);
    assert!(!first.is_clean());

    let second = sync.sync_dirty(&mut ctx).await.unwrap();
    assert_eq!(second.synced.len(), 1);
    assert!(second.is_clean());

    let tree = ctx.tree().unwrap();
    assert!(tree.dirty_nodes().is_empty());
    assert_eq!(remote.records().len(), 3);
}

#[tokio::test]
async fn sync_without_tree_or_for_unknown_path_fails() {
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);
    let mut ctx = progress_core::progress::ProgressContext::new();

    assert!(matches!(
        sync.sync_dirty(&mut ctx).await,
        Err(SyncError::NotBuilt)
    ));
    assert!(matches!(
        sync.fetch_all(&mut ctx).await,
        Err(SyncError::NotBuilt)
    ));

    let course = course_with_unit(1);
    ctx.build(&course).unwrap();
    assert!(matches!(
        sync.sync_node(&mut ctx, &Path::from([7, 7, 7])).await,
        Err(SyncError::UnknownPath(_))
    ));
}

#[tokio::test]
async fn login_verify_and_logout() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let remote = services::InMemoryRemote::new().with_account(common::EMAIL, "secret");
    let session = AuthSession::new();
    let auth = AuthService::new(
        Clock::fixed(fixed_now()),
        Arc::new(remote.clone()),
        session.clone(),
    );

    assert!(matches!(auth.verify().await, Err(SyncError::Unauthenticated)));
    assert!(matches!(
        auth.login(common::EMAIL, "wrong").await,
        Err(SyncError::LoginRejected)
    ));

    auth.login(common::EMAIL, "secret").await.unwrap();
    assert_eq!(auth.verify().await.unwrap(), common::EMAIL);

    let generation = ctx.generation();
    auth.logout(&mut ctx);
    assert!(!session.is_signed_in());
    assert!(!ctx.is_built());
    assert_eq!(ctx.generation(), generation + 1);
}

#[tokio::test]
async fn rejected_update_or_delete_keeps_node_dirty_and_id_unchanged() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    let id = remote.seed(reading(), fixed_now());
    ctx.tree_mut().unwrap().merge_record(&SnapshotRecord {
        path: reading(),
        completed_on: fixed_now(),
        remote_id: Some(id),
    });

    set_completed(&mut ctx, &reading(), Some(fixed_now() + Duration::hours(2)));
    remote.fail_next(SyncError::Conflict("progress was changed elsewhere".into()));
    let err = sync.sync_node(&mut ctx, &reading()).await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));
    assert!(!err.is_transient());
    let after_update = node(&ctx, &reading());
    assert!(after_update.is_dirty());
    assert!(!after_update.is_in_flight());
    assert_eq!(after_update.remote_id(), Some(id));

    set_completed(&mut ctx, &reading(), None);
    remote.fail_next(SyncError::NotFound(format!("progress {id}")));
    let err = sync.sync_node(&mut ctx, &reading()).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
    let after_delete = node(&ctx, &reading());
    assert!(after_delete.is_dirty());
    assert!(!after_delete.is_in_flight());
    assert_eq!(after_delete.remote_id(), Some(id));
    assert_eq!(after_delete.completed_on(), None);

    assert_eq!(remote.records().len(), 1);
    assert_eq!(
        remote.calls(),
        vec![RemoteCall::Update(id), RemoteCall::Delete(id)]
    );
}

#[tokio::test]
async fn failed_fetch_leaves_tree_untouched() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let (remote, session) = signed_in();
    let sync = sync_service(&remote, &session);

    ctx.tree_mut().unwrap().merge_record(&SnapshotRecord {
        path: reading(),
        completed_on: fixed_now(),
        remote_id: Some(RemoteId::new(11)),
    });
    set_completed(&mut ctx, &Path::from([1, 1, 1]), Some(fixed_now()));
    remote.seed_record(RemoteRecord {
        id: RemoteId::new(12),
        path: Path::from([1, 1, 2]),
        completed_on: fixed_now() + Duration::days(1),
    });

    let leaves = || {
        (0..3)
            .map(|section| Path::from([1, 1, section]))
            .collect::<Vec<_>>()
    };
    let state = |ctx: &progress_core::progress::ProgressContext| {
        leaves()
            .iter()
            .map(|path| {
                let n = node(ctx, path);
                (n.completed_on(), n.remote_id(), n.is_dirty())
            })
            .collect::<Vec<_>>()
    };
    let before = state(&ctx);

    remote.fail_next(SyncError::Decode("missing field `path`".into()));
    assert!(matches!(
        sync.fetch_all(&mut ctx).await,
        Err(SyncError::Decode(_))
    ));
    assert_eq!(state(&ctx), before);
    assert!(session.is_signed_in());

    remote.revoke_sessions();
    assert!(matches!(
        sync.fetch_all(&mut ctx).await,
        Err(SyncError::AuthExpired)
    ));
    assert_eq!(state(&ctx), before);
    assert!(!session.is_signed_in());
}

#[tokio::test]
async fn signed_out_sync_dirty_still_settles_local_changes() {
    let course = course_with_unit(1);
    let mut ctx = built(&course);
    let remote = services::InMemoryRemote::new();
    let sync = sync_service(&remote, &AuthSession::new());

    set_completed(&mut ctx, &reading(), Some(fixed_now()));
    set_completed(&mut ctx, &reading(), None);

    let report = sync.sync_dirty(&mut ctx).await.unwrap();
    assert_eq!(
        report.synced,
        vec![(reading(), NodeSyncOutcome::SettledLocally)]
    );
    assert!(report.is_clean());
    assert!(!node(&ctx, &reading()).is_dirty());

    let lab = Path::from([1, 1, 1]);
    let review = Path::from([1, 1, 2]);
    set_completed(&mut ctx, &lab, Some(fixed_now()));
    set_completed(&mut ctx, &review, Some(fixed_now()));
    set_completed(&mut ctx, &review, None);

    assert!(matches!(
        sync.sync_dirty(&mut ctx).await,
        Err(SyncError::Unauthenticated)
    ));
    assert!(node(&ctx, &lab).is_dirty());
    assert!(!node(&ctx, &lab).is_in_flight());
    assert!(!node(&ctx, &review).is_dirty());
    assert!(remote.calls().is_empty());
}

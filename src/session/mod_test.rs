use super::*;

fn identity(uid: &str) -> Identity {
    Identity { uid: uid.into(), email: None, id_token: format!("tok-{uid}") }
}

// =============================================================================
// Defaults and views
// =============================================================================

#[test]
fn default_session_is_loading() {
    let session = Session::default();
    assert_eq!(session.view(), SessionView::Loading);
    assert!(!session.is_resolved());
    assert_eq!(session.generation, 0);
}

#[test]
fn begin_without_identity_is_unauthenticated() {
    let mut session = Session::default();
    let generation = session.begin(None);
    assert_eq!(generation, 1);
    assert_eq!(session.view(), SessionView::Unauthenticated);
}

#[test]
fn begin_with_identity_is_loading() {
    let mut session = Session::default();
    session.begin(Some(identity("a")));
    assert_eq!(session.view(), SessionView::Loading);
    assert_eq!(session.uid(), Some("a"));
}

#[test]
fn begin_clears_previous_role() {
    let mut session = Session::default();
    let g = session.begin(Some(identity("a")));
    session.apply_lookup(g, LookupOutcome::Found(Profile::new("a", Role::Admin)));
    session.begin(Some(identity("b")));
    assert!(session.role.is_none());
    assert!(session.profile.is_none());
}

// =============================================================================
// apply_lookup
// =============================================================================

#[test]
fn found_profile_resolves_with_role() {
    let mut session = Session::default();
    let g = session.begin(Some(identity("a")));
    assert!(session.apply_lookup(g, LookupOutcome::Found(Profile::new("a", Role::Doctor))));
    match session.view() {
        SessionView::Authenticated { identity, role } => {
            assert_eq!(identity.uid, "a");
            assert_eq!(role, Some(Role::Doctor));
        }
        other => panic!("unexpected view: {other:?}"),
    }
}

#[test]
fn missing_profile_resolves_without_role() {
    let mut session = Session::default();
    let g = session.begin(Some(identity("a")));
    assert!(session.apply_lookup(g, LookupOutcome::Missing));
    assert!(session.is_resolved());
    assert!(session.role.is_none());
    assert!(session.identity.is_some());
}

#[test]
fn failed_lookup_resolves_without_role() {
    let mut session = Session::default();
    let g = session.begin(Some(identity("a")));
    assert!(session.apply_lookup(g, LookupOutcome::Failed));
    assert!(session.is_resolved());
    assert!(session.role.is_none());
}

#[test]
fn stale_generation_is_rejected() {
    let mut session = Session::default();
    let g_a = session.begin(Some(identity("a")));
    let g_b = session.begin(Some(identity("b")));

    assert!(!session.apply_lookup(g_a, LookupOutcome::Found(Profile::new("a", Role::Admin))));
    assert_eq!(session.view(), SessionView::Loading);
    assert!(session.role.is_none());

    assert!(session.apply_lookup(g_b, LookupOutcome::Found(Profile::new("b", Role::Patient))));
    assert_eq!(session.role, Some(Role::Patient));
}

#[test]
fn stale_lookup_after_newer_resolution_is_rejected() {
    let mut session = Session::default();
    let g_a = session.begin(Some(identity("a")));
    let g_b = session.begin(Some(identity("b")));
    session.apply_lookup(g_b, LookupOutcome::Found(Profile::new("b", Role::Patient)));

    assert!(!session.apply_lookup(g_a, LookupOutcome::Found(Profile::new("a", Role::Admin))));
    assert_eq!(session.role, Some(Role::Patient));
    assert_eq!(session.uid(), Some("b"));
}

#[test]
fn lookup_after_sign_out_is_rejected() {
    let mut session = Session::default();
    let g_a = session.begin(Some(identity("a")));
    session.begin(None);
    assert!(!session.apply_lookup(g_a, LookupOutcome::Found(Profile::new("a", Role::Admin))));
    assert_eq!(session.view(), SessionView::Unauthenticated);
}

#[test]
fn same_generation_snapshot_updates_role() {
    let mut session = Session::default();
    let g = session.begin(Some(identity("a")));
    session.apply_lookup(g, LookupOutcome::Found(Profile::new("a", Role::Patient)));
    assert!(session.apply_lookup(g, LookupOutcome::Found(Profile::new("a", Role::Doctor))));
    assert_eq!(session.role, Some(Role::Doctor));
}

// =============================================================================
// Capabilities through the session
// =============================================================================

#[test]
fn can_is_false_while_loading() {
    let mut session = Session::default();
    session.begin(Some(identity("a")));
    assert!(!session.can(Capability::ManageDoctors));
}

#[test]
fn can_follows_resolved_role() {
    let mut session = Session::default();
    let g = session.begin(Some(identity("a")));
    session.apply_lookup(g, LookupOutcome::Found(Profile::new("a", Role::Doctor)));
    assert!(session.can(Capability::CancelAppointment));
    assert!(!session.can(Capability::ManageDoctors));
}

#[test]
fn can_is_false_with_unknown_role() {
    let mut session = Session::default();
    let g = session.begin(Some(identity("a")));
    session.apply_lookup(g, LookupOutcome::Missing);
    for cap in Capability::ALL {
        assert!(!session.can(cap));
    }
}

// =============================================================================
// SessionHandle
// =============================================================================

#[tokio::test]
async fn handle_resolved_waits_for_resolution() {
    let (tx, rx) = watch::channel(Session::default());
    let handle = SessionHandle::from_receiver(rx);
    assert!(!handle.current().is_resolved());

    let waiter = tokio::spawn({
        let handle = handle.clone();
        async move { handle.resolved().await }
    });
    tx.send_modify(|s| {
        s.begin(None);
    });
    let session = waiter.await.unwrap();
    assert_eq!(session.view(), SessionView::Unauthenticated);
}

#[tokio::test]
async fn handle_resolved_returns_last_value_when_sender_gone() {
    let (tx, rx) = watch::channel(Session::default());
    let handle = SessionHandle::from_receiver(rx);
    drop(tx);
    assert!(!handle.resolved().await.is_resolved());
}

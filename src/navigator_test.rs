use super::*;
use crate::identity::Identity;
use crate::profile::Profile;
use crate::role::Role;
use crate::session::LookupOutcome;

fn identity(uid: &str) -> Identity {
    Identity { uid: uid.into(), email: None, id_token: format!("tok-{uid}") }
}

fn signed_in(uid: &str, role: Option<Role>) -> Session {
    let mut session = Session::default();
    let generation = session.begin(Some(identity(uid)));
    let outcome = role.map_or(LookupOutcome::Missing, |r| LookupOutcome::Found(Profile::new(uid, r)));
    session.apply_lookup(generation, outcome);
    session
}

fn signed_out() -> Session {
    let mut session = Session::default();
    session.begin(None);
    session
}

fn navigator(initial: Session) -> (watch::Sender<Session>, Navigator) {
    let (tx, rx) = watch::channel(initial);
    let nav = Navigator::new(RouteTable::clinic(), Authorizer::default(), SessionHandle::from_receiver(rx));
    (tx, nav)
}

// =============================================================================
// navigate
// =============================================================================

#[test]
fn allowed_route_renders_view_with_params() {
    let (_tx, mut nav) = navigator(signed_in("d", Some(Role::Doctor)));
    let outcome = nav.navigate("/pacientes/p-1");
    assert_eq!(outcome.view_name(), Some("patient_detail"));
    match &outcome {
        Outcome::View { params, .. } => assert_eq!(params.get("id").map(String::as_str), Some("p-1")),
        other => panic!("unexpected outcome {other}"),
    }
    assert_eq!(nav.current_path(), "/pacientes/p-1");
}

#[test]
fn pending_session_shows_loading_at_requested_path() {
    let (_tx, mut nav) = navigator(Session::default());
    let outcome = nav.navigate("/medicos");
    assert_eq!(outcome, Outcome::Loading { path: "/medicos".into() });
    assert_eq!(nav.current_path(), "/medicos");
    assert!(nav.return_to().is_none());
}

#[test]
fn signed_out_lands_on_login_and_remembers_path() {
    let (_tx, mut nav) = navigator(signed_out());
    let outcome = nav.navigate("/agenda?week=2");
    assert_eq!(outcome.view_name(), Some("login"));
    assert_eq!(outcome.path(), "/login");
    assert_eq!(nav.return_to(), Some("/agenda"));
    assert_eq!(nav.take_return_to().as_deref(), Some("/agenda"));
    assert!(nav.return_to().is_none());
}

#[test]
fn login_redirect_chain_keeps_first_requested_path() {
    let (_tx, rx) = watch::channel(signed_out());
    let mut nav =
        Navigator::new(RouteTable::clinic(), Authorizer::new("/entrar", "/"), SessionHandle::from_receiver(rx));
    let outcome = nav.navigate("/agenda");
    assert!(matches!(outcome, Outcome::Blocked { .. }));
    assert_eq!(nav.return_to(), Some("/agenda"));
}

#[test]
fn patient_denied_admin_route_lands_on_root_view() {
    let (_tx, mut nav) = navigator(signed_in("p", Some(Role::Patient)));
    let outcome = nav.navigate("/medicos");
    assert_eq!(outcome.view_name(), Some("patients_home"));
    assert_eq!(outcome.path(), "/");
}

#[test]
fn unknown_path_falls_back_to_root() {
    let (_tx, mut nav) = navigator(signed_in("a", Some(Role::Admin)));
    let outcome = nav.navigate("/financeiro");
    assert_eq!(outcome.view_name(), Some("patients_home"));
}

#[test]
fn unknown_role_on_landing_is_blocked_not_looping() {
    let (_tx, mut nav) = navigator(signed_in("ghost", None));
    assert_eq!(nav.navigate("/medicos"), Outcome::Blocked { path: "/".into() });
    assert_eq!(nav.navigate("/"), Outcome::Blocked { path: "/".into() });
}

#[test]
fn unknown_role_still_reaches_public_routes() {
    let (_tx, mut nav) = navigator(signed_in("ghost", None));
    assert_eq!(nav.navigate("/login").view_name(), Some("login"));
}

// =============================================================================
// Session changes
// =============================================================================

#[test]
fn loading_becomes_view_on_refresh() {
    let (tx, mut nav) = navigator(Session::default());
    assert!(matches!(nav.navigate("/agenda"), Outcome::Loading { .. }));

    tx.send_replace(signed_in("d", Some(Role::Doctor)));
    assert_eq!(nav.refresh().view_name(), Some("agenda"));
}

#[test]
fn loading_becomes_denial_on_refresh() {
    let (tx, mut nav) = navigator(Session::default());
    nav.navigate("/medicos");

    tx.send_replace(signed_in("p", Some(Role::Patient)));
    let outcome = nav.refresh();
    assert_eq!(outcome.path(), "/");
    assert_eq!(outcome.view_name(), Some("patients_home"));
}

#[test]
fn sign_out_while_mounted_redirects_to_login() {
    let (tx, mut nav) = navigator(signed_in("a", Some(Role::Admin)));
    assert_eq!(nav.navigate("/medicos").view_name(), Some("doctors"));

    tx.send_replace(signed_out());
    let outcome = nav.refresh();
    assert_eq!(outcome.view_name(), Some("login"));
    assert_eq!(nav.return_to(), Some("/medicos"));
}

#[tokio::test]
async fn follow_session_reacts_to_sign_out() {
    let (tx, mut nav) = navigator(signed_in("a", Some(Role::Admin)));
    nav.navigate("/agenda");

    let follower = tokio::spawn(async move {
        let outcome = nav.follow_session().await;
        (outcome, nav)
    });
    tx.send_replace(signed_out());

    let (outcome, nav) = follower.await.unwrap();
    assert_eq!(outcome.and_then(|o| o.view_name()), Some("login"));
    assert_eq!(nav.return_to(), Some("/agenda"));
}

#[tokio::test]
async fn follow_session_ends_when_source_stops() {
    let (tx, mut nav) = navigator(signed_out());
    nav.navigate("/");
    drop(tx);
    assert!(nav.follow_session().await.is_none());
}

// =============================================================================
// Display
// =============================================================================

#[test]
fn outcome_display() {
    assert_eq!(Outcome::Loading { path: "/x".into() }.to_string(), "loading /x");
    assert_eq!(Outcome::Blocked { path: "/".into() }.to_string(), "blocked at /");
    let route = RouteTable::clinic().by_name("agenda").unwrap();
    let view = Outcome::View { route, path: "/agenda".into(), params: BTreeMap::new() };
    assert_eq!(view.to_string(), "view agenda at /agenda");
}

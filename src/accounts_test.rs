use super::*;
use crate::identity::memory::MemoryIdentityProvider;
use crate::profile::memory::MemoryProfileStore;

struct Fixture {
    provider: Arc<MemoryIdentityProvider>,
    store: Arc<MemoryProfileStore>,
    accounts: Accounts,
}

fn fixture() -> Fixture {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let store = Arc::new(MemoryProfileStore::new());
    let accounts = Accounts::new(
        Arc::clone(&provider) as Arc<dyn IdentityProvider>,
        Arc::clone(&store) as Arc<dyn ProfileStore>,
    );
    Fixture { provider, store, accounts }
}

// =============================================================================
// normalize_email
// =============================================================================

#[test]
fn normalize_email_accepts_basic_address() {
    assert_eq!(normalize_email("  Ana@Clinic.TEST "), Some("ana@clinic.test".to_owned()));
}

#[test]
fn normalize_email_rejects_invalid_values() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("ana"), None);
    assert_eq!(normalize_email("@clinic.test"), None);
    assert_eq!(normalize_email("ana@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
}

// =============================================================================
// register
// =============================================================================

#[tokio::test]
async fn register_creates_identity_and_profile() {
    let f = fixture();
    let signed = f.accounts.register("Doc@Clinic.test", "secret1", Role::Doctor).await.unwrap();

    assert_eq!(signed.role, Role::Doctor);
    assert_eq!(signed.destination, "/agenda");
    assert_eq!(f.provider.current().map(|id| id.uid), Some(signed.identity.uid.clone()));

    let profile = f.store.fetch_profile(&signed.identity.uid).await.unwrap().unwrap();
    assert_eq!(profile.role, Some(Role::Doctor));
    assert_eq!(profile.email.as_deref(), Some("doc@clinic.test"));
}

#[tokio::test]
async fn register_rejects_short_password_before_provider() {
    let f = fixture();
    let err = f.accounts.register("ana@clinic.test", "12345", Role::Patient).await.unwrap_err();
    assert!(matches!(err, AccountError::WeakPassword { min: 6 }));
    assert!(f.provider.current().is_none());
}

#[tokio::test]
async fn register_rejects_bad_email() {
    let f = fixture();
    let err = f.accounts.register("not-an-email", "secret1", Role::Patient).await.unwrap_err();
    assert!(matches!(err, AccountError::InvalidEmail));
}

#[tokio::test]
async fn register_duplicate_email_is_auth_error() {
    let f = fixture();
    f.accounts.register("ana@clinic.test", "secret1", Role::Patient).await.unwrap();
    let err = f.accounts.register("ANA@clinic.test", "secret2", Role::Admin).await.unwrap_err();
    assert!(matches!(err, AccountError::Auth(AuthError::EmailExists)));
}

// =============================================================================
// sign in
// =============================================================================

#[tokio::test]
async fn sign_in_routes_each_role_home() {
    let f = fixture();
    let admin = f.accounts.register("admin@clinic.test", "secret1", Role::Admin).await.unwrap();
    let patient = f.accounts.register("pat@clinic.test", "secret1", Role::Patient).await.unwrap();
    f.accounts.sign_out().await.unwrap();

    let signed = f.accounts.sign_in_with_password("admin@clinic.test", "secret1", None).await.unwrap();
    assert_eq!(signed.destination, "/");
    assert_eq!(signed.identity.uid, admin.identity.uid);

    let signed = f.accounts.sign_in_with_password("pat@clinic.test", "secret1", None).await.unwrap();
    assert_eq!(signed.destination, format!("/pacientes/{}", patient.identity.uid));
}

#[tokio::test]
async fn sign_in_prefers_preserved_path() {
    let f = fixture();
    f.accounts.register("doc@clinic.test", "secret1", Role::Doctor).await.unwrap();

    let signed = f.accounts.sign_in_with_password("doc@clinic.test", "secret1", Some("/pacientes/9?tab=1")).await.unwrap();
    assert_eq!(signed.destination, "/pacientes/9");
}

#[tokio::test]
async fn sign_in_ignores_public_or_unknown_return_path() {
    let f = fixture();
    f.accounts.register("doc@clinic.test", "secret1", Role::Doctor).await.unwrap();

    let signed = f.accounts.sign_in_with_password("doc@clinic.test", "secret1", Some("/login")).await.unwrap();
    assert_eq!(signed.destination, "/agenda");
    let signed = f.accounts.sign_in_with_password("doc@clinic.test", "secret1", Some("/nowhere")).await.unwrap();
    assert_eq!(signed.destination, "/agenda");
}

#[tokio::test]
async fn sign_in_ignores_return_path_the_role_cannot_open() {
    let f = fixture();
    let registered = f.accounts.register("ana@clinic.test", "secret1", Role::Patient).await.unwrap();

    let signed = f.accounts.sign_in_with_password("ana@clinic.test", "secret1", Some("/medicos")).await.unwrap();
    assert_eq!(signed.destination, format!("/pacientes/{}", registered.identity.uid));
    let signed = f.accounts.sign_in_with_password("ana@clinic.test", "secret1", Some("/marcar-consulta")).await.unwrap();
    assert_eq!(signed.destination, "/marcar-consulta");
}

#[tokio::test]
async fn sign_in_wrong_password() {
    let f = fixture();
    f.accounts.register("doc@clinic.test", "secret1", Role::Doctor).await.unwrap();
    let err = f.accounts.sign_in_with_password("doc@clinic.test", "nope", None).await.unwrap_err();
    assert!(matches!(err, AccountError::Auth(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn sign_in_without_profile_is_reported_and_stays_signed_in() {
    let f = fixture();
    let created = f.provider.sign_up("orphan@clinic.test", "secret1").await.unwrap();

    let err = f.accounts.sign_in_with_password("orphan@clinic.test", "secret1", None).await.unwrap_err();
    assert!(matches!(err, AccountError::ProfileNotFound(ref uid) if *uid == created.uid));
    assert!(f.provider.current().is_some());
}

#[tokio::test]
async fn sign_in_with_unknown_role_is_reported() {
    let f = fixture();
    let created = f.provider.sign_up("odd@clinic.test", "secret1").await.unwrap();
    let mut profile = Profile::new(created.uid.clone(), Role::Patient);
    profile.role = None;
    f.store.put_profile(&profile).await.unwrap();

    let err = f.accounts.sign_in_with_password("odd@clinic.test", "secret1", None).await.unwrap_err();
    assert!(matches!(err, AccountError::UnknownRole(_)));
}

#[tokio::test]
async fn federated_sign_in_uses_stored_profile() {
    let f = fixture();
    let credential = FederatedCredential::google("google-subject-1", "http://localhost");

    let first = f.provider.sign_in_federated(&credential).await.unwrap();
    f.store.put_profile(&Profile::new(first.uid.clone(), Role::Patient)).await.unwrap();
    f.accounts.sign_out().await.unwrap();

    let signed = f.accounts.sign_in_federated(&credential, None).await.unwrap();
    assert_eq!(signed.identity.uid, first.uid);
    assert_eq!(signed.role, Role::Patient);
}

#[tokio::test]
async fn sign_out_clears_identity() {
    let f = fixture();
    f.accounts.register("doc@clinic.test", "secret1", Role::Doctor).await.unwrap();
    f.accounts.sign_out().await.unwrap();
    assert!(f.provider.current().is_none());
}

use super::*;

// =============================================================================
// parse_auth_response — success
// =============================================================================

#[test]
fn parse_success_with_email() {
    let body = serde_json::json!({
        "kind": "identitytoolkit#VerifyPasswordResponse",
        "localId": "uid-123",
        "email": "ana@clinic.test",
        "idToken": "tok",
        "refreshToken": "refresh",
        "expiresIn": "3600"
    })
    .to_string();
    let identity = parse_auth_response(200, &body).unwrap();
    assert_eq!(identity.uid, "uid-123");
    assert_eq!(identity.email.as_deref(), Some("ana@clinic.test"));
    assert_eq!(identity.id_token, "tok");
}

#[test]
fn parse_success_empty_email_is_none() {
    let body = r#"{"localId": "u", "email": "", "idToken": "t"}"#;
    let identity = parse_auth_response(200, body).unwrap();
    assert!(identity.email.is_none());
}

#[test]
fn parse_success_missing_local_id_is_parse_error() {
    let err = parse_auth_response(200, r#"{"idToken": "t"}"#).unwrap_err();
    assert!(matches!(err, AuthError::Parse(_)));
}

// =============================================================================
// parse_auth_response — errors
// =============================================================================

fn error_body(message: &str) -> String {
    serde_json::json!({ "error": { "code": 400, "message": message, "errors": [] } }).to_string()
}

#[test]
fn invalid_password_maps_to_invalid_credentials() {
    let err = parse_auth_response(400, &error_body("INVALID_PASSWORD")).unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[test]
fn invalid_login_credentials_maps_to_invalid_credentials() {
    let err = parse_auth_response(400, &error_body("INVALID_LOGIN_CREDENTIALS")).unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[test]
fn email_exists_maps() {
    let err = parse_auth_response(400, &error_body("EMAIL_EXISTS")).unwrap_err();
    assert!(matches!(err, AuthError::EmailExists));
}

#[test]
fn suffixed_message_keeps_code_and_detail() {
    let err = parse_auth_response(400, &error_body("WEAK_PASSWORD : Password should be at least 6 characters"))
        .unwrap_err();
    match err {
        AuthError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.starts_with("WEAK_PASSWORD"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn non_json_error_body_is_kept() {
    let err = parse_auth_response(502, "Bad Gateway").unwrap_err();
    assert!(matches!(err, AuthError::Api { status: 502, ref message } if message == "Bad Gateway"));
}

#[test]
fn operation_not_allowed_is_unsupported_provider() {
    let err = parse_auth_response(400, &error_body("OPERATION_NOT_ALLOWED")).unwrap_err();
    assert!(matches!(err, AuthError::UnsupportedProvider(_)));
}

// =============================================================================
// request shaping
// =============================================================================

#[test]
fn idp_post_body_contains_token_and_provider() {
    let cred = FederatedCredential::google("abc", "http://localhost");
    assert_eq!(idp_post_body(&cred), "id_token=abc&providerId=google.com");
}

#[test]
fn idp_post_body_encodes_reserved_characters() {
    let cred = FederatedCredential::google("a+b/c=&d", "http://localhost");
    assert_eq!(idp_post_body(&cred), "id_token=a%2Bb%2Fc%3D%26d&providerId=google.com");
}

#[test]
fn password_request_serializes_camel_case() {
    let body = PasswordRequest { email: "a@b.c", password: "pw", return_secure_token: true };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["returnSecureToken"], true);
    assert_eq!(json["email"], "a@b.c");
}

#[test]
fn endpoint_trims_trailing_slash() {
    let provider = RestIdentityProvider::new("key123".into(), "https://auth.example.test/v1/").unwrap();
    assert_eq!(
        provider.endpoint("signUp"),
        "https://auth.example.test/v1/accounts:signUp?key=key123"
    );
}

#[tokio::test]
async fn sign_out_is_local() {
    let provider = RestIdentityProvider::new("key".into(), DEFAULT_AUTH_BASE_URL).unwrap();
    provider.hub.publish(Some(Identity { uid: "u".into(), email: None, id_token: "t".into() }));
    provider.sign_out().await.unwrap();
    assert!(provider.hub.current().is_none());
}

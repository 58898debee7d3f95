//! Shared-secret gate tests.

use clipgif::{AccessGate, ClipgifError, ErrorKind};

#[test]
fn correct_secret_opens_a_session() {
    let gate = AccessGate::new("correct horse").unwrap();
    assert!(gate.authenticate("correct horse").is_ok());
    assert!(gate.is_authorized("correct horse"));
}

#[test]
fn wrong_secret_is_denied() {
    let gate = AccessGate::new("correct horse").unwrap();
    for attempt in ["", "correct", "Correct horse", "correct horse "] {
        let error = gate.authenticate(attempt).unwrap_err();
        assert!(matches!(error, ClipgifError::AccessDenied));
        assert_eq!(error.kind(), ErrorKind::Auth);
        assert!(!gate.is_authorized(attempt));
    }
}

#[test]
fn missing_secret_fails_closed() {
    for secret in [None, Some(String::new()), Some("   ".to_string())] {
        let error = AccessGate::from_optional(secret).unwrap_err();
        assert!(matches!(error, ClipgifError::SecretNotConfigured));
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }
}

#[test]
fn debug_output_hides_the_secret() {
    let gate = AccessGate::new("s3cr3t").unwrap();
    assert!(!format!("{gate:?}").contains("s3cr3t"));
}

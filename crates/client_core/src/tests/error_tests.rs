use super::*;

fn messages() -> ErrorMessages {
    ErrorMessages::default()
}

#[test]
fn server_message_takes_precedence_over_status() {
    let err = OperationError::Response {
        status: 500,
        server_message: Some("Evento não encontrado na agenda".into()),
        message: "request failed with status 500".into(),
    };
    assert_eq!(err.user_message(&messages()), "Evento não encontrado na agenda");
    assert_eq!(err.kind(), ErrorKind::ServerError);
}

#[test]
fn bare_server_error_uses_generic_text() {
    let err = OperationError::status(500);
    assert_eq!(err.user_message(&messages()), messages().server_error);

    let err = OperationError::Response {
        status: 503,
        server_message: Some("   ".into()),
        message: "upstream exploded with a stack trace".into(),
    };
    assert_eq!(err.user_message(&messages()), messages().server_error);
}

#[test]
fn not_found_uses_generic_text() {
    let err = OperationError::Response {
        status: 404,
        server_message: None,
        message: "request failed with status 404".into(),
    };
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.user_message(&messages()), messages().not_found);
}

#[test]
fn other_statuses_fall_through_to_error_text() {
    let err = OperationError::Response {
        status: 400,
        server_message: None,
        message: "request failed with status 400 Bad Request".into(),
    };
    assert_eq!(err.kind(), ErrorKind::OperationFailure);
    assert_eq!(
        err.user_message(&messages()),
        "request failed with status 400 Bad Request"
    );
    assert_eq!(
        OperationError::status(400).user_message(&messages()),
        messages().fallback
    );
}

#[test]
fn failure_text_then_fallback() {
    assert_eq!(
        OperationError::failure("connection reset").user_message(&messages()),
        "connection reset"
    );
    assert_eq!(
        OperationError::failure("").user_message(&messages()),
        messages().fallback
    );
}

#[test]
fn timeout_uses_configured_text() {
    let custom = ErrorMessages {
        timeout: "Tempo esgotado".into(),
        ..ErrorMessages::default()
    };
    let err = OperationError::Timeout(std::time::Duration::from_secs(10));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.user_message(&custom), "Tempo esgotado");
}

#[test]
fn cancellation_is_flagged() {
    assert!(OperationError::Cancelled.is_cancelled());
    assert_eq!(OperationError::Cancelled.kind(), ErrorKind::Cancelled);
    assert!(!OperationError::failure("x").is_cancelled());
}

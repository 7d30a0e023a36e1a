//! Error type and failure classification.
//!
//! Every fallible operation in the crate returns [`Error`]. Classification
//! of HTTP and transport failures happens in exactly one place,
//! [`classify`], driven by an immutable status table, so callers can rely
//! on a stable mapping from what the server did to [`ErrorKind`].

use serde::Deserialize;
use thiserror::Error as ThisError;

/// What went wrong, at the granularity callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration could not be read, parsed, or expanded.
    InvalidConfig,
    /// HTTP 400.
    BadRequest,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 407.
    ProxyAuthRequired,
    /// HTTP 409.
    Conflict,
    /// HTTP 422.
    UnprocessableEntity,
    /// Any other 4xx status.
    Client,
    /// Any 5xx status.
    Server,
    /// The request never produced an HTTP response.
    ConnectionFailed,
    /// Everything else: preconditions, malformed responses, unmapped
    /// statuses.
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ProxyAuthRequired => "proxy_auth_required",
            ErrorKind::Conflict => "conflict",
            ErrorKind::UnprocessableEntity => "unprocessable_entity",
            ErrorKind::Client => "client_error",
            ErrorKind::Server => "server_error",
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::Other => "error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every fallible operation in the crate.
///
/// One concrete type rather than a tree: match on [`Error::kind`] to
/// branch, and read [`Error::http_status`], [`Error::code`], and
/// [`Error::message`] for the provider's diagnostics when they exist.
#[derive(Debug, ThisError)]
#[error("{}", render(.code, .message, .http_status))]
pub struct Error {
    kind: ErrorKind,
    http_status: Option<u16>,
    code: Option<String>,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn render(code: &Option<String>, message: &str, http_status: &Option<u16>) -> String {
    let mut out = String::new();
    if let Some(code) = code {
        out.push_str(code);
        out.push_str(": ");
    }
    out.push_str(message);
    if let Some(status) = http_status {
        out.push_str(&format!(" (HTTP {status})"));
    }
    out
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            http_status: None,
            code: None,
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            http_status: None,
            code: None,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Status of the HTTP response this error was classified from. Absent
    /// when no response was obtained.
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Provider error code, when the response body carried one.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render the error as a JSON object, for embedding in a response of
    /// your own.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.kind.as_str(),
            "error_message": self.message,
            "http_status": self.http_status,
            "code": self.code,
        })
    }
}

/// Raw outcome of a dispatch attempt, before classification.
#[derive(Debug)]
pub(crate) enum Failure {
    /// No HTTP response was obtained.
    Transport(reqwest::Error),
    /// The server answered with a non-success status.
    Status { status: u16, body: String },
}

// Statuses Ci is known to use, each with its own kind. Unlisted statuses
// fall back to the class-level kinds below.
static STATUS_KINDS: &[(u16, ErrorKind)] = &[
    (400, ErrorKind::BadRequest),
    (401, ErrorKind::Unauthorized),
    (403, ErrorKind::Forbidden),
    (404, ErrorKind::NotFound),
    (407, ErrorKind::ProxyAuthRequired),
    (409, ErrorKind::Conflict),
    (422, ErrorKind::UnprocessableEntity),
];

fn kind_for_status(status: u16) -> ErrorKind {
    if let Some((_, kind)) = STATUS_KINDS.iter().find(|(code, _)| *code == status) {
        return *kind;
    }
    match status {
        400..=499 => ErrorKind::Client,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Other,
    }
}

/// Error payload shapes Ci responds with. The general surface uses
/// `code`/`message`, the OAuth endpoint `error`/`error_description`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub(crate) fn classify(failure: Failure) -> Error {
    match failure {
        Failure::Transport(source) => {
            let message = source.to_string();
            Error {
                kind: ErrorKind::ConnectionFailed,
                http_status: None,
                code: None,
                message,
                source: Some(Box::new(source)),
            }
        }
        Failure::Status { status, body } => {
            let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();
            let (code, message) = match parsed {
                Some(payload) => {
                    let code = payload.code.or(payload.error);
                    match payload.message.or(payload.error_description) {
                        Some(message) => (code, message),
                        None => (None, fallback_message(status, &body)),
                    }
                }
                None => (None, fallback_message(status, &body)),
            };
            Error {
                kind: kind_for_status(status),
                http_status: Some(status),
                code,
                message,
                source: None,
            }
        }
    }
}

fn fallback_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("HTTP error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_error() -> reqwest::Error {
        // An invalid URL fails at build time, yielding a reqwest::Error
        // without any network involvement.
        reqwest::Client::new().get("not a url").build().unwrap_err()
    }

    #[test]
    fn every_mapped_status_gets_its_own_kind() {
        assert_eq!(kind_for_status(400), ErrorKind::BadRequest);
        assert_eq!(kind_for_status(401), ErrorKind::Unauthorized);
        assert_eq!(kind_for_status(403), ErrorKind::Forbidden);
        assert_eq!(kind_for_status(404), ErrorKind::NotFound);
        assert_eq!(kind_for_status(407), ErrorKind::ProxyAuthRequired);
        assert_eq!(kind_for_status(409), ErrorKind::Conflict);
        assert_eq!(kind_for_status(422), ErrorKind::UnprocessableEntity);
    }

    #[test]
    fn unmapped_statuses_fall_back_to_their_class() {
        assert_eq!(kind_for_status(402), ErrorKind::Client);
        assert_eq!(kind_for_status(418), ErrorKind::Client);
        assert_eq!(kind_for_status(500), ErrorKind::Server);
        assert_eq!(kind_for_status(503), ErrorKind::Server);
        assert_eq!(kind_for_status(302), ErrorKind::Other);
    }

    #[test]
    fn status_failures_keep_code_message_and_status() {
        let error = classify(Failure::Status {
            status: 404,
            body: r#"{"code":"FooNotFound","message":"Foo not found."}"#.to_string(),
        });

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.http_status(), Some(404));
        assert_eq!(error.code(), Some("FooNotFound"));
        assert_eq!(error.message(), "Foo not found.");
    }

    #[test]
    fn display_carries_the_provider_code_and_message() {
        let error = classify(Failure::Status {
            status: 404,
            body: r#"{"code":"FooNotFound","message":"Foo not found."}"#.to_string(),
        });

        let text = error.to_string();
        assert!(text.contains("FooNotFound"), "display was {text:?}");
        assert!(text.contains("Foo not found."), "display was {text:?}");
        assert!(text.contains("404"), "display was {text:?}");
    }

    #[test]
    fn oauth_shaped_bodies_are_understood() {
        let error = classify(Failure::Status {
            status: 400,
            body: r#"{"error":"invalid_grant","error_description":"Bad credentials."}"#
                .to_string(),
        });

        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.code(), Some("invalid_grant"));
        assert_eq!(error.message(), "Bad credentials.");
    }

    #[test]
    fn unparseable_bodies_fall_back_to_raw_text() {
        let error = classify(Failure::Status {
            status: 500,
            body: "<html>boom</html>".to_string(),
        });

        assert_eq!(error.kind(), ErrorKind::Server);
        assert_eq!(error.code(), None);
        assert_eq!(error.message(), "<html>boom</html>");
    }

    #[test]
    fn empty_bodies_fall_back_to_the_canonical_reason() {
        let error = classify(Failure::Status {
            status: 404,
            body: String::new(),
        });

        assert_eq!(error.message(), "Not Found");
    }

    #[test]
    fn json_bodies_without_a_message_fall_back_to_raw_text() {
        let error = classify(Failure::Status {
            status: 409,
            body: r#"{"detail":"someone else got there first"}"#.to_string(),
        });

        assert_eq!(error.kind(), ErrorKind::Conflict);
        assert_eq!(error.code(), None);
        assert!(error.message().contains("someone else got there first"));
    }

    #[test]
    fn transport_failures_have_no_http_status() {
        let error = classify(Failure::Transport(transport_error()));

        assert_eq!(error.kind(), ErrorKind::ConnectionFailed);
        assert_eq!(error.http_status(), None);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn to_json_names_the_kind_and_diagnostics() {
        let error = classify(Failure::Status {
            status: 404,
            body: r#"{"code":"FooNotFound","message":"Foo not found."}"#.to_string(),
        });

        let json = error.to_json();
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["error_message"], "Foo not found.");
        assert_eq!(json["http_status"], 404);
        assert_eq!(json["code"], "FooNotFound");
    }
}

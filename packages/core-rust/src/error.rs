/// Errors produced while building or parsing request-scope values.
///
/// Store, snapshot and guard operations never fail; only conversions from
/// untrusted text (headers, configuration) can.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("unrecognized log level: {0:?}")]
    InvalidLogLevel(String),
    #[error("private claims must be a JSON object: {0}")]
    InvalidPrivateClaims(String),
}

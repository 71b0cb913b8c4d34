//! Request-scope attribute carried from the thread that owns a request into
//! every unit of work executed on its behalf.
//!
//! An attribute is created when a request begins and is only mutated by the
//! thread that owns it. Once captured into a [`ScopeSnapshot`](crate::ScopeSnapshot)
//! it is shared behind an `Arc` and never changes again: the owning thread
//! mutates its own copy (see [`ScopeStore::update`](crate::ScopeStore::update)).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ScopeError;

/// Contextual identifiers propagated across thread hops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeAttribute {
    /// Identifier of the acting principal. `None` for anonymous requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Global transaction id correlating log lines across threads and services.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gtid: String,
    /// Name of the application that issued the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
    /// Program (screen or gateway route) id the request originated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    /// Client address recorded for audit logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    /// Free-form attributes propagated alongside the identifiers.
    /// Keys are case-insensitive and stored lowercased.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "lowercase_keys"
    )]
    custom_attributes: BTreeMap<String, String>,
    /// Private claims of the caller's access token, consulted by
    /// authorization checks. Keys are stored lowercased.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "lowercase_keys"
    )]
    private_claims: BTreeMap<String, serde_json::Value>,
    /// Values shared between the threads serving one request but never
    /// serialized into logs or outgoing headers. Keys are stored lowercased.
    #[serde(skip)]
    local_attributes: BTreeMap<String, String>,
    /// Services the request has passed through, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forwarded_services: Vec<String>,
    /// Per-request log level override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
}

impl ScopeAttribute {
    /// Creates an attribute for the given global transaction id.
    #[must_use]
    pub fn new(gtid: impl Into<String>) -> Self {
        Self {
            gtid: gtid.into(),
            ..Self::default()
        }
    }

    /// Creates an attribute for a new logical request with a random gtid.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_program_id(mut self, program_id: impl Into<String>) -> Self {
        self.program_id = Some(program_id.into());
        self
    }

    #[must_use]
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    /// Sets a custom attribute, replacing any value stored under the same
    /// key regardless of case.
    pub fn set_custom_attribute(&mut self, key: &str, value: impl Into<String>) {
        self.custom_attributes
            .insert(key.to_ascii_lowercase(), value.into());
    }

    /// Looks up a custom attribute by case-insensitive key.
    #[must_use]
    pub fn custom_attribute(&self, key: &str) -> Option<&str> {
        self.custom_attributes
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All custom attributes, keyed by lowercased name.
    #[must_use]
    pub fn custom_attributes(&self) -> &BTreeMap<String, String> {
        &self.custom_attributes
    }

    /// Replaces the private claims. An empty map leaves the current claims
    /// untouched.
    pub fn set_private_claims<K, I>(&mut self, claims: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        let claims: BTreeMap<_, _> = claims
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_ascii_lowercase(), value))
            .collect();
        if !claims.is_empty() {
            self.private_claims = claims;
        }
    }

    /// Merges claims from a JSON object, overwriting claims with the same
    /// key. Blank input is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidPrivateClaims`] when the text is not a
    /// JSON object; the current claims are left unchanged.
    pub fn merge_private_claims_json(&mut self, json: &str) -> Result<(), ScopeError> {
        if json.trim().is_empty() {
            return Ok(());
        }
        let claims: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|err| ScopeError::InvalidPrivateClaims(err.to_string()))?;
        for (key, value) in claims {
            self.private_claims.insert(key.to_ascii_lowercase(), value);
        }
        Ok(())
    }

    /// Looks up a private claim by case-insensitive key.
    #[must_use]
    pub fn private_claim(&self, key: &str) -> Option<&serde_json::Value> {
        self.private_claims.get(&key.to_ascii_lowercase())
    }

    #[must_use]
    pub fn private_claims(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.private_claims
    }

    pub fn set_local_attribute(&mut self, key: &str, value: impl Into<String>) {
        self.local_attributes
            .insert(key.to_ascii_lowercase(), value.into());
    }

    /// Looks up a local attribute by case-insensitive key.
    #[must_use]
    pub fn local_attribute(&self, key: &str) -> Option<&str> {
        self.local_attributes
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Appends a service to the forwarding chain.
    pub fn add_forwarded_service(&mut self, service: impl Into<String>) {
        self.forwarded_services.push(service.into());
    }

    /// Parses and applies a log level override. Blank input leaves the
    /// current override untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidLogLevel`] when the text does not name a level.
    pub fn set_log_level(&mut self, level: &str) -> Result<(), ScopeError> {
        if level.trim().is_empty() {
            return Ok(());
        }
        self.log_level = Some(level.parse()?);
        Ok(())
    }
}

impl fmt::Display for ScopeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScopeAttribute[user_id={}, gtid={}, forwarded={:?}]",
            self.user_id.as_deref().unwrap_or("-"),
            self.gtid,
            self.forwarded_services,
        )
    }
}

fn lowercase_keys<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    let raw = BTreeMap::<String, V>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect())
}

// ---------------------------------------------------------------------------
// LogLevel
// ---------------------------------------------------------------------------

/// Log level override carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ScopeError;

    /// Only the first character is significant: `D`, `I`, `W`, `E`, and
    /// `T`/`A` (trace, "all") in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('D') => Ok(Self::Debug),
            Some('I') => Ok(Self::Info),
            Some('W') => Ok(Self::Warn),
            Some('E') => Ok(Self::Error),
            Some('T' | 'A') => Ok(Self::Trace),
            _ => Err(ScopeError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

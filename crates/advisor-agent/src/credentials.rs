//! Backend credentials shared by the remote listing and the tool-augmented call.

use std::fmt;

/// API identifier/key pair used against the remote backend.
///
/// The same pair authenticates the provider itself, so the key never shows
/// up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BackendCredentials {
    pub api_id: String,
    pub api_key: String,
}

impl BackendCredentials {
    pub fn new(api_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_id: api_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Both halves are present.
    pub fn is_complete(&self) -> bool {
        !self.api_id.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("api_id", &self.api_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

//! Error types for the CCU client
//!
//! Three families reach the caller unmodified: transport failures, lookups
//! that do not resolve to an entity, and failures of the cache backing store.

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::EntityKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An id or name failed existence verification or name-index lookup.
    #[error("invalid {kind} \"{name}\"")]
    NotFound { kind: EntityKind, name: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A handle was used after the session that created it was dropped.
    #[error("the CCU session backing this handle has been closed")]
    SessionClosed,
}

impl Error {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures raised by the HTTP transport. Never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {code} from {url}{}", hint_suffix(.code))]
    Status { code: u16, url: String },

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response from {url}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl TransportError {
    /// The HTTP status code, when the controller answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn hint_suffix(code: &u16) -> &'static str {
    match *code {
        401 => "\nHint: check the configured username and password",
        403 => "\nHint: the CCU denied access; check the add-on's access settings",
        404 => "\nHint: the requested resource does not exist on the CCU",
        503 => "\nHint: the CCU may be starting up or restarting",
        _ => "",
    }
}

/// Failures of the cache backing store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache key {key:?} in pool {pool}")]
    InvalidKey { pool: String, key: String },

    #[error("cache I/O on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding cache entry {key:?} in pool {pool}")]
    Encode {
        pool: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("decoding cache entry {key:?} in pool {pool}")]
    Decode {
        pool: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to determine cache directory")]
    NoCacheDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found(EntityKind::Room, "kitchen");
        assert_eq!(err.to_string(), "invalid room \"kitchen\"");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_status_hint() {
        let err = TransportError::Status {
            code: 404,
            url: "https://ccu/device/x".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("HTTP 404 from https://ccu/device/x"));
        assert!(msg.contains("Hint:"));
        assert_eq!(err.status(), Some(404));

        let plain = TransportError::Status {
            code: 500,
            url: "https://ccu/room".to_string(),
        };
        assert_eq!(plain.to_string(), "HTTP 500 from https://ccu/room");
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err: Error = TransportError::Status {
            code: 500,
            url: "https://ccu/room".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "HTTP 500 from https://ccu/room");
        assert!(!err.is_not_found());
    }
}

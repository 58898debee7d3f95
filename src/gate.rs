//! Shared-secret access gate.
//!
//! The gate compares a submitted secret against the one configured for the
//! deployment. A successful comparison yields a [`Session`], a capability
//! value that the upload-level conversion operations require. A session can
//! only be obtained from [`AccessGate::authenticate`], so holding one is
//! proof that the caller passed the gate.
//!
//! A missing or empty secret is treated as a deployment error: the gate
//! cannot be constructed and nothing is served.
//!
//! # Example
//!
//! ```
//! use clipgif::{AccessGate, ClipgifError};
//!
//! let gate = AccessGate::new("hunter2")?;
//! assert!(gate.authenticate("wrong").is_err());
//! let session = gate.authenticate("hunter2")?;
//! # let _ = session;
//! # Ok::<(), ClipgifError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::error::ClipgifError;

/// Compares submitted secrets against the configured one.
#[derive(Clone)]
pub struct AccessGate {
    secret: String,
}

impl Debug for AccessGate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AccessGate").finish_non_exhaustive()
    }
}

impl AccessGate {
    /// Create a gate for `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::SecretNotConfigured`] if the secret is empty
    /// or only whitespace.
    pub fn new(secret: impl Into<String>) -> Result<Self, ClipgifError> {
        Self::from_optional(Some(secret.into()))
    }

    /// Create a gate from an optional configured secret.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::SecretNotConfigured`] when no usable secret
    /// is present.
    pub fn from_optional(secret: Option<String>) -> Result<Self, ClipgifError> {
        match secret {
            Some(secret) if !secret.trim().is_empty() => Ok(Self { secret }),
            _ => {
                log::error!("Refusing to start without an access secret");
                Err(ClipgifError::SecretNotConfigured)
            }
        }
    }

    /// Check `submitted` and mint a [`Session`] on success.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::AccessDenied`] if the secret does not match.
    pub fn authenticate(&self, submitted: &str) -> Result<Session, ClipgifError> {
        if self.is_authorized(submitted) {
            Ok(Session { _private: () })
        } else {
            log::warn!("Rejected access attempt with an incorrect secret");
            Err(ClipgifError::AccessDenied)
        }
    }

    /// Plain allow/deny comparison.
    pub fn is_authorized(&self, submitted: &str) -> bool {
        submitted == self.secret
    }
}

/// Proof that the holder passed the [`AccessGate`].
#[derive(Debug)]
pub struct Session {
    _private: (),
}

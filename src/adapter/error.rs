//! Adapter-level failures.
//!
//! These abort only the adapter that raised them; per-record and
//! per-document problems never surface here.

use thiserror::Error;

use crate::navigate::NavigationError;

/// Errors that end one adapter's run.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A credential environment variable is unset or empty.
    #[error("{site}: credential variable {variable} is not set")]
    MissingCredentials {
        /// Adapter id.
        site: String,
        /// Name of the missing environment variable.
        variable: String,
    },

    /// The portal did not accept the submitted credentials.
    #[error("{site}: authentication rejected: {reason}")]
    AuthenticationRejected {
        /// Adapter id.
        site: String,
        /// What gave the rejection away.
        reason: String,
    },

    /// The login or first listing page could not be loaded.
    #[error("{site}: listing unavailable: {source}")]
    ListingUnavailable {
        /// Adapter id.
        site: String,
        /// The navigation failure.
        #[source]
        source: NavigationError,
    },

    /// The HTTP session could not be opened.
    #[error("{site}: could not open session: {source}")]
    Session {
        /// Adapter id.
        site: String,
        /// The underlying session error.
        #[source]
        source: NavigationError,
    },
}

impl AdapterError {
    /// Creates a missing-credentials error.
    #[must_use]
    pub fn missing_credentials(site: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::MissingCredentials {
            site: site.into(),
            variable: variable.into(),
        }
    }

    /// Creates an authentication-rejected error.
    #[must_use]
    pub fn authentication_rejected(site: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AuthenticationRejected {
            site: site.into(),
            reason: reason.into(),
        }
    }

    /// Creates a listing-unavailable error.
    #[must_use]
    pub fn listing_unavailable(site: impl Into<String>, source: NavigationError) -> Self {
        Self::ListingUnavailable {
            site: site.into(),
            source,
        }
    }

    /// Creates a session error.
    #[must_use]
    pub fn session(site: impl Into<String>, source: NavigationError) -> Self {
        Self::Session {
            site: site.into(),
            source,
        }
    }
}

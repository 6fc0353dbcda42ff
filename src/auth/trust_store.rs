//! Session trust token persistence via OS keyring
//!
//! After a verification code is accepted the service issues a trust token.
//! Replaying it on the next sign-in marks the session as trusted, so the
//! operator is not asked for a code on every run. Tokens are stored per Apple
//! ID in the operating system's native credential store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PhotosweepError, Result};

/// Keyring service name under which all trust tokens are stored
const KEYRING_SERVICE: &str = "photosweep";

/// A trust token together with the time it was issued
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustToken {
    /// Opaque token returned in `X-Apple-TwoSV-Trust-Token`
    pub token: String,
    /// When the token was stored
    pub saved_at: DateTime<Utc>,
}

impl TrustToken {
    /// Wrap a freshly issued token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            saved_at: Utc::now(),
        }
    }
}

/// Stateless accessor for trust tokens in the OS keyring
///
/// # Examples
///
/// ```no_run
/// use photosweep::auth::trust_store::{TrustStore, TrustToken};
///
/// let store = TrustStore;
/// store.save("user@example.com", &TrustToken::new("HSARMTKNSRVXWFlax")).unwrap();
/// assert!(store.load("user@example.com").unwrap().is_some());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustStore;

impl TrustStore {
    fn entry(account: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(KEYRING_SERVICE, account).map_err(PhotosweepError::Keyring)?)
    }

    /// Persist the trust token for `account`
    ///
    /// # Errors
    ///
    /// Returns `PhotosweepError::Keyring` if the credential store rejects the
    /// write.
    pub fn save(&self, account: &str, token: &TrustToken) -> Result<()> {
        let json_str = serde_json::to_string(token).map_err(PhotosweepError::Serialization)?;
        Self::entry(account)?
            .set_password(&json_str)
            .map_err(PhotosweepError::Keyring)?;
        Ok(())
    }

    /// Load the trust token for `account`, if one was saved
    ///
    /// # Errors
    ///
    /// Returns `PhotosweepError::Keyring` on unexpected keyring failures and
    /// `PhotosweepError::Serialization` if the stored value is malformed.
    pub fn load(&self, account: &str) -> Result<Option<TrustToken>> {
        match Self::entry(account)?.get_password() {
            Ok(json_str) => Ok(Some(
                serde_json::from_str(&json_str).map_err(PhotosweepError::Serialization)?,
            )),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(PhotosweepError::Keyring(e).into()),
        }
    }

    /// Forget the trust token for `account`; a no-op when none is stored
    pub fn delete(&self, account: &str) -> Result<()> {
        match Self::entry(account)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(PhotosweepError::Keyring(e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_token_roundtrip_through_json() {
        let token = TrustToken::new("HSARMTKNSRVXWFlax");
        let json = serde_json::to_string(&token).unwrap();
        let parsed: TrustToken = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_malformed_stored_value_is_serialization_error() {
        let err = serde_json::from_str::<TrustToken>("not json")
            .map_err(PhotosweepError::Serialization)
            .unwrap_err();
        assert!(err.to_string().starts_with("Serialization error:"));
    }

    // Keyring tests require a system credential store; skipped in CI

    #[test]
    #[ignore = "requires system keyring"]
    fn test_save_load_delete_via_keyring() {
        let store = TrustStore;
        let account = "photosweep-test@example.com";

        store.save(account, &TrustToken::new("token-1")).expect("save");
        let loaded = store.load(account).expect("load").expect("present");
        assert_eq!(loaded.token, "token-1");

        store.delete(account).expect("delete");
        assert!(store.load(account).expect("load after delete").is_none());
        store.delete(account).expect("second delete is no-op");
    }
}

//! Identity and write authorisation.
//!
//! A [`Signer`] supplies the identity recorded as a report's submitter and is
//! asked to authorise every ledger write before it is issued. Wallet prompts,
//! hardware keys and similar collaborators implement this trait.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::error::SignerError;

/// Source of the submitting identity.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Returns the identity of the current submitter.
    fn identity(&self) -> String;

    /// Authorises writing `value` under `key`.
    ///
    /// This is a suspension point: an interactive signer may wait on the user.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Declined`] if the user declines, or
    /// [`SignerError::Unavailable`] if no decision can be made.
    async fn authorize(&self, key: &str, value: &[u8]) -> Result<(), SignerError>;
}

#[async_trait]
impl<T: Signer + ?Sized> Signer for Arc<T> {
    fn identity(&self) -> String {
        (**self).identity()
    }

    async fn authorize(&self, key: &str, value: &[u8]) -> Result<(), SignerError> {
        (**self).authorize(key, value).await
    }
}

/// Signer with a fixed identity that authorises everything.
///
/// Can be told to decline a number of upcoming writes.
#[derive(Debug)]
pub struct StaticSigner {
    identity: String,
    declines: AtomicUsize,
    authorized: AtomicUsize,
}

impl StaticSigner {
    /// Creates a signer for `identity`.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            declines: AtomicUsize::new(0),
            authorized: AtomicUsize::new(0),
        }
    }

    /// Declines the next `count` authorisation requests.
    pub fn decline_next(&self, count: usize) {
        self.declines.store(count, Ordering::SeqCst);
    }

    /// Returns how many writes have been authorised.
    pub fn authorized_count(&self) -> usize {
        self.authorized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for StaticSigner {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    async fn authorize(&self, key: &str, _value: &[u8]) -> Result<(), SignerError> {
        let declined =
            self.declines.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if declined.is_ok() {
            tracing::debug!(key, "signer declined write");
            return Err(SignerError::Declined { message: "user rejected transaction".to_owned() });
        }
        self.authorized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_signer_declines_then_authorizes() {
        let signer = StaticSigner::new("0xabc");
        signer.decline_next(1);
        assert!(matches!(
            signer.authorize("k", b"v").await,
            Err(SignerError::Declined { .. })
        ));
        signer.authorize("k", b"v").await.unwrap();
        assert_eq!(signer.authorized_count(), 1);
        assert_eq!(signer.identity(), "0xabc");
    }
}

//! Chain Client Binder.
//!
//! Establishes one wallet session per binder and hands it out as an explicit
//! [`ClientHandle`]. There is no process-wide client: whoever owns the binder
//! owns the session.
//!
//! # Cancellation
//!
//! The session cell is only filled when authorization completes. Dropping a
//! pending [`ChainBinder::connect`] future leaves the binder empty, and the
//! next call starts a fresh authorization.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Ledger;
use super::WalletProvider;
use crate::error::ConnectError;

/// Caller-held reference to an authorized ledger session.
///
/// Cheap to clone; every ledger operation takes one explicitly.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    account: String,
    chain_id: u64,
    ledger: Arc<dyn Ledger>,
}

impl ClientHandle {
    pub fn new(account: impl Into<String>, chain_id: u64, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                account: account.into(),
                chain_id,
                ledger,
            }),
        }
    }

    /// Account authorized by the wallet.
    pub fn account(&self) -> &str {
        &self.inner.account
    }

    pub fn chain_id(&self) -> u64 {
        self.inner.chain_id
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.inner.ledger.as_ref()
    }

    /// Whether two handles refer to the same session.
    pub fn same_session(&self, other: &ClientHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("account", &self.inner.account)
            .field("chain_id", &self.inner.chain_id)
            .finish_non_exhaustive()
    }
}

/// Lazily connects to the ledger at most once.
pub struct ChainBinder {
    provider: Option<Arc<dyn WalletProvider>>,
    expected_chain_id: Option<u64>,
    handle: OnceCell<ClientHandle>,
}

impl ChainBinder {
    /// Binder over a wallet provider.
    ///
    /// When `expected_chain_id` is set, a session on any other chain is refused
    /// with [`ConnectError::NetworkMismatch`].
    pub fn new(provider: Arc<dyn WalletProvider>, expected_chain_id: Option<u64>) -> Self {
        Self {
            provider: Some(provider),
            expected_chain_id,
            handle: OnceCell::new(),
        }
    }

    /// Binder for an environment with no wallet at all.
    pub fn without_provider() -> Self {
        Self {
            provider: None,
            expected_chain_id: None,
            handle: OnceCell::new(),
        }
    }

    /// Connect, or return the existing session.
    ///
    /// Idempotent: once a handle exists it is returned without asking the
    /// wallet again. Concurrent first calls share one authorization request.
    pub async fn connect(&self) -> Result<ClientHandle, ConnectError> {
        if let Some(handle) = self.handle.get() {
            debug!(account = %handle.account(), "reusing ledger session");
            return Ok(handle.clone());
        }

        let provider = self.provider.as_ref().ok_or(ConnectError::ProviderAbsent)?;
        let expected = self.expected_chain_id;

        let handle = self
            .handle
            .get_or_try_init(|| async move {
                let session = provider.authorize().await.inspect_err(|err| {
                    warn!(error = %err, "wallet authorization failed");
                })?;

                if let Some(expected) = expected
                    && session.chain_id != expected
                {
                    warn!(expected, actual = session.chain_id, "wallet is on the wrong network");
                    return Err(ConnectError::NetworkMismatch {
                        expected,
                        actual: session.chain_id,
                    });
                }

                info!(account = %session.account, chain_id = session.chain_id, "ledger session established");
                Ok::<_, ConnectError>(ClientHandle::new(session.account, session.chain_id, session.ledger))
            })
            .await?;

        Ok(handle.clone())
    }

    /// The session, if one has been established.
    pub fn current(&self) -> Option<ClientHandle> {
        self.handle.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::inmemory::InMemoryLedger;
    use crate::ledger::WalletSession;

    struct CountingWallet {
        calls: AtomicUsize,
        chain_id: u64,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl WalletProvider for CountingWallet {
        async fn authorize(&self) -> Result<WalletSession, ConnectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(WalletSession {
                account: "0x00000000000000000000000000000000000000aa".to_string(),
                chain_id: self.chain_id,
                ledger: Arc::new(InMemoryLedger::new()),
            })
        }
    }

    fn wallet(chain_id: u64, delay: Option<Duration>) -> Arc<CountingWallet> {
        Arc::new(CountingWallet {
            calls: AtomicUsize::new(0),
            chain_id,
            delay,
        })
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let provider = wallet(1337, None);
        let binder = ChainBinder::new(provider.clone(), Some(1337));

        let first = binder.connect().await.unwrap();
        let second = binder.connect().await.unwrap();

        assert!(first.same_session(&second));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_without_provider() {
        let binder = ChainBinder::without_provider();
        assert_eq!(binder.connect().await.unwrap_err(), ConnectError::ProviderAbsent);
        assert!(binder.current().is_none());
    }

    #[tokio::test]
    async fn test_network_mismatch_caches_nothing() {
        let provider = wallet(1, None);
        let binder = ChainBinder::new(provider.clone(), Some(5777));

        let err = binder.connect().await.unwrap_err();
        assert_eq!(
            err,
            ConnectError::NetworkMismatch {
                expected: 5777,
                actual: 1
            }
        );
        assert!(binder.current().is_none());

        // A failed attempt is retried on the next call, not memoized.
        let _ = binder.connect().await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_connect_leaves_no_handle() {
        let provider = wallet(1337, Some(Duration::from_secs(3600)));
        let binder = ChainBinder::new(provider.clone(), None);

        let attempt = tokio::time::timeout(Duration::from_secs(1), binder.connect()).await;
        assert!(attempt.is_err(), "authorization should still be pending");
        assert!(binder.current().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_connects_share_one_authorization() {
        let provider = wallet(1337, Some(Duration::from_millis(20)));
        let binder = ChainBinder::new(provider.clone(), None);

        let (a, b) = tokio::join!(binder.connect(), binder.connect());
        assert!(a.unwrap().same_session(&b.unwrap()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}

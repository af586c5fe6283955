//! Bounded, cancellable waits on wallet state.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use sponsor_common::{IdentityKeys, SponsorError};

use crate::runtime::{WalletRuntime, WalletSnapshot};

/// Default upper bound for any wallet wait.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncPolicy {
    pub timeout: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }
}

impl SyncPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Wait until `ready` holds for the wallet's state.
///
/// Returns immediately if it already holds. Fails with `SyncTimeout` after
/// `policy.timeout` and with `Cancelled` once `cancel` fires.
pub async fn wait_until<F>(
    wallet: &dyn WalletRuntime,
    policy: SyncPolicy,
    cancel: &CancellationToken,
    ready: F,
) -> Result<WalletSnapshot, SponsorError>
where
    F: FnMut(&WalletSnapshot) -> bool + Send,
{
    let mut rx = wallet.state();
    let label = wallet.label().to_string();
    let wait = async move { rx.wait_for(ready).await.map(|snapshot| snapshot.clone()) };

    tokio::select! {
        _ = cancel.cancelled() => Err(SponsorError::Cancelled),
        res = tokio::time::timeout(policy.timeout, wait) => match res {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(_)) => Err(SponsorError::IdentityUnavailable(format!(
                "{label}: wallet state channel closed"
            ))),
            Err(_) => {
                debug!(wallet = %label, timeout = ?policy.timeout, "wallet wait timed out");
                Err(SponsorError::SyncTimeout(policy.timeout))
            }
        },
    }
}

/// Wait for the wallet's key material.
pub async fn wait_for_keys(
    wallet: &dyn WalletRuntime,
    policy: SyncPolicy,
    cancel: &CancellationToken,
) -> Result<IdentityKeys, SponsorError> {
    let snapshot = wait_until(wallet, policy, cancel, |s| s.keys.is_some()).await?;
    snapshot.keys.ok_or_else(|| {
        SponsorError::IdentityUnavailable(format!("{}: key material missing", wallet.label()))
    })
}

//! Cart and wishlist state service.
//!
//! The session copy of a [`Cart`] is authoritative for rendering. Every
//! successful mutation is mirrored to the remote copy of a signed-in user
//! through a background [`SyncDispatcher`], which retries with backoff and
//! records failures in a [`SyncMonitor`] instead of surfacing them to the
//! request that caused them.
//!
//! While a user is degraded, mutations upload a full snapshot instead of an
//! incremental change, so the first successful write repairs the remote copy.
//! A user whose remote copy could not be read at sign-in is never sent a
//! snapshot: every later action retries the load and merge first, and keeps
//! its changes local until that succeeds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use kramnytsia_core::{Cart, CartChange, CartError, MergeOutcome, ProductId, ProductSnapshot, UserId};

use crate::db::RepositoryError;

/// How long a sync failure stays visible without a repairing write.
const FAILURE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Matches the session inactivity window.
const PENDING_MERGE_IDLE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Remote persistence for signed-in carts.
#[async_trait]
pub trait CartRemote: Send + Sync {
    async fn load(&self, user_id: UserId) -> Result<Cart, RepositoryError>;

    /// Apply one incremental change. Upserts are last-write-wins per product.
    async fn apply(&self, user_id: UserId, change: &CartChange) -> Result<(), RepositoryError>;

    /// Overwrite the remote cart and wishlist with a full snapshot.
    async fn replace(&self, user_id: UserId, cart: &Cart) -> Result<(), RepositoryError>;
}

/// Exponential backoff for remote writes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[derive(Debug, Clone)]
struct SyncFailure {
    last_error: String,
    failed_at: DateTime<Utc>,
}

/// Sync health of one user, as reported to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub degraded: bool,
    /// The remote copy has not been merged since sign-in.
    pub remote_pending: bool,
    pub last_error: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
}

/// Tracks which users have unsynced local changes.
#[derive(Clone)]
pub struct SyncMonitor {
    failures: Cache<UserId, SyncFailure>,
}

impl Default for SyncMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            failures: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(FAILURE_TTL)
                .build(),
        }
    }

    pub async fn status(&self, user_id: UserId) -> SyncStatus {
        self.failures
            .get(&user_id)
            .await
            .map_or_else(SyncStatus::default, |f| SyncStatus {
                degraded: true,
                remote_pending: false,
                last_error: Some(f.last_error),
                failed_at: Some(f.failed_at),
            })
    }

    pub async fn is_degraded(&self, user_id: UserId) -> bool {
        self.failures.contains_key(&user_id)
    }

    async fn record_failure(&self, user_id: UserId, error: &RepositoryError) {
        self.failures
            .insert(
                user_id,
                SyncFailure {
                    last_error: error.to_string(),
                    failed_at: Utc::now(),
                },
            )
            .await;
    }

    async fn clear(&self, user_id: UserId) {
        self.failures.invalidate(&user_id).await;
    }
}

#[derive(Debug)]
enum SyncJob {
    Apply { user_id: UserId, change: CartChange },
    Replace { user_id: UserId, cart: Cart },
    Flush(oneshot::Sender<()>),
}

/// Single background worker that applies remote writes in submission order.
#[derive(Clone)]
pub struct SyncDispatcher {
    tx: mpsc::UnboundedSender<SyncJob>,
}

impl SyncDispatcher {
    /// Start the worker on the current Tokio runtime.
    #[must_use]
    pub fn spawn(remote: Arc<dyn CartRemote>, monitor: SyncMonitor, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(rx, remote, monitor, policy));
        Self { tx }
    }

    fn send(&self, job: SyncJob) {
        if self.tx.send(job).is_err() {
            tracing::error!("Cart sync worker has stopped; dropping remote write");
        }
    }

    /// Wait until every job queued before this call has been processed.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        self.send(SyncJob::Flush(ack));
        let _ = done.await;
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<SyncJob>,
    remote: Arc<dyn CartRemote>,
    monitor: SyncMonitor,
    policy: RetryPolicy,
) {
    while let Some(job) = rx.recv().await {
        match job {
            SyncJob::Flush(ack) => {
                let _ = ack.send(());
            }
            SyncJob::Apply { user_id, change } => {
                let result =
                    with_retry(policy, "apply", user_id, || remote.apply(user_id, &change)).await;
                if let Err(e) = result {
                    monitor.record_failure(user_id, &e).await;
                }
            }
            SyncJob::Replace { user_id, cart } => {
                let result =
                    with_retry(policy, "replace", user_id, || remote.replace(user_id, &cart)).await;
                match result {
                    Ok(()) => monitor.clear(user_id).await,
                    Err(e) => monitor.record_failure(user_id, &e).await,
                }
            }
        }
    }
    tracing::debug!("Cart sync worker exiting");
}

async fn with_retry<F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    user_id: UserId,
    mut call: F,
) -> Result<(), RepositoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), RepositoryError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    %user_id,
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Cart sync failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(
                    %user_id,
                    operation,
                    attempts = attempt,
                    error = %e,
                    "Cart sync gave up"
                );
                return Err(e);
            }
        }
    }
}

/// Explicit action methods over a caller-owned cart.
///
/// `user` is `None` for anonymous shoppers, whose changes stay local.
#[derive(Clone)]
pub struct CartStore {
    remote: Arc<dyn CartRemote>,
    dispatcher: SyncDispatcher,
    monitor: SyncMonitor,
    /// Users signed in without a successful remote load.
    unmerged: Cache<UserId, ()>,
}

impl CartStore {
    /// Build the store and start its sync worker.
    #[must_use]
    pub fn new(remote: Arc<dyn CartRemote>, policy: RetryPolicy) -> Self {
        let monitor = SyncMonitor::new();
        let dispatcher = SyncDispatcher::spawn(Arc::clone(&remote), monitor.clone(), policy);
        Self {
            remote,
            dispatcher,
            monitor,
            unmerged: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(PENDING_MERGE_IDLE)
                .build(),
        }
    }

    fn upload(&self, user_id: UserId, changes: &[CartChange]) {
        for change in changes {
            self.dispatcher.send(SyncJob::Apply {
                user_id,
                change: change.clone(),
            });
        }
    }

    /// Merge a freshly loaded remote copy into the local cart and upload the
    /// local-only entries.
    async fn adopt(&self, cart: &mut Cart, user_id: UserId, remote: Cart) -> MergeOutcome {
        let outcome = cart.merge_remote(remote);
        self.unmerged.invalidate(&user_id).await;
        self.monitor.clear(user_id).await;
        self.upload(user_id, &outcome.uploads);
        tracing::debug!(
            %user_id,
            uploads = outcome.uploads.len(),
            superseded = outcome.superseded,
            "Merged remote cart"
        );
        outcome
    }

    /// Retry the sign-in load for a user still waiting on it.
    ///
    /// Returns `false` if the remote copy is still unreadable.
    async fn merge_pending(&self, cart: &mut Cart, user_id: UserId) -> bool {
        match self.remote.load(user_id).await {
            Ok(remote) => {
                self.adopt(cart, user_id, remote).await;
                true
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Remote cart still unreadable; keeping changes local");
                self.monitor.record_failure(user_id, &e).await;
                false
            }
        }
    }

    async fn mirror(&self, user: Option<UserId>, cart: &mut Cart, changes: Vec<CartChange>) {
        let Some(user_id) = user else {
            return;
        };
        if self.unmerged.contains_key(&user_id) {
            // Remote wins on conflict; local-only entries are uploaded.
            self.merge_pending(cart, user_id).await;
            return;
        }
        if self.monitor.is_degraded(user_id).await {
            self.dispatcher.send(SyncJob::Replace {
                user_id,
                cart: cart.clone(),
            });
            return;
        }
        for change in changes {
            self.dispatcher.send(SyncJob::Apply { user_id, change });
        }
    }

    /// # Errors
    ///
    /// Returns the validation error and leaves the cart unchanged.
    pub async fn add_to_cart(
        &self,
        cart: &mut Cart,
        user: Option<UserId>,
        product: &ProductSnapshot,
        quantity: u32,
    ) -> Result<(), CartError> {
        let change = cart.add_to_cart(product, quantity)?;
        self.mirror(user, cart, vec![change]).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if the item is absent or already at its stock ceiling.
    pub async fn increase_quantity(
        &self,
        cart: &mut Cart,
        user: Option<UserId>,
        product_id: ProductId,
    ) -> Result<(), CartError> {
        let change = cart.increase_quantity(product_id)?;
        self.mirror(user, cart, vec![change]).await;
        Ok(())
    }

    /// Removes the line when its quantity is 1.
    ///
    /// # Errors
    ///
    /// Fails if the item is absent.
    pub async fn decrease_quantity(
        &self,
        cart: &mut Cart,
        user: Option<UserId>,
        product_id: ProductId,
    ) -> Result<(), CartError> {
        let change = cart.decrease_quantity(product_id)?;
        self.mirror(user, cart, vec![change]).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if the item is absent.
    pub async fn remove_from_cart(
        &self,
        cart: &mut Cart,
        user: Option<UserId>,
        product_id: ProductId,
    ) -> Result<(), CartError> {
        let change = cart.remove_from_cart(product_id)?;
        self.mirror(user, cart, vec![change]).await;
        Ok(())
    }

    pub async fn clear_cart(&self, cart: &mut Cart, user: Option<UserId>) {
        let change = cart.clear_cart();
        self.mirror(user, cart, vec![change]).await;
    }

    /// Returns `false` if the product was already wishlisted.
    pub async fn add_to_wishlist(
        &self,
        cart: &mut Cart,
        user: Option<UserId>,
        product_id: ProductId,
    ) -> bool {
        match cart.add_to_wishlist(product_id) {
            Some(change) => {
                self.mirror(user, cart, vec![change]).await;
                true
            }
            None => false,
        }
    }

    /// # Errors
    ///
    /// Fails if the product is not wishlisted.
    pub async fn remove_from_wishlist(
        &self,
        cart: &mut Cart,
        user: Option<UserId>,
        product_id: ProductId,
    ) -> Result<(), CartError> {
        let change = cart.remove_from_wishlist(product_id)?;
        self.mirror(user, cart, vec![change]).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if the product is not wishlisted or cannot be added.
    pub async fn move_to_cart(
        &self,
        cart: &mut Cart,
        user: Option<UserId>,
        product: &ProductSnapshot,
    ) -> Result<(), CartError> {
        let changes = cart.move_to_cart(product)?;
        self.mirror(user, cart, changes).await;
        Ok(())
    }

    /// Adopt the remote copy at sign-in and upload local-only entries.
    ///
    /// If the remote copy cannot be read the local cart is kept and nothing
    /// is uploaded. The user stays pending until a later action loads and
    /// merges the remote copy.
    #[instrument(skip(self, cart))]
    pub async fn sign_in(&self, cart: &mut Cart, user_id: UserId) -> MergeOutcome {
        match self.remote.load(user_id).await {
            Ok(remote) => self.adopt(cart, user_id, remote).await,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load remote cart at sign-in; keeping local");
                self.monitor.record_failure(user_id, &e).await;
                self.unmerged.insert(user_id, ()).await;
                MergeOutcome::default()
            }
        }
    }

    /// Push unsynced state to the departing user, then detach the local cart.
    #[instrument(skip(self, cart))]
    pub async fn sign_out(&self, cart: &mut Cart, user_id: UserId) {
        if self.unmerged.contains_key(&user_id) {
            if !self.merge_pending(cart, user_id).await {
                tracing::warn!(
                    items = cart.items().len(),
                    "Signing out before the remote cart was merged; local changes are not saved"
                );
            }
            self.unmerged.invalidate(&user_id).await;
        } else if self.monitor.is_degraded(user_id).await {
            self.dispatcher.send(SyncJob::Replace {
                user_id,
                cart: cart.clone(),
            });
        }
        *cart = Cart::new();
    }

    /// Queue a full snapshot upload for a user.
    ///
    /// A user still pending a sign-in merge is merged instead, which may
    /// change `cart`.
    pub async fn resync(&self, cart: &mut Cart, user_id: UserId) {
        if self.unmerged.contains_key(&user_id) {
            self.merge_pending(cart, user_id).await;
            return;
        }
        self.dispatcher.send(SyncJob::Replace {
            user_id,
            cart: cart.clone(),
        });
    }

    pub async fn sync_status(&self, user_id: UserId) -> SyncStatus {
        let mut status = self.monitor.status(user_id).await;
        if self.unmerged.contains_key(&user_id) {
            status.remote_pending = true;
            status.degraded = true;
        }
        status
    }

    /// Wait for queued remote writes.
    pub async fn flush(&self) {
        self.dispatcher.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_monitor_record_and_clear() {
        let monitor = SyncMonitor::new();
        let user = UserId::new(1);
        assert!(!monitor.status(user).await.degraded);

        monitor
            .record_failure(user, &RepositoryError::NotFound)
            .await;
        let status = monitor.status(user).await;
        assert!(status.degraded);
        assert!(status.last_error.is_some());

        monitor.clear(user).await;
        assert!(!monitor.is_degraded(user).await);
    }
}

//! Cached view of the shipping settings table.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use kramnytsia_core::{ShippingRate, ShippingSelection, ShippingTier, select_tier};

use crate::db::{RepositoryError, ShippingRepository};

/// Admin edits show up on the storefront within this window.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Shipping rates, read from the database at most once per TTL.
#[derive(Clone)]
pub struct ShippingCatalog {
    pool: PgPool,
    cache: Cache<(), Arc<Vec<ShippingRate>>>,
}

impl ShippingCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: Cache::builder().max_capacity(1).time_to_live(CACHE_TTL).build(),
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the table cannot be read.
    pub async fn rates(&self) -> Result<Arc<Vec<ShippingRate>>, RepositoryError> {
        if let Some(rates) = self.cache.get(&()).await {
            return Ok(rates);
        }
        let rates = Arc::new(ShippingRepository::new(&self.pool).list().await?);
        self.cache.insert((), Arc::clone(&rates)).await;
        Ok(rates)
    }

    /// Resolve a tier for a destination, falling back from Express.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the table cannot be read.
    pub async fn quote(
        &self,
        country_code: &str,
        tier: ShippingTier,
    ) -> Result<ShippingSelection, RepositoryError> {
        let rates = self.rates().await?;
        Ok(select_tier(&rates, country_code, tier))
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}

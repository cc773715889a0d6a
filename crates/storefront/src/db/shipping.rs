//! Shipping settings (read side).

use sqlx::PgPool;

use kramnytsia_core::ShippingRate;

use super::RepositoryError;

pub struct ShippingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ShippingRate>, RepositoryError> {
        Ok(sqlx::query_as::<_, ShippingRate>(
            r"
            SELECT country_code, country_name, standard_price, express_price
            FROM shipping_settings
            ORDER BY country_code
            ",
        )
        .fetch_all(self.pool)
        .await?)
    }
}

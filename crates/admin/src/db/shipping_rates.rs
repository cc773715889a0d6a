//! Shipping settings table management.

use sqlx::PgPool;

use kramnytsia_core::ShippingRate;

use super::RepositoryError;

/// Repository for the `shipping_settings` table.
pub struct ShippingRateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRateRepository<'a> {
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

    /// Insert or replace the row for a country.
    ///
    /// The caller validates the row first (see [`ShippingRate::normalized`]).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, rate: &ShippingRate) -> Result<ShippingRate, RepositoryError> {
        Ok(sqlx::query_as::<_, ShippingRate>(
            r"
            INSERT INTO shipping_settings (country_code, country_name, standard_price, express_price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (country_code) DO UPDATE
            SET country_name = EXCLUDED.country_name,
                standard_price = EXCLUDED.standard_price,
                express_price = EXCLUDED.express_price,
                updated_at = NOW()
            RETURNING country_code, country_name, standard_price, express_price
            ",
        )
        .bind(&rate.country_code)
        .bind(&rate.country_name)
        .bind(rate.standard_price)
        .bind(rate.express_price)
        .fetch_one(self.pool)
        .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the country has no row.
    pub async fn delete(&self, country_code: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shipping_settings WHERE country_code = $1")
            .bind(country_code)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove every row whose country code is not in `keep`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_except(&self, keep: &[String]) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shipping_settings WHERE country_code <> ALL($1)")
            .bind(keep)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

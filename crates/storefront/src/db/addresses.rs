//! Address repository.
//!
//! The single-default rule is applied in Rust via [`apply_default`] inside a
//! transaction that locks the user's address rows first.

use sqlx::PgPool;

use kramnytsia_core::{Address, AddressDraft, AddressError, AddressId, UserId, apply_default};

use super::RepositoryError;

const COLUMNS: &str = "id, user_id, full_name, country_code, country_name, state, city, \
                       line1, line2, postal_code, phone, is_default";

pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All addresses for a user, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, id"
        );
        Ok(sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let sql = format!("SELECT {COLUMNS} FROM addresses WHERE user_id = $1 AND id = $2");
        Ok(sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// The user's default address, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_default(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM addresses WHERE user_id = $1 AND is_default LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Insert an address. A user's first address becomes their default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        draft: &AddressDraft,
    ) -> Result<Address, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO addresses
                (user_id, full_name, country_code, country_name, state, city,
                 line1, line2, postal_code, phone, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    NOT EXISTS (SELECT 1 FROM addresses WHERE user_id = $1))
            RETURNING {COLUMNS}
            "
        );
        Ok(bind_draft(sqlx::query_as::<_, Address>(&sql).bind(user_id), draft)
            .fetch_one(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        draft: &AddressDraft,
    ) -> Result<Address, RepositoryError> {
        let sql = format!(
            r"
            UPDATE addresses
            SET full_name = $2, country_code = $3, country_name = $4, state = $5, city = $6,
                line1 = $7, line2 = $8, postal_code = $9, phone = $10
            WHERE user_id = $1 AND id = $11
            RETURNING {COLUMNS}
            "
        );
        bind_draft(sqlx::query_as::<_, Address>(&sql).bind(user_id), draft)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Make `id` the user's only default address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Vec<Address>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY id FOR UPDATE"
        );
        let mut addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;

        let changed = apply_default(&mut addresses, id).map_err(|e| match e {
            AddressError::NotFound(_) => RepositoryError::NotFound,
            other => RepositoryError::DataCorruption(other.to_string()),
        })?;

        for address in addresses.iter().filter(|a| changed.contains(&a.id)) {
            sqlx::query("UPDATE addresses SET is_default = $1 WHERE id = $2")
                .bind(address.is_default)
                .bind(address.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(addresses)
    }
}

fn bind_draft<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, Address, sqlx::postgres::PgArguments>,
    draft: &'q AddressDraft,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, Address, sqlx::postgres::PgArguments> {
    query
        .bind(&draft.full_name)
        .bind(&draft.country_code)
        .bind(&draft.country_name)
        .bind(&draft.state)
        .bind(&draft.city)
        .bind(&draft.line1)
        .bind(&draft.line2)
        .bind(&draft.postal_code)
        .bind(&draft.phone)
}

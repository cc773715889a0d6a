//! Address book route handlers. All routes require sign-in.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use kramnytsia_core::{Address, AddressDraft, AddressError, AddressId};

use crate::db::{AddressRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

fn not_found(id: AddressId) -> impl FnOnce(RepositoryError) -> AppError {
    move |e| match e {
        RepositoryError::NotFound => AddressError::NotFound(id).into(),
        other => other.into(),
    }
}

/// GET /api/addresses
///
/// The default address comes first.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(AddressRepository::new(state.pool()).list(user.id).await?))
}

/// POST /api/addresses
///
/// A user's first address becomes their default.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(draft): Json<AddressDraft>,
) -> Result<(StatusCode, Json<Address>)> {
    let draft = draft.normalize()?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &draft)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// PUT /api/addresses/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Json(draft): Json<AddressDraft>,
) -> Result<Json<Address>> {
    let id = AddressId::new(id);
    let draft = draft.normalize()?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &draft)
        .await
        .map_err(not_found(id))?;
    Ok(Json(address))
}

/// DELETE /api/addresses/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let id = AddressId::new(id);
    if AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AddressError::NotFound(id).into())
    }
}

/// POST /api/addresses/{id}/default
///
/// Returns the full list with the new default flags.
pub async fn set_default(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Address>>> {
    let id = AddressId::new(id);
    let addresses = AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await
        .map_err(not_found(id))?;
    Ok(Json(addresses))
}

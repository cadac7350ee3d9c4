use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::owner::Owner;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::storage::models::{Account, IdentifierStrategy};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub created_at: String,
    pub identifier_strategy: IdentifierStrategy,
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub identifier_strategy: IdentifierStrategy,
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
) -> Result<Json<JSend<AccountResponse>>, ApiError> {
    let account = state.db.get_or_create_account(&owner_id)?;
    Ok(JSend::success(account_to_response(&account)))
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    AppJson(req): AppJson<UpdateAccountRequest>,
) -> Result<Json<JSend<AccountResponse>>, ApiError> {
    let account = state
        .db
        .set_identifier_strategy(&owner_id, req.identifier_strategy)?;

    tracing::info!(owner = %owner_id, strategy = ?account.identifier_strategy, "Updated identifier strategy");
    Ok(JSend::success(account_to_response(&account)))
}

fn account_to_response(account: &Account) -> AccountResponse {
    AccountResponse {
        created_at: account.created_at.to_rfc3339(),
        identifier_strategy: account.identifier_strategy,
        owner_id: account.owner_id.clone(),
    }
}

//! Transaction simulator handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use fraudwatch_core::models::{NewTransaction, Transaction};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/transactions - Most recent transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    Ok(Json(state.db.list_recent_transactions(limit)?))
}

/// POST /api/transactions - Insert a simulated transaction
pub async fn simulate_transaction(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewTransaction>,
) -> Result<Json<Transaction>, AppError> {
    let txn = state
        .db
        .insert_simulated_transaction(&payload)
        .map_err(AppError::from_core)?;

    info!(
        txn_id = %txn.txn_id,
        account_id = %txn.account_id,
        amount = txn.amount,
        txn_type = %txn.txn_type,
        "Simulated transaction inserted"
    );

    Ok(Json(txn))
}

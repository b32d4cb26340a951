use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let bus_ok = state.bus.ping().await.is_ok();
    Json(json!({
        "status": if db_ok && bus_ok { "ok" } else { "degraded" },
        "database": db_ok,
        "bus": bus_ok,
    }))
}

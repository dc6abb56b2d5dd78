use axum::extract::State;
use axum::Json;

use crate::interface_adapters::protocol::HealthResponse;
use crate::interface_adapters::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let totals = state.sweep_stats.totals();

    Json(HealthResponse {
        status: "ok",
        resident_game_sets: state.storage.len().await,
        sweeps: totals.cycles,
        flushed: totals.flushed,
        persist_failures: totals.persist_failures,
        evicted: totals.evicted,
    })
}

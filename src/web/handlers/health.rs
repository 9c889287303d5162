use salvo::http::StatusCode;
use salvo::prelude::*;
use serde_json::json;

use crate::db::SchemaStore;
use crate::web::web_state;

#[handler]
pub async fn health_check(res: &mut Response) {
    let state = web_state();
    let uptime_seconds = state.started_at.elapsed().as_secs();

    match state.db.schema_store().ping().await {
        Ok(()) => {
            res.render(Json(json!({
                "status": "ok",
                "uptime_seconds": uptime_seconds,
            })));
        }
        Err(err) => {
            res.status_code(StatusCode::SERVICE_UNAVAILABLE);
            res.render(Json(json!({
                "status": "degraded",
                "uptime_seconds": uptime_seconds,
                "error": err.to_string(),
            })));
        }
    }
}

#[handler]
pub async fn get_status(res: &mut Response) {
    let state = web_state();
    let uptime_seconds = state.started_at.elapsed().as_secs();
    let counts = state.db.schema_store().dataset_counts().await.ok();

    res.render(Json(json!({
        "dashboard": {
            "status": "running",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": uptime_seconds,
            "database": state.db.path().display().to_string(),
        },
        "dataset": counts.map(|c| json!({
            "sites": c.sites,
            "documents": c.documents,
            "narratives": c.narratives,
            "contacts": c.contacts,
        })),
    })));
}

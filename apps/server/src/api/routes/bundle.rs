use crate::api::handlers::bundle;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn bundle_routes() -> Router<AppState> {
    Router::new().route("/bundle/upload", post(bundle::upload_bundle))
}

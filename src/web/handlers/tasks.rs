use axum::{
    extract::{Json, Path, State},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::schedule::types::TaskRun;
use crate::schedule::TaskDispatcher;
use crate::web::ApiError;
use crate::AppContext;

pub fn tasks_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/tasks/:run_id", get(get_task))
        .with_state(ctx)
}

// Get run endpoint
async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(run_id): Path<String>,
) -> Result<Json<TaskRun>, ApiError> {
    match ctx.dispatcher.retrieve(&run_id).await? {
        Some(run) => Ok(Json(run)),
        None => Err(ApiError::not_found(format!("Task run not found: {}", run_id))),
    }
}

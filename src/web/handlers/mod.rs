use axum::Router;
use std::sync::Arc;
use crate::AppContext;

pub mod tasks;
pub mod trigger;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new().nest(
        "/api",
        trigger::trigger_router(ctx.clone()).merge(tasks::tasks_router(ctx)),
    )
}

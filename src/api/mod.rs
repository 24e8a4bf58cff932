pub mod middleware;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::{Router, middleware as axum_middleware};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::middleware::authenticate;
use crate::service::asset::{
    attach_detection_result, delete_image, list_images, rename_image, replace_image, upload_image,
};
use crate::service::user::{list_owners, login, register, update_account};
use crate::utils::state::AppState;

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login));

    let protected = Router::new()
        .route("/all", get(list_owners))
        .route("/update", put(update_account))
        .route("/images", get(list_images))
        .route("/upload-image", post(upload_image))
        .route("/image/detect", post(attach_detection_result))
        .route("/image/update-name", put(rename_image))
        .route("/image/update-file", put(replace_image))
        .route("/image/{image_name}", delete(delete_image))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            authenticate,
        ));

    let mut router = Router::new()
        .nest("/api", public.merge(protected))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http());

    // The filesystem backend serves its own objects.
    if state.config.storage_typ == "FILESYSTEM" {
        router = router.nest_service("/uploads", ServeDir::new(&state.config.root_dir));
    }

    router.with_state(state)
}

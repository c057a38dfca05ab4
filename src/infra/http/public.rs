use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header::LOCATION},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

use crate::{
    application::feed::FeedService,
    infra::assets::AssetDirectory,
    presentation::views::{
        AboutContext, AboutTemplate, HomeTemplate, LayoutChrome, LayoutContext, PostTemplate,
        PostsTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    middleware::{log_responses, set_request_context, throttle},
    rate_limit::RequestRateLimiter,
};

pub const NOT_FOUND_PATH: &str = "/notfound";

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub chrome: LayoutChrome,
    pub assets: Arc<AssetDirectory>,
    pub rate_limiter: RequestRateLimiter,
}

pub fn build_router(state: HttpState) -> Router {
    let limiter = state.rate_limiter.clone();

    Router::new()
        .route("/", get(home))
        .route("/posts", get(posts_index))
        .route("/posts/", get(untitled_post))
        .route("/posts/{key}", get(post_detail))
        .route("/about", get(about))
        .route(NOT_FOUND_PATH, get(not_found))
        .route("/assets/{*path}", get(serve_asset))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn_with_state(limiter, throttle))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn home(State(state): State<HttpState>) -> Response {
    let view = LayoutContext::new(state.chrome.clone(), "Home", state.feed.home());
    render_template_response(HomeTemplate { view }, StatusCode::OK)
}

async fn posts_index(State(state): State<HttpState>) -> Response {
    let view = LayoutContext::new(state.chrome.clone(), "Posts", state.feed.archive());
    render_template_response(PostsTemplate { view }, StatusCode::OK)
}

/// Untitled posts carry the empty key.
async fn untitled_post(State(state): State<HttpState>) -> Response {
    render_post(&state, "")
}

async fn post_detail(State(state): State<HttpState>, Path(key): Path<String>) -> Response {
    render_post(&state, &key)
}

fn render_post(state: &HttpState, key: &str) -> Response {
    match state.feed.post(key) {
        Some(content) => {
            let title = content.title.clone();
            let view = LayoutContext::new(state.chrome.clone(), title, content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        None => {
            debug!(target = "infra::http::public::post_detail", key = %key, "unknown post key");
            redirect_to_not_found()
        }
    }
}

async fn about(State(state): State<HttpState>) -> Response {
    let content = AboutContext {
        description: state.chrome.description.clone(),
    };
    let view = LayoutContext::new(state.chrome.clone(), "About", content);
    render_template_response(AboutTemplate { view }, StatusCode::OK)
}

async fn not_found(State(state): State<HttpState>) -> Response {
    render_not_found_response(state.chrome.clone())
}

async fn serve_asset(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    state.assets.respond(&path).await
}

async fn fallback() -> Response {
    redirect_to_not_found()
}

fn redirect_to_not_found() -> Response {
    let mut response = StatusCode::FOUND.into_response();
    response
        .headers_mut()
        .insert(LOCATION, HeaderValue::from_static(NOT_FOUND_PATH));
    response
}

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use ig_media_resolver::{ResolverConfig, ResolverService};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a mocked endpoint answers.
#[derive(Clone, Debug)]
pub enum Reply {
    Json(Value),
    Status(u16),
    NotJson,
    /// Never answers within any reasonable client timeout.
    Hang,
}

#[derive(Clone, Debug)]
pub enum ShareReply {
    /// Redirects through an intermediate hop before landing on the target.
    Redirect(String),
    Status(u16),
    Hang,
}

#[derive(Default)]
pub struct Hits {
    pub page_json: AtomicUsize,
    pub graphql: AtomicUsize,
    pub share: AtomicUsize,
    pub page_json_uris: Mutex<Vec<String>>,
    pub graphql_forms: Mutex<Vec<HashMap<String, String>>>,
}

impl Hits {
    pub fn total(&self) -> usize {
        self.page_json.load(Ordering::SeqCst)
            + self.graphql.load(Ordering::SeqCst)
            + self.share.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct AppState {
    page_json: Reply,
    graphql: Reply,
    share: ShareReply,
    hits: Arc<Hits>,
}

pub struct MockUpstream {
    pub base_url: String,
    pub hits: Arc<Hits>,
}

impl MockUpstream {
    pub async fn spawn(page_json: Reply, graphql: Reply, share: ShareReply) -> Self {
        let hits = Arc::new(Hits::default());
        let state = AppState {
            page_json,
            graphql,
            share,
            hits: hits.clone(),
        };

        let app = Router::new()
            .route("/p/:id/", get(page_json_handler))
            .route("/reel/:id/", get(page_json_handler))
            .route("/api/graphql", post(graphql_handler))
            .route("/share/:token/", get(share_handler))
            .route("/hop/:token/", get(hop_handler))
            .route("/accounts/login/", get(|| async { "<html>log in</html>" }))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    pub fn config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_domain("127.0.0.1")
            .with_base_url(self.base_url.clone())
            .with_doc_id("1234567890")
            .with_request_timeout(Duration::from_millis(500))
    }

    pub fn service(&self) -> ResolverService {
        ResolverService::new_with_config(self.config()).unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn reply(reply: &Reply) -> Response {
    match reply {
        Reply::Json(value) => Json(value.clone()).into_response(),
        Reply::Status(code) => StatusCode::from_u16(*code).unwrap().into_response(),
        Reply::NotJson => (StatusCode::OK, "<html>please log in</html>").into_response(),
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK.into_response()
        }
    }
}

async fn page_json_handler(State(state): State<AppState>, uri: Uri) -> Response {
    // a plain GET is a browser landing on the post after a share redirect
    if !uri.query().is_some_and(|q| q.contains("__a=1")) {
        return (StatusCode::OK, "<html>post page</html>").into_response();
    }
    state.hits.page_json.fetch_add(1, Ordering::SeqCst);
    state.hits.page_json_uris.lock().unwrap().push(uri.to_string());
    reply(&state.page_json).await
}

async fn graphql_handler(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.hits.graphql.fetch_add(1, Ordering::SeqCst);
    state.hits.graphql_forms.lock().unwrap().push(form);
    reply(&state.graphql).await
}

async fn share_handler(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    state.hits.share.fetch_add(1, Ordering::SeqCst);
    match &state.share {
        ShareReply::Redirect(_) => Redirect::temporary(&format!("/hop/{token}/")).into_response(),
        ShareReply::Status(code) => StatusCode::from_u16(*code).unwrap().into_response(),
        ShareReply::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK.into_response()
        }
    }
}

async fn hop_handler(State(state): State<AppState>) -> Response {
    match &state.share {
        ShareReply::Redirect(target) => Redirect::temporary(target).into_response(),
        ShareReply::Status(code) => StatusCode::from_u16(*code).unwrap().into_response(),
        ShareReply::Hang => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn single_image(url: &str) -> Value {
    serde_json::json!({
        "graphql": { "shortcode_media": {
            "__typename": "GraphImage",
            "is_video": false,
            "display_url": url,
            "dimensions": { "width": 1080, "height": 1080 }
        }}
    })
}

pub fn single_video_v1(url: &str) -> Value {
    serde_json::json!({
        "items": [{
            "media_type": 2,
            "original_width": 720,
            "original_height": 1280,
            "video_versions": [{ "url": url, "width": 720, "height": 1280 }],
            "image_versions2": { "candidates": [{ "url": "https://x/poster.jpg" }] }
        }]
    })
}

pub fn graphql_video(url: &str) -> Value {
    serde_json::json!({
        "data": { "xdt_shortcode_media": {
            "is_video": true,
            "video_url": url,
            "display_url": "https://x/poster.jpg",
            "dimensions": { "width": 720, "height": 1280 }
        }},
        "status": "ok"
    })
}

pub fn graphql_carousel(entries: &[(bool, &str)]) -> Value {
    let edges: Vec<Value> = entries
        .iter()
        .map(|(is_video, url)| {
            if *is_video {
                serde_json::json!({ "node": { "is_video": true, "video_url": url } })
            } else {
                serde_json::json!({ "node": { "is_video": false, "display_url": url } })
            }
        })
        .collect();
    serde_json::json!({
        "data": { "xdt_shortcode_media": {
            "edge_sidecar_to_children": { "edges": edges }
        }}
    })
}

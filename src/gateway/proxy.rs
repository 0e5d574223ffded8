//! Forwarding gateway: rewrites the target host and relays the response

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::AppState;

/// Build the gateway router. Every path and method falls through to the
/// forwarding handler.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Proxy one inbound request to a live backend
async fn forward(State(state): State<Arc<AppState>>, request: Request) -> Result<Response> {
    let backend = state.balancer.pick_live().await?;

    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await?;
    let url = rewrite_target(backend.address(), &parts.uri);

    let started = Instant::now();
    let result = state
        .client
        .request(parts.method.clone(), &url)
        .headers(outbound_headers(&parts.headers))
        .body(body)
        .send()
        .await;
    let elapsed = started.elapsed();

    if state.track_latency {
        backend.record_latency(elapsed);
    }

    let upstream = result?;
    let status = upstream.status();

    info!(
        method = %parts.method,
        path = %parts.uri.path(),
        backend = %backend.address(),
        status = %status,
        elapsed_ms = elapsed.as_millis() as u64,
        "proxied request"
    );

    let headers = relay_headers(upstream.headers());
    let body = upstream.bytes().await?;
    Ok((status, headers, body).into_response())
}

/// Swap in the backend's host:port, preserving path and query
fn rewrite_target(address: &str, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("http://{address}{path_and_query}")
}

/// Headers for the outbound request: everything except Host (rewritten) and
/// the hop-by-hop set
fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::new();
    for (name, value) in inbound.iter() {
        if *name == header::HOST || is_hop_by_hop(name) {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
    outbound
}

/// Headers relayed back to the caller. Content-Length is recomputed from
/// the buffered body, so it is dropped alongside the hop-by-hop set.
fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::new();
    for (name, value) in upstream.iter() {
        if *name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }
    relayed
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

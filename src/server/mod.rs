//! HTTP front end: `/` greeting and the `/mcp` transport endpoint

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use axum::Router;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::info;

use kakomcp_core::{ChannelReply, InboundRequest, ReplyBody, RequestMethod, TransportRouter, SESSION_HEADER};

/// Shared state accessible by all axum handlers
#[derive(Clone)]
struct AppState {
    router: Arc<TransportRouter>,
}

pub fn build_router(router: Arc<TransportRouter>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/mcp", any(mcp_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { router })
}

/// Bind `addr` and serve until ctrl-c
pub async fn serve(addr: &str, router: TransportRouter) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "MCP server listening on http://{}/mcp", addr);

    axum::serve(listener, build_router(Arc::new(router)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

async fn root_handler() -> &'static str {
    "Hello, MCP Server!"
}

async fn mcp_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let request = InboundRequest {
        session_id,
        method: request_method(&method),
        body: body.to_vec(),
    };
    into_response(state.router.handle(request).await)
}

fn request_method(method: &Method) -> RequestMethod {
    match *method {
        Method::GET => RequestMethod::Get,
        Method::POST => RequestMethod::Post,
        Method::DELETE => RequestMethod::Delete,
        _ => RequestMethod::Other,
    }
}

fn into_response(reply: ChannelReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = match reply.body {
        ReplyBody::Json(body) => (status, Json(body)).into_response(),
        ReplyBody::Empty => status.into_response(),
        ReplyBody::EventStream(events) => {
            // Lagged readers skip the notifications they missed
            let stream = BroadcastStream::new(events).filter_map(|event| {
                event
                    .ok()
                    .map(|value| Ok::<Event, Infallible>(Event::default().event("message").data(value.to_string())))
            });
            Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
        }
    };

    if let Some(value) = reply.session_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

// Copyright 2026 llm-web Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP surface.
//!
//! Two logical routes: `/` serves the entry document, and every other path
//! is a virtual URL handled by the [`AppContext`] pipeline. Both accept GET
//! and POST; POST bodies become form fields.

use crate::backend::BackendError;
use crate::pipeline::{AppContext, PipelineError};
use crate::resolver::{self, Resolved};
use crate::synth::FormFields;
use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Path, RawQuery, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Largest accepted request body (form posts).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", any(index))
        .route("/*path", any(virtual_page))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

/// Serve until the process is stopped.
pub async fn serve(addr: SocketAddr, ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ── Form extraction ─────────────────────────────────────────────

/// Form fields from a urlencoded or multipart body; empty otherwise.
pub struct Form(pub FormFields);

#[async_trait]
impl<S> FromRequest<S> for Form
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            let mut pairs = Vec::new();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(IntoResponse::into_response)?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                if field.file_name().is_some() {
                    continue;
                }
                let value = field.text().await.map_err(IntoResponse::into_response)?;
                pairs.push((name, value));
            }
            return Ok(Self(FormFields::from_pairs(pairs)));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let body = axum::body::Bytes::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            let pairs = url::form_urlencoded::parse(&body).into_owned();
            return Ok(Self(FormFields::from_pairs(pairs)));
        }

        Ok(Self(FormFields::default()))
    }
}

// ── Errors ──────────────────────────────────────────────────────

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::Backend(BackendError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Backend(_) => StatusCode::BAD_GATEWAY,
        };
        let body = format!("the generator could not produce this page: {self}");
        (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────

async fn index(State(ctx): State<Arc<AppContext>>) -> Html<String> {
    Html(ctx.index_html.clone())
}

async fn virtual_page(
    State(ctx): State<Arc<AppContext>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    Form(form): Form,
) -> Result<Response, PipelineError> {
    let url = match resolver::resolve(&path, query.as_deref(), None) {
        Resolved::Index => return Ok(Html(ctx.index_html.clone()).into_response()),
        Resolved::Favicon => return Ok(StatusCode::OK.into_response()),
        Resolved::Virtual(url) => url,
    };

    let delivered = ctx.serve(&url, &form).await?;
    Ok((
        [(header::CONTENT_TYPE, delivered.content_type)],
        delivered.content,
    )
        .into_response())
}

//! Routes and request handlers.
//!
//! Everything is mounted under the sandbox's URL prefix:
//!
//! - `POST {prefix}post` - multipart upload, destination in the `Hako-Path` header
//! - `POST {prefix}rpc` - `{"call": ..., "args": [...]}` mutation
//! - `GET {prefix}{path}` - listing when `path` ends in `/`, raw fetch otherwise
//!
//! Browsing never fails: an unresolvable directory serves the root listing.
//! Fetch, upload and RPC answer failures with an `error: ...` body.

use std::io;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::post;
use futures::TryStreamExt;
use hako_kernel::rpc::{self, RpcRequest, RpcResult};
use hako_kernel::{LocalBackend, VfsError, VfsResult, VirtualPath, render_listing};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::io::{ReaderStream, StreamReader};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, info_span, warn};

use crate::constants::{RPC_ENDPOINT, UPLOAD_ENDPOINT, UPLOAD_PATH_HEADER};
use crate::error::{ApiError, vfs_status};

#[derive(Clone)]
struct AppState {
    backend: Arc<LocalBackend>,
}

/// Build the router for one sandbox.
pub fn router(backend: LocalBackend) -> Router {
    let ctx = backend.context().clone();
    let state = AppState {
        backend: Arc::new(backend),
    };

    // Non-POST requests to the endpoint paths fall through to the
    // browse/fetch handler, so files named `post` or `rpc` stay reachable.
    Router::new()
        .route(
            &ctx.endpoint(UPLOAD_ENDPOINT),
            post(upload)
                .fallback(serve_path)
                .layer(DefaultBodyLimit::disable()),
        )
        .route(&ctx.endpoint(RPC_ENDPOINT), post(rpc_call).fallback(serve_path))
        .fallback(serve_path)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    info_span!(
                        "http",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, app: Router) -> io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Resolves on the first Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received termination signal, shutting down");
}

async fn serve_path(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return ApiError::MethodNotAllowed.into_response();
    }

    let Some(rest) = state.backend.context().strip_prefix(uri.path()) else {
        return ApiError::NotMounted.into_response();
    };

    if rest.ends_with('/') {
        browse(&state.backend, rest).await
    } else {
        fetch(&state.backend, rest)
            .await
            .unwrap_or_else(|e| e.into_response())
    }
}

async fn browse(backend: &LocalBackend, raw: &str) -> Response {
    let listing = match VirtualPath::from_url(raw) {
        Ok(dir) => render_dir(backend, &dir).await,
        Err(e) => Err(e),
    };

    match listing {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            debug!(path = raw, error = %e, "browse failed, serving root listing");
            match render_dir(backend, &VirtualPath::root()).await {
                Ok(html) => Html(html).into_response(),
                Err(e) => ApiError::from(e).into_response(),
            }
        }
    }
}

async fn render_dir(backend: &LocalBackend, dir: &VirtualPath) -> VfsResult<String> {
    let loc = backend.resolve(dir).await?;
    let entries = backend.list(&loc).await?;
    Ok(render_listing(backend.context(), dir, entries))
}

async fn fetch(backend: &LocalBackend, raw: &str) -> Result<Response, ApiError> {
    let path = VirtualPath::from_url(raw)?;
    let loc = backend.resolve(&path).await?;

    if loc.exists && loc.is_dir() {
        let entries = backend.list(&loc).await?;
        return Ok(Html(render_listing(backend.context(), &path, entries)).into_response());
    }

    let stream = backend.read(&loc).await?;
    let mime = mime_guess::from_path(path.file_name().unwrap_or_default()).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(mime.essence_str()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stream.size));
    if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(stream.mtime)) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    debug!(path = %path, size = stream.size, "fetch");
    Ok((
        StatusCode::OK,
        headers,
        Body::from_stream(ReaderStream::new(stream.file)),
    )
        .into_response())
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<&'static str, ApiError> {
    let raw = headers
        .get(UPLOAD_PATH_HEADER)
        .ok_or(ApiError::MissingDestination)?
        .to_str()
        .map_err(|_| VfsError::invalid_path(UPLOAD_PATH_HEADER))?;
    let path = VirtualPath::from_encoded_absolute(raw).inspect_err(|e| {
        debug!(header = raw, error = %e, "rejected upload destination");
    })?;

    let loc = state.backend.resolve(&path).await?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::MalformedUpload(e.body_text()))?
        .ok_or_else(|| ApiError::MalformedUpload("no file part".to_string()))?;
    let reader = StreamReader::new(field.map_err(|e| io::Error::other(e.to_string())));

    state.backend.write(&loc, reader).await?;
    Ok("ok")
}

async fn rpc_call(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "malformed rpc body");
            return ApiError::MalformedRequest.into_response();
        }
    };

    let outcome = rpc::execute(&state.backend, &request.call, &request.args).await;
    let status = match &outcome {
        Ok(()) => StatusCode::OK,
        Err(e) => vfs_status(e),
    };
    (status, RpcResult::from_outcome(&outcome).message).into_response()
}

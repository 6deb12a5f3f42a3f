// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-shot OAuth callback listener.
//!
//! Serves `GET /callback` on a loopback port until the first terminal
//! callback (a `code` or an `error`) arrives or the timeout fires. The
//! server is shut down and awaited on every exit path.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::AuthError;

/// How long to wait for in-flight connections after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>pedalcast - Connected</title></head>
<body>
<h1>Strava connected!</h1>
<p>You can close this window and return to the terminal.</p>
</body>
</html>"#;

const DENIED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>pedalcast - Not connected</title></head>
<body>
<h1>Authorization was not granted.</h1>
<p>You can close this window. Run <code>pedalcast auth login</code> to try again.</p>
</body>
</html>"#;

/// Terminal result of the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// User approved; `scope` is the comma-separated list Strava granted.
    Authorized { code: String, scope: Option<String> },
    /// Strava redirected back with an `error` parameter.
    Denied(String),
}

/// Query parameters Strava appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

struct CallbackState {
    expected_state: String,
    /// Taken by the first terminal callback; later requests find `None`.
    tx: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
}

/// Router serving only `GET /callback`; anything else is a 404.
pub fn router(expected_state: String, tx: oneshot::Sender<CallbackOutcome>) -> Router {
    let state = Arc::new(CallbackState {
        expected_state,
        tx: Mutex::new(Some(tx)),
    });

    Router::new()
        .route("/callback", get(handle_callback))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .with_state(state)
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let state_ok = params
        .state
        .as_deref()
        .is_some_and(|s| bool::from(s.as_bytes().ct_eq(state.expected_state.as_bytes())));
    if !state_ok {
        tracing::warn!("OAuth callback with missing or mismatched state, ignoring");
        return (StatusCode::BAD_REQUEST, "Invalid state parameter").into_response();
    }

    let (outcome, page) = match (params.error, params.code) {
        (Some(error), _) => (CallbackOutcome::Denied(error), DENIED_PAGE),
        (None, Some(code)) if !code.is_empty() => (
            CallbackOutcome::Authorized {
                code,
                scope: params.scope,
            },
            SUCCESS_PAGE,
        ),
        _ => return (StatusCode::BAD_REQUEST, "Missing code parameter").into_response(),
    };

    let tx = state
        .tx
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    let Some(tx) = tx else {
        return (StatusCode::CONFLICT, "Authorization already completed").into_response();
    };

    // Receiver is gone only if the flow already timed out.
    if tx.send(outcome).is_err() {
        return (StatusCode::GONE, "Authorization request expired").into_response();
    }

    ([(header::CONNECTION, "close")], Html(page)).into_response()
}

/// Serve the callback router on `listener` until the first terminal
/// callback or `timeout`, then shut the server down.
pub async fn wait_for_callback(
    listener: TcpListener,
    expected_state: String,
    timeout: Duration,
) -> Result<CallbackOutcome, AuthError> {
    let (tx, rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = router(expected_state, tx);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let result = tokio::time::timeout(timeout, rx).await;

    // Stop accepting, then give the confirmation page a moment to flush.
    let _ = shutdown_tx.send(());
    let abort = server.abort_handle();
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Callback listener exited with error"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Callback listener task failed"),
        Err(_) => {
            tracing::debug!("Callback listener did not drain in time, aborting");
            abort.abort();
        }
    }

    match result {
        Ok(Ok(outcome)) => Ok(outcome),
        // Sender dropped without sending: treat like a timeout.
        Ok(Err(_)) | Err(_) => Err(AuthError::Timeout(timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_code_completes_callback() {
        let (tx, mut rx) = oneshot::channel();
        let app = router("s1".to_string(), tx);

        let response = app
            .oneshot(request("/callback?state=s1&code=abc&scope=read,activity:read_all"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            rx.try_recv().unwrap(),
            CallbackOutcome::Authorized {
                code: "abc".to_string(),
                scope: Some("read,activity:read_all".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_error_param_denies() {
        let (tx, mut rx) = oneshot::channel();
        let app = router("s1".to_string(), tx);

        let response = app
            .oneshot(request("/callback?state=s1&error=access_denied"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            rx.try_recv().unwrap(),
            CallbackOutcome::Denied("access_denied".to_string())
        );
    }

    #[tokio::test]
    async fn test_state_mismatch_is_rejected_and_flow_keeps_waiting() {
        let (tx, mut rx) = oneshot::channel();
        let app = router("s1".to_string(), tx);

        let response = app
            .oneshot(request("/callback?state=evil&code=abc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_code_is_bad_request() {
        let (tx, _rx) = oneshot::channel();
        let app = router("s1".to_string(), tx);

        let response = app.oneshot(request("/callback?state=s1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_paths_are_not_found() {
        let (tx, _rx) = oneshot::channel();
        let app = router("s1".to_string(), tx);

        let response = app.oneshot(request("/favicon.ico")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_second_callback_is_ignored() {
        let (tx, mut rx) = oneshot::channel();
        let app = router("s1".to_string(), tx);

        let first = app
            .clone()
            .oneshot(request("/callback?state=s1&code=first"))
            .await
            .unwrap();
        let second = app
            .oneshot(request("/callback?state=s1&code=second"))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(
            rx.try_recv().unwrap(),
            CallbackOutcome::Authorized {
                code: "first".to_string(),
                scope: None,
            }
        );
    }

    #[tokio::test]
    async fn test_wait_for_callback_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result =
            wait_for_callback(listener, "s1".to_string(), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(AuthError::Timeout(_))));

        // Listener is gone after the timeout.
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}

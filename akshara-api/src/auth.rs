//! HTTP Basic auth for the administrative write endpoints. Only enforced
//! when accounts are enabled in the configuration.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::warn;

use akshara_core::error::Error;

use crate::error::ApiError;
use crate::server::SharedApp;

pub async fn basic_auth(
    State(app): State<SharedApp>,
    request: Request,
    next: Next,
) -> Response {
    if !app.config.accounts_enabled {
        return next.run(request).await;
    }

    match check_credentials(&app, request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!(error = %e, "rejected admin request");
            ApiError(e).into_response()
        }
    }
}

fn check_credentials(app: &SharedApp, headers: &HeaderMap) -> Result<(), Error> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| auth_err("authorization header not found"))?;

    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let encoded = parts.next().ok_or_else(|| auth_err("authorization header not found"))?;

    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(auth_err("authorization details not found"));
    }

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| auth_err("failed to decode authstring"))?;
    let credentials = String::from_utf8_lossy(&decoded).into_owned();

    let (user, password) = credentials
        .split_once(':')
        .ok_or_else(|| auth_err("failed to decode authstring"))?;

    let account = app
        .config
        .users
        .get(user.trim())
        .ok_or_else(|| auth_err("user not found"))?;

    if account.password != password.trim() {
        return Err(auth_err("password mismatch"));
    }

    Ok(())
}

fn auth_err(reason: &str) -> Error {
    Error::Auth { reason: reason.to_string() }
}

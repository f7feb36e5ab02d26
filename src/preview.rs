use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

pub const PREVIEW_COOKIE: &str = "preview_ref";
const PREVIEW_MAX_AGE_SECONDS: u64 = 60 * 60;

pub fn create_signed_cookie(secret: &str, value: &str) -> Result<String, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "Invalid secret key")?;
    mac.update(value.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{}:{}", value, signature_b64))
}

/// Returns the signed value when the signature checks out.
pub fn verify_signed_cookie(secret: &str, signed_value: &str) -> Option<String> {
    let (value, signature_b64) = signed_value.rsplit_once(':')?;
    let signature = general_purpose::URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(value.as_bytes());
    mac.verify_slice(&signature).ok()?;
    Some(value.to_string())
}

pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get("cookie")?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
}

/// Preview refs can hold characters that are not valid in a cookie value,
/// so the ref is base64 encoded before signing.
pub fn encode_preview_cookie(secret: &str, preview_ref: &str) -> Result<String, String> {
    let encoded = general_purpose::URL_SAFE_NO_PAD.encode(preview_ref);
    create_signed_cookie(secret, &encoded)
}

/// The preview ref carried by the request, if any. Unsigned or tampered
/// cookies are ignored.
pub fn preview_ref(headers: &HeaderMap, secret: &str) -> Option<String> {
    let signed_value = get_cookie_value(headers, PREVIEW_COOKIE)?;
    let Some(encoded) = verify_signed_cookie(secret, &signed_value) else {
        warn!("Ignoring preview cookie with an invalid signature");
        return None;
    };
    let decoded = general_purpose::URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(decoded).ok().filter(|r| !r.is_empty())
}

#[derive(Deserialize)]
pub struct PreviewQuery {
    token: Option<String>,
    slug: Option<String>,
}

/// Starts preview mode: keeps the preview ref in a signed cookie and sends
/// the browser to the previewed post.
pub async fn preview_handler(
    State(app_state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing preview token").into_response();
    };

    let signed = match encode_preview_cookie(&app_state.config.app.preview_secret, &token) {
        Ok(signed) => signed,
        Err(e) => {
            tracing::error!("Failed to sign preview cookie: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
        }
    };

    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        PREVIEW_COOKIE, signed, PREVIEW_MAX_AGE_SECONDS
    );

    let location = match query.slug.filter(|s| !s.is_empty()) {
        Some(slug) => format!("/post/{}", urlencoding::encode(&slug)),
        None => "/".to_string(),
    };

    info!("Entering preview mode, redirecting to {}", location);

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.insert(SET_COOKIE, value);
        }
        Err(e) => {
            tracing::error!("Invalid preview cookie header: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
        }
    }

    (headers, Redirect::to(&location)).into_response()
}

/// Leaves preview mode and returns to the listing.
pub async fn exit_preview_handler() -> Response {
    info!("Exiting preview mode");

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        HeaderValue::from_static("preview_ref=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"),
    );

    (headers, Redirect::to("/")).into_response()
}

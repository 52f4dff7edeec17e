//!
//! Utility types and functions shared across the crate.
//!
//! This module provides:
//! - [`RequestIdGenerator`] - Generates or preserves request IDs for distributed tracing
//! - [`replace_handlebars_with_env`] - Template substitution for environment variables
//! - Path helpers for trailing-slash conventions and single-pass percent decoding
//!

use {
    http::{HeaderValue, Request},
    regex::{Captures, Regex},
    std::{borrow::Cow, env, sync::LazyLock},
    tower_http::request_id::{MakeRequestId, RequestId},
    uuid::{ContextV7, Timestamp, Uuid},
};

/// Regular expression pattern for matching handlebars-style environment variable references.
/// Matches patterns like `{{ VAR_NAME }}` with optional whitespace around the variable name.
static HANDLEBAR_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").unwrap());

/// Request ID generator for request correlation.
///
/// Preserves an existing `x-request-id` header or generates a new UUIDv7.
///
/// ```
/// use axum_login_shield::RequestIdGenerator;
/// use tower_http::request_id::SetRequestIdLayer;
///
/// let layer = SetRequestIdLayer::x_request_id(RequestIdGenerator);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, req: &Request<B>) -> Option<RequestId> {
        match req.headers().get("x-request-id") {
            Some(value) => Some(RequestId::new(value.clone())),
            None => {
                let cx = ContextV7::new().with_additional_precision();
                let uuid = Uuid::new_v7(Timestamp::now(cx));
                let value = HeaderValue::from_str(&uuid.to_string()).ok()?;
                Some(RequestId::new(value))
            }
        }
    }
}

/// Replaces handlebars-style placeholders with environment variable values.
///
/// Searches through the input string for patterns like `{{ VAR_NAME }}` and replaces
/// them with the corresponding environment variable value. Missing variables are
/// replaced with an empty string and logged at `warn`.
///
/// ```
/// use axum_login_shield::replace_handlebars_with_env;
///
/// let template = "Value: {{ MISSING_LOGIN_SHIELD_VAR }}";
/// assert_eq!(replace_handlebars_with_env(template), "Value: ");
/// ```
pub fn replace_handlebars_with_env(input: &str) -> String {
    HANDLEBAR_REGEXP
        .replace_all(input, |caps: &Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!(
                    variable = %var_name,
                    "Environment variable not found, substituting with empty string"
                );
                String::new()
            })
        })
        .to_string()
}

/// Appends a single trailing slash, collapsing any existing ones.
pub(crate) fn trailing_slash_it(value: &str) -> String {
    format!("{}/", untrailing_slash_it(value))
}

/// Removes every trailing slash (and backslash) from the value.
pub(crate) fn untrailing_slash_it(value: &str) -> &str {
    value.trim_end_matches(['/', '\\'])
}

/// Percent-decodes a raw path or query exactly once.
///
/// Invalid UTF-8 produced by decoding is replaced rather than rejected so that a
/// malformed request still gets classified. The result is never decoded again.
pub(crate) fn decode_once(raw: &str) -> Cow<'_, str> {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded,
        Err(_) => {
            let bytes = urlencoding::decode_binary(raw.as_bytes());
            Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

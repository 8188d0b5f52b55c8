//! Numeric user id lookup for the per-user flow endpoint.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

/// `data[0].id`, falling back to `data[0].user_id`, from a `GET /me` body.
pub(crate) fn user_id_from_profile(body: &Value) -> Option<u64> {
    let first = body.get("data")?.as_array()?.first()?;
    first
        .get("id")
        .and_then(numeric_id)
        .or_else(|| first.get("user_id").and_then(numeric_id))
}

/// `user_id` claim of a JWT access token. The signature is not checked.
pub(crate) fn user_id_from_jwt(token: &str) -> Option<u64> {
    let mut parts = token.split('.');
    let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    claims.get("user_id").and_then(numeric_id)
}

fn numeric_id(value: &Value) -> Option<u64> {
    let id = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64().filter(|f| f.is_finite() && *f >= 1.0).map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (id != 0).then_some(id)
}

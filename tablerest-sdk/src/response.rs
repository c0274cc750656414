//! Client-side result normalization
//!
//! Every terminal call ends here: transport failures, error statuses and
//! success bodies all become a [`ResultEnvelope`].

use serde_json::Value as JsonValue;
use tracing::warn;

use tablerest_common::types::ResultEnvelope;

/// Normalize the outcome of a single HTTP request
pub async fn normalize(result: reqwest::Result<reqwest::Response>) -> ResultEnvelope {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "request never reached the server");
            return ResultEnvelope::transport_failure(e.to_string());
        }
    };

    let status = response.status();
    match response.bytes().await {
        Ok(body) => from_parts(status.as_u16(), status.canonical_reason(), &body),
        Err(e) => ResultEnvelope::failure(e.to_string(), status.as_u16()),
    }
}

/// Build an envelope from a received status line and body
pub fn from_parts(status: u16, reason: Option<&str>, body: &[u8]) -> ResultEnvelope {
    let success = (200..300).contains(&status);

    let mut envelope = if status == 204 || body.iter().all(u8::is_ascii_whitespace) {
        ResultEnvelope::empty(status)
    } else {
        match serde_json::from_slice::<JsonValue>(body) {
            Ok(JsonValue::Object(object))
                if ["data", "count", "error"].iter().any(|k| object.contains_key(*k)) =>
            {
                ResultEnvelope {
                    data: object.get("data").filter(|d| !d.is_null()).cloned(),
                    count: object.get("count").and_then(JsonValue::as_u64),
                    error: object
                        .get("error")
                        .and_then(JsonValue::as_str)
                        .map(ToString::to_string),
                    status,
                }
            }
            Ok(other) => ResultEnvelope::ok(other, status),
            Err(e) if success => {
                ResultEnvelope::failure(format!("Invalid JSON response: {e}"), status)
            }
            Err(_) => ResultEnvelope::empty(status),
        }
    };

    if !success && envelope.error.is_none() {
        envelope.data = None;
        envelope.error = Some(format!(
            "{} ({})",
            reason.unwrap_or("Unknown Status"),
            status
        ));
    }

    envelope
}

/// Require exactly one row; a mismatch keeps `data` for diagnostics
pub fn single(mut envelope: ResultEnvelope) -> ResultEnvelope {
    if envelope.error.is_some() {
        return envelope;
    }

    match envelope.data.take() {
        Some(JsonValue::Array(mut rows)) if rows.len() == 1 => {
            envelope.data = rows.pop();
        }
        Some(JsonValue::Array(rows)) => {
            envelope.error = Some(format!("Single record expected, got {}", rows.len()));
            envelope.data = Some(JsonValue::Array(rows));
        }
        Some(row) => envelope.data = Some(row),
        None => envelope.error = Some("Single record expected, got 0".to_string()),
    }
    envelope
}

/// Accept zero or one row; zero rows yield `data: null`
pub fn maybe_single(mut envelope: ResultEnvelope) -> ResultEnvelope {
    if envelope.error.is_some() {
        return envelope;
    }

    match envelope.data.take() {
        Some(JsonValue::Array(mut rows)) if rows.len() <= 1 => {
            envelope.data = rows.pop();
        }
        Some(JsonValue::Array(rows)) => {
            envelope.error = Some(format!(
                "MaybeSingle expected 0 or 1 row, got {}",
                rows.len()
            ));
            envelope.data = Some(JsonValue::Array(rows));
        }
        other => envelope.data = other,
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list(rows: JsonValue) -> ResultEnvelope {
        ResultEnvelope::ok(rows, 200)
    }

    #[test]
    fn test_structured_body() {
        let envelope = from_parts(
            200,
            Some("OK"),
            br#"{"data": [{"id": 1}], "count": 7, "error": null}"#,
        );
        assert_eq!(envelope.data, Some(json!([{"id": 1}])));
        assert_eq!(envelope.count, Some(7));
        assert!(envelope.is_ok());
        assert_eq!(envelope.status, 200);
    }

    #[test]
    fn test_error_body_is_kept() {
        let envelope = from_parts(
            409,
            Some("Conflict"),
            br#"{"data": null, "count": null, "error": "Duplicate key: id=1"}"#,
        );
        assert_eq!(envelope.error.as_deref(), Some("Duplicate key: id=1"));
        assert_eq!(envelope.data, None);
        assert_eq!(envelope.status, 409);
    }

    #[test]
    fn test_error_synthesized_from_status() {
        let envelope = from_parts(502, Some("Bad Gateway"), b"<html>upstream down</html>");
        assert_eq!(envelope.error.as_deref(), Some("Bad Gateway (502)"));
        assert_eq!(envelope.data, None);

        let envelope = from_parts(418, None, b"");
        assert_eq!(envelope.error.as_deref(), Some("Unknown Status (418)"));
    }

    #[test]
    fn test_no_content() {
        let envelope = from_parts(204, Some("No Content"), b"");
        assert_eq!(envelope, ResultEnvelope::empty(204));
    }

    #[test]
    fn test_single() {
        let envelope = single(list(json!([{"id": 1}])));
        assert_eq!(envelope.data, Some(json!({"id": 1})));
        assert!(envelope.is_ok());

        let envelope = single(list(json!([])));
        assert_eq!(envelope.data, Some(json!([])));
        assert_eq!(envelope.error.as_deref(), Some("Single record expected, got 0"));

        let envelope = single(list(json!([{"id": 1}, {"id": 2}])));
        assert_eq!(envelope.data, Some(json!([{"id": 1}, {"id": 2}])));
        assert_eq!(envelope.error.as_deref(), Some("Single record expected, got 2"));
    }

    #[test]
    fn test_maybe_single() {
        let envelope = maybe_single(list(json!([])));
        assert_eq!(envelope.data, None);
        assert!(envelope.is_ok());

        let envelope = maybe_single(list(json!([{"id": 3}])));
        assert_eq!(envelope.data, Some(json!({"id": 3})));

        let envelope = maybe_single(list(json!([{"id": 1}, {"id": 2}, {"id": 3}])));
        assert_eq!(
            envelope.error.as_deref(),
            Some("MaybeSingle expected 0 or 1 row, got 3")
        );
    }

    #[test]
    fn test_shaping_passes_errors_through() {
        let failed = ResultEnvelope::transport_failure("connection refused");
        assert_eq!(single(failed.clone()), failed);
        assert_eq!(maybe_single(failed.clone()), failed);
    }
}

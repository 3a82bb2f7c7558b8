use serde_json::Value;

/// Extracts a human readable failure reason from a provider error response.
///
/// Looked up in order: a flat `error` string, a `detail` string, the `msg`
/// of the first entry of a `detail` validation list, a `message` string.
/// Falls back to the trimmed body, then to a generic status message.
pub fn extract_error_message(body: &str, status: u16) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = non_empty_str(fields.get("error")) {
            return msg;
        }
        match fields.get("detail") {
            Some(Value::String(detail)) if !detail.is_empty() => return detail.clone(),
            Some(Value::Array(entries)) => {
                if let Some(msg) = non_empty_str(entries.first().and_then(|e| e.get("msg"))) {
                    return msg;
                }
            }
            _ => {}
        }
        if let Some(msg) = non_empty_str(fields.get("message")) {
            return msg;
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("trading service returned status {}", status)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

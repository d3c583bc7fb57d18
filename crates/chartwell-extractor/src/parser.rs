//! Parse model output into a structured JSON object

use crate::CapabilityError;
use serde_json::Value;

/// Parse a model response into a JSON object
///
/// Tolerates markdown code fences and prose around the object.
pub fn parse_object(response: &str) -> Result<Value, CapabilityError> {
    let json_str = extract_json(response)?;

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| CapabilityError::InvalidOutput(format!("JSON parse error: {}", e)))?;

    if !value.is_object() {
        return Err(CapabilityError::InvalidOutput(
            "Expected JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Extract the JSON text from a response, handling markdown code blocks
fn extract_json(response: &str) -> Result<&str, CapabilityError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(CapabilityError::InvalidOutput("Empty response".to_string()));
    }

    // Fenced block anywhere in the response
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
        let body = &after_fence[body_start..];
        let body = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        let body = body.trim();
        if body.is_empty() {
            return Err(CapabilityError::InvalidOutput("Empty code block".to_string()));
        }
        return Ok(body);
    }

    if trimmed.starts_with('{') {
        return Ok(trimmed);
    }

    // Prose around a bare object
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(CapabilityError::InvalidOutput(
            "No JSON object in response".to_string(),
        )),
    }
}

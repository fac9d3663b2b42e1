//! JSON Schema (Draft 7) guard for response payloads.
//!
//! The success schema is embedded at compile time from
//! `schemas/matrix-response.json`.

use once_cell::sync::Lazy;
use serde_json::Value;

static MATRIX_RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/matrix-response.json"))
        .expect("Invalid embedded schema")
});

/// Validate `data` against `schema`.
///
/// Returns every violation message on failure.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a serialized `MatrixResponse`.
pub fn validate_matrix_response(data: &Value) -> Result<(), Vec<String>> {
    validate(&MATRIX_RESPONSE_SCHEMA, data)
}

pub fn is_valid_matrix_response(data: &Value) -> bool {
    is_valid(&MATRIX_RESPONSE_SCHEMA, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> Value {
        json!({
            "runId": "0b6f3c1e-8a8e-4f53-9d0e-2f1c8b7a6d55",
            "status": "success",
            "department": "CE",
            "college": "LDRP-ITR",
            "processedAt": "2026-01-05T09:30:00Z",
            "schedule": {
                "CE": { "JS": { "DS": [
                    { "division": "A", "day": "Monday", "timeSlot": 1, "lectureType": "Lecture" }
                ] } }
            },
            "catalog": {
                "LDRP-ITR": { "CE": { "-": { "A": { "DS": {
                    "lectures": { "designatedFaculty": "JS" },
                    "labs": {}
                } } } } }
            },
            "rejections": { "entries": [], "blocks": [] },
            "metadata": {
                "blocksProcessed": 1,
                "blocksMalformed": 0,
                "entriesValid": 1,
                "entriesRejected": 0
            }
        })
    }

    #[test]
    fn test_valid_response() {
        assert!(is_valid_matrix_response(&response()));
        assert!(validate_matrix_response(&response()).is_ok());
    }

    #[test]
    fn test_empty_schedule_rejected() {
        let mut data = response();
        data["schedule"] = json!({});
        assert!(!is_valid_matrix_response(&data));
    }

    #[test]
    fn test_unknown_lecture_type_rejected() {
        let mut data = response();
        data["schedule"]["CE"]["JS"]["DS"][0]["lectureType"] = json!("Unknown");
        let errors = validate_matrix_response(&data).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_slot_must_be_positive() {
        let mut data = response();
        data["schedule"]["CE"]["JS"]["DS"][0]["timeSlot"] = json!(0);
        assert!(!is_valid_matrix_response(&data));
    }

    #[test]
    fn test_generic_validate() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        });
        assert!(validate(&schema, &json!({ "name": "CE" })).is_ok());
        assert!(validate(&schema, &json!({ "age": 42 })).is_err());
    }
}

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::BarneyError;

/// `axum::Json` with rejections reported in the service's error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(BarneyError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for BarneyError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> BarneyError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                BarneyError::Validation(format!("Missing required field: {field}"))
            } else {
                BarneyError::Validation(format!("Invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            BarneyError::Validation(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => {
            BarneyError::Validation("Missing `Content-Type: application/json` header".to_string())
        }
        JsonRejection::BytesRejection(err) => {
            BarneyError::Validation(format!("Failed to read request body: {}", err.body_text()))
        }
        _ => BarneyError::Validation(rejection.body_text()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}

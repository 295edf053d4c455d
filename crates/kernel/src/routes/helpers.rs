//! Shared route helpers.

use axum::Extension;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::services::UserContext;

/// Caller identity set by the bearer middleware; anonymous when absent.
pub fn current_user(user: Option<Extension<UserContext>>) -> UserContext {
    user.map(|Extension(u)| u).unwrap_or_default()
}

/// Decode a JSON body, reporting shape errors as validation failures.
pub fn parse_body<T: DeserializeOwned>(body: Value) -> AppResult<T> {
    serde_json::from_value(body)
        .map_err(|e| AppError::validation(format!("invalid request body: {e}")))
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn bad_body_is_validation_error() {
        let err = parse_body::<Vec<String>>(serde_json::json!({"a": 1})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn missing_user_is_anonymous() {
        assert!(!current_user(None).authenticated);
    }
}

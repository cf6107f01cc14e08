use thiserror::Error;

/// Media type the record decoders accept.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Reasons a write request is turned away before decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} METHOD is not applicable")]
    ReadOnlyMethod(String),
    #[error("Only json data is allowed")]
    UnsupportedContentType,
}

/// Decide whether a write may proceed given its method and declared content type.
///
/// The method is checked first. Media type parameters such as `charset` are ignored.
pub fn validate_write(method: &str, content_type: Option<&str>) -> Result<(), ValidationError> {
    let method = method.trim().to_ascii_uppercase();
    if is_read_only(&method) {
        return Err(ValidationError::ReadOnlyMethod(method));
    }

    match content_type.map(media_type_essence) {
        Some(essence) if essence.eq_ignore_ascii_case(JSON_CONTENT_TYPE) => Ok(()),
        _ => Err(ValidationError::UnsupportedContentType),
    }
}

fn is_read_only(method: &str) -> bool {
    matches!(method, "GET" | "HEAD")
}

fn media_type_essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_json_post() {
        assert_eq!(validate_write("POST", Some("application/json")), Ok(()));
        assert_eq!(
            validate_write("put", Some("Application/JSON; charset=utf-8")),
            Ok(())
        );
    }

    #[test]
    fn rejects_read_only_methods_first() {
        let err = validate_write("GET", Some("text/plain")).expect_err("GET must fail");
        assert_eq!(err, ValidationError::ReadOnlyMethod("GET".into()));
        assert_eq!(err.to_string(), "GET METHOD is not applicable");

        let err = validate_write("head", None).expect_err("HEAD must fail");
        assert_eq!(err.to_string(), "HEAD METHOD is not applicable");
    }

    #[test]
    fn rejects_missing_or_foreign_content_type() {
        for content_type in [None, Some(""), Some("text/plain"), Some("application/jsonp")] {
            let err = validate_write("POST", content_type).expect_err("should reject");
            assert_eq!(err, ValidationError::UnsupportedContentType);
            assert_eq!(err.to_string(), "Only json data is allowed");
        }
    }
}

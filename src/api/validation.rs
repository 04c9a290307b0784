use super::ApiError;

pub fn validate_id(id: i32, resource: &str) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid {} ID: {}. ID must be a positive integer",
            resource, id
        )));
    }
    Ok(id)
}

pub fn validate_required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    Ok(value)
}

/// Redirect targets must be absolute http(s) URLs.
pub fn validate_redirect_uri(uri: &str) -> Result<&str, ApiError> {
    let parsed = url::Url::parse(uri)
        .map_err(|_| ApiError::validation(format!("Invalid redirect URI: {}", uri)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::validation(
            "Redirect URI must use http or https",
        ));
    }
    Ok(uri)
}

pub fn validate_provider_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Provider name cannot be empty"));
    }

    if trimmed.len() > 64 {
        return Err(ApiError::validation(
            "Provider name must be 64 characters or less",
        ));
    }

    Ok(trimmed)
}

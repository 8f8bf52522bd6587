pub use masterror::{AppError, AppResult};

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create database connection error (fatal at startup)
pub fn connection_error(message: impl Into<String>) -> AppError {
    AppError::service(format!("Database connection failed: {}", message.into()))
}

/// Create database error, keeping the driver message with position info
pub fn database_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("Database error", &msg))
}

/// Create LLM API error
pub fn llm_api_error(message: impl Into<String>) -> AppError {
    AppError::service(message.into())
}

/// Create HTTP error
pub fn http_error(err: reqwest::Error) -> AppError {
    let msg = if err.is_timeout() {
        format!("Request timeout: {}", err)
    } else if err.is_connect() {
        format!("Connection failed: {}", err)
    } else if err.is_status() {
        format!("HTTP error {}: {}", err.status().unwrap_or_default(), err)
    } else {
        err.to_string()
    };
    AppError::service(msg)
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Format SQL error with position highlighting
fn format_sql_error(prefix: &str, message: &str) -> String {
    // MySQL reports syntax errors as "... near '...' at line X"
    if let Some(line) = extract_line(message) {
        format!("{} at line {}:\n  {}", prefix, line, message)
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

fn extract_line(message: &str) -> Option<usize> {
    let marker = "at line ";
    let start = message.rfind(marker)? + marker.len();
    let rest = &message[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

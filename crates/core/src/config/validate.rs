use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Converter timeout is positive
/// - Engine path and PDF paper size are not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Converter validation
    let converter = &config.converter;
    if converter.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "converter.timeout_secs must be greater than 0".to_string(),
        ));
    }
    if converter.engine_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.engine_path cannot be empty".to_string(),
        ));
    }
    if converter.pdf_paper_size.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.pdf_paper_size cannot be empty".to_string(),
        ));
    }

    Ok(())
}

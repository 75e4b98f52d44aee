//! Error types for Pagecast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PagecastError>;

#[derive(Error, Debug)]
pub enum PagecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PagecastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PagecastError::InvalidInput(_) => 3,
            PagecastError::Platform(PlatformError::Authentication(_)) => 2,
            PagecastError::Platform(_) => 1,
            PagecastError::Config(_) => 1,
            PagecastError::Database(_) => 1,
            PagecastError::Media(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Media storage failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = PagecastError::InvalidInput("Please select at least one page".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = PagecastError::Platform(PlatformError::Authentication(
            "Invalid OAuth access token".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_platform_errors() {
        for platform_error in [
            PlatformError::Posting("test".to_string()),
            PlatformError::Network("test".to_string()),
            PlatformError::Validation("test".to_string()),
            PlatformError::RateLimit("test".to_string()),
        ] {
            assert_eq!(PagecastError::Platform(platform_error).exit_code(), 1);
        }
    }

    #[test]
    fn test_exit_code_media_and_database_errors() {
        let media = PagecastError::Media(MediaError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )));
        assert_eq!(media.exit_code(), 1);

        let db = PagecastError::Database(DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        )));
        assert_eq!(db.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting() {
        let error = PagecastError::InvalidInput("Please write a message or upload a file".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid input: Please write a message or upload a file"
        );

        let error: PagecastError = PlatformError::Posting("photo upload rejected".to_string()).into();
        assert_eq!(error.to_string(), "Platform error: Posting failed: photo upload rejected");

        let error: PagecastError = ConfigError::MissingField("database.path".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Configuration error: Missing required field: database.path"
        );

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "clip.mp4");
        let error: PagecastError = MediaError::Io(io).into();
        assert_eq!(error.to_string(), "Media error: Media storage failed: clip.mp4");
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();
        assert_eq!(original.to_string(), cloned.to_string());
    }
}

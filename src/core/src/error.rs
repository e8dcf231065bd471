use thiserror::Error;

/// Stackport error types
#[derive(Error, Debug)]
pub enum RebaseError {
    /// Requested or default stack id is not configured
    #[error("Stack not found: '{stack_id}'")]
    StackNotFound { stack_id: String },

    /// Stack is configured but cannot yield a base image
    #[error("Invalid stack '{stack_id}': {message}")]
    InvalidStack { stack_id: String, message: String },

    /// Refreshing an image from its registry failed
    #[error("Pull failed: {reference} - {message}")]
    PullFailed { reference: String, message: String },

    /// Reading an image failed
    #[error("Image not found: {reference} - {message}")]
    ImageNotFound { reference: String, message: String },

    /// A writable store for the repository could not be obtained
    #[error("Store unavailable: {reference} - {message}")]
    StoreUnavailable { reference: String, message: String },

    /// Provenance label is absent from the image
    #[error("Lifecycle metadata missing on {reference}")]
    MetadataMissing { reference: String },

    /// Provenance label is present but unusable
    #[error("Lifecycle metadata malformed on {reference}: {message}")]
    MetadataMalformed { reference: String, message: String },

    /// No layer of the image matches the recorded run image digest
    #[error("Base layer not found: no layer of {reference} matches {digest}")]
    BaseLayerNotFound { reference: String, digest: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// OCI image error
    #[error("OCI image error: {0}")]
    OciImageError(String),

    /// Container registry error
    #[error("Registry error: {registry} - {message}")]
    RegistryError { registry: String, message: String },
}

impl From<serde_json::Error> for RebaseError {
    fn from(err: serde_json::Error) -> Self {
        RebaseError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for RebaseError {
    fn from(err: toml::de::Error) -> Self {
        RebaseError::ConfigError(err.to_string())
    }
}

/// Result type alias for stackport operations
pub type Result<T> = std::result::Result<T, RebaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_not_found_display() {
        let error = RebaseError::StackNotFound {
            stack_id: "some.missing.stack".to_string(),
        };
        assert_eq!(error.to_string(), "Stack not found: 'some.missing.stack'");
    }

    #[test]
    fn test_invalid_stack_display() {
        let error = RebaseError::InvalidStack {
            stack_id: "some.bad.stack".to_string(),
            message: "requires at least one build image".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid stack 'some.bad.stack': requires at least one build image"
        );
    }

    #[test]
    fn test_pull_failed_display() {
        let error = RebaseError::PullFailed {
            reference: "default/build".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Pull failed: default/build - connection refused"
        );
    }

    #[test]
    fn test_image_not_found_display() {
        let error = RebaseError::ImageNotFound {
            reference: "some/image".to_string(),
            message: "not in local store".to_string(),
        };
        assert!(error.to_string().contains("some/image"));
    }

    #[test]
    fn test_store_unavailable_display() {
        let error = RebaseError::StoreUnavailable {
            reference: "registry.com/some/image".to_string(),
            message: "invalid reference".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Store unavailable: registry.com/some/image - invalid reference"
        );
    }

    #[test]
    fn test_metadata_missing_display() {
        let error = RebaseError::MetadataMissing {
            reference: "some/image".to_string(),
        };
        assert_eq!(error.to_string(), "Lifecycle metadata missing on some/image");
    }

    #[test]
    fn test_base_layer_not_found_display() {
        let error = RebaseError::BaseLayerNotFound {
            reference: "some/image".to_string(),
            digest: "abcdef".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Base layer not found: no layer of some/image matches abcdef"
        );
    }

    #[test]
    fn test_registry_error_display() {
        let error = RebaseError::RegistryError {
            registry: "ghcr.io".to_string(),
            message: "Authentication failed".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Registry error: ghcr.io - Authentication failed"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: RebaseError = io_error.into();
        assert!(matches!(error, RebaseError::IoError(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ invalid");
        let error: RebaseError = result.unwrap_err().into();
        assert!(matches!(error, RebaseError::SerializationError(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let result: std::result::Result<toml::Value, _> = toml::from_str("stacks = [");
        let error: RebaseError = result.unwrap_err().into();
        assert!(matches!(error, RebaseError::ConfigError(_)));
    }
}

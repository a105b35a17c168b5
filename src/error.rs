use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentrycamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Classification upload failed: {details}")]
    Upload { details: String },

    #[error("Publish failed on '{topic}': {details}")]
    Publish { topic: String, details: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SentrycamError {
    pub fn upload<S: Into<String>>(details: S) -> Self {
        Self::Upload {
            details: details.into(),
        }
    }

    pub fn publish<S: Into<String>>(topic: S, details: S) -> Self {
        Self::Publish {
            topic: topic.into(),
            details: details.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SentrycamError>;

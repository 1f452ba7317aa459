use thiserror::Error;

#[derive(Error, Debug)]
pub enum RobowatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("System error: {message}")]
    System { message: String },
}

/// Capture device failures
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },

    #[error("No frame available: {details}")]
    NoFrame { details: String },

    #[error("Capture stream error: {details}")]
    CaptureStream { details: String },
}

/// Frame compression failures
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Invalid frame buffer: {details}")]
    InvalidBuffer { details: String },

    #[error("JPEG encoding failed: {details}")]
    Jpeg { details: String },
}

/// Remote analysis failures. None of these are retried inside the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Transport error: {details}")]
    Transport { details: String },

    /// Displays the remote diagnostic verbatim.
    #[error("{message}")]
    RemoteTool { message: String },

    #[error("Malformed reply: {details}")]
    MalformedReply { details: String },
}

impl RobowatchError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Errors that prevent the capture loop from starting at all
    pub fn is_fatal(&self) -> bool {
        match self {
            RobowatchError::Config(_) => true,
            RobowatchError::Camera(CameraError::DeviceOpen { .. })
            | RobowatchError::Camera(CameraError::Configuration { .. }) => true,
            RobowatchError::Camera(_) => false,
            RobowatchError::Encode(_) | RobowatchError::Analysis(_) => false,
            RobowatchError::Serialization(_) | RobowatchError::System { .. } => true,
        }
    }
}

impl AnalysisError {
    pub fn transport<S: Into<String>>(details: S) -> Self {
        Self::Transport {
            details: details.into(),
        }
    }

    pub fn remote_tool<S: Into<String>>(message: S) -> Self {
        Self::RemoteTool {
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(details: S) -> Self {
        Self::MalformedReply {
            details: details.into(),
        }
    }

    /// Short label used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Transport { .. } => "transport",
            AnalysisError::RemoteTool { .. } => "remote_tool",
            AnalysisError::MalformedReply { .. } => "malformed_reply",
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalysisError::transport(format!("request timed out: {}", e))
        } else {
            AnalysisError::transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RobowatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_tool_error_displays_diagnostic_verbatim() {
        let err = AnalysisError::remote_tool("rate limited");
        assert_eq!(err.to_string(), "rate limited");
        assert_eq!(err.kind(), "remote_tool");
    }

    #[test]
    fn test_fatal_classification() {
        let open = RobowatchError::from(CameraError::DeviceOpen {
            device: "/dev/video0".to_string(),
            details: "busy".to_string(),
        });
        assert!(open.is_fatal());

        let no_frame = RobowatchError::from(CameraError::NoFrame {
            details: "timeout".to_string(),
        });
        assert!(!no_frame.is_fatal());

        let analysis = RobowatchError::from(AnalysisError::transport("refused"));
        assert!(!analysis.is_fatal());
    }
}

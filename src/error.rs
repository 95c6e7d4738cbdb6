use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recording error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Camera driver error: {0}")]
    Driver(#[from] DriverError),
}

impl SnapcamError {
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Errors raised by the still-capture and snapshot pipelines.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("A capture is already in flight")]
    Busy,

    #[error("Camera is not open")]
    CameraNotOpen,

    #[error("Buffer allocation failed: {details}")]
    ResourceExhausted { details: String },

    #[error("Image transform failed: {details}")]
    Transform { details: String },

    #[error("Image metadata unreadable: {details}")]
    Metadata { details: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Capture was dropped before completing")]
    Cancelled,
}

impl CaptureError {
    pub fn resource_exhausted<S: Into<String>>(details: S) -> Self {
        Self::ResourceExhausted {
            details: details.into(),
        }
    }

    pub fn transform<S: Into<String>>(details: S) -> Self {
        Self::Transform {
            details: details.into(),
        }
    }

    pub fn metadata<S: Into<String>>(details: S) -> Self {
        Self::Metadata {
            details: details.into(),
        }
    }
}

/// Errors raised by the recording state machine.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("No recording in progress")]
    NotRecording,

    #[error("Recorder prepare failed: {details}")]
    Prepare { details: String },

    #[error("Recorder start failed: {details}")]
    Start { details: String },

    #[error("Recorder stop failed: {details}")]
    Stop { details: String },

    #[error("Camera driver error: {0}")]
    Driver(#[from] DriverError),
}

impl RecorderError {
    pub fn prepare<S: Into<String>>(details: S) -> Self {
        Self::Prepare {
            details: details.into(),
        }
    }

    pub fn start<S: Into<String>>(details: S) -> Self {
        Self::Start {
            details: details.into(),
        }
    }

    pub fn stop<S: Into<String>>(details: S) -> Self {
        Self::Stop {
            details: details.into(),
        }
    }
}

/// Errors raised at the sensor boundary.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Driver is not open")]
    NotOpen,

    #[error("Unsupported operation: {details}")]
    Unsupported { details: String },

    #[error("Frame stream error: {details}")]
    Stream { details: String },

    #[error("Autofocus failed: {details}")]
    Focus { details: String },
}

impl DriverError {
    pub fn unsupported<S: Into<String>>(details: S) -> Self {
        Self::Unsupported {
            details: details.into(),
        }
    }

    pub fn stream<S: Into<String>>(details: S) -> Self {
        Self::Stream {
            details: details.into(),
        }
    }

    pub fn focus<S: Into<String>>(details: S) -> Self {
        Self::Focus {
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapcamError>;

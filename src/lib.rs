pub mod config;
pub mod error;
pub mod events;
pub mod sizing;
pub mod orientation;
pub mod frame;
pub mod focus;
pub mod driver;
pub mod capture;
pub mod recording;
pub mod touch;
pub mod session;

pub use capture::{CaptureController, CaptureRequest, PictureOutput, PictureTicket, SnapshotTicket};
pub use config::SnapcamConfig;
pub use driver::{
    AudioSource, CameraDriver, CameraProvider, DriverCapabilities, QualityProfile,
    RecorderSettings, StillSettings, SyntheticDriver, SyntheticProvider, VideoRecorder,
};
pub use error::{CaptureError, DriverError, RecorderError, Result, SnapcamError};
pub use events::{EventBus, SnapcamEvent};
pub use focus::{map_tap_to_area, DriverArea, DriverRect};
pub use frame::{FrameFormat, RawFrame};
pub use orientation::{
    decode_exif_rotation, resolve_display_rotation, resolve_still_rotation, still_image_transform,
    Facing, OrientationDecision,
};
pub use recording::{RecordingController, RecordingOptions, RecordingState};
pub use session::{CameraSession, ViewRect};
pub use sizing::{select_capture_size, Size};
pub use touch::{TouchAction, TouchController, TouchEvent};

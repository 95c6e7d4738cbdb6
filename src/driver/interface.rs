use crate::error::{DriverError, RecorderError};
use crate::focus::DriverArea;
use crate::frame::RawFrame;
use crate::orientation::Facing;
use crate::sizing::Size;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Recording quality tiers a sensor may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityProfile {
    High,
    P480,
    P720,
    P1080,
    /// Lowest tier, available on every sensor
    Low,
}

/// Audio path for a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource {
    /// Voice-recognition-tuned source with the profile's own encoder
    VoiceRecognition,
    /// Plain camcorder source paired with the default encoder
    Camcorder,
}

/// What a sensor reports about itself once opened.
#[derive(Debug, Clone)]
pub struct DriverCapabilities {
    pub preview_size: Size,
    pub picture_sizes: Vec<Size>,
    pub supports_flash: bool,
    pub supports_metering_areas: bool,
    pub supports_zoom: bool,
    pub max_zoom: u32,
    pub profiles: Vec<QualityProfile>,
}

impl DriverCapabilities {
    pub fn supports_profile(&self, profile: QualityProfile) -> bool {
        self.profiles.contains(&profile)
    }
}

/// Parameters for a single still shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StillSettings {
    /// Capture resolution, already selected against the supported list
    pub size: Size,
    /// JPEG quality the sensor encodes at
    pub jpeg_quality: u8,
    /// Rotation the sensor records for the shot, in degrees
    pub rotation: u16,
}

/// Parameters the recorder sub-resource is created with.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub output_path: PathBuf,
    pub profile: QualityProfile,
    pub audio_source: AudioSource,
    /// Orientation hint recorded into the clip container, in degrees
    pub orientation_hint: u16,
    /// Clip length limit, None for unlimited
    pub max_duration: Option<Duration>,
}

/// The sensor boundary.
///
/// A driver handle is the exclusive owner of one opened sensor. Handles
/// live in the session's sensor slot and are operated on under its
/// lock, so implementations can assume single-threaded access per
/// handle.
#[async_trait]
pub trait CameraDriver: Send {
    fn facing(&self) -> Facing;

    /// Angle the sensor is mounted at relative to the device's natural
    /// orientation, in degrees.
    fn mount_angle(&self) -> u16;

    fn capabilities(&self) -> DriverCapabilities;

    async fn start_preview(&mut self) -> Result<(), DriverError>;

    async fn stop_preview(&mut self) -> Result<(), DriverError>;

    fn preview_running(&self) -> bool;

    /// Pull the next live preview frame. Fails when the preview is not
    /// running.
    async fn pull_preview_frame(&mut self) -> Result<RawFrame, DriverError>;

    /// Run the shutter sequence and return the encoded JPEG bytes.
    ///
    /// The preview is left stopped afterwards; the caller restarts it
    /// once delivery is finished.
    async fn capture_still(&mut self, settings: StillSettings) -> Result<Vec<u8>, DriverError>;

    /// Current zoom step in [0, max_zoom].
    fn zoom(&self) -> u32;

    async fn set_zoom(&mut self, step: u32) -> Result<(), DriverError>;

    async fn set_torch(&mut self, on: bool) -> Result<(), DriverError>;

    async fn cancel_auto_focus(&mut self) -> Result<(), DriverError>;

    /// Install the focus area and, where the sensor supports it, a
    /// wider metering area for the next autofocus run.
    async fn set_focus_areas(
        &mut self,
        focus: DriverArea,
        metering: Option<DriverArea>,
    ) -> Result<(), DriverError>;

    /// Run autofocus to completion. An error means focus did not
    /// converge.
    async fn auto_focus(&mut self) -> Result<(), DriverError>;

    /// Hand the sensor to its recorder sub-resource.
    ///
    /// The driver handle moves into the recorder, which becomes the
    /// sensor's owner until [`VideoRecorder::release`] gives it back.
    fn into_recorder(self: Box<Self>, settings: RecorderSettings) -> Box<dyn VideoRecorder>;
}

/// A sensor leased out for clip recording.
#[async_trait]
pub trait VideoRecorder: Send {
    async fn prepare(&mut self) -> Result<(), RecorderError>;

    async fn start(&mut self) -> Result<(), RecorderError>;

    /// Stop and finalize the clip at the configured output path.
    async fn stop(&mut self) -> Result<(), RecorderError>;

    /// Give the sensor handle back. Always succeeds, whether or not
    /// the recording itself did, so the sensor can never be lost to a
    /// failed stop.
    fn release(self: Box<Self>) -> Box<dyn CameraDriver>;
}

/// Opens driver handles by facing. The session keeps one provider for
/// its whole life and goes through it again on every facing switch.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    async fn open(&self, facing: Facing) -> Result<Box<dyn CameraDriver>, DriverError>;
}

use crate::capture::PictureOutput;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events that can occur in the snapcam pipeline
#[derive(Debug, Clone)]
pub enum SnapcamEvent {
    /// The sensor was opened and the preview is running
    CameraStarted,
    /// A still capture completed
    PictureTaken { output: PictureOutput },
    /// A still capture failed after being accepted
    PictureFailed { message: String },
    /// A preview-frame snapshot completed
    SnapshotTaken { jpeg: Arc<Vec<u8>> },
    /// A preview-frame snapshot failed
    SnapshotFailed { message: String },
    /// Autofocus converged at the given view coordinates
    FocusSet { x: f32, y: f32 },
    /// Autofocus did not converge
    FocusFailed { message: String },
    /// A recording session started
    RecordingStarted,
    /// A recording session could not be started
    RecordingStartFailed { message: String },
    /// A recording session stopped and the clip was finalized
    RecordingStopped { path: PathBuf },
    /// Stopping the recording session failed
    RecordingStopFailed { message: String },
    /// The host reported a back-button press while the preview was up
    BackButton,
    /// The preview overlay was dragged to a new position
    OverlayMoved { x: i32, y: i32 },
    /// The preview overlay opacity changed
    OverlayOpacityChanged { opacity: f32 },
    /// The sensor zoom stepped to a new value
    ZoomChanged { step: u32 },
}

impl SnapcamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SnapcamEvent::CameraStarted => "Camera started".to_string(),
            SnapcamEvent::PictureTaken { output } => match output {
                PictureOutput::Bytes(bytes) => {
                    format!("Picture taken ({} bytes)", bytes.len())
                }
                PictureOutput::File(path) => {
                    format!("Picture taken: {}", path.display())
                }
            },
            SnapcamEvent::PictureFailed { message } => {
                format!("Picture failed: {}", message)
            }
            SnapcamEvent::SnapshotTaken { jpeg } => {
                format!("Snapshot taken ({} bytes)", jpeg.len())
            }
            SnapcamEvent::SnapshotFailed { message } => {
                format!("Snapshot failed: {}", message)
            }
            SnapcamEvent::FocusSet { x, y } => {
                format!("Focus set at ({:.1}, {:.1})", x, y)
            }
            SnapcamEvent::FocusFailed { message } => {
                format!("Focus failed: {}", message)
            }
            SnapcamEvent::RecordingStarted => "Recording started".to_string(),
            SnapcamEvent::RecordingStartFailed { message } => {
                format!("Recording start failed: {}", message)
            }
            SnapcamEvent::RecordingStopped { path } => {
                format!("Recording stopped: {}", path.display())
            }
            SnapcamEvent::RecordingStopFailed { message } => {
                format!("Recording stop failed: {}", message)
            }
            SnapcamEvent::BackButton => "Back button pressed".to_string(),
            SnapcamEvent::OverlayMoved { x, y } => {
                format!("Overlay moved to ({}, {})", x, y)
            }
            SnapcamEvent::OverlayOpacityChanged { opacity } => {
                format!("Overlay opacity set to {:.2}", opacity)
            }
            SnapcamEvent::ZoomChanged { step } => {
                format!("Zoom stepped to {}", step)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SnapcamEvent::CameraStarted => "camera_started",
            SnapcamEvent::PictureTaken { .. } => "picture_taken",
            SnapcamEvent::PictureFailed { .. } => "picture_failed",
            SnapcamEvent::SnapshotTaken { .. } => "snapshot_taken",
            SnapcamEvent::SnapshotFailed { .. } => "snapshot_failed",
            SnapcamEvent::FocusSet { .. } => "focus_set",
            SnapcamEvent::FocusFailed { .. } => "focus_failed",
            SnapcamEvent::RecordingStarted => "recording_started",
            SnapcamEvent::RecordingStartFailed { .. } => "recording_start_failed",
            SnapcamEvent::RecordingStopped { .. } => "recording_stopped",
            SnapcamEvent::RecordingStopFailed { .. } => "recording_stop_failed",
            SnapcamEvent::BackButton => "back_button",
            SnapcamEvent::OverlayMoved { .. } => "overlay_moved",
            SnapcamEvent::OverlayOpacityChanged { .. } => "overlay_opacity_changed",
            SnapcamEvent::ZoomChanged { .. } => "zoom_changed",
        }
    }

    fn is_failure(&self) -> bool {
        matches!(
            self,
            SnapcamEvent::PictureFailed { .. }
                | SnapcamEvent::SnapshotFailed { .. }
                | SnapcamEvent::FocusFailed { .. }
                | SnapcamEvent::RecordingStartFailed { .. }
                | SnapcamEvent::RecordingStopFailed { .. }
        )
    }
}

/// Broadcast bus carrying one event per pipeline outcome.
///
/// Publishing is lossy: when no subscriber is attached the event is
/// dropped, which keeps the capture paths independent of whether an
/// embedder is listening.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SnapcamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SnapcamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: SnapcamEvent) -> usize {
        match &event {
            SnapcamEvent::CameraStarted
            | SnapcamEvent::RecordingStarted
            | SnapcamEvent::RecordingStopped { .. } => {
                info!("{}", event.description());
            }
            e if e.is_failure() => {
                warn!("{}", event.description());
            }
            _ => {
                debug!("{}", event.description());
            }
        }

        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("Event dropped: no subscribers");
                0
            }
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

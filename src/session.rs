use crate::capture::{CaptureController, CaptureRequest, PictureTicket, SnapshotTicket};
use crate::config::SnapcamConfig;
use crate::driver::{CameraDriver, CameraProvider};
use crate::error::{DriverError, Result, SnapcamError};
use crate::events::{EventBus, SnapcamEvent};
use crate::focus::run_auto_focus;
use crate::orientation::Facing;
use crate::recording::{RecordingController, RecordingOptions, RecordingState};
use crate::sizing::Size;
use crate::touch::{TouchController, TouchEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Host-reported geometry of the preview overlay, in screen pixels.
/// `x`/`y` are the layout margins the drag gesture accumulates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ViewRect {
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

impl Default for ViewRect {
    // Placeholder geometry until the host reports the real layout.
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 640,
            height: 480,
        }
    }
}

/// Who currently owns the sensor.
pub(crate) enum SensorState {
    Closed,
    Open(Box<dyn CameraDriver>),
    /// The handle has moved into a recorder; it comes back on stop.
    Recording,
}

/// State shared between the session and its controllers.
///
/// The slot mutex is the exclusive-access enforcement for the sensor:
/// preview pulls, still captures, facing switches, and recorder
/// hand-offs all go through it. Device rotation lives in an atomic so
/// the capture paths re-read it at the moment they run instead of
/// caching a value that a rotation notification may have invalidated.
pub(crate) struct SensorShared {
    pub(crate) slot: Arc<tokio::sync::Mutex<SensorState>>,
    device_rotation: AtomicU16,
    torch_on: AtomicBool,
    view_rect: parking_lot::Mutex<ViewRect>,
}

impl SensorShared {
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(tokio::sync::Mutex::new(SensorState::Closed)),
            device_rotation: AtomicU16::new(0),
            torch_on: AtomicBool::new(false),
            view_rect: parking_lot::Mutex::new(ViewRect::default()),
        }
    }

    pub(crate) fn device_rotation(&self) -> u16 {
        self.device_rotation.load(Ordering::Relaxed)
    }

    pub(crate) fn set_device_rotation(&self, degrees: u16) {
        self.device_rotation.store(degrees % 360, Ordering::Relaxed);
    }

    pub(crate) fn torch_on(&self) -> bool {
        self.torch_on.load(Ordering::Relaxed)
    }

    pub(crate) fn set_torch_on(&self, on: bool) {
        self.torch_on.store(on, Ordering::Relaxed);
    }

    pub(crate) fn view_rect(&self) -> ViewRect {
        *self.view_rect.lock()
    }

    pub(crate) fn set_view_rect(&self, rect: ViewRect) {
        *self.view_rect.lock() = rect;
    }

    /// Run tap-to-focus at a view coordinate on the open sensor.
    pub(crate) async fn focus_at(&self, bus: &EventBus, x: f32, y: f32) -> Result<()> {
        let mut slot = self.slot.lock().await;
        match &mut *slot {
            SensorState::Open(driver) => {
                let view = self.view_rect().size();
                run_auto_focus(driver.as_mut(), bus, x, y, view).await
            }
            _ => Err(DriverError::NotOpen.into()),
        }
    }
}

/// Owner of the sensor and the pipeline controllers.
///
/// One session drives one sensor at a time; the host feeds it
/// lifecycle signals, geometry, rotation notifications, and raw touch
/// events, and observes outcomes on the event bus.
pub struct CameraSession {
    config: SnapcamConfig,
    provider: Arc<dyn CameraProvider>,
    shared: Arc<SensorShared>,
    bus: EventBus,
    facing: parking_lot::Mutex<Facing>,
    capture: Arc<CaptureController>,
    recording: RecordingController,
    touch: TouchController,
}

impl CameraSession {
    pub fn new(config: SnapcamConfig, provider: Arc<dyn CameraProvider>) -> Self {
        let bus = EventBus::new(config.system.event_bus_capacity);
        let shared = Arc::new(SensorShared::new());
        let capture = Arc::new(CaptureController::new(
            Arc::clone(&shared),
            bus.clone(),
            config.capture.clone(),
        ));
        let recording = RecordingController::new(
            Arc::clone(&shared),
            bus.clone(),
            config.recording.clone(),
        );
        let touch = TouchController::new(
            Arc::clone(&shared),
            bus.clone(),
            config.touch.clone(),
            Arc::clone(&capture),
        );
        Self {
            facing: parking_lot::Mutex::new(config.camera.facing),
            config,
            provider,
            shared,
            bus,
            capture,
            recording,
            touch,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapcamEvent> {
        self.bus.subscribe()
    }

    pub fn facing(&self) -> Facing {
        *self.facing.lock()
    }

    /// Host lifecycle resume: open the sensor for the selected facing
    /// and start the preview. A no-op while the sensor is already open
    /// or leased to a recorder.
    pub async fn resume(&self) -> Result<()> {
        let mut slot = self.shared.slot.lock().await;
        match &mut *slot {
            SensorState::Open(driver) => {
                if !driver.preview_running() {
                    driver.start_preview().await?;
                }
                Ok(())
            }
            SensorState::Recording => Ok(()),
            SensorState::Closed => {
                let facing = self.facing();
                info!("Opening {} sensor", facing);
                let mut driver = self.provider.open(facing).await?;
                driver.start_preview().await?;
                *slot = SensorState::Open(driver);
                self.bus.publish(SnapcamEvent::CameraStarted);
                Ok(())
            }
        }
    }

    /// Host lifecycle pause: stop the preview and release the sensor
    /// handle. A recording in progress keeps its lease.
    pub async fn pause(&self) -> Result<()> {
        let mut slot = self.shared.slot.lock().await;
        if let SensorState::Open(driver) = &mut *slot {
            driver.stop_preview().await?;
            debug!("Sensor released on pause");
            *slot = SensorState::Closed;
        }
        Ok(())
    }

    /// Swap to the other sensor: stop and release the current handle,
    /// open the alternate, reapply the torch only when the new sensor
    /// has a flash unit, restart the preview.
    ///
    /// The slot lock is held for the whole sequence, so captures
    /// submitted mid-switch are rejected as busy.
    pub async fn switch_facing(&self) -> Result<Facing> {
        let mut slot = self.shared.slot.lock().await;
        let target = self.facing().opposite();
        match &mut *slot {
            SensorState::Recording => Err(SnapcamError::invalid_argument(
                "cannot switch facing while recording",
            )),
            SensorState::Closed => {
                // Takes effect on the next resume.
                *self.facing.lock() = target;
                Ok(target)
            }
            SensorState::Open(_) => {
                if let SensorState::Open(mut old) =
                    std::mem::replace(&mut *slot, SensorState::Closed)
                {
                    old.stop_preview().await?;
                }
                info!("Switching to {} sensor", target);
                let mut driver = self.provider.open(target).await?;
                if self.shared.torch_on() && driver.capabilities().supports_flash {
                    driver.set_torch(true).await?;
                }
                driver.start_preview().await?;
                *slot = SensorState::Open(driver);
                *self.facing.lock() = target;
                Ok(target)
            }
        }
    }

    pub fn set_view_rect(&self, rect: ViewRect) -> Result<()> {
        if rect.width == 0 || rect.height == 0 {
            return Err(SnapcamError::invalid_argument(format!(
                "view rect dimensions must be non-zero, got {}x{}",
                rect.width, rect.height
            )));
        }
        self.shared.set_view_rect(rect);
        Ok(())
    }

    /// Record a device-rotation notification from the host. The value
    /// is read back at the moment a capture or recording start runs.
    pub fn notify_device_rotation(&self, degrees: u16) -> Result<()> {
        if degrees % 90 != 0 || degrees >= 360 {
            return Err(SnapcamError::invalid_argument(format!(
                "device rotation must be one of 0/90/180/270, got {}",
                degrees
            )));
        }
        self.shared.set_device_rotation(degrees);
        Ok(())
    }

    pub fn set_overlay_opacity(&self, opacity: f32) -> Result<()> {
        if !self.config.overlay.enable_opacity {
            return Err(SnapcamError::invalid_argument(
                "overlay opacity changes are disabled",
            ));
        }
        if !(0.0..=1.0).contains(&opacity) {
            return Err(SnapcamError::invalid_argument(format!(
                "overlay opacity must be within [0.0, 1.0], got {}",
                opacity
            )));
        }
        self.bus
            .publish(SnapcamEvent::OverlayOpacityChanged { opacity });
        Ok(())
    }

    pub fn notify_back_button(&self) {
        self.bus.publish(SnapcamEvent::BackButton);
    }

    pub async fn set_focus(&self, x: f32, y: f32) -> Result<()> {
        self.shared.focus_at(&self.bus, x, y).await
    }

    pub async fn handle_touch(&self, event: TouchEvent) -> Result<()> {
        self.touch.handle(event).await
    }

    /// A capture request carrying the configured default quality and
    /// no particular size.
    pub fn default_capture_request(&self) -> CaptureRequest {
        self.capture.default_request()
    }

    pub fn take_picture(&self, request: CaptureRequest) -> Result<PictureTicket> {
        self.capture.take_picture(request)
    }

    pub fn take_snapshot(&self, quality: u8) -> Result<SnapshotTicket> {
        self.capture.take_snapshot(quality)
    }

    pub async fn start_recording(&self, options: RecordingOptions) -> Result<()> {
        self.recording.start(options).await
    }

    pub async fn stop_recording(&self) -> Result<PathBuf> {
        self.recording.stop().await
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recording.state()
    }
}

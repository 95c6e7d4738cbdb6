use crate::config::CaptureConfig;
use crate::driver::StillSettings;
use crate::error::{CaptureError, Result, SnapcamError};
use crate::events::{EventBus, SnapcamEvent};
use crate::orientation::{
    read_exif_rotation, resolve_still_rotation, still_image_transform, Facing,
    OrientationDecision,
};
use crate::session::{SensorShared, SensorState};
use crate::sizing::{select_capture_size, Size};
use image::codecs::jpeg::JpegEncoder;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Capture-time JPEG quality forced for front in-memory captures. The
/// image is re-encoded after the mirror transform, so the requested
/// quality is applied only at that second, final encode.
const FRONT_REENCODE_QUALITY: u8 = 99;

/// Parameters for one still capture. Consumed by a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Exact output size to look for among the sensor's supported
    /// sizes; None lets size selection follow the preview ratio.
    pub size: Option<Size>,
    /// JPEG quality (0-100) of the delivered image
    pub quality: u8,
}

/// A finished still capture: owned bytes or a written temp file.
#[derive(Debug, Clone)]
pub enum PictureOutput {
    Bytes(Arc<Vec<u8>>),
    File(PathBuf),
}

/// Single-completion handle for an accepted still capture. The same
/// outcome is also published on the event bus.
#[derive(Debug)]
pub struct PictureTicket {
    rx: oneshot::Receiver<Result<PictureOutput>>,
}

impl PictureTicket {
    /// Wait for the capture to finish. Resolves exactly once; if the
    /// pipeline is torn down before completing, the capture counts as
    /// cancelled.
    pub async fn wait(self) -> Result<PictureOutput> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(CaptureError::Cancelled.into()))
    }
}

/// The at-most-one-capture-in-flight flag. Not a queue: a submission
/// that finds it busy is rejected, never buffered.
#[derive(Default)]
pub(super) struct CaptureGuard {
    busy: Arc<AtomicBool>,
}

impl CaptureGuard {
    pub(super) fn try_acquire(&self) -> Option<CapturePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| CapturePermit {
                busy: Arc::clone(&self.busy),
            })
    }
}

/// Resets the guard on drop, so every exit path of a capture releases
/// it exactly once.
pub(super) struct CapturePermit {
    busy: Arc<AtomicBool>,
}

impl Drop for CapturePermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Drives the still-picture and snapshot pipelines against the shared
/// sensor slot.
pub struct CaptureController {
    pub(super) shared: Arc<SensorShared>,
    pub(super) bus: EventBus,
    pub(super) config: CaptureConfig,
    pub(super) guard: CaptureGuard,
}

impl CaptureController {
    pub(crate) fn new(shared: Arc<SensorShared>, bus: EventBus, config: CaptureConfig) -> Self {
        Self {
            shared,
            bus,
            config,
            guard: CaptureGuard::default(),
        }
    }

    /// A request carrying the configured default quality and no size.
    pub fn default_request(&self) -> CaptureRequest {
        CaptureRequest {
            size: None,
            quality: self.config.quality,
        }
    }

    /// Submit a still capture.
    ///
    /// Rejection is synchronous: `Busy` while another capture holds the
    /// guard or while the sensor slot is locked (facing switch,
    /// recording hand-off), `CameraNotOpen` when no sensor is open.
    /// Accepted work runs on a spawned task; the call returns a ticket
    /// immediately and the preview resumes once delivery is done.
    pub fn take_picture(&self, request: CaptureRequest) -> Result<PictureTicket> {
        if request.quality > 100 {
            return Err(SnapcamError::invalid_argument(format!(
                "capture quality must be within 0-100, got {}",
                request.quality
            )));
        }

        let permit = self
            .guard
            .try_acquire()
            .ok_or(CaptureError::Busy)
            .map_err(SnapcamError::from)?;
        let slot = Arc::clone(&self.shared.slot)
            .try_lock_owned()
            .map_err(|_| SnapcamError::from(CaptureError::Busy))?;
        if !matches!(*slot, SensorState::Open(_)) {
            return Err(CaptureError::CameraNotOpen.into());
        }

        let (tx, rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let bus = self.bus.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            run_still_pipeline(slot, permit, shared, bus, config, request, tx).await;
        });
        Ok(PictureTicket { rx })
    }
}

/// Executes one accepted capture while holding the sensor slot lock,
/// then finalizes: deliver the outcome, release the guard, and resume
/// the preview as the last action.
async fn run_still_pipeline(
    mut slot: OwnedMutexGuard<SensorState>,
    permit: CapturePermit,
    shared: Arc<SensorShared>,
    bus: EventBus,
    config: CaptureConfig,
    request: CaptureRequest,
    tx: oneshot::Sender<Result<PictureOutput>>,
) {
    let outcome = execute_still(&mut slot, &shared, &config, request).await;

    match &outcome {
        Ok(output) => {
            bus.publish(SnapcamEvent::PictureTaken {
                output: output.clone(),
            });
        }
        Err(e) => {
            bus.publish(SnapcamEvent::PictureFailed {
                message: e.to_string(),
            });
        }
    }
    // The submitter may have dropped its ticket; the bus already
    // carried the outcome.
    let _ = tx.send(outcome);

    drop(permit);

    if let SensorState::Open(driver) = &mut *slot {
        if let Err(e) = driver.start_preview().await {
            warn!("Preview did not resume after capture: {}", e);
        }
    }
}

async fn execute_still(
    slot: &mut SensorState,
    shared: &SensorShared,
    config: &CaptureConfig,
    request: CaptureRequest,
) -> Result<PictureOutput> {
    let driver = match slot {
        SensorState::Open(driver) => driver,
        _ => return Err(CaptureError::CameraNotOpen.into()),
    };

    // Re-read the rotation now; a cached value may be stale.
    let device_rotation = shared.device_rotation();
    let facing = driver.facing();
    let caps = driver.capabilities();

    let size = select_capture_size(request.size, caps.preview_size, &caps.picture_sizes)?;
    let jpeg_quality = if facing == Facing::Front && !config.store_to_file {
        FRONT_REENCODE_QUALITY
    } else {
        request.quality
    };
    let rotation = resolve_still_rotation(facing, driver.mount_angle(), device_rotation);
    debug!(
        "Capturing still: {} at quality {}, rotation {}",
        size, jpeg_quality, rotation
    );

    let jpeg = driver
        .capture_still(StillSettings {
            size,
            jpeg_quality,
            rotation,
        })
        .await
        .map_err(CaptureError::from)?;

    let jpeg = if config.disable_exif_header_stripping {
        let exif_rotation = read_exif_rotation(&jpeg)?;
        let decision = still_image_transform(facing, exif_rotation);
        if decision.is_identity() {
            // Untagged back capture: bytes pass through unmodified.
            jpeg
        } else {
            apply_still_transform(&jpeg, decision, request.quality)?
        }
    } else {
        jpeg
    };

    if config.store_to_file {
        tokio::fs::create_dir_all(&config.cache_dir)
            .await
            .map_err(CaptureError::Io)?;
        let path = temp_capture_path(&config.cache_dir);
        tokio::fs::write(&path, &jpeg)
            .await
            .map_err(CaptureError::Io)?;
        Ok(PictureOutput::File(path))
    } else {
        Ok(PictureOutput::Bytes(Arc::new(jpeg)))
    }
}

/// Decode, rotate/mirror, and re-encode a captured JPEG at the
/// requested final quality.
fn apply_still_transform(
    jpeg: &[u8],
    decision: OrientationDecision,
    quality: u8,
) -> Result<Vec<u8>> {
    let image = image::load_from_memory(jpeg)
        .map_err(|e| CaptureError::transform(format!("JPEG decode failed: {}", e)))?;

    let image = match decision.rotation_degrees {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    };
    let image = if decision.mirror { image.fliph() } else { image };

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| -> SnapcamError {
            CaptureError::transform(format!("JPEG re-encode failed: {}", e)).into()
        })?;
    Ok(out)
}

/// Temp file in the cache directory with a random 8-character suffix.
fn temp_capture_path(cache_dir: &str) -> PathBuf {
    let suffix = Uuid::new_v4().simple().to_string();
    PathBuf::from(cache_dir).join(format!("capture_{}.jpg", &suffix[..8]))
}

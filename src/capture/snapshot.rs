use super::still::CaptureController;
use crate::error::{CaptureError, Result, SnapcamError};
use crate::events::{EventBus, SnapcamEvent};
use crate::frame::encode_rgb_jpeg;
use crate::orientation::{resolve_display_rotation, Facing};
use crate::session::{SensorShared, SensorState};
use std::sync::Arc;
use tokio::sync::{oneshot, OwnedMutexGuard};
use tracing::debug;

/// Single-completion handle for an accepted raw-frame snapshot.
#[derive(Debug)]
pub struct SnapshotTicket {
    rx: oneshot::Receiver<Result<Arc<Vec<u8>>>>,
}

impl SnapshotTicket {
    /// Wait for the snapshot JPEG. Resolves exactly once.
    pub async fn wait(self) -> Result<Arc<Vec<u8>>> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(CaptureError::Cancelled.into()))
    }
}

impl CaptureController {
    /// Grab the next live preview frame, rotate it upright, and encode
    /// it as JPEG at the given quality.
    ///
    /// Snapshots bypass the still-capture guard; running one
    /// concurrently with a still capture is a caller configuration
    /// error, not something this path arbitrates. The one-shot frame
    /// pull is released on every exit path, and the preview keeps
    /// running throughout.
    pub fn take_snapshot(&self, quality: u8) -> Result<SnapshotTicket> {
        if quality > 100 {
            return Err(SnapcamError::invalid_argument(format!(
                "snapshot quality must be within 0-100, got {}",
                quality
            )));
        }

        let slot = Arc::clone(&self.shared.slot)
            .try_lock_owned()
            .map_err(|_| SnapcamError::from(CaptureError::Busy))?;
        if !matches!(*slot, SensorState::Open(_)) {
            return Err(CaptureError::CameraNotOpen.into());
        }

        let (tx, rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let bus = self.bus.clone();
        tokio::spawn(async move {
            run_snapshot_pipeline(slot, shared, bus, quality, tx).await;
        });
        Ok(SnapshotTicket { rx })
    }
}

async fn run_snapshot_pipeline(
    mut slot: OwnedMutexGuard<SensorState>,
    shared: Arc<SensorShared>,
    bus: EventBus,
    quality: u8,
    tx: oneshot::Sender<Result<Arc<Vec<u8>>>>,
) {
    let outcome = execute_snapshot(&mut slot, &shared, quality).await;

    match &outcome {
        Ok(jpeg) => {
            bus.publish(SnapcamEvent::SnapshotTaken {
                jpeg: Arc::clone(jpeg),
            });
        }
        Err(e) => {
            bus.publish(SnapcamEvent::SnapshotFailed {
                message: e.to_string(),
            });
        }
    }
    let _ = tx.send(outcome);
}

async fn execute_snapshot(
    slot: &mut SensorState,
    shared: &SensorShared,
    quality: u8,
) -> Result<Arc<Vec<u8>>> {
    let driver = match slot {
        SensorState::Open(driver) => driver,
        _ => return Err(CaptureError::CameraNotOpen.into()),
    };

    let facing = driver.facing();
    let mut rotation =
        resolve_display_rotation(facing, driver.mount_angle(), shared.device_rotation());
    if facing == Facing::Front {
        // The preview frame is mirrored in hardware; rotating by the
        // negated angle puts it upright.
        rotation = (360 - rotation) % 360;
    }

    let frame = driver
        .pull_preview_frame()
        .await
        .map_err(CaptureError::from)?;
    debug!(
        "Snapshot frame {} rotating by {} degrees",
        frame.size(),
        rotation
    );

    // rotated() exchanges the packaging dimensions for 90/270.
    let rotated = frame.rotated(rotation)?;
    let rgb = rotated.to_rgb()?;
    let jpeg = encode_rgb_jpeg(&rgb, rotated.size(), quality)?;
    Ok(Arc::new(jpeg))
}

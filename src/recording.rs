use crate::config::RecordingConfig;
use crate::driver::{AudioSource, QualityProfile, RecorderSettings, VideoRecorder};
use crate::error::{DriverError, RecorderError, Result};
use crate::events::{EventBus, SnapcamEvent};
use crate::orientation::resolve_still_rotation;
use crate::session::{SensorShared, SensorState};
use crate::sizing::Size;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

/// Descending preference order for the recording quality profile; the
/// first one the sensor supports wins, and Low is always available.
const PROFILE_PREFERENCE: [QualityProfile; 5] = [
    QualityProfile::High,
    QualityProfile::P480,
    QualityProfile::P720,
    QualityProfile::P1080,
    QualityProfile::Low,
];

/// Where the recording state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Started,
}

/// Parameters for one recording session.
///
/// `size` and `quality` are accepted as hints for callers that carry
/// them, but the actual encode parameters come from the profile
/// cascade against the sensor's capabilities.
#[derive(Debug, Clone)]
pub struct RecordingOptions {
    pub output_path: PathBuf,
    pub size: Option<Size>,
    pub quality: u8,
    pub with_flash: bool,
    pub max_duration: Option<Duration>,
}

/// The live recorder lease plus what stop needs to restore.
struct ActiveRecording {
    recorder: Box<dyn VideoRecorder>,
    output_path: PathBuf,
    flash_enabled: bool,
}

/// Recording lifecycle state machine: Idle, start, Started, stop,
/// Idle. Owns the recorder lease while the sensor handle is out of
/// the shared slot.
pub struct RecordingController {
    shared: Arc<SensorShared>,
    bus: EventBus,
    config: RecordingConfig,
    session: parking_lot::Mutex<Option<ActiveRecording>>,
}

impl RecordingController {
    pub(crate) fn new(shared: Arc<SensorShared>, bus: EventBus, config: RecordingConfig) -> Self {
        Self {
            shared,
            bus,
            config,
            session: parking_lot::Mutex::new(None),
        }
    }

    pub fn state(&self) -> RecordingState {
        if self.session.lock().is_some() {
            RecordingState::Started
        } else {
            RecordingState::Idle
        }
    }

    /// Start recording a clip.
    ///
    /// Starting while already started is an idempotent no-op that
    /// reports nothing. Any failure leaves the state Idle with the
    /// sensor reclaimed and the preview resumed, and publishes a
    /// typed start failure.
    pub async fn start(&self, options: RecordingOptions) -> Result<()> {
        if self.session.lock().is_some() {
            debug!("Recording already started; ignoring start request");
            return Ok(());
        }

        let mut slot = self.shared.slot.lock().await;
        if matches!(*slot, SensorState::Recording) {
            return Ok(());
        }

        match self.start_with_slot(&mut slot, &options).await {
            Ok(active) => {
                *self.session.lock() = Some(active);
                self.bus.publish(SnapcamEvent::RecordingStarted);
                Ok(())
            }
            Err(e) => {
                self.bus.publish(SnapcamEvent::RecordingStartFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn start_with_slot(
        &self,
        slot: &mut MutexGuard<'_, SensorState>,
        options: &RecordingOptions,
    ) -> Result<ActiveRecording> {
        let SensorState::Open(driver) = &mut **slot else {
            return Err(DriverError::NotOpen.into());
        };
        let caps = driver.capabilities();

        let flash_enabled = options.with_flash && caps.supports_flash;
        if flash_enabled {
            // Torch first, then a preview restart so it takes effect
            // before the recorder takes over.
            driver.set_torch(true).await?;
            self.shared.set_torch_on(true);
            if driver.preview_running() {
                driver.stop_preview().await?;
            }
            driver.start_preview().await?;
        }

        let profile = PROFILE_PREFERENCE
            .iter()
            .copied()
            .find(|p| caps.supports_profile(*p))
            .unwrap_or(QualityProfile::Low);
        // Source selection follows the flag as shipped; see DESIGN.md
        // on the naming.
        let audio_source = if self.config.disable_audio {
            AudioSource::Camcorder
        } else {
            AudioSource::VoiceRecognition
        };
        let orientation_hint = resolve_still_rotation(
            driver.facing(),
            driver.mount_angle(),
            self.shared.device_rotation(),
        );
        info!(
            "Starting recording to {} (profile {:?}, audio {:?}, hint {})",
            options.output_path.display(),
            profile,
            audio_source,
            orientation_hint
        );

        if driver.preview_running() {
            driver.stop_preview().await?;
        }

        // Hand the sensor to the recorder; the slot marks the lease.
        let driver = match std::mem::replace(&mut **slot, SensorState::Recording) {
            SensorState::Open(driver) => driver,
            _ => unreachable!("slot was open above"),
        };
        let mut recorder = driver.into_recorder(RecorderSettings {
            output_path: options.output_path.clone(),
            profile,
            audio_source,
            orientation_hint,
            max_duration: options.max_duration,
        });

        let started = async {
            recorder.prepare().await?;
            recorder.start().await
        }
        .await;

        match started {
            Ok(()) => Ok(ActiveRecording {
                recorder,
                output_path: options.output_path.clone(),
                flash_enabled,
            }),
            Err(e) => {
                // Reclaim the sensor so a failed start cannot strand it.
                let mut driver = recorder.release();
                if flash_enabled {
                    if let Err(torch) = driver.set_torch(false).await {
                        warn!("Torch did not turn off after failed start: {}", torch);
                    }
                    self.shared.set_torch_on(false);
                }
                if let Err(resume) = driver.start_preview().await {
                    warn!("Preview did not resume after failed start: {}", resume);
                }
                **slot = SensorState::Open(driver);
                Err(e.into())
            }
        }
    }

    /// Stop the recording and return sensor control to the preview.
    ///
    /// Stopping while never started reports a typed stop failure. A
    /// failing stop is reported too, but the recorder lease is cleared
    /// and the sensor restored regardless, so the state machine can
    /// never wedge in Started.
    pub async fn stop(&self) -> Result<PathBuf> {
        let Some(active) = self.session.lock().take() else {
            let e = RecorderError::NotRecording;
            self.bus.publish(SnapcamEvent::RecordingStopFailed {
                message: e.to_string(),
            });
            return Err(e.into());
        };
        let ActiveRecording {
            mut recorder,
            output_path,
            flash_enabled,
        } = active;

        let stop_result = recorder.stop().await;

        // Sensor recovery runs whether or not the stop itself worked.
        let mut driver = recorder.release();
        let mut slot = self.shared.slot.lock().await;
        if flash_enabled {
            if let Err(e) = driver.set_torch(false).await {
                warn!("Torch did not turn off after recording: {}", e);
            }
            self.shared.set_torch_on(false);
        }
        if let Err(e) = driver.start_preview().await {
            warn!("Preview did not resume after recording: {}", e);
        }
        *slot = SensorState::Open(driver);
        drop(slot);

        match stop_result {
            Ok(()) => {
                self.bus.publish(SnapcamEvent::RecordingStopped {
                    path: output_path.clone(),
                });
                Ok(output_path)
            }
            Err(e) => {
                self.bus.publish(SnapcamEvent::RecordingStopFailed {
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{CameraDriver, SyntheticDriver, SyntheticFaults, SyntheticProbe};
    use crate::error::SnapcamError;
    use crate::orientation::Facing;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn open_controller(
        config: RecordingConfig,
        faults: SyntheticFaults,
    ) -> (RecordingController, Arc<SensorShared>, EventBus, SyntheticProbe) {
        let shared = Arc::new(SensorShared::new());
        let bus = EventBus::new(16);
        let driver = SyntheticDriver::new(Facing::Back).with_faults(faults);
        let probe = driver.probe();
        let mut driver: Box<dyn CameraDriver> = Box::new(driver);
        driver.start_preview().await.unwrap();
        *shared.slot.lock().await = SensorState::Open(driver);

        let controller = RecordingController::new(Arc::clone(&shared), bus.clone(), config);
        (controller, shared, bus, probe)
    }

    fn options_in(dir: &tempfile::TempDir) -> RecordingOptions {
        RecordingOptions {
            output_path: dir.path().join("clip.mp4"),
            size: None,
            quality: 85,
            with_flash: false,
            max_duration: None,
        }
    }

    #[tokio::test]
    async fn test_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, shared, _bus, probe) =
            open_controller(RecordingConfig::default(), SyntheticFaults::default()).await;

        controller.start(options_in(&dir)).await.unwrap();
        assert_eq!(controller.state(), RecordingState::Started);
        assert!(matches!(
            *shared.slot.lock().await,
            SensorState::Recording
        ));
        assert!(probe.snapshot().recorder_started);

        let path = controller.stop().await.unwrap();
        assert!(path.exists());
        assert_eq!(controller.state(), RecordingState::Idle);

        let state = probe.snapshot();
        assert!(state.recorder_stopped);
        assert!(state.recorder_released);
        assert!(state.preview_running);
        assert!(matches!(*shared.slot.lock().await, SensorState::Open(_)));
    }

    #[tokio::test]
    async fn test_double_start_is_a_silent_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _shared, bus, _probe) =
            open_controller(RecordingConfig::default(), SyntheticFaults::default()).await;
        let mut events = bus.subscribe();

        controller.start(options_in(&dir)).await.unwrap();
        controller.start(options_in(&dir)).await.unwrap();

        assert_eq!(controller.state(), RecordingState::Started);
        let first = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, SnapcamEvent::RecordingStarted));
        // No second started notification.
        assert!(events.try_recv().is_err());

        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start_reports_failure() {
        let (controller, _shared, bus, _probe) =
            open_controller(RecordingConfig::default(), SyntheticFaults::default()).await;
        let mut events = bus.subscribe();

        let err = controller.stop().await.unwrap_err();

        assert!(matches!(
            err,
            SnapcamError::Recorder(RecorderError::NotRecording)
        ));
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SnapcamEvent::RecordingStopFailed { .. }));
    }

    #[tokio::test]
    async fn test_profile_preference_picks_first_available() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _shared, _bus, probe) =
            open_controller(RecordingConfig::default(), SyntheticFaults::default()).await;

        controller.start(options_in(&dir)).await.unwrap();
        controller.stop().await.unwrap();

        // Synthetic sensors offer P480/P720/Low; High is unavailable,
        // so the next preference wins.
        assert_eq!(probe.snapshot().recorder_profile, Some(QualityProfile::P480));
    }

    #[tokio::test]
    async fn test_audio_source_follows_disable_flag() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _shared, _bus, probe) =
            open_controller(RecordingConfig::default(), SyntheticFaults::default()).await;
        controller.start(options_in(&dir)).await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(
            probe.snapshot().recorder_audio,
            Some(AudioSource::VoiceRecognition)
        );

        let config = RecordingConfig {
            disable_audio: true,
            ..RecordingConfig::default()
        };
        let (controller, _shared, _bus, probe) =
            open_controller(config, SyntheticFaults::default()).await;
        controller.start(options_in(&dir)).await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(
            probe.snapshot().recorder_audio,
            Some(AudioSource::Camcorder)
        );
    }

    #[tokio::test]
    async fn test_orientation_hint_uses_rotation_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, shared, _bus, probe) =
            open_controller(RecordingConfig::default(), SyntheticFaults::default()).await;

        shared.set_device_rotation(90);
        controller.start(options_in(&dir)).await.unwrap();
        controller.stop().await.unwrap();

        // Back sensor mounted at 90, device at 90: hint 0.
        assert_eq!(probe.snapshot().recorder_orientation_hint, Some(0));
    }

    #[tokio::test]
    async fn test_flash_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, shared, _bus, probe) =
            open_controller(RecordingConfig::default(), SyntheticFaults::default()).await;

        let options = RecordingOptions {
            with_flash: true,
            ..options_in(&dir)
        };
        controller.start(options).await.unwrap();
        assert!(probe.snapshot().torch_on);
        assert!(shared.torch_on());

        controller.stop().await.unwrap();
        assert!(!probe.snapshot().torch_on);
        assert!(!shared.torch_on());
    }

    #[tokio::test]
    async fn test_start_failure_restores_preview_and_stays_idle() {
        let dir = tempfile::tempdir().unwrap();
        let faults = SyntheticFaults {
            recorder_start: true,
            ..SyntheticFaults::default()
        };
        let (controller, shared, bus, probe) =
            open_controller(RecordingConfig::default(), faults).await;
        let mut events = bus.subscribe();

        let err = controller.start(options_in(&dir)).await.unwrap_err();

        assert!(matches!(
            err,
            SnapcamError::Recorder(RecorderError::Start { .. })
        ));
        assert_eq!(controller.state(), RecordingState::Idle);
        assert!(probe.snapshot().preview_running);
        assert!(matches!(*shared.slot.lock().await, SensorState::Open(_)));
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SnapcamEvent::RecordingStartFailed { .. }));
    }

    #[tokio::test]
    async fn test_stop_failure_still_recovers_the_sensor() {
        let dir = tempfile::tempdir().unwrap();
        let faults = SyntheticFaults {
            recorder_stop: true,
            ..SyntheticFaults::default()
        };
        let (controller, shared, bus, probe) =
            open_controller(RecordingConfig::default(), faults).await;

        controller.start(options_in(&dir)).await.unwrap();
        let mut events = bus.subscribe();

        assert!(controller.stop().await.is_err());

        // The failure is reported, but the lease is cleared and the
        // sensor is back in the preview's hands.
        assert_eq!(controller.state(), RecordingState::Idle);
        assert!(probe.snapshot().preview_running);
        assert!(matches!(*shared.slot.lock().await, SensorState::Open(_)));
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SnapcamEvent::RecordingStopFailed { .. }));
    }

    #[tokio::test]
    async fn test_start_requires_open_sensor() {
        let shared = Arc::new(SensorShared::new());
        let bus = EventBus::new(16);
        let controller =
            RecordingController::new(Arc::clone(&shared), bus, RecordingConfig::default());
        let dir = tempfile::tempdir().unwrap();

        let err = controller.start(options_in(&dir)).await.unwrap_err();
        assert!(matches!(err, SnapcamError::Driver(DriverError::NotOpen)));
    }
}

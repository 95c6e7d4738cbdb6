use super::interface::{
    AudioSource, CameraDriver, CameraProvider, DriverCapabilities, QualityProfile,
    RecorderSettings, StillSettings, VideoRecorder,
};
use crate::error::{DriverError, RecorderError};
use crate::focus::DriverArea;
use crate::frame::{encode_rgb_jpeg, FrameFormat, RawFrame};
use crate::orientation::Facing;
use crate::sizing::Size;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Failure switches for exercising recovery paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticFaults {
    pub auto_focus: bool,
    pub recorder_prepare: bool,
    pub recorder_start: bool,
    pub recorder_stop: bool,
}

/// Everything the synthetic sensor has been asked to do, for
/// inspection after the driver handle has been consumed by a pipeline.
#[derive(Debug, Clone, Default)]
pub struct ProbeState {
    pub preview_running: bool,
    pub torch_on: bool,
    pub zoom: u32,
    pub last_still: Option<StillSettings>,
    pub focus_area: Option<DriverArea>,
    pub metering_area: Option<DriverArea>,
    pub auto_focus_runs: u32,
    pub focus_cancels: u32,
    pub recorder_audio: Option<AudioSource>,
    pub recorder_profile: Option<QualityProfile>,
    pub recorder_orientation_hint: Option<u16>,
    pub recorder_prepared: bool,
    pub recorder_started: bool,
    pub recorder_stopped: bool,
    pub recorder_released: bool,
}

/// Shared window into a [`SyntheticDriver`]'s state. Clones observe the
/// same sensor, across facing switches and recorder hand-offs.
#[derive(Clone, Default)]
pub struct SyntheticProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl SyntheticProbe {
    pub fn snapshot(&self) -> ProbeState {
        self.state.lock().clone()
    }
}

/// Deterministic in-memory sensor used by the demo binary and tests.
///
/// Frames are synthesized gradients; stills come back as real JPEG
/// bytes so the capture pipeline's decode and metadata paths run for
/// real.
pub struct SyntheticDriver {
    facing: Facing,
    mount_angle: u16,
    capabilities: DriverCapabilities,
    faults: SyntheticFaults,
    probe: SyntheticProbe,
    preview_running: bool,
    zoom: u32,
    torch_on: bool,
    frame_counter: u64,
}

impl SyntheticDriver {
    pub fn new(facing: Facing) -> Self {
        let mount_angle = match facing {
            Facing::Back => 90,
            Facing::Front => 270,
        };
        Self {
            facing,
            mount_angle,
            capabilities: default_capabilities(facing),
            faults: SyntheticFaults::default(),
            probe: SyntheticProbe::default(),
            preview_running: false,
            zoom: 0,
            torch_on: false,
            frame_counter: 0,
        }
    }

    pub fn with_mount_angle(mut self, mount_angle: u16) -> Self {
        self.mount_angle = mount_angle;
        self
    }

    pub fn with_capabilities(mut self, capabilities: DriverCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_faults(mut self, faults: SyntheticFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_probe(mut self, probe: SyntheticProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn probe(&self) -> SyntheticProbe {
        self.probe.clone()
    }

    fn set_preview_running(&mut self, running: bool) {
        self.preview_running = running;
        self.probe.state.lock().preview_running = running;
    }

    fn synth_frame(&mut self) -> RawFrame {
        let size = self.capabilities.preview_size;
        let width = size.width as usize;
        let height = size.height as usize;
        let counter = self.frame_counter as usize;
        self.frame_counter += 1;

        let mut data = Vec::with_capacity(width * height * 3 / 2);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + y + counter) & 0xFF) as u8);
            }
        }
        // Neutral chroma
        data.resize(width * height * 3 / 2, 128);

        RawFrame {
            data,
            width: size.width,
            height: size.height,
            format: FrameFormat::Nv21,
        }
    }
}

fn default_capabilities(facing: Facing) -> DriverCapabilities {
    DriverCapabilities {
        preview_size: Size {
            width: 640,
            height: 480,
        },
        picture_sizes: vec![
            Size {
                width: 640,
                height: 480,
            },
            Size {
                width: 800,
                height: 600,
            },
            Size {
                width: 1280,
                height: 720,
            },
            Size {
                width: 1600,
                height: 1200,
            },
        ],
        // Front sensors typically have no flash unit.
        supports_flash: facing == Facing::Back,
        supports_metering_areas: true,
        supports_zoom: true,
        max_zoom: 8,
        profiles: vec![QualityProfile::P480, QualityProfile::P720, QualityProfile::Low],
    }
}

#[async_trait]
impl CameraDriver for SyntheticDriver {
    fn facing(&self) -> Facing {
        self.facing
    }

    fn mount_angle(&self) -> u16 {
        self.mount_angle
    }

    fn capabilities(&self) -> DriverCapabilities {
        self.capabilities.clone()
    }

    async fn start_preview(&mut self) -> Result<(), DriverError> {
        debug!("Synthetic {} preview started", self.facing);
        self.set_preview_running(true);
        Ok(())
    }

    async fn stop_preview(&mut self) -> Result<(), DriverError> {
        debug!("Synthetic {} preview stopped", self.facing);
        self.set_preview_running(false);
        Ok(())
    }

    fn preview_running(&self) -> bool {
        self.preview_running
    }

    async fn pull_preview_frame(&mut self) -> Result<RawFrame, DriverError> {
        if !self.preview_running {
            return Err(DriverError::stream("preview is not running"));
        }
        Ok(self.synth_frame())
    }

    async fn capture_still(&mut self, settings: StillSettings) -> Result<Vec<u8>, DriverError> {
        if !self.preview_running {
            return Err(DriverError::stream("preview is not running"));
        }
        // The shutter sequence takes the preview down.
        self.set_preview_running(false);
        self.probe.state.lock().last_still = Some(settings);

        let width = settings.size.width as usize;
        let height = settings.size.height as usize;
        let mut rgb = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                let shade_x = ((x * 255) / width.max(1)) as u8;
                let shade_y = ((y * 255) / height.max(1)) as u8;
                rgb.extend_from_slice(&[shade_x, shade_x, shade_y]);
            }
        }

        encode_rgb_jpeg(&rgb, settings.size, settings.jpeg_quality)
            .map_err(|e| DriverError::stream(format!("synthetic still encode: {}", e)))
    }

    fn zoom(&self) -> u32 {
        self.zoom
    }

    async fn set_zoom(&mut self, step: u32) -> Result<(), DriverError> {
        if !self.capabilities.supports_zoom {
            return Err(DriverError::unsupported("sensor has no zoom"));
        }
        if step > self.capabilities.max_zoom {
            return Err(DriverError::unsupported(format!(
                "zoom step {} exceeds max {}",
                step, self.capabilities.max_zoom
            )));
        }
        self.zoom = step;
        self.probe.state.lock().zoom = step;
        Ok(())
    }

    async fn set_torch(&mut self, on: bool) -> Result<(), DriverError> {
        if !self.capabilities.supports_flash {
            return Err(DriverError::unsupported("sensor has no flash unit"));
        }
        self.torch_on = on;
        self.probe.state.lock().torch_on = on;
        Ok(())
    }

    async fn cancel_auto_focus(&mut self) -> Result<(), DriverError> {
        self.probe.state.lock().focus_cancels += 1;
        Ok(())
    }

    async fn set_focus_areas(
        &mut self,
        focus: DriverArea,
        metering: Option<DriverArea>,
    ) -> Result<(), DriverError> {
        let mut state = self.probe.state.lock();
        state.focus_area = Some(focus);
        state.metering_area = metering;
        Ok(())
    }

    async fn auto_focus(&mut self) -> Result<(), DriverError> {
        self.probe.state.lock().auto_focus_runs += 1;
        if self.faults.auto_focus {
            return Err(DriverError::focus("synthetic autofocus failure"));
        }
        Ok(())
    }

    fn into_recorder(self: Box<Self>, settings: RecorderSettings) -> Box<dyn VideoRecorder> {
        {
            let mut state = self.probe.state.lock();
            state.recorder_audio = Some(settings.audio_source);
            state.recorder_profile = Some(settings.profile);
            state.recorder_orientation_hint = Some(settings.orientation_hint);
            state.recorder_prepared = false;
            state.recorder_started = false;
            state.recorder_stopped = false;
            state.recorder_released = false;
        }
        Box::new(SyntheticRecorder {
            driver: *self,
            settings,
            recording: false,
        })
    }
}

/// Recorder half of the synthetic sensor. Holds the driver until
/// released; stop finalizes a stub clip at the output path.
struct SyntheticRecorder {
    driver: SyntheticDriver,
    settings: RecorderSettings,
    recording: bool,
}

#[async_trait]
impl VideoRecorder for SyntheticRecorder {
    async fn prepare(&mut self) -> Result<(), RecorderError> {
        if self.driver.faults.recorder_prepare {
            return Err(RecorderError::prepare("synthetic prepare failure"));
        }
        if let Some(parent) = self.settings.output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(RecorderError::prepare(format!(
                    "output directory {} does not exist",
                    parent.display()
                )));
            }
        }
        self.driver.probe.state.lock().recorder_prepared = true;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), RecorderError> {
        if self.driver.faults.recorder_start {
            return Err(RecorderError::start("synthetic start failure"));
        }
        self.recording = true;
        self.driver.probe.state.lock().recorder_started = true;
        debug!("Synthetic recording started: {}", self.settings.output_path.display());
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RecorderError> {
        if !self.recording {
            return Err(RecorderError::stop("recorder was never started"));
        }
        if self.driver.faults.recorder_stop {
            return Err(RecorderError::stop("synthetic stop failure"));
        }

        let contents = format!(
            "synthetic clip: profile {:?}, audio {:?}, hint {}\n",
            self.settings.profile, self.settings.audio_source, self.settings.orientation_hint
        );
        tokio::fs::write(&self.settings.output_path, contents)
            .await
            .map_err(|e| RecorderError::stop(format!("finalizing clip: {}", e)))?;

        self.recording = false;
        self.driver.probe.state.lock().recorder_stopped = true;
        Ok(())
    }

    fn release(self: Box<Self>) -> Box<dyn CameraDriver> {
        self.driver.probe.state.lock().recorder_released = true;
        Box::new(self.driver)
    }
}

/// Opens synthetic drivers, all observed through one shared probe.
pub struct SyntheticProvider {
    mount_angle: Option<u16>,
    faults: SyntheticFaults,
    probe: SyntheticProbe,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self {
            mount_angle: None,
            faults: SyntheticFaults::default(),
            probe: SyntheticProbe::default(),
        }
    }

    /// Force one mount angle for both facings instead of the
    /// per-facing defaults.
    pub fn with_mount_angle(mut self, mount_angle: u16) -> Self {
        self.mount_angle = Some(mount_angle);
        self
    }

    pub fn with_faults(mut self, faults: SyntheticFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn probe(&self) -> SyntheticProbe {
        self.probe.clone()
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraProvider for SyntheticProvider {
    async fn open(&self, facing: Facing) -> Result<Box<dyn CameraDriver>, DriverError> {
        info!("Opening synthetic {} sensor", facing);
        let mut driver = SyntheticDriver::new(facing)
            .with_faults(self.faults)
            .with_probe(self.probe.clone());
        if let Some(mount_angle) = self.mount_angle {
            driver = driver.with_mount_angle(mount_angle);
        }
        Ok(Box::new(driver))
    }
}

mod interface;
mod synthetic;
#[cfg(test)]
mod tests;

pub use interface::{
    AudioSource, CameraDriver, CameraProvider, DriverCapabilities, QualityProfile,
    RecorderSettings, StillSettings, VideoRecorder,
};
pub use synthetic::{ProbeState, SyntheticDriver, SyntheticFaults, SyntheticProbe, SyntheticProvider};

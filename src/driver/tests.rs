use super::*;
use crate::orientation::Facing;
use crate::sizing::Size;
use std::path::PathBuf;
use std::time::Duration;

#[tokio::test]
async fn test_preview_lifecycle() {
    let mut driver = SyntheticDriver::new(Facing::Back);
    assert!(!driver.preview_running());

    driver.start_preview().await.unwrap();
    assert!(driver.preview_running());

    let frame = driver.pull_preview_frame().await.unwrap();
    assert_eq!(frame.size(), Size { width: 640, height: 480 });

    driver.stop_preview().await.unwrap();
    assert!(driver.pull_preview_frame().await.is_err());
}

#[tokio::test]
async fn test_still_capture_stops_preview_and_encodes() {
    let mut driver = SyntheticDriver::new(Facing::Back);
    driver.start_preview().await.unwrap();

    let jpeg = driver
        .capture_still(StillSettings {
            size: Size { width: 800, height: 600 },
            jpeg_quality: 80,
            rotation: 90,
        })
        .await
        .unwrap();

    // The shutter sequence leaves the preview stopped.
    assert!(!driver.preview_running());
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (800, 600));

    let still = driver.probe().snapshot().last_still.unwrap();
    assert_eq!(still.rotation, 90);
}

#[tokio::test]
async fn test_still_capture_requires_running_preview() {
    let mut driver = SyntheticDriver::new(Facing::Back);

    let result = driver
        .capture_still(StillSettings {
            size: Size { width: 640, height: 480 },
            jpeg_quality: 80,
            rotation: 0,
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_zoom_is_bounded() {
    let mut driver = SyntheticDriver::new(Facing::Back);

    driver.set_zoom(8).await.unwrap();
    assert_eq!(driver.zoom(), 8);
    assert!(driver.set_zoom(9).await.is_err());
}

#[tokio::test]
async fn test_front_sensor_has_no_torch() {
    let mut driver = SyntheticDriver::new(Facing::Front);
    assert!(!driver.capabilities().supports_flash);
    assert!(driver.set_torch(true).await.is_err());

    let mut back = SyntheticDriver::new(Facing::Back);
    back.set_torch(true).await.unwrap();
    assert!(back.probe().snapshot().torch_on);
}

#[tokio::test]
async fn test_recorder_round_trip_releases_the_driver() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("clip.mp4");
    let driver = SyntheticDriver::new(Facing::Back);
    let probe = driver.probe();
    let driver: Box<dyn CameraDriver> = Box::new(driver);

    let mut recorder = driver.into_recorder(RecorderSettings {
        output_path: output_path.clone(),
        profile: QualityProfile::P720,
        audio_source: AudioSource::VoiceRecognition,
        orientation_hint: 90,
        max_duration: Some(Duration::from_secs(30)),
    });
    recorder.prepare().await.unwrap();
    recorder.start().await.unwrap();
    recorder.stop().await.unwrap();
    let driver = recorder.release();

    assert!(output_path.exists());
    assert_eq!(driver.facing(), Facing::Back);
    let state = probe.snapshot();
    assert_eq!(state.recorder_profile, Some(QualityProfile::P720));
    assert_eq!(state.recorder_orientation_hint, Some(90));
    assert!(state.recorder_stopped);
    assert!(state.recorder_released);
}

#[tokio::test]
async fn test_recorder_prepare_rejects_missing_directory() {
    let driver: Box<dyn CameraDriver> = Box::new(SyntheticDriver::new(Facing::Back));

    let mut recorder = driver.into_recorder(RecorderSettings {
        output_path: PathBuf::from("/nonexistent-dir/clip.mp4"),
        profile: QualityProfile::Low,
        audio_source: AudioSource::Camcorder,
        orientation_hint: 0,
        max_duration: None,
    });
    assert!(recorder.prepare().await.is_err());
}

#[tokio::test]
async fn test_stop_before_start_is_an_error() {
    let driver: Box<dyn CameraDriver> = Box::new(SyntheticDriver::new(Facing::Back));
    let mut recorder = driver.into_recorder(RecorderSettings {
        output_path: PathBuf::from("clip.mp4"),
        profile: QualityProfile::Low,
        audio_source: AudioSource::Camcorder,
        orientation_hint: 0,
        max_duration: None,
    });
    assert!(recorder.stop().await.is_err());
}

#[tokio::test]
async fn test_provider_shares_one_probe_across_facings() {
    let provider = SyntheticProvider::new();
    let probe = provider.probe();

    let mut back = provider.open(Facing::Back).await.unwrap();
    back.start_preview().await.unwrap();
    assert!(probe.snapshot().preview_running);
    back.stop_preview().await.unwrap();

    let mut front = provider.open(Facing::Front).await.unwrap();
    front.start_preview().await.unwrap();
    assert!(probe.snapshot().preview_running);
    assert_eq!(front.facing(), Facing::Front);
}

#[tokio::test]
async fn test_provider_mount_angle_override() {
    let provider = SyntheticProvider::new().with_mount_angle(0);
    let driver = provider.open(Facing::Back).await.unwrap();
    assert_eq!(driver.mount_angle(), 0);

    let default_provider = SyntheticProvider::new();
    assert_eq!(
        default_provider.open(Facing::Back).await.unwrap().mount_angle(),
        90
    );
    assert_eq!(
        default_provider.open(Facing::Front).await.unwrap().mount_angle(),
        270
    );
}

use crate::error::CaptureError;
use image::{ImageDecoder, ImageReader};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

/// Which way the sensor points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Back,
    Front,
}

impl Facing {
    pub fn opposite(&self) -> Facing {
        match self {
            Facing::Back => Facing::Front,
            Facing::Front => Facing::Back,
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Back => write!(f, "back"),
            Facing::Front => write!(f, "front"),
        }
    }
}

/// The pixel transform a captured still needs before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationDecision {
    /// Clockwise rotation, always a multiple of 90 in [0, 360)
    pub rotation_degrees: u16,
    /// Horizontal mirror applied after the rotation
    pub mirror: bool,
}

impl OrientationDecision {
    /// True only for the no-rotation, no-mirror pass-through.
    pub fn is_identity(&self) -> bool {
        self.rotation_degrees == 0 && !self.mirror
    }
}

/// Rotation to encode into a still capture or a recording orientation
/// hint, given the sensor's mount angle and the device rotation at the
/// moment of capture.
///
/// Front sensors compose the two angles and then negate, but only when
/// the device is actually rotated; at the natural orientation the
/// composed angle is used as-is.
pub fn resolve_still_rotation(facing: Facing, mount_angle: u16, device_rotation: u16) -> u16 {
    let mount = mount_angle as i32;
    let device = device_rotation as i32;
    match facing {
        Facing::Back => (mount - device).rem_euclid(360) as u16,
        Facing::Front => {
            let rotation = (mount + device).rem_euclid(360);
            if device != 0 {
                (360 - rotation).rem_euclid(360) as u16
            } else {
                rotation as u16
            }
        }
    }
}

/// Rotation the live preview applies to sensor frames.
///
/// Unlike [`resolve_still_rotation`], the front formula negates
/// unconditionally: the preview always compensates for the hardware
/// mirror, device rotated or not.
pub fn resolve_display_rotation(facing: Facing, mount_angle: u16, device_rotation: u16) -> u16 {
    let mount = mount_angle as i32;
    let device = device_rotation as i32;
    match facing {
        Facing::Back => (mount - device).rem_euclid(360) as u16,
        Facing::Front => {
            let rotation = (mount + device).rem_euclid(360);
            (360 - rotation).rem_euclid(360) as u16
        }
    }
}

/// Map a raw EXIF orientation tag to a clockwise rotation.
///
/// Only the three pure-rotation tags are honored; mirrored variants and
/// out-of-range values decode to 0 rather than an error, so a capture
/// with unusual metadata degrades to a pass-through instead of failing.
pub fn decode_exif_rotation(tag: u16) -> u16 {
    match tag {
        6 => 90,
        3 => 180,
        8 => 270,
        _ => 0,
    }
}

/// Decide the transform that makes a captured still upright.
///
/// Front captures undo the encoded rotation in the opposite direction
/// and then mirror; back captures replay the encoded rotation directly.
pub fn still_image_transform(facing: Facing, exif_rotation: u16) -> OrientationDecision {
    match facing {
        Facing::Front => OrientationDecision {
            rotation_degrees: (360 - exif_rotation % 360) % 360,
            mirror: true,
        },
        Facing::Back => OrientationDecision {
            rotation_degrees: exif_rotation % 360,
            mirror: false,
        },
    }
}

/// Read the embedded orientation tag from encoded JPEG bytes.
///
/// An absent tag reads as 0; a container the decoder cannot open is a
/// metadata error.
pub fn read_exif_rotation(jpeg: &[u8]) -> Result<u16, CaptureError> {
    let reader = ImageReader::new(Cursor::new(jpeg))
        .with_guessed_format()
        .map_err(|e| CaptureError::metadata(e.to_string()))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| CaptureError::metadata(e.to_string()))?;
    let orientation = decoder
        .orientation()
        .map_err(|e| CaptureError::metadata(e.to_string()))?;
    Ok(decode_exif_rotation(orientation.to_exif() as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_exif_rotation_mapping() {
        assert_eq!(decode_exif_rotation(6), 90);
        assert_eq!(decode_exif_rotation(3), 180);
        assert_eq!(decode_exif_rotation(8), 270);

        // Everything else, including the mirrored variants, is 0.
        for tag in [0, 1, 2, 4, 5, 7, 9, 255, u16::MAX] {
            assert_eq!(decode_exif_rotation(tag), 0, "tag {}", tag);
        }
    }

    #[test]
    fn test_back_still_rotation() {
        assert_eq!(resolve_still_rotation(Facing::Back, 90, 0), 90);
        assert_eq!(resolve_still_rotation(Facing::Back, 90, 90), 0);
        assert_eq!(resolve_still_rotation(Facing::Back, 270, 180), 90);
        assert_eq!(resolve_still_rotation(Facing::Back, 0, 270), 90);
    }

    #[test]
    fn test_front_still_rotation_negates_only_when_rotated() {
        // Natural orientation keeps the composed angle.
        assert_eq!(resolve_still_rotation(Facing::Front, 270, 0), 270);
        // Rotated device negates it.
        assert_eq!(resolve_still_rotation(Facing::Front, 270, 90), 0);
        assert_eq!(resolve_still_rotation(Facing::Front, 270, 180), 270);
        assert_eq!(resolve_still_rotation(Facing::Front, 90, 90), 180);
    }

    #[test]
    fn test_front_display_rotation_always_negates() {
        assert_eq!(resolve_display_rotation(Facing::Front, 270, 0), 90);
        assert_eq!(resolve_display_rotation(Facing::Front, 270, 90), 0);
        // Differs from the still formula exactly at device_rotation == 0.
        assert_ne!(
            resolve_display_rotation(Facing::Front, 270, 0),
            resolve_still_rotation(Facing::Front, 270, 0)
        );
    }

    #[test]
    fn test_back_display_matches_back_still() {
        for device in [0, 90, 180, 270] {
            assert_eq!(
                resolve_display_rotation(Facing::Back, 90, device),
                resolve_still_rotation(Facing::Back, 90, device)
            );
        }
    }

    #[test]
    fn test_still_image_transform() {
        assert_eq!(
            still_image_transform(Facing::Front, 90),
            OrientationDecision {
                rotation_degrees: 270,
                mirror: true
            }
        );
        assert_eq!(
            still_image_transform(Facing::Back, 180),
            OrientationDecision {
                rotation_degrees: 180,
                mirror: false
            }
        );
    }

    #[test]
    fn test_identity_only_for_untagged_back_capture() {
        assert!(still_image_transform(Facing::Back, 0).is_identity());
        // A front capture always mirrors, even with no encoded rotation.
        assert!(!still_image_transform(Facing::Front, 0).is_identity());
        assert!(!still_image_transform(Facing::Back, 90).is_identity());
    }

    #[test]
    fn test_read_exif_rotation_without_tag_is_zero() {
        // A plain encode carries no orientation tag.
        let mut jpeg = Vec::new();
        let pixels = [0u8; 12]; // 2x2 RGB
        image::codecs::jpeg::JpegEncoder::new(&mut jpeg)
            .encode(&pixels, 2, 2, image::ExtendedColorType::Rgb8)
            .unwrap();

        assert_eq!(read_exif_rotation(&jpeg).unwrap(), 0);
    }

    #[test]
    fn test_read_exif_rotation_rejects_garbage() {
        assert!(read_exif_rotation(&[0x00, 0x01, 0x02, 0x03]).is_err());
    }
}

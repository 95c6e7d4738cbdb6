use crate::error::{CaptureError, Result, SnapcamError};
use crate::sizing::Size;
use image::codecs::jpeg::JpegEncoder;

/// Pixel layouts moving through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Full-resolution luma plane followed by interleaved VU chroma at
    /// quarter resolution
    Nv21,
}

impl FrameFormat {
    /// Buffer length a frame of the given dimensions must have.
    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        match self {
            // luma plane + half-size chroma plane
            FrameFormat::Nv21 => {
                let pixels = width as usize * height as usize;
                pixels + pixels / 2
            }
        }
    }
}

/// One raw sensor frame. The buffer is exclusively owned, so rotating
/// by 0 degrees can hand the frame back without touching the pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl RawFrame {
    /// Build a frame, validating geometry against the buffer.
    ///
    /// Semi-planar chroma subsampling needs even dimensions; anything
    /// else is a caller bug, not a runtime condition.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(SnapcamError::invalid_argument(format!(
                "frame dimensions must be even and non-zero, got {}x{}",
                width, height
            )));
        }
        let expected = format.buffer_len(width, height);
        if data.len() != expected {
            return Err(SnapcamError::invalid_argument(format!(
                "frame buffer is {} bytes, {}x{} {:?} needs {}",
                data.len(),
                width,
                height,
                format,
                expected
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    /// Rotate the frame clockwise by a multiple of 90 degrees.
    ///
    /// 0 is an identity that returns the frame unchanged. The other
    /// angles remap every luma byte and chroma pair into one freshly
    /// allocated buffer; the chroma x coordinate is rounded down to the
    /// even pair boundary on both sides of the copy so a VU pair is
    /// never split. 90 and 270 exchange the frame's dimensions.
    pub fn rotated(self, rotation_degrees: u16) -> Result<RawFrame> {
        if rotation_degrees % 90 != 0 || rotation_degrees >= 360 {
            return Err(SnapcamError::invalid_argument(format!(
                "rotation must be one of 0/90/180/270, got {}",
                rotation_degrees
            )));
        }
        if rotation_degrees == 0 {
            return Ok(self);
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let frame_size = width * height;

        let mut output = Vec::new();
        output
            .try_reserve_exact(self.data.len())
            .map_err(|e| -> SnapcamError {
                CaptureError::resource_exhausted(format!(
                    "rotation buffer of {} bytes: {}",
                    self.data.len(),
                    e
                ))
                .into()
            })?;
        output.resize(self.data.len(), 0);

        let swap = rotation_degrees % 180 != 0;
        let xflip = rotation_degrees % 270 != 0;
        let yflip = rotation_degrees >= 180;

        let out_width = if swap { height } else { width };
        let out_height = if swap { width } else { height };

        for j in 0..height {
            for i in 0..width {
                let y_in = j * width + i;
                let chroma_in = frame_size + (j >> 1) * width + (i & !1);

                let (i_swapped, j_swapped) = if swap { (j, i) } else { (i, j) };
                let i_out = if xflip {
                    out_width - i_swapped - 1
                } else {
                    i_swapped
                };
                let j_out = if yflip {
                    out_height - j_swapped - 1
                } else {
                    j_swapped
                };

                let y_out = j_out * out_width + i_out;
                let chroma_out = frame_size + (j_out >> 1) * out_width + (i_out & !1);

                output[y_out] = self.data[y_in];
                output[chroma_out] = self.data[chroma_in];
                output[chroma_out + 1] = self.data[chroma_in + 1];
            }
        }

        Ok(RawFrame {
            data: output,
            width: out_width as u32,
            height: out_height as u32,
            format: self.format,
        })
    }

    /// Convert the frame to packed RGB using integer fixed-point math.
    pub fn to_rgb(&self) -> Result<Vec<u8>> {
        let width = self.width as usize;
        let height = self.height as usize;
        let frame_size = width * height;

        let mut rgb = Vec::new();
        rgb.try_reserve_exact(frame_size * 3)
            .map_err(|e| -> SnapcamError {
                CaptureError::resource_exhausted(format!(
                    "RGB buffer of {} bytes: {}",
                    frame_size * 3,
                    e
                ))
                .into()
            })?;

        let luma_plane = &self.data[..frame_size];
        let chroma_plane = &self.data[frame_size..];

        for y in 0..height {
            for x in 0..width {
                let luma = luma_plane[y * width + x] as i32;
                let chroma_index = (y / 2) * width + (x & !1);
                let v = chroma_plane[chroma_index] as i32 - 128;
                let u = chroma_plane[chroma_index + 1] as i32 - 128;

                let r = luma + ((v * 359) >> 8);
                let g = luma - ((u * 88 + v * 183) >> 8);
                let b = luma + ((u * 454) >> 8);

                rgb.push(r.clamp(0, 255) as u8);
                rgb.push(g.clamp(0, 255) as u8);
                rgb.push(b.clamp(0, 255) as u8);
            }
        }

        Ok(rgb)
    }
}

/// Encode packed RGB pixels as JPEG at the given quality.
pub fn encode_rgb_jpeg(rgb: &[u8], size: Size, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .encode(rgb, size.width, size.height, image::ExtendedColorType::Rgb8)
        .map_err(|e| -> SnapcamError {
            CaptureError::transform(format!("JPEG encode failed: {}", e)).into()
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x2 frame with every byte equal to its index, so remaps can be
    /// read off directly.
    fn indexed_frame() -> RawFrame {
        let data: Vec<u8> = (0..12).collect();
        RawFrame::new(data, 4, 2, FrameFormat::Nv21).unwrap()
    }

    #[test]
    fn test_new_validates_geometry() {
        assert!(RawFrame::new(vec![0; 12], 4, 2, FrameFormat::Nv21).is_ok());
        // Odd dimensions
        assert!(RawFrame::new(vec![0; 18], 3, 4, FrameFormat::Nv21).is_err());
        // Wrong buffer length
        assert!(RawFrame::new(vec![0; 11], 4, 2, FrameFormat::Nv21).is_err());
        // Zero dimension
        assert!(RawFrame::new(vec![], 0, 2, FrameFormat::Nv21).is_err());
    }

    #[test]
    fn test_rotation_zero_is_zero_copy() {
        let frame = indexed_frame();
        let before = frame.data.as_ptr();

        let rotated = frame.rotated(0).unwrap();

        assert_eq!(rotated.data.as_ptr(), before);
        assert_eq!(rotated.width, 4);
        assert_eq!(rotated.height, 2);
    }

    #[test]
    fn test_rotate_90_remaps_luma_and_chroma() {
        let rotated = indexed_frame().rotated(90).unwrap();

        assert_eq!(rotated.width, 2);
        assert_eq!(rotated.height, 4);
        // Columns of the input become rows, bottom row first.
        assert_eq!(rotated.data, vec![4, 0, 5, 1, 6, 2, 7, 3, 8, 9, 10, 11]);
    }

    #[test]
    fn test_rotate_round_trip_restores_frame() {
        let original = indexed_frame();

        let back = original.clone().rotated(90).unwrap().rotated(270).unwrap();
        assert_eq!(back, original);

        let back = original.clone().rotated(180).unwrap().rotated(180).unwrap();
        assert_eq!(back, original);

        let back = original.clone().rotated(270).unwrap().rotated(90).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_rotation_preserves_length() {
        for rotation in [90, 180, 270] {
            let rotated = indexed_frame().rotated(rotation).unwrap();
            assert_eq!(rotated.data.len(), 12, "rotation {}", rotation);
        }
    }

    #[test]
    fn test_rejects_unsupported_rotation() {
        assert!(indexed_frame().rotated(45).is_err());
        assert!(indexed_frame().rotated(360).is_err());
        assert!(indexed_frame().rotated(91).is_err());
    }

    #[test]
    fn test_to_rgb_neutral_chroma_is_gray() {
        // Neutral chroma (128) makes every pixel its luma value.
        let mut data = vec![100u8; 4]; // 2x2 luma
        data.extend_from_slice(&[128, 128]); // one VU pair
        let frame = RawFrame::new(data, 2, 2, FrameFormat::Nv21).unwrap();

        let rgb = frame.to_rgb().unwrap();

        assert_eq!(rgb.len(), 12);
        assert!(rgb.iter().all(|&c| c == 100));
    }

    #[test]
    fn test_encode_rgb_jpeg_is_decodable() {
        let size = Size {
            width: 4,
            height: 4,
        };
        let rgb = vec![200u8; 48];

        let jpeg = encode_rgb_jpeg(&rgb, size, 85).unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 4);
    }
}

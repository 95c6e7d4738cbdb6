use crate::error::{Result, SnapcamError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel dimensions of a frame, preview, or capture target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Create a size, rejecting zero dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SnapcamError::invalid_argument(format!(
                "size dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// Total pixel count, in u64 to survive large sensor dimensions.
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width-over-height aspect ratio.
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// The same area with width and height exchanged.
    pub fn swapped(&self) -> Size {
        Size {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How far a candidate's aspect ratio may drift from the preview's
/// before it is excluded from capture-size selection.
const ASPECT_TOLERANCE: f64 = 0.1;

/// Choose the sensor capture size for a still picture.
///
/// An exact match for the requested size always wins. Otherwise
/// candidates whose aspect ratio sits within [`ASPECT_TOLERANCE`] of the
/// preview's are ranked by pixel count, ties going to the height closest
/// to the target height (the requested height, or the preview height
/// when the caller asked for no particular size). When nothing matches
/// the ratio window at all, the size with the closest height is used
/// regardless of ratio, so the selector always produces a size from a
/// non-empty list.
pub fn select_capture_size(
    requested: Option<Size>,
    preview: Size,
    supported: &[Size],
) -> Result<Size> {
    if supported.is_empty() {
        return Err(SnapcamError::invalid_argument(
            "driver reported no supported capture sizes",
        ));
    }

    if let Some(requested) = requested {
        if supported.contains(&requested) {
            return Ok(requested);
        }
    }

    let target_ratio = preview.ratio();
    let target_height = match requested {
        Some(size) => size.height,
        None => preview.height,
    };

    let mut best: Option<Size> = None;
    for &candidate in supported {
        if (candidate.ratio() - target_ratio).abs() > ASPECT_TOLERANCE {
            continue;
        }
        best = Some(match best {
            None => candidate,
            Some(current) if candidate.pixels() > current.pixels() => candidate,
            Some(current)
                if candidate.pixels() == current.pixels()
                    && height_distance(candidate, target_height)
                        < height_distance(current, target_height) =>
            {
                candidate
            }
            Some(current) => current,
        });
    }

    match best {
        Some(size) => Ok(size),
        // Nothing fits the ratio window; take the closest height outright.
        None => {
            let mut closest = supported[0];
            for &candidate in &supported[1..] {
                if height_distance(candidate, target_height) < height_distance(closest, target_height)
                {
                    closest = candidate;
                }
            }
            Ok(closest)
        }
    }
}

fn height_distance(size: Size, target_height: u32) -> u32 {
    size.height.abs_diff(target_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sz(width: u32, height: u32) -> Size {
        Size { width, height }
    }

    #[test]
    fn test_size_rejects_zero_dimensions() {
        assert!(Size::new(0, 480).is_err());
        assert!(Size::new(640, 0).is_err());
        assert!(Size::new(640, 480).is_ok());
    }

    #[test]
    fn test_exact_match_wins() {
        let supported = [sz(640, 480), sz(800, 600), sz(1600, 1200)];
        let selected =
            select_capture_size(Some(sz(800, 600)), sz(640, 480), &supported).unwrap();
        assert_eq!(selected, sz(800, 600));
    }

    #[test]
    fn test_largest_matching_ratio_without_request() {
        // All candidates share the preview's 4:3 ratio; biggest area wins.
        let supported = [sz(800, 600), sz(1600, 1200), sz(1024, 768)];
        let selected = select_capture_size(None, sz(640, 480), &supported).unwrap();
        assert_eq!(selected, sz(1600, 1200));
    }

    #[test]
    fn test_ratio_window_excludes_wide_sizes() {
        // 16:9 candidates fall outside the 4:3 preview's tolerance window.
        let supported = [sz(1920, 1080), sz(800, 600)];
        let selected = select_capture_size(None, sz(640, 480), &supported).unwrap();
        assert_eq!(selected, sz(800, 600));
    }

    #[test]
    fn test_missed_exact_request_still_prefers_biggest() {
        let supported = [sz(800, 600), sz(1600, 1200)];
        let selected =
            select_capture_size(Some(sz(1024, 768)), sz(640, 480), &supported).unwrap();
        assert_eq!(selected, sz(1600, 1200));
    }

    #[test]
    fn test_fallback_uses_closest_height() {
        // Nothing matches the 4:3 window, so the closest height to the
        // preview's 480 wins regardless of ratio.
        let supported = [sz(1920, 1080), sz(1280, 720), sz(640, 360)];
        let selected = select_capture_size(None, sz(640, 480), &supported).unwrap();
        assert_eq!(selected, sz(640, 360));
    }

    #[test]
    fn test_empty_supported_list_is_an_error() {
        assert!(select_capture_size(None, sz(640, 480), &[]).is_err());
    }
}

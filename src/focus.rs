use crate::driver::CameraDriver;
use crate::error::{DriverError, Result};
use crate::events::{EventBus, SnapcamEvent};
use crate::sizing::Size;

/// Half-width of the focus area around a tap, in view pixels.
pub const FOCUS_AREA_HALF_WIDTH: f32 = 100.0;
/// Half-width of the metering area, 1.5x the focus area.
pub const METERING_AREA_HALF_WIDTH: f32 = 150.0;

/// Every mapped area carries the maximum weight.
const MAX_AREA_WEIGHT: i32 = 1000;

/// Rectangle in the sensor driver's [-1000, 1000] coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl DriverRect {
    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

/// A weighted focus or metering region handed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverArea {
    pub rect: DriverRect,
    pub weight: i32,
}

/// Map a tap in view coordinates to a driver-space area.
///
/// The tap is first pulled inside the view by `half_width` per axis, so
/// the area never extends past the frame edge; the clamped point is
/// then mapped linearly onto [-1000, 1000]. Callers pick the area size:
/// [`FOCUS_AREA_HALF_WIDTH`] for focusing, [`METERING_AREA_HALF_WIDTH`]
/// for the wider metering region.
pub fn map_tap_to_area(tap_x: f32, tap_y: f32, view: Size, half_width: f32) -> DriverArea {
    let view_w = view.width as f32;
    let view_h = view.height as f32;

    let mut x = tap_x;
    if x < half_width {
        x = half_width;
    }
    if x > view_w - half_width {
        x = view_w - half_width;
    }

    let mut y = tap_y;
    if y < half_width {
        y = half_width;
    }
    if y > view_h - half_width {
        y = view_h - half_width;
    }

    let rect = DriverRect {
        left: ((x - half_width) * 2000.0 / view_w - 1000.0).round() as i32,
        top: ((y - half_width) * 2000.0 / view_h - 1000.0).round() as i32,
        right: ((x + half_width) * 2000.0 / view_w - 1000.0).round() as i32,
        bottom: ((y + half_width) * 2000.0 / view_h - 1000.0).round() as i32,
    };

    DriverArea {
        rect,
        weight: MAX_AREA_WEIGHT,
    }
}

/// Point the sensor at a tapped spot and run autofocus.
///
/// Any in-flight autofocus is cancelled first, so a new tap always
/// restarts focusing at the new point. The metering area is only
/// supplied when the sensor reports support for one. The outcome is
/// published on the bus and returned.
pub async fn run_auto_focus(
    driver: &mut dyn CameraDriver,
    bus: &EventBus,
    tap_x: f32,
    tap_y: f32,
    view: Size,
) -> Result<()> {
    match drive_focus(driver, tap_x, tap_y, view).await {
        Ok(()) => {
            bus.publish(SnapcamEvent::FocusSet { x: tap_x, y: tap_y });
            Ok(())
        }
        Err(e) => {
            bus.publish(SnapcamEvent::FocusFailed {
                message: e.to_string(),
            });
            Err(e.into())
        }
    }
}

async fn drive_focus(
    driver: &mut dyn CameraDriver,
    tap_x: f32,
    tap_y: f32,
    view: Size,
) -> std::result::Result<(), DriverError> {
    driver.cancel_auto_focus().await?;

    let focus = map_tap_to_area(tap_x, tap_y, view, FOCUS_AREA_HALF_WIDTH);
    let metering = if driver.capabilities().supports_metering_areas {
        Some(map_tap_to_area(tap_x, tap_y, view, METERING_AREA_HALF_WIDTH))
    } else {
        None
    };

    driver.set_focus_areas(focus, metering).await?;
    driver.auto_focus().await
}

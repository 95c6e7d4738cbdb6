use crate::capture::CaptureController;
use crate::config::TouchConfig;
use crate::error::Result;
use crate::events::{EventBus, SnapcamEvent};
use crate::session::{SensorShared, SensorState};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// What the host's touch plumbing reported. `Tap` is synthesized by
/// host gesture recognition from a down/up pair with no movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Down,
    PointerDown,
    Move,
    Up,
    Tap,
}

/// One raw touch event from the host.
#[derive(Debug, Clone)]
pub struct TouchEvent {
    pub action: TouchAction,
    /// Active touch points in view coordinates
    pub points: Vec<(f32, f32)>,
    /// First pointer in screen coordinates, used for overlay dragging
    pub raw: (f32, f32),
}

impl TouchEvent {
    pub fn new(action: TouchAction, points: Vec<(f32, f32)>, raw: (f32, f32)) -> Self {
        Self {
            action,
            points,
            raw,
        }
    }

    /// Single-point event where view and screen coordinates coincide.
    pub fn single(action: TouchAction, x: f32, y: f32) -> Self {
        Self {
            action,
            points: vec![(x, y)],
            raw: (x, y),
        }
    }

    pub fn tap(x: f32, y: f32) -> Self {
        Self::single(TouchAction::Tap, x, y)
    }

    fn point(&self) -> (f32, f32) {
        self.points.first().copied().unwrap_or(self.raw)
    }
}

/// Mutable gesture tracking, reset points seeded per sequence.
#[derive(Debug, Default)]
struct GestureState {
    /// Whether a drag reference point exists yet
    seeded: bool,
    last_x: f32,
    last_y: f32,
    pos_x: i32,
    pos_y: i32,
    last_pinch_distance: f32,
}

/// Turns raw touch events into pinch-zoom steps, overlay drags, and
/// tap-to-focus/capture dispatch.
pub struct TouchController {
    shared: Arc<SensorShared>,
    bus: EventBus,
    config: TouchConfig,
    capture: Arc<CaptureController>,
    gesture: Mutex<GestureState>,
}

impl TouchController {
    pub(crate) fn new(
        shared: Arc<SensorShared>,
        bus: EventBus,
        config: TouchConfig,
        capture: Arc<CaptureController>,
    ) -> Self {
        Self {
            shared,
            bus,
            config,
            capture,
            gesture: Mutex::new(GestureState::default()),
        }
    }

    pub async fn handle(&self, event: TouchEvent) -> Result<()> {
        if event.points.len() > 1 {
            self.handle_multi_touch(&event).await
        } else {
            self.handle_single_touch(&event).await
        }
    }

    async fn handle_multi_touch(&self, event: &TouchEvent) -> Result<()> {
        match event.action {
            TouchAction::PointerDown => {
                // A second finger landed: seed the pinch reference.
                self.gesture.lock().last_pinch_distance = finger_spacing(&event.points);
                Ok(())
            }
            TouchAction::Move if self.config.enable_zoom => self.pinch_zoom(event).await,
            _ => Ok(()),
        }
    }

    async fn pinch_zoom(&self, event: &TouchEvent) -> Result<()> {
        let spacing = finger_spacing(&event.points);
        let previous = {
            let mut gesture = self.gesture.lock();
            let previous = gesture.last_pinch_distance;
            gesture.last_pinch_distance = spacing;
            previous
        };
        if previous <= 0.0 {
            // No PointerDown seeded this sequence.
            return Ok(());
        }

        let mut slot = self.shared.slot.lock().await;
        let SensorState::Open(driver) = &mut *slot else {
            return Ok(());
        };
        let caps = driver.capabilities();
        if !caps.supports_zoom {
            return Ok(());
        }

        let zoom = driver.zoom();
        let target = if spacing > previous {
            (zoom + 1).min(caps.max_zoom)
        } else if spacing < previous {
            zoom.saturating_sub(1)
        } else {
            zoom
        };
        if target != zoom {
            driver.cancel_auto_focus().await?;
            driver.set_zoom(target).await?;
            debug!("Pinch stepped zoom to {}", target);
            self.bus.publish(SnapcamEvent::ZoomChanged { step: target });
        }
        Ok(())
    }

    async fn handle_single_touch(&self, event: &TouchEvent) -> Result<()> {
        match event.action {
            TouchAction::Tap => {
                let (x, y) = event.point();
                self.dispatch_tap(x, y).await
            }
            TouchAction::Down if self.config.drag_enabled => {
                self.seed_drag(event.raw);
                Ok(())
            }
            TouchAction::Move if self.config.drag_enabled => {
                self.drag_to(event.raw);
                Ok(())
            }
            TouchAction::Up => {
                self.gesture.lock().last_pinch_distance = 0.0;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Tap dispatch per the configured mode: focus-then-capture runs
    /// the capture only when focusing succeeded.
    async fn dispatch_tap(&self, x: f32, y: f32) -> Result<()> {
        if self.config.tap_to_focus && self.config.tap_to_capture {
            self.shared.focus_at(&self.bus, x, y).await?;
            let _ = self.capture.take_picture(self.capture.default_request())?;
            Ok(())
        } else if self.config.tap_to_capture {
            let _ = self.capture.take_picture(self.capture.default_request())?;
            Ok(())
        } else if self.config.tap_to_focus {
            self.shared.focus_at(&self.bus, x, y).await
        } else {
            Ok(())
        }
    }

    /// The very first Down seeds the reference from the overlay's
    /// current layout margins; later sequences re-seed from the raw
    /// coordinates so the overlay does not jump.
    fn seed_drag(&self, raw: (f32, f32)) {
        let mut gesture = self.gesture.lock();
        if !gesture.seeded {
            let rect = self.shared.view_rect();
            gesture.pos_x = rect.x;
            gesture.pos_y = rect.y;
            gesture.last_x = rect.x as f32;
            gesture.last_y = rect.y as f32;
            gesture.seeded = true;
        } else {
            gesture.last_x = raw.0;
            gesture.last_y = raw.1;
        }
    }

    fn drag_to(&self, raw: (f32, f32)) {
        let (x, y) = {
            let mut gesture = self.gesture.lock();
            if !gesture.seeded {
                return;
            }
            gesture.pos_x += (raw.0 - gesture.last_x).round() as i32;
            gesture.pos_y += (raw.1 - gesture.last_y).round() as i32;
            gesture.last_x = raw.0;
            gesture.last_y = raw.1;
            (gesture.pos_x, gesture.pos_y)
        };
        self.bus.publish(SnapcamEvent::OverlayMoved { x, y });
    }
}

fn finger_spacing(points: &[(f32, f32)]) -> f32 {
    match points {
        [(ax, ay), (bx, by), ..] => (bx - ax).hypot(by - ay),
        _ => 0.0,
    }
}

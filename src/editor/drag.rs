use std::time::{Duration, Instant};

use crate::geometry::{BoxBounds, CanvasPoint, SurfaceSize};

use super::hit_test::{hit_test, resize_handle_at};
use super::EditableTextBox;

pub const TAP_DISTANCE: f64 = 4.0;
pub const TAP_WINDOW: Duration = Duration::from_millis(300);
pub const MIN_BOX_SIZE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Pressed,
    Dragging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// A gesture started on box `index`, which is now the selection.
    Grabbed { index: usize, mode: DragMode },
    /// Press on empty space; the selection is cleared.
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Nothing was pressed.
    Ignored,
    /// Short press without movement: select the box and start editing its text.
    Tap { index: usize },
    Finished {
        index: usize,
        mode: DragMode,
        changed: bool,
    },
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    index: usize,
    mode: DragMode,
    origin: CanvasPoint,
    pressed_at: Instant,
    // pointer - top_left for moves; bottom_right - pointer for resizes
    offset: (i32, i32),
    start: BoxBounds,
    current: BoxBounds,
}

/// Pointer gesture state for moving and resizing text boxes.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    gesture: Option<Gesture>,
    dragging: bool,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DragPhase {
        match (self.gesture, self.dragging) {
            (None, _) => DragPhase::Idle,
            (Some(_), false) => DragPhase::Pressed,
            (Some(_), true) => DragPhase::Dragging,
        }
    }

    pub fn press(
        &mut self,
        point: CanvasPoint,
        boxes: &[EditableTextBox],
        selected: Option<usize>,
        now: Instant,
    ) -> PressOutcome {
        self.reset();

        let Some(index) = hit_test(point, boxes) else {
            tracing::trace!(x = point.x, y = point.y, "press on empty space");
            return PressOutcome::Cleared;
        };
        let bounds = boxes[index].bounds;
        // The handle only applies when no later box covers it.
        let mode = if selected == Some(index) && resize_handle_at(point, bounds) {
            DragMode::Resize
        } else {
            DragMode::Move
        };

        let offset = match mode {
            DragMode::Move => (point.x - bounds.x, point.y - bounds.y),
            DragMode::Resize => (bounds.right() - point.x, bounds.bottom() - point.y),
        };
        self.gesture = Some(Gesture {
            index,
            mode,
            origin: point,
            pressed_at: now,
            offset,
            start: bounds,
            current: bounds,
        });
        tracing::debug!(index, ?mode, "drag gesture pressed");
        PressOutcome::Grabbed { index, mode }
    }

    /// New bounds for the grabbed box, or `None` while still within tap distance.
    pub fn motion(&mut self, point: CanvasPoint, surface: SurfaceSize) -> Option<(usize, BoxBounds)> {
        let gesture = self.gesture.as_mut()?;
        if !self.dragging {
            if gesture.origin.distance_to(point) <= TAP_DISTANCE {
                return None;
            }
            self.dragging = true;
            tracing::trace!(index = gesture.index, "drag threshold exceeded");
        }

        gesture.current = match gesture.mode {
            DragMode::Move => moved_bounds(gesture.current, point, gesture.offset, surface),
            DragMode::Resize => resized_bounds(gesture.current, point, gesture.offset, surface),
        };
        Some((gesture.index, gesture.current))
    }

    pub fn release(&mut self, now: Instant) -> ReleaseOutcome {
        let Some(gesture) = self.gesture.take() else {
            return ReleaseOutcome::Ignored;
        };
        let dragging = std::mem::take(&mut self.dragging);
        if !dragging && now.saturating_duration_since(gesture.pressed_at) <= TAP_WINDOW {
            return ReleaseOutcome::Tap {
                index: gesture.index,
            };
        }
        let changed = gesture.current != gesture.start;
        tracing::debug!(index = gesture.index, mode = ?gesture.mode, changed, "drag gesture finished");
        ReleaseOutcome::Finished {
            index: gesture.index,
            mode: gesture.mode,
            changed,
        }
    }

    /// Pointer left the surface; handled exactly like a release.
    pub fn leave(&mut self, now: Instant) -> ReleaseOutcome {
        self.release(now)
    }

    pub fn reset(&mut self) {
        self.gesture = None;
        self.dragging = false;
    }
}

fn moved_bounds(
    bounds: BoxBounds,
    point: CanvasPoint,
    offset: (i32, i32),
    surface: SurfaceSize,
) -> BoxBounds {
    let width = i32::try_from(bounds.width).unwrap_or(i32::MAX);
    let height = i32::try_from(bounds.height).unwrap_or(i32::MAX);
    let limit_x = surface.width_i32().saturating_sub(width).max(0);
    let limit_y = surface.height_i32().saturating_sub(height).max(0);
    BoxBounds::new(
        point.x.saturating_sub(offset.0).clamp(0, limit_x),
        point.y.saturating_sub(offset.1).clamp(0, limit_y),
        bounds.width,
        bounds.height,
    )
}

fn resized_bounds(
    bounds: BoxBounds,
    point: CanvasPoint,
    offset: (i32, i32),
    surface: SurfaceSize,
) -> BoxBounds {
    let clamp_extent = |target: i32, origin: i32, surface_extent: i32| {
        let max = u32::try_from(surface_extent.saturating_sub(origin))
            .unwrap_or(0)
            .max(MIN_BOX_SIZE);
        u32::try_from(target.saturating_sub(origin))
            .unwrap_or(0)
            .clamp(MIN_BOX_SIZE, max)
    };
    BoxBounds::new(
        bounds.x,
        bounds.y,
        clamp_extent(point.x.saturating_add(offset.0), bounds.x, surface.width_i32()),
        clamp_extent(point.y.saturating_add(offset.1), bounds.y, surface.height_i32()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::TextStyle;

    const SURFACE: SurfaceSize = SurfaceSize::new(400, 300);

    fn boxes() -> Vec<EditableTextBox> {
        vec![EditableTextBox::new(
            BoxBounds::new(50, 50, 100, 40),
            "top",
            TextStyle::default(),
        )]
    }

    #[test]
    fn press_inside_box_grabs_it_and_empty_space_clears() {
        let mut controller = DragController::new();
        let now = Instant::now();
        assert_eq!(
            controller.press(CanvasPoint::new(60, 60), &boxes(), None, now),
            PressOutcome::Grabbed {
                index: 0,
                mode: DragMode::Move
            }
        );
        assert_eq!(controller.phase(), DragPhase::Pressed);

        assert_eq!(
            controller.press(CanvasPoint::new(5, 5), &boxes(), Some(0), now),
            PressOutcome::Cleared
        );
        assert_eq!(controller.phase(), DragPhase::Idle);
    }

    #[test]
    fn movement_keeps_the_grab_offset() {
        let mut controller = DragController::new();
        let now = Instant::now();
        controller.press(CanvasPoint::new(60, 70), &boxes(), None, now);

        let (index, bounds) = controller
            .motion(CanvasPoint::new(110, 120), SURFACE)
            .expect("drag update");
        assert_eq!(index, 0);
        assert_eq!((bounds.x, bounds.y), (100, 100));
        assert_eq!(controller.phase(), DragPhase::Dragging);
    }

    #[test]
    fn huge_deltas_never_leave_the_surface() {
        let mut controller = DragController::new();
        let now = Instant::now();
        controller.press(CanvasPoint::new(60, 60), &boxes(), None, now);

        for point in [
            CanvasPoint::new(i32::MAX, i32::MAX),
            CanvasPoint::new(i32::MIN, i32::MIN),
            CanvasPoint::new(10_000, -10_000),
        ] {
            let (_, bounds) = controller.motion(point, SURFACE).expect("drag update");
            assert!((0..=300).contains(&bounds.x), "x = {}", bounds.x);
            assert!((0..=260).contains(&bounds.y), "y = {}", bounds.y);
        }
    }

    #[test]
    fn small_motion_stays_pressed_and_release_is_a_tap() {
        let mut controller = DragController::new();
        let now = Instant::now();
        controller.press(CanvasPoint::new(60, 60), &boxes(), None, now);
        assert_eq!(controller.motion(CanvasPoint::new(62, 61), SURFACE), None);
        assert_eq!(controller.phase(), DragPhase::Pressed);
        assert_eq!(
            controller.release(now + Duration::from_millis(120)),
            ReleaseOutcome::Tap { index: 0 }
        );
        assert_eq!(controller.phase(), DragPhase::Idle);
    }

    #[test]
    fn slow_press_without_motion_is_not_a_tap() {
        let mut controller = DragController::new();
        let now = Instant::now();
        controller.press(CanvasPoint::new(60, 60), &boxes(), None, now);
        assert_eq!(
            controller.release(now + Duration::from_millis(900)),
            ReleaseOutcome::Finished {
                index: 0,
                mode: DragMode::Move,
                changed: false
            }
        );
    }

    #[test]
    fn leave_finishes_a_drag_like_release() {
        let mut controller = DragController::new();
        let now = Instant::now();
        controller.press(CanvasPoint::new(60, 60), &boxes(), None, now);
        controller.motion(CanvasPoint::new(90, 60), SURFACE);
        assert_eq!(
            controller.leave(now + Duration::from_millis(50)),
            ReleaseOutcome::Finished {
                index: 0,
                mode: DragMode::Move,
                changed: true
            }
        );
        assert_eq!(controller.phase(), DragPhase::Idle);
        assert_eq!(controller.release(now), ReleaseOutcome::Ignored);
    }

    #[test]
    fn resize_handle_of_selected_box_resizes_within_limits() {
        let mut controller = DragController::new();
        let now = Instant::now();
        let outcome = controller.press(CanvasPoint::new(148, 88), &boxes(), Some(0), now);
        assert_eq!(
            outcome,
            PressOutcome::Grabbed {
                index: 0,
                mode: DragMode::Resize
            }
        );

        let (_, grown) = controller
            .motion(CanvasPoint::new(198, 108), SURFACE)
            .expect("resize update");
        assert_eq!(grown, BoxBounds::new(50, 50, 150, 60));

        let (_, clamped) = controller
            .motion(CanvasPoint::new(5_000, -5_000), SURFACE)
            .expect("resize update");
        assert_eq!(clamped, BoxBounds::new(50, 50, 350, MIN_BOX_SIZE));
    }

    #[test]
    fn covered_resize_handle_yields_to_the_box_on_top() {
        let mut stacked = boxes();
        stacked.push(EditableTextBox::new(
            BoxBounds::new(140, 80, 60, 40),
            "cover",
            TextStyle::default(),
        ));
        let mut controller = DragController::new();
        let outcome = controller.press(CanvasPoint::new(148, 88), &stacked, Some(0), Instant::now());
        assert_eq!(
            outcome,
            PressOutcome::Grabbed {
                index: 1,
                mode: DragMode::Move
            }
        );
    }
}

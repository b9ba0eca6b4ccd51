use crate::geometry::{BoxBounds, CanvasPoint};

use super::EditableTextBox;

pub const RESIZE_HANDLE_SIZE: u32 = 12;

/// Topmost box containing `point`; later boxes paint over earlier ones.
pub fn hit_test(point: CanvasPoint, boxes: &[EditableTextBox]) -> Option<usize> {
    boxes
        .iter()
        .enumerate()
        .rev()
        .find(|(_, text_box)| text_box.bounds.contains(point))
        .map(|(index, _)| index)
}

/// Whether `point` lies on the bottom-right resize handle of `bounds`.
pub fn resize_handle_at(point: CanvasPoint, bounds: BoxBounds) -> bool {
    let handle_width = RESIZE_HANDLE_SIZE.min(bounds.width);
    let handle_height = RESIZE_HANDLE_SIZE.min(bounds.height);
    let handle = BoxBounds::new(
        bounds.right() - i32::try_from(handle_width).unwrap_or(0),
        bounds.bottom() - i32::try_from(handle_height).unwrap_or(0),
        handle_width,
        handle_height,
    );
    handle.contains(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::TextStyle;

    fn text_box(x: i32, y: i32, width: u32, height: u32) -> EditableTextBox {
        EditableTextBox::new(BoxBounds::new(x, y, width, height), "", TextStyle::default())
    }

    #[test]
    fn overlapping_boxes_prefer_highest_index() {
        let boxes = vec![text_box(0, 0, 100, 100), text_box(50, 50, 100, 100)];
        assert_eq!(hit_test(CanvasPoint::new(60, 60), &boxes), Some(1));
        assert_eq!(hit_test(CanvasPoint::new(10, 10), &boxes), Some(0));
    }

    #[test]
    fn edges_are_half_open() {
        let boxes = vec![text_box(10, 10, 20, 20)];
        assert_eq!(hit_test(CanvasPoint::new(10, 10), &boxes), Some(0));
        assert_eq!(hit_test(CanvasPoint::new(29, 29), &boxes), Some(0));
        assert_eq!(hit_test(CanvasPoint::new(30, 15), &boxes), None);
        assert_eq!(hit_test(CanvasPoint::new(15, 30), &boxes), None);
    }

    #[test]
    fn empty_space_hits_nothing() {
        assert_eq!(hit_test(CanvasPoint::new(5, 5), &[]), None);
        let boxes = vec![text_box(100, 100, 10, 10)];
        assert_eq!(hit_test(CanvasPoint::new(5, 5), &boxes), None);
    }

    #[test]
    fn resize_handle_covers_bottom_right_corner_only() {
        let bounds = BoxBounds::new(0, 0, 100, 50);
        assert!(resize_handle_at(CanvasPoint::new(99, 49), bounds));
        assert!(resize_handle_at(CanvasPoint::new(88, 38), bounds));
        assert!(!resize_handle_at(CanvasPoint::new(87, 49), bounds));
        assert!(!resize_handle_at(CanvasPoint::new(100, 50), bounds));
    }
}

use serde::{Deserialize, Serialize};

use crate::geometry::{BoxBounds, SurfaceSize};
use crate::template::Template;

use super::{ImageTransform, TextStyle};

pub const NEW_BOX_TEXT: &str = "New text";

/// One positioned run of styled text. Identity is its index in
/// [`EditorState::text_boxes`]; later indices paint on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableTextBox {
    pub bounds: BoxBounds,
    pub text: String,
    pub style: TextStyle,
}

impl EditableTextBox {
    pub fn new(bounds: BoxBounds, text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            bounds,
            text: text.into(),
            style,
        }
    }
}

/// Complete editable state; the unit of undo/redo and of saved projects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditorState {
    #[serde(default)]
    pub template: Option<Template>,
    #[serde(default)]
    pub text_boxes: Vec<EditableTextBox>,
    #[serde(default)]
    pub transform: ImageTransform,
    #[serde(default)]
    pub selected_index: Option<usize>,
}

impl EditorState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Equality that ignores which box is selected.
    pub fn same_content(&self, other: &Self) -> bool {
        self.template == other.template
            && self.text_boxes == other.text_boxes
            && self.transform == other.transform
    }

    /// Fresh state for `template`: boxes seeded from its specs with the
    /// default style and an identity transform.
    pub fn from_template(template: Template) -> Self {
        let text_boxes = template
            .text_boxes
            .iter()
            .map(|slot| {
                EditableTextBox::new(slot.bounds(), slot.default_text.clone(), TextStyle::default())
            })
            .collect();
        Self {
            template: Some(template),
            text_boxes,
            transform: ImageTransform::identity(),
            selected_index: None,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        self.template
            .as_ref()
            .map(|template| template.source_url.as_str())
    }

    pub fn selected_box_mut(&mut self) -> Option<&mut EditableTextBox> {
        self.selected_index
            .and_then(|index| self.text_boxes.get_mut(index))
    }

    /// Drops a selection that no longer points at a box.
    pub fn normalize_selection(&mut self) {
        if self
            .selected_index
            .is_some_and(|index| index >= self.text_boxes.len())
        {
            self.selected_index = None;
        }
    }
}

/// Placement for a box added by the user: centered, 60% wide, 20% tall.
pub fn default_box_bounds(surface: SurfaceSize) -> BoxBounds {
    let width = (surface.width * 3 / 5).max(1);
    let height = (surface.height / 5).max(1);
    let x = i32::try_from((surface.width - width) / 2).unwrap_or(0);
    let y = i32::try_from((surface.height - height) / 2).unwrap_or(0);
    BoxBounds::new(x, y, width, height)
}

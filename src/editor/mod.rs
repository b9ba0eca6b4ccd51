//! Editable meme state and the interactive session that mutates it.

pub mod drag;
pub mod hit_test;
pub mod model;
pub mod session;
pub mod style;
pub mod transform;

pub use drag::{DragController, DragMode, DragPhase, PressOutcome, ReleaseOutcome};
pub use hit_test::{hit_test, resize_handle_at};
pub use model::{EditableTextBox, EditorState};
pub use session::{EditorSession, UploadError, Uploader};
pub use style::{FontFamily, FontSlant, FontWeight, StylePatch, TextAlign, TextStyle};
pub use transform::{FilterKind, ImageTransform};

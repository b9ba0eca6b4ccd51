use std::time::Instant;

use image::RgbaImage;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{CanvasPoint, SurfaceSize};
use crate::history::HistoryManager;
use crate::loader::{ImageFetcher, ImageLoadError, ImageLoader, LoadStatus, LoadedImage};
use crate::render::{encode_png, Compositor, RenderError, RenderScheduler, RenderTrigger};
use crate::storage::{Project, ProjectStorage};
use crate::template::Template;

use super::drag::{DragController, PressOutcome, ReleaseOutcome};
use super::model::{default_box_bounds, EditableTextBox, EditorState, NEW_BOX_TEXT};
use super::{ImageTransform, StylePatch, TextStyle};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("upload transport failed: {0}")]
    Transport(String),
}

/// Publishing backend; receives the exported PNG and returns its public URL.
pub trait Uploader {
    fn upload(&self, png: &[u8]) -> Result<String, UploadError>;
}

/// One interactive editing session over a single [`EditorState`].
pub struct EditorSession<F: ImageFetcher + 'static> {
    loader: ImageLoader<F>,
    compositor: Compositor,
    scheduler: RenderScheduler,
    history: HistoryManager,
    drag: DragController,
    state: EditorState,
    editing_text: Option<usize>,
    last_frame: Option<RgbaImage>,
    frames_rendered: u64,
    notices: Vec<EngineError>,
    awaiting_image: Option<String>,
    reported_failure: Option<ImageLoadError>,
    closed: bool,
}

impl<F: ImageFetcher + 'static> EditorSession<F> {
    pub fn new(loader: ImageLoader<F>, config: &EngineConfig) -> Self {
        Self {
            loader,
            compositor: config.compositor(),
            scheduler: RenderScheduler::new(config.render_delays()),
            history: HistoryManager::new(config.history_limit),
            drag: DragController::new(),
            state: EditorState::empty(),
            editing_text: None,
            last_frame: None,
            frames_rendered: 0,
            notices: Vec::new(),
            awaiting_image: None,
            reported_failure: None,
            closed: false,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn loader(&self) -> &ImageLoader<F> {
        &self.loader
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.state.selected_index
    }

    /// Box whose text is being edited after a tap or `set_text`.
    pub fn editing_text(&self) -> Option<usize> {
        self.editing_text
    }

    pub fn last_frame(&self) -> Option<&RgbaImage> {
        self.last_frame.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn is_render_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn render_due_at(&self) -> Option<Instant> {
        self.scheduler.due_at()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Native surface size: the loaded base image, else the fallback surface.
    pub fn surface_size(&self) -> SurfaceSize {
        let base = self.state.image_url().and_then(|url| self.loader.cached(url));
        self.compositor.surface_size(base.as_deref(), &self.state)
    }

    pub fn select_template(&mut self, template: Template, now: Instant) {
        tracing::info!(id = %template.id, boxes = template.text_boxes.len(), "template selected");
        self.drag.reset();
        self.editing_text = None;
        self.state = EditorState::from_template(template);
        self.reload_base_image();
        self.record();
        self.scheduler.schedule(now, RenderTrigger::TemplateLoaded);
    }

    /// Applies `patch` to the selected box. Returns whether anything changed.
    pub fn update_style(&mut self, patch: &StylePatch, now: Instant) -> bool {
        let Some(text_box) = self.state.selected_box_mut() else {
            tracing::debug!("style update ignored; no box selected");
            return false;
        };
        if !text_box.style.apply(patch) {
            return false;
        }
        self.record();
        self.scheduler.schedule(now, RenderTrigger::Style);
        true
    }

    pub fn set_text(&mut self, index: usize, text: impl Into<String>, now: Instant) -> bool {
        let Some(text_box) = self.state.text_boxes.get_mut(index) else {
            return false;
        };
        text_box.text = text.into();
        self.state.selected_index = Some(index);
        self.editing_text = Some(index);
        self.scheduler.schedule(now, RenderTrigger::Text);
        true
    }

    /// Leaves text-edit mode and records the edited text.
    pub fn commit_text(&mut self, _now: Instant) {
        if self.editing_text.take().is_some() {
            self.record();
        }
    }

    pub fn set_transform(&mut self, transform: ImageTransform, now: Instant) {
        let mut clamped = ImageTransform::identity();
        clamped.set_scale(transform.scale);
        clamped.set_rotation_degrees(transform.rotation_degrees);
        clamped.set_brightness_pct(transform.brightness_pct);
        clamped.set_contrast_pct(transform.contrast_pct);
        clamped.set_filter(transform.filter);
        self.state.transform = clamped;
        self.scheduler.schedule(now, RenderTrigger::Transform);
    }

    /// Records the current state after a continuous control gesture ends.
    pub fn commit(&mut self, _now: Instant) {
        self.record();
    }

    pub fn add_text_box(&mut self, now: Instant) -> usize {
        let bounds = default_box_bounds(self.surface_size());
        self.state.text_boxes.push(EditableTextBox::new(
            bounds,
            NEW_BOX_TEXT,
            TextStyle::default(),
        ));
        let index = self.state.text_boxes.len() - 1;
        self.state.selected_index = Some(index);
        self.record();
        self.scheduler.schedule(now, RenderTrigger::BoxesChanged);
        index
    }

    pub fn remove_text_box(&mut self, index: usize, now: Instant) -> bool {
        if index >= self.state.text_boxes.len() {
            return false;
        }
        self.state.text_boxes.remove(index);
        self.state.selected_index = shift_after_removal(self.state.selected_index, index);
        self.editing_text = shift_after_removal(self.editing_text, index);
        self.drag.reset();
        self.record();
        self.scheduler.schedule(now, RenderTrigger::BoxesChanged);
        true
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.state.selected_index = index.filter(|index| *index < self.state.text_boxes.len());
        if self.editing_text.is_some() && self.editing_text != self.state.selected_index {
            self.editing_text = None;
            self.record();
        }
    }

    pub fn pointer_down(&mut self, point: CanvasPoint, now: Instant) {
        let outcome = self.drag.press(
            point,
            &self.state.text_boxes,
            self.state.selected_index,
            now,
        );
        let pressed = match outcome {
            PressOutcome::Grabbed { index, .. } => Some(index),
            PressOutcome::Cleared => None,
        };
        if self.editing_text.is_some() && self.editing_text != pressed {
            self.commit_text(now);
        }
        self.state.selected_index = pressed;
    }

    pub fn pointer_move(&mut self, point: CanvasPoint, now: Instant) {
        let surface = self.surface_size();
        if let Some((index, bounds)) = self.drag.motion(point, surface) {
            if let Some(text_box) = self.state.text_boxes.get_mut(index) {
                text_box.bounds = bounds;
                self.scheduler.schedule(now, RenderTrigger::Geometry);
            }
        }
    }

    pub fn pointer_up(&mut self, now: Instant) {
        let outcome = self.drag.release(now);
        self.finish_gesture(outcome);
    }

    pub fn pointer_leave(&mut self, now: Instant) {
        let outcome = self.drag.leave(now);
        self.finish_gesture(outcome);
    }

    fn finish_gesture(&mut self, outcome: ReleaseOutcome) {
        match outcome {
            ReleaseOutcome::Tap { index } => {
                self.state.selected_index = Some(index);
                self.editing_text = Some(index);
            }
            ReleaseOutcome::Finished { changed: true, .. } => self.record(),
            ReleaseOutcome::Finished { .. } | ReleaseOutcome::Ignored => {}
        }
    }

    /// Steps back one snapshot. Uncommitted text or transform edits are
    /// recorded first, so they are what gets undone.
    pub fn undo(&mut self, now: Instant) -> bool {
        self.flush_pending_edits();
        let result = self.history.undo();
        self.apply_history_step(result, now, "undo")
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        self.flush_pending_edits();
        let result = self.history.redo();
        self.apply_history_step(result, now, "redo")
    }

    fn flush_pending_edits(&mut self) {
        self.editing_text = None;
        match self.history.is_current(&self.state) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("recording uncommitted edits before history step");
                self.record();
            }
            Err(err) => {
                tracing::warn!(?err, "cannot compare live state with history");
                self.notices.push(err.into());
            }
        }
    }

    fn apply_history_step(
        &mut self,
        step: Result<Option<EditorState>, crate::history::SerializationError>,
        now: Instant,
        action: &'static str,
    ) -> bool {
        match step {
            Ok(Some(state)) => {
                self.history.begin_apply();
                self.drag.reset();
                self.editing_text = None;
                self.state = state;
                self.state.normalize_selection();
                if let Some(url) = self.state.image_url() {
                    self.loader.prefetch(url);
                }
                self.history.end_apply();
                self.scheduler.schedule(now, RenderTrigger::History);
                true
            }
            Ok(None) => {
                tracing::debug!(action, "history stack empty");
                false
            }
            Err(err) => {
                tracing::warn!(action, ?err, "history snapshot could not be applied");
                self.notices.push(err.into());
                false
            }
        }
    }

    /// Composes if the scheduled render is due. Returns whether a pass ran.
    /// Never waits on the image loader.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.closed {
            return false;
        }
        self.arm_when_image_settles(now);
        let Some(trigger) = self.scheduler.poll(now) else {
            return false;
        };
        tracing::trace!(?trigger, "scheduled render fired");
        if let Err(err) = self.render(false) {
            tracing::warn!(?err, "compositing pass failed; keeping last frame");
            self.notices.push(err);
        }
        true
    }

    /// Composes the current state immediately. A base image that is still
    /// loading is left out, and a render is armed for when it arrives.
    pub fn render_now(&mut self) -> EngineResult<()> {
        self.render(false)
    }

    /// Fetches a failed base image again.
    pub fn retry_image(&mut self, now: Instant) -> bool {
        let Some(url) = self.state.image_url().map(str::to_string) else {
            return false;
        };
        self.reported_failure = None;
        self.loader.retry(&url);
        self.scheduler.schedule(now, RenderTrigger::ImageLoaded);
        true
    }

    fn reload_base_image(&mut self) {
        self.awaiting_image = None;
        self.reported_failure = None;
        if let Some(url) = self.state.image_url() {
            self.loader.retry(url);
        }
    }

    fn arm_when_image_settles(&mut self, now: Instant) {
        let Some(url) = self.awaiting_image.as_deref() else {
            return;
        };
        if self.loader.is_in_flight(url) {
            return;
        }
        tracing::debug!(url, "base image settled; scheduling render");
        self.awaiting_image = None;
        self.scheduler.schedule(now, RenderTrigger::ImageLoaded);
    }

    fn render(&mut self, wait_for_image: bool) -> EngineResult<()> {
        let base = self.base_image(wait_for_image);
        let frame = self.compositor.compose(&self.state, base.as_deref())?;
        self.last_frame = Some(frame);
        self.frames_rendered += 1;
        Ok(())
    }

    fn base_image(&mut self, wait: bool) -> Option<LoadedImage> {
        let url = self.state.image_url()?.to_string();
        let status = if wait {
            match self.loader.load(&url) {
                Ok(image) => LoadStatus::Ready(image),
                Err(err) => LoadStatus::Failed(err),
            }
        } else {
            self.loader.status(&url)
        };
        match status {
            LoadStatus::Ready(image) => {
                self.awaiting_image = None;
                self.reported_failure = None;
                Some(image)
            }
            LoadStatus::Pending => {
                tracing::debug!(%url, "base image still loading; rendering text only");
                self.awaiting_image = Some(url);
                None
            }
            LoadStatus::Failed(err) => {
                self.awaiting_image = err.is_timeout().then_some(url);
                self.report_image_failure(err);
                None
            }
        }
    }

    fn report_image_failure(&mut self, err: ImageLoadError) {
        if self.reported_failure.as_ref() == Some(&err) {
            return;
        }
        tracing::warn!(%err, "base image unavailable; rendering text only");
        self.reported_failure = Some(err.clone());
        self.notices.push(err.into());
    }

    /// PNG of the current state at native resolution.
    /// Waits for a pending base image up to the loader timeout.
    pub fn export_raster(&mut self) -> EngineResult<Vec<u8>> {
        let flushed = self.scheduler.flush().is_some();
        if flushed || self.last_frame.is_none() || self.awaiting_image.is_some() {
            self.render(true)?;
        }
        let frame = self
            .last_frame
            .as_ref()
            .ok_or(EngineError::Render(RenderError::SurfaceTooLarge))?;
        Ok(encode_png(frame)?)
    }

    pub fn publish(&mut self, uploader: &dyn Uploader) -> EngineResult<String> {
        let png = self.export_raster()?;
        let url = uploader.upload(&png)?;
        tracing::info!(%url, bytes = png.len(), "meme published");
        Ok(url)
    }

    pub fn save_project(
        &self,
        store: &mut dyn ProjectStorage,
        name: &str,
    ) -> EngineResult<Project> {
        Ok(store.save(&self.state, name)?)
    }

    pub fn open_project(
        &mut self,
        store: &dyn ProjectStorage,
        id: &str,
        now: Instant,
    ) -> EngineResult<()> {
        let mut state = store.load(id)?;
        state.normalize_selection();
        self.drag.reset();
        self.editing_text = None;
        self.state = state;
        self.reload_base_image();
        self.record();
        self.scheduler.schedule(now, RenderTrigger::TemplateLoaded);
        tracing::info!(id, "project opened");
        Ok(())
    }

    /// Drains recoverable errors queued for the host UI.
    pub fn take_notices(&mut self) -> Vec<EngineError> {
        std::mem::take(&mut self.notices)
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.scheduler.cancel();
        self.drag.reset();
        self.closed = true;
        tracing::debug!("editor session closed");
    }

    fn record(&mut self) {
        if let Err(err) = self.history.record(&self.state) {
            tracing::warn!(?err, "failed to record history snapshot");
            self.notices.push(err.into());
        }
    }
}

impl<F: ImageFetcher + 'static> Drop for EditorSession<F> {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}

fn shift_after_removal(index: Option<usize>, removed: usize) -> Option<usize> {
    match index {
        Some(current) if current == removed => None,
        Some(current) if current > removed => Some(current - 1),
        other => other,
    }
}

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use gtk4::glib;

use crate::editor::EditorSession;
use crate::loader::ImageFetcher;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Polls an [`EditorSession`] from the glib main loop until stopped, the
/// session is dropped, or the session is closed.
pub struct RenderTickDriver {
    source: Option<glib::SourceId>,
    finished: Rc<Cell<bool>>,
}

impl RenderTickDriver {
    pub fn install<F: ImageFetcher + 'static>(
        session: &Rc<RefCell<EditorSession<F>>>,
        interval: Duration,
    ) -> Self {
        let session = Rc::downgrade(session);
        let finished = Rc::new(Cell::new(false));
        let finished_in_tick = finished.clone();
        let source = glib::timeout_add_local(interval, move || {
            let Some(session) = session.upgrade() else {
                tracing::debug!("stopping render tick; session dropped");
                finished_in_tick.set(true);
                return glib::ControlFlow::Break;
            };
            let Ok(mut session) = session.try_borrow_mut() else {
                return glib::ControlFlow::Continue;
            };
            if session.is_closed() {
                tracing::debug!("stopping render tick; session closed");
                finished_in_tick.set(true);
                return glib::ControlFlow::Break;
            }
            session.tick(Instant::now());
            glib::ControlFlow::Continue
        });

        Self {
            source: Some(source),
            finished,
        }
    }

    pub fn is_running(&self) -> bool {
        self.source.is_some() && !self.finished.get()
    }

    pub fn stop(&mut self) {
        if let Some(source) = self.source.take() {
            if !self.finished.replace(true) {
                source.remove();
            }
        }
    }
}

impl Drop for RenderTickDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::loader::test_support::StubFetcher;
    use crate::loader::ImageLoader;

    fn session() -> Rc<RefCell<EditorSession<StubFetcher>>> {
        let config = EngineConfig {
            structural_render_delay_ms: 1,
            ..EngineConfig::default()
        };
        let loader = ImageLoader::new(StubFetcher::serving(Vec::new()), config.load_timeout());
        Rc::new(RefCell::new(EditorSession::new(loader, &config)))
    }

    fn spin_until(context: &glib::MainContext, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done() && Instant::now() < deadline {
            context.iteration(true);
        }
    }

    #[test]
    fn ticks_scheduled_render_then_stops_when_closed() {
        let context = glib::MainContext::new();
        context
            .with_thread_default(|| {
                let session = session();
                let driver = RenderTickDriver::install(&session, Duration::from_millis(1));
                session.borrow_mut().add_text_box(Instant::now());

                spin_until(&context, || session.borrow().frames_rendered() > 0);
                assert_eq!(session.borrow().frames_rendered(), 1);
                assert!(driver.is_running());

                session.borrow_mut().close();
                spin_until(&context, || !driver.is_running());
                assert!(!driver.is_running());
            })
            .expect("acquire main context");
    }

    #[test]
    fn stop_is_idempotent() {
        let context = glib::MainContext::new();
        context
            .with_thread_default(|| {
                let session = session();
                let mut driver = RenderTickDriver::install(&session, Duration::from_millis(1));
                driver.stop();
                driver.stop();
                assert!(!driver.is_running());
            })
            .expect("acquire main context");
    }
}

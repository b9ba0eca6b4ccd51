use std::time::{Duration, Instant};

pub const DEFAULT_STRUCTURAL_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_CONTINUOUS_DELAY: Duration = Duration::from_millis(250);

/// Why a compositing pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTrigger {
    TemplateLoaded,
    ImageLoaded,
    History,
    BoxesChanged,
    Geometry,
    Text,
    Style,
    Transform,
}

impl RenderTrigger {
    /// Structural changes render after the short delay; continuous input
    /// (typing, slider drags, style tweaks) waits for the long one.
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::TemplateLoaded
                | Self::ImageLoaded
                | Self::History
                | Self::BoxesChanged
                | Self::Geometry
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderDelays {
    pub structural: Duration,
    pub continuous: Duration,
}

impl Default for RenderDelays {
    fn default() -> Self {
        Self {
            structural: DEFAULT_STRUCTURAL_DELAY,
            continuous: DEFAULT_CONTINUOUS_DELAY,
        }
    }
}

impl RenderDelays {
    pub const fn for_trigger(&self, trigger: RenderTrigger) -> Duration {
        if trigger.is_structural() {
            self.structural
        } else {
            self.continuous
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRender {
    due_at: Instant,
    trigger: RenderTrigger,
}

/// Single-slot deadline: scheduling again supersedes whatever was pending.
#[derive(Debug, Clone, Default)]
pub struct RenderScheduler {
    delays: RenderDelays,
    pending: Option<PendingRender>,
}

impl RenderScheduler {
    pub fn new(delays: RenderDelays) -> Self {
        Self {
            delays,
            pending: None,
        }
    }

    pub fn schedule(&mut self, now: Instant, trigger: RenderTrigger) {
        self.schedule_after(now, self.delays.for_trigger(trigger), trigger);
    }

    pub fn schedule_after(&mut self, now: Instant, delay: Duration, trigger: RenderTrigger) {
        if let Some(previous) = self.pending {
            tracing::trace!(
                superseded = ?previous.trigger,
                ?trigger,
                "replacing pending render"
            );
        }
        self.pending = Some(PendingRender {
            due_at: now + delay,
            trigger,
        });
    }

    /// Takes the pending trigger once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<RenderTrigger> {
        let pending = self.pending?;
        if now < pending.due_at {
            return None;
        }
        self.pending = None;
        Some(pending.trigger)
    }

    /// Takes the pending trigger regardless of its deadline.
    pub fn flush(&mut self) -> Option<RenderTrigger> {
        self.pending.take().map(|pending| pending.trigger)
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("pending render cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.due_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_triggers_fire_after_short_delay() {
        let start = Instant::now();
        let mut scheduler = RenderScheduler::default();
        scheduler.schedule(start, RenderTrigger::TemplateLoaded);

        assert_eq!(scheduler.poll(start + Duration::from_millis(49)), None);
        assert_eq!(
            scheduler.poll(start + Duration::from_millis(50)),
            Some(RenderTrigger::TemplateLoaded)
        );
        assert!(!scheduler.is_pending());
        assert_eq!(scheduler.poll(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn continuous_triggers_use_long_delay() {
        let start = Instant::now();
        let mut scheduler = RenderScheduler::default();
        scheduler.schedule(start, RenderTrigger::Text);
        assert_eq!(scheduler.poll(start + Duration::from_millis(200)), None);
        assert_eq!(
            scheduler.poll(start + Duration::from_millis(250)),
            Some(RenderTrigger::Text)
        );
    }

    #[test]
    fn rescheduling_supersedes_pending_request() {
        let start = Instant::now();
        let mut scheduler = RenderScheduler::default();
        scheduler.schedule(start, RenderTrigger::Style);
        for step in 1..=5 {
            scheduler.schedule(start + Duration::from_millis(step * 100), RenderTrigger::Text);
        }

        assert_eq!(scheduler.poll(start + Duration::from_millis(300)), None);
        assert_eq!(
            scheduler.due_at(),
            Some(start + Duration::from_millis(750))
        );
        assert_eq!(
            scheduler.poll(start + Duration::from_millis(750)),
            Some(RenderTrigger::Text)
        );
    }

    #[test]
    fn cancel_drops_the_pending_render() {
        let start = Instant::now();
        let mut scheduler = RenderScheduler::default();
        scheduler.schedule(start, RenderTrigger::History);
        scheduler.cancel();
        assert!(!scheduler.is_pending());
        assert_eq!(scheduler.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn flush_ignores_deadline() {
        let start = Instant::now();
        let mut scheduler = RenderScheduler::new(RenderDelays {
            structural: Duration::from_secs(10),
            continuous: Duration::from_secs(10),
        });
        scheduler.schedule(start, RenderTrigger::Transform);
        assert_eq!(scheduler.flush(), Some(RenderTrigger::Transform));
        assert_eq!(scheduler.flush(), None);
    }
}

use super::StreamOutcome;

/// Presentation collaborator notified while a response streams in.
pub trait Sink: Send + Sync {
    /// Called once per applied fragment with the open message's full content.
    fn on_fragment_applied(&self, content: &str);

    /// Called after the cycle ended and the message was closed. `content`
    /// includes any trailing error markers.
    fn on_cycle_finished(&self, _content: &str, _outcome: &StreamOutcome) {}
}

/// Sink that renders nothing, for headless use.
#[derive(Default)]
pub struct NoopSink {}

impl Sink for NoopSink {
    fn on_fragment_applied(&self, _content: &str) {}
}

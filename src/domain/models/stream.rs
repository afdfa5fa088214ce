/// One incremental slice of assistant text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFragment {
    pub text: String,
}

/// Everything a decoded record can contribute, in the order it was received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(StreamFragment),
    UpstreamError(String),
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed(String),
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        return *self == StreamOutcome::Completed;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CyclePhase {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

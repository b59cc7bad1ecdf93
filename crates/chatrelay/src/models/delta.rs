/// One step of an incremental completion, as recovered from the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaEvent {
    /// A non-empty piece of assistant output
    ContentFragment(String),
    /// No further fragments follow on this stream
    Done,
    /// A frame with no usable content (empty delta, heartbeat, comment)
    Ignorable,
}

impl DeltaEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, DeltaEvent::Done)
    }

    pub fn as_fragment(&self) -> Option<&str> {
        match self {
            DeltaEvent::ContentFragment(text) => Some(text),
            _ => None,
        }
    }
}

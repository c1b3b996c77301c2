use super::thread::CommentId;

/// Input rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub(crate) enum ValidationError {
    #[error("timeslot count {0} is outside 1..=5")]
    TimeslotCount(u32),
    #[error("window duration {0}s is outside 30..=300")]
    WindowDuration(u64),
    #[error("seek target {0}s is negative")]
    NegativeSeek(f64),
    #[error("seek target {target}s is past the end of the episode ({duration}s)")]
    SeekPastEnd { target: f64, duration: u64 },
    #[error("comment cannot be empty")]
    EmptyComment,
    #[error("comment is too long ({len} characters, max {max})")]
    CommentTooLong { len: usize, max: usize },
    #[error("comment {0} does not exist in this episode")]
    UnknownComment(CommentId),
    #[error("guests cannot post, edit, delete or vote")]
    GuestWrite,
    #[error("comment {0} belongs to another author")]
    NotAuthor(CommentId),
    #[error("no episode is ready")]
    NotReady,
    #[error("episode record is invalid: {0}")]
    InvalidRecord(String),
}

/// Failure talking to the remote data service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum RemoteError {
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },
    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server rejected request: {0}")]
    Application(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

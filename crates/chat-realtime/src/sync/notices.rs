//! Out-of-band notifications for observers

use chat_common::{ErrorNotice, SyncError};
use serde_json::Value;

/// Something observers may want to react to besides a snapshot change
#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotice {
    /// A status-channel frame that fit no known category
    UnknownFrame(Value),
    /// A recoverable failure; the same text is in `last_error`
    Error(ErrorNotice),
    /// The credential was rejected and the session has been torn down
    SessionExpired,
}

impl SyncNotice {
    pub fn error(err: &SyncError) -> Self {
        Self::Error(ErrorNotice::from(err))
    }
}

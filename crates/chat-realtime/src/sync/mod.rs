//! Synchronizer - mediates between push channels, the REST backend and the
//! session store

mod notices;
mod synchronizer;

pub use notices::SyncNotice;
pub use synchronizer::Synchronizer;

//! Collaborator traits (ports)

mod api;

pub use api::ChatApi;

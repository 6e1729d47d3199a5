//! # chat-rest
//!
//! HTTP implementation of [`chat_core::ChatApi`].
//!
//! Every request carries the current credential as a bearer header. A `401`
//! maps to [`chat_core::ApiError::Unauthorized`]; deciding what that means for
//! the session is up to the caller.

mod client;

pub use client::HttpChatApi;

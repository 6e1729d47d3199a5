//! Domain and collaborator error types

mod api_error;
mod domain_error;

pub use api_error::{ApiError, ApiResult};
pub use domain_error::DomainError;

#![warn(clippy::unwrap_used)]

pub mod error;
pub mod offers_rest;
pub mod rest;
pub mod server;
pub mod swagger;
pub mod tracking_rest;

pub use error::{ApiError, ApiResult};
pub use rest::AppState;
pub use server::{router, ApiServer};
pub use swagger::ApiDoc;

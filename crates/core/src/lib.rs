pub mod config;
pub mod error;
pub mod keys;
pub mod types;

pub use config::AppConfig;
pub use error::{AffiliateError, AffiliateResult};

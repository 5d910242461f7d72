//! pinvault-core: shared data model, configuration schema, and error taxonomy

pub mod config;
pub mod error;
pub mod types;

pub use error::{PinvaultError, PinvaultResult, Service, TxErrorKind};

//! pinvault-sync: the content lifecycle and on-chain pinning
//!
//!   - `registry`: durable file id → storage/pin state map (JSON, atomic writes)
//!   - `engine`: upload (encrypt → store → register), download (fetch → decrypt
//!     → verify → atomic write), guarded delete
//!   - `gas`: gas price and gas limit resolution
//!   - `pinning`: quote, confirm, then one signed transaction per file

pub mod engine;
pub mod gas;
pub mod pinning;
pub mod registry;

pub use engine::{DownloadResult, Lifecycle, ProgressFn, UploadResult};
pub use gas::{GasPolicy, GasPriceSetting};
pub use pinning::{
    record_successes, BatchOutcome, FileOutcome, PinEvent, PinFailure, PinPlan, PinReceipt,
    PinRequest, PinTarget, PinningOrchestrator, RecordSummary, UnrecordedPin,
};
pub use registry::{FileRegistry, SharedRegistry};

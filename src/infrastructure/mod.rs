pub mod error;
pub mod logging;

pub use error::{AiError, ErrorCategory, ScanError};
pub use logging::{setup_logging, LogFormat, LogOutput, LoggingConfig};

//! Error taxonomy for the streaming FIT decoder.

use thiserror::Error;

/// Errors produced while parsing or rewriting a FIT stream.
///
/// All variants are fatal to the current parse: the driver does not attempt
/// resynchronization after any of these.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("invalid .FIT file header: {0}")]
    Header(String),

    #[error("unexpected end of FIT stream: wanted {wanted} bytes, got {got}")]
    Eof { wanted: usize, got: usize },

    #[error("CRC mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    Crc { expected: u16, actual: u16 },

    #[error("FIT structural error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type FitResult<T> = Result<T, FitError>;

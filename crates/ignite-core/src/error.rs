//! Codec-level errors: one `#[error(...)]` variant per failure mode, no
//! catch-all string variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("truncated stream: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("unknown type code: 0x{0:02x}")]
    UnknownTypeCode(u8),

    #[error("invalid UTF-8 in string field: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("negative length field: {0}")]
    NegativeLength(i32),

    #[error("unknown collection kind byte: {0}")]
    UnknownCollectionKind(u8),

    #[error("unknown map kind byte: {0}")]
    UnknownMapKind(u8),

    #[error("complex object schema is inconsistent: {0}")]
    InvalidSchema(&'static str),
}

pub type Result<T> = std::result::Result<T, CodecError>;

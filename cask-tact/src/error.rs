use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Read of {requested} bytes exceeds the {remaining} remaining")]
    OutOfRange { requested: usize, remaining: usize },

    #[error("Bit read count {0} is out of range, must be 1-32")]
    InvalidBitCount(u32),

    #[error("File has incorrect magic: {0:?}")]
    BadMagic([u8; 4]),

    #[error("Table has incorrect signature")]
    BadSignature,

    #[error("Unsupported table version: {0}")]
    UnsupportedVersion(u32),

    #[error("Unsupported key length: {0}")]
    UnsupportedKeyLength(u8),

    #[error("File ID delta over- or under-flows")]
    FileIdDeltaOverflow,
}

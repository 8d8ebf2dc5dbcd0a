use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while decoding asset files or assembling a scene.
///
/// Every parse error is fatal to the file being decoded; there is no
/// partial-load mode. Recoverable anomalies (unknown texture roles,
/// clamped indices, trailing bytes) are reported through `tracing`
/// instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of data")]
    Truncated,

    #[error("bad magic: expected {expected:?}")]
    BadMagic { expected: &'static str },

    #[error("unsupported {what} version {version}")]
    UnsupportedVersion { what: &'static str, version: u32 },

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("{table} index {index} out of range (table size {len})")]
    IndexOutOfRange {
        table: &'static str,
        index: i64,
        len: usize,
    },

    #[error("duplicate texture role {role} in material {material:?}")]
    DuplicateTextureRole { material: String, role: u32 },

    #[error("material {material:?} has textures but no color map")]
    MissingColorMap { material: String },

    #[error("material {material:?} has both textures and children")]
    MaterialHasBothTexturesAndChildren { material: String },

    #[error("unexpected mesh footer ({0}, {1})")]
    UnexpectedFooter(u32, u32),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("zlib decompression failed: {0}")]
    DecompressFailed(String),

    #[error("refusing to allocate {0} bytes")]
    OutOfMemory(usize),

    #[error("no such entry: {0:?}")]
    NotFound(String),

    #[error("bone hierarchy contains a cycle")]
    CyclicHierarchy,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<binrw::Error> for Error {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => Error::Truncated,
            binrw::Error::Io(e) => Error::Io(e),
            binrw::Error::BadMagic { .. } => Error::BadMagic { expected: "magic" },
            binrw::Error::Backtrace(bt) => Error::from(*bt.error),
            other => Error::Io(io::Error::new(io::ErrorKind::InvalidData, other.to_string())),
        }
    }
}

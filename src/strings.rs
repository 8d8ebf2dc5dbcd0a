//! Zero-terminated string reading.
//!
//! Names inside these files are Shift-JIS; decoding errors are not
//! fatal, the offending bytes are replaced and a warning is emitted.

use std::io::Read;

use encoding_rs::SHIFT_JIS;
use tracing::warn;

use crate::error::{Error, Result};

pub(crate) fn decode_sjis(bytes: &[u8]) -> String {
    let (text, _, had_errors) = SHIFT_JIS.decode(bytes);
    if had_errors {
        warn!(?bytes, "undecodable Shift-JIS sequence");
    }
    text.into_owned()
}

/// Read bytes up to and including a zero terminator, then decode.
pub(crate) fn read_cstr<R: Read>(reader: &mut R) -> Result<String> {
    read_cstr_with(reader, |b| b)
}

/// Like [`read_cstr`], applying `unmask` to every byte before the
/// terminator check.
pub(crate) fn read_cstr_with<R: Read>(reader: &mut R, unmask: impl Fn(u8) -> u8) -> Result<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Truncated
            } else {
                Error::Io(e)
            }
        })?;
        let b = unmask(byte[0]);
        if b == 0 {
            return Ok(decode_sjis(&bytes));
        }
        bytes.push(b);
    }
}

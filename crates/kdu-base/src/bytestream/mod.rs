//! Endian-aware byte writer shared by every file-format writer crate.
//!
//! Mirrors the shape of the byte-stream writer used elsewhere in this
//! family of crates: a generic `ZWriterTrait`-style sink, wrapped by a
//! `ZWriter` that adds endian-aware multi-byte writes and a running byte
//! count, so format crates never hand-roll `to_be_bytes`/`to_le_bytes`
//! calls inline.
mod writer;

pub use writer::{ZByteIoError, ZWriter};

/// A sink that bytes can be appended to.
///
/// Implemented for `Vec<u8>` unconditionally, and for `std::fs::File`
/// behind the `std` feature.
pub trait ZWriterTrait {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<usize, ZByteIoError>;
    fn reserve_hint(&mut self, additional: usize) -> Result<(), ZByteIoError>;
}

impl ZWriterTrait for alloc::vec::Vec<u8> {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<usize, ZByteIoError> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn reserve_hint(&mut self, additional: usize) -> Result<(), ZByteIoError> {
        self.reserve(additional);
        Ok(())
    }
}

#[cfg(feature = "std")]
impl ZWriterTrait for std::fs::File {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<usize, ZByteIoError> {
        use std::io::Write;
        self.write_all(buf)
            .map_err(|e| ZByteIoError::Io(e.to_string()))?;
        Ok(buf.len())
    }

    fn reserve_hint(&mut self, _additional: usize) -> Result<(), ZByteIoError> {
        // files have no reservation concept; accept the hint silently.
        Ok(())
    }
}

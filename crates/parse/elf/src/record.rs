//! Bounds-checked reads of fixed-size record arrays.
//!
//! Every table in an ELF64 file is an array of fixed-size records at a
//! file-specified offset. [`decode_array`] is the one place where such an
//! array is read: it checks the declared entry size against the record
//! layout and the extent of the array against the source length before a
//! single byte is read.

use std::io::{Read, Seek, SeekFrom};

use crate::error::ElfError;
use crate::ident::Endian;

/// A fixed-size ELF64 record with an explicit on-disk layout.
pub trait Record: Sized {
    /// Size of one record in the file.
    const SIZE: usize;

    /// Human-readable record name used in diagnostics.
    const NAME: &'static str;

    /// Decode one record from `data` in the given byte order.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`.
    fn parse(data: &[u8], endian: Endian) -> Self;
}

/// A seekable byte source with its length captured up front.
///
/// All reads go through [`ByteSource::read_at`], which refuses any range
/// that is not entirely inside the source, so the underlying reader never
/// sees a request past its end.
pub struct ByteSource<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wraps `inner`, measuring its length by seeking to the end.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::IoFailure`] if the seek fails.
    pub fn new(mut inner: R) -> Result<Self, ElfError> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }

    /// Total length of the source in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the source holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads exactly `size` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedTable`] if the range extends past the
    /// end of the source, or [`ElfError::IoFailure`] if the reader fails.
    pub fn read_at(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, ElfError> {
        check_region(offset, size, self.len)?;
        let byte_len = usize::try_from(size).map_err(|_| ElfError::TruncatedTable {
            offset,
            size,
            source_len: self.len,
        })?;
        let mut buf = vec![0u8; byte_len];
        if byte_len > 0 {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.inner.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    /// Reads up to `max` bytes from the start of the source.
    ///
    /// Shorter sources yield a shorter buffer rather than an error, so the
    /// caller can report the most precise failure (bad magic before
    /// truncation).
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::IoFailure`] if the reader fails.
    pub fn read_prefix(&mut self, max: usize) -> Result<Vec<u8>, ElfError> {
        let size = self.len.min(max as u64);
        self.read_at(0, size)
    }

    /// Unwraps the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Checks that `offset..offset + size` lies inside a source of `source_len`
/// bytes.
///
/// # Errors
///
/// Returns [`ElfError::TruncatedTable`] if the region overflows or ends
/// past `source_len`.
pub fn check_region(offset: u64, size: u64, source_len: u64) -> Result<(), ElfError> {
    match offset.checked_add(size) {
        Some(end) if end <= source_len => Ok(()),
        _ => Err(ElfError::TruncatedTable {
            offset,
            size,
            source_len,
        }),
    }
}

/// Computes `count * entry_size`, reporting overflow as truncation of the
/// table at `offset`.
///
/// # Errors
///
/// Returns [`ElfError::TruncatedTable`] if the product overflows `u64`.
pub fn table_size(offset: u64, count: u64, entry_size: u64, source_len: u64) -> Result<u64, ElfError> {
    count
        .checked_mul(entry_size)
        .ok_or(ElfError::TruncatedTable {
            offset,
            size: u64::MAX,
            source_len,
        })
}

/// Decodes `count` records of type `T` starting at `offset`.
///
/// # Errors
///
/// Returns [`ElfError::LayoutMismatch`] if `entry_size` is not `T::SIZE`,
/// [`ElfError::TruncatedTable`] if the array does not fit in the source,
/// or [`ElfError::IoFailure`] if the reader fails.
pub fn decode_array<T: Record, R: Read + Seek>(
    source: &mut ByteSource<R>,
    offset: u64,
    count: u64,
    entry_size: u64,
    endian: Endian,
) -> Result<Vec<T>, ElfError> {
    if entry_size != T::SIZE as u64 {
        return Err(ElfError::LayoutMismatch {
            record: T::NAME,
            expected: T::SIZE as u64,
            found: entry_size,
        });
    }
    let size = table_size(offset, count, entry_size, source.len())?;
    let raw = source.read_at(offset, size)?;
    Ok(raw
        .chunks_exact(T::SIZE)
        .map(|chunk| T::parse(chunk, endian))
        .collect())
}

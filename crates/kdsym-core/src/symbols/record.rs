//! # Symbol Record Codec
//!
//! The on-disk symbol table format and a checked walker over it.
//!
//! ## Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! +--------+---------------------------------------------+-----+---------+
//! | stamp  | delta | offset | name (delta - 8 bytes)     | ... | 0u32    |
//! | u32    | u32   | u32    | not NUL-terminated         |     | (end)   |
//! +--------+---------------------------------------------+-----+---------+
//! ```
//!
//! - `stamp`: build identity of the module the table describes
//! - `delta`: distance in bytes from the start of this record to the next one;
//!   zero marks the end of the table
//! - `offset`: symbol offset relative to the module base
//! - `name`: raw name bytes; its length is implied by `delta`
//!
//! The walk is validated once, by [`SymbolBlob::validate`]. The resulting
//! [`SymbolBlob`] only ever looks at the validated extent, so traversal after
//! load cannot leave the bytes that were pinned.

use std::borrow::Cow;
use std::iter::FusedIterator;

use crate::error::CorruptTable;

/// Size of the build-identity stamp at the start of the blob.
pub const STAMP_SIZE: usize = 4;

/// Size of the fixed record header (`delta` + `offset`).
pub const RECORD_HEADER_SIZE: usize = 8;

/// Size of the `delta` field, which is all the terminating record carries.
const DELTA_SIZE: usize = 4;

/// Upper bound on records walked before a table is declared corrupt.
pub const MAX_SYMBOL_RECORDS: usize = 1 << 20;

/// Longest name [`SymbolFileBuilder`] will write; longer names are cut.
pub const MAX_NAME_LEN: usize = 4096;

fn read_u32(bytes: &[u8], at: usize) -> Option<u32>
{
    let end = at.checked_add(4)?;
    let raw: [u8; 4] = bytes.get(at..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

/// A validated view of a symbol table blob.
///
/// Holds only the validated extent: the stamp, every record, and the delta
/// field of the terminating record.
#[derive(Debug, Clone, Copy)]
pub struct SymbolBlob<'a>
{
    bytes: &'a [u8],
    stamp: u32,
    record_count: usize,
}

impl<'a> SymbolBlob<'a>
{
    /// Walk `mapped` from the first record to the terminator and compute the
    /// table's extent.
    ///
    /// ## Errors
    ///
    /// Returns the first [`CorruptTable`] condition met on the way.
    pub fn validate(mapped: &'a [u8]) -> Result<Self, CorruptTable>
    {
        Self::validate_with_limit(mapped, MAX_SYMBOL_RECORDS)
    }

    pub(crate) fn validate_with_limit(mapped: &'a [u8], limit: usize) -> Result<Self, CorruptTable>
    {
        let stamp = read_u32(mapped, 0).ok_or(CorruptTable::TooShort)?;

        let mut pos = STAMP_SIZE;
        let mut record_count = 0usize;
        loop {
            let delta = read_u32(mapped, pos).ok_or(CorruptTable::TruncatedRecord { offset: pos })?;
            if delta == 0 {
                break;
            }
            if (delta as usize) < RECORD_HEADER_SIZE {
                return Err(CorruptTable::DeltaTooSmall { offset: pos, delta });
            }
            let next = pos
                .checked_add(delta as usize)
                .filter(|next| *next <= mapped.len())
                .ok_or(CorruptTable::RecordOverrun { offset: pos, delta })?;

            record_count += 1;
            if record_count > limit {
                return Err(CorruptTable::TooManyRecords { limit });
            }
            pos = next;
        }

        Ok(Self {
            bytes: &mapped[..pos + DELTA_SIZE],
            stamp,
            record_count,
        })
    }

    /// Rebuild a view over bytes that already passed [`SymbolBlob::validate`].
    pub(crate) fn from_validated(bytes: &'a [u8], stamp: u32, record_count: usize) -> Self
    {
        Self {
            bytes,
            stamp,
            record_count,
        }
    }

    /// Build identity the table was generated for.
    pub fn stamp(&self) -> u32
    {
        self.stamp
    }

    /// Size of the validated extent in bytes, terminator included.
    pub fn len(&self) -> usize
    {
        self.bytes.len()
    }

    /// Always false: a valid blob holds at least the stamp and a terminator.
    pub fn is_empty(&self) -> bool
    {
        self.bytes.is_empty()
    }

    /// Number of symbol records.
    pub fn record_count(&self) -> usize
    {
        self.record_count
    }

    /// The validated bytes.
    pub fn as_bytes(&self) -> &'a [u8]
    {
        self.bytes
    }

    /// First record, or `None` for a table without symbols.
    pub fn first_record(&self) -> Option<SymbolRecord<'a>>
    {
        SymbolRecord::at(self.bytes, STAMP_SIZE)
    }

    /// Iterate over all records in file order.
    pub fn records(&self) -> Records<'a>
    {
        Records {
            next: self.first_record(),
        }
    }
}

/// One record inside a [`SymbolBlob`].
#[derive(Debug, Clone, Copy)]
pub struct SymbolRecord<'a>
{
    bytes: &'a [u8],
    pos: usize,
    delta: u32,
    offset: u32,
}

impl<'a> SymbolRecord<'a>
{
    fn at(bytes: &'a [u8], pos: usize) -> Option<Self>
    {
        let delta = read_u32(bytes, pos)?;
        if delta == 0 {
            return None;
        }
        let offset = read_u32(bytes, pos + DELTA_SIZE)?;
        Some(Self {
            bytes,
            pos,
            delta,
            offset,
        })
    }

    /// The record after this one, or `None` if this is the last.
    #[must_use]
    pub fn next(&self) -> Option<SymbolRecord<'a>>
    {
        Self::at(self.bytes, self.pos + self.delta as usize)
    }

    /// Symbol offset relative to the module base.
    pub fn offset(&self) -> u32
    {
        self.offset
    }

    /// Distance to the next record.
    pub fn delta(&self) -> u32
    {
        self.delta
    }

    /// Position of the record within the blob.
    pub fn position(&self) -> usize
    {
        self.pos
    }

    /// Raw stored name, `delta - 8` bytes long.
    pub fn name(&self) -> &'a [u8]
    {
        self.bytes
            .get(self.pos + RECORD_HEADER_SIZE..self.pos + self.delta as usize)
            .unwrap_or_default()
    }

    /// Name up to the first NUL byte, decoded lossily.
    pub fn display_name(&self) -> Cow<'a, str>
    {
        let name = self.name();
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        String::from_utf8_lossy(&name[..end])
    }
}

/// Iterator over the records of a [`SymbolBlob`].
#[derive(Debug, Clone)]
pub struct Records<'a>
{
    next: Option<SymbolRecord<'a>>,
}

impl<'a> Iterator for Records<'a>
{
    type Item = SymbolRecord<'a>;

    fn next(&mut self) -> Option<Self::Item>
    {
        let current = self.next.take()?;
        self.next = current.next();
        Some(current)
    }
}

impl FusedIterator for Records<'_> {}

/// Writes symbol files in the format [`SymbolBlob`] reads.
///
/// ```rust
/// use kdsym_core::symbols::{SymbolBlob, SymbolFileBuilder};
///
/// let bytes = SymbolFileBuilder::new(0x5f3a_1c00)
///     .symbol(0x10, "Init")
///     .symbol(0x40, "Worker")
///     .build();
///
/// let blob = SymbolBlob::validate(&bytes).unwrap();
/// assert_eq!(blob.stamp(), 0x5f3a_1c00);
/// assert_eq!(blob.record_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SymbolFileBuilder
{
    stamp: u32,
    records: Vec<(u32, Vec<u8>)>,
}

impl SymbolFileBuilder
{
    /// Start a table for a module with the given build identity.
    pub fn new(stamp: u32) -> Self
    {
        Self {
            stamp,
            records: Vec::new(),
        }
    }

    /// Append a symbol. Names longer than [`MAX_NAME_LEN`] are cut.
    pub fn push(&mut self, offset: u32, name: impl AsRef<[u8]>) -> &mut Self
    {
        let name = name.as_ref();
        let name = &name[..name.len().min(MAX_NAME_LEN)];
        self.records.push((offset, name.to_vec()));
        self
    }

    /// By-value form of [`SymbolFileBuilder::push`].
    #[must_use]
    pub fn symbol(mut self, offset: u32, name: impl AsRef<[u8]>) -> Self
    {
        self.push(offset, name);
        self
    }

    /// Serialize the table, terminator included.
    #[allow(clippy::cast_possible_truncation)] // names are capped at MAX_NAME_LEN
    pub fn build(&self) -> Vec<u8>
    {
        let size = STAMP_SIZE
            + self
                .records
                .iter()
                .map(|(_, name)| RECORD_HEADER_SIZE + name.len())
                .sum::<usize>()
            + DELTA_SIZE;

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&self.stamp.to_le_bytes());
        for (offset, name) in &self.records {
            let delta = (RECORD_HEADER_SIZE + name.len()) as u32;
            out.extend_from_slice(&delta.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(name);
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sample() -> Vec<u8>
    {
        SymbolFileBuilder::new(0xdead_beef)
            .symbol(0x10, "Init")
            .symbol(0x40, "Worker")
            .build()
    }

    fn raw(stamp: u32, records: &[(u32, u32, &[u8])]) -> Vec<u8>
    {
        let mut out = stamp.to_le_bytes().to_vec();
        for (delta, offset, name) in records {
            out.extend_from_slice(&delta.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(name);
        }
        out
    }

    #[test]
    fn test_walk_records()
    {
        let bytes = sample();
        let blob = SymbolBlob::validate(&bytes).unwrap();

        let first = blob.first_record().unwrap();
        assert_eq!(first.offset(), 0x10);
        assert_eq!(first.name(), b"Init");
        assert_eq!(first.delta(), 12);

        let second = first.next().unwrap();
        assert_eq!(second.offset(), 0x40);
        assert_eq!(second.name(), b"Worker");
        assert!(second.next().is_none());

        let names: Vec<_> = blob.records().map(|r| r.display_name().into_owned()).collect();
        assert_eq!(names, ["Init", "Worker"]);
    }

    #[test]
    fn test_extent_includes_terminator()
    {
        let mut bytes = sample();
        let exact = bytes.len();
        bytes.extend_from_slice(b"trailing garbage");

        let blob = SymbolBlob::validate(&bytes).unwrap();
        assert_eq!(blob.len(), exact);
        assert_eq!(blob.record_count(), 2);
        assert_eq!(blob.as_bytes(), &bytes[..exact]);
    }

    #[test]
    fn test_empty_table()
    {
        let bytes = SymbolFileBuilder::new(7).build();
        assert_eq!(bytes.len(), 8);

        let blob = SymbolBlob::validate(&bytes).unwrap();
        assert_eq!(blob.stamp(), 7);
        assert_eq!(blob.record_count(), 0);
        assert!(blob.first_record().is_none());
        assert_eq!(blob.records().count(), 0);
    }

    #[test]
    fn test_empty_name()
    {
        let bytes = SymbolFileBuilder::new(1).symbol(0x20, "").build();
        let blob = SymbolBlob::validate(&bytes).unwrap();
        let record = blob.first_record().unwrap();
        assert!(record.name().is_empty());
        assert_eq!(record.delta() as usize, RECORD_HEADER_SIZE);
    }

    #[test]
    fn test_display_name_stops_at_nul()
    {
        let bytes = SymbolFileBuilder::new(1).symbol(0, b"Pad\0\0\0").build();
        let blob = SymbolBlob::validate(&bytes).unwrap();
        let record = blob.first_record().unwrap();
        assert_eq!(record.name(), b"Pad\0\0\0");
        assert_eq!(record.display_name(), "Pad");
    }

    #[test]
    fn test_too_short()
    {
        assert_eq!(SymbolBlob::validate(&[1, 2, 3]).unwrap_err(), CorruptTable::TooShort);
    }

    #[test]
    fn test_missing_terminator()
    {
        let mut bytes = sample();
        bytes.truncate(bytes.len() - 4);
        let err = SymbolBlob::validate(&bytes).unwrap_err();
        assert_eq!(err, CorruptTable::TruncatedRecord { offset: bytes.len() });
    }

    #[test]
    fn test_delta_smaller_than_header()
    {
        let bytes = raw(0, &[(4, 0x10, b"")]);
        let err = SymbolBlob::validate(&bytes).unwrap_err();
        assert_eq!(err, CorruptTable::DeltaTooSmall { offset: 4, delta: 4 });
    }

    #[test]
    fn test_delta_past_end()
    {
        let bytes = raw(0, &[(0x100, 0x10, b"Init")]);
        let err = SymbolBlob::validate(&bytes).unwrap_err();
        assert_eq!(err, CorruptTable::RecordOverrun { offset: 4, delta: 0x100 });
    }

    #[test]
    fn test_huge_delta_does_not_overflow()
    {
        let bytes = raw(0, &[(u32::MAX, 0x10, b"Init")]);
        let err = SymbolBlob::validate(&bytes).unwrap_err();
        assert!(matches!(err, CorruptTable::RecordOverrun { .. }));
    }

    #[test]
    fn test_record_limit()
    {
        let bytes = SymbolFileBuilder::new(0)
            .symbol(1, "a")
            .symbol(2, "b")
            .symbol(3, "c")
            .build();
        assert!(SymbolBlob::validate_with_limit(&bytes, 3).is_ok());
        assert_eq!(
            SymbolBlob::validate_with_limit(&bytes, 2).unwrap_err(),
            CorruptTable::TooManyRecords { limit: 2 }
        );
    }

    #[test]
    fn test_builder_caps_name_length()
    {
        let long = vec![b'x'; MAX_NAME_LEN + 10];
        let bytes = SymbolFileBuilder::new(0).symbol(0, &long).build();
        let blob = SymbolBlob::validate(&bytes).unwrap();
        assert_eq!(blob.first_record().unwrap().name().len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_builder_layout_is_little_endian()
    {
        let bytes = SymbolFileBuilder::new(0x0403_0201).symbol(0x0807_0605, "A").build();
        assert_eq!(
            bytes,
            [
                0x01, 0x02, 0x03, 0x04, // stamp
                0x09, 0x00, 0x00, 0x00, // delta = 8 + 1
                0x05, 0x06, 0x07, 0x08, // offset
                b'A', // name
                0x00, 0x00, 0x00, 0x00, // terminator
            ]
        );
    }
}

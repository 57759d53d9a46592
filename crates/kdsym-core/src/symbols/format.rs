//! `module!symbol` formatting into caller buffers.
//!
//! Formatting happens in a stack buffer first so that a caller buffer that is
//! too small is never written to. The result is NUL-terminated like the C
//! strings the debugger's command layer passes around.

use std::fmt;

use smallvec::SmallVec;

use super::record::SymbolRecord;
use super::table::ModuleSymbolTable;
use crate::error::ResolveError;
use crate::types::Address;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// A symbol found in a loaded table.
#[derive(Debug, Clone, Copy)]
pub struct SymbolMatch<'a>
{
    /// Table the symbol was found in.
    pub table: &'a ModuleSymbolTable,
    /// The matching record.
    pub record: SymbolRecord<'a>,
}

impl<'a> SymbolMatch<'a>
{
    /// Absolute address of the symbol.
    pub fn address(&self) -> Address
    {
        self.table.base() + self.record.offset()
    }

    /// Short name of the owning module.
    pub fn module(&self) -> &'a str
    {
        self.table.name()
    }

    /// `module!symbol`, without a distance suffix.
    pub fn formatted(&self) -> FormattedSymbol
    {
        FormattedSymbol::new(self)
    }
}

impl fmt::Display for SymbolMatch<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}!{}", self.module(), self.record.display_name())
    }
}

/// A formatted symbol string, held on the stack for typical lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedSymbol(SmallVec<[u8; 128]>);

impl FormattedSymbol
{
    fn new(symbol: &SymbolMatch<'_>) -> Self
    {
        let name = symbol.record.name();
        let name = name.iter().position(|&b| b == 0).map_or(name, |end| &name[..end]);

        let mut out = SmallVec::new();
        out.extend_from_slice(symbol.module().as_bytes());
        out.push(b'!');
        out.extend_from_slice(name);
        Self(out)
    }

    /// Append `+0x<distance>` in lowercase hex without padding.
    #[must_use]
    pub fn with_distance(mut self, distance: u32) -> Self
    {
        self.0.extend_from_slice(b"+0x");
        let digits = (u32::BITS - distance.leading_zeros()).div_ceil(4).max(1);
        for shift in (0..digits).rev() {
            self.0.push(HEX_DIGITS[((distance >> (shift * 4)) & 0xf) as usize]);
        }
        self
    }

    /// Formatted bytes, without terminator.
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.0
    }

    /// Buffer size needed to hold the string and its terminator.
    pub fn required_len(&self) -> usize
    {
        self.0.len() + 1
    }

    /// Copy the string and a NUL terminator into `buf`.
    ///
    /// Returns the number of bytes written, terminator included.
    ///
    /// ## Errors
    ///
    /// Returns `BufferTooSmall` and leaves `buf` untouched if it cannot hold
    /// the whole string plus terminator.
    pub fn write_into(&self, buf: &mut [u8]) -> Result<usize, ResolveError>
    {
        let required = self.required_len();
        let Some(dest) = buf.get_mut(..required) else {
            return Err(ResolveError::BufferTooSmall {
                required,
                capacity: buf.len(),
            });
        };
        let (text, terminator) = dest.split_at_mut(self.0.len());
        text.copy_from_slice(&self.0);
        terminator[0] = 0;
        Ok(required)
    }

    /// The string, decoded lossily.
    pub fn into_string(self) -> String
    {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Display for FormattedSymbol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn raw(text: &str) -> FormattedSymbol
    {
        FormattedSymbol(SmallVec::from_slice(text.as_bytes()))
    }

    #[test]
    fn test_distance_suffix()
    {
        assert_eq!(raw("m!f").with_distance(0).into_string(), "m!f+0x0");
        assert_eq!(raw("m!f").with_distance(0x15).into_string(), "m!f+0x15");
        assert_eq!(raw("m!f").with_distance(0xabc).into_string(), "m!f+0xabc");
        assert_eq!(raw("m!f").with_distance(u32::MAX).into_string(), "m!f+0xffffffff");
        assert_eq!(raw("m!f").with_distance(0x1000_0000).into_string(), "m!f+0x10000000");
    }

    #[test]
    fn test_write_into_exact_fit()
    {
        let symbol = raw("driver!Init");
        let mut buf = [0xffu8; 12];
        assert_eq!(symbol.write_into(&mut buf), Ok(12));
        assert_eq!(&buf, b"driver!Init\0");
    }

    #[test]
    fn test_write_into_too_small_leaves_buffer_untouched()
    {
        let symbol = raw("driver!Init");
        let mut buf = [0xffu8; 11];
        assert_eq!(
            symbol.write_into(&mut buf),
            Err(ResolveError::BufferTooSmall {
                required: 12,
                capacity: 11
            })
        );
        assert!(buf.iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_write_into_larger_buffer()
    {
        let symbol = raw("a!b");
        let mut buf = [0xffu8; 8];
        assert_eq!(symbol.write_into(&mut buf), Ok(4));
        assert_eq!(&buf[..4], b"a!b\0");
        assert_eq!(buf[4], 0xff);
    }
}

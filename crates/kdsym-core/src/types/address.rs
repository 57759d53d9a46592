//! Kernel address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed kernel address
///
/// The debugger targets a 32-bit kernel: symbol offsets, module bases and
/// distances are all 32-bit values, and arithmetic between them wraps modulo
/// 2^32 the way the target's pointer arithmetic does.
///
/// ## Why use a newtype?
///
/// - **Type safety**: Prevents accidentally passing a symbol offset where an absolute address is expected
/// - **Self-documenting**: Makes it clear that a value represents a memory address
///
/// ## Example
///
/// ```rust
/// use kdsym_core::types::Address;
///
/// let base = Address::from(0x1000);
/// let symbol = base + 0x10;
/// assert_eq!(symbol.value(), 0x1010);
/// assert_eq!(symbol - base, 0x10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u32);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u32` value
    ///
    /// This is equivalent to `Address::from(value)` but can be used in const contexts.
    pub const fn new(value: u32) -> Self
    {
        Address(value)
    }

    /// Get the raw `u32` value of this address
    pub const fn value(self) -> u32
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kdsym_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u32::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u32) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Distance from `earlier` up to this address, if `earlier` is not above it.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kdsym_core::types::Address;
    ///
    /// let addr = Address::from(0x1025);
    /// assert_eq!(addr.distance_from(Address::from(0x1010)), Some(0x15));
    /// assert_eq!(addr.distance_from(Address::from(0x1040)), None);
    /// ```
    pub fn distance_from(self, earlier: Address) -> Option<u32>
    {
        self.0.checked_sub(earlier.0)
    }

    /// Parse `0x`-prefixed hexadecimal or plain decimal text.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kdsym_core::types::Address;
    ///
    /// assert_eq!(Address::parse("0x1040"), Some(Address::from(0x1040)));
    /// assert_eq!(Address::parse("4160"), Some(Address::from(0x1040)));
    /// assert_eq!(Address::parse("0xZZ"), None);
    /// ```
    pub fn parse(text: &str) -> Option<Self>
    {
        let text = text.trim();
        let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => text.parse().ok()?,
        };
        Some(Address(value))
    }
}

impl From<u32> for Address
{
    fn from(value: u32) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u32
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u32> for Address
{
    type Output = Address;

    fn add(self, rhs: u32) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u32> for Address
{
    type Output = Address;

    fn sub(self, rhs: u32) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}

/// Wrapping distance between two addresses.
impl Sub<Address> for Address
{
    type Output = u32;

    fn sub(self, rhs: Address) -> Self::Output
    {
        self.0.wrapping_sub(rhs.0)
    }
}

//! Bluetooth UUIDs, as carried in ATT attribute types and Find Information responses.

/// A Bluetooth UUID, either the 16-bit "assigned number" short form or the full 128-bit form.
///
/// Equality is exact: a 16-bit UUID and its 128-bit expansion under the Bluetooth Base UUID are
/// *not* considered equal by this type (callers that need that conversion can do it explicitly
/// with [`Uuid::to_u128`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Uuid {
    Uuid16(u16),
    Uuid128(u128),
}

/// The Bluetooth Base UUID that all 16-bit UUIDs are shorthand for.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805F9B34FB;

impl Uuid {
    /// Format-1 entries in a Find Information Response use 16-bit UUIDs.
    pub const FORMAT_16_BIT: u8 = 0x01;
    /// Format-2 entries in a Find Information Response use 128-bit UUIDs.
    pub const FORMAT_128_BIT: u8 = 0x02;

    pub fn format(self) -> u8 {
        match self {
            Uuid::Uuid16(_) => Self::FORMAT_16_BIT,
            Uuid::Uuid128(_) => Self::FORMAT_128_BIT,
        }
    }

    pub fn byte_len(self) -> usize {
        match self {
            Uuid::Uuid16(_) => 2,
            Uuid::Uuid128(_) => 16,
        }
    }

    /// Expand to the full 128-bit value, applying the Bluetooth Base UUID to a 16-bit short form.
    pub fn to_u128(self) -> u128 {
        match self {
            Uuid::Uuid16(short) => BASE_UUID | ((short as u128) << 96),
            Uuid::Uuid128(full) => full,
        }
    }
}

impl From<u16> for Uuid {
    fn from(val: u16) -> Self {
        Uuid::Uuid16(val)
    }
}

impl From<u128> for Uuid {
    fn from(val: u128) -> Self {
        Uuid::Uuid128(val)
    }
}

impl core::fmt::Display for Uuid {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Uuid::Uuid16(v) => write!(f, "{:#06X}", v),
            Uuid::Uuid128(v) => write!(f, "{:#034X}", v),
        }
    }
}

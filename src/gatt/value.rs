//! Fixed-capacity characteristic value storage

use crate::gatt::types::AccessError;
use heapless::Vec;

/// Characteristic value backed by a fixed-size array.
///
/// Writes overwrite a prefix of the array and leave the remaining bytes
/// untouched. Reads always return the full array.
pub struct CharacteristicValue<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> CharacteristicValue<N> {
    /// Create a zero-filled value.
    pub const fn new() -> Self {
        Self { data: [0; N] }
    }

    /// Current contents.
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }

    /// Copy `bytes` into the start of the buffer.
    ///
    /// Rejects anything longer than `N` and leaves the buffer unchanged.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, AccessError> {
        if bytes.len() > N {
            return Err(AccessError::InvalidAttributeValueLength);
        }
        self.data
            .get_mut(..bytes.len())
            .ok_or(AccessError::Unlikely)?
            .copy_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Append the full contents to a response buffer.
    pub fn read_into<const M: usize>(&self, out: &mut Vec<u8, M>) -> Result<(), AccessError> {
        out.extend_from_slice(&self.data)
            .map_err(|_| AccessError::InsufficientResources)
    }
}

impl<const N: usize> Default for CharacteristicValue<N> {
    fn default() -> Self {
        Self::new()
    }
}

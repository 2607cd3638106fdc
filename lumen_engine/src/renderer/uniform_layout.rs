/// Dynamic uniform buffer layout
///
/// Packs one fixed-size record per object into a single buffer, each record
/// starting at a multiple of the device's `min_uniform_buffer_offset_alignment`
/// so it can be addressed with a dynamic offset.

use bytemuck::Pod;
use crate::error::{Error, Result};

/// Smallest multiple of `alignment` that is >= `size`
///
/// An alignment of 0 or 1 leaves `size` unchanged. The device reports a power of
/// two in practice, but nothing here relies on it.
pub fn pad_uniform_buffer_size(size: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return size;
    }
    size.div_ceil(alignment) * alignment
}

/// Record layout of a dynamic uniform buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicUniformLayout {
    /// Raw record size in bytes
    pub element_size: u64,
    /// Distance between consecutive records
    pub stride: u64,
    /// Number of records the buffer holds
    pub capacity: u32,
}

impl DynamicUniformLayout {
    /// Fails when the last record's offset does not fit the 32-bit dynamic offset
    pub fn new(element_size: u64, alignment: u64, capacity: u32) -> Result<Self> {
        let stride = pad_uniform_buffer_size(element_size, alignment);
        let last_offset = (capacity.saturating_sub(1) as u64).checked_mul(stride);
        if last_offset.and_then(|offset| u32::try_from(offset).ok()).is_none() {
            return Err(Error::InvalidResource(format!(
                "{} records of stride {} exceed the 32-bit dynamic offset range",
                capacity, stride
            )));
        }

        Ok(Self {
            element_size,
            stride,
            capacity,
        })
    }

    /// Layout for records of type `T`
    pub fn for_type<T: Pod>(alignment: u64, capacity: u32) -> Result<Self> {
        Self::new(std::mem::size_of::<T>() as u64, alignment, capacity)
    }

    /// Byte offset of record `index` (also its dynamic offset)
    pub fn offset(&self, index: u32) -> u64 {
        index as u64 * self.stride
    }

    /// Dynamic offset of record `index`, as passed to a descriptor bind
    ///
    /// `None` past `capacity`.
    pub fn dynamic_offset(&self, index: u32) -> Option<u32> {
        if index >= self.capacity {
            return None;
        }
        u32::try_from(self.offset(index)).ok()
    }

    /// Total buffer size needed for `capacity` records
    pub fn buffer_size(&self) -> u64 {
        self.stride * self.capacity as u64
    }

    /// Lay `records` out at `index * stride`, zero-filling the padding
    ///
    /// Records beyond `capacity` are dropped.
    pub fn pack<T: Pod>(&self, records: &[T]) -> Vec<u8> {
        let count = records.len().min(self.capacity as usize);
        let mut bytes = vec![0u8; count * self.stride as usize];
        for (index, record) in records.iter().take(count).enumerate() {
            let start = index * self.stride as usize;
            let raw = bytemuck::bytes_of(record);
            bytes[start..start + raw.len()].copy_from_slice(raw);
        }
        bytes
    }
}

#[cfg(test)]
#[path = "uniform_layout_tests.rs"]
mod tests;

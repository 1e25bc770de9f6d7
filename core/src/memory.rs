use crate::error::ExitError;
use alloc::vec::Vec;
use primitive_types::U256;

/// A sequencial memory. It uses Rust's `Vec` for internal
/// representation.
#[derive(Clone, Debug)]
pub struct Memory {
    data: Vec<u8>,
    effective_len: U256,
    limit: usize,
}

impl Memory {
    /// Create a new memory with the given limit.
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            effective_len: U256::zero(),
            limit,
        }
    }

    /// Memory limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Get the length of the current memory range.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the memory is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return the full memory.
    pub fn data(&self) -> &Vec<u8> {
        &self.data
    }

    /// The effective length, that is, the length of the memory after
    /// resize rounded to the next multiple of `32`.
    pub fn effective_len(&self) -> U256 {
        self.effective_len
    }

    /// Resize the memory, making it cover the memory region of `offset..offset+len`,
    /// with 32 bytes as the step. If the number of steps is equal to `0`,
    /// this function does nothing.
    ///
    /// This function does not charge gas for the growth -- the caller (the
    /// gas metering layer) must compute and charge the expansion cost
    /// *before* calling this, per the yellow paper's quadratic-memory-cost
    /// rule.
    pub fn resize_offset(&mut self, offset: U256, len: U256) -> Result<(), ExitError> {
        if len == U256::zero() {
            return Ok(());
        }

        if let Some(end) = offset.checked_add(len) {
            self.resize_end(end)
        } else {
            Err(ExitError::InvalidRange)
        }
    }

    /// Resize the memory, making it cover to `end`, with 32 bytes as the
    /// step. If `end` is less than the current `effective_len`, this
    /// function does nothing.
    pub fn resize_end(&mut self, end: U256) -> Result<(), ExitError> {
        if end > self.effective_len {
            let new_end = next_multiple_of_32(end).ok_or(ExitError::InvalidRange)?;
            self.effective_len = new_end;
        }

        Ok(())
    }

    /// Get memory region at given offset.
    ///
    /// ## Panics
    ///
    /// Value of `size` is considered trusted. If they're too large,
    /// the program can run out of memory, or it can overflow.
    pub fn get(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut ret = Vec::with_capacity(size);
        ret.resize(size, 0);

        #[allow(clippy::needless_range_loop)]
        for index in 0..size {
            let position = offset + index;
            if position >= self.data.len() {
                break;
            }

            ret[index] = self.data[position];
        }

        ret
    }

    /// Set memory region at given offset. The offset and value is considered
    /// untrusted.
    pub fn set(
        &mut self,
        offset: usize,
        value: &[u8],
        target_size: Option<usize>,
    ) -> Result<(), ExitError> {
        let target_size = target_size.unwrap_or_else(|| value.len());
        if target_size == 0 {
            return Ok(());
        }

        if offset
            .checked_add(target_size)
            .map(|pos| pos > self.limit)
            .unwrap_or(true)
        {
            return Err(ExitError::InvalidRange);
        }

        if self.data.len() < offset + target_size {
            self.data.resize(offset + target_size, 0);
        }

        if target_size > value.len() {
            self.data[offset..((value.len()) + offset)].copy_from_slice(value);
            for index in (value.len())..target_size {
                self.data[offset + index] = 0;
            }
        } else {
            self.data[offset..(target_size + offset)].copy_from_slice(&value[..target_size]);
        }

        Ok(())
    }

    /// Copy `data` into the memory, of given `len`, pulling into the
    /// memory self starting at `memory_offset`, copying the data starting
    /// from `data_offset`.
    pub fn copy_large(
        &mut self,
        memory_offset: U256,
        data_offset: U256,
        len: U256,
        data: &[u8],
    ) -> Result<(), ExitError> {
        let memory_offset = if memory_offset > U256::from(usize::max_value()) {
            return Err(ExitError::InvalidRange);
        } else {
            memory_offset.as_usize()
        };

        let ulen = if len > U256::from(usize::max_value()) {
            return Err(ExitError::InvalidRange);
        } else {
            len.as_usize()
        };

        let data = if let Some(end) = data_offset.checked_add(len) {
            if end > U256::from(usize::max_value()) {
                &[]
            } else {
                let data_offset = data_offset.as_usize();
                let end = end.as_usize();

                if data_offset > data.len() {
                    &[]
                } else {
                    &data[data_offset..core::cmp::min(end, data.len())]
                }
            }
        } else {
            &[]
        };

        self.set(memory_offset, data, Some(ulen))
    }
}

fn next_multiple_of_32(x: U256) -> Option<U256> {
    let r = x.low_u32() & 31;
    if r == 0 {
        Some(x)
    } else {
        x.checked_add(U256::from(32 - r))
    }
}

use crate::error::ExitError;
use primitive_types::{H256, U256};

/// Convert a `U256` into a big-endian `H256` word.
#[inline]
pub fn u256_to_h256(u: U256) -> H256 {
    let mut buf = [0u8; 32];
    u.to_big_endian(&mut buf);
    H256(buf)
}

/// Convert a `U256` into a `usize`, failing with `ExitError::OutOfOffset`
/// if it does not fit -- used whenever a stack value is about to be used
/// as a memory offset or length.
#[inline]
pub fn as_usize_or_fail(value: U256) -> Result<usize, ExitError> {
    if value > U256::from(usize::max_value()) {
        return Err(ExitError::OutOfOffset);
    }

    Ok(value.as_usize())
}

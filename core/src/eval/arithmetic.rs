use super::Control;
use super::macros::*;
use core::convert::TryFrom;
use primitive_types::U256;

#[inline]
pub fn add(machine: &mut super::super::Machine) -> Control {
    op2_u256_tuple!(machine, overflowing_add)
}

#[inline]
pub fn sub(machine: &mut super::super::Machine) -> Control {
    op2_u256_tuple!(machine, overflowing_sub)
}

#[inline]
pub fn mul(machine: &mut super::super::Machine) -> Control {
    op2_u256_tuple!(machine, overflowing_mul)
}

#[inline]
pub fn div(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);
    let ret = if op2.is_zero() { U256::zero() } else { op1 / op2 };
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn sdiv(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);
    let ret = i256_div(op1, op2);
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn rem(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);
    let ret = if op2.is_zero() { U256::zero() } else { op1 % op2 };
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn srem(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);
    let ret = i256_mod(op1, op2);
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn addmod(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2, op3);
    let ret = if op3.is_zero() {
        U256::zero()
    } else {
        let op1 = U512::from(op1);
        let op2 = U512::from(op2);
        let op3 = U512::from(op3);
        let v = (op1 + op2) % op3;
        U256::try_from(v).unwrap_or_default()
    };
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn mulmod(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2, op3);
    let ret = if op3.is_zero() {
        U256::zero()
    } else {
        let op1 = U512::from(op1);
        let op2 = U512::from(op2);
        let op3 = U512::from(op3);
        let v = (op1 * op2) % op3;
        U256::try_from(v).unwrap_or_default()
    };
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn exp(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);
    let mut ret = U256::one();

    let mut base = op1;
    let mut power = op2;

    while power != U256::zero() {
        if power & U256::one() != U256::zero() {
            ret = ret.overflowing_mul(base).0;
        }
        power >>= 1;
        base = base.overflowing_mul(base).0;
    }

    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn signextend(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);

    let ret = if op1 > U256::from(32) {
        op2
    } else {
        let bit_index = (8 * op1.low_u32() + 7) as usize;
        let bit = op2.bit(bit_index);
        let mask = (U256::one() << bit_index) - U256::one();
        if bit {
            op2 | !mask
        } else {
            op2 & mask
        }
    };

    push_u256!(machine, ret);
    Control::Continue(1)
}

#[derive(Clone, Copy, Eq, PartialEq)]
pub(crate) enum Sign {
    Plus,
    Minus,
    Zero,
}

pub(crate) fn i256_sign(value: U256) -> Sign {
    if value.is_zero() {
        Sign::Zero
    } else if value.bit(255) {
        Sign::Minus
    } else {
        Sign::Plus
    }
}

fn two_compl(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: U256) -> U256 {
    if i256_sign(value) == Sign::Minus {
        two_compl(value)
    } else {
        value
    }
}

// MIN_NEGATIVE_VALUE / -1 overflows in two's complement; the yellow paper
// defines the result to wrap back around to MIN_NEGATIVE_VALUE.
const MIN_NEGATIVE_VALUE: U256 = U256([0, 0, 0, 0x8000_0000_0000_0000]);

fn i256_div(op1: U256, op2: U256) -> U256 {
    if op2.is_zero() {
        return U256::zero();
    }

    if op1 == MIN_NEGATIVE_VALUE && op2 == U256::max_value() {
        return MIN_NEGATIVE_VALUE;
    }

    let s1 = i256_sign(op1);
    let s2 = i256_sign(op2);

    let a1 = abs(op1);
    let a2 = abs(op2);

    let d = a1 / a2;
    if s1 == s2 || d.is_zero() {
        d
    } else {
        two_compl(d)
    }
}

fn i256_mod(op1: U256, op2: U256) -> U256 {
    if op2.is_zero() {
        return U256::zero();
    }

    let s1 = i256_sign(op1);
    let a1 = abs(op1);
    let a2 = abs(op2);

    let r = a1 % a2;
    if r.is_zero() || s1 == Sign::Plus || s1 == Sign::Zero {
        r
    } else {
        two_compl(r)
    }
}

uint::construct_uint! {
    /// 512-bit scratch integer, used only to give `ADDMOD`/`MULMOD` headroom
    /// against intermediate overflow before reducing back down to a `U256`.
    pub(crate) struct U512(8);
}

impl From<U256> for U512 {
    fn from(v: U256) -> Self {
        let mut buf = [0u8; 64];
        v.to_big_endian(&mut buf[32..64]);
        U512::from_big_endian(&buf)
    }
}

impl core::convert::TryFrom<U512> for U256 {
    type Error = ();

    fn try_from(v: U512) -> Result<U256, Self::Error> {
        let mut buf = [0u8; 64];
        v.to_big_endian(&mut buf);
        if buf[0..32].iter().any(|&b| b != 0) {
            return Err(());
        }
        Ok(U256::from_big_endian(&buf[32..64]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdiv_min_by_neg_one_wraps() {
        assert_eq!(i256_div(MIN_NEGATIVE_VALUE, U256::max_value()), MIN_NEGATIVE_VALUE);
    }

    #[test]
    fn addmod_reduces_through_512_bits() {
        let max = U256::max_value();
        let three = U256::from(3);
        let op1 = U512::from(max);
        let op2 = U512::from(max);
        let op3 = U512::from(three);
        let v = (op1 + op2) % op3;
        let reduced = U256::try_from(v).unwrap();
        assert_eq!(reduced, (max % three + max % three) % three);
    }
}

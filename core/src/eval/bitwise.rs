use super::arithmetic::{i256_sign, Sign};
use super::macros::*;
use super::Control;
use core::ops::{BitAnd, BitOr, BitXor};
use primitive_types::U256;

#[inline]
pub fn lt(machine: &mut super::super::Machine) -> Control {
    op2_u256_bool_ref!(machine, lt)
}

#[inline]
pub fn gt(machine: &mut super::super::Machine) -> Control {
    op2_u256_bool_ref!(machine, gt)
}

#[inline]
pub fn slt(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);
    let ret = match (i256_sign(op1), i256_sign(op2)) {
        (Sign::Minus, s) if s != Sign::Minus => true,
        (s, Sign::Minus) if s != Sign::Minus => false,
        _ => op1 < op2,
    };
    push_u256!(machine, if ret { U256::one() } else { U256::zero() });
    Control::Continue(1)
}

#[inline]
pub fn sgt(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);
    let ret = match (i256_sign(op1), i256_sign(op2)) {
        (Sign::Minus, s) if s != Sign::Minus => false,
        (s, Sign::Minus) if s != Sign::Minus => true,
        _ => op1 > op2,
    };
    push_u256!(machine, if ret { U256::one() } else { U256::zero() });
    Control::Continue(1)
}

#[inline]
pub fn eq(machine: &mut super::super::Machine) -> Control {
    op2_u256_bool_ref!(machine, eq)
}

#[inline]
pub fn iszero(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1);
    let ret = if op1.is_zero() { U256::one() } else { U256::zero() };
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn and(machine: &mut super::super::Machine) -> Control {
    op2_u256!(machine, bitand)
}

#[inline]
pub fn or(machine: &mut super::super::Machine) -> Control {
    op2_u256!(machine, bitor)
}

#[inline]
pub fn xor(machine: &mut super::super::Machine) -> Control {
    op2_u256!(machine, bitxor)
}

#[inline]
pub fn not(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1);
    let ret = !op1;
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn byte(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, op1, op2);
    let mut ret = U256::zero();

    for i in 0..256 {
        if i < 8 && op1 < U256::from(32) {
            let o: usize = op1.as_usize();
            let t = 255 - (7 - i + 8 * o);
            let bit_mask = U256::one() << t;
            let value = (op2 & bit_mask) >> t;
            ret = ret.overflowing_add(value.overflowing_shl(i as u32).0).0;
        }
    }

    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn shl(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, shift, value);
    let ret = if value.is_zero() || shift >= U256::from(256) {
        U256::zero()
    } else {
        value << shift.as_usize()
    };
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn shr(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, shift, value);
    let ret = if value.is_zero() || shift >= U256::from(256) {
        U256::zero()
    } else {
        value >> shift.as_usize()
    };
    push_u256!(machine, ret);
    Control::Continue(1)
}

#[inline]
pub fn sar(machine: &mut super::super::Machine) -> Control {
    pop_u256!(machine, shift, value);

    let is_negative = i256_sign(value) == Sign::Minus;
    let ret = if shift >= U256::from(256) {
        if is_negative {
            U256::max_value()
        } else {
            U256::zero()
        }
    } else {
        let shift = shift.as_usize();
        if is_negative {
            let shifted = if shift == 0 {
                U256::zero()
            } else {
                (!U256::zero()) << (256 - shift)
            };
            (value >> shift) | shifted
        } else {
            value >> shift
        }
    };

    push_u256!(machine, ret);
    Control::Continue(1)
}

#[cfg(test)]
mod tests {
    use super::super::super::Machine;
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;

    fn machine() -> Machine {
        Machine::new(Rc::new(Vec::new()), Rc::new(Vec::new()), 1024, usize::max_value())
    }

    #[test]
    fn sar_of_negative_one_by_anything_is_negative_one() {
        let mut m = machine();
        m.stack_mut().push(crate::utils::u256_to_h256(U256::max_value())).unwrap();
        m.stack_mut().push(crate::utils::u256_to_h256(U256::from(5))).unwrap();
        let _ = sar(&mut m);
        let top = m.stack().peek(0).unwrap();
        assert_eq!(top, crate::utils::u256_to_h256(U256::max_value()));
    }
}

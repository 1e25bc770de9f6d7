use super::macros::*;
use super::Control;
use crate::error::ExitError;
use crate::{ExitSucceed, Machine};
use crate::utils::as_usize_or_fail;
use primitive_types::{H256, U256};

#[inline]
pub fn codesize(machine: &mut Machine) -> Control {
    let size = U256::from(machine.code.len());
    push_u256!(machine, size);
    Control::Continue(1)
}

#[inline]
pub fn codecopy(machine: &mut Machine) -> Control {
    pop_u256!(machine, memory_offset, code_offset, len);

    if let Err(e) = machine.memory.resize_offset(memory_offset, len) {
        return Control::Exit(e.into());
    }

    match machine
        .memory
        .copy_large(memory_offset, code_offset, len, &machine.code)
    {
        Ok(()) => Control::Continue(1),
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn calldataload(machine: &mut Machine) -> Control {
    pop_u256!(machine, index);

    let mut load = [0u8; 32];
    #[allow(clippy::needless_range_loop)]
    for i in 0..32 {
        if let Some(p) = index.checked_add(U256::from(i)) {
            if p <= U256::from(usize::max_value()) {
                let position = p.as_usize();
                if position < machine.data.len() {
                    load[i] = machine.data[position];
                }
            }
        }
    }

    push!(machine, H256::from(load));
    Control::Continue(1)
}

#[inline]
pub fn calldatasize(machine: &mut Machine) -> Control {
    let len = U256::from(machine.data.len());
    push_u256!(machine, len);
    Control::Continue(1)
}

#[inline]
pub fn calldatacopy(machine: &mut Machine) -> Control {
    pop_u256!(machine, memory_offset, data_offset, len);

    if let Err(e) = machine.memory.resize_offset(memory_offset, len) {
        return Control::Exit(e.into());
    }

    match machine
        .memory
        .copy_large(memory_offset, data_offset, len, &machine.data)
    {
        Ok(()) => Control::Continue(1),
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn pop(machine: &mut Machine) -> Control {
    pop!(machine, _val);
    Control::Continue(1)
}

#[inline]
pub fn mload(machine: &mut Machine) -> Control {
    pop_u256!(machine, index);
    if let Err(e) = machine.memory.resize_offset(index, U256::from(32)) {
        return Control::Exit(e.into());
    }
    let index = match as_usize_or_fail(index) {
        Ok(i) => i,
        Err(e) => return Control::Exit(e.into()),
    };
    let value = H256::from_slice(&machine.memory.get(index, 32));
    push!(machine, value);
    Control::Continue(1)
}

#[inline]
pub fn mstore(machine: &mut Machine) -> Control {
    pop_u256!(machine, index);
    pop!(machine, value);
    if let Err(e) = machine.memory.resize_offset(index, U256::from(32)) {
        return Control::Exit(e.into());
    }
    let index = match as_usize_or_fail(index) {
        Ok(i) => i,
        Err(e) => return Control::Exit(e.into()),
    };
    match machine.memory.set(index, &value[..], Some(32)) {
        Ok(()) => Control::Continue(1),
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn mstore8(machine: &mut Machine) -> Control {
    pop_u256!(machine, index);
    pop_u256!(machine, value);
    if let Err(e) = machine.memory.resize_offset(index, U256::from(1)) {
        return Control::Exit(e.into());
    }
    let index = match as_usize_or_fail(index) {
        Ok(i) => i,
        Err(e) => return Control::Exit(e.into()),
    };
    let value = (value.low_u32() & 0xff) as u8;
    match machine.memory.set(index, &[value], Some(1)) {
        Ok(()) => Control::Continue(1),
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn jump(machine: &mut Machine) -> Control {
    pop_u256!(machine, target);
    let target = match as_usize_or_fail(target) {
        Ok(t) => t,
        Err(e) => return Control::Exit(e.into()),
    };

    if machine.valids.is_valid(target) {
        Control::Jump(target)
    } else {
        Control::Exit(ExitError::InvalidJump.into())
    }
}

#[inline]
pub fn jumpi(machine: &mut Machine) -> Control {
    pop_u256!(machine, target);
    pop_u256!(machine, value);

    if value.is_zero() {
        Control::Continue(1)
    } else {
        let target = match as_usize_or_fail(target) {
            Ok(t) => t,
            Err(e) => return Control::Exit(e.into()),
        };

        if machine.valids.is_valid(target) {
            Control::Jump(target)
        } else {
            Control::Exit(ExitError::InvalidJump.into())
        }
    }
}

#[inline]
pub fn pc(machine: &mut Machine, position: usize) -> Control {
    push_u256!(machine, U256::from(position));
    Control::Continue(1)
}

#[inline]
pub fn msize(machine: &mut Machine) -> Control {
    push_u256!(machine, machine.memory.effective_len());
    Control::Continue(1)
}

#[inline]
pub fn push(machine: &mut Machine, n: u8, position: usize) -> Control {
    let n = n as usize;
    let end = position + 1 + n;
    let slice_end = core::cmp::min(end, machine.code.len());

    let mut val = [0u8; 32];
    let slice = &machine.code[(position + 1)..slice_end];
    val[(32 - n)..(32 - n + slice.len())].copy_from_slice(slice);

    push!(machine, H256(val));
    Control::Continue(1 + n)
}

#[inline]
pub fn dup(machine: &mut Machine, n: usize) -> Control {
    let value = match machine.stack().peek(n - 1) {
        Ok(v) => v,
        Err(e) => return Control::Exit(e.into()),
    };
    push!(machine, value);
    Control::Continue(1)
}

#[inline]
pub fn swap(machine: &mut Machine, n: usize) -> Control {
    let val1 = match machine.stack().peek(0) {
        Ok(v) => v,
        Err(e) => return Control::Exit(e.into()),
    };
    let val2 = match machine.stack().peek(n) {
        Ok(v) => v,
        Err(e) => return Control::Exit(e.into()),
    };
    if let Err(e) = machine.stack_mut().set(0, val2) {
        return Control::Exit(e.into());
    }
    if let Err(e) = machine.stack_mut().set(n, val1) {
        return Control::Exit(e.into());
    }
    Control::Continue(1)
}

#[inline]
pub fn ret(machine: &mut Machine) -> Control {
    pop_u256!(machine, start, len);
    if let Err(e) = machine.memory.resize_offset(start, len) {
        return Control::Exit(e.into());
    }
    machine.return_range = start..(start + len);
    Control::Exit(ExitSucceed::Returned.into())
}

#[inline]
pub fn revert(machine: &mut Machine) -> Control {
    pop_u256!(machine, start, len);
    if let Err(e) = machine.memory.resize_offset(start, len) {
        return Control::Exit(e.into());
    }
    machine.return_range = start..(start + len);
    Control::Exit(crate::error::ExitRevert::Reverted.into())
}

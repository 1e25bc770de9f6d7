use super::macros::*;
use super::Control;
use crate::{CallScheme, Context, CreateScheme, Handler, Runtime, Transfer};
use alloc::vec::Vec;
use evm_core::{Capture, ExitError, ExitReason, ExitSucceed};
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

#[inline]
pub fn sha3<H: Handler>(runtime: &mut Runtime<'_>) -> Control<H> {
    pop_u256!(runtime, offset, len);

    if let Err(e) = runtime.machine.memory_mut().resize_offset(offset, len) {
        return Control::Exit(e.into());
    }
    if offset > U256::from(usize::max_value()) || len > U256::from(usize::max_value()) {
        return Control::Exit(ExitError::OutOfOffset.into());
    }
    let data = runtime.machine.memory().get(offset.as_usize(), len.as_usize());

    let hash = H256::from_slice(Keccak256::digest(&data).as_slice());
    push!(runtime, hash);
    Control::Continue
}

#[inline]
pub fn selfdestruct<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    pop_h160!(runtime, target);

    match handler.mark_delete(runtime.context.address, target) {
        Ok(()) => Control::Exit(ExitSucceed::Suicided.into()),
        Err(e) => Control::Exit(e.into()),
    }
}

/// Read `len` bytes of memory at `offset` as call/create input data.
fn read_input(runtime: &mut Runtime<'_>, offset: U256, len: U256) -> Result<Vec<u8>, ExitError> {
    runtime.machine.memory_mut().resize_offset(offset, len)?;
    if offset > U256::from(usize::max_value()) || len > U256::from(usize::max_value()) {
        return Err(ExitError::OutOfOffset);
    }
    Ok(runtime.machine.memory().get(offset.as_usize(), len.as_usize()))
}

/// Target gas, as requested by the opcode's `gas` stack argument. A
/// request that overflows `u64` is treated as "forward everything",
/// leaving the actual 63/64-rule capping to the `Handler`.
fn target_gas(gas: U256) -> Option<u64> {
    if gas > U256::from(u64::max_value()) {
        None
    } else {
        Some(gas.as_u64())
    }
}

#[inline]
pub fn create<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H, is_create2: bool) -> Control<H> {
    pop_u256!(runtime, value);
    pop_u256!(runtime, code_offset, code_len);
    let salt = if is_create2 {
        pop!(runtime, salt);
        Some(salt)
    } else {
        None
    };

    let input = match read_input(runtime, code_offset, code_len) {
        Ok(i) => i,
        Err(e) => return Control::Exit(e.into()),
    };

    let scheme = match salt {
        Some(salt) => CreateScheme::Create2 {
            caller: runtime.context.address,
            code_hash: H256::from_slice(Keccak256::digest(&input).as_slice()),
            salt,
        },
        None => CreateScheme::Legacy {
            caller: runtime.context.address,
        },
    };

    create_inner(runtime, handler, scheme, value, input)
}

fn create_inner<H: Handler>(
    runtime: &mut Runtime<'_>,
    handler: &mut H,
    scheme: CreateScheme,
    value: U256,
    init_code: Vec<u8>,
) -> Control<H> {
    match handler.create(runtime.context.address, scheme, value, init_code, None) {
        Capture::Exit((reason, address, return_data)) => {
            match finish_create(runtime, reason, address, return_data) {
                Ok(()) => Control::Continue,
                Err(e) => Control::Exit(e),
            }
        }
        Capture::Trap(interrupt) => Control::CreateInterrupt(interrupt),
    }
}

pub(crate) fn finish_create(
    runtime: &mut Runtime<'_>,
    reason: ExitReason,
    address: Option<H160>,
    return_data: Vec<u8>,
) -> Result<(), ExitReason> {
    match reason {
        ExitReason::Succeed(_) => {
            runtime.return_data_buffer = Vec::new();
            let mut buf = [0u8; 32];
            if let Some(address) = address {
                buf[12..32].copy_from_slice(&address.0);
            }
            runtime
                .machine
                .stack_mut()
                .push(H256(buf))
                .map_err(|e| e.into())
        }
        ExitReason::Revert(_) => {
            runtime.return_data_buffer = return_data;
            runtime
                .machine
                .stack_mut()
                .push(H256::zero())
                .map_err(|e| e.into())
        }
        ExitReason::Error(_) => {
            runtime.return_data_buffer = Vec::new();
            runtime
                .machine
                .stack_mut()
                .push(H256::zero())
                .map_err(|e| e.into())
        }
        ExitReason::Fatal(e) => Err(e.into()),
    }
}

#[inline]
pub fn call<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H, scheme: CallScheme) -> Control<H> {
    pop_u256!(runtime, gas);
    pop_h160!(runtime, code_address);

    let value = match scheme {
        CallScheme::Call | CallScheme::CallCode => {
            pop_u256!(runtime, value);
            value
        }
        CallScheme::DelegateCall | CallScheme::StaticCall => U256::zero(),
    };

    pop_u256!(runtime, in_offset, in_len, out_offset, out_len);

    let input = match read_input(runtime, in_offset, in_len) {
        Ok(i) => i,
        Err(e) => return Control::Exit(e.into()),
    };
    if let Err(e) = runtime.machine.memory_mut().resize_offset(out_offset, out_len) {
        return Control::Exit(e.into());
    }

    let context = match scheme {
        CallScheme::Call => Context {
            address: code_address,
            caller: runtime.context.address,
            apparent_value: value,
        },
        CallScheme::CallCode => Context {
            address: runtime.context.address,
            caller: runtime.context.address,
            apparent_value: value,
        },
        CallScheme::DelegateCall => runtime.context.clone(),
        CallScheme::StaticCall => Context {
            address: code_address,
            caller: runtime.context.address,
            apparent_value: U256::zero(),
        },
    };

    let transfer = match scheme {
        CallScheme::Call | CallScheme::CallCode => Some(Transfer {
            source: runtime.context.address,
            target: code_address,
            value,
        }),
        CallScheme::DelegateCall | CallScheme::StaticCall => None,
    };

    let is_static = scheme == CallScheme::StaticCall;

    match handler.call(
        code_address,
        transfer,
        input,
        target_gas(gas),
        is_static,
        context,
    ) {
        Capture::Exit((reason, return_data)) => {
            match finish_call(runtime, out_offset, out_len, reason, return_data) {
                Ok(()) => Control::Continue,
                Err(e) => Control::Exit(e),
            }
        }
        Capture::Trap(interrupt) => Control::CallInterrupt(interrupt, out_offset, out_len),
    }
}

fn write_call_output(
    runtime: &mut Runtime<'_>,
    out_offset: U256,
    out_len: U256,
    data: &[u8],
) -> Result<(), ExitReason> {
    if out_offset > U256::from(usize::max_value()) || out_len > U256::from(usize::max_value()) {
        return Ok(());
    }
    let out_len = out_len.as_usize();
    runtime
        .machine
        .memory_mut()
        .set(out_offset.as_usize(), data, Some(core::cmp::min(data.len(), out_len)))
        .map_err(|e: ExitError| e.into())
}

pub(crate) fn finish_call(
    runtime: &mut Runtime<'_>,
    out_offset: U256,
    out_len: U256,
    reason: ExitReason,
    return_data: Vec<u8>,
) -> Result<(), ExitReason> {
    match reason {
        ExitReason::Succeed(_) => {
            write_call_output(runtime, out_offset, out_len, &return_data)?;
            runtime.return_data_buffer = return_data;
            runtime
                .machine
                .stack_mut()
                .push(H256::from_low_u64_be(1))
                .map_err(|e| e.into())
        }
        ExitReason::Revert(_) => {
            write_call_output(runtime, out_offset, out_len, &return_data)?;
            runtime.return_data_buffer = return_data;
            runtime
                .machine
                .stack_mut()
                .push(H256::zero())
                .map_err(|e| e.into())
        }
        ExitReason::Error(_) => {
            runtime.return_data_buffer = Vec::new();
            runtime
                .machine
                .stack_mut()
                .push(H256::zero())
                .map_err(|e| e.into())
        }
        ExitReason::Fatal(e) => Err(e.into()),
    }
}

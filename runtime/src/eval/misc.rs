use super::macros::*;
use super::Control;
use crate::{Handler, Runtime};
use alloc::vec::Vec;
use evm_core::ExitError;
use primitive_types::{H256, U256};

#[inline]
pub fn address<H: Handler>(runtime: &mut Runtime<'_>) -> Control<H> {
    push_h160!(runtime, runtime.context.address);
    Control::Continue
}

#[inline]
pub fn balance<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    pop_h160!(runtime, address);
    push_u256!(runtime, handler.balance(address));
    Control::Continue
}

#[inline]
pub fn origin<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_h160!(runtime, handler.origin());
    Control::Continue
}

#[inline]
pub fn caller<H: Handler>(runtime: &mut Runtime<'_>) -> Control<H> {
    push_h160!(runtime, runtime.context.caller);
    Control::Continue
}

#[inline]
pub fn callvalue<H: Handler>(runtime: &mut Runtime<'_>) -> Control<H> {
    push_u256!(runtime, runtime.context.apparent_value);
    Control::Continue
}

#[inline]
pub fn gasprice<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.gas_price());
    Control::Continue
}

#[inline]
pub fn extcodesize<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    pop_h160!(runtime, address);
    push_u256!(runtime, handler.code_size(address));
    Control::Continue
}

#[inline]
pub fn extcodehash<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    pop_h160!(runtime, address);
    push!(runtime, handler.code_hash(address));
    Control::Continue
}

#[inline]
pub fn extcodecopy<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    pop_h160!(runtime, address);
    pop_u256!(runtime, memory_offset, code_offset, len);

    if let Err(e) = runtime.machine.memory_mut().resize_offset(memory_offset, len) {
        return Control::Exit(e.into());
    }

    let code = handler.code(address);
    match runtime
        .machine
        .memory_mut()
        .copy_large(memory_offset, code_offset, len, &code)
    {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn returndatasize<H: Handler>(runtime: &mut Runtime<'_>) -> Control<H> {
    let size = U256::from(runtime.return_data_buffer.len());
    push_u256!(runtime, size);
    Control::Continue
}

#[inline]
pub fn returndatacopy<H: Handler>(runtime: &mut Runtime<'_>) -> Control<H> {
    pop_u256!(runtime, memory_offset, data_offset, len);

    if let Err(e) = runtime.machine.memory_mut().resize_offset(memory_offset, len) {
        return Control::Exit(e.into());
    }

    if data_offset
        .checked_add(len)
        .map(|end| end > U256::from(runtime.return_data_buffer.len()))
        .unwrap_or(true)
    {
        return Control::Exit(ExitError::OutOfOffset.into());
    }

    match runtime.machine.memory_mut().copy_large(
        memory_offset,
        data_offset,
        len,
        &runtime.return_data_buffer,
    ) {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn blockhash<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    pop_u256!(runtime, number);
    push!(runtime, handler.block_hash(number));
    Control::Continue
}

#[inline]
pub fn coinbase<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_h160!(runtime, handler.block_coinbase());
    Control::Continue
}

#[inline]
pub fn timestamp<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_timestamp());
    Control::Continue
}

#[inline]
pub fn number<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_number());
    Control::Continue
}

#[inline]
pub fn difficulty<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_difficulty());
    Control::Continue
}

#[inline]
pub fn gaslimit<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_gas_limit());
    Control::Continue
}

#[inline]
pub fn chainid<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    if !runtime.config.has_chain_id {
        return Control::Exit(ExitError::OpcodeNotFound.into());
    }
    push_u256!(runtime, handler.chain_id());
    Control::Continue
}

#[inline]
pub fn selfbalance<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    if !runtime.config.has_self_balance {
        return Control::Exit(ExitError::OpcodeNotFound.into());
    }
    let balance = handler.balance(runtime.context.address);
    push_u256!(runtime, balance);
    Control::Continue
}

#[inline]
pub fn basefee<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_base_fee_per_gas());
    Control::Continue
}

#[inline]
pub fn sload<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    pop!(runtime, index);
    let value = handler.storage(runtime.context.address, index);
    push!(runtime, value);
    Control::Continue
}

#[inline]
pub fn sstore<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    pop!(runtime, index);
    pop!(runtime, value);
    match handler.set_storage(runtime.context.address, index, value) {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn gas<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.gas_left());
    Control::Continue
}

#[inline]
pub fn log<H: Handler>(runtime: &mut Runtime<'_>, handler: &mut H, n: u8) -> Control<H> {
    pop_u256!(runtime, offset, len);

    let mut topics: Vec<H256> = Vec::with_capacity(n as usize);
    for _ in 0..n {
        pop!(runtime, topic);
        topics.push(topic);
    }

    if let Err(e) = runtime.machine.memory_mut().resize_offset(offset, len) {
        return Control::Exit(e.into());
    }
    if offset > U256::from(usize::max_value()) || len > U256::from(usize::max_value()) {
        return Control::Exit(ExitError::OutOfOffset.into());
    }
    let data = runtime.machine.memory().get(offset.as_usize(), len.as_usize());

    match handler.log(runtime.context.address, topics, data) {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

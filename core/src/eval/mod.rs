mod arithmetic;
mod bitwise;
pub(crate) mod macros;
mod misc;

use crate::error::{ExitError, ExitReason, ExitSucceed};
use crate::opcode::Opcode;
use crate::Machine;

/// Control flow returned from evaluating a single opcode.
pub enum Control {
    /// Continue execution, advancing the program counter by the given
    /// number of bytes (the opcode width, including immediates).
    Continue(usize),
    /// Continue execution at the given absolute program counter.
    Jump(usize),
    /// Stop execution of the current frame.
    Exit(ExitReason),
    /// Defer to the runtime layer: this opcode needs the `Handler` (host)
    /// surface that `evm-core` deliberately has no knowledge of.
    Trap(Opcode),
}

/// Evaluate a single opcode against the machine's internal state
/// (stack, memory, code, calldata). Opcodes that require access to the
/// world state or the call context (balances, storage, logs, nested
/// calls, environment data) are not evaluated here -- they come back as
/// `Control::Trap` for `evm-runtime` to resolve against a `Handler`.
#[allow(clippy::too_many_lines)]
pub fn eval(state: &mut Machine, opcode: Opcode, position: usize) -> Control {
    match opcode {
        Opcode::STOP => Control::Exit(ExitSucceed::Stopped.into()),
        Opcode::ADD => arithmetic::add(state),
        Opcode::MUL => arithmetic::mul(state),
        Opcode::SUB => arithmetic::sub(state),
        Opcode::DIV => arithmetic::div(state),
        Opcode::SDIV => arithmetic::sdiv(state),
        Opcode::MOD => arithmetic::rem(state),
        Opcode::SMOD => arithmetic::srem(state),
        Opcode::ADDMOD => arithmetic::addmod(state),
        Opcode::MULMOD => arithmetic::mulmod(state),
        Opcode::EXP => arithmetic::exp(state),
        Opcode::SIGNEXTEND => arithmetic::signextend(state),

        Opcode::LT => bitwise::lt(state),
        Opcode::GT => bitwise::gt(state),
        Opcode::SLT => bitwise::slt(state),
        Opcode::SGT => bitwise::sgt(state),
        Opcode::EQ => bitwise::eq(state),
        Opcode::ISZERO => bitwise::iszero(state),
        Opcode::AND => bitwise::and(state),
        Opcode::OR => bitwise::or(state),
        Opcode::XOR => bitwise::xor(state),
        Opcode::NOT => bitwise::not(state),
        Opcode::BYTE => bitwise::byte(state),
        Opcode::SHL => bitwise::shl(state),
        Opcode::SHR => bitwise::shr(state),
        Opcode::SAR => bitwise::sar(state),

        Opcode::CODESIZE => misc::codesize(state),
        Opcode::CODECOPY => misc::codecopy(state),
        Opcode::CALLDATALOAD => misc::calldataload(state),
        Opcode::CALLDATASIZE => misc::calldatasize(state),
        Opcode::CALLDATACOPY => misc::calldatacopy(state),

        Opcode::POP => misc::pop(state),
        Opcode::MLOAD => misc::mload(state),
        Opcode::MSTORE => misc::mstore(state),
        Opcode::MSTORE8 => misc::mstore8(state),
        Opcode::JUMP => misc::jump(state),
        Opcode::JUMPI => misc::jumpi(state),
        Opcode::PC => misc::pc(state, position),
        Opcode::MSIZE => misc::msize(state),
        Opcode::JUMPDEST => Control::Continue(1),

        Opcode(n @ 0x60..=0x7f) => misc::push(state, n - Opcode::PUSH1.as_u8() + 1, position),
        Opcode(n @ 0x80..=0x8f) => misc::dup(state, (n - Opcode::DUP1.as_u8()) as usize + 1),
        Opcode(n @ 0x90..=0x9f) => misc::swap(state, (n - Opcode::SWAP1.as_u8()) as usize + 1),

        Opcode::RETURN => misc::ret(state),
        Opcode::REVERT => misc::revert(state),
        Opcode::INVALID => Control::Exit(ExitError::DesignatedInvalid.into()),

        // Everything touching world state, the call context, environment
        // data, logs, or nested calls/creates is external.
        _ => Control::Trap(opcode),
    }
}

pub(crate) mod macros;
mod misc;
pub(crate) mod system;

use crate::Handler;
use crate::Runtime;
use evm_core::{ExitError, ExitReason, Opcode};
use primitive_types::U256;

/// Control flow returned from evaluating a single "external" opcode --
/// one that `evm-core` could not resolve on its own and trapped out to
/// the `Runtime`.
pub enum Control<H: Handler> {
    /// Continue execution; the opcode has fully resolved synchronously.
    Continue,
    /// A `CALL`-family opcode could not complete synchronously; the
    /// caller must drive the interrupt and feed back a `Capture::Exit`
    /// through `ResolveCall`. Carries the output memory region the
    /// opcode requested, needed once `ResolveCall::finish` is called.
    CallInterrupt(H::CallInterrupt, U256, U256),
    /// A `CREATE`-family opcode could not complete synchronously.
    CreateInterrupt(H::CreateInterrupt),
    /// Stop execution of the current frame.
    Exit(ExitReason),
}

pub(crate) fn eval<H: Handler>(
    runtime: &mut Runtime<'_>,
    opcode: Opcode,
    handler: &mut H,
) -> Control<H> {
    match opcode {
        Opcode::SHA3 => system::sha3(runtime),

        Opcode::ADDRESS => misc::address(runtime),
        Opcode::BALANCE => misc::balance(runtime, handler),
        Opcode::ORIGIN => misc::origin(runtime, handler),
        Opcode::CALLER => misc::caller(runtime),
        Opcode::CALLVALUE => misc::callvalue(runtime),
        Opcode::GASPRICE => misc::gasprice(runtime, handler),
        Opcode::EXTCODESIZE => misc::extcodesize(runtime, handler),
        Opcode::EXTCODECOPY => misc::extcodecopy(runtime, handler),
        Opcode::EXTCODEHASH => {
            if !runtime.config().has_ext_code_hash {
                return Control::Exit(ExitError::OpcodeNotFound.into());
            }
            misc::extcodehash(runtime, handler)
        }
        Opcode::RETURNDATASIZE => misc::returndatasize(runtime),
        Opcode::RETURNDATACOPY => misc::returndatacopy(runtime),

        Opcode::BLOCKHASH => misc::blockhash(runtime, handler),
        Opcode::COINBASE => misc::coinbase(runtime, handler),
        Opcode::TIMESTAMP => misc::timestamp(runtime, handler),
        Opcode::NUMBER => misc::number(runtime, handler),
        Opcode::DIFFICULTY => misc::difficulty(runtime, handler),
        Opcode::GASLIMIT => misc::gaslimit(runtime, handler),
        Opcode::CHAINID => misc::chainid(runtime, handler),
        Opcode::SELFBALANCE => misc::selfbalance(runtime, handler),
        Opcode::BASEFEE => misc::basefee(runtime, handler),

        Opcode::SLOAD => misc::sload(runtime, handler),
        Opcode::SSTORE => misc::sstore(runtime, handler),
        Opcode::GAS => misc::gas(runtime, handler),

        Opcode(n @ 0xa0..=0xa4) => misc::log(runtime, handler, n - Opcode::LOG0.as_u8()),

        Opcode::CREATE => system::create(runtime, handler, false),
        Opcode::CREATE2 => {
            if !runtime.config().has_create2 {
                return Control::Exit(ExitError::OpcodeNotFound.into());
            }
            system::create(runtime, handler, true)
        }
        Opcode::CALL => system::call(runtime, handler, crate::CallScheme::Call),
        Opcode::CALLCODE => system::call(runtime, handler, crate::CallScheme::CallCode),
        Opcode::DELEGATECALL => {
            if !runtime.config().has_delegate_call {
                return Control::Exit(ExitError::OpcodeNotFound.into());
            }
            system::call(runtime, handler, crate::CallScheme::DelegateCall)
        }
        Opcode::STATICCALL => {
            if !runtime.config().has_static_call {
                return Control::Exit(ExitError::OpcodeNotFound.into());
            }
            system::call(runtime, handler, crate::CallScheme::StaticCall)
        }

        Opcode::SUICIDE => system::selfdestruct(runtime, handler),

        _ => Control::Exit(ExitError::OpcodeNotFound.into()),
    }
}

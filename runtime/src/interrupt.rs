use crate::{Context, Handler, Runtime};
use alloc::vec::Vec;
use evm_core::ExitReason;
use primitive_types::{H160, U256};

/// A request from `Runtime::run` to the caller, yielded when `Handler::call`
/// or `Handler::create` could not complete synchronously (the common case
/// when the caller itself wants to drive the child `Runtime` rather than
/// have the `Handler` do it internally).
pub enum Resolve<'a, 'config, H: Handler> {
    /// Resolve a call interrupt.
    Call(H::CallInterrupt, ResolveCall<'a, 'config, H>),
    /// Resolve a create interrupt.
    Create(H::CreateInterrupt, ResolveCreate<'a, 'config, H>),
}

/// Finish resolving a call interrupt, feeding the result of the child
/// execution back into the suspended parent `Runtime`.
pub struct ResolveCall<'a, 'config, H: Handler> {
    runtime: &'a mut Runtime<'config>,
    out_offset: U256,
    out_len: U256,
    _marker: core::marker::PhantomData<H>,
}

impl<'a, 'config, H: Handler> ResolveCall<'a, 'config, H> {
    pub(crate) fn new(runtime: &'a mut Runtime<'config>, out_offset: U256, out_len: U256) -> Self {
        Self {
            runtime,
            out_offset,
            out_len,
            _marker: core::marker::PhantomData,
        }
    }

    /// Feed the call's outcome back into the parent frame's stack, pushing
    /// `1`/`0` and recording return data as the `Runtime` contract requires.
    pub fn finish(self, reason: ExitReason, return_data: Vec<u8>) -> Result<(), ExitReason> {
        crate::eval::system::finish_call(self.runtime, self.out_offset, self.out_len, reason, return_data)
    }

    /// The context the interrupted call was made under.
    pub fn context(&self) -> &Context {
        self.runtime.context()
    }
}

/// Finish resolving a create interrupt, feeding the result of the child
/// execution back into the suspended parent `Runtime`.
pub struct ResolveCreate<'a, 'config, H: Handler> {
    runtime: &'a mut Runtime<'config>,
    _marker: core::marker::PhantomData<H>,
}

impl<'a, 'config, H: Handler> ResolveCreate<'a, 'config, H> {
    pub(crate) fn new(runtime: &'a mut Runtime<'config>) -> Self {
        Self {
            runtime,
            _marker: core::marker::PhantomData,
        }
    }

    /// Feed the create's outcome back into the parent frame's stack,
    /// pushing the new address (or `0` on failure) and recording return
    /// data as the `Runtime` contract requires.
    pub fn finish(
        self,
        reason: ExitReason,
        address: Option<H160>,
        return_data: Vec<u8>,
    ) -> Result<(), ExitReason> {
        crate::eval::system::finish_create(self.runtime, reason, address, return_data)
    }

    /// The context the interrupted create was made under.
    pub fn context(&self) -> &Context {
        self.runtime.context()
    }
}

macro_rules! pop {
    ( $runtime:expr, $( $x:ident ),* ) => (
        $(
            let $x = match $runtime.machine.stack_mut().pop() {
                Ok(value) => value,
                Err(e) => return Control::Exit(e.into()),
            };
        )*
    );
}

macro_rules! push {
    ( $runtime:expr, $( $x:expr ),* ) => (
        $(
            match $runtime.machine.stack_mut().push($x) {
                Ok(()) => (),
                Err(e) => return Control::Exit(e.into()),
            }
        )*
    )
}

macro_rules! pop_u256 {
    ( $runtime:expr, $( $x:ident ),* ) => (
        $(
            let $x = match $runtime.machine.stack_mut().pop() {
                Ok(value) => primitive_types::U256::from_big_endian(&value[..]),
                Err(e) => return Control::Exit(e.into()),
            };
        )*
    );
}

macro_rules! push_u256 {
    ( $runtime:expr, $( $x:expr ),* ) => (
        $(
            let mut buf = [0u8; 32];
            ($x).to_big_endian(&mut buf);
            match $runtime.machine.stack_mut().push(primitive_types::H256(buf)) {
                Ok(()) => (),
                Err(e) => return Control::Exit(e.into()),
            }
        )*
    )
}

macro_rules! pop_h160 {
    ( $runtime:expr, $( $x:ident ),* ) => (
        $(
            let $x = match $runtime.machine.stack_mut().pop() {
                Ok(value) => primitive_types::H160::from_slice(&value[12..32]),
                Err(e) => return Control::Exit(e.into()),
            };
        )*
    );
}

macro_rules! push_h160 {
    ( $runtime:expr, $x:expr ) => {{
        let mut buf = [0u8; 32];
        buf[12..32].copy_from_slice(&($x).0);
        match $runtime.machine.stack_mut().push(primitive_types::H256(buf)) {
            Ok(()) => (),
            Err(e) => return Control::Exit(e.into()),
        }
    }};
}

pub(crate) use {pop, pop_h160, pop_u256, push, push_h160, push_u256};

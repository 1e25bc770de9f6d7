macro_rules! pop {
    ( $machine:expr, $( $x:ident ),* ) => (
        $(
            let $x = match $machine.stack_mut().pop() {
                Ok(value) => value,
                Err(e) => return Control::Exit(e.into()),
            };
        )*
    );
}

macro_rules! push {
    ( $machine:expr, $( $x:expr ),* ) => (
        $(
            match $machine.stack_mut().push($x) {
                Ok(()) => (),
                Err(e) => return Control::Exit(e.into()),
            }
        )*
    )
}

macro_rules! pop_u256 {
    ( $machine:expr, $( $x:ident ),* ) => (
        $(
            let $x = match $machine.stack_mut().pop() {
                Ok(value) => primitive_types::U256::from_big_endian(&value[..]),
                Err(e) => return Control::Exit(e.into()),
            };
        )*
    );
}

macro_rules! push_u256 {
    ( $machine:expr, $( $x:expr ),* ) => (
        $(
            match $machine.stack_mut().push(crate::utils::u256_to_h256($x)) {
                Ok(()) => (),
                Err(e) => return Control::Exit(e.into()),
            }
        )*
    )
}

macro_rules! op1_u256_fn {
    ( $machine:expr, $op:path ) => {{
        pop_u256!($machine, op1);
        let ret = $op(op1);
        push_u256!($machine, ret);

        Control::Continue(1)
    }};
}

macro_rules! op2_u256_bool_ref {
    ( $machine:expr, $op:ident ) => {{
        pop_u256!($machine, op1, op2);
        let ret = op1.$op(&op2);
        push_u256!($machine, if ret { primitive_types::U256::one() } else { primitive_types::U256::zero() });

        Control::Continue(1)
    }};
}

macro_rules! op2_u256 {
    ( $machine:expr, $op:ident ) => {{
        pop_u256!($machine, op1, op2);
        let ret = op1.$op(op2);
        push_u256!($machine, ret);

        Control::Continue(1)
    }};
}

macro_rules! op2_u256_tuple {
    ( $machine:expr, $op:ident ) => {{
        pop_u256!($machine, op1, op2);
        let (ret, ..) = op1.$op(op2);
        push_u256!($machine, ret);

        Control::Continue(1)
    }};
}

pub(crate) use {
    op1_u256_fn, op2_u256, op2_u256_bool_ref, op2_u256_tuple, pop, pop_u256, push, push_u256,
};

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! end-to-end tests driving the dispatch loop over hand-assembled
//! prototypes, bypassing the binary loader entirely (its own round-trip is
//! covered in `lua_binary`'s unit tests).

use std::cell::RefCell;
use std::rc::Rc;

use lua_binary::{Constant, Prototype, UpvalueDesc};
use lua_types::instruction::Instruction;
use lua_types::opcode::Opcode;

use lua_runtime::upvalue::Upvalue;
use lua_runtime::{Closure, State, Table, Value};

fn leaf_prototype(
    num_params: u8,
    is_vararg: bool,
    max_stack_size: u8,
    code: Vec<Instruction>,
    constants: Vec<Constant>,
    upvalues: Vec<UpvalueDesc>,
    protos: Vec<Prototype>,
) -> Prototype {
    Prototype {
        source: b"test".to_vec(),
        line_defined: 0,
        last_line_defined: 0,
        num_params,
        is_vararg,
        max_stack_size,
        code,
        constants,
        upvalues,
        protos,
        line_info: Vec::new(),
        loc_vars: Vec::new(),
        upvalue_names: Vec::new(),
    }
}

fn env_upvalue() -> Rc<RefCell<Upvalue>> {
    let globals = Rc::new(RefCell::new(Table::new()));
    Rc::new(RefCell::new(Upvalue::Closed(Value::Table(globals))))
}

fn run(proto: Prototype, args: &[Value]) -> Vec<Value> {
    let _ = env_logger::try_init();
    let closure = Rc::new(Closure::new_lua(Rc::new(proto), vec![env_upvalue()]));
    let mut state = State::new();
    state.call(closure, args).expect("script ran to completion")
}

#[test]
fn sum_loop_accumulates_one_through_five() {
    let constants = vec![
        Constant::Integer(1), // K0: step / initial value
        Constant::Integer(5), // K1: limit
        Constant::Integer(0), // K2: sum initial value
    ];
    let code = vec![
        Instruction::encode_abx(Opcode::LOADK, 0, 0), // R0 = 1 (init)
        Instruction::encode_abx(Opcode::LOADK, 1, 1), // R1 = 5 (limit)
        Instruction::encode_abx(Opcode::LOADK, 2, 0), // R2 = 1 (step)
        Instruction::encode_abx(Opcode::LOADK, 4, 2), // R4 = 0 (sum)
        Instruction::encode_asbx(Opcode::FORPREP, 0, 1), // -> pc 6 (FORLOOP)
        Instruction::encode_abc(Opcode::ADD, 4, 4, 3), // sum += loop var
        Instruction::encode_asbx(Opcode::FORLOOP, 0, -2), // -> pc 5 if continuing
        Instruction::encode_abc(Opcode::RETURN, 4, 2, 0), // return sum
    ];
    let proto = leaf_prototype(0, false, 8, code, constants, vec![], vec![]);
    let results = run(proto, &[]);
    assert_eq!(results, vec![Value::Integer(15)]);
}

#[test]
fn mixed_integer_and_float_arithmetic_promotes_correctly() {
    // return 7 + 2.5 (integer + float => float), and 7 / 2 (always float)
    let constants = vec![Constant::Integer(7), Constant::Float(2.5), Constant::Integer(2)];
    let code = vec![
        Instruction::encode_abx(Opcode::LOADK, 0, 0),
        Instruction::encode_abx(Opcode::LOADK, 1, 1),
        Instruction::encode_abc(Opcode::ADD, 2, 0, 1),
        Instruction::encode_abx(Opcode::LOADK, 3, 2),
        Instruction::encode_abc(Opcode::DIV, 3, 0, 3),
        Instruction::encode_abc(Opcode::RETURN, 2, 3, 0),
    ];
    let proto = leaf_prototype(0, false, 8, code, constants, vec![], vec![]);
    let results = run(proto, &[]);
    assert_eq!(results, vec![Value::Float(9.5), Value::Float(3.5)]);
}

#[test]
fn string_concat_builds_expected_bytes() {
    let constants = vec![Constant::Str(b"foo".to_vec()), Constant::Str(b"bar".to_vec())];
    let code = vec![
        Instruction::encode_abx(Opcode::LOADK, 0, 0), // "foo"
        Instruction::encode_abx(Opcode::LOADK, 1, 1), // "bar"
        Instruction::encode_abc(Opcode::CONCAT, 2, 0, 1), // "foobar"
        Instruction::encode_abc(Opcode::RETURN, 2, 2, 0),
    ];
    let proto = leaf_prototype(0, false, 8, code, constants, vec![], vec![]);
    let results = run(proto, &[]);
    assert_eq!(results, vec![Value::str_from(b"foobar")]);
}

#[test]
fn eq_skips_the_following_instruction_on_mismatch() {
    // 5 == 7 is false; with A=1 ("expect equal") the mismatch makes EQ skip
    // the LOADK that would otherwise overwrite R0, so R0 keeps its sentinel.
    let constants = vec![Constant::Integer(5), Constant::Integer(7)];
    let code = vec![
        Instruction::encode_abx(Opcode::LOADK, 0, 0), // R0 = 5 (sentinel)
        Instruction::encode_abc(
            Opcode::EQ,
            1,
            0 | lua_types::instruction::BITRK,
            1 | lua_types::instruction::BITRK,
        ),
        Instruction::encode_abx(Opcode::LOADK, 0, 1), // skipped: would set R0 = 7
        Instruction::encode_abc(Opcode::RETURN, 0, 2, 0),
    ];
    let proto = leaf_prototype(0, false, 4, code, constants, vec![], vec![]);
    let results = run(proto, &[]);
    assert_eq!(results, vec![Value::Integer(5)]);
}

#[test]
fn closures_sharing_an_upvalue_observe_each_others_writes() {
    // increment(): upvalue 0 += 1, returns nothing
    let increment = leaf_prototype(
        0,
        false,
        2,
        vec![
            Instruction::encode_abc(Opcode::GETUPVAL, 0, 0, 0),
            Instruction::encode_abx(Opcode::LOADK, 1, 0),
            Instruction::encode_abc(Opcode::ADD, 0, 0, 1),
            Instruction::encode_abc(Opcode::SETUPVAL, 0, 0, 0),
            Instruction::encode_abc(Opcode::RETURN, 0, 1, 0),
        ],
        vec![Constant::Integer(1)],
        vec![UpvalueDesc { in_stack: true, index: 0 }],
        vec![],
    );
    // peek(): returns upvalue 0
    let peek = leaf_prototype(
        0,
        false,
        1,
        vec![
            Instruction::encode_abc(Opcode::GETUPVAL, 0, 0, 0),
            Instruction::encode_abc(Opcode::RETURN, 0, 2, 0),
        ],
        vec![],
        vec![UpvalueDesc { in_stack: true, index: 0 }],
        vec![],
    );

    // R0/R1/R2 are live locals (counter, increment, peek) for the whole
    // function, so each call copies its callee into the scratch register
    // R3 first rather than calling R1/R2 directly — calling in place would
    // hand the callee a frame based at R2/R3, aliasing a local that still
    // needs to survive the call, exactly as a real compiler avoids doing.
    let main = leaf_prototype(
        0,
        false,
        8,
        vec![
            Instruction::encode_abx(Opcode::LOADK, 0, 0), // R0 = 0 (shared counter)
            Instruction::encode_abx(Opcode::CLOSURE, 1, 0), // R1 = increment
            Instruction::encode_abx(Opcode::CLOSURE, 2, 1), // R2 = peek
            Instruction::encode_abc(Opcode::MOVE, 3, 1, 0),
            Instruction::encode_abc(Opcode::CALL, 3, 1, 1), // increment()
            Instruction::encode_abc(Opcode::MOVE, 3, 1, 0),
            Instruction::encode_abc(Opcode::CALL, 3, 1, 1), // increment()
            Instruction::encode_abc(Opcode::MOVE, 3, 2, 0),
            Instruction::encode_abc(Opcode::CALL, 3, 1, 2), // R3 = peek()
            Instruction::encode_abc(Opcode::RETURN, 3, 2, 0),
        ],
        vec![Constant::Integer(0)],
        vec![],
        vec![increment, peek],
    );

    let results = run(main, &[]);
    assert_eq!(results, vec![Value::Integer(2)]);
}

#[test]
fn variadic_function_forwards_extra_arguments() {
    // f(...) returns (select('#', ...) worth of values) all of its varargs
    let proto = leaf_prototype(
        0,
        true,
        4,
        vec![
            Instruction::encode_abc(Opcode::VARARG, 0, 0, 0), // R0.. = all varargs
            Instruction::encode_abc(Opcode::RETURN, 0, 0, 0), // return everything from R0
        ],
        vec![],
        vec![],
        vec![],
    );
    let args = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
    let results = run(proto, &args);
    assert_eq!(results, args);
}

#[test]
fn table_hybrid_array_and_hash_round_trip() {
    // t = {}; t[1]=10; t[2]=20; t["k"]="v"; return t[1], t[2], t["k"], #t
    let constants = vec![
        Constant::Integer(1),
        Constant::Integer(10),
        Constant::Integer(2),
        Constant::Integer(20),
        Constant::Str(b"k".to_vec()),
        Constant::Str(b"v".to_vec()),
    ];
    let code = vec![
        Instruction::encode_abc(Opcode::NEWTABLE, 0, 0, 0),
        Instruction::encode_abx(Opcode::LOADK, 1, 0), // 1
        Instruction::encode_abx(Opcode::LOADK, 2, 1), // 10
        Instruction::encode_abc(Opcode::SETTABLE, 0, 1, 2),
        Instruction::encode_abx(Opcode::LOADK, 1, 2), // 2
        Instruction::encode_abx(Opcode::LOADK, 2, 3), // 20
        Instruction::encode_abc(Opcode::SETTABLE, 0, 1, 2),
        Instruction::encode_abx(Opcode::LOADK, 1, 4), // "k"
        Instruction::encode_abx(Opcode::LOADK, 2, 5), // "v"
        Instruction::encode_abc(Opcode::SETTABLE, 0, 1, 2),
        Instruction::encode_abx(Opcode::LOADK, 1, 0), // 1
        Instruction::encode_abc(Opcode::GETTABLE, 2, 0, 1),
        Instruction::encode_abx(Opcode::LOADK, 1, 2), // 2
        Instruction::encode_abc(Opcode::GETTABLE, 3, 0, 1),
        Instruction::encode_abx(Opcode::LOADK, 1, 4), // "k"
        Instruction::encode_abc(Opcode::GETTABLE, 4, 0, 1),
        Instruction::encode_abc(Opcode::LEN, 5, 0, 0),
        Instruction::encode_abc(Opcode::RETURN, 2, 5, 0),
    ];
    let proto = leaf_prototype(0, false, 8, code, constants, vec![], vec![]);
    let results = run(proto, &[]);
    assert_eq!(
        results,
        vec![
            Value::Integer(10),
            Value::Integer(20),
            Value::str_from(b"v"),
            Value::Integer(2),
        ]
    );
}

#[test]
fn table_border_stops_at_an_internal_nil_hole() {
    // local t={10,20,30}; t[4]=40; t.x=99; t[2]=nil
    // return #t, t[1], t[2], t[3], t[4], t.x -> (1, 10, nil, 30, 40, 99)
    let constants = vec![
        Constant::Integer(1),
        Constant::Integer(10),
        Constant::Integer(2),
        Constant::Integer(20),
        Constant::Integer(3),
        Constant::Integer(30),
        Constant::Integer(4),
        Constant::Integer(40),
        Constant::Str(b"x".to_vec()),
        Constant::Integer(99),
    ];
    // R0 = t; R3..R8 = the six contiguous return values; R9/R10 = scratch
    // key/value registers reused across every SETTABLE/GETTABLE below.
    let code = vec![
        Instruction::encode_abc(Opcode::NEWTABLE, 0, 0, 0),
        Instruction::encode_abx(Opcode::LOADK, 9, 0), // key 1
        Instruction::encode_abx(Opcode::LOADK, 10, 1), // 10
        Instruction::encode_abc(Opcode::SETTABLE, 0, 9, 10),
        Instruction::encode_abx(Opcode::LOADK, 9, 2), // key 2
        Instruction::encode_abx(Opcode::LOADK, 10, 3), // 20
        Instruction::encode_abc(Opcode::SETTABLE, 0, 9, 10),
        Instruction::encode_abx(Opcode::LOADK, 9, 4), // key 3
        Instruction::encode_abx(Opcode::LOADK, 10, 5), // 30
        Instruction::encode_abc(Opcode::SETTABLE, 0, 9, 10),
        Instruction::encode_abx(Opcode::LOADK, 9, 6), // key 4
        Instruction::encode_abx(Opcode::LOADK, 10, 7), // 40
        Instruction::encode_abc(Opcode::SETTABLE, 0, 9, 10),
        Instruction::encode_abx(Opcode::LOADK, 9, 8), // key "x"
        Instruction::encode_abx(Opcode::LOADK, 10, 9), // 99
        Instruction::encode_abc(Opcode::SETTABLE, 0, 9, 10),
        Instruction::encode_abx(Opcode::LOADK, 9, 2), // key 2
        Instruction::encode_abc(Opcode::LOADNIL, 10, 0, 0),
        Instruction::encode_abc(Opcode::SETTABLE, 0, 9, 10), // t[2] = nil
        Instruction::encode_abc(Opcode::LEN, 3, 0, 0), // #t
        Instruction::encode_abx(Opcode::LOADK, 9, 0),
        Instruction::encode_abc(Opcode::GETTABLE, 4, 0, 9), // t[1]
        Instruction::encode_abx(Opcode::LOADK, 9, 2),
        Instruction::encode_abc(Opcode::GETTABLE, 5, 0, 9), // t[2]
        Instruction::encode_abx(Opcode::LOADK, 9, 4),
        Instruction::encode_abc(Opcode::GETTABLE, 6, 0, 9), // t[3]
        Instruction::encode_abx(Opcode::LOADK, 9, 6),
        Instruction::encode_abc(Opcode::GETTABLE, 7, 0, 9), // t[4]
        Instruction::encode_abx(Opcode::LOADK, 9, 8),
        Instruction::encode_abc(Opcode::GETTABLE, 8, 0, 9), // t.x
        Instruction::encode_abc(Opcode::RETURN, 3, 7, 0),
    ];
    let proto = leaf_prototype(0, false, 12, code, constants, vec![], vec![]);
    let results = run(proto, &[]);
    assert_eq!(
        results,
        vec![
            Value::Integer(1),
            Value::Integer(10),
            Value::Nil,
            Value::Integer(30),
            Value::Integer(40),
            Value::Integer(99),
        ]
    );
}

#[test]
fn calling_a_non_callable_value_is_a_runtime_error() {
    let code = vec![
        Instruction::encode_abc(Opcode::LOADBOOL, 0, 1, 0),
        Instruction::encode_abc(Opcode::CALL, 0, 1, 1),
        Instruction::encode_abc(Opcode::RETURN, 0, 1, 0),
    ];
    let proto = leaf_prototype(0, false, 4, code, vec![], vec![], vec![]);
    let closure = Rc::new(Closure::new_lua(Rc::new(proto), vec![env_upvalue()]));
    let mut state = State::new();
    assert!(state.call(closure, &[]).is_err());
}

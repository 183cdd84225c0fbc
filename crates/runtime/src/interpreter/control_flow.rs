// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! jumps, comparisons, and the two `for` loop families: JMP, EQ, LT, LE,
//! TEST, TESTSET, FORLOOP, FORPREP, TFORCALL, TFORLOOP.

use lua_types::error::LuaError;
use lua_types::instruction::Instruction;

use crate::interpreter::call::do_call_for_tforcall;
use crate::state::State;
use crate::value::{self, Value};

pub fn jmp(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    if ins.a() != 0 {
        let level = state.frame().base + (ins.a() as usize - 1);
        state.close_upvalues_from(level);
    }
    state.jump(ins.sbx());
    Ok(())
}

pub fn eq(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = state.rk(ins.b());
    let c = state.rk(ins.c());
    let equal = b == c;
    if equal != (ins.a() != 0) {
        state.advance();
    }
    Ok(())
}

pub fn lt(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = state.rk(ins.b());
    let c = state.rk(ins.c());
    let less = value::raw_less_than(&b, &c)?;
    if less != (ins.a() != 0) {
        state.advance();
    }
    Ok(())
}

pub fn le(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = state.rk(ins.b());
    let c = state.rk(ins.c());
    let le = value::raw_less_equal(&b, &c)?;
    if le != (ins.a() != 0) {
        state.advance();
    }
    Ok(())
}

pub fn test(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let a = state.reg(ins.a());
    if a.is_truthy() != (ins.c() != 0) {
        state.advance();
    }
    Ok(())
}

pub fn testset(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = state.reg(ins.b());
    if b.is_truthy() == (ins.c() != 0) {
        state.set_reg(ins.a(), b);
    } else {
        state.advance();
    }
    Ok(())
}

/// a loop is run with integer arithmetic only when all three control
/// values are already integers; otherwise every value is coerced to
/// float for the duration of the loop (matches the reference VM's
/// `forprep`, simplified: no attempt to keep an integer loop whose limit
/// was given as a float but happens to be integral).
enum ForState {
    Int { init: i64, limit: i64, step: i64 },
    Float { init: f64, limit: f64, step: f64 },
}

fn read_for_state(state: &State, a: u32) -> Result<ForState, LuaError> {
    let init = state.reg(a);
    let limit = state.reg(a + 1);
    let step = state.reg(a + 2);
    if let (Value::Integer(i), Value::Integer(l), Value::Integer(s)) = (&init, &limit, &step) {
        return Ok(ForState::Int {
            init: *i,
            limit: *l,
            step: *s,
        });
    }
    let i = init.to_float().ok_or(LuaError::ForStepMustBeNumber)?;
    let l = limit.to_float().ok_or(LuaError::ForStepMustBeNumber)?;
    let s = step.to_float().ok_or(LuaError::ForStepMustBeNumber)?;
    Ok(ForState::Float {
        init: i,
        limit: l,
        step: s,
    })
}

pub fn forprep(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let a = ins.a();
    match read_for_state(state, a)? {
        ForState::Int { init, limit, step } => {
            state.set_reg(a, Value::Integer(init.wrapping_sub(step)));
            state.set_reg(a + 1, Value::Integer(limit));
            state.set_reg(a + 2, Value::Integer(step));
        }
        ForState::Float { init, limit, step } => {
            state.set_reg(a, Value::Float(init - step));
            state.set_reg(a + 1, Value::Float(limit));
            state.set_reg(a + 2, Value::Float(step));
        }
    }
    state.jump(ins.sbx());
    Ok(())
}

pub fn forloop(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let a = ins.a();
    match read_for_state(state, a)? {
        ForState::Int { init, limit, step } => {
            let next = init.wrapping_add(step);
            let continues = if step >= 0 { next <= limit } else { next >= limit };
            if continues {
                state.set_reg(a, Value::Integer(next));
                state.set_reg(a + 3, Value::Integer(next));
                state.jump(ins.sbx());
            }
        }
        ForState::Float { init, limit, step } => {
            let next = init + step;
            let continues = if step >= 0.0 { next <= limit } else { next >= limit };
            if continues {
                state.set_reg(a, Value::Float(next));
                state.set_reg(a + 3, Value::Float(next));
                state.jump(ins.sbx());
            }
        }
    }
    Ok(())
}

pub fn tforcall(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let a = ins.a();
    let c = ins.c();
    do_call_for_tforcall(state, a, c)
}

pub fn tforloop(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let a = ins.a();
    let first_result = state.reg(a + 1);
    if !first_result.is_nil() {
        state.set_reg(a, first_result);
        state.jump(ins.sbx());
    }
    Ok(())
}

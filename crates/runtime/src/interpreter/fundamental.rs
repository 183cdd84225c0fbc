// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! register/constant/upvalue movement: MOVE, LOADK(X), LOADBOOL, LOADNIL,
//! GETUPVAL, SETUPVAL.

use lua_types::error::LuaError;
use lua_types::instruction::Instruction;

use crate::state::State;
use crate::value::Value;

pub fn move_(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let v = state.reg(ins.b());
    state.set_reg(ins.a(), v);
    Ok(())
}

pub fn loadk(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let v = state.constant(ins.bx());
    state.set_reg(ins.a(), v);
    Ok(())
}

/// the loop has already advanced `pc` past LOADKX itself; the following
/// EXTRAARG supplies the real (wide) constant index in its `Ax` field.
pub fn loadkx(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let extra = state.fetch();
    state.advance();
    let v = state.constant(extra.ax());
    state.set_reg(ins.a(), v);
    Ok(())
}

pub fn loadbool(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    state.set_reg(ins.a(), Value::Boolean(ins.b() != 0));
    if ins.c() != 0 {
        state.advance();
    }
    Ok(())
}

pub fn loadnil(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    for i in 0..=ins.b() {
        state.set_reg(ins.a() + i, Value::Nil);
    }
    Ok(())
}

pub fn getupval(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let v = state.get_upvalue(ins.b());
    state.set_reg(ins.a(), v);
    Ok(())
}

pub fn setupval(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let v = state.reg(ins.a());
    state.set_upvalue(ins.b(), v);
    Ok(())
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! arithmetic, bitwise, unary and concatenation opcodes: ADD..BXOR, SHL,
//! SHR, UNM, BNOT, NOT, LEN, CONCAT.

use lua_types::error::LuaError;
use lua_types::instruction::Instruction;

use crate::state::State;
use crate::value::{self, ArithOp, Value};

fn binop(state: &mut State, ins: Instruction, op: ArithOp) -> Result<(), LuaError> {
    let b = state.rk(ins.b());
    let c = state.rk(ins.c());
    let result = value::arith(op, &b, &c)?;
    state.set_reg(ins.a(), result);
    Ok(())
}

pub fn add(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::Add)
}
pub fn sub(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::Sub)
}
pub fn mul(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::Mul)
}
pub fn modulo(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::Mod)
}
pub fn pow(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::Pow)
}
pub fn div(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::Div)
}
pub fn idiv(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::IDiv)
}
pub fn band(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::BAnd)
}
pub fn bor(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::BOr)
}
pub fn bxor(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::BXor)
}
pub fn shl(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::Shl)
}
pub fn shr(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    binop(state, ins, ArithOp::Shr)
}

pub fn unm(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = state.reg(ins.b());
    let result = value::unary_minus(&b)?;
    state.set_reg(ins.a(), result);
    Ok(())
}

pub fn bnot(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = state.reg(ins.b());
    let result = value::bitwise_not(&b)?;
    state.set_reg(ins.a(), result);
    Ok(())
}

pub fn not(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = state.reg(ins.b());
    state.set_reg(ins.a(), Value::Boolean(!b.is_truthy()));
    Ok(())
}

pub fn len(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = state.reg(ins.b());
    let result = value::length_of(&b)?;
    state.set_reg(ins.a(), result);
    Ok(())
}

pub fn concat(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let b = ins.b();
    let c = ins.c();
    let mut acc = state.reg(c);
    let mut i = c;
    while i > b {
        i -= 1;
        let left = state.reg(i);
        acc = value::concat(&left, &acc)?;
    }
    state.set_reg(ins.a(), acc);
    Ok(())
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! table construction and indexing: GETTABUP, GETTABLE, SETTABUP,
//! SETTABLE, NEWTABLE, SELF, SETLIST.

use std::cell::RefCell;
use std::rc::Rc;

use lua_types::error::LuaError;
use lua_types::instruction::Instruction;
use lua_types::number::fb_to_int;

use crate::state::State;
use crate::table::Table;
use crate::value::Value;

/// number of array slots flushed by a single SETLIST instruction before a
/// new batch (and a fresh `C`) is needed; matches the reference compiler's
/// `LFIELDS_PER_FLUSH`.
const FIELDS_PER_FLUSH: u32 = 50;

fn as_table(v: &Value) -> Result<Rc<RefCell<Table>>, LuaError> {
    match v {
        Value::Table(t) => Ok(t.clone()),
        other => Err(LuaError::index(other.type_name())),
    }
}

pub fn gettabup(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let upval = state.get_upvalue(ins.b());
    let table = as_table(&upval)?;
    let key = state.rk(ins.c());
    let v = table.borrow().get(&key);
    state.set_reg(ins.a(), v);
    Ok(())
}

pub fn gettable(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let base = state.reg(ins.b());
    let table = as_table(&base)?;
    let key = state.rk(ins.c());
    let v = table.borrow().get(&key);
    state.set_reg(ins.a(), v);
    Ok(())
}

pub fn settabup(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let upval = state.get_upvalue(ins.a());
    let table = as_table(&upval)?;
    let key = state.rk(ins.b());
    let value = state.rk(ins.c());
    table.borrow_mut().set(&key, value)
}

pub fn settable(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let base = state.reg(ins.a());
    let table = as_table(&base)?;
    let key = state.rk(ins.b());
    let value = state.rk(ins.c());
    table.borrow_mut().set(&key, value)
}

pub fn newtable(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let array_hint = fb_to_int(ins.b() as u8) as usize;
    let hash_hint = fb_to_int(ins.c() as u8) as usize;
    let table = Table::with_size_hints(array_hint, hash_hint);
    state.set_reg(ins.a(), Value::Table(Rc::new(RefCell::new(table))));
    Ok(())
}

pub fn self_(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let base = state.reg(ins.b());
    state.set_reg(ins.a() + 1, base.clone());
    let table = as_table(&base)?;
    let key = state.rk(ins.c());
    let v = table.borrow().get(&key);
    state.set_reg(ins.a(), v);
    Ok(())
}

pub fn setlist(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let a = ins.a();
    let mut b = ins.b();
    let mut c = ins.c();
    if c == 0 {
        let extra = state.fetch();
        state.advance();
        c = extra.ax();
    }
    let base = state.reg(a);
    let table = as_table(&base)?;

    if b == 0 {
        b = (state.stack.len() - (state.frame().base + a as usize + 1)) as u32;
    }

    let start = (c - 1) * FIELDS_PER_FLUSH;
    for i in 1..=b {
        let value = state.reg(a + i);
        table
            .borrow_mut()
            .set(&Value::Integer((start + i) as i64), value)?;
    }
    Ok(())
}

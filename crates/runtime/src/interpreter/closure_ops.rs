// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! closure creation and variadic argument access: CLOSURE, VARARG.

use std::rc::Rc;

use lua_types::error::LuaError;
use lua_types::instruction::Instruction;

use crate::closure::Closure;
use crate::state::State;
use crate::value::Value;

pub fn closure(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let child_proto = {
        let current = match &*state.frame().closure {
            Closure::Lua(c) => c,
            Closure::Host { .. } => unreachable!("CLOSURE executed outside a script frame"),
        };
        current.prototype.protos[ins.bx() as usize].clone()
    };

    let frame_base = state.frame().base;
    let enclosing_upvalues: Vec<_> = match &*state.frame().closure {
        Closure::Lua(c) => c.upvalues.clone(),
        Closure::Host { .. } => unreachable!(),
    };

    let mut upvalues = Vec::with_capacity(child_proto.upvalues.len());
    for desc in &child_proto.upvalues {
        let handle = if desc.in_stack {
            state
                .open_upvalues
                .find_or_create(frame_base + desc.index as usize)
        } else {
            enclosing_upvalues[desc.index as usize].clone()
        };
        upvalues.push(handle);
    }

    let closure = Closure::new_lua(Rc::new(child_proto), upvalues);
    state.set_reg(ins.a(), Value::Closure(Rc::new(closure)));
    Ok(())
}

pub fn vararg(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let a = ins.a();
    let b = ins.b();
    let varargs = state.frame().varargs.clone();
    let base = state.frame().base + a as usize;

    let count = if b == 0 { varargs.len() } else { (b - 1) as usize };
    for i in 0..count {
        state.stack.set_abs(base + i, varargs.get(i).cloned().unwrap_or(Value::Nil));
    }
    if b == 0 {
        state.stack.set_len(base + count);
    }
    Ok(())
}

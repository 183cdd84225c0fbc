// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! closures: either a script closure (prototype + upvalue bindings) or a
//! host closure (a Rust function + the values it captured at creation).
//! the calling convention is shared by [`crate::interpreter::call`].

use std::rc::Rc;

use lua_binary::{Constant, Prototype};
use lua_types::error::LuaError;

use crate::state::State;
use crate::upvalue::UpvalueHandle;
use crate::value::Value;

/// a prototype's constant pool, converted once at load time into runtime
/// values (tables/closures never appear as constants, so this is total).
pub fn constants_to_values(constants: &[Constant]) -> Vec<Value> {
    constants
        .iter()
        .map(|c| match c {
            Constant::Nil => Value::Nil,
            Constant::Boolean(b) => Value::Boolean(*b),
            Constant::Integer(i) => Value::Integer(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(bytes) => Value::str_from(bytes),
        })
        .collect()
}

pub struct LuaClosure {
    pub prototype: Rc<Prototype>,
    pub constants: Vec<Value>,
    pub upvalues: Vec<UpvalueHandle>,
}

/// signature for a host (native) function: receives the interpreter state
/// (for re-entrant calls back into Lua values) and its arguments, returns
/// its results. errors propagate as ordinary runtime errors.
pub type HostFn = dyn Fn(&mut State, &[Value]) -> Result<Vec<Value>, LuaError>;

pub enum Closure {
    Lua(LuaClosure),
    Host {
        name: &'static str,
        captures: Vec<Value>,
        func: Box<HostFn>,
    },
}

impl Closure {
    pub fn new_lua(prototype: Rc<Prototype>, upvalues: Vec<UpvalueHandle>) -> Closure {
        let constants = constants_to_values(&prototype.constants);
        Closure::Lua(LuaClosure {
            prototype,
            constants,
            upvalues,
        })
    }

    pub fn new_host(
        name: &'static str,
        captures: Vec<Value>,
        func: Box<HostFn>,
    ) -> Closure {
        Closure::Host {
            name,
            captures,
            func,
        }
    }
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Closure::Lua(c) => f
                .debug_struct("Closure::Lua")
                .field("num_params", &c.prototype.num_params)
                .field("is_vararg", &c.prototype.is_vararg)
                .finish(),
            Closure::Host { name, .. } => f.debug_struct("Closure::Host").field("name", name).finish(),
        }
    }
}

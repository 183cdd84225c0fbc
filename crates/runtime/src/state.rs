// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! the interpreter state: the evaluation stack, the call-frame list, and
//! the open-upvalue list, tied together with the register/constant access
//! helpers the opcode handlers use.

use std::cell::RefCell;
use std::rc::Rc;

use lua_binary::LoaderError;
use lua_types::error::LuaError;
use lua_types::instruction::{self, Instruction};

use crate::closure::Closure;
use crate::frame::{CallFrame, MULTI_RESULT};
use crate::stack::{EvalStack, MINSTACK};
use crate::table::Table;
use crate::upvalue::{self, Upvalue, OpenUpvalues, UpvalueHandle};
use crate::value::Value;

pub struct State {
    pub stack: EvalStack,
    pub frames: Vec<CallFrame>,
    pub open_upvalues: OpenUpvalues,
}

impl State {
    pub fn new() -> Self {
        State {
            stack: EvalStack::new(),
            frames: Vec::new(),
            open_upvalues: OpenUpvalues::new(),
        }
    }

    pub fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active call frame")
    }

    pub fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no active call frame")
    }

    fn lua_frame(&self) -> &crate::closure::LuaClosure {
        match &*self.frame().closure {
            Closure::Lua(c) => c,
            Closure::Host { .. } => panic!("current frame is not a script closure"),
        }
    }

    pub fn fetch(&self) -> Instruction {
        let frame = self.frame();
        let code = &self.lua_frame().prototype.code;
        code[frame.pc]
    }

    pub fn advance(&mut self) {
        self.frame_mut().pc += 1;
    }

    pub fn jump(&mut self, offset: i32) {
        let pc = self.frame().pc as i64 + offset as i64;
        self.frame_mut().pc = pc as usize;
    }

    pub fn reg(&self, n: u32) -> Value {
        self.stack.get_abs(self.frame().base + n as usize)
    }

    pub fn set_reg(&mut self, n: u32, value: Value) {
        let idx = self.frame().base + n as usize;
        self.stack.set_abs(idx, value);
    }

    pub fn constant(&self, idx: u32) -> Value {
        self.lua_frame().constants[idx as usize].clone()
    }

    /// resolve an RK operand: high bit set means constant-pool index,
    /// otherwise a register number.
    pub fn rk(&self, operand: u32) -> Value {
        if instruction::is_constant(operand) {
            self.constant(instruction::constant_index(operand))
        } else {
            self.reg(operand)
        }
    }

    pub fn upvalue(&self, idx: u32) -> UpvalueHandle {
        match &*self.frame().closure {
            Closure::Lua(c) => c.upvalues[idx as usize].clone(),
            Closure::Host { .. } => panic!("current frame is not a script closure"),
        }
    }

    pub fn get_upvalue(&self, idx: u32) -> Value {
        let handle = self.upvalue(idx);
        upvalue::get(&handle, |level| self.stack.get_abs(level))
    }

    pub fn set_upvalue(&mut self, idx: u32, value: Value) {
        let handle = self.upvalue(idx);
        upvalue::set(&handle, value, |level, v| self.stack.set_abs(level, v));
    }

    /// close every open upvalue referring to a stack slot at or above
    /// absolute index `from`.
    pub fn close_upvalues_from(&mut self, from: usize) {
        let stack = &self.stack;
        self.open_upvalues
            .close_from(from, |level| stack.get_abs(level));
    }

    /// ensure the active frame has at least `MINSTACK` free registers
    /// above its declared `max_stack_size`, growing the evaluation stack.
    pub fn ensure_frame_capacity(&mut self, extra: usize) -> Result<(), LuaError> {
        let top = self.frame().top;
        self.stack.ensure(top + extra.max(MINSTACK))
    }

    /// push a new call frame for `closure` with arguments already sitting
    /// on the stack starting at `args_base`, consuming `n_args` of them
    /// (fixed params are copied into place, the rest become varargs for a
    /// vararg prototype and are otherwise discarded). `result_base` is
    /// where `postCall` will later deposit this call's return values —
    /// the calling instruction's own `R(A)`, not `args_base`.
    pub fn pre_call_lua(
        &mut self,
        closure: Rc<Closure>,
        result_base: usize,
        args_base: usize,
        n_args: usize,
        n_results: isize,
    ) -> Result<(), LuaError> {
        let proto = match &*closure {
            Closure::Lua(c) => c.prototype.clone(),
            Closure::Host { .. } => unreachable!("pre_call_lua called with a host closure"),
        };
        let num_params = proto.num_params as usize;
        let base = args_base;

        let varargs = if proto.is_vararg && n_args > num_params {
            self.stack.slice(base + num_params, base + n_args).to_vec()
        } else {
            Vec::new()
        };

        let top = base + proto.max_stack_size as usize;
        self.stack.ensure(top + MINSTACK)?;
        // zero-fill declared params beyond what was actually passed, and
        // clear the vararg tail so it doesn't leak into R(num_params..).
        for i in n_args..num_params {
            self.stack.set_abs(base + i, Value::Nil);
        }
        if proto.is_vararg {
            self.stack.set_len((base + num_params).max(self.stack.len()));
        }

        let mut frame = CallFrame::new(closure, base, top, result_base, n_results);
        frame.varargs = varargs;
        self.frames.push(frame);
        Ok(())
    }

    /// pop the active frame, placing its results (the `n_returned` values
    /// starting at `results_base`) where the caller expects them, per the
    /// `nResults`/`LUA_MULTRET` convention, and closing any upvalues that
    /// captured this frame's registers.
    pub fn post_call(&mut self, results_base: usize, n_returned: usize) -> usize {
        let frame_base = self.frame().base;
        let result_base = self.frame().result_base;
        let n_results = self.frame().n_results;
        self.close_upvalues_from(frame_base);

        let results = self.stack.slice(results_base, results_base + n_returned).to_vec();
        let wanted = if n_results == MULTI_RESULT {
            results.len()
        } else {
            n_results as usize
        };

        for i in 0..wanted {
            let value = results.get(i).cloned().unwrap_or(Value::Nil);
            self.stack.set_abs(result_base + i, value);
        }
        self.stack.set_len(result_base + wanted);
        self.frames.pop();
        wanted
    }

    /// deserialize a precompiled chunk and wrap it as a closure whose
    /// single upvalue is the given global table (the reference
    /// implementation's `_ENV` convention: `GETTABUP`/`SETTABUP` against
    /// upvalue 0 is how a chunk reaches its globals).
    pub fn load_chunk(
        data: &[u8],
        globals: Rc<RefCell<Table>>,
    ) -> Result<Rc<Closure>, LoaderError> {
        let prototype = lua_binary::load_chunk(data)?;
        let env = Rc::new(RefCell::new(Upvalue::Closed(Value::Table(globals))));
        Ok(Rc::new(Closure::new_lua(Rc::new(prototype), vec![env])))
    }

    /// invoke a closure with the given arguments, running the bytecode
    /// dispatch loop to completion and returning every result it
    /// produced. this is the embedding entry point into the interpreter.
    pub fn call(&mut self, closure: Rc<Closure>, args: &[Value]) -> Result<Vec<Value>, LuaError> {
        crate::interpreter::call_closure_toplevel(self, closure, args)
    }
}

impl Default for State {
    fn default() -> Self {
        State::new()
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! CALL / TAILCALL / RETURN and the preCall/postCall machinery behind
//! them (spec section 4.7). the interpreter's dispatch loop has already
//! advanced `pc` past the current instruction by the time a handler here
//! runs, so none of these touch `pc` themselves; pushing or popping a
//! frame is enough for the outer loop to resume in the right place.

use std::rc::Rc;

use lua_types::error::LuaError;
use lua_types::instruction::Instruction;

use crate::closure::Closure;
use crate::frame::MULTI_RESULT;
use crate::state::State;
use crate::value::Value;

fn resolve_callee(state: &State, a: u32) -> Result<Rc<Closure>, LuaError> {
    match state.reg(a) {
        Value::Closure(c) => Ok(c),
        other => Err(LuaError::call(other.type_name())),
    }
}

/// collect `R(A+1)..R(A+B-1)` as arguments; `B == 0` means "every register
/// up to the stack's current top", the convention used when the previous
/// instruction was itself a multi-return call or `VARARG`.
fn args_range(state: &State, a: u32, b: u32) -> (usize, usize) {
    let args_base = state.frame().base + a as usize + 1;
    let n_args = if b == 0 {
        state.stack.len() - args_base
    } else {
        (b - 1) as usize
    };
    (args_base, n_args)
}

fn call_host(state: &mut State, closure: &Rc<Closure>, args: &[Value]) -> Result<Vec<Value>, LuaError> {
    match &**closure {
        Closure::Host { func, captures, .. } => {
            let mut full_args = captures.clone();
            full_args.extend_from_slice(args);
            func(state, &full_args)
        }
        Closure::Lua(_) => unreachable!(),
    }
}

fn place_results(state: &mut State, base: usize, results: &[Value], n_results: isize) {
    let wanted = if n_results == MULTI_RESULT {
        results.len()
    } else {
        n_results as usize
    };
    for i in 0..wanted {
        state.stack.set_abs(base + i, results.get(i).cloned().unwrap_or(Value::Nil));
    }
    state.stack.set_len(base + wanted);
}

/// invoke the closure at `R(A)`. a script closure gets a new frame pushed
/// so the dispatch loop continues there; a host closure runs to
/// completion immediately and its results are placed at `R(A)` directly,
/// since host closures never occupy a frame of their own.
fn do_call(state: &mut State, a: u32, b: u32, n_results: isize) -> Result<(), LuaError> {
    let callee = resolve_callee(state, a)?;
    let (args_base, n_args) = args_range(state, a, b);
    match &*callee {
        Closure::Lua(_) => {
            let result_base = state.frame().base + a as usize;
            state.pre_call_lua(callee, result_base, args_base, n_args, n_results)
        }
        Closure::Host { .. } => {
            let args = state.stack.slice(args_base, args_base + n_args).to_vec();
            let results = call_host(state, &callee, &args)?;
            let results_base = state.frame().base + a as usize;
            place_results(state, results_base, &results, n_results);
            Ok(())
        }
    }
}

/// run a script or host closure from outside the bytecode dispatch loop
/// (the embedding entry point, [`crate::state::State`]'s public `call`).
pub fn call_closure_toplevel(
    state: &mut State,
    closure: Rc<Closure>,
    args: &[Value],
) -> Result<Vec<Value>, LuaError> {
    match &*closure {
        Closure::Host { .. } => call_host(state, &closure, args),
        Closure::Lua(_) => {
            let base = state.stack.len();
            for a in args {
                state.stack.push(a.clone());
            }
            state.pre_call_lua(closure, base, base, args.len(), MULTI_RESULT)?;
            let stop_depth = state.frames.len() - 1;
            super::run_until(state, stop_depth)?;
            let results = state.stack.slice(base, state.stack.len()).to_vec();
            state.stack.truncate(base);
            Ok(results)
        }
    }
}

pub fn call(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let c = ins.c();
    let n_results = if c == 0 { MULTI_RESULT } else { (c - 1) as isize };
    do_call(state, ins.a(), ins.b(), n_results)
}

/// per the spec, implemented as CALL with multi-return rather than true
/// in-place frame replacement: correctness holds, only stack depth on
/// unbounded tail recursion differs from a tail-call-eliminating VM.
pub fn tailcall(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    do_call(state, ins.a(), ins.b(), MULTI_RESULT)
}

/// TFORCALL's fixed 2-argument calling convention: invoke `R(A)` with
/// `R(A+1)` (the invariant state) and `R(A+2)` (the control variable),
/// placing `c` results starting at `R(A+3)`.
pub(crate) fn do_call_for_tforcall(state: &mut State, a: u32, c: u32) -> Result<(), LuaError> {
    let callee = resolve_callee(state, a)?;
    let args = vec![state.reg(a + 1), state.reg(a + 2)];
    let results_base = state.frame().base + a as usize + 3;
    match &*callee {
        Closure::Lua(_) => {
            let args_base = state.stack.len();
            for arg in &args {
                state.stack.push(arg.clone());
            }
            state.pre_call_lua(callee, args_base, args_base, args.len(), c as isize)?;
            let stop_depth = state.frames.len() - 1;
            super::run_until(state, stop_depth)?;
            let results = state.stack.slice(args_base, state.stack.len()).to_vec();
            state.stack.truncate(args_base);
            for i in 0..c as usize {
                state
                    .stack
                    .set_abs(results_base + i, results.get(i).cloned().unwrap_or(Value::Nil));
            }
            Ok(())
        }
        Closure::Host { .. } => {
            let results = call_host(state, &callee, &args)?;
            place_results(state, results_base, &results, c as isize);
            Ok(())
        }
    }
}

pub fn return_(state: &mut State, ins: Instruction) -> Result<(), LuaError> {
    let a = ins.a();
    let b = ins.b();
    let results_base = state.frame().base + a as usize;
    let n_returned = if b == 0 {
        state.stack.len() - results_base
    } else {
        (b - 1) as usize
    };
    state.post_call(results_base, n_returned);
    Ok(())
}

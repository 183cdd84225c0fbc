// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! the fetch/decode/dispatch loop, and the table of one handler per
//! opcode that drives it.
//!
//! unlike a hand-written `match` over 47 arms, dispatch goes through a
//! flat table indexed by the opcode's own discriminant — adding a new
//! opcode is "write the handler, add one array slot", not "find the right
//! spot in a 300-line match". `pc` is advanced by the loop itself *before*
//! a handler runs, so jump-family handlers (`JMP`, `FORLOOP`, `FORPREP`,
//! `TFORLOOP`) compute offsets relative to the already-advanced `pc`,
//! exactly as the reference compiler emits them; handlers that need to
//! skip the instruction immediately following them (`EQ`, `LT`, `LE`,
//! `TEST`, `TESTSET`, `LOADBOOL`) call `state.advance()` once more.

use lua_types::error::LuaError;
use lua_types::instruction::Instruction;
use lua_types::opcode::Opcode;

use crate::state::State;

pub mod arith;
pub mod call;
pub mod closure_ops;
pub mod control_flow;
pub mod fundamental;
pub mod table_ops;

type Handler = fn(&mut State, Instruction) -> Result<(), LuaError>;

fn extraarg(_state: &mut State, _ins: Instruction) -> Result<(), LuaError> {
    Err(LuaError::Other(
        "EXTRAARG encountered outside of LOADKX/SETLIST".to_string(),
    ))
}

/// one entry per [`Opcode`] discriminant, in the same MOVE=0..EXTRAARG=46
/// order, so `DISPATCH[op as usize]` is a plain array index.
const DISPATCH: [Handler; 47] = [
    fundamental::move_,      // MOVE
    fundamental::loadk,      // LOADK
    fundamental::loadkx,     // LOADKX
    fundamental::loadbool,   // LOADBOOL
    fundamental::loadnil,    // LOADNIL
    fundamental::getupval,   // GETUPVAL
    table_ops::gettabup,     // GETTABUP
    table_ops::gettable,     // GETTABLE
    table_ops::settabup,     // SETTABUP
    fundamental::setupval,   // SETUPVAL
    table_ops::settable,     // SETTABLE
    table_ops::newtable,     // NEWTABLE
    table_ops::self_,        // SELF
    arith::add,              // ADD
    arith::sub,              // SUB
    arith::mul,              // MUL
    arith::modulo,           // MOD
    arith::pow,              // POW
    arith::div,              // DIV
    arith::idiv,             // IDIV
    arith::band,             // BAND
    arith::bor,              // BOR
    arith::bxor,             // BXOR
    arith::shl,              // SHL
    arith::shr,              // SHR
    arith::unm,              // UNM
    arith::bnot,             // BNOT
    arith::not,              // NOT
    arith::len,              // LEN
    arith::concat,           // CONCAT
    control_flow::jmp,       // JMP
    control_flow::eq,        // EQ
    control_flow::lt,        // LT
    control_flow::le,        // LE
    control_flow::test,      // TEST
    control_flow::testset,   // TESTSET
    call::call,              // CALL
    call::tailcall,          // TAILCALL
    call::return_,           // RETURN
    control_flow::forloop,   // FORLOOP
    control_flow::forprep,   // FORPREP
    control_flow::tforcall,  // TFORCALL
    control_flow::tforloop,  // TFORLOOP
    table_ops::setlist,      // SETLIST
    closure_ops::closure,    // CLOSURE
    closure_ops::vararg,     // VARARG
    extraarg,                // EXTRAARG
];

/// run the dispatch loop until the frame stack unwinds back down to
/// `stop_depth` (i.e. the frame that was active when the caller started
/// this run has returned).
pub(crate) fn run_until(state: &mut State, stop_depth: usize) -> Result<(), LuaError> {
    while state.frames.len() > stop_depth {
        let ins = state.fetch();
        state.advance();
        let op = ins
            .opcode()
            .ok_or_else(|| LuaError::Other("invalid opcode byte in bytecode".to_string()))?;
        log::trace!("dispatch {} (frame depth {})", op.mnemonic(), state.frames.len());
        DISPATCH[op as usize](state, ins)?;
    }
    Ok(())
}

pub use call::call_closure_toplevel;

#[allow(dead_code)]
fn assert_opcode_alignment() {
    // a compile-time nudge, not a runtime check: if `Opcode`'s ordering
    // ever drifts from `DISPATCH`'s, this still compiles but every
    // opcode after the drift silently runs the wrong handler. keep this
    // comment and the grouped layout above in sync with `lua_types::opcode`.
    let _ = Opcode::EXTRAARG as usize;
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! the single runtime error kind raised by value operations and the
//! interpreter loop (spec ref: section 7, "Error handling design").
//!
//! message text is part of the contract: embedders and tests match on the
//! verbatim prefixes below, so variants are not free to reword.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LuaError {
    #[error("attempt to {op} a {type_name} value")]
    AttemptTo { op: &'static str, type_name: &'static str },

    #[error("attempt to compare two {type_name} values")]
    AttemptToCompareTwo { type_name: &'static str },

    #[error("attempt to compare {lhs} with {rhs}")]
    AttemptToCompare {
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("number has no integer representation")]
    NoIntegerRepresentation,

    #[error("table index is nil")]
    TableIndexIsNil,

    #[error("table index is NaN")]
    TableIndexIsNaN,

    #[error("'for' step must be a number")]
    ForStepMustBeNumber,

    #[error("stack overflow")]
    StackOverflow,

    /// programmer errors reported through the (out-of-scope) host API facade
    /// are surfaced identically as runtime errors, per section 7's closing
    /// paragraph.
    #[error("{0}")]
    Other(String),
}

impl LuaError {
    pub fn arith(type_name: &'static str) -> Self {
        LuaError::AttemptTo {
            op: "perform arithmetic on",
            type_name,
        }
    }

    pub fn bitwise(type_name: &'static str) -> Self {
        LuaError::AttemptTo {
            op: "perform bitwise operation on",
            type_name,
        }
    }

    pub fn concatenate(type_name: &'static str) -> Self {
        LuaError::AttemptTo {
            op: "concatenate",
            type_name,
        }
    }

    pub fn compare(type_name: &'static str) -> Self {
        LuaError::AttemptTo {
            op: "compare",
            type_name,
        }
    }

    pub fn length_of(type_name: &'static str) -> Self {
        LuaError::AttemptTo {
            op: "get length of",
            type_name,
        }
    }

    pub fn index(type_name: &'static str) -> Self {
        LuaError::AttemptTo {
            op: "index",
            type_name,
        }
    }

    pub fn call(type_name: &'static str) -> Self {
        LuaError::AttemptTo {
            op: "call",
            type_name,
        }
    }
}

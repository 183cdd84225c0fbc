// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! entry point for turning a precompiled-chunk byte slice into a root
//! [`crate::prototype::Prototype`].

use thiserror::Error;

use crate::prototype::{load_prototype, Prototype};
use crate::reader::Reader;

/// every failure that can occur while deserializing a chunk. never escapes
/// into the interpreter; callers convert a successfully loaded chunk into
/// lua_runtime closures before execution begins.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("not a precompiled chunk")]
    NotAPrecompiledChunk,

    #[error("version mismatch in precompiled chunk")]
    VersionMismatch,

    #[error("format mismatch in precompiled chunk")]
    FormatMismatch,

    #[error("{0} size mismatch in precompiled chunk")]
    SizeMismatch(&'static str),

    #[error("corrupted precompiled chunk")]
    Corrupted,

    #[error("truncated precompiled chunk")]
    Truncated,
}

/// deserialize a complete precompiled chunk, returning its root prototype.
///
/// mirrors the reference loader's `Undump`: validate the header (which also
/// fixes the byte order used for the remainder of the file), skip the
/// top-level upvalue-size byte, then recursively read the prototype tree.
pub fn load_chunk(data: &[u8]) -> Result<Prototype, LoaderError> {
    let mut reader = Reader::new(data);
    let order = reader.check_header()?;
    reader.read_byte()?; // size_upvalues of the top-level function, unused
    load_prototype(&mut reader, order, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_truncated() {
        assert_eq!(load_chunk(&[]), Err(LoaderError::Truncated));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let data = b"notalua-chunk-at-all";
        assert_eq!(load_chunk(data), Err(LoaderError::NotAPrecompiledChunk));
    }
}

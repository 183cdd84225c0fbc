// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use lua_types::instruction::Instruction;

use crate::header::Endianness;
use crate::loader::LoaderError;
use crate::reader::Reader;

const TAG_NIL: u8 = 0x00;
const TAG_BOOLEAN: u8 = 0x01;
const TAG_FLOAT: u8 = 0x03;
const TAG_INTEGER: u8 = 0x13;
const TAG_SHORT_STRING: u8 = 0x04;
const TAG_LONG_STRING: u8 = 0x14;

/// a constant-pool entry as stored on disk. `lua_runtime` maps these onto
/// its own `Value` universe when it materializes a loaded chunk.
#[derive(Debug, PartialEq, Clone)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(Vec<u8>),
}

/// an upvalue descriptor: whether the enclosing function captures it from
/// its own stack frame (`in_stack`) or from one of its own upvalues, and
/// the index into whichever of those it is.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct UpvalueDesc {
    pub in_stack: bool,
    pub index: u8,
}

/// the scope of a single named local variable, used only for debug/listing
/// purposes; never consulted by the interpreter loop.
#[derive(Debug, PartialEq, Clone)]
pub struct LocalVarDesc {
    pub name: Vec<u8>,
    pub start_pc: u32,
    pub end_pc: u32,
}

/// one compiled function body, recursively containing its nested closures.
#[derive(Debug, PartialEq, Clone)]
pub struct Prototype {
    pub source: Vec<u8>,
    pub line_defined: u32,
    pub last_line_defined: u32,
    pub num_params: u8,
    pub is_vararg: bool,
    pub max_stack_size: u8,
    pub code: Vec<Instruction>,
    pub constants: Vec<Constant>,
    pub upvalues: Vec<UpvalueDesc>,
    pub protos: Vec<Prototype>,
    pub line_info: Vec<u32>,
    pub loc_vars: Vec<LocalVarDesc>,
    pub upvalue_names: Vec<Vec<u8>>,
}

fn read_count(reader: &mut Reader, order: Endianness) -> Result<u32, LoaderError> {
    reader.read_u32(order)
}

fn read_code(reader: &mut Reader, order: Endianness) -> Result<Vec<Instruction>, LoaderError> {
    let n = read_count(reader, order)?;
    let mut code = Vec::with_capacity(n as usize);
    for _ in 0..n {
        code.push(Instruction::new(reader.read_u32(order)?));
    }
    Ok(code)
}

fn read_constants(reader: &mut Reader, order: Endianness) -> Result<Vec<Constant>, LoaderError> {
    let n = read_count(reader, order)?;
    let mut constants = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let tag = reader.read_byte()?;
        let constant = match tag {
            TAG_NIL => Constant::Nil,
            TAG_BOOLEAN => Constant::Boolean(reader.read_byte()? != 0),
            TAG_INTEGER => Constant::Integer(reader.read_u64(order)? as i64),
            TAG_FLOAT => Constant::Float(reader.read_f64(order)?),
            TAG_SHORT_STRING | TAG_LONG_STRING => {
                Constant::Str(reader.read_lua_string(order)?)
            }
            _ => return Err(LoaderError::Corrupted),
        };
        constants.push(constant);
    }
    Ok(constants)
}

fn read_upvalues(reader: &mut Reader, order: Endianness) -> Result<Vec<UpvalueDesc>, LoaderError> {
    let n = read_count(reader, order)?;
    let mut upvalues = Vec::with_capacity(n as usize);
    for _ in 0..n {
        upvalues.push(UpvalueDesc {
            in_stack: reader.read_byte()? != 0,
            index: reader.read_byte()?,
        });
    }
    Ok(upvalues)
}

fn read_protos(
    reader: &mut Reader,
    order: Endianness,
    parent_source: &[u8],
) -> Result<Vec<Prototype>, LoaderError> {
    let n = read_count(reader, order)?;
    let mut protos = Vec::with_capacity(n as usize);
    for _ in 0..n {
        protos.push(load_prototype_bytes(reader, order, parent_source)?);
    }
    Ok(protos)
}

fn read_line_info(reader: &mut Reader, order: Endianness) -> Result<Vec<u32>, LoaderError> {
    let n = read_count(reader, order)?;
    let mut line_info = Vec::with_capacity(n as usize);
    for _ in 0..n {
        line_info.push(reader.read_u32(order)?);
    }
    Ok(line_info)
}

fn read_loc_vars(reader: &mut Reader, order: Endianness) -> Result<Vec<LocalVarDesc>, LoaderError> {
    let n = read_count(reader, order)?;
    let mut loc_vars = Vec::with_capacity(n as usize);
    for _ in 0..n {
        loc_vars.push(LocalVarDesc {
            name: reader.read_lua_string(order)?,
            start_pc: reader.read_u32(order)?,
            end_pc: reader.read_u32(order)?,
        });
    }
    Ok(loc_vars)
}

fn read_upvalue_names(reader: &mut Reader, order: Endianness) -> Result<Vec<Vec<u8>>, LoaderError> {
    let n = read_count(reader, order)?;
    let mut names = Vec::with_capacity(n as usize);
    for _ in 0..n {
        names.push(reader.read_lua_string(order)?);
    }
    Ok(names)
}

fn load_prototype_bytes(
    reader: &mut Reader,
    order: Endianness,
    parent_source: &[u8],
) -> Result<Prototype, LoaderError> {
    let mut source = reader.read_lua_string(order)?;
    if source.is_empty() {
        source = parent_source.to_vec();
    }
    let line_defined = reader.read_u32(order)?;
    let last_line_defined = reader.read_u32(order)?;
    let num_params = reader.read_byte()?;
    let is_vararg = reader.read_byte()? != 0;
    let max_stack_size = reader.read_byte()?;
    let code = read_code(reader, order)?;
    let constants = read_constants(reader, order)?;
    let upvalues = read_upvalues(reader, order)?;
    let protos = read_protos(reader, order, &source)?;
    let line_info = read_line_info(reader, order)?;
    let loc_vars = read_loc_vars(reader, order)?;
    let upvalue_names = read_upvalue_names(reader, order)?;

    Ok(Prototype {
        source,
        line_defined,
        last_line_defined,
        num_params,
        is_vararg,
        max_stack_size,
        code,
        constants,
        upvalues,
        protos,
        line_info,
        loc_vars,
        upvalue_names,
    })
}

/// public recursive entry point used by [`crate::loader::load_chunk`].
pub fn load_prototype(
    reader: &mut Reader,
    order: Endianness,
    parent_source: &str,
) -> Result<Prototype, LoaderError> {
    load_prototype_bytes(reader, order, parent_source.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode_string(s: &[u8]) -> Vec<u8> {
        let mut out = vec![(s.len() + 1) as u8];
        out.extend_from_slice(s);
        out
    }

    #[test]
    fn empty_prototype_round_trips() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_string(b"chunk"));
        bytes.extend_from_slice(&0u32.to_le_bytes()); // line_defined
        bytes.extend_from_slice(&0u32.to_le_bytes()); // last_line_defined
        bytes.push(0); // num_params
        bytes.push(0); // is_vararg
        bytes.push(2); // max_stack_size
        bytes.extend_from_slice(&0u32.to_le_bytes()); // code count
        bytes.extend_from_slice(&0u32.to_le_bytes()); // constants count
        bytes.extend_from_slice(&0u32.to_le_bytes()); // upvalues count
        bytes.extend_from_slice(&0u32.to_le_bytes()); // protos count
        bytes.extend_from_slice(&0u32.to_le_bytes()); // line info count
        bytes.extend_from_slice(&0u32.to_le_bytes()); // loc vars count
        bytes.extend_from_slice(&0u32.to_le_bytes()); // upvalue names count

        let mut reader = Reader::new(&bytes);
        let proto = load_prototype(&mut reader, Endianness::Little, "").unwrap();
        assert_eq!(proto.source, b"chunk".to_vec());
        assert_eq!(proto.max_stack_size, 2);
        assert!(proto.code.is_empty());
    }

    #[test]
    fn empty_source_inherits_from_parent() {
        let mut bytes = Vec::new();
        bytes.push(0u8); // empty source
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.push(0);
        bytes.push(0);
        bytes.push(2);
        for _ in 0..7 {
            bytes.extend_from_slice(&0u32.to_le_bytes());
        }
        let mut reader = Reader::new(&bytes);
        let proto = load_prototype(&mut reader, Endianness::Little, "parent.lua").unwrap();
        assert_eq!(proto.source, b"parent.lua".to_vec());
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use crate::header::{
    Endianness, DATA_MARKER, FORMAT, INSTRUCTION_SIZE, INT_SIZE, LUAC_INT, LUAC_NUM,
    LUA_INTEGER_SIZE, LUA_NUMBER_SIZE, SIGNATURE, SIZE_T_SIZE, VERSION,
};
use crate::loader::LoaderError;

/// a forward-only cursor over a precompiled chunk's bytes.
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, offset: 0 }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], LoaderError> {
        let end = self.offset.checked_add(n).ok_or(LoaderError::Truncated)?;
        if end > self.data.len() {
            return Err(LoaderError::Truncated);
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn read_byte(&mut self) -> Result<u8, LoaderError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self, order: Endianness) -> Result<u32, LoaderError> {
        let bytes: [u8; 4] = self.read_bytes(4)?.try_into().unwrap();
        Ok(match order {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_u64(&mut self, order: Endianness) -> Result<u64, LoaderError> {
        let bytes: [u8; 8] = self.read_bytes(8)?.try_into().unwrap();
        Ok(match order {
            Endianness::Little => u64::from_le_bytes(bytes),
            Endianness::Big => u64::from_be_bytes(bytes),
        })
    }

    pub fn read_f64(&mut self, order: Endianness) -> Result<f64, LoaderError> {
        Ok(f64::from_bits(self.read_u64(order)?))
    }

    /// lua's string encoding: a length-prefix byte, `0` for the empty
    /// string, `0xff` meaning "an 8-byte length follows", otherwise the
    /// prefix byte minus one is the length. the content itself is never
    /// required to be valid UTF-8 (it is an arbitrary byte string), so this
    /// returns raw bytes rather than `String`.
    pub fn read_lua_string(&mut self, order: Endianness) -> Result<Vec<u8>, LoaderError> {
        let prefix = self.read_byte()?;
        if prefix == 0 {
            return Ok(Vec::new());
        }
        let len = if prefix == 0xff {
            self.read_u64(order)? as usize
        } else {
            prefix as usize
        };
        if len == 0 {
            return Err(LoaderError::Corrupted);
        }
        Ok(self.read_bytes(len - 1)?.to_vec())
    }

    fn check_literal(&mut self, expected: &[u8], err: LoaderError) -> Result<(), LoaderError> {
        let actual = self.read_bytes(expected.len())?;
        if actual == expected {
            Ok(())
        } else {
            Err(err)
        }
    }

    fn check_size(&mut self, expected: u8, name: &'static str) -> Result<(), LoaderError> {
        if self.read_byte()? == expected {
            Ok(())
        } else {
            Err(LoaderError::SizeMismatch(name))
        }
    }

    /// validate every fixed header field and return the chunk's byte order,
    /// detected from the `LUAC_INT` probe.
    pub fn check_header(&mut self) -> Result<Endianness, LoaderError> {
        self.check_literal(SIGNATURE, LoaderError::NotAPrecompiledChunk)?;
        if self.read_byte()? != VERSION {
            return Err(LoaderError::VersionMismatch);
        }
        if self.read_byte()? != FORMAT {
            return Err(LoaderError::FormatMismatch);
        }
        self.check_literal(DATA_MARKER, LoaderError::Corrupted)?;
        self.check_size(INT_SIZE, "int")?;
        self.check_size(SIZE_T_SIZE, "size_t")?;
        self.check_size(INSTRUCTION_SIZE, "Instruction")?;
        self.check_size(LUA_INTEGER_SIZE, "lua_Integer")?;
        self.check_size(LUA_NUMBER_SIZE, "lua_Number")?;

        let probe = self.read_bytes(8)?;
        let probe: [u8; 8] = probe.try_into().unwrap();
        let order = if u64::from_le_bytes(probe) == LUAC_INT {
            Endianness::Little
        } else if u64::from_be_bytes(probe) == LUAC_INT {
            Endianness::Big
        } else {
            return Err(LoaderError::Corrupted);
        };

        if self.read_f64(order)? != LUAC_NUM {
            return Err(LoaderError::SizeMismatch("lua_Number format"));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_header(order: Endianness) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SIGNATURE);
        bytes.push(VERSION);
        bytes.push(FORMAT);
        bytes.extend_from_slice(DATA_MARKER);
        bytes.push(INT_SIZE);
        bytes.push(SIZE_T_SIZE);
        bytes.push(INSTRUCTION_SIZE);
        bytes.push(LUA_INTEGER_SIZE);
        bytes.push(LUA_NUMBER_SIZE);
        match order {
            Endianness::Little => {
                bytes.extend_from_slice(&LUAC_INT.to_le_bytes());
                bytes.extend_from_slice(&LUAC_NUM.to_bits().to_le_bytes());
            }
            Endianness::Big => {
                bytes.extend_from_slice(&LUAC_INT.to_be_bytes());
                bytes.extend_from_slice(&LUAC_NUM.to_bits().to_be_bytes());
            }
        }
        bytes
    }

    #[test]
    fn detects_little_endian_header() {
        let bytes = valid_header(Endianness::Little);
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.check_header(), Ok(Endianness::Little));
    }

    #[test]
    fn detects_big_endian_header() {
        let bytes = valid_header(Endianness::Big);
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.check_header(), Ok(Endianness::Big));
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut bytes = valid_header(Endianness::Little);
        bytes[4] = 0x52;
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.check_header(), Err(LoaderError::VersionMismatch));
    }

    #[test]
    fn short_string_round_trip() {
        let mut bytes = vec![4u8];
        bytes.extend_from_slice(b"abc");
        let mut reader = Reader::new(&bytes);
        assert_eq!(
            reader.read_lua_string(Endianness::Little).unwrap(),
            b"abc".to_vec()
        );
    }

    #[test]
    fn empty_string_is_zero_byte() {
        let bytes = vec![0u8];
        let mut reader = Reader::new(&bytes);
        assert_eq!(
            reader.read_lua_string(Endianness::Little).unwrap(),
            Vec::<u8>::new()
        );
    }
}

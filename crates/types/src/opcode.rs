// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// note:
//
// every instruction is a fixed 32-bit word, in one of four formats
// (see `instruction.rs` for the bit layout of each):
//
// - iABC:  op(6) A(8) C(9) B(9)   -- three register/constant operands
// - iABx:  op(6) A(8) Bx(18)      -- one large unsigned operand
// - iAsBx: op(6) A(8) sBx(18)     -- one large signed operand (jump offsets)
// - iAx:   op(6) Ax(26)           -- one very large operand (EXTRAARG only)
//
// `B`/`C` operands that index into the constant pool rather than a register
// are called "RK" operands: the high bit of the 9-bit field selects which.

/// instruction formats, indexed by [`Opcode::format`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Format {
    ABC,
    ABx,
    AsBx,
    Ax,
}

/// whether an operand is unused, a plain register, an RK (register-or-
/// constant) operand, or a straight constant-pool index.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OperandMode {
    Unused,
    Register,
    RegisterOrConstant,
    Constant,
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    // data movement and constant loading
    MOVE = 0,       // R(A) := R(B)
    LOADK,          // R(A) := Kst(Bx)
    LOADKX,         // R(A) := Kst(extra arg); followed by an EXTRAARG
    LOADBOOL,       // R(A) := (bool)B; if C then pc++
    LOADNIL,        // R(A), R(A+1), ..., R(A+B) := nil

    // upvalues and tables
    GETUPVAL,       // R(A) := UpValue[B]
    GETTABUP,       // R(A) := UpValue[B][RK(C)]
    GETTABLE,       // R(A) := R(B)[RK(C)]
    SETTABUP,       // UpValue[A][RK(B)] := RK(C)
    SETUPVAL,       // UpValue[B] := R(A)
    SETTABLE,       // R(A)[RK(B)] := RK(C)
    NEWTABLE,       // R(A) := {} (size hints in B, C, fb-encoded)
    SELF,           // R(A+1) := R(B); R(A) := R(B)[RK(C)]

    // arithmetic
    ADD,            // R(A) := RK(B) + RK(C)
    SUB,            // R(A) := RK(B) - RK(C)
    MUL,            // R(A) := RK(B) * RK(C)
    MOD,            // R(A) := RK(B) % RK(C)
    POW,            // R(A) := RK(B) ^ RK(C)
    DIV,            // R(A) := RK(B) / RK(C)
    IDIV,           // R(A) := RK(B) // RK(C)
    BAND,           // R(A) := RK(B) & RK(C)
    BOR,            // R(A) := RK(B) | RK(C)
    BXOR,           // R(A) := RK(B) ~ RK(C)
    SHL,            // R(A) := RK(B) << RK(C)
    SHR,            // R(A) := RK(B) >> RK(C)
    UNM,            // R(A) := -R(B)
    BNOT,           // R(A) := ~R(B)
    NOT,            // R(A) := not R(B)
    LEN,            // R(A) := length of R(B)

    CONCAT,         // R(A) := R(B).. ... ..R(C)

    // control flow
    JMP,            // pc += sBx; if A != 0 then close upvalues >= R(A-1)
    EQ,             // if (RK(B) == RK(C)) != A then pc++
    LT,             // if (RK(B) <  RK(C)) != A then pc++
    LE,             // if (RK(B) <= RK(C)) != A then pc++
    TEST,           // if (bool)R(A) != C then pc++
    TESTSET,        // if (bool)R(B) == C then R(A) := R(B) else pc++

    // calls and returns
    CALL,           // R(A), ..., R(A+C-2) := R(A)(R(A+1), ..., R(A+B-1))
    TAILCALL,       // return R(A)(R(A+1), ..., R(A+B-1))
    RETURN,         // return R(A), ..., R(A+B-2)

    // numeric for-loops
    FORLOOP,        // R(A) += R(A+2); if loop continues then pc += sBx
    FORPREP,        // R(A) -= R(A+2); pc += sBx

    // generic for-loops
    TFORCALL,       // R(A+3), ... := R(A)(R(A+1), R(A+2))
    TFORLOOP,       // if R(A+1) != nil then R(A) := R(A+1); pc += sBx

    SETLIST,        // R(A)[C*FPF+i] := R(A+i), 1 <= i <= B

    CLOSURE,        // R(A) := closure(KPROTO[Bx])

    VARARG,         // R(A), R(A+1), ..., R(A+B-2) := vararg

    EXTRAARG = 46,  // carries a large unsigned operand for LOADKX/SETLIST
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        if byte <= Opcode::EXTRAARG as u8 {
            // safety: every discriminant in 0..=46 is assigned above.
            Some(unsafe { std::mem::transmute::<u8, Opcode>(byte) })
        } else {
            None
        }
    }

    pub fn format(self) -> Format {
        use Opcode::*;
        match self {
            LOADK | GETTABUP | CLOSURE => Format::ABx,
            JMP | FORLOOP | FORPREP | TFORLOOP => Format::AsBx,
            EXTRAARG => Format::Ax,
            _ => Format::ABC,
        }
    }

    pub fn b_mode(self) -> OperandMode {
        use Opcode::*;
        match self {
            MOVE | LOADBOOL | LOADNIL | NEWTABLE | CALL | TAILCALL | RETURN | FORLOOP
            | FORPREP | TFORCALL | TFORLOOP | VARARG | EXTRAARG | LOADKX | LOADK | CLOSURE
            | GETUPVAL | SETUPVAL | SETLIST => OperandMode::Unused,
            GETTABUP | GETTABLE | SETTABUP | SETTABLE | SELF | ADD | SUB | MUL | MOD | POW
            | DIV | IDIV | BAND | BOR | BXOR | SHL | SHR | EQ | LT | LE => {
                OperandMode::RegisterOrConstant
            }
            UNM | BNOT | NOT | LEN | CONCAT | TESTSET | JMP => OperandMode::Register,
            TEST => OperandMode::Unused,
        }
    }

    pub fn c_mode(self) -> OperandMode {
        use Opcode::*;
        match self {
            MOVE | LOADK | LOADKX | UNM | BNOT | NOT | LEN | JMP | FORLOOP | FORPREP
            | TFORLOOP | CLOSURE | VARARG | GETUPVAL | SETUPVAL | EXTRAARG => {
                OperandMode::Unused
            }
            GETTABUP | GETTABLE | SETTABUP | SETTABLE | SELF | ADD | SUB | MUL | MOD | POW
            | DIV | IDIV | BAND | BOR | BXOR | SHL | SHR | EQ | LT | LE => {
                OperandMode::RegisterOrConstant
            }
            CONCAT => OperandMode::Register,
            LOADBOOL | LOADNIL | NEWTABLE | TEST | TESTSET | CALL | TAILCALL | RETURN
            | TFORCALL | SETLIST => OperandMode::Unused,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            MOVE => "MOVE",
            LOADK => "LOADK",
            LOADKX => "LOADKX",
            LOADBOOL => "LOADBOOL",
            LOADNIL => "LOADNIL",
            GETUPVAL => "GETUPVAL",
            GETTABUP => "GETTABUP",
            GETTABLE => "GETTABLE",
            SETTABUP => "SETTABUP",
            SETUPVAL => "SETUPVAL",
            SETTABLE => "SETTABLE",
            NEWTABLE => "NEWTABLE",
            SELF => "SELF",
            ADD => "ADD",
            SUB => "SUB",
            MUL => "MUL",
            MOD => "MOD",
            POW => "POW",
            DIV => "DIV",
            IDIV => "IDIV",
            BAND => "BAND",
            BOR => "BOR",
            BXOR => "BXOR",
            SHL => "SHL",
            SHR => "SHR",
            UNM => "UNM",
            BNOT => "BNOT",
            NOT => "NOT",
            LEN => "LEN",
            CONCAT => "CONCAT",
            JMP => "JMP",
            EQ => "EQ",
            LT => "LT",
            LE => "LE",
            TEST => "TEST",
            TESTSET => "TESTSET",
            CALL => "CALL",
            TAILCALL => "TAILCALL",
            RETURN => "RETURN",
            FORLOOP => "FORLOOP",
            FORPREP => "FORPREP",
            TFORCALL => "TFORCALL",
            TFORLOOP => "TFORLOOP",
            SETLIST => "SETLIST",
            CLOSURE => "CLOSURE",
            VARARG => "VARARG",
            EXTRAARG => "EXTRAARG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_match_the_expected_ordering() {
        assert_eq!(Opcode::MOVE as u8, 0);
        assert_eq!(Opcode::NOT as u8, 27);
        assert_eq!(Opcode::EXTRAARG as u8, 46);
    }

    #[test]
    fn from_u8_round_trips_every_opcode() {
        for byte in 0..=46u8 {
            let op = Opcode::from_u8(byte).expect("valid opcode byte");
            assert_eq!(op as u8, byte);
        }
        assert!(Opcode::from_u8(47).is_none());
    }

    #[test]
    fn jump_family_uses_signed_format() {
        assert_eq!(Opcode::JMP.format(), Format::AsBx);
        assert_eq!(Opcode::FORLOOP.format(), Format::AsBx);
        assert_eq!(Opcode::LOADK.format(), Format::ABx);
        assert_eq!(Opcode::EXTRAARG.format(), Format::Ax);
        assert_eq!(Opcode::ADD.format(), Format::ABC);
    }
}

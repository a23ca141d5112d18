//! The internal representation of a program: a flat list of [Opcode]s.

use std::fmt;

/// The operations the code generator emits, and the assembler knows how to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeKind {
    MovePointerInc,
    MovePointerDec,
    /// Move the pointer right by the operand.
    MovePointerAdd,
    /// Move the pointer left by the operand.
    MovePointerSub,
    CellInc,
    CellDec,
    /// Add the operand (mod 256) to the current cell.
    CellAdd,
    /// Subtract the operand (mod 256) from the current cell.
    CellSub,
    CellZero,
    OutputChar,
    InputChar,
    LoopOpen,
    LoopClose,
    EndOfStream,
}

/// One operation and its operand. The operand is 0 unless the kind carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub kind: OpcodeKind,
    pub operand: u32,
}

impl OpcodeKind {
    /// Every kind, in declaration order.
    pub const ALL: [OpcodeKind; 14] = [
        OpcodeKind::MovePointerInc,
        OpcodeKind::MovePointerDec,
        OpcodeKind::MovePointerAdd,
        OpcodeKind::MovePointerSub,
        OpcodeKind::CellInc,
        OpcodeKind::CellDec,
        OpcodeKind::CellAdd,
        OpcodeKind::CellSub,
        OpcodeKind::CellZero,
        OpcodeKind::OutputChar,
        OpcodeKind::InputChar,
        OpcodeKind::LoopOpen,
        OpcodeKind::LoopClose,
        OpcodeKind::EndOfStream,
    ];

    /// Whether this kind is followed by a literal operand.
    pub fn has_operand(self) -> bool {
        use OpcodeKind::*;
        matches!(self, MovePointerAdd | MovePointerSub | CellAdd | CellSub)
    }

    /// Whether a neighbouring opcode of the same family could have been folded into this one.
    pub fn is_coalesced(self) -> bool {
        use OpcodeKind::*;
        matches!(
            self,
            MovePointerInc
                | MovePointerDec
                | MovePointerAdd
                | MovePointerSub
                | CellInc
                | CellDec
                | CellAdd
                | CellSub
        )
    }
}

impl Opcode {
    /// An opcode without an operand.
    pub fn unary(kind: OpcodeKind) -> Self {
        Opcode { kind, operand: 0 }
    }

    pub fn with_operand(kind: OpcodeKind, operand: u32) -> Self {
        Opcode { kind, operand }
    }
}

impl From<OpcodeKind> for Opcode {
    fn from(kind: OpcodeKind) -> Self {
        Opcode::unary(kind)
    }
}

/// Prints opcodes in a pseudo-assembly format.
pub fn disassemble(code: &[Opcode]) -> String {
    let mut listing = String::new();
    for (i, opcode) in code.iter().enumerate() {
        listing.push_str(&format!("{:4}: {}\n", i, opcode));
    }

    listing
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use OpcodeKind::*;
        match self.kind {
            MovePointerInc => write!(f, "inc\tp"),
            MovePointerDec => write!(f, "dec\tp"),
            MovePointerAdd => write!(f, "add\tp, #{}", self.operand),
            MovePointerSub => write!(f, "sub\tp, #{}", self.operand),
            CellInc => write!(f, "inc\t[p]"),
            CellDec => write!(f, "dec\t[p]"),
            CellAdd => write!(f, "add\t[p], #{}", self.operand as u8),
            CellSub => write!(f, "sub\t[p], #{}", self.operand as u8),
            CellZero => write!(f, "zero\t[p]"),
            OutputChar => write!(f, "putchar\t[p]"),
            InputChar => write!(f, "getchar\t[p]"),
            LoopOpen => write!(f, "beq\t[p], end"),
            LoopClose => write!(f, "bne\t[p], start"),
            EndOfStream => write!(f, "terminate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OpcodeKind::*;
    use super::*;

    #[test]
    fn operands_only_on_arithmetic() {
        let with_operands: Vec<_> = OpcodeKind::ALL
            .into_iter()
            .filter(|kind| kind.has_operand())
            .collect();

        assert_eq!(
            vec![MovePointerAdd, MovePointerSub, CellAdd, CellSub],
            with_operands
        );
    }

    #[test]
    fn disassembles_one_line_per_opcode() {
        let code = [
            Opcode::with_operand(CellAdd, 3),
            Opcode::unary(OutputChar),
            Opcode::unary(EndOfStream),
        ];

        assert_eq!(
            "   0: add\t[p], #3\n   1: putchar\t[p]\n   2: terminate\n",
            disassemble(&code)
        );
    }
}

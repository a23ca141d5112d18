//! Machine-code templates for each [OpcodeKind].
//!
//! The assembler only ever asks an [InstructionSet] for a prologue, an epilogue, and the
//! [Template] of one opcode kind at a time; everything architecture-specific lives behind that
//! trait.

pub mod x86_64;

use crate::ir::OpcodeKind;

/// What follows a [Template]'s fixed bytes in the encoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Nothing; the template is the whole instruction.
    None,
    /// One byte: the opcode's operand, truncated modulo 256.
    Byte,
    /// Four bytes, little-endian: the opcode's operand.
    Word,
    /// Four bytes, little-endian: a signed jump offset, relative to the end of the instruction,
    /// filled in by the assembler once the matching bracket is known.
    JumpOffset,
}

/// The fixed part of one machine instruction, and the operand that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub bytes: &'static [u8],
    pub operand: Operand,
}

impl Operand {
    /// Number of bytes the operand occupies.
    pub fn len(self) -> usize {
        match self {
            Operand::None => 0,
            Operand::Byte => 1,
            Operand::Word | Operand::JumpOffset => 4,
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl Template {
    pub const fn new(bytes: &'static [u8], operand: Operand) -> Self {
        Template { bytes, operand }
    }

    pub fn has_variable_operand(&self) -> bool {
        self.operand != Operand::None
    }

    /// The full size of the instruction, operand included.
    pub fn encoded_len(&self) -> usize {
        self.bytes.len() + self.operand.len()
    }
}

/// A target architecture, as far as the assembler is concerned.
pub trait InstructionSet {
    /// Emitted once, before any opcode. Binds the (getchar, putchar, tape) arguments.
    fn prologue(&self) -> &'static [u8];

    /// Emitted once, after the last opcode. Restores registers and returns.
    fn epilogue(&self) -> &'static [u8];

    /// The template for the given kind, or [None] if the kind is never encoded
    /// (that is, [OpcodeKind::EndOfStream]).
    fn template(&self, kind: OpcodeKind) -> Option<&'static Template>;

    /// The largest encoding of any single opcode.
    fn max_encoded_len(&self) -> usize {
        OpcodeKind::ALL
            .iter()
            .filter_map(|&kind| self.template(kind))
            .map(Template::encoded_len)
            .max()
            .unwrap_or(0)
    }

    /// An upper bound on the machine code needed for `opcodes` opcodes.
    fn worst_case_size(&self, opcodes: usize) -> usize {
        self.prologue().len() + self.epilogue().len() + opcodes * self.max_encoded_len()
    }
}

//! Assembles [Opcode]s into machine code, in one pass.
//!
//! Every opcode is a copy of its [Template], followed by its operand, if any. Loops are the
//! interesting part: when a `[` is assembled, the place where its jump offset goes is not known
//! yet, so four bytes are left blank and the position right after them is remembered on a
//! [BracketStack]. The matching `]` pops that position, jumps back to it, and patches the blank
//! with the distance to the end of the `]`.

use crate::asm::x86_64::X86_64;
use crate::asm::{InstructionSet, Operand, Template};
use crate::errors::JitError;
use crate::ir::{Opcode, OpcodeKind};

/// A byte offset from the start of the machine code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CodeOffset(pub usize);

/// Assemble the opcodes for x86-64.
pub fn assemble(code: &[Opcode]) -> Result<Vec<u8>, JitError> {
    Assembler::new(&X86_64).assemble(code)
}

/// Turns [Opcode]s into machine code for the given [InstructionSet].
pub struct Assembler<'a, I: InstructionSet> {
    isa: &'a I,
}

impl<'a, I: InstructionSet> Assembler<'a, I> {
    pub fn new(isa: &'a I) -> Self {
        Assembler { isa }
    }

    /// Assembles every opcode up to (not including) the first [OpcodeKind::EndOfStream].
    ///
    /// # Panics
    ///
    /// If the loops are not balanced. The code generator never produces such code.
    pub fn assemble(&self, code: &[Opcode]) -> Result<Vec<u8>, JitError> {
        let capacity = self.isa.worst_case_size(code.len());
        let mut buffer = CodeBuffer::with_capacity(capacity);
        let mut brackets = BracketStack::new();
        let mut previous: Option<OpcodeKind> = None;

        buffer.emit(self.isa.prologue())?;

        for &opcode in code {
            let template = match self.isa.template(opcode.kind) {
                Some(template) => template,
                None => break,
            };

            buffer.emit(template.bytes)?;
            match template.operand {
                Operand::None => (),
                Operand::Byte => buffer.emit(&[(opcode.operand & 0xFF) as u8])?,
                Operand::Word => buffer.emit(&opcode.operand.to_le_bytes())?,
                Operand::JumpOffset => match opcode.kind {
                    OpcodeKind::LoopOpen => {
                        buffer.emit(&[0; 4])?;
                        brackets.push(buffer.position());
                    }
                    OpcodeKind::LoopClose => {
                        let elide = previous == Some(OpcodeKind::CellZero);
                        self.close_loop(&mut buffer, &mut brackets, template, elide)?;
                    }
                    other => panic!("{:?} does not take a jump offset", other),
                },
            }

            previous = Some(opcode.kind);
        }

        assert!(
            brackets.is_empty(),
            "tried to finish assembly, but there are still {} unclosed loops!",
            brackets.len()
        );

        buffer.emit(self.isa.epilogue())?;
        tracing::debug!(bytes = buffer.len(), capacity, "assembled machine code");

        Ok(buffer.into_bytes())
    }

    fn close_loop(
        &self,
        buffer: &mut CodeBuffer,
        brackets: &mut BracketStack,
        template: &Template,
        elide: bool,
    ) -> Result<(), JitError> {
        let open = brackets.pop();

        if elide {
            // The body ends by zeroing the cell, so the loop can never go around again.
            buffer.rewind(template.bytes.len());
        } else {
            let from = CodeOffset(buffer.position().0 + 4);
            let backwards = relative_jump(from, open)?;
            buffer.emit(&backwards.to_le_bytes())?;
        }

        let forwards = relative_jump(open, buffer.position())?;
        buffer.patch(CodeOffset(open.0 - 4), &forwards.to_le_bytes());

        Ok(())
    }
}

/// The offset of a jump whose instruction ends at `from` and that lands on `to`.
fn relative_jump(from: CodeOffset, to: CodeOffset) -> Result<i32, JitError> {
    let distance = to.0 as i64 - from.0 as i64;
    i32::try_from(distance).map_err(|_| JitError::JumpOutOfRange { distance })
}

/// Append-only machine code, that may never grow past its capacity.
struct CodeBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl CodeBuffer {
    fn with_capacity(capacity: usize) -> Self {
        CodeBuffer {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn position(&self) -> CodeOffset {
        CodeOffset(self.bytes.len())
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<(), JitError> {
        let needed = self.bytes.len() + bytes.len();
        if needed > self.capacity {
            return Err(JitError::EncodingCapacityExceeded {
                needed,
                capacity: self.capacity,
            });
        }

        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Overwrites already emitted bytes.
    fn patch(&mut self, at: CodeOffset, bytes: &[u8]) {
        let CodeOffset(start) = at;
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Forgets the last `n` bytes.
    fn rewind(&mut self, n: usize) {
        let len = self.bytes.len();
        assert!(n <= len, "cannot rewind {} bytes out of {}", n, len);
        self.bytes.truncate(len - n);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Positions right after each unclosed `[`'s jump offset, innermost last.
struct BracketStack {
    stack: Vec<CodeOffset>,
}

impl BracketStack {
    fn new() -> Self {
        BracketStack { stack: Vec::new() }
    }

    fn push(&mut self, offset: CodeOffset) {
        self.stack.push(offset);
    }

    fn pop(&mut self) -> CodeOffset {
        self.stack
            .pop()
            .expect("']' without a matching '[' should have been rejected by the code generator")
    }

    fn len(&self) -> usize {
        self.stack.len()
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

//! Templates for x86-64, System V calling convention.
//!
//! REGISTERS (during the function):
//!
//! ```text
//! rbx (callee saved) - pointer to the current cell of the tape
//! r12 (callee saved) - getchar()
//! r13 (callee saved) - putchar()
//! rdi                - argument to putchar()
//! al                 - result of getchar()
//! ```
//!
//! On entry, `rdi` holds getchar, `rsi` holds putchar, and `rdx` holds the tape.
//!
//! STACK (after the prologue):
//!
//! ```text
//! rsp + 0x00 [ ...padding  ]
//! rsp + 0x08 [previous r13]
//! rsp + 0x10 [previous r12]
//! rsp + 0x18 [previous rbx]
//! rsp + 0x20 [previous rbp] <- rbp
//! rsp + 0x28 [return addr ]
//! ```
//!
//! The padding keeps `rsp` 16-byte aligned at every `call`.

use super::{InstructionSet, Operand, Template};
use crate::ir::OpcodeKind;

/// The x86-64 instruction set.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86_64;

static PROLOGUE: [u8; 22] = [
    0x55, //                   push rbp
    0x48, 0x89, 0xe5, //       mov  rbp, rsp
    0x53, //                   push rbx
    0x41, 0x54, //             push r12
    0x41, 0x55, //             push r13
    0x48, 0x83, 0xec, 0x08, // sub  rsp, 8
    0x49, 0x89, 0xfc, //       mov  r12, rdi
    0x49, 0x89, 0xf5, //       mov  r13, rsi
    0x48, 0x89, 0xd3, //       mov  rbx, rdx
];

static EPILOGUE: [u8; 11] = [
    0x48, 0x83, 0xc4, 0x08, // add  rsp, 8
    0x41, 0x5d, //             pop  r13
    0x41, 0x5c, //             pop  r12
    0x5b, //                   pop  rbx
    0x5d, //                   pop  rbp
    0xc3, //                   ret
];

// inc rbx
static INC_PTR: Template = Template::new(&[0x48, 0xff, 0xc3], Operand::None);
// dec rbx
static DEC_PTR: Template = Template::new(&[0x48, 0xff, 0xcb], Operand::None);
// add rbx, imm32
static ADD_PTR: Template = Template::new(&[0x48, 0x81, 0xc3], Operand::Word);
// sub rbx, imm32
static SUB_PTR: Template = Template::new(&[0x48, 0x81, 0xeb], Operand::Word);
// inc byte [rbx]
static INC: Template = Template::new(&[0xfe, 0x03], Operand::None);
// dec byte [rbx]
static DEC: Template = Template::new(&[0xfe, 0x0b], Operand::None);
// add byte [rbx], imm8
static ADD: Template = Template::new(&[0x80, 0x03], Operand::Byte);
// sub byte [rbx], imm8
static SUB: Template = Template::new(&[0x80, 0x2b], Operand::Byte);
// mov byte [rbx], 0
static ZERO: Template = Template::new(&[0xc6, 0x03, 0x00], Operand::None);
static PUT_CHAR: Template = Template::new(
    &[
        0x0f, 0xb6, 0x3b, // movzx edi, byte [rbx]
        0x41, 0xff, 0xd5, // call  r13
    ],
    Operand::None,
);
static GET_CHAR: Template = Template::new(
    &[
        0x41, 0xff, 0xd4, // call r12
        0x88, 0x03, //       mov  [rbx], al
    ],
    Operand::None,
);
static OPEN_LOOP: Template = Template::new(
    &[
        0x80, 0x3b, 0x00, // cmp byte [rbx], 0
        0x0f, 0x84, //       je  rel32
    ],
    Operand::JumpOffset,
);
static CLOSE_LOOP: Template = Template::new(
    &[
        0x80, 0x3b, 0x00, // cmp byte [rbx], 0
        0x0f, 0x85, //       jne rel32
    ],
    Operand::JumpOffset,
);

impl InstructionSet for X86_64 {
    fn prologue(&self) -> &'static [u8] {
        &PROLOGUE
    }

    fn epilogue(&self) -> &'static [u8] {
        &EPILOGUE
    }

    fn template(&self, kind: OpcodeKind) -> Option<&'static Template> {
        use OpcodeKind::*;
        match kind {
            MovePointerInc => Some(&INC_PTR),
            MovePointerDec => Some(&DEC_PTR),
            MovePointerAdd => Some(&ADD_PTR),
            MovePointerSub => Some(&SUB_PTR),
            CellInc => Some(&INC),
            CellDec => Some(&DEC),
            CellAdd => Some(&ADD),
            CellSub => Some(&SUB),
            CellZero => Some(&ZERO),
            OutputChar => Some(&PUT_CHAR),
            InputChar => Some(&GET_CHAR),
            LoopOpen => Some(&OPEN_LOOP),
            LoopClose => Some(&CLOSE_LOOP),
            EndOfStream => None,
        }
    }
}

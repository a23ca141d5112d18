//! bfjit internals.
//!
//! Brainfuck goes in, x86-64 machine code comes out, and runs right here in this process:
//!
//!  - source text is split into [tokenizer::Token]s;
//!  - the tokens are turned into an optimized sequence of [Opcode]s by a small state machine
//!    ([codegen]) that folds runs, drops dead loops, and turns `[-]` into a single store;
//!  - the opcodes are [assembled](assembler) into machine code, one template per opcode, with
//!    loop jumps patched in as their brackets close;
//!  - the machine code is mapped executable and called as a function ([CompiledProgram]).

extern crate mmap_jit;

pub mod asm;
pub mod assembler;
pub mod codegen;
pub mod errors;
pub mod ir;
pub mod source;
pub mod tape;
pub mod tokenizer;

mod jit;
mod program;

use std::path::Path;

pub use crate::assembler::assemble;
pub use crate::codegen::GeneratorOptions;
pub use crate::errors::{Diagnostic, Diagnostics, JitError, Reason};
pub use crate::ir::{Opcode, OpcodeKind};
pub use crate::jit::{execute, CompiledProgram};
pub use crate::program::{CharIo, Streams, EOF};
pub use crate::tape::{Tape, TAPE_LEN};

/// Compile source text to opcodes with the default options.
pub fn compile(source_text: &[u8]) -> Result<Vec<Opcode>, Diagnostics> {
    compile_with_options(source_text, GeneratorOptions::default())
}

/// Compile source text to opcodes. Any diagnostic at all means there is no program.
pub fn compile_with_options(
    source_text: &[u8],
    options: GeneratorOptions,
) -> Result<Vec<Opcode>, Diagnostics> {
    let tokens = tokenizer::tokenize(source_text);
    codegen::generate_with_options(&tokens, options)
}

/// Load a file and compile it. A file that cannot be read is never tokenized.
pub fn compile_file(
    path: impl AsRef<Path>,
    options: GeneratorOptions,
) -> Result<Vec<Opcode>, Diagnostics> {
    let source_text = source::load_source(path).map_err(|diagnostic| {
        let mut diagnostics = Diagnostics::with_limit(options.diagnostic_limit);
        diagnostics.push(diagnostic);
        diagnostics
    })?;

    compile_with_options(&source_text, options)
}

/// Assemble the opcodes and load the machine code, ready to run.
pub fn jit_compile(code: &[Opcode]) -> Result<CompiledProgram, JitError> {
    let binary = assemble(code)?;
    CompiledProgram::from_binary(&binary)
}

//! Runs machine code inside the current process.
//!
//! This is the only place that deals with executable memory: bytes go in, get mapped as
//! read + execute, are called as a function, and are unmapped when the [CompiledProgram] is
//! dropped.

use mmap_jit::{ExecutableRegion, WritableRegion};

use crate::errors::JitError;
use crate::program::{self, CharIo, GetChar, PutChar, Streams};
use crate::tape::Tape;

/// The signature of assembled code: `void program(getchar, putchar, uint8_t *tape)`.
type NativeProgram = unsafe extern "C" fn(GetChar, PutChar, *mut u8);

/// Machine code that is ready to run.
pub struct CompiledProgram {
    code: ExecutableRegion,
}

impl CompiledProgram {
    /// Copies the machine code into a fresh region and makes it executable.
    ///
    /// The region is never writable and executable at the same time. If it cannot be made
    /// executable, it is released and nothing can be run.
    pub fn from_binary(binary: &[u8]) -> Result<CompiledProgram, JitError> {
        if !cfg!(all(unix, target_arch = "x86_64")) {
            return Err(JitError::UnsupportedArchitecture);
        }

        let mut mem = WritableRegion::allocate(binary.len())?;
        mem[..binary.len()].copy_from_slice(binary);
        let code = mem.into_executable()?;

        tracing::debug!(addr = ?code.addr(), len = code.len(), "prepared machine code");

        Ok(CompiledProgram { code })
    }

    /// Size of the machine code, in bytes.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Runs the program on a fresh tape, reading `stdin` and printing to `stdout`.
    pub fn run(&self) -> Result<Tape, JitError> {
        let mut io = Streams::stdio();
        self.run_with_io(&mut io)
    }

    /// Runs the program on a fresh tape with the I/O of your choosing. Returns the tape as the
    /// program left it.
    ///
    /// A program that never terminates never returns. One that moves off either end of the
    /// tape is killed by the operating system.
    pub fn run_with_io(&self, io: &mut dyn CharIo) -> Result<Tape, JitError> {
        let mut tape = Tape::new()?;
        tracing::trace!(cells = tape.len(), "allocated tape");

        // SAFETY: the region holds code produced by the assembler, which follows the C
        // calling convention for NativeProgram, and lives as long as `self`.
        let native = unsafe { mmap_jit::as_function!(self.code, NativeProgram) };

        let guard = program::install(io);
        unsafe { native(program::host_getchar, program::host_putchar, tape.as_mut_ptr()) };
        drop(guard);

        Ok(tape)
    }
}

/// Loads the machine code, runs it once, and unloads it.
pub fn execute(binary: &[u8], io: &mut dyn CharIo) -> Result<Tape, JitError> {
    let program = CompiledProgram::from_binary(binary)?;
    program.run_with_io(io)
}

//! The I/O routines handed to compiled programs.
//!
//! Native code calls back into the host through two plain C functions, [host_getchar] and
//! [host_putchar]. They cannot carry any state of their own, so they forward to whichever
//! [CharIo] is installed on the current thread for the duration of a run.

use std::cell::Cell;
use std::io::{self, Read, StdinLock, StdoutLock, Write};
use std::marker::PhantomData;

/// Has the same signature as `libc`'s `putchar(3)`.
pub type PutChar = extern "C" fn(u32) -> u32;
/// Has the same signature as `libc`'s `getchar(3)`.
pub type GetChar = extern "C" fn() -> u32;

/// What [host_getchar] returns at the end of input: `-1`, like `libc`'s `EOF`.
pub const EOF: u32 = u32::MAX;

/// Somewhere for a running program to read characters from and write characters to.
pub trait CharIo {
    /// Returns the next input byte, or [None] at the end of input.
    fn get_char(&mut self) -> Option<u8>;

    fn put_char(&mut self, c: u8);

    /// Called once the program returns.
    fn flush(&mut self) {}
}

/// [CharIo] over any pair of byte streams.
pub struct Streams<R, W> {
    input: R,
    output: W,
}

impl<R: Read, W: Write> Streams<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Streams { input, output }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl Streams<StdinLock<'static>, StdoutLock<'static>> {
    /// Reads from `stdin`; prints to `stdout`.
    pub fn stdio() -> Self {
        Streams::new(io::stdin().lock(), io::stdout().lock())
    }
}

impl<R: Read, W: Write> CharIo for Streams<R, W> {
    fn get_char(&mut self) -> Option<u8> {
        // A prompt printed without a newline must be visible before we block on input.
        self.flush();

        let mut one_byte = [0u8];
        match self.input.read_exact(&mut one_byte) {
            Ok(()) => Some(one_byte[0]),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read input; treating it as the end");
                None
            }
        }
    }

    fn put_char(&mut self, c: u8) {
        if let Err(e) = self.output.write_all(&[c]) {
            tracing::warn!(error = %e, "could not write output");
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.output.flush() {
            tracing::warn!(error = %e, "could not flush output");
        }
    }
}

thread_local! {
    static CURRENT_IO: Cell<Option<*mut (dyn CharIo + 'static)>> = Cell::new(None);
}

/// Keeps a [CharIo] installed for the calling thread until dropped.
pub(crate) struct IoGuard<'a> {
    previous: Option<*mut (dyn CharIo + 'static)>,
    installed: *mut (dyn CharIo + 'static),
    _io: PhantomData<&'a mut dyn CharIo>,
}

/// Routes [host_getchar] and [host_putchar] on this thread to `io` while the guard lives.
pub(crate) fn install(io: &mut dyn CharIo) -> IoGuard<'_> {
    let borrowed: *mut (dyn CharIo + '_) = io;
    // SAFETY: the pointer is only reachable while the guard, which borrows `io`, is alive.
    let installed: *mut (dyn CharIo + 'static) = unsafe { std::mem::transmute(borrowed) };
    let previous = CURRENT_IO.with(|current| current.replace(Some(installed)));

    IoGuard {
        previous,
        installed,
        _io: PhantomData,
    }
}

impl Drop for IoGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: still borrowed by this guard.
        unsafe { (*self.installed).flush() };
        CURRENT_IO.with(|current| current.set(self.previous));
    }
}

fn with_current_io<T>(f: impl FnOnce(&mut dyn CharIo) -> T) -> Option<T> {
    let io = CURRENT_IO.with(Cell::get)?;
    // SAFETY: installed by an IoGuard that is still alive on this thread.
    Some(f(unsafe { &mut *io }))
}

/// Emulates libc's `getchar(3)`, reading from the installed [CharIo].
pub extern "C" fn host_getchar() -> u32 {
    match with_current_io(|io| io.get_char()) {
        Some(Some(c)) => c as u32,
        Some(None) => EOF,
        None => {
            tracing::warn!("getchar called with no I/O installed");
            EOF
        }
    }
}

/// Emulates libc's `putchar(3)`, writing to the installed [CharIo].
pub extern "C" fn host_putchar(c: u32) -> u32 {
    let byte = (c & 0xFF) as u8;
    match with_current_io(|io| io.put_char(byte)) {
        Some(()) => byte as u32,
        None => {
            tracing::warn!("putchar called with no I/O installed");
            EOF
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_use_the_installed_streams() {
        let mut io = Streams::new(&b"hi"[..], Vec::new());
        {
            let _guard = install(&mut io);
            assert_eq!(b'h' as u32, host_getchar());
            assert_eq!(b'!' as u32, host_putchar(b'!' as u32));
            assert_eq!(b'i' as u32, host_getchar());
            assert_eq!(EOF, host_getchar());
        }

        assert_eq!(b"!", &io.output()[..]);
    }

    #[test]
    fn output_is_flushed_before_reading() {
        let mut io = Streams::new(&b"y"[..], io::BufWriter::new(Vec::new()));
        io.put_char(b'?');
        assert!(io.output().get_ref().is_empty());

        assert_eq!(Some(b'y'), io.get_char());
        assert_eq!(b"?", &io.output().get_ref()[..]);
    }

    #[test]
    fn putchar_keeps_only_the_low_byte() {
        let mut io = Streams::new(io::empty(), Vec::new());
        {
            let _guard = install(&mut io);
            host_putchar(0x141);
        }

        assert_eq!(b"A", &io.output()[..]);
    }

    #[test]
    fn nothing_installed_means_eof() {
        assert_eq!(EOF, host_getchar());
        assert_eq!(EOF, host_putchar(b'x' as u32));
    }

    #[test]
    fn guards_nest() {
        let mut outer = Streams::new(io::empty(), Vec::new());
        let mut inner = Streams::new(io::empty(), Vec::new());
        {
            let _outer = install(&mut outer);
            host_putchar(b'a' as u32);
            {
                let _inner = install(&mut inner);
                host_putchar(b'b' as u32);
            }
            host_putchar(b'c' as u32);
        }

        assert_eq!(b"ac", &outer.output()[..]);
        assert_eq!(b"b", &inner.output()[..]);
    }
}

//! The memory a program runs on.

use std::fmt;
use std::ops::Index;

use mmap_jit::GuardedRegion;

/// Number of cells on every tape.
pub const TAPE_LEN: usize = 5000;

/// A fixed-size, zero-initialized array of byte cells.
///
/// The cells are fenced by guard pages: a program that moves the pointer off the end of the
/// tape faults instead of writing into the rest of the process.
pub struct Tape {
    cells: GuardedRegion,
}

impl Tape {
    pub fn new() -> mmap_jit::Result<Self> {
        Ok(Tape {
            cells: GuardedRegion::allocate(TAPE_LEN)?,
        })
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells[..]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Pointer to the first cell, for native code.
    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.cells.as_mut_ptr()
    }

    /// A hex and ASCII view of the tape, 8 cells per row, up to the last non-zero cell.
    pub fn hex_dump(&self) -> HexDump<'_> {
        HexDump { tape: self }
    }
}

impl Index<usize> for Tape {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.cells[index]
    }
}

impl fmt::Debug for Tape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Tape").field("len", &self.len()).finish()
    }
}

/// See [Tape::hex_dump].
pub struct HexDump<'a> {
    tape: &'a Tape,
}

const ROW: usize = 8;

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cells = self.tape.cells();
        let last = cells.iter().rposition(|&c| c != 0).unwrap_or(0);

        for (row, chunk) in cells.chunks(ROW).take(last / ROW + 1).enumerate() {
            write!(f, "0x{:04x}:", row * ROW)?;
            for cell in chunk {
                write!(f, " {:02x}", cell)?;
            }
            write!(f, " |")?;
            for &cell in chunk {
                let c = if cell.is_ascii_graphic() || cell == b' ' {
                    cell as char
                } else {
                    '.'
                };
                write!(f, "{}", c)?;
            }
            writeln!(f, "|")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let tape = Tape::new().unwrap();
        assert_eq!(TAPE_LEN, tape.len());
        assert!(tape.cells().iter().all(|&c| c == 0));
    }

    #[test]
    fn blank_tape_dumps_one_row() {
        assert_eq!(
            "0x0000: 00 00 00 00 00 00 00 00 |........|\n",
            Tape::new().unwrap().hex_dump().to_string()
        );
    }

    #[test]
    fn dumps_up_to_the_last_non_zero_row() {
        let mut tape = Tape::new().unwrap();
        tape.cells[0] = b'H';
        tape.cells[1] = b'i';
        tape.cells[9] = 0x7f;

        assert_eq!(
            "0x0000: 48 69 00 00 00 00 00 00 |Hi......|\n\
             0x0008: 00 7f 00 00 00 00 00 00 |........|\n",
            tape.hex_dump().to_string()
        );
    }
}

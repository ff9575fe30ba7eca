//! Script VM memory model.
//!
//! The VM passes every argument as a fixed-width cell. Strings and arrays are
//! passed as byte addresses into the VM's data segment and must be resolved
//! through [`VmMemory`] before they can be read.

mod segment;

pub use segment::DataSegment;

use crate::error::MarshalError;

/// One VM cell.
pub type Cell = i32;

/// Unsigned view of a cell.
pub type UCell = u32;

/// Width of a cell in bytes. VM addresses are byte offsets and always
/// cell-aligned.
pub const CELL_SIZE: usize = std::mem::size_of::<Cell>();

/// Largest value the first cell of an unpacked string can hold. Anything
/// above it marks a packed string.
pub const UNPACKED_MAX: UCell = (1 << ((CELL_SIZE - 1) * 8)) - 1;

/// Reinterpret a cell as the VM's 32-bit float encoding.
pub fn cell_to_float(cell: Cell) -> f32 {
    f32::from_bits(cell as UCell)
}

pub fn float_to_cell(value: f32) -> Cell {
    value.to_bits() as Cell
}

/// Address resolution into a VM's data segment.
pub trait VmMemory {
    /// Resolve `addr` to the cells from that address to the end of the
    /// addressable region.
    fn resolve(&self, addr: Cell) -> Result<&[Cell], MarshalError>;

    /// Read the single cell stored at `addr`.
    fn deref(&self, addr: Cell) -> Result<Cell, MarshalError> {
        self.resolve(addr)?
            .first()
            .copied()
            .ok_or(MarshalError::InvalidAddress { addr })
    }

    /// Borrow `len` cells starting at `addr`.
    fn read_array(&self, addr: Cell, len: usize) -> Result<&[Cell], MarshalError> {
        let cells = self.resolve(addr)?;
        cells
            .get(..len)
            .ok_or(MarshalError::ArrayOutOfBounds { addr, len })
    }

    /// Copy the zero-terminated string at `addr` out of VM memory.
    ///
    /// Both layouts are understood: unpacked (one character per cell) and
    /// packed (four characters per cell, first character in the high byte).
    fn read_string(&self, addr: Cell, max_len: usize) -> Result<Vec<u8>, MarshalError> {
        let cells = self.resolve(addr)?;
        let packed = cells.first().is_some_and(|&c| c as UCell > UNPACKED_MAX);

        let mut out = Vec::new();
        if packed {
            for cell in cells {
                for byte in cell.to_be_bytes() {
                    if byte == 0 {
                        return Ok(out);
                    }
                    push_bounded(&mut out, byte, max_len)?;
                }
            }
        } else {
            for &cell in cells {
                if cell == 0 {
                    return Ok(out);
                }
                // Unpacked characters are narrowed to a byte.
                push_bounded(&mut out, cell as u8, max_len)?;
            }
        }

        Err(MarshalError::UnterminatedString { addr })
    }
}

fn push_bounded(out: &mut Vec<u8>, byte: u8, max_len: usize) -> Result<(), MarshalError> {
    if out.len() >= max_len {
        return Err(MarshalError::StringTooLong {
            len: out.len() + 1,
            max: max_len,
        });
    }
    out.push(byte);
    Ok(())
}

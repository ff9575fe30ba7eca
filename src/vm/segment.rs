use super::{CELL_SIZE, Cell, VmMemory, float_to_cell};
use crate::error::MarshalError;

/// A flat, growable VM data segment.
///
/// Hosts that embed a VM without direct access to its memory, and tests, use
/// this to lay out string and array arguments the way the VM would. Every
/// `push_*` returns the byte address of the first cell written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSegment {
    cells: Vec<Cell>,
}

impl DataSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn next_addr(&self) -> Cell {
        (self.cells.len() * CELL_SIZE) as Cell
    }

    pub fn push_cell(&mut self, value: Cell) -> Cell {
        let addr = self.next_addr();
        self.cells.push(value);
        addr
    }

    pub fn push_float(&mut self, value: f32) -> Cell {
        self.push_cell(float_to_cell(value))
    }

    pub fn push_array(&mut self, values: &[Cell]) -> Cell {
        let addr = self.next_addr();
        self.cells.extend_from_slice(values);
        addr
    }

    pub fn push_floats(&mut self, values: &[f32]) -> Cell {
        let addr = self.next_addr();
        self.cells.extend(values.iter().copied().map(float_to_cell));
        addr
    }

    /// Unpacked layout: one byte per cell, zero-terminated.
    pub fn push_string(&mut self, text: &str) -> Cell {
        let addr = self.next_addr();
        self.cells.extend(text.bytes().map(Cell::from));
        self.cells.push(0);
        addr
    }

    /// Packed layout: four bytes per cell, first byte in the high bits,
    /// zero-terminated (the terminator may share the last cell).
    pub fn push_packed_string(&mut self, text: &str) -> Cell {
        let addr = self.next_addr();
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        for chunk in bytes.chunks(CELL_SIZE) {
            let mut word = [0u8; CELL_SIZE];
            word[..chunk.len()].copy_from_slice(chunk);
            self.cells.push(Cell::from_be_bytes(word));
        }
        addr
    }

    /// Overwrite the cell at `addr`.
    pub fn write(&mut self, addr: Cell, value: Cell) -> Result<(), MarshalError> {
        let index = self.index_of(addr)?;
        self.cells[index] = value;
        Ok(())
    }

    fn index_of(&self, addr: Cell) -> Result<usize, MarshalError> {
        let offset = usize::try_from(addr).map_err(|_| MarshalError::InvalidAddress { addr })?;
        if offset % CELL_SIZE != 0 {
            return Err(MarshalError::InvalidAddress { addr });
        }
        let index = offset / CELL_SIZE;
        if index >= self.cells.len() {
            return Err(MarshalError::InvalidAddress { addr });
        }
        Ok(index)
    }
}

impl VmMemory for DataSegment {
    fn resolve(&self, addr: Cell) -> Result<&[Cell], MarshalError> {
        let index = self.index_of(addr)?;
        Ok(&self.cells[index..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_cell_aligned_byte_offsets() {
        let mut mem = DataSegment::new();
        assert_eq!(mem.push_cell(1), 0);
        assert_eq!(mem.push_cell(2), 4);
        assert_eq!(mem.push_array(&[3, 4, 5]), 8);
        assert_eq!(mem.push_cell(6), 20);
        assert_eq!(mem.len(), 6);
    }

    #[test]
    fn resolve_rejects_bad_addresses() {
        let mut mem = DataSegment::new();
        mem.push_array(&[1, 2]);
        assert!(mem.resolve(0).is_ok());
        assert_eq!(mem.resolve(2), Err(MarshalError::InvalidAddress { addr: 2 }));
        assert_eq!(mem.resolve(8), Err(MarshalError::InvalidAddress { addr: 8 }));
        assert_eq!(mem.resolve(-4), Err(MarshalError::InvalidAddress { addr: -4 }));
    }

    #[test]
    fn packed_string_shares_terminator_cell() {
        let mut mem = DataSegment::new();
        mem.push_packed_string("abc");
        assert_eq!(mem.cells(), &[0x6162_6300]);
    }

    #[test]
    fn write_overwrites_in_place() {
        let mut mem = DataSegment::new();
        let addr = mem.push_cell(1);
        mem.write(addr, 9).unwrap();
        assert_eq!(mem.deref(addr), Ok(9));
        assert!(mem.write(400, 1).is_err());
    }
}

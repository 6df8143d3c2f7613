//////////////////////////////////////////////////////////////
/// Forth Interpreter Kernel
///
/// This module owns the main data area: one flat, fixed-size array of bytes holding
/// every piece of VM state that Forth can see - stacks, buffers, the dictionary and
/// all compiled code. Everything else in the system refers to it by integer offset.
///
/// All accessors are checked. A cell access must lie inside the area and be cell-aligned;
/// a byte access only has to lie inside the area. A failed check performs no write.
///
/// The kernel also hands out the fixed regions used by the runtime. Regions are carved
/// from both ends of memory, and the space left in the middle becomes the dictionary.
///
use crate::error::{ForthError, Result};

/// The VM's word size
pub type Cell = i32;
/// Double-cell quantity, stored high cell first
pub type DCell = i64;
/// Unsigned view of a cell
pub type UCell = u32;

// DATA AREA constants
pub const CELL: usize = std::mem::size_of::<Cell>();
pub const MEM_CELLS: usize = 256 * 1024;
pub const MEM_SZ: usize = MEM_CELLS * CELL;

pub const TRUE: Cell = -1; // forth convention for true and false
pub const FALSE: Cell = 0;

/// Round an address or size up to the next cell boundary
pub fn aligned(addr: usize) -> usize {
    (addr + CELL - 1) & !(CELL - 1)
}

/// Forth flag from a Rust bool
pub fn flag(b: bool) -> Cell {
    if b {
        TRUE
    } else {
        FALSE
    }
}

/// Split a double into (low, high) cells
pub fn split_double(d: DCell) -> (Cell, Cell) {
    (d as Cell, (d >> 32) as Cell)
}

/// Join (low, high) cells into a double
pub fn join_double(lo: Cell, hi: Cell) -> DCell {
    ((hi as DCell) << 32) | (lo as UCell as DCell)
}

pub struct Kernel {
    heap: Vec<u8>,
    low: usize,  // first free byte above the regions allocated from the bottom
    high: usize, // lowest byte of the regions allocated from the top
}

impl Kernel {
    pub fn new() -> Kernel {
        Kernel::with_size(MEM_SZ)
    }

    /// A kernel with a non-standard memory size. The size is rounded down to whole cells.
    pub fn with_size(size: usize) -> Kernel {
        let size = size & !(CELL - 1);
        Kernel {
            heap: vec![0; size],
            low: 0,
            high: size,
        }
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    /// Convert a value taken off a stack into a memory address
    pub fn address(&self, val: Cell) -> Result<usize> {
        if val < 0 || val as usize >= self.heap.len() {
            Err(ForthError::InvalidMemoryAddress(val as i64))
        } else {
            Ok(val as usize)
        }
    }

    /// check validates that [addr, addr + len) lies inside the data area
    fn check(&self, addr: usize, len: usize) -> Result<()> {
        match addr.checked_add(len) {
            Some(end) if end <= self.heap.len() => Ok(()),
            _ => Err(ForthError::InvalidMemoryAddress(addr as i64)),
        }
    }

    /// check_aligned adds the cell alignment rule to check
    fn check_aligned(&self, addr: usize, len: usize) -> Result<()> {
        self.check(addr, len)?;
        if addr % CELL != 0 {
            return Err(ForthError::AddressAlignment(addr as i64));
        }
        Ok(())
    }

    pub fn read_cell(&self, addr: usize) -> Result<Cell> {
        self.check_aligned(addr, CELL)?;
        let mut bytes = [0u8; CELL];
        bytes.copy_from_slice(&self.heap[addr..addr + CELL]);
        Ok(Cell::from_le_bytes(bytes))
    }

    pub fn write_cell(&mut self, addr: usize, val: Cell) -> Result<()> {
        self.check_aligned(addr, CELL)?;
        self.heap[addr..addr + CELL].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    pub fn read_byte(&self, addr: usize) -> Result<u8> {
        self.check(addr, 1)?;
        Ok(self.heap[addr])
    }

    pub fn write_byte(&mut self, addr: usize, val: u8) -> Result<()> {
        self.check(addr, 1)?;
        self.heap[addr] = val;
        Ok(())
    }

    /// read_double reads two cells: the high cell at addr, the low cell at addr + CELL
    pub fn read_double(&self, addr: usize) -> Result<DCell> {
        self.check_aligned(addr, 2 * CELL)?;
        let hi = self.read_cell(addr)?;
        let lo = self.read_cell(addr + CELL)?;
        Ok(join_double(lo, hi))
    }

    /// write_double is the inverse of read_double. Both cells are validated before either is written.
    pub fn write_double(&mut self, addr: usize, val: DCell) -> Result<()> {
        self.check_aligned(addr, 2 * CELL)?;
        let (lo, hi) = split_double(val);
        self.write_cell(addr, hi)?;
        self.write_cell(addr + CELL, lo)
    }

    /// delta adds a delta value to the cell at addr
    pub fn delta(&mut self, addr: usize, delta: Cell) -> Result<()> {
        let val = self.read_cell(addr)?;
        self.write_cell(addr, val.wrapping_add(delta))
    }

    pub fn read_bytes(&self, addr: usize, len: usize) -> Result<&[u8]> {
        self.check(addr, len)?;
        Ok(&self.heap[addr..addr + len])
    }

    pub fn write_bytes(&mut self, addr: usize, bytes: &[u8]) -> Result<()> {
        self.check(addr, bytes.len())?;
        self.heap[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// string_get copies len bytes at addr out as a String
    ///     Text is stored as UTF-8; bytes that do not decode become U+FFFD.
    pub fn string_get(&self, addr: usize, len: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.read_bytes(addr, len)?).into_owned())
    }

    /// counted_get reads a counted string: a length byte followed by the characters
    pub fn counted_get(&self, addr: usize) -> Result<String> {
        let len = self.read_byte(addr)? as usize;
        self.string_get(addr + 1, len)
    }

    pub fn fill(&mut self, addr: usize, len: usize, val: u8) -> Result<()> {
        self.check(addr, len)?;
        self.heap[addr..addr + len].fill(val);
        Ok(())
    }

    pub fn erase(&mut self, addr: usize, len: usize) -> Result<()> {
        self.fill(addr, len, 0)
    }

    /// move_bytes copies len bytes from `from` to `to`. Overlapping ranges are handled like memmove.
    pub fn move_bytes(&mut self, from: usize, to: usize, len: usize) -> Result<()> {
        self.check(from, len)?;
        self.check(to, len)?;
        self.heap.copy_within(from..from + len, to);
        Ok(())
    }

    /// allot_low reserves size bytes (rounded to cells) at the bottom of free memory
    ///     Returns the start address of the region.
    pub fn allot_low(&mut self, size: usize) -> Result<usize> {
        let size = aligned(size);
        if self.high - self.low < size {
            return Err(ForthError::MemoryOverflow);
        }
        let start = self.low;
        self.low += size;
        Ok(start)
    }

    /// allot_high reserves size bytes (rounded to cells) at the top of free memory
    ///     Returns the start (lowest) address of the region.
    pub fn allot_high(&mut self, size: usize) -> Result<usize> {
        let size = aligned(size);
        if self.high - self.low < size {
            return Err(ForthError::MemoryOverflow);
        }
        self.high -= size;
        Ok(self.high)
    }

    /// The unallocated middle of memory, as [low, high)
    pub fn free_region(&self) -> (usize, usize) {
        (self.low, self.high)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::new()
    }
}

//////////////////////////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_read_write() {
        let mut k = Kernel::with_size(1024);
        k.write_cell(16, -12345).unwrap();
        assert_eq!(k.read_cell(16).unwrap(), -12345);
    }

    #[test]
    fn test_byte_read_write_unaligned() {
        let mut k = Kernel::with_size(1024);
        k.write_byte(17, b'X').unwrap();
        assert_eq!(k.read_byte(17).unwrap(), b'X');
    }

    #[test]
    fn test_misaligned_cell_fails() {
        let mut k = Kernel::with_size(1024);
        assert_eq!(k.write_cell(5, 1), Err(ForthError::AddressAlignment(5)));
        assert_eq!(k.read_cell(6), Err(ForthError::AddressAlignment(6)));
    }

    #[test]
    fn test_out_of_range_fails_without_write() {
        let mut k = Kernel::with_size(64);
        assert_eq!(
            k.write_cell(64, 1),
            Err(ForthError::InvalidMemoryAddress(64))
        );
        assert!(k.read_byte(64).is_err());
        // a double straddling the end must not write its first cell
        assert!(k.write_double(60, 0x1_0000_0002).is_err());
        assert_eq!(k.read_cell(60).unwrap(), 0);
    }

    #[test]
    fn test_double_cell_order() {
        let mut k = Kernel::with_size(64);
        k.write_double(8, 0x0000_0001_0000_0002).unwrap();
        assert_eq!(k.read_cell(8).unwrap(), 1); // high cell first
        assert_eq!(k.read_cell(12).unwrap(), 2);
        assert_eq!(k.read_double(8).unwrap(), 0x0000_0001_0000_0002);
        k.write_double(16, -5).unwrap();
        assert_eq!(k.read_double(16).unwrap(), -5);
    }

    #[test]
    fn test_move_overlapping() {
        let mut k = Kernel::with_size(64);
        k.write_bytes(0, b"abcdef").unwrap();
        k.move_bytes(0, 2, 6).unwrap();
        assert_eq!(k.read_bytes(2, 6).unwrap(), b"abcdef");
        k.move_bytes(2, 1, 6).unwrap();
        assert_eq!(k.read_bytes(1, 6).unwrap(), b"abcdef");
    }

    #[test]
    fn test_fill_and_erase() {
        let mut k = Kernel::with_size(64);
        k.fill(3, 4, b'z').unwrap();
        assert_eq!(k.string_get(3, 4).unwrap(), "zzzz");
        k.erase(4, 2).unwrap();
        assert_eq!(k.read_bytes(3, 4).unwrap(), &[b'z', 0, 0, b'z']);
        assert!(k.fill(60, 8, 0).is_err());
    }

    #[test]
    fn test_allot_from_both_ends() {
        let mut k = Kernel::with_size(64);
        assert_eq!(k.allot_low(6).unwrap(), 0);
        assert_eq!(k.allot_high(16).unwrap(), 48);
        assert_eq!(k.free_region(), (8, 48));
        assert_eq!(k.allot_high(41), Err(ForthError::MemoryOverflow));
        assert_eq!(k.allot_low(40).unwrap(), 8);
        assert_eq!(k.allot_low(1), Err(ForthError::MemoryOverflow));
    }

    #[test]
    fn test_double_split_join() {
        for d in [0i64, -1, 1, i64::MAX, i64::MIN, 0x1234_5678_9abc_def0] {
            let (lo, hi) = split_double(d);
            assert_eq!(join_double(lo, hi), d);
        }
    }

    #[test]
    fn test_address_conversion() {
        let k = Kernel::with_size(64);
        assert_eq!(k.address(8).unwrap(), 8);
        assert!(k.address(-1).is_err());
        assert!(k.address(64).is_err());
    }
}

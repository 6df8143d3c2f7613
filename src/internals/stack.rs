/// Stacks
///
/// The data, return and control-flow stacks are regions of the kernel's memory,
/// each growing downward from its base. A Stack only records the region bounds and
/// its stack pointer; the cells themselves live in memory, so every operation takes
/// the kernel it indexes into.
///
/// Double-cell operations are built on the single-cell ones, low cell pushed first,
/// so depth is always counted in cells.
///
use std::fmt;

use crate::error::{ForthError, Result};
use crate::kernel::{join_double, split_double, Cell, DCell, Kernel, CELL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Data,
    Return,
    Control,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StackKind::Data => "data",
            StackKind::Return => "return",
            StackKind::Control => "control-flow",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct Stack {
    kind: StackKind,
    limit: usize, // lowest usable address
    base: usize,  // one past the bottom cell; sp == base means empty
    sp: usize,    // address of the top cell
}

impl Stack {
    /// A stack occupying [start, start + cells * CELL) of memory
    pub fn new(kind: StackKind, start: usize, cells: usize) -> Stack {
        let base = start + cells * CELL;
        Stack {
            kind,
            limit: start,
            base,
            sp: base,
        }
    }

    pub fn capacity(&self) -> usize {
        (self.base - self.limit) / CELL
    }

    #[inline(always)]
    pub fn depth(&self) -> usize {
        (self.base - self.sp) / CELL
    }

    pub fn clear(&mut self) {
        self.sp = self.base;
    }

    #[inline(always)]
    pub fn push(&mut self, mem: &mut Kernel, val: Cell) -> Result<()> {
        if self.sp - self.limit < CELL {
            return Err(ForthError::StackOverflow(self.kind));
        }
        mem.write_cell(self.sp - CELL, val)?;
        self.sp -= CELL;
        Ok(())
    }

    #[inline(always)]
    pub fn pop(&mut self, mem: &Kernel) -> Result<Cell> {
        if self.sp >= self.base {
            return Err(ForthError::StackUnderflow(self.kind));
        }
        let val = mem.read_cell(self.sp)?;
        self.sp += CELL;
        Ok(val)
    }

    /// peek(0) is the top of stack, peek(1) the next one down, and so on
    #[inline(always)]
    pub fn peek(&self, mem: &Kernel, depth: usize) -> Result<Cell> {
        self.check(depth + 1)?;
        mem.read_cell(self.sp + depth * CELL)
    }

    /// poke replaces the cell at depth without moving the stack pointer
    pub fn poke(&mut self, mem: &mut Kernel, depth: usize, val: Cell) -> Result<()> {
        self.check(depth + 1)?;
        mem.write_cell(self.sp + depth * CELL, val)
    }

    /// check fails with underflow unless at least `needed` cells are present
    #[inline(always)]
    pub fn check(&self, needed: usize) -> Result<()> {
        if self.depth() < needed {
            Err(ForthError::StackUnderflow(self.kind))
        } else {
            Ok(())
        }
    }

    /// roll(n) moves the cell at depth n to the top, shifting the cells above it down by one
    ///     roll(0) is a no-op.
    pub fn roll(&mut self, mem: &mut Kernel, depth: usize) -> Result<()> {
        if depth == 0 {
            return Ok(());
        }
        self.check(depth + 1)?;
        let new_top = mem.read_cell(self.sp + depth * CELL)?;
        for i in (0..depth).rev() {
            let val = mem.read_cell(self.sp + i * CELL)?;
            mem.write_cell(self.sp + (i + 1) * CELL, val)?;
        }
        mem.write_cell(self.sp, new_top)
    }

    /// push_double pushes the low cell, then the high cell
    pub fn push_double(&mut self, mem: &mut Kernel, val: DCell) -> Result<()> {
        if self.sp - self.limit < 2 * CELL {
            return Err(ForthError::StackOverflow(self.kind));
        }
        let (lo, hi) = split_double(val);
        self.push(mem, lo)?;
        self.push(mem, hi)
    }

    pub fn pop_double(&mut self, mem: &Kernel) -> Result<DCell> {
        self.check(2)?;
        let hi = self.pop(mem)?;
        let lo = self.pop(mem)?;
        Ok(join_double(lo, hi))
    }

    /// The stack contents, bottom first
    pub fn contents(&self, mem: &Kernel) -> Result<Vec<Cell>> {
        (0..self.depth()).rev().map(|i| self.peek(mem, i)).collect()
    }
}

/////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn setup(cells: usize) -> (Kernel, Stack) {
        let mut mem = Kernel::with_size(1024);
        let start = mem.allot_high(cells * CELL).unwrap();
        (mem, Stack::new(StackKind::Data, start, cells))
    }

    #[test]
    fn test_push_pop() {
        let (mut mem, mut s) = setup(8);
        s.push(&mut mem, 1).unwrap();
        s.push(&mut mem, 2).unwrap();
        assert_eq!(s.depth(), 2);
        assert_eq!(s.pop(&mem).unwrap(), 2);
        assert_eq!(s.pop(&mem).unwrap(), 1);
        assert_eq!(s.pop(&mem), Err(ForthError::StackUnderflow(StackKind::Data)));
    }

    #[test]
    fn test_overflow() {
        let (mut mem, mut s) = setup(2);
        s.push(&mut mem, 1).unwrap();
        s.push(&mut mem, 2).unwrap();
        assert_eq!(
            s.push(&mut mem, 3),
            Err(ForthError::StackOverflow(StackKind::Data))
        );
        assert_eq!(s.depth(), 2);
    }

    #[test]
    fn test_peek() {
        let (mut mem, mut s) = setup(8);
        for v in [10, 20, 30] {
            s.push(&mut mem, v).unwrap();
        }
        assert_eq!(s.peek(&mem, 0).unwrap(), 30);
        assert_eq!(s.peek(&mem, 2).unwrap(), 10);
        assert!(s.peek(&mem, 3).is_err());
    }

    #[test]
    fn test_roll() {
        let (mut mem, mut s) = setup(8);
        for v in [1, 2, 3, 4] {
            s.push(&mut mem, v).unwrap();
        }
        s.roll(&mut mem, 0).unwrap();
        assert_eq!(s.contents(&mem).unwrap(), vec![1, 2, 3, 4]);
        s.roll(&mut mem, 3).unwrap();
        assert_eq!(s.contents(&mem).unwrap(), vec![2, 3, 4, 1]);
        s.roll(&mut mem, 1).unwrap();
        assert_eq!(s.contents(&mem).unwrap(), vec![2, 3, 1, 4]);
        assert!(s.roll(&mut mem, 4).is_err());
    }

    #[test]
    fn test_double_uses_two_cells() {
        let (mut mem, mut s) = setup(8);
        s.push_double(&mut mem, -2).unwrap();
        assert_eq!(s.depth(), 2);
        assert_eq!(s.peek(&mem, 0).unwrap(), -1); // high cell on top
        assert_eq!(s.peek(&mem, 1).unwrap(), -2);
        assert_eq!(s.pop_double(&mem).unwrap(), -2);
        s.push(&mut mem, 7).unwrap();
        assert!(s.pop_double(&mem).is_err());
        assert_eq!(s.depth(), 1);
    }

    #[test]
    fn test_clear() {
        let (mut mem, mut s) = setup(8);
        s.push(&mut mem, 5).unwrap();
        s.clear();
        assert_eq!(s.depth(), 0);
    }

    proptest! {
        /// Values come back in reverse order and depth tracks outstanding pushes.
        #[test]
        fn prop_stack_is_lifo(values in prop::collection::vec(any::<i32>(), 0..32)) {
            let (mut mem, mut s) = setup(32);
            for (i, v) in values.iter().enumerate() {
                s.push(&mut mem, *v).unwrap();
                prop_assert_eq!(s.depth(), i + 1);
            }
            for v in values.iter().rev() {
                prop_assert_eq!(s.pop(&mem).unwrap(), *v);
            }
            prop_assert!(s.pop(&mem).is_err());
        }

        /// Pushing past capacity always fails with overflow and leaves depth unchanged.
        #[test]
        fn prop_overflow_at_capacity(cap in 1usize..16, extra in 1usize..4) {
            let (mut mem, mut s) = setup(cap);
            for i in 0..cap {
                s.push(&mut mem, i as i32).unwrap();
            }
            for _ in 0..extra {
                prop_assert_eq!(s.push(&mut mem, 0), Err(ForthError::StackOverflow(StackKind::Data)));
            }
            prop_assert_eq!(s.depth(), cap);
        }
    }
}

// General-purpose builtin words
//
// Stack manipulation, single-cell and mixed-precision arithmetic, and memory access.
// All signed division is floored. Division by zero is detected before dividing, and a
// quotient that does not fit its result cell is an error rather than a wrapped value.

use crate::error::{ForthError, Result};
use crate::kernel::{aligned, flag, split_double, Cell, DCell, UCell};
use crate::runtime::ForthRuntime;

/// floored_divmod divides n by d, rounding the quotient toward negative infinity
///     Returns (remainder, quotient). The remainder has the sign of the divisor.
///
pub fn floored_divmod(n: i128, d: i128) -> Result<(i128, i128)> {
    if d == 0 {
        return Err(ForthError::DivisionByZero);
    }
    let mut q = n / d;
    let mut r = n % d;
    if r != 0 && ((r < 0) != (d < 0)) {
        q -= 1;
        r += d;
    }
    Ok((r, q))
}

/// symmetric_divmod divides n by d, truncating the quotient toward zero
pub fn symmetric_divmod(n: i128, d: i128) -> Result<(i128, i128)> {
    if d == 0 {
        return Err(ForthError::DivisionByZero);
    }
    Ok((n % d, n / d))
}

/// to_cell narrows an intermediate result, failing if it does not fit
fn to_cell(v: i128) -> Result<Cell> {
    Cell::try_from(v).map_err(|_| ForthError::ResultOutOfRange)
}

impl ForthRuntime {
    /// pop2_push1 ( a b -- f(a, b) )
    pub fn pop2_push1<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn(Cell, Cell) -> Result<Cell>,
    {
        self.stack.check(2)?;
        let b = self.pop()?;
        let a = self.pop()?;
        let val = f(a, b)?;
        self.push(val)
    }

    /// pop1_push1 ( a -- f(a) )
    pub fn pop1_push1<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn(Cell) -> Cell,
    {
        let a = self.pop()?;
        self.push(f(a))
    }

    /// compare ( a b -- flag )
    pub fn compare<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn(Cell, Cell) -> bool,
    {
        self.pop2_push1(|a, b| Ok(flag(f(a, b))))
    }

    /// pop1_flag ( a -- flag )
    pub fn pop1_flag<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn(Cell) -> bool,
    {
        self.pop1_push1(|a| flag(f(a)))
    }

    ////////////////////
    /// Stack words

    pub fn f_dup(&mut self) -> Result<()> {
        let top = self.top(0)?;
        self.push(top)
    }

    pub fn f_drop(&mut self) -> Result<()> {
        self.pop().map(|_| ())
    }

    pub fn f_swap(&mut self) -> Result<()> {
        self.stack.check(2)?;
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(a)?;
        self.push(b)
    }

    pub fn f_over(&mut self) -> Result<()> {
        let second = self.top(1)?;
        self.push(second)
    }

    pub fn f_rot(&mut self) -> Result<()> {
        self.stack.roll(&mut self.kernel, 2)
    }

    pub fn f_minus_rot(&mut self) -> Result<()> {
        self.stack.roll(&mut self.kernel, 2)?;
        self.stack.roll(&mut self.kernel, 2)
    }

    pub fn f_nip(&mut self) -> Result<()> {
        self.f_swap()?;
        self.f_drop()
    }

    pub fn f_tuck(&mut self) -> Result<()> {
        self.f_swap()?;
        self.f_over()
    }

    pub fn f_q_dup(&mut self) -> Result<()> {
        if self.top(0)? != 0 {
            self.f_dup()?;
        }
        Ok(())
    }

    /// pick ( .. n -- .. v ) copies the nth item (after removing n) to the top
    pub fn f_pick(&mut self) -> Result<()> {
        let n = self.pop_len()?;
        let val = self.top(n)?;
        self.push(val)
    }

    /// roll ( .. n -- .. v ) rotates the nth item (after removing n) to the top
    pub fn f_roll(&mut self) -> Result<()> {
        let n = self.pop_len()?;
        self.stack.roll(&mut self.kernel, n)
    }

    /// DEPTH - push the number of items on the stack
    ///
    pub fn f_stack_depth(&mut self) -> Result<()> {
        let depth = self.stack.depth();
        self.push(depth as Cell)
    }

    pub fn f_two_dup(&mut self) -> Result<()> {
        let b = self.top(0)?;
        let a = self.top(1)?;
        self.push(a)?;
        self.push(b)
    }

    pub fn f_two_drop(&mut self) -> Result<()> {
        self.stack.check(2)?;
        self.pop()?;
        self.pop().map(|_| ())
    }

    pub fn f_two_swap(&mut self) -> Result<()> {
        self.stack.check(4)?;
        self.stack.roll(&mut self.kernel, 3)?;
        self.stack.roll(&mut self.kernel, 3)
    }

    pub fn f_two_over(&mut self) -> Result<()> {
        let b = self.top(2)?;
        let a = self.top(3)?;
        self.push(a)?;
        self.push(b)
    }

    pub fn f_to_r(&mut self) -> Result<()> {
        let val = self.pop()?;
        self.push_r(val)
    }

    pub fn f_r_from(&mut self) -> Result<()> {
        let val = self.pop_r()?;
        self.push(val)
    }

    pub fn f_r_get(&mut self) -> Result<()> {
        let val = self.top_r(0)?;
        self.push(val)
    }

    pub fn f_two_to_r(&mut self) -> Result<()> {
        self.stack.check(2)?;
        let b = self.pop()?;
        let a = self.pop()?;
        self.push_r(a)?;
        self.push_r(b)
    }

    pub fn f_two_r_from(&mut self) -> Result<()> {
        self.rstack.check(2)?;
        let b = self.pop_r()?;
        let a = self.pop_r()?;
        self.push(a)?;
        self.push(b)
    }

    pub fn f_two_r_get(&mut self) -> Result<()> {
        let b = self.top_r(0)?;
        let a = self.top_r(1)?;
        self.push(a)?;
        self.push(b)
    }

    /// i ( -- n ) the innermost loop index, on top of the return stack
    pub fn f_i(&mut self) -> Result<()> {
        let val = self.top_r(0)?;
        self.push(val)
    }

    /// j ( -- n ) the next outer loop index, beneath the inner loop's limit
    pub fn f_j(&mut self) -> Result<()> {
        let val = self.top_r(2)?;
        self.push(val)
    }

    ////////////////////
    /// Arithmetic

    fn pop_divide(&mut self) -> Result<(Cell, Cell)> {
        self.stack.check(2)?;
        let d = self.pop()?;
        let n = self.pop()?;
        let (r, q) = floored_divmod(n as i128, d as i128)?;
        Ok((to_cell(r)?, to_cell(q)?))
    }

    pub fn f_divide(&mut self) -> Result<()> {
        let (_, q) = self.pop_divide()?;
        self.push(q)
    }

    pub fn f_mod(&mut self) -> Result<()> {
        let (r, _) = self.pop_divide()?;
        self.push(r)
    }

    pub fn f_slash_mod(&mut self) -> Result<()> {
        let (r, q) = self.pop_divide()?;
        self.push(r)?;
        self.push(q)
    }

    /// */ and */mod keep the intermediate product at double width
    fn pop_star_slash(&mut self) -> Result<(Cell, Cell)> {
        self.stack.check(3)?;
        let c = self.pop()?;
        let b = self.pop()?;
        let a = self.pop()?;
        let (r, q) = floored_divmod(a as i128 * b as i128, c as i128)?;
        Ok((to_cell(r)?, to_cell(q)?))
    }

    pub fn f_star_slash(&mut self) -> Result<()> {
        let (_, q) = self.pop_star_slash()?;
        self.push(q)
    }

    pub fn f_star_slash_mod(&mut self) -> Result<()> {
        let (r, q) = self.pop_star_slash()?;
        self.push(r)?;
        self.push(q)
    }

    /// lshift ( x u -- x' ) shifts of a cell's width or more give zero
    pub fn f_lshift(&mut self) -> Result<()> {
        self.pop2_push1(|x, u| {
            Ok(match u32::try_from(u) {
                Ok(u) if u < UCell::BITS => ((x as UCell) << u) as Cell,
                _ => 0,
            })
        })
    }

    pub fn f_rshift(&mut self) -> Result<()> {
        self.pop2_push1(|x, u| {
            Ok(match u32::try_from(u) {
                Ok(u) if u < UCell::BITS => ((x as UCell) >> u) as Cell,
                _ => 0,
            })
        })
    }

    /// within ( n lo hi -- flag ) lo <= n < hi, computed so that it works across wraparound
    pub fn f_within(&mut self) -> Result<()> {
        self.stack.check(3)?;
        let hi = self.pop()?;
        let lo = self.pop()?;
        let n = self.pop()?;
        let inside = (n.wrapping_sub(lo) as UCell) < (hi.wrapping_sub(lo) as UCell);
        self.push_flag(inside)
    }

    ////////////////////
    /// Mixed and double precision

    pub fn f_m_star(&mut self) -> Result<()> {
        self.stack.check(2)?;
        let b = self.pop()? as DCell;
        let a = self.pop()? as DCell;
        self.push_double(a * b)
    }

    pub fn f_um_star(&mut self) -> Result<()> {
        self.stack.check(2)?;
        let b = self.pop()? as UCell as u64;
        let a = self.pop()? as UCell as u64;
        self.push_double((a * b) as DCell)
    }

    /// um/mod ( ud u -- r q ) unsigned division of a double by a cell
    pub fn f_um_slash_mod(&mut self) -> Result<()> {
        self.stack.check(3)?;
        let u = self.pop()? as UCell as u64;
        let ud = self.pop_double()? as u64;
        if u == 0 {
            return Err(ForthError::DivisionByZero);
        }
        let q = UCell::try_from(ud / u).map_err(|_| ForthError::ResultOutOfRange)?;
        let r = (ud % u) as UCell;
        self.push(r as Cell)?;
        self.push(q as Cell)
    }

    fn pop_double_divide(&mut self) -> Result<(i128, i128)> {
        self.stack.check(3)?;
        let n = self.pop()? as i128;
        let d = self.pop_double()? as i128;
        Ok((d, n))
    }

    /// fm/mod ( d n -- r q ) floored division of a double by a cell
    pub fn f_fm_slash_mod(&mut self) -> Result<()> {
        let (d, n) = self.pop_double_divide()?;
        let (r, q) = floored_divmod(d, n)?;
        let (r, q) = (to_cell(r)?, to_cell(q)?);
        self.push(r)?;
        self.push(q)
    }

    /// sm/rem ( d n -- r q ) symmetric division of a double by a cell
    pub fn f_sm_slash_rem(&mut self) -> Result<()> {
        let (d, n) = self.pop_double_divide()?;
        let (r, q) = symmetric_divmod(d, n)?;
        let (r, q) = (to_cell(r)?, to_cell(q)?);
        self.push(r)?;
        self.push(q)
    }

    fn pop_two_doubles(&mut self) -> Result<(DCell, DCell)> {
        self.stack.check(4)?;
        let b = self.pop_double()?;
        let a = self.pop_double()?;
        Ok((a, b))
    }

    pub fn f_d_plus(&mut self) -> Result<()> {
        let (a, b) = self.pop_two_doubles()?;
        self.push_double(a.wrapping_add(b))
    }

    pub fn f_d_minus(&mut self) -> Result<()> {
        let (a, b) = self.pop_two_doubles()?;
        self.push_double(a.wrapping_sub(b))
    }

    pub fn f_d_negate(&mut self) -> Result<()> {
        let d = self.pop_double()?;
        self.push_double(d.wrapping_neg())
    }

    pub fn f_d_abs(&mut self) -> Result<()> {
        let d = self.pop_double()?;
        self.push_double(d.wrapping_abs())
    }

    pub fn f_s_to_d(&mut self) -> Result<()> {
        let n = self.pop()?;
        self.push_double(n as DCell)
    }

    pub fn f_d_to_s(&mut self) -> Result<()> {
        let d = self.pop_double()?;
        self.push(split_double(d).0)
    }

    pub fn f_d_equal(&mut self) -> Result<()> {
        let (a, b) = self.pop_two_doubles()?;
        self.push_flag(a == b)
    }

    pub fn f_d_less(&mut self) -> Result<()> {
        let (a, b) = self.pop_two_doubles()?;
        self.push_flag(a < b)
    }

    pub fn f_d_zero_equal(&mut self) -> Result<()> {
        let d = self.pop_double()?;
        self.push_flag(d == 0)
    }

    /// m+ ( d n -- d' )
    pub fn f_m_plus(&mut self) -> Result<()> {
        self.stack.check(3)?;
        let n = self.pop()?;
        let d = self.pop_double()?;
        self.push_double(d.wrapping_add(n as DCell))
    }

    ////////////////////
    /// Memory

    /// @ ( a -- v )
    pub fn f_get(&mut self) -> Result<()> {
        let addr = self.pop_addr()?;
        let val = self.kernel.read_cell(addr)?;
        self.push(val)
    }

    /// ! ( v a -- ) stores v at address a
    pub fn f_store(&mut self) -> Result<()> {
        self.stack.check(2)?;
        let addr = self.pop_addr()?;
        let val = self.pop()?;
        self.kernel.write_cell(addr, val)
    }

    pub fn f_c_get(&mut self) -> Result<()> {
        let addr = self.pop_addr()?;
        let c = self.kernel.read_byte(addr)?;
        self.push(c as Cell)
    }

    pub fn f_c_store(&mut self) -> Result<()> {
        self.stack.check(2)?;
        let addr = self.pop_addr()?;
        let c = self.pop()?;
        self.kernel.write_byte(addr, c as u8)
    }

    pub fn f_plus_store(&mut self) -> Result<()> {
        self.stack.check(2)?;
        let addr = self.pop_addr()?;
        let n = self.pop()?;
        self.kernel.delta(addr, n)
    }

    pub fn f_two_get(&mut self) -> Result<()> {
        let addr = self.pop_addr()?;
        let d = self.kernel.read_double(addr)?;
        self.push_double(d)
    }

    pub fn f_two_store(&mut self) -> Result<()> {
        self.stack.check(3)?;
        let addr = self.pop_addr()?;
        let d = self.pop_double()?;
        self.kernel.write_double(addr, d)
    }

    pub fn f_aligned(&mut self) -> Result<()> {
        let addr = self.pop_len()?;
        self.push(aligned(addr) as Cell)
    }

    /// fill ( a u c -- )
    pub fn f_fill(&mut self) -> Result<()> {
        self.stack.check(3)?;
        let c = self.pop()?;
        let len = self.pop_len()?;
        let addr = self.pop_addr()?;
        self.kernel.fill(addr, len, c as u8)
    }

    pub fn f_erase(&mut self) -> Result<()> {
        self.stack.check(2)?;
        let len = self.pop_len()?;
        let addr = self.pop_addr()?;
        self.kernel.erase(addr, len)
    }

    /// move ( from to u -- )
    pub fn f_move(&mut self) -> Result<()> {
        self.stack.check(3)?;
        let len = self.pop_len()?;
        let to = self.pop_addr()?;
        let from = self.pop_addr()?;
        self.kernel.move_bytes(from, to, len)
    }

    /// count ( a -- a+1 u )
    pub fn f_count(&mut self) -> Result<()> {
        let addr = self.pop_addr()?;
        let len = self.kernel.read_byte(addr)?;
        self.push(addr as Cell + 1)?;
        self.push(len as Cell)
    }

    /// f_comma ( n -- ) compile a value into a definition
    ///     Takes the top of the stack and writes it to the next free location in data space
    pub fn f_comma(&mut self) -> Result<()> {
        let val = self.pop()?;
        self.comma(val)
    }

    pub fn f_c_comma(&mut self) -> Result<()> {
        let val = self.pop()?;
        self.dict.ccomma(&mut self.kernel, val as u8)
    }
}

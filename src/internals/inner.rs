/// Inner Interpreter
///
/// The threaded-code dispatch loop. An execution token is the address of a header's code
/// cell. The code cell says what kind of word it is: a builtin primitive, or one of the
/// fixed behaviours shared by all user words (colon definition, variable, constant,
/// DOES> child).
///
/// A colon definition's body is a sequence of xts ending in EXIT. Entering one pushes the
/// caller's ip on the return stack and points ip at the body; EXIT pops it back. Execution
/// started by `execute` is finished once ip returns to 0.
///
/// The run-time halves of the compiled control words live here too, since they move ip.
///
use tracing::trace;

use crate::error::{ForthError, Result};
use crate::internals::builtin::{Code, Prim};
use crate::internals::dictionary::{body_of, does_ptr, link_of};
use crate::kernel::{aligned, join_double, Cell, DCell, CELL};
use crate::runtime::ForthRuntime;

/// loop_done reports whether stepping a loop index from index by step crosses the limit
///     The index has crossed when index - limit changes sign, or when a non-zero step
///     starts at or beyond the limit on its own side. Differences are taken at double
///     width so spans wider than a cell keep their sign.
///
pub fn loop_done(index: Cell, limit: Cell, step: Cell) -> bool {
    let before = index as DCell - limit as DCell;
    let after = before + step as DCell;
    let crossed = (before < 0) != (after < 0);
    let away = (step > 0 && before >= 0) || (step < 0 && before < 0);
    crossed || away
}

impl ForthRuntime {
    /// execute runs the word with execution token xt to completion
    ///     The caller's ip is saved and restored, so execute may be called from inside a
    ///     primitive (EXECUTE, EVALUATE) as well as from the outer interpreter.
    ///
    pub fn execute(&mut self, xt: usize) -> Result<()> {
        let saved = self.ip;
        self.ip = 0;
        let result = self.run(xt);
        self.ip = saved;
        result
    }

    fn run(&mut self, xt: usize) -> Result<()> {
        self.dispatch(xt)?;
        while self.ip != 0 {
            let next = self.kernel.read_cell(self.ip)?;
            self.ip += CELL;
            let xt = self.kernel.address(next)?;
            self.dispatch(xt)?;
        }
        Ok(())
    }

    /// dispatch performs one step: the behaviour of a single xt
    fn dispatch(&mut self, xt: usize) -> Result<()> {
        let code = self.kernel.read_cell(xt)?;
        if self.tracing {
            self.trace_xt(xt);
        }
        match Code::from_cell(code) {
            Some(Code::Colon) => {
                self.push_r(self.ip as Cell)?;
                self.ip = body_of(xt);
            }
            Some(Code::Variable) => self.push(body_of(xt) as Cell)?,
            Some(Code::Constant) => {
                let val = self.kernel.read_cell(body_of(xt))?;
                self.push(val)?;
            }
            Some(Code::Does) => {
                self.push(body_of(xt) as Cell)?;
                self.push_r(self.ip as Cell)?;
                let does = self.kernel.read_cell(does_ptr(link_of(xt)))?;
                self.ip = self.kernel.address(does)?;
            }
            Some(Code::Prim(prim)) => self.primitive(prim)?,
            None => return Err(ForthError::InvalidMemoryAddress(xt as i64)),
        }
        Ok(())
    }

    fn trace_xt(&self, xt: usize) {
        let name = self
            .dict
            .header(&self.kernel, link_of(xt))
            .map(|h| h.name)
            .unwrap_or_default();
        let stack = self.stack.contents(&self.kernel).unwrap_or_default();
        trace!(xt, ip = self.ip, word = %name, ?stack, "dispatch");
    }

    /// primitive runs one builtin
    fn primitive(&mut self, prim: Prim) -> Result<()> {
        match prim {
            // compiled code
            Prim::Exit => self.i_exit()?,
            Prim::Lit => self.i_literal()?,
            Prim::TwoLit => self.i_two_literal()?,
            Prim::SLit => self.i_strlit()?,
            Prim::Branch => self.i_branch()?,
            Prim::ZBranch => self.i_branch0()?,
            Prim::DoRt => self.i_do(false)?,
            Prim::QDoRt => self.i_do(true)?,
            Prim::LoopRt => self.i_loop(1)?,
            Prim::PlusLoopRt => {
                let step = self.pop()?;
                self.i_loop(step)?
            }
            Prim::Unloop => self.f_unloop()?,
            Prim::OfRt => self.i_of()?,
            Prim::DoesRt => self.i_does()?,
            Prim::AbortQRt => self.i_abort_quote()?,
            Prim::Execute => self.f_execute()?,

            // stack
            Prim::Dup => self.f_dup()?,
            Prim::Drop => self.f_drop()?,
            Prim::Swap => self.f_swap()?,
            Prim::Over => self.f_over()?,
            Prim::Rot => self.f_rot()?,
            Prim::MinusRot => self.f_minus_rot()?,
            Prim::Nip => self.f_nip()?,
            Prim::Tuck => self.f_tuck()?,
            Prim::QDup => self.f_q_dup()?,
            Prim::Pick => self.f_pick()?,
            Prim::Roll => self.f_roll()?,
            Prim::Depth => self.f_stack_depth()?,
            Prim::TwoDup => self.f_two_dup()?,
            Prim::TwoDrop => self.f_two_drop()?,
            Prim::TwoSwap => self.f_two_swap()?,
            Prim::TwoOver => self.f_two_over()?,
            Prim::ToR => self.f_to_r()?,
            Prim::RFrom => self.f_r_from()?,
            Prim::RFetch => self.f_r_get()?,
            Prim::TwoToR => self.f_two_to_r()?,
            Prim::TwoRFrom => self.f_two_r_from()?,
            Prim::TwoRFetch => self.f_two_r_get()?,
            Prim::I => self.f_i()?,
            Prim::J => self.f_j()?,
            Prim::Clear => self.f_clear(),

            // arithmetic and logic
            Prim::Plus => self.pop2_push1(|a, b| Ok(a.wrapping_add(b)))?,
            Prim::Minus => self.pop2_push1(|a, b| Ok(a.wrapping_sub(b)))?,
            Prim::Star => self.pop2_push1(|a, b| Ok(a.wrapping_mul(b)))?,
            Prim::Slash => self.f_divide()?,
            Prim::Mod => self.f_mod()?,
            Prim::SlashMod => self.f_slash_mod()?,
            Prim::StarSlash => self.f_star_slash()?,
            Prim::StarSlashMod => self.f_star_slash_mod()?,
            Prim::OnePlus => self.pop1_push1(|a| a.wrapping_add(1))?,
            Prim::OneMinus => self.pop1_push1(|a| a.wrapping_sub(1))?,
            Prim::Negate => self.pop1_push1(|a| a.wrapping_neg())?,
            Prim::Abs => self.pop1_push1(|a| a.wrapping_abs())?,
            Prim::Min => self.pop2_push1(|a, b| Ok(a.min(b)))?,
            Prim::Max => self.pop2_push1(|a, b| Ok(a.max(b)))?,
            Prim::And => self.pop2_push1(|a, b| Ok(a & b))?,
            Prim::Or => self.pop2_push1(|a, b| Ok(a | b))?,
            Prim::Xor => self.pop2_push1(|a, b| Ok(a ^ b))?,
            Prim::Invert => self.pop1_push1(|a| !a)?,
            Prim::LShift => self.f_lshift()?,
            Prim::RShift => self.f_rshift()?,
            Prim::TwoStar => self.pop1_push1(|a| a.wrapping_shl(1))?,
            Prim::TwoSlash => self.pop1_push1(|a| a >> 1)?,
            Prim::Equal => self.compare(|a, b| a == b)?,
            Prim::NotEqual => self.compare(|a, b| a != b)?,
            Prim::Less => self.compare(|a, b| a < b)?,
            Prim::Greater => self.compare(|a, b| a > b)?,
            Prim::ULess => self.compare(|a, b| (a as u32) < (b as u32))?,
            Prim::ZeroEqual => self.pop1_flag(|a| a == 0)?,
            Prim::ZeroNotEqual => self.pop1_flag(|a| a != 0)?,
            Prim::ZeroLess => self.pop1_flag(|a| a < 0)?,
            Prim::ZeroGreater => self.pop1_flag(|a| a > 0)?,
            Prim::Within => self.f_within()?,
            Prim::True => self.push_flag(true)?,
            Prim::False => self.push_flag(false)?,

            // mixed and double precision
            Prim::MStar => self.f_m_star()?,
            Prim::UMStar => self.f_um_star()?,
            Prim::UMSlashMod => self.f_um_slash_mod()?,
            Prim::FMSlashMod => self.f_fm_slash_mod()?,
            Prim::SMSlashRem => self.f_sm_slash_rem()?,
            Prim::DPlus => self.f_d_plus()?,
            Prim::DMinus => self.f_d_minus()?,
            Prim::DNegate => self.f_d_negate()?,
            Prim::DAbs => self.f_d_abs()?,
            Prim::SToD => self.f_s_to_d()?,
            Prim::DToS => self.f_d_to_s()?,
            Prim::DEqual => self.f_d_equal()?,
            Prim::DLess => self.f_d_less()?,
            Prim::DZeroEqual => self.f_d_zero_equal()?,
            Prim::MPlus => self.f_m_plus()?,

            // memory
            Prim::Fetch => self.f_get()?,
            Prim::Store => self.f_store()?,
            Prim::CFetch => self.f_c_get()?,
            Prim::CStore => self.f_c_store()?,
            Prim::PlusStore => self.f_plus_store()?,
            Prim::TwoFetch => self.f_two_get()?,
            Prim::TwoStore => self.f_two_store()?,
            Prim::CellPlus => self.pop1_push1(|a| a.wrapping_add(CELL as Cell))?,
            Prim::Cells => self.pop1_push1(|a| a.wrapping_mul(CELL as Cell))?,
            Prim::CharPlus => self.pop1_push1(|a| a.wrapping_add(1))?,
            Prim::Chars => self.pop1_push1(|a| a)?,
            Prim::Aligned => self.f_aligned()?,
            Prim::Fill => self.f_fill()?,
            Prim::Erase => self.f_erase()?,
            Prim::Move => self.f_move()?,
            Prim::Count => self.f_count()?,

            // dictionary and compiler
            Prim::Here => self.push(self.dict.here() as Cell)?,
            Prim::Allot => {
                let n = self.pop()?;
                self.dict.allot(n)?
            }
            Prim::Comma => self.f_comma()?,
            Prim::CComma => self.f_c_comma()?,
            Prim::Align => self.dict.align()?,
            Prim::Unused => self.push(self.dict.unused() as Cell)?,
            Prim::Colon => self.f_colon()?,
            Prim::NoName => self.f_noname()?,
            Prim::Semicolon => self.f_semicolon()?,
            Prim::Create => self.f_create()?,
            Prim::Does => self.f_does()?,
            Prim::Constant => self.f_constant()?,
            Prim::Variable => self.f_variable()?,
            Prim::ToBody => self.pop1_push1(|xt| xt.wrapping_add(CELL as Cell))?,
            Prim::Immediate => self.f_immediate()?,
            Prim::Recurse => self.f_recurse()?,
            Prim::Tick => self.f_tick()?,
            Prim::BracketTick => self.f_bracket_tick()?,
            Prim::Literal => self.f_literal()?,
            Prim::TwoLiteral => self.f_two_literal()?,
            Prim::CompileComma => self.f_comma()?,
            Prim::Postpone => self.f_postpone()?,
            Prim::LeftBracket => self.set_compile_mode(false)?,
            Prim::RightBracket => self.set_compile_mode(true)?,
            Prim::State => self.push(self.state_ptr as Cell)?,

            // control structures
            Prim::If => self.c_if()?,
            Prim::Else => self.c_else()?,
            Prim::Then => self.c_then()?,
            Prim::Begin => self.c_begin()?,
            Prim::Again => self.c_again()?,
            Prim::Until => self.c_until()?,
            Prim::While => self.c_while()?,
            Prim::Repeat => self.c_repeat()?,
            Prim::Do => self.c_do(Prim::DoRt)?,
            Prim::QuestionDo => self.c_do(Prim::QDoRt)?,
            Prim::Loop => self.c_loop(Prim::LoopRt)?,
            Prim::PlusLoop => self.c_loop(Prim::PlusLoopRt)?,
            Prim::Leave => self.c_leave()?,
            Prim::Case => self.c_case()?,
            Prim::Of => self.c_of()?,
            Prim::EndOf => self.c_endof()?,
            Prim::EndCase => self.c_endcase()?,

            // outer interpreter and input
            Prim::Evaluate => self.f_evaluate()?,
            Prim::Source => {
                self.push(self.source.addr as Cell)?;
                self.push(self.source.len as Cell)?
            }
            Prim::ToIn => self.push(self.to_in_ptr as Cell)?,
            Prim::Base => self.push(self.base_ptr as Cell)?,
            Prim::Dpl => self.push(self.dpl_ptr as Cell)?,
            Prim::Decimal => self.kernel.write_cell(self.base_ptr, 10)?,
            Prim::Hex => self.kernel.write_cell(self.base_ptr, 16)?,
            Prim::Parse => self.f_parse()?,
            Prim::ParseName => self.f_parse_name()?,
            Prim::Char => self.f_char()?,
            Prim::BracketChar => self.f_bracket_char()?,
            Prim::Paren => {
                self.parse(b')')?;
            }
            Prim::Backslash => self.kernel.write_cell(self.to_in_ptr, self.source.len as Cell)?,
            Prim::SQuote => self.f_s_quote()?,
            Prim::DotQuote => self.f_dot_quote()?,
            Prim::Include => self.f_include()?,
            Prim::Bye => self.f_bye(),
            Prim::Abort => self.f_abort()?,
            Prim::AbortQuote => self.f_abort_quote()?,

            // output
            Prim::Emit => self.f_emit()?,
            Prim::Type => self.f_type()?,
            Prim::Cr => self.console.write_str("\n"),
            Prim::Dot => self.f_dot()?,
            Prim::UDot => self.f_u_dot()?,
            Prim::DDot => self.f_d_dot()?,
            Prim::DotS => self.f_dot_s()?,
            Prim::Flush => self.console.flush()?,

            // diagnostics
            Prim::See => self.f_see()?,
            Prim::Words => self.f_words()?,
            Prim::ShowStack => self.show_stack = true,
            Prim::HideStack => self.show_stack = false,
            Prim::TraceOn => self.tracing = true,
            Prim::TraceOff => self.tracing = false,
        }
        Ok(())
    }

    ////////////////////////////////////
    /// Run-time halves of compiled code

    /// exit ( -- ) returns to the caller, whose ip is on the return stack
    fn i_exit(&mut self) -> Result<()> {
        let ip = self.pop_r()?;
        self.ip = self.kernel.address(ip)?;
        Ok(())
    }

    /// inline_cell reads the cell at ip and steps over it
    fn inline_cell(&mut self) -> Result<Cell> {
        let val = self.kernel.read_cell(self.ip)?;
        self.ip += CELL;
        Ok(val)
    }

    /// Places the number compiled after (lit) on the stack
    ///
    ///    [ (lit) ] [ number ] in a compiled word
    ///
    fn i_literal(&mut self) -> Result<()> {
        let val = self.inline_cell()?;
        self.push(val)
    }

    ///    [ (2lit) ] [ low ] [ high ]
    fn i_two_literal(&mut self) -> Result<()> {
        let lo = self.inline_cell()?;
        let hi = self.inline_cell()?;
        self.push_double(join_double(lo, hi))
    }

    /// Places the address and length of the adjacent string on the stack
    ///
    ///    [ (s") ] [ length ] [ characters ... ] padded to a cell boundary
    ///
    fn i_strlit(&mut self) -> Result<()> {
        let len = self.inline_cell()?;
        let addr = self.ip;
        self.push(addr as Cell)?;
        self.push(len)?;
        self.ip = aligned(addr + len.max(0) as usize);
        Ok(())
    }

    /// branch_by moves ip by the offset stored in the cell at ip
    ///     Offsets are relative to the address of the offset cell itself.
    ///
    fn branch_by(&mut self) -> Result<()> {
        let offset = self.kernel.read_cell(self.ip)?;
        let target = self.ip as i64 + offset as i64;
        self.ip = usize::try_from(target)
            .ok()
            .filter(|t| *t < self.kernel.size())
            .ok_or(ForthError::InvalidMemoryAddress(target))?;
        Ok(())
    }

    /// Unconditional branch, used by condition and loop structures
    ///
    fn i_branch(&mut self) -> Result<()> {
        self.branch_by()
    }

    /// Branch if zero, used by condition and loop structures
    ///
    fn i_branch0(&mut self) -> Result<()> {
        if self.pop()? == 0 {
            self.branch_by()
        } else {
            self.ip += CELL;
            Ok(())
        }
    }

    /// (do) and (?do) ( limit index -- ) move the loop parameters to the return stack
    ///     The offset after them leads past the loop, and is taken only by (?do) when the
    ///     limit and index are equal.
    ///
    fn i_do(&mut self, conditional: bool) -> Result<()> {
        let index = self.pop()?;
        let limit = self.pop()?;
        if conditional && index == limit {
            return self.branch_by();
        }
        self.push_r(limit)?;
        self.push_r(index)?;
        self.ip += CELL;
        Ok(())
    }

    /// (loop) and (+loop) step the index, then either jump back or discard the parameters
    fn i_loop(&mut self, step: Cell) -> Result<()> {
        let index = self.top_r(0)?;
        let limit = self.top_r(1)?;
        if loop_done(index, limit, step) {
            self.f_unloop()?;
            self.ip += CELL;
            Ok(())
        } else {
            self.rstack
                .poke(&mut self.kernel, 0, index.wrapping_add(step))?;
            self.branch_by()
        }
    }

    /// (of) ( x1 x2 -- | x1 ) continues into the clause if x1 = x2, otherwise keeps x1 and jumps
    fn i_of(&mut self) -> Result<()> {
        let x2 = self.pop()?;
        let x1 = self.top(0)?;
        if x1 == x2 {
            self.pop()?;
            self.ip += CELL;
            Ok(())
        } else {
            self.branch_by()
        }
    }

    /// (does>) gives the latest word the behaviour that follows it, then exits
    ///     the defining word.
    ///
    fn i_does(&mut self) -> Result<()> {
        let latest = self.dict.latest();
        self.dict
            .set_does(&mut self.kernel, latest, Code::Does.to_cell(), self.ip)?;
        self.i_exit()
    }

    /// (abort") ( f a u -- ) raises the abort error with the message a u if f is true
    fn i_abort_quote(&mut self) -> Result<()> {
        let len = self.pop_len()?;
        let addr = self.pop_addr()?;
        let flag = self.pop()?;
        if flag != 0 {
            let text = self.kernel.string_get(addr, len)?;
            return Err(ForthError::AbortQuote(text));
        }
        Ok(())
    }

    /// EXECUTE ( xt -- ) runs the word whose execution token is on the stack
    ///
    pub fn f_execute(&mut self) -> Result<()> {
        let xt = self.pop_addr()?;
        self.execute(xt)
    }

    /// unloop ( -- ) discards the innermost loop's parameters
    pub fn f_unloop(&mut self) -> Result<()> {
        self.rstack.check(2)?;
        self.pop_r()?;
        self.pop_r()?;
        Ok(())
    }
}

/////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> ForthRuntime {
        let mut rt = ForthRuntime::new().unwrap();
        rt.cold_start(false).unwrap();
        rt
    }

    #[test]
    fn test_loop_done_counts_up() {
        assert!(!loop_done(0, 10, 1));
        assert!(!loop_done(8, 10, 1));
        assert!(loop_done(9, 10, 1));
        assert!(loop_done(8, 10, 2));
    }

    #[test]
    fn test_loop_done_counts_down() {
        assert!(!loop_done(10, 0, -1));
        assert!(!loop_done(1, 0, -1));
        assert!(loop_done(0, 0, -1));
    }

    #[test]
    fn test_loop_done_negative_step_below_limit() {
        // 10 0 DO ... -1 +LOOP runs once
        assert!(loop_done(0, 10, -1));
    }

    #[test]
    fn test_loop_done_equal_bounds_stop_after_one_pass() {
        assert!(loop_done(5, 5, 1));
        assert!(loop_done(5, 5, -1));
    }

    #[test]
    fn test_loop_done_span_wider_than_a_cell() {
        assert!(!loop_done(-2_147_483_640, 10, 1_000_000_000));
        assert!(!loop_done(-1_147_483_640, 10, 1_000_000_000));
        assert!(loop_done(-147_483_640, 10, 1_000_000_000));
    }

    #[test]
    fn test_loop_done_wraps_at_the_boundary() {
        assert!(loop_done(i32::MAX, i32::MIN, 1));
        assert!(!loop_done(i32::MAX - 2, i32::MAX, 1));
    }

    #[test]
    fn test_execute_primitive() {
        let mut rt = runtime();
        rt.push(7).unwrap();
        rt.execute(rt.xt_of_prim(Prim::Dup)).unwrap();
        rt.execute(rt.xt_of_prim(Prim::Star)).unwrap();
        assert_eq!(rt.pop().unwrap(), 49);
        assert_eq!(rt.ip, 0);
    }

    #[test]
    fn test_execute_hand_built_colon() {
        let mut rt = runtime();
        // : sq dup * ;
        let xt = rt
            .dict
            .create(&mut rt.kernel, "sq", 0, Code::Colon.to_cell())
            .unwrap();
        rt.compile_prim(Prim::Dup).unwrap();
        rt.compile_prim(Prim::Star).unwrap();
        rt.compile_prim(Prim::Exit).unwrap();
        rt.push(5).unwrap();
        rt.execute(xt).unwrap();
        assert_eq!(rt.pop().unwrap(), 25);
        assert_eq!(rt.rstack.depth(), 0);
    }

    #[test]
    fn test_literal_and_branch() {
        let mut rt = runtime();
        // (lit) 1 branch +12 (lit) 2 exit  skips the second literal
        let xt = rt
            .dict
            .create(&mut rt.kernel, "t", 0, Code::Colon.to_cell())
            .unwrap();
        rt.compile_prim(Prim::Lit).unwrap();
        rt.comma(1).unwrap();
        rt.compile_prim(Prim::Branch).unwrap();
        rt.comma(3 * CELL as Cell).unwrap();
        rt.compile_prim(Prim::Lit).unwrap();
        rt.comma(2).unwrap();
        rt.compile_prim(Prim::Exit).unwrap();
        rt.execute(xt).unwrap();
        assert_eq!(rt.stack.contents(&rt.kernel).unwrap(), vec![1]);
    }

    #[test]
    fn test_constant_and_variable_codes() {
        let mut rt = runtime();
        let c = rt
            .dict
            .create(&mut rt.kernel, "k", 0, Code::Constant.to_cell())
            .unwrap();
        rt.comma(99).unwrap();
        let v = rt
            .dict
            .create(&mut rt.kernel, "v", 0, Code::Variable.to_cell())
            .unwrap();
        rt.comma(0).unwrap();
        rt.execute(c).unwrap();
        rt.execute(v).unwrap();
        assert_eq!(rt.pop().unwrap(), body_of(v) as Cell);
        assert_eq!(rt.pop().unwrap(), 99);
    }

    #[test]
    fn test_bad_code_cell_is_an_error() {
        let mut rt = runtime();
        let here = rt.dict.here();
        rt.comma(-77).unwrap();
        assert!(rt.execute(here).is_err());
        assert_eq!(rt.ip, 0);
    }

    #[test]
    fn test_exit_with_empty_return_stack_underflows() {
        let mut rt = runtime();
        assert!(rt.execute(rt.xt_of_prim(Prim::Exit)).is_err());
    }
}

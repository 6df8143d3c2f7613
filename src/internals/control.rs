/// Control-Flow Compiler
///
/// Structured words (IF, BEGIN, DO, CASE and the rest) are immediate. While a definition
/// is compiled they lay down branch primitives with inline offsets, and use the control
/// stack to carry the addresses still waiting to be resolved.
///
/// Each entry on the control stack is a marker of two cells: an address, then a tag
/// naming the construct that pushed it. A forward marker holds the address of a
/// placeholder offset cell; a backward marker holds the branch target.
///
/// Offsets are relative to the offset cell itself, so a branch whose offset cell is at P
/// continues at P + offset.
///
use crate::error::{ForthError, Result};
use crate::internals::builtin::Prim;
use crate::internals::stack::StackKind;
use crate::kernel::Cell;
use crate::runtime::ForthRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Colon = 1,
    If,
    Else,
    While,
    DoForward,
    DoBack,
    Leave,
    Of,
    EndOf,
    DoStart,
    Case,
    Begin,
}

impl Tag {
    const ALL: [Tag; 12] = [
        Tag::Colon,
        Tag::If,
        Tag::Else,
        Tag::While,
        Tag::DoForward,
        Tag::DoBack,
        Tag::Leave,
        Tag::Of,
        Tag::EndOf,
        Tag::DoStart,
        Tag::Case,
        Tag::Begin,
    ];

    pub fn from_cell(val: Cell) -> Option<Tag> {
        Tag::ALL.iter().copied().find(|t| *t as Cell == val)
    }
}

impl ForthRuntime {
    /// push_marker puts (tag, addr) on the control stack, tag on top
    pub fn push_marker(&mut self, tag: Tag, addr: usize) -> Result<()> {
        if self.cstack.capacity() - self.cstack.depth() < 2 {
            return Err(ForthError::StackOverflow(StackKind::Control));
        }
        self.cstack.push(&mut self.kernel, addr as Cell)?;
        self.cstack.push(&mut self.kernel, tag as Cell)
    }

    /// pop_marker removes the newest marker. A missing marker is a nesting error.
    pub fn pop_marker(&mut self) -> Result<(Tag, usize)> {
        if self.marker_depth() == 0 {
            return Err(ForthError::CompilerNesting);
        }
        let tag = self.cstack.pop(&self.kernel)?;
        let addr = self.cstack.pop(&self.kernel)?;
        let tag = Tag::from_cell(tag).ok_or(ForthError::CompilerNesting)?;
        Ok((tag, addr as usize))
    }

    /// peek_tag returns the tag of the newest marker, if there is one
    pub fn peek_tag(&self) -> Option<Tag> {
        if self.marker_depth() == 0 {
            return None;
        }
        self.cstack
            .peek(&self.kernel, 0)
            .ok()
            .and_then(Tag::from_cell)
    }

    /// marker_depth counts markers, not cells
    pub fn marker_depth(&self) -> usize {
        self.cstack.depth() / 2
    }

    /// emit_forward_branch compiles op with a placeholder offset and remembers where it is
    pub fn emit_forward_branch(&mut self, op: Prim, tag: Tag) -> Result<()> {
        self.compile_prim(op)?;
        let placeholder = self.dict.here();
        self.comma(0)?;
        self.push_marker(tag, placeholder)
    }

    /// patch makes the branch whose offset cell is at placeholder land at HERE
    fn patch(&mut self, placeholder: usize) -> Result<()> {
        let offset = self.dict.here() as Cell - placeholder as Cell;
        self.kernel.write_cell(placeholder, offset)
    }

    /// pop_expected pops markers until one with an expected tag turns up
    ///     WHILE markers may be passed over when look_through_while is set; they are put back
    ///     in their original order. Anything else is a nesting error.
    ///
    fn pop_expected(&mut self, expected: &[Tag], look_through_while: bool) -> Result<usize> {
        let mut passed = Vec::new();
        let found = loop {
            let (tag, addr) = self.pop_marker()?;
            if expected.contains(&tag) {
                break addr;
            }
            if look_through_while && tag == Tag::While {
                passed.push(addr);
                continue;
            }
            return Err(ForthError::CompilerNesting);
        };
        for addr in passed.into_iter().rev() {
            self.push_marker(Tag::While, addr)?;
        }
        Ok(found)
    }

    /// resolve_forward patches the newest pending forward branch of one of the expected kinds
    pub fn resolve_forward(&mut self, expected: &[Tag], look_through_while: bool) -> Result<()> {
        let placeholder = self.pop_expected(expected, look_through_while)?;
        self.patch(placeholder)
    }

    /// mark_backward_target remembers HERE as the destination of a later backward branch
    pub fn mark_backward_target(&mut self, tag: Tag) -> Result<()> {
        let here = self.dict.here();
        self.push_marker(tag, here)
    }

    /// resolve_backward compiles op with an offset back to the matching target
    pub fn resolve_backward(&mut self, op: Prim, expected: &[Tag]) -> Result<()> {
        let target = self.pop_expected(expected, true)?;
        self.compile_prim(op)?;
        let offset = target as Cell - self.dict.here() as Cell;
        self.comma(offset)
    }

    ////////////////////////////////
    /// Conditionals

    pub fn c_if(&mut self) -> Result<()> {
        self.emit_forward_branch(Prim::ZBranch, Tag::If)
    }

    /// ELSE lays down its own branch first, so the IF lands just past it
    pub fn c_else(&mut self) -> Result<()> {
        self.compile_prim(Prim::Branch)?;
        let placeholder = self.dict.here();
        self.comma(0)?;
        self.resolve_forward(&[Tag::If], true)?;
        self.push_marker(Tag::Else, placeholder)
    }

    pub fn c_then(&mut self) -> Result<()> {
        self.resolve_forward(&[Tag::If, Tag::Else, Tag::While], true)
    }

    ////////////////////////////////
    /// Indefinite loops

    pub fn c_begin(&mut self) -> Result<()> {
        self.mark_backward_target(Tag::Begin)
    }

    pub fn c_again(&mut self) -> Result<()> {
        self.resolve_backward(Prim::Branch, &[Tag::Begin])
    }

    pub fn c_until(&mut self) -> Result<()> {
        self.resolve_backward(Prim::ZBranch, &[Tag::Begin])
    }

    pub fn c_while(&mut self) -> Result<()> {
        self.emit_forward_branch(Prim::ZBranch, Tag::While)
    }

    pub fn c_repeat(&mut self) -> Result<()> {
        self.resolve_backward(Prim::Branch, &[Tag::Begin])?;
        self.resolve_forward(&[Tag::While], false)
    }

    ////////////////////////////////
    /// Counted loops
    ///
    /// DO and ?DO compile
    ///
    /// ```text
    /// (do) [offset to exit] body... (loop) [offset to body] exit:
    /// ```
    ///
    /// The forward offset is used only by (?do), to skip a loop that would not run.

    pub fn c_do(&mut self, op: Prim) -> Result<()> {
        let here = self.dict.here();
        self.push_marker(Tag::DoStart, here)?;
        self.emit_forward_branch(op, Tag::DoForward)?;
        self.mark_backward_target(Tag::DoBack)
    }

    /// LOOP and +LOOP close the back edge, then resolve every LEAVE and the ?DO exit
    pub fn c_loop(&mut self, op: Prim) -> Result<()> {
        self.resolve_backward(op, &[Tag::DoBack])?;
        while self.peek_tag() == Some(Tag::Leave) {
            let (_, placeholder) = self.pop_marker()?;
            self.patch(placeholder)?;
        }
        self.resolve_forward(&[Tag::DoForward], false)?;
        match self.pop_marker()? {
            (Tag::DoStart, _) => Ok(()),
            _ => Err(ForthError::CompilerNesting),
        }
    }

    /// LEAVE discards the loop parameters and branches past the loop
    ///     Its marker is filed beneath the innermost DO's back marker, so that any
    ///     conditionals opened inside the loop still match normally.
    ///
    pub fn c_leave(&mut self) -> Result<()> {
        self.compile_prim(Prim::Unloop)?;
        self.compile_prim(Prim::Branch)?;
        let placeholder = self.dict.here();
        self.comma(0)?;

        let mut above = Vec::new();
        let back = loop {
            let (tag, addr) = self.pop_marker()?;
            if tag == Tag::DoBack {
                break addr;
            }
            above.push((tag, addr));
        };
        self.push_marker(Tag::Leave, placeholder)?;
        self.push_marker(Tag::DoBack, back)?;
        for (tag, addr) in above.into_iter().rev() {
            self.push_marker(tag, addr)?;
        }
        Ok(())
    }

    ////////////////////////////////
    /// CASE

    pub fn c_case(&mut self) -> Result<()> {
        let here = self.dict.here();
        self.push_marker(Tag::Case, here)
    }

    pub fn c_of(&mut self) -> Result<()> {
        self.emit_forward_branch(Prim::OfRt, Tag::Of)
    }

    pub fn c_endof(&mut self) -> Result<()> {
        self.compile_prim(Prim::Branch)?;
        let placeholder = self.dict.here();
        self.comma(0)?;
        self.resolve_forward(&[Tag::Of], false)?;
        self.push_marker(Tag::EndOf, placeholder)
    }

    pub fn c_endcase(&mut self) -> Result<()> {
        self.compile_prim(Prim::Drop)?;
        while self.peek_tag() == Some(Tag::EndOf) {
            let (_, placeholder) = self.pop_marker()?;
            self.patch(placeholder)?;
        }
        match self.pop_marker()? {
            (Tag::Case, _) => Ok(()),
            _ => Err(ForthError::CompilerNesting),
        }
    }
}

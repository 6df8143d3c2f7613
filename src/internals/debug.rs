// Debugging help

use crate::error::{ForthError, Result};
use crate::internals::builtin::{Code, Prim};
use crate::internals::dictionary::{body_of, link_of, Header};
use crate::internals::number::{format_number, number_repr, Number};
use crate::kernel::{aligned, join_double, Cell, CELL};
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    /// prim_at returns the primitive whose xt is val, if it is one
    fn prim_at(&self, val: Cell) -> Option<Prim> {
        let xt = usize::try_from(val).ok()?;
        self.prim_xt
            .iter()
            .position(|p| *p == xt)
            .and_then(Prim::from_index)
    }

    /// word_name gives the name of the word with execution token val
    fn word_name(&self, val: Cell) -> Result<Option<String>> {
        let xt = match usize::try_from(val) {
            Ok(xt) if self.dict.contains_xt(&self.kernel, xt)? => xt,
            _ => return Ok(None),
        };
        let header = self.dict.header(&self.kernel, link_of(xt))?;
        Ok(Some(if header.name.is_empty() {
            format!(":noname@{}", xt)
        } else {
            header.name
        }))
    }

    /// decompile_from renders compiled code starting at addr, up to the EXIT that ends it
    ///     An EXIT only ends the code when no branch seen so far jumps past it.
    ///
    pub fn decompile_from(&self, start: usize) -> Result<String> {
        let base = self.base()?;
        let end = self.dict.here();
        let mut out = Vec::new();
        let mut furthest = start;
        let mut addr = start;
        while addr < end {
            let cell = self.kernel.read_cell(addr)?;
            let at = addr;
            addr += CELL;
            match self.prim_at(cell) {
                Some(Prim::Lit) => {
                    let n = self.kernel.read_cell(addr)?;
                    out.push(format_number(n as i64, base));
                    addr += CELL;
                }
                Some(Prim::TwoLit) => {
                    let lo = self.kernel.read_cell(addr)?;
                    let hi = self.kernel.read_cell(addr + CELL)?;
                    out.push(number_repr(Number::Double(join_double(lo, hi)), base));
                    addr += 2 * CELL;
                }
                Some(Prim::SLit) => {
                    let len = self.kernel.read_cell(addr)?.max(0) as usize;
                    let text = self.kernel.string_get(addr + CELL, len)?;
                    out.push(format!("s\" {}\"", text));
                    addr = aligned(addr + CELL + len);
                }
                Some(
                    p @ (Prim::Branch
                    | Prim::ZBranch
                    | Prim::DoRt
                    | Prim::QDoRt
                    | Prim::LoopRt
                    | Prim::PlusLoopRt
                    | Prim::OfRt),
                ) => {
                    let offset = self.kernel.read_cell(addr)?;
                    let target = (addr as i64 + offset as i64).max(0) as usize;
                    furthest = furthest.max(target);
                    out.push(format!("{}:{}", p.name(), offset));
                    addr += CELL;
                }
                Some(Prim::Exit) if at >= furthest => {
                    out.push(";".to_string());
                    break;
                }
                Some(p) => out.push(p.name().to_string()),
                None => match self.word_name(cell)? {
                    Some(name) => out.push(name),
                    None => out.push(format!("?{}", cell)),
                },
            }
        }
        Ok(out.join(" "))
    }

    /// describe renders a word the way SEE prints it
    pub fn describe(&self, header: &Header) -> Result<String> {
        let xt = header.xt();
        let text = match Code::from_cell(header.code) {
            Some(Code::Prim(p)) => format!("Builtin: {}", p.builtin().doc),
            Some(Code::Colon) => {
                let mut text = format!(": {} {}", header.name, self.decompile_from(body_of(xt))?);
                if header.is_immediate() {
                    text.push_str(" immediate");
                }
                text
            }
            Some(Code::Constant) => {
                let val = self.kernel.read_cell(body_of(xt))?;
                format!("Constant: {} = {}", header.name, format_number(val as i64, self.base()?))
            }
            Some(Code::Variable) => {
                let val = self.kernel.read_cell(body_of(xt))?;
                format!("Variable: {} = {}", header.name, format_number(val as i64, self.base()?))
            }
            Some(Code::Does) => format!(
                "Created: {} does> {}",
                header.name,
                self.decompile_from(header.does)?
            ),
            None => return Err(ForthError::InvalidMemoryAddress(xt as i64)),
        };
        Ok(text)
    }

    /// see <name> ( -- ) prints the definition of a word
    ///     Taking a postfix word name (normally used interactively), this is the Forth decompiler.
    ///
    pub fn f_see(&mut self) -> Result<()> {
        let (addr, len) = self.parse_name()?;
        if len == 0 {
            return Err(ForthError::ZeroLengthName);
        }
        let name = self.kernel.string_get(addr, len)?;
        let header = self
            .find_header(&name)?
            .ok_or(ForthError::UndefinedWord(name))?;
        let text = self.describe(&header)?;
        self.console.write_str(&text);
        self.console.write_str("\n");
        Ok(())
    }

    /// words ( -- ) lists the visible words, newest first
    pub fn f_words(&mut self) -> Result<()> {
        let mut names = Vec::new();
        for link in self.dict.links(&self.kernel)? {
            let header = self.dict.header(&self.kernel, link)?;
            if !header.is_hidden() {
                names.push(header.name);
            }
        }
        self.console.write_str(&names.join(" "));
        self.console.write_str("\n");
        Ok(())
    }
}

// Compiler and Interpreter

use tracing::debug;

use crate::error::{ForthError, Result};
use crate::internals::builtin::{Code, Prim};
use crate::internals::control::Tag;
use crate::internals::dictionary::{link_of, xt_of, Header, IMMEDIATE, SMUDGE};
use crate::internals::number::{numeric_shape, parse_number, Number};
use crate::kernel::{split_double, Cell};
use crate::runtime::{ForthRuntime, PAD_SIZE};

impl ForthRuntime {
    /// EVAL ( -- ) interprets tokens from the current source until it is exhausted
    ///     Stops early once BYE has been executed.
    ///
    pub fn f_eval(&mut self) -> Result<()> {
        while let Some(token) = self.next_token()? {
            self.interpret_token(&token)?;
            if self.exit_flag {
                break;
            }
        }
        Ok(())
    }

    /// interpret_token handles one token: execute or compile a word, or convert a number
    ///     Immediate words run even while compiling. Compile-only words are rejected
    ///     when interpreting.
    ///
    pub fn interpret_token(&mut self, token: &str) -> Result<()> {
        let compiling = self.get_compile_mode()?;
        if let Some(header) = self.find_header(token)? {
            if compiling && !header.is_immediate() {
                self.compile_xt(header.xt())
            } else if !compiling && header.is_compile_only() {
                Err(ForthError::CompileOnly(header.name))
            } else {
                self.execute(header.xt())
            }
        } else {
            match parse_number(token, self.base()?) {
                Some((number, dpl)) => {
                    self.kernel.write_cell(self.dpl_ptr, dpl)?;
                    self.number(number, compiling)
                }
                None if numeric_shape(token) => Err(ForthError::InvalidNumber(token.to_string())),
                None => Err(ForthError::UndefinedWord(token.to_string())),
            }
        }
    }

    /// number pushes a converted number, or compiles it as a literal
    fn number(&mut self, number: Number, compiling: bool) -> Result<()> {
        match (number, compiling) {
            (Number::Single(n), false) => self.push(n),
            (Number::Double(d), false) => self.push_double(d),
            (Number::Single(n), true) => {
                self.compile_prim(Prim::Lit)?;
                self.comma(n)
            }
            (Number::Double(d), true) => self.compile_double(d),
        }
    }

    fn compile_double(&mut self, d: i64) -> Result<()> {
        let (lo, hi) = split_double(d);
        self.compile_prim(Prim::TwoLit)?;
        self.comma(lo)?;
        self.comma(hi)
    }

    /// find_header looks a name up in the dictionary, decoding the header if it is there
    pub fn find_header(&self, name: &str) -> Result<Option<Header>> {
        match self.dict.find(&self.kernel, name)? {
            Some(link) => Ok(Some(self.dict.header(&self.kernel, link)?)),
            None => Ok(None),
        }
    }

    /////////////////////////////////
    /// Parsing

    /// to_in returns the parse offset, kept inside the source
    fn to_in(&self) -> Result<usize> {
        let to_in = self.kernel.read_cell(self.to_in_ptr)?;
        Ok((to_in.max(0) as usize).min(self.source.len))
    }

    fn set_to_in(&mut self, to_in: usize) -> Result<()> {
        self.kernel.write_cell(self.to_in_ptr, to_in as Cell)
    }

    /// parse ( -- a u ) takes text up to the delimiter, which is consumed but not included
    ///     Returns the address and length of the text inside the source.
    ///
    pub fn parse(&mut self, delim: u8) -> Result<(usize, usize)> {
        let start = self.to_in()?;
        let text = self.kernel.read_bytes(self.source.addr, self.source.len)?;
        let len = text[start..]
            .iter()
            .position(|c| *c == delim)
            .unwrap_or(text.len() - start);
        let next = (start + len + 1).min(self.source.len);
        self.set_to_in(next)?;
        Ok((self.source.addr + start, len))
    }

    /// parse_name skips leading white space, then takes a white-space delimited name
    ///     At the end of the source the length is zero.
    ///
    pub fn parse_name(&mut self) -> Result<(usize, usize)> {
        let mut start = self.to_in()?;
        let text = self.kernel.read_bytes(self.source.addr, self.source.len)?;
        while start < text.len() && text[start].is_ascii_whitespace() {
            start += 1;
        }
        let mut end = start;
        while end < text.len() && !text[end].is_ascii_whitespace() {
            end += 1;
        }
        let next = (end + 1).min(self.source.len);
        self.set_to_in(next)?;
        Ok((self.source.addr + start, end - start))
    }

    /// next_token returns the next name in the source, or None when it is used up
    pub fn next_token(&mut self) -> Result<Option<String>> {
        let (addr, len) = self.parse_name()?;
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(self.kernel.string_get(addr, len)?))
    }

    /// require_name gets the name a defining or parsing word needs
    fn require_name(&mut self) -> Result<String> {
        self.next_token()?.ok_or(ForthError::ZeroLengthName)
    }

    /// PARSE ( c -- a u ) parses text delimited by c
    pub fn f_parse(&mut self) -> Result<()> {
        let delim = self.pop()? as u8;
        let (addr, len) = self.parse(delim)?;
        self.push(addr as Cell)?;
        self.push(len as Cell)
    }

    /// PARSE-NAME ( -- a u ) parses a white-space delimited name
    pub fn f_parse_name(&mut self) -> Result<()> {
        let (addr, len) = self.parse_name()?;
        self.push(addr as Cell)?;
        self.push(len as Cell)
    }

    /// CHAR <c> ( -- c ) pushes the first character of the next name
    pub fn f_char(&mut self) -> Result<()> {
        let (addr, len) = self.parse_name()?;
        if len == 0 {
            return Err(ForthError::ZeroLengthName);
        }
        let c = self.kernel.read_byte(addr)?;
        self.push(c as Cell)
    }

    /// [CHAR] <c> compiles the first character of the next name as a literal
    pub fn f_bracket_char(&mut self) -> Result<()> {
        self.f_char()?;
        self.f_literal()
    }

    /// EVALUATE ( a u -- ) interprets the string, then resumes the current source
    pub fn f_evaluate(&mut self) -> Result<()> {
        let len = self.pop_len()?;
        let addr = self.pop_addr()?;
        self.save_source()?;
        self.set_source(addr, len)?;
        let result = self.f_eval();
        self.restore_source()?;
        result
    }

    /////////////////////////////////
    /// Defining words

    /// UNIQUE? warns if a name is about to shadow an existing definition
    ///     The old definition stays in the dictionary; words compiled against it are unaffected.
    ///
    fn q_unique(&self, name: &str) -> Result<()> {
        if self.dict.find(&self.kernel, name)?.is_some() {
            self.msg
                .warning("unique?", "Overwriting existing definition", Some(name));
        }
        Ok(())
    }

    /// : (colon) <name> starts a new definition
    ///     The header is smudged until ; so the word cannot find itself, and any earlier
    ///     definition with the same name is still the one that gets called.
    ///
    pub fn f_colon(&mut self) -> Result<()> {
        if self.marker_depth() != 0 {
            return Err(ForthError::CompilerNesting);
        }
        let name = self.require_name()?;
        self.q_unique(&name)?;
        let xt = self
            .dict
            .create(&mut self.kernel, &name, SMUDGE, Code::Colon.to_cell())?;
        self.push_marker(Tag::Colon, xt)?;
        debug!(name = %name, xt, "compiling");
        self.set_compile_mode(true)
    }

    /// :NONAME ( -- xt ) starts a definition with no name, leaving its xt on the stack
    pub fn f_noname(&mut self) -> Result<()> {
        if self.marker_depth() != 0 {
            return Err(ForthError::CompilerNesting);
        }
        let xt = self
            .dict
            .create_noname(&mut self.kernel, Code::Colon.to_cell())?;
        self.push_marker(Tag::Colon, xt)?;
        self.set_compile_mode(true)?;
        self.push(xt as Cell)
    }

    /// ; terminates a definition, making it visible and returning to interpret mode
    ///     Every control structure opened inside the definition must be closed.
    ///
    pub fn f_semicolon(&mut self) -> Result<()> {
        if self.marker_depth() != 1 {
            return Err(ForthError::CompilerNesting);
        }
        let xt = match self.pop_marker()? {
            (Tag::Colon, xt) => xt,
            _ => return Err(ForthError::CompilerNesting),
        };
        self.compile_prim(Prim::Exit)?;
        self.dict.clear_flag(&mut self.kernel, link_of(xt), SMUDGE)?;
        debug!(xt, here = self.dict.here(), "definition complete");
        self.set_compile_mode(false)
    }

    /// CREATE <name> ( -- ) makes a word that pushes the address of its body
    pub fn f_create(&mut self) -> Result<()> {
        let name = self.require_name()?;
        self.q_unique(&name)?;
        self.dict
            .create(&mut self.kernel, &name, 0, Code::Variable.to_cell())?;
        Ok(())
    }

    /// DOES> ends the defining part of a word; the code after it becomes the run-time
    ///     behaviour of each word the defining word creates.
    ///
    pub fn f_does(&mut self) -> Result<()> {
        self.compile_prim(Prim::DoesRt)
    }

    /// CONSTANT <name> ( n -- )
    pub fn f_constant(&mut self) -> Result<()> {
        let val = self.pop()?;
        let name = self.require_name()?;
        self.q_unique(&name)?;
        self.dict
            .create(&mut self.kernel, &name, 0, Code::Constant.to_cell())?;
        self.comma(val)
    }

    /// VARIABLE <name> ( -- ) one cell, initially zero
    pub fn f_variable(&mut self) -> Result<()> {
        let name = self.require_name()?;
        self.q_unique(&name)?;
        self.dict
            .create(&mut self.kernel, &name, 0, Code::Variable.to_cell())?;
        self.comma(0)
    }

    /// immediate ( -- ) sets the immediate flag on the most recently defined word
    pub fn f_immediate(&mut self) -> Result<()> {
        let latest = self.dict.latest();
        self.dict.set_flag(&mut self.kernel, latest, IMMEDIATE)
    }

    /// RECURSE compiles a call to the definition being compiled
    pub fn f_recurse(&mut self) -> Result<()> {
        let latest = self.dict.latest();
        self.compile_xt(xt_of(latest))
    }

    /// ' (TICK) <name> ( -- xt ) finds a word and pushes its execution token
    pub fn f_tick(&mut self) -> Result<()> {
        let name = self.require_name()?;
        match self.find_header(&name)? {
            Some(header) => self.push(header.xt() as Cell),
            None => Err(ForthError::UndefinedWord(name)),
        }
    }

    /// ['] <name> compiles the execution token of name as a literal
    pub fn f_bracket_tick(&mut self) -> Result<()> {
        self.f_tick()?;
        self.f_literal()
    }

    /// LITERAL ( n -- ) compiles n
    ///     Numbers are represented in compiled functions with two cells: (lit), and the value.
    ///
    pub fn f_literal(&mut self) -> Result<()> {
        let val = self.pop()?;
        self.compile_prim(Prim::Lit)?;
        self.comma(val)
    }

    /// 2LITERAL ( d -- ) compiles d
    pub fn f_two_literal(&mut self) -> Result<()> {
        let d = self.pop_double()?;
        self.compile_double(d)
    }

    /// POSTPONE <name> adds the compilation behaviour of name to the current definition
    ///     An immediate word is compiled as a call. Any other word gets code that will
    ///     compile a call to it when the definition runs.
    ///
    pub fn f_postpone(&mut self) -> Result<()> {
        let name = self.require_name()?;
        let header = self
            .find_header(&name)?
            .ok_or(ForthError::UndefinedWord(name))?;
        if header.is_immediate() {
            self.compile_xt(header.xt())
        } else {
            self.compile_prim(Prim::Lit)?;
            self.compile_xt(header.xt())?;
            self.compile_prim(Prim::CompileComma)
        }
    }

    /////////////////////////////////
    /// Strings

    /// compile_string lays down an inline string
    ///
    ///    [ (s") ] [ length ] [ characters ... ] padded to a cell boundary
    ///
    fn compile_string(&mut self, addr: usize, len: usize) -> Result<()> {
        let text = self.kernel.read_bytes(addr, len)?.to_vec();
        self.compile_prim(Prim::SLit)?;
        self.comma(len as Cell)?;
        for c in text {
            self.dict.ccomma(&mut self.kernel, c)?;
        }
        self.dict.align()
    }

    /// S" <text>" ( -- a u )
    ///     While compiling, the text is stored in the definition. While interpreting it is
    ///     copied to PAD, which the next interpreted S" overwrites.
    ///
    pub fn f_s_quote(&mut self) -> Result<()> {
        let (addr, len) = self.parse(b'"')?;
        if self.get_compile_mode()? {
            return self.compile_string(addr, len);
        }
        if len > PAD_SIZE {
            return Err(ForthError::ParsedStringOverflow);
        }
        self.kernel.move_bytes(addr, self.pad, len)?;
        self.push(self.pad as Cell)?;
        self.push(len as Cell)
    }

    /// ." <text>" prints the text, or compiles code that will
    pub fn f_dot_quote(&mut self) -> Result<()> {
        let (addr, len) = self.parse(b'"')?;
        if self.get_compile_mode()? {
            self.compile_string(addr, len)?;
            self.compile_prim(Prim::Type)
        } else {
            let text = self.kernel.read_bytes(addr, len)?;
            self.console.write_bytes(text)
        }
    }

    /// ABORT" <text>" ( f -- ) compiles a conditional abort with a message
    pub fn f_abort_quote(&mut self) -> Result<()> {
        let (addr, len) = self.parse(b'"')?;
        self.compile_string(addr, len)?;
        self.compile_prim(Prim::AbortQRt)
    }

    /// include <file> ( -- ) interprets the named file
    pub fn f_include(&mut self) -> Result<()> {
        let name = self.require_name()?;
        self.load_file(&name)
    }
}

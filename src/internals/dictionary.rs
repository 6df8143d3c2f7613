/// Dictionary
///
/// The dictionary lives in the middle of memory, between the regions the runtime
/// allocates from both ends. Two cursors move toward each other: HERE grows upward
/// with headers and compiled code, NAMES grows downward with the name strings.
///
/// Header layout, relative to its link address:
///
///    [ link ] [ name address ] [ flags ] [ does address ] [ code ] [ body ... ]
///                                                            ^ xt
///
/// The xt is the address of the code cell. All of the field addresses are computed
/// from the link address (or back from the xt); nothing about the layout is stored.
///
/// Names are counted strings: a length byte followed by the characters.
///
use tracing::debug;

use crate::error::{ForthError, Result};
use crate::kernel::{aligned, Cell, Kernel, CELL};

// Header flags
pub const SMUDGE: Cell = 1; // definition in progress
pub const HIDDEN: Cell = 2; // never found by name
pub const IMMEDIATE: Cell = 4; // executed even while compiling
pub const COMPILE_ONLY: Cell = 8; // an error to execute while interpreting

pub const MAX_NAME_LEN: usize = 255;

const LINK_OFFSET: usize = 0;
const NAME_OFFSET: usize = CELL;
const FLAGS_OFFSET: usize = 2 * CELL;
const DOES_OFFSET: usize = 3 * CELL;
const CODE_OFFSET: usize = 4 * CELL;
pub const HEADER_SIZE: usize = 5 * CELL;

// Address translation. These are pure functions of the header layout.
pub fn link_ptr(link: usize) -> usize {
    link + LINK_OFFSET
}
pub fn name_ptr(link: usize) -> usize {
    link + NAME_OFFSET
}
pub fn flags_ptr(link: usize) -> usize {
    link + FLAGS_OFFSET
}
pub fn does_ptr(link: usize) -> usize {
    link + DOES_OFFSET
}
pub fn xt_of(link: usize) -> usize {
    link + CODE_OFFSET
}
pub fn link_of(xt: usize) -> usize {
    xt.saturating_sub(CODE_OFFSET)
}
pub fn body_of(xt: usize) -> usize {
    xt + CELL
}

/// A decoded copy of one header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub link: usize,
    pub prev: usize,
    pub name: String,
    pub flags: Cell,
    pub does: usize,
    pub code: Cell,
}

impl Header {
    pub fn xt(&self) -> usize {
        xt_of(self.link)
    }

    pub fn is_immediate(&self) -> bool {
        self.flags & IMMEDIATE != 0
    }

    pub fn is_compile_only(&self) -> bool {
        self.flags & COMPILE_ONLY != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.flags & (HIDDEN | SMUDGE) != 0
    }
}

#[derive(Debug, Clone)]
pub struct Dictionary {
    start: usize,  // lowest address of the dictionary region
    here: usize,   // first free byte for code
    names: usize,  // lowest byte used by names
    latest: usize, // link address of the newest header, 0 if none
}

impl Dictionary {
    /// A dictionary occupying [start, end) of memory
    pub fn new(start: usize, end: usize) -> Dictionary {
        let start = aligned(start);
        Dictionary {
            start,
            here: start,
            names: end,
            latest: 0,
        }
    }

    pub fn here(&self) -> usize {
        self.here
    }

    pub fn names(&self) -> usize {
        self.names
    }

    pub fn latest(&self) -> usize {
        self.latest
    }

    pub fn unused(&self) -> usize {
        self.names - self.here
    }

    /// create builds a header for name and makes it the latest entry
    ///     Returns the xt of the new word.
    pub fn create(&mut self, mem: &mut Kernel, name: &str, flags: Cell, code: Cell) -> Result<usize> {
        if name.is_empty() {
            return Err(ForthError::ZeroLengthName);
        }
        self.make_header(mem, name.as_bytes(), flags, code)
    }

    /// create_noname builds a header with an empty, hidden name, as used by :NONAME
    pub fn create_noname(&mut self, mem: &mut Kernel, code: Cell) -> Result<usize> {
        self.make_header(mem, &[], HIDDEN, code)
    }

    fn make_header(&mut self, mem: &mut Kernel, name: &[u8], flags: Cell, code: Cell) -> Result<usize> {
        if name.len() > MAX_NAME_LEN {
            return Err(ForthError::NameTooLong(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }
        let link = aligned(self.here);
        let name_addr = self
            .names
            .checked_sub(name.len() + 1)
            .ok_or(ForthError::DictionaryOverflow)?;
        if link + HEADER_SIZE >= name_addr {
            return Err(ForthError::DictionaryOverflow);
        }
        mem.write_byte(name_addr, name.len() as u8)?;
        mem.write_bytes(name_addr + 1, name)?;
        mem.write_cell(link_ptr(link), self.latest as Cell)?;
        mem.write_cell(name_ptr(link), name_addr as Cell)?;
        mem.write_cell(flags_ptr(link), flags)?;
        mem.write_cell(does_ptr(link), 0)?;
        mem.write_cell(xt_of(link), code)?;
        self.names = name_addr;
        self.here = link + HEADER_SIZE;
        self.latest = link;
        debug!(
            name = %String::from_utf8_lossy(name),
            xt = xt_of(link),
            "created header"
        );
        Ok(xt_of(link))
    }

    /// find searches from the newest entry backwards, ignoring case and skipping hidden entries
    ///     Returns the link address of the first match.
    pub fn find(&self, mem: &Kernel, name: &str) -> Result<Option<usize>> {
        let target = name.as_bytes();
        let mut link = self.latest;
        while link != 0 {
            let flags = mem.read_cell(flags_ptr(link))?;
            if flags & (HIDDEN | SMUDGE) == 0 {
                let name_addr = mem.read_cell(name_ptr(link))? as usize;
                let len = mem.read_byte(name_addr)? as usize;
                if len == target.len() && mem.read_bytes(name_addr + 1, len)?.eq_ignore_ascii_case(target) {
                    return Ok(Some(link));
                }
            }
            link = mem.read_cell(link_ptr(link))? as usize;
        }
        Ok(None)
    }

    /// header decodes the header at link
    pub fn header(&self, mem: &Kernel, link: usize) -> Result<Header> {
        let name_addr = mem.read_cell(name_ptr(link))? as usize;
        Ok(Header {
            link,
            prev: mem.read_cell(link_ptr(link))? as usize,
            name: mem.counted_get(name_addr)?,
            flags: mem.read_cell(flags_ptr(link))?,
            does: mem.read_cell(does_ptr(link))? as usize,
            code: mem.read_cell(xt_of(link))?,
        })
    }

    /// contains_xt reports whether xt is the code field of a header in this dictionary
    pub fn contains_xt(&self, mem: &Kernel, xt: usize) -> Result<bool> {
        let mut link = self.latest;
        while link != 0 {
            if xt_of(link) == xt {
                return Ok(true);
            }
            link = mem.read_cell(link_ptr(link))? as usize;
        }
        Ok(false)
    }

    /// links lists every header, newest first
    pub fn links(&self, mem: &Kernel) -> Result<Vec<usize>> {
        let mut result = Vec::new();
        let mut link = self.latest;
        while link != 0 {
            result.push(link);
            link = mem.read_cell(link_ptr(link))? as usize;
        }
        Ok(result)
    }

    pub fn set_flag(&mut self, mem: &mut Kernel, link: usize, flag: Cell) -> Result<()> {
        let flags = mem.read_cell(flags_ptr(link))?;
        mem.write_cell(flags_ptr(link), flags | flag)
    }

    pub fn clear_flag(&mut self, mem: &mut Kernel, link: usize, flag: Cell) -> Result<()> {
        let flags = mem.read_cell(flags_ptr(link))?;
        mem.write_cell(flags_ptr(link), flags & !flag)
    }

    /// set_does gives a CREATEd word new run-time behaviour. The code cell is written first,
    ///     then the does address; both are in place before control returns.
    pub fn set_does(&mut self, mem: &mut Kernel, link: usize, code: Cell, does: usize) -> Result<()> {
        mem.write_cell(xt_of(link), code)?;
        mem.write_cell(does_ptr(link), does as Cell)?;
        debug!(xt = xt_of(link), does, "does> rewrite");
        Ok(())
    }

    /// comma ( n -- ) appends a cell at HERE
    pub fn comma(&mut self, mem: &mut Kernel, val: Cell) -> Result<()> {
        if self.here + CELL > self.names {
            return Err(ForthError::DictionaryOverflow);
        }
        mem.write_cell(self.here, val)?;
        self.here += CELL;
        Ok(())
    }

    /// ccomma ( c -- ) appends a byte at HERE
    pub fn ccomma(&mut self, mem: &mut Kernel, val: u8) -> Result<()> {
        if self.here + 1 > self.names {
            return Err(ForthError::DictionaryOverflow);
        }
        mem.write_byte(self.here, val)?;
        self.here += 1;
        Ok(())
    }

    /// align rounds HERE up to the next cell boundary
    pub fn align(&mut self) -> Result<()> {
        let here = aligned(self.here);
        if here > self.names {
            return Err(ForthError::DictionaryOverflow);
        }
        self.here = here;
        Ok(())
    }

    /// allot moves HERE by n bytes, which may be negative
    pub fn allot(&mut self, n: Cell) -> Result<()> {
        let here = self.here as i64 + n as i64;
        if here < self.start as i64 || here > self.names as i64 {
            return Err(ForthError::DictionaryOverflow);
        }
        self.here = here as usize;
        Ok(())
    }
}

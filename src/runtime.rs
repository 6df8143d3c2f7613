//////////////////////////////////////////////////////////////////
/// runtime.rs
///
/// Forth Runtime Engine
///
/// This module defines the ForthRuntime struct, which contains the whole state of the Forth
/// virtual machine: the kernel's memory, the three stacks, the dictionary, the instruction
/// pointer and the input and output collaborators. Nothing is global; every word is a method
/// on the runtime.
///
/// It also provides the memory layout performed once at construction, cold_start, and the
/// top-level recovery used by the read loop.
///
use tracing::{debug, warn};

use crate::error::{ForthError, Result};
use crate::internals::builtin::Prim;
use crate::internals::console::Console;
use crate::internals::dictionary::Dictionary;
use crate::internals::files::FileHandle;
use crate::internals::messages::Msg;
use crate::internals::stack::{Stack, StackKind};
use crate::kernel::{Cell, DCell, Kernel, CELL, FALSE, TRUE};

// Region sizes
pub const DATA_STACK_CELLS: usize = 256;
pub const RETURN_STACK_CELLS: usize = 256;
pub const CONTROL_STACK_MARKERS: usize = 64;
pub const TIB_SIZE: usize = 1024; // text input buffer
pub const PAD_SIZE: usize = 256; // scratch buffer for interpreted strings
pub const NUM_BUF_SIZE: usize = 128; // number output buffer

const PRELUDE: &str = include_str!("forth/prelude.fs");

/// The text currently being interpreted: a region of memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub addr: usize,
    pub len: usize,
}

pub struct ForthRuntime {
    pub kernel: Kernel,        // the flat data area
    pub stack: Stack,          // data stack
    pub rstack: Stack,         // return stack
    pub cstack: Stack,         // control-flow stack, used while compiling
    pub dict: Dictionary,      // headers and code
    pub ip: usize,             // next cell to execute, 0 when idle
    pub prim_xt: Vec<usize>,   // xt of each builtin, indexed by Prim
    pub state_ptr: usize,      // true if compiling a word
    pub base_ptr: usize,       // for numeric I/O
    pub to_in_ptr: usize,      // parse offset into the current source
    pub dpl_ptr: usize,        // digits after the last punctuation of a double, or -1
    pub tib: usize,            // text input buffer
    pub pad: usize,            // scratch buffer
    pub num_buf: usize,        // number output buffer
    pub source: Source,        // text being interpreted
    saved_sources: Vec<(Source, Cell)>, // sources suspended by EVALUATE, with their >IN
    pub console: Console,      // output
    pub msg: Msg,              // error and warning reporter
    pub reader: Vec<FileHandle>, // allows for nested file processing
    pub exit_flag: bool,       // set when the "bye" word is executed.
    pub show_stack: bool,      // show the stack at the completion of a line of interaction
    pub tracing: bool,         // log every dispatched xt
}

impl ForthRuntime {
    /// Build the VM and lay out memory
    ///     The null cell, user variables and the buffers come from the bottom of memory,
    ///     the stacks from the top. Whatever is left in the middle is the dictionary.
    ///
    pub fn new() -> Result<ForthRuntime> {
        let mut kernel = Kernel::new();
        kernel.allot_low(CELL)?; // address 0 is never a valid xt or header
        let state_ptr = kernel.allot_low(CELL)?;
        let base_ptr = kernel.allot_low(CELL)?;
        let to_in_ptr = kernel.allot_low(CELL)?;
        let dpl_ptr = kernel.allot_low(CELL)?;
        let tib = kernel.allot_low(TIB_SIZE)?;
        let pad = kernel.allot_low(PAD_SIZE)?;
        let num_buf = kernel.allot_low(NUM_BUF_SIZE)?;

        let s0 = kernel.allot_high(DATA_STACK_CELLS * CELL)?;
        let r0 = kernel.allot_high(RETURN_STACK_CELLS * CELL)?;
        let c0 = kernel.allot_high(CONTROL_STACK_MARKERS * 2 * CELL)?;
        let (low, high) = kernel.free_region();
        debug!(tib, pad, num_buf, s0, r0, c0, dict_start = low, dict_end = high, "memory layout");

        kernel.write_cell(base_ptr, 10)?;
        kernel.write_cell(dpl_ptr, -1)?;

        Ok(ForthRuntime {
            kernel,
            stack: Stack::new(StackKind::Data, s0, DATA_STACK_CELLS),
            rstack: Stack::new(StackKind::Return, r0, RETURN_STACK_CELLS),
            cstack: Stack::new(StackKind::Control, c0, CONTROL_STACK_MARKERS * 2),
            dict: Dictionary::new(low, high),
            ip: 0,
            prim_xt: Vec::new(),
            state_ptr,
            base_ptr,
            to_in_ptr,
            dpl_ptr,
            tib,
            pad,
            num_buf,
            source: Source { addr: tib, len: 0 },
            saved_sources: Vec::new(),
            console: Console::new(),
            msg: Msg::new(),
            reader: vec![FileHandle::stdin()],
            exit_flag: false,
            show_stack: false,
            tracing: false,
        })
    }

    /// cold_start installs the builtin words and, unless told otherwise, the Forth prelude
    pub fn cold_start(&mut self, load_prelude: bool) -> Result<()> {
        self.add_builtins()?;
        self.set_compile_mode(false)?;
        debug!(words = self.prim_xt.len(), here = self.dict.here(), "builtins installed");
        if load_prelude {
            self.insert_code(PRELUDE)?;
        }
        Ok(())
    }

    /// Insert Forth code into the dictionary by interpreting it one line at a time
    ///
    pub fn insert_code(&mut self, code: &str) -> Result<()> {
        for line in code.lines() {
            self.interpret_line(line)?;
        }
        Ok(())
    }

    /////////////////////////////////
    /// Stack access

    pub fn push(&mut self, val: Cell) -> Result<()> {
        self.stack.push(&mut self.kernel, val)
    }

    pub fn pop(&mut self) -> Result<Cell> {
        self.stack.pop(&self.kernel)
    }

    /// top(0) is the top of stack, and so on down
    pub fn top(&self, depth: usize) -> Result<Cell> {
        self.stack.peek(&self.kernel, depth)
    }

    pub fn push_flag(&mut self, b: bool) -> Result<()> {
        self.push(if b { TRUE } else { FALSE })
    }

    pub fn push_double(&mut self, val: DCell) -> Result<()> {
        self.stack.push_double(&mut self.kernel, val)
    }

    pub fn pop_double(&mut self) -> Result<DCell> {
        self.stack.pop_double(&self.kernel)
    }

    /// pop_addr pops a cell and checks that it lies inside memory
    pub fn pop_addr(&mut self) -> Result<usize> {
        let val = self.pop()?;
        self.kernel.address(val)
    }

    /// pop_len pops a byte count, which may not be negative
    pub fn pop_len(&mut self) -> Result<usize> {
        let val = self.pop()?;
        usize::try_from(val).map_err(|_| ForthError::ResultOutOfRange)
    }

    pub fn push_r(&mut self, val: Cell) -> Result<()> {
        self.rstack.push(&mut self.kernel, val)
    }

    pub fn pop_r(&mut self) -> Result<Cell> {
        self.rstack.pop(&self.kernel)
    }

    pub fn top_r(&self, depth: usize) -> Result<Cell> {
        self.rstack.peek(&self.kernel, depth)
    }

    /////////////////////////////////
    /// Compilation helpers

    /// comma appends a cell to the current definition
    pub fn comma(&mut self, val: Cell) -> Result<()> {
        self.dict.comma(&mut self.kernel, val)
    }

    /// compile_xt appends a call to the word with execution token xt
    pub fn compile_xt(&mut self, xt: usize) -> Result<()> {
        self.comma(xt as Cell)
    }

    pub fn compile_prim(&mut self, prim: Prim) -> Result<()> {
        self.compile_xt(self.xt_of_prim(prim))
    }

    /// get_compile_mode determines whether or not compile mode is active
    ///     The STATE variable is used directly.
    ///
    pub fn get_compile_mode(&self) -> Result<bool> {
        Ok(self.kernel.read_cell(self.state_ptr)? != FALSE)
    }

    /// set_compile_mode turns on compilation mode
    ///
    pub fn set_compile_mode(&mut self, value: bool) -> Result<()> {
        self.kernel.write_cell(self.state_ptr, if value { TRUE } else { FALSE })
    }

    /// base returns the current number base, which must be between 2 and 36
    pub fn base(&self) -> Result<u32> {
        let base = self.kernel.read_cell(self.base_ptr)?;
        match base {
            2..=36 => Ok(base as u32),
            _ => Err(ForthError::InvalidNumber(format!("base {}", base))),
        }
    }

    /////////////////////////////////
    /// Input sources

    /// set_source makes [addr, addr + len) the text being interpreted, from its start
    pub fn set_source(&mut self, addr: usize, len: usize) -> Result<()> {
        self.source = Source { addr, len };
        self.kernel.write_cell(self.to_in_ptr, 0)
    }

    /// save_source suspends the current source so a nested one can run
    pub fn save_source(&mut self) -> Result<()> {
        let to_in = self.kernel.read_cell(self.to_in_ptr)?;
        self.saved_sources.push((self.source, to_in));
        Ok(())
    }

    /// restore_source resumes the most recently saved source
    pub fn restore_source(&mut self) -> Result<()> {
        if let Some((source, to_in)) = self.saved_sources.pop() {
            self.source = source;
            self.kernel.write_cell(self.to_in_ptr, to_in)?;
        }
        Ok(())
    }

    /// interpret_line copies a line of text into the TIB and interprets it
    pub fn interpret_line(&mut self, line: &str) -> Result<()> {
        let bytes = line.as_bytes();
        if bytes.len() > TIB_SIZE {
            return Err(ForthError::ParsedStringOverflow);
        }
        self.kernel.write_bytes(self.tib, bytes)?;
        self.set_source(self.tib, bytes.len())?;
        self.f_eval()
    }

    /////////////////////////////////
    /// Error recovery

    /// recover returns the VM to a clean interpreting state after an error
    ///     The stacks are emptied, STATE goes to interpret and the instruction pointer is cleared.
    ///     Nested sources and included files are abandoned. The dictionary is left as it is:
    ///     a half-compiled definition keeps its space and stays smudged.
    ///
    pub fn recover(&mut self) {
        self.stack.clear();
        self.rstack.clear();
        self.cstack.clear();
        self.ip = 0;
        self.saved_sources.clear();
        self.source = Source { addr: self.tib, len: 0 };
        self.reader.truncate(1);
        // these cells were allocated at construction, so the writes cannot fail
        let _ = self.kernel.write_cell(self.to_in_ptr, 0);
        let _ = self.set_compile_mode(false);
    }

    /// report_error prints an error through the reporter and recovers
    pub fn report_error(&mut self, err: &ForthError) {
        warn!(code = err.code(), "{}", err);
        let _ = self.console.flush();
        self.msg.report(err);
        self.recover();
    }

    /// f_clear resets the data stack to empty
    pub fn f_clear(&mut self) {
        self.stack.clear();
    }

    /// abort empties the stacks and returns to the prompt, by way of the error path
    pub fn f_abort(&mut self) -> Result<()> {
        Err(ForthError::Abort)
    }

    /// should_exit determines whether or not the user has executed BYE
    ///
    pub fn should_exit(&self) -> bool {
        self.exit_flag
    }

    pub fn f_bye(&mut self) {
        self.exit_flag = true;
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
    fn test_stack_push_and_pop() {
        let mut rt = runtime();
        rt.push(42).unwrap();
        assert_eq!(rt.pop().unwrap(), 42);
    }

    #[test]
    fn test_layout_regions_are_disjoint() {
        let rt = ForthRuntime::new().unwrap();
        assert!(rt.state_ptr > 0);
        assert!(rt.tib > rt.dpl_ptr);
        assert_eq!(rt.pad, rt.tib + TIB_SIZE);
        assert_eq!(rt.num_buf, rt.pad + PAD_SIZE);
        assert!(rt.dict.here() >= rt.num_buf + NUM_BUF_SIZE);
        assert_eq!(rt.stack.capacity(), DATA_STACK_CELLS);
        assert_eq!(rt.cstack.capacity(), CONTROL_STACK_MARKERS * 2);
    }

    #[test]
    fn test_cold_start() {
        let rt = runtime();
        assert!(!rt.get_compile_mode().unwrap());
        assert_eq!(rt.base().unwrap(), 10);
        assert!(!rt.should_exit());
    }

    #[test]
    fn test_set_compile_mode() {
        let mut rt = runtime();
        rt.set_compile_mode(true).unwrap();
        assert_eq!(rt.kernel.read_cell(rt.state_ptr).unwrap(), -1);
        assert!(rt.get_compile_mode().unwrap());
        rt.set_compile_mode(false).unwrap();
        assert_eq!(rt.kernel.read_cell(rt.state_ptr).unwrap(), 0);
    }

    #[test]
    fn test_f_bye() {
        let mut rt = runtime();
        rt.f_bye();
        assert!(rt.should_exit());
    }

    #[test]
    fn test_f_clear() {
        let mut rt = runtime();
        rt.push(42).unwrap();
        rt.push(99).unwrap();
        assert_eq!(rt.stack.depth(), 2);
        rt.f_clear();
        assert_eq!(rt.stack.depth(), 0);
    }

    #[test]
    fn test_recover_resets_state() {
        let mut rt = runtime();
        rt.push(1).unwrap();
        rt.push_r(2).unwrap();
        rt.cstack.push(&mut rt.kernel, 3).unwrap();
        rt.set_compile_mode(true).unwrap();
        rt.ip = 1234;
        rt.recover();
        assert_eq!(rt.stack.depth(), 0);
        assert_eq!(rt.rstack.depth(), 0);
        assert_eq!(rt.cstack.depth(), 0);
        assert_eq!(rt.ip, 0);
        assert!(!rt.get_compile_mode().unwrap());
    }

    #[test]
    fn test_bad_base_is_reported() {
        let mut rt = runtime();
        rt.kernel.write_cell(rt.base_ptr, 1).unwrap();
        assert!(matches!(rt.base(), Err(ForthError::InvalidNumber(_))));
    }

    #[test]
    fn test_line_too_long() {
        let mut rt = runtime();
        let line = " ".repeat(TIB_SIZE + 1);
        assert_eq!(rt.interpret_line(&line), Err(ForthError::ParsedStringOverflow));
    }

    #[test]
    fn test_prelude_loads() {
        let mut rt = ForthRuntime::new().unwrap();
        rt.cold_start(true).unwrap();
        assert!(rt.dict.find(&rt.kernel, "spaces").unwrap().is_some());
    }
}

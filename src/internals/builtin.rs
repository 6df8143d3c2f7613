/// Interpreter for builtins
///
/// Builtins are a closed set. Each one has a variant in `Prim`, a name, header flags and a
/// documentation string for use by SEE. The code cell of a word's header holds a `Code`:
/// either one of the fixed run-time behaviours (colon definition, variable, constant,
/// DOES> child) or a `Prim`. The inner interpreter decodes it and dispatches through a
/// single match.
///
use crate::error::Result;
use crate::internals::dictionary::{COMPILE_ONLY, IMMEDIATE};
use crate::kernel::Cell;
use crate::runtime::ForthRuntime;

const NONE: Cell = 0;
const IMMED: Cell = IMMEDIATE | COMPILE_ONLY;
const COMPILE: Cell = COMPILE_ONLY;

/// The internal format for builtins: the primitive, its name, flags and a documentation string
pub struct BuiltIn {
    pub prim: Prim,
    pub name: &'static str,
    pub flags: Cell,
    pub doc: &'static str,
}

macro_rules! builtins {
    ($( $variant:ident, $name:literal, $flags:expr, $doc:literal; )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Prim {
            $( $variant, )*
        }

        pub const BUILTINS: &[BuiltIn] = &[
            $( BuiltIn { prim: Prim::$variant, name: $name, flags: $flags, doc: $doc }, )*
        ];
    };
}

builtins! {
    // run-time parts of compiled code
    Exit, "exit", COMPILE, "exit ( -- ) Return from the current definition";
    Lit, "(lit)", COMPILE, "(lit) ( -- n ) Push the cell compiled after it";
    TwoLit, "(2lit)", COMPILE, "(2lit) ( -- d ) Push the two cells compiled after it";
    SLit, "(s\")", COMPILE, "(s\") ( -- a u ) Push the inline string compiled after it";
    Branch, "branch", COMPILE, "branch ( -- ) Jump by the offset compiled after it";
    ZBranch, "0branch", COMPILE, "0branch ( f -- ) Jump by the offset compiled after it if f is zero";
    DoRt, "(do)", COMPILE, "(do) ( limit index -- ) Move loop parameters to the return stack";
    QDoRt, "(?do)", COMPILE, "(?do) ( limit index -- ) As (do), but skip the loop if limit = index";
    LoopRt, "(loop)", COMPILE, "(loop) ( -- ) Step the index by one and jump back unless the limit was crossed";
    PlusLoopRt, "(+loop)", COMPILE, "(+loop) ( n -- ) Step the index by n and jump back unless the limit was crossed";
    Unloop, "unloop", COMPILE, "unloop ( -- ) Discard the loop parameters of the innermost loop";
    OfRt, "(of)", COMPILE, "(of) ( x1 x2 -- | x1 ) Continue if x1 = x2, else keep x1 and jump";
    DoesRt, "(does>)", COMPILE, "(does>) ( -- ) Give the latest word the behaviour that follows, and exit";
    AbortQRt, "(abort\")", COMPILE, "(abort\") ( f a u -- ) Abort with the message a u if f is true";
    Execute, "execute", NONE, "execute ( xt -- ) Run the word whose execution token is on the stack";

    // stack
    Dup, "dup", NONE, "dup ( n -- n n ) Push a second copy of the top of stack";
    Drop, "drop", NONE, "drop ( n -- ) Pop the top element off the stack";
    Swap, "swap", NONE, "swap ( m n -- n m ) Reverse the order of the top two stack elements";
    Over, "over", NONE, "over ( m n -- m n m ) Push a copy of the second item on the stack on to";
    Rot, "rot", NONE, "rot ( i j k -- j k i ) Move the third stack item to the top";
    MinusRot, "-rot", NONE, "-rot ( i j k -- k i j ) Move the top stack item to third place";
    Nip, "nip", NONE, "nip ( m n -- n ) Drop the second item";
    Tuck, "tuck", NONE, "tuck ( m n -- n m n ) Copy the top item below the second";
    QDup, "?dup", NONE, "?dup ( n -- n n | 0 ) Duplicate the top of stack if it is not zero";
    Pick, "pick", NONE, "pick ( .. n -- .. v ) Push a copy of the nth item on the stack (after removing n) on top";
    Roll, "roll", NONE, "roll ( .. n -- .. v ) Rotate the nth item on the stack (after removing n) to the top";
    Depth, "depth", NONE, "depth ( -- n ) Push the current stack depth";
    TwoDup, "2dup", NONE, "2dup ( a b -- a b a b ) Copy the top pair";
    TwoDrop, "2drop", NONE, "2drop ( a b -- ) Drop the top pair";
    TwoSwap, "2swap", NONE, "2swap ( a b c d -- c d a b ) Exchange the top two pairs";
    TwoOver, "2over", NONE, "2over ( a b c d -- a b c d a b ) Copy the second pair to the top";
    ToR, ">r", COMPILE, ">r ( n -- ) Pop stack and push value to return stack";
    RFrom, "r>", COMPILE, "r> ( -- n ) Pop return stack and push value to calculation stack";
    RFetch, "r@", COMPILE, "r@ ( -- n ) Push the value on the top of the return stack to the calculation stack";
    TwoToR, "2>r", COMPILE, "2>r ( a b -- ) Move a pair to the return stack";
    TwoRFrom, "2r>", COMPILE, "2r> ( -- a b ) Move a pair from the return stack";
    TwoRFetch, "2r@", COMPILE, "2r@ ( -- a b ) Copy a pair from the return stack";
    I, "i", COMPILE, "i ( -- n ) Push the current loop index";
    J, "j", COMPILE, "j ( -- n ) Push the second-level (outer) loop index";
    Clear, "clear", NONE, "clear ( .. -- ) Reset the stack to empty";

    // single-cell arithmetic and logic
    Plus, "+", NONE, "+ ( j k -- j+k ) Push j+k on the stack";
    Minus, "-", NONE, "- ( j k -- j-k ) Push j-k on the stack";
    Star, "*", NONE, "* ( j k -- j*k ) Push j*k on the stack";
    Slash, "/", NONE, "/ ( j k -- j/k ) Floored quotient of j by k";
    Mod, "mod", NONE, "mod ( j k -- r ) Floored remainder of j by k";
    SlashMod, "/mod", NONE, "/mod ( j k -- r q ) Floored remainder and quotient";
    StarSlash, "*/", NONE, "*/ ( a b c -- a*b/c ) Multiply to a double, then floored divide";
    StarSlashMod, "*/mod", NONE, "*/mod ( a b c -- r q ) As */, also leaving the remainder";
    OnePlus, "1+", NONE, "1+ ( n -- n+1 ) Add one";
    OneMinus, "1-", NONE, "1- ( n -- n-1 ) Subtract one";
    Negate, "negate", NONE, "negate ( n -- -n ) Change the sign";
    Abs, "abs", NONE, "abs ( n -- |n| ) Absolute value";
    Min, "min", NONE, "min ( a b -- n ) The smaller of a and b";
    Max, "max", NONE, "max ( a b -- n ) The larger of a and b";
    And, "and", NONE, "and ( a b -- a & b ) Pop a and b, returning the logical and";
    Or, "or", NONE, "or ( a b -- a | b ) Pop a and b, returning the logical or";
    Xor, "xor", NONE, "xor ( a b -- a ^ b ) Pop a and b, returning the exclusive or";
    Invert, "invert", NONE, "invert ( a -- ~a ) Flip every bit";
    LShift, "lshift", NONE, "lshift ( a u -- a<<u ) Logical shift left";
    RShift, "rshift", NONE, "rshift ( a u -- a>>u ) Logical shift right";
    TwoStar, "2*", NONE, "2* ( a -- a*2 ) Shift left by one";
    TwoSlash, "2/", NONE, "2/ ( a -- a/2 ) Arithmetic shift right by one";
    Equal, "=", NONE, "= ( j k -- b ) If j == k push true else false";
    NotEqual, "<>", NONE, "<> ( j k -- b ) If j != k push true else false";
    Less, "<", NONE, "< ( j k -- b ) If j < k push true else false";
    Greater, ">", NONE, "> ( j k -- b ) If j > k push true else false";
    ULess, "u<", NONE, "u< ( j k -- b ) Unsigned comparison";
    ZeroEqual, "0=", NONE, "0= ( j -- b ) If j == 0 push true else false";
    ZeroNotEqual, "0<>", NONE, "0<> ( j -- b ) If j != 0 push true else false";
    ZeroLess, "0<", NONE, "0< ( j -- b ) If j < 0 push true else false";
    ZeroGreater, "0>", NONE, "0> ( j -- b ) If j > 0 push true else false";
    Within, "within", NONE, "within ( n lo hi -- b ) True if lo <= n < hi, with wraparound";
    True, "true", NONE, "true ( -- -1 ) Push the canonical true value on the stack";
    False, "false", NONE, "false ( -- 0 ) Push the canonical false value on the stack";

    // mixed and double precision
    MStar, "m*", NONE, "m* ( a b -- d ) Signed product as a double";
    UMStar, "um*", NONE, "um* ( u1 u2 -- ud ) Unsigned product as a double";
    UMSlashMod, "um/mod", NONE, "um/mod ( ud u -- r q ) Unsigned division of a double";
    FMSlashMod, "fm/mod", NONE, "fm/mod ( d n -- r q ) Floored division of a double";
    SMSlashRem, "sm/rem", NONE, "sm/rem ( d n -- r q ) Symmetric division of a double";
    DPlus, "d+", NONE, "d+ ( d1 d2 -- d ) Double sum";
    DMinus, "d-", NONE, "d- ( d1 d2 -- d ) Double difference";
    DNegate, "dnegate", NONE, "dnegate ( d -- -d ) Change the sign of a double";
    DAbs, "dabs", NONE, "dabs ( d -- |d| ) Double absolute value";
    SToD, "s>d", NONE, "s>d ( n -- d ) Sign-extend a cell to a double";
    DToS, "d>s", NONE, "d>s ( d -- n ) Truncate a double to a cell";
    DEqual, "d=", NONE, "d= ( d1 d2 -- b ) Doubles equal";
    DLess, "d<", NONE, "d< ( d1 d2 -- b ) Signed double comparison";
    DZeroEqual, "d0=", NONE, "d0= ( d -- b ) Double is zero";
    MPlus, "m+", NONE, "m+ ( d n -- d ) Add a cell to a double";

    // memory
    Fetch, "@", NONE, "@ ( a -- v ) Push the cell at address a";
    Store, "!", NONE, "! ( v a -- ) Store v at address a";
    CFetch, "c@", NONE, "c@ ( a -- c ) Push the byte at address a";
    CStore, "c!", NONE, "c! ( c a -- ) Store byte c at address a";
    PlusStore, "+!", NONE, "+! ( n a -- ) Add n to the cell at address a";
    TwoFetch, "2@", NONE, "2@ ( a -- d ) Push the double at address a";
    TwoStore, "2!", NONE, "2! ( d a -- ) Store the double d at address a";
    CellPlus, "cell+", NONE, "cell+ ( a -- a' ) Add the size of a cell";
    Cells, "cells", NONE, "cells ( n -- n' ) Size of n cells in bytes";
    CharPlus, "char+", NONE, "char+ ( a -- a' ) Add the size of a character";
    Chars, "chars", NONE, "chars ( n -- n' ) Size of n characters in bytes";
    Aligned, "aligned", NONE, "aligned ( a -- a' ) Round up to a cell boundary";
    Fill, "fill", NONE, "fill ( a u c -- ) Store c in u bytes starting at a";
    Erase, "erase", NONE, "erase ( a u -- ) Zero u bytes starting at a";
    Move, "move", NONE, "move ( from to u -- ) Copy u bytes; the ranges may overlap";
    Count, "count", NONE, "count ( a -- a+1 u ) Address and length of a counted string";

    // dictionary and compiler
    Here, "here", NONE, "here ( -- a ) Push the first free dictionary address";
    Allot, "allot", NONE, "allot ( n -- ) Reserve n bytes of dictionary space";
    Comma, ",", NONE, ", ( n -- ) copies the top of the stack to the top of the dictionary";
    CComma, "c,", NONE, "c, ( c -- ) copies a byte to the top of the dictionary";
    Align, "align", NONE, "align ( -- ) Round HERE up to a cell boundary";
    Unused, "unused", NONE, "unused ( -- u ) Bytes left between code and names";
    Colon, ":", NONE, ": <name> starts a new definition";
    NoName, ":noname", NONE, ":noname ( -- xt ) starts a definition without a name";
    Semicolon, ";", IMMED, "; ( -- ) terminate a definition, resetting to interpret mode";
    Create, "create", NONE, "create <name> ( -- ) creates a word that pushes its body address";
    Does, "does>", IMMED, "does> ( -- ) give the latest CREATEd word the behaviour that follows";
    Constant, "constant", NONE, "constant <name> ( n -- ) creates a word that pushes n";
    Variable, "variable", NONE, "variable <name> ( -- ) creates a word that pushes the address of a cell";
    ToBody, ">body", NONE, ">body ( xt -- a ) Body address of a CREATEd word";
    Immediate, "immediate", NONE, "immediate sets the immediate flag on the most recently defined word";
    Recurse, "recurse", IMMED, "recurse ( -- ) compile a call to the definition being compiled";
    Tick, "'", NONE, "' <name> ( -- xt ) searches the dictionary for a (postfix) word, returning its xt";
    BracketTick, "[']", IMMED, "['] <name> ( -- ) compile the xt of a word as a literal";
    Literal, "literal", IMMED, "literal ( n -- ) compile n as a literal";
    TwoLiteral, "2literal", IMMED, "2literal ( d -- ) compile d as a literal";
    CompileComma, "compile,", NONE, "compile, ( xt -- ) append xt to the current definition";
    Postpone, "postpone", IMMED, "postpone <name> ( -- ) compile the compilation behaviour of a word";
    LeftBracket, "[", IMMEDIATE, "[ ( -- ) switch to interpret mode";
    RightBracket, "]", NONE, "] ( -- ) switch to compile mode";
    State, "state", NONE, "state ( -- a ) address of the compile state flag";

    // control structures
    If, "if", IMMED, "if ( f -- ) run the following code if f is not zero";
    Else, "else", IMMED, "else ( -- ) start the alternative of an IF";
    Then, "then", IMMED, "then ( -- ) end an IF or IF ELSE";
    Begin, "begin", IMMED, "begin ( -- ) start a loop";
    Again, "again", IMMED, "again ( -- ) jump back to BEGIN";
    Until, "until", IMMED, "until ( f -- ) jump back to BEGIN while f is zero";
    While, "while", IMMED, "while ( f -- ) leave a BEGIN loop if f is zero";
    Repeat, "repeat", IMMED, "repeat ( -- ) jump back to BEGIN, and mark the exit from WHILE";
    Do, "do", IMMED, "do ( limit index -- ) start a counted loop";
    QuestionDo, "?do", IMMED, "?do ( limit index -- ) start a counted loop that runs zero times if limit = index";
    Loop, "loop", IMMED, "loop ( -- ) add one to the index and repeat until the limit is crossed";
    PlusLoop, "+loop", IMMED, "+loop ( n -- ) add n to the index and repeat until the limit is crossed";
    Leave, "leave", IMMED, "leave ( -- ) exit the innermost counted loop";
    Case, "case", IMMED, "case ( x -- x ) start a CASE selection";
    Of, "of", IMMED, "of ( x1 x2 -- | x1 ) run the following code if x1 = x2";
    EndOf, "endof", IMMED, "endof ( -- ) end an OF clause";
    EndCase, "endcase", IMMED, "endcase ( x -- ) end a CASE selection, dropping the selector";

    // outer interpreter and input
    Evaluate, "evaluate", NONE, "evaluate ( a u -- ) interpret the string a u";
    Source, "source", NONE, "source ( -- a u ) address and length of the input buffer";
    ToIn, ">in", NONE, ">in ( -- a ) address of the parse position";
    Base, "base", NONE, "base ( -- a ) address of the number base";
    Dpl, "dpl", NONE, "dpl ( -- a ) address of the digit count after the last punctuation in a double";
    Decimal, "decimal", NONE, "decimal ( -- ) set the number base to ten";
    Hex, "hex", NONE, "hex ( -- ) set the number base to sixteen";
    Parse, "parse", NONE, "parse ( c -- a u ) parse text up to the delimiter c";
    ParseName, "parse-name", NONE, "parse-name ( -- a u ) parse the next space-delimited name";
    Char, "char", NONE, "char <c> ( -- c ) push the first character of the next name";
    BracketChar, "[char]", IMMED, "[char] <c> ( -- ) compile the first character of the next name";
    Paren, "(", IMMEDIATE, "( ( -- ) comment up to the next )";
    Backslash, "\\", IMMEDIATE, "\\ ( -- ) comment to the end of the line";
    SQuote, "s\"", IMMEDIATE, "s\" <text>\" ( -- a u ) a string, compiled or held in PAD";
    DotQuote, ".\"", IMMEDIATE, ".\" <text>\" ( -- ) print the string";
    Include, "include", NONE, "include <file> ( -- ) read source lines from a file";
    Bye, "bye", NONE, "bye: exits to the operating system";
    Abort, "abort", NONE, "abort ( -- ) Ends execution of the current word and clears the stack";
    AbortQuote, "abort\"", IMMED, "abort\" <text>\" ( f -- ) abort with a message if f is true";

    // output
    Emit, "emit", NONE, "emit ( c -- ) sends character c to the terminal";
    Type, "type", NONE, "type ( a u -- ) print u characters starting at a";
    Cr, "cr", NONE, "cr ( -- ) start a new line";
    Dot, ".", NONE, ". ( n -- ) print n in the current base";
    UDot, "u.", NONE, "u. ( u -- ) print u unsigned in the current base";
    DDot, "d.", NONE, "d. ( d -- ) print the double d in the current base";
    DotS, ".s", NONE, ".s ( -- ) Print the contents of the calculation stack";
    Flush, "flush", NONE, "flush: forces pending output to appear on the terminal";

    // diagnostics
    See, "see", NONE, "see <name> decompiles and prints a word";
    Words, "words", NONE, "words ( -- ) list the words in the dictionary";
    ShowStack, "show-stack", NONE, "show-stack ( -- ) Display the stack at the end of each line of console input";
    HideStack, "hide-stack", NONE, "hide-stack ( -- ) Turn off automatic stack display";
    TraceOn, "trace-on", NONE, "trace-on ( -- ) log every word executed, at trace level";
    TraceOff, "trace-off", NONE, "trace-off ( -- ) stop logging executed words";
}

impl Prim {
    pub fn builtin(self) -> &'static BuiltIn {
        &BUILTINS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.builtin().name
    }

    pub fn from_index(index: usize) -> Option<Prim> {
        BUILTINS.get(index).map(|b| b.prim)
    }
}

// Code cell values that are not primitives
const CODE_COLON: Cell = -1;
const CODE_VARIABLE: Cell = -2;
const CODE_CONSTANT: Cell = -3;
const CODE_DOES: Cell = -4;

/// What the inner interpreter does with an xt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Colon,    // run the sequence of xts in the body
    Variable, // push the body address
    Constant, // push the cell in the body
    Does,     // push the body address, then run the DOES> code
    Prim(Prim),
}

impl Code {
    pub fn to_cell(self) -> Cell {
        match self {
            Code::Colon => CODE_COLON,
            Code::Variable => CODE_VARIABLE,
            Code::Constant => CODE_CONSTANT,
            Code::Does => CODE_DOES,
            Code::Prim(p) => p as Cell,
        }
    }

    pub fn from_cell(val: Cell) -> Option<Code> {
        match val {
            CODE_COLON => Some(Code::Colon),
            CODE_VARIABLE => Some(Code::Variable),
            CODE_CONSTANT => Some(Code::Constant),
            CODE_DOES => Some(Code::Does),
            v if v >= 0 => Prim::from_index(v as usize).map(Code::Prim),
            _ => None,
        }
    }
}

impl ForthRuntime {
    /// add_builtin creates a dictionary header for a builtin and records its xt
    ///     The header's code cell holds the primitive's index, so the inner interpreter
    ///     can dispatch on it without a function pointer being stored in memory.
    ///
    fn add_builtin(&mut self, builtin: &BuiltIn) -> Result<usize> {
        let xt = self.dict.create(
            &mut self.kernel,
            builtin.name,
            builtin.flags,
            Code::Prim(builtin.prim).to_cell(),
        )?;
        self.prim_xt[builtin.prim as usize] = xt;
        Ok(xt)
    }

    /// Set up all the words that are implemented in Rust
    ///     Each one gets a standard dictionary header.
    pub fn add_builtins(&mut self) -> Result<()> {
        self.prim_xt = vec![0; BUILTINS.len()];
        for builtin in BUILTINS {
            self.add_builtin(builtin)?;
        }
        Ok(())
    }

    /// The xt of a primitive's header
    pub fn xt_of_prim(&self, prim: Prim) -> usize {
        self.prim_xt[prim as usize]
    }
}

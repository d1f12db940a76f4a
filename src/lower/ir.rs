// This module defines the intermediate statement set the lowering pass targets and
// the dual-backend renderer consumes. The split mirrors the two execution times in
// the generated artifact: Stmt nodes are decode-time control flow rendered as
// literal C (the dispatch switch, field declarations, the zero-register guard),
// while Action nodes live inside an Emit marker and must be realized as calls into
// the JIT emission interface (stores into the state block, runtime conditionals,
// traps, memory traffic). Term is the expression language shared by both levels;
// Place names a machine-state slot. Keeping the three layers as separate enums lets
// each renderer match its own vocabulary exhaustively and reject the rest.

//! Lowered statement/action/term representation.

use crate::expr::OpKind;

/// A machine-state slot addressable by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    /// General-purpose register, selected by a decode-time index.
    Gpr(Term),
    Pc,
    Hi,
    Lo,
    /// Coprocessor data register: (cop, reg).
    CopReg(Term, Term),
    /// Coprocessor control register: (cop, reg).
    CopCtrl(Term, Term),
}

/// Expression at either level.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Int(i64),
    Sym(String),
    Op(OpKind, Box<Term>, Box<Term>),
    /// Runtime read of a machine-state slot.
    Read(Box<Place>),
    /// Runtime memory load of `width` bytes.
    LoadMem { width: u8, addr: Box<Term> },
    SignExt { width: u8, term: Box<Term> },
    /// Width metadata only; transparent to both backends.
    ZeroExt { width: u8, term: Box<Term> },
}

impl Term {
    pub fn op(kind: OpKind, a: Term, b: Term) -> Term {
        Term::Op(kind, Box::new(a), Box::new(b))
    }

    pub fn sym(name: impl Into<String>) -> Term {
        Term::Sym(name.into())
    }
}

/// Runtime-realized statement: becomes JIT emission calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Runtime binding introduced by `RLet`; later references pass through
    /// as realized values.
    Bind { name: String, value: Term },
    Store { place: Place, value: Term },
    If {
        cond: Term,
        then: Vec<Action>,
        els: Vec<Action>,
    },
    When { cond: Term, body: Vec<Action> },
    Branch(Term),
    Syscall(Term),
    Break(Term),
    Raise(Term),
    CoFun(Term, Term),
    Overflow { dir: i32, lhs: Term, rhs: Term },
    StoreMem {
        width: u8,
        addr: Term,
        value: Term,
    },
}

/// Decode-time statement: rendered as literal source text.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Comment(String),
    /// First binding of a decode-time variable.
    Decl { name: String, value: Term },
    /// Re-binding of an already-declared name (or the `branched` flag).
    Assign { name: String, value: Term },
    /// Decode-time conditional around further statements.
    Guard { cond: Term, body: Vec<Stmt> },
    /// Boundary into the runtime: the contained actions are realized.
    Emit(Vec<Action>),
    Switch {
        key: Term,
        arms: Vec<(u32, Vec<Stmt>)>,
    },
    Return(Term),
}

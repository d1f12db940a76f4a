// This module defines the two expression representations the generator works with.
// SExpr is the canonical nested-sequence form produced by normalizing a raw table
// definition: a leading operator atom followed by positional operands. It serializes
// untagged (numbers, strings, arrays) so the on-disk cache stays plain JSON. Expr is
// the closed, typed semantic tree the rest of the pipeline consumes; every node kind
// an instruction formula can use is a variant here and downstream passes match it
// exhaustively, so an "unknown tag" can only exist at the loader boundary where SExpr
// is parsed into Expr. The module also hosts the shared operator algebra (OpKind) and
// the free-variable analysis that drives decoder field materialization.

//! Semantic expression trees.
//!
//! [`SExpr`] is the canonical interchange/cache form; [`Expr`] is the typed
//! tree used by lowering. [`free_vars`] computes the symbol dependency set
//! of a formula, which is what decides which instruction-word fields the
//! decoder has to extract.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod normalize;

/// Canonical nested-sequence expression.
///
/// Serializes as plain JSON: integers, strings and arrays. This is both the
/// normalizer's output and the cache's on-disk representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SExpr {
    Int(i64),
    Sym(String),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn sym(name: impl Into<String>) -> Self {
        SExpr::Sym(name.into())
    }

    pub fn list(elems: impl Into<Vec<SExpr>>) -> Self {
        SExpr::List(elems.into())
    }
}

impl From<i64> for SExpr {
    fn from(v: i64) -> Self {
        SExpr::Int(v)
    }
}

impl From<&str> for SExpr {
    fn from(v: &str) -> Self {
        SExpr::Sym(v.to_string())
    }
}

/// Binary operators shared by both render backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Sub,
    And,
    Or,
    Nor,
    Xor,
    Mul,
    Div,
    Mod,
    Shl,
    /// Arithmetic (sign-preserving) right shift.
    Shra,
    /// Logical right shift.
    Shrl,
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Neq,
}

impl OpKind {
    /// Resolve a canonical operator tag.
    pub fn from_tag(tag: &str) -> Option<OpKind> {
        Some(match tag {
            "add" => OpKind::Add,
            "sub" => OpKind::Sub,
            "and" => OpKind::And,
            "or" => OpKind::Or,
            "nor" => OpKind::Nor,
            "xor" => OpKind::Xor,
            "mul" => OpKind::Mul,
            "div" => OpKind::Div,
            "mod" => OpKind::Mod,
            "shl" => OpKind::Shl,
            "shra" => OpKind::Shra,
            "shrl" => OpKind::Shrl,
            "eq" => OpKind::Eq,
            "ge" => OpKind::Ge,
            "gt" => OpKind::Gt,
            "le" => OpKind::Le,
            "lt" => OpKind::Lt,
            "neq" => OpKind::Neq,
            _ => return None,
        })
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::And => "and",
            OpKind::Or => "or",
            OpKind::Nor => "nor",
            OpKind::Xor => "xor",
            OpKind::Mul => "mul",
            OpKind::Div => "div",
            OpKind::Mod => "mod",
            OpKind::Shl => "shl",
            OpKind::Shra => "shra",
            OpKind::Shrl => "shrl",
            OpKind::Eq => "eq",
            OpKind::Ge => "ge",
            OpKind::Gt => "gt",
            OpKind::Le => "le",
            OpKind::Lt => "lt",
            OpKind::Neq => "neq",
        };
        f.write_str(tag)
    }
}

/// Typed semantic expression tree.
///
/// The closed set of node kinds an instruction formula can use. Statement-like
/// kinds (`Set`, `If`, `When`, `Branch`, ...) and value-like kinds (`Op`,
/// `Gpr`, `Load`, ...) share the type; the lowering pass sorts out which
/// position each may appear in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Sym(String),
    Op(OpKind, Box<Expr>, Box<Expr>),

    /// General-purpose register access by index.
    Gpr(Box<Expr>),
    /// Coprocessor data register: (cop, reg).
    CopReg(Box<Expr>, Box<Expr>),
    /// Coprocessor control register: (cop, reg).
    CopCtrl(Box<Expr>, Box<Expr>),
    Hi,
    Lo,
    /// Address of the instruction being decoded.
    Pc,
    /// Address of the delay slot (`pc + 4`).
    Pcd,

    Set(Box<Expr>, Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    When(Box<Expr>, Box<Expr>),
    Block(Vec<Expr>),
    Let {
        name: String,
        value: Box<Expr>,
        body: Vec<Expr>,
    },
    /// Like `Let`, but the binding must be realized as runtime instructions.
    RLet {
        name: String,
        value: Box<Expr>,
        body: Vec<Expr>,
    },

    Load {
        width: u8,
        addr: Box<Expr>,
    },
    Store {
        width: u8,
        addr: Box<Expr>,
        value: Box<Expr>,
    },

    Branch(Box<Expr>),
    Syscall(Box<Expr>),
    Break(Box<Expr>),
    Raise(Box<Expr>),
    CoFun(Box<Expr>, Box<Expr>),

    Overflow(Box<Expr>),
    SignExt(u8, Box<Expr>),
    ZeroExt(u8, Box<Expr>),
    /// Reinterpretation markers. Transparent to lowering; only the arithmetic
    /// shift gives them meaning.
    Signed(Box<Expr>),
    Unsigned(Box<Expr>),
}

/// Free symbol names of a semantic expression.
///
/// This is the dependency set consumed by the decoder field materializer: a
/// field extraction is generated iff the field's name occurs here.
pub fn free_vars(expr: &Expr) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_vars(expr, &mut out);
    out
}

fn collect_vars(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Sym(name) => {
            out.insert(name.clone());
        }
        Expr::Int(_) | Expr::Hi | Expr::Lo | Expr::Pc | Expr::Pcd => {}
        Expr::Op(_, a, b) | Expr::CopReg(a, b) | Expr::CopCtrl(a, b) | Expr::CoFun(a, b) => {
            collect_vars(a, out);
            collect_vars(b, out);
        }
        Expr::Gpr(e)
        | Expr::Branch(e)
        | Expr::Syscall(e)
        | Expr::Break(e)
        | Expr::Raise(e)
        | Expr::Overflow(e)
        | Expr::SignExt(_, e)
        | Expr::ZeroExt(_, e)
        | Expr::Signed(e)
        | Expr::Unsigned(e) => collect_vars(e, out),
        Expr::Set(a, b) => {
            collect_vars(a, out);
            collect_vars(b, out);
        }
        Expr::If(c, t, e) => {
            collect_vars(c, out);
            collect_vars(t, out);
            collect_vars(e, out);
        }
        Expr::When(c, b) => {
            collect_vars(c, out);
            collect_vars(b, out);
        }
        Expr::Block(stmts) => {
            for s in stmts {
                collect_vars(s, out);
            }
        }
        Expr::Let { value, body, .. } | Expr::RLet { value, body, .. } => {
            collect_vars(value, out);
            for s in body {
                collect_vars(s, out);
            }
        }
        Expr::Load { addr, .. } => collect_vars(addr, out),
        Expr::Store { addr, value, .. } => {
            collect_vars(addr, out);
            collect_vars(value, out);
        }
    }
}

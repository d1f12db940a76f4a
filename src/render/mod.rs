// This module renders the lowered statement sequence into the generated artifact's
// source text. One statement stream feeds two backends that share the operator
// table in ops.rs: decode-time statements (the dispatch switch, field extractions,
// guards) render as literal C through Target::Source, and everything inside an
// Emit marker renders as calls against the JIT emission interface through
// Target::Jit. A JIT-rendered term is either a plain C integer expression, which
// must be wrapped in a constant-creation call before it can be passed to an
// emission function, or an already-realized jit_value_t expression that passes
// through unchanged; names bound by realized bindings are tracked so their later
// uses pass through. Realized conditionals draw their temp label names from the
// session counter, which keeps repeated runs byte-identical. Each backend rejects
// (logs, counts, and skips) nodes outside its own vocabulary.

//! Dual-backend rendering of lowered statements.

use std::collections::BTreeSet;

use log::warn;

use crate::core::GenSession;
use crate::expr::OpKind;
use crate::lower::ir::{Action, Place, Stmt, Term};

pub mod ops;

/// Which backend a term is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Literal statements of the generated source.
    Source,
    /// Calls against the JIT emission interface.
    Jit,
}

/// Indented line writer for the generated source.
#[derive(Debug, Default)]
pub struct CodeWriter {
    out: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    pub fn close(&mut self, text: impl AsRef<str>) {
        self.indent -= 1;
        self.line(text);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// A rendered term plus whether it already is a `jit_value_t` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub realized: bool,
}

impl Rendered {
    fn plain(text: String) -> Self {
        Rendered {
            text,
            realized: false,
        }
    }

    fn value_expr(text: String) -> Self {
        Rendered {
            text,
            realized: true,
        }
    }

    /// The term as a `jit_value_t` argument, constant-wrapping if needed.
    pub fn value(&self) -> String {
        if self.realized {
            self.text.clone()
        } else {
            constant(&self.text)
        }
    }
}

fn constant(text: &str) -> String {
    format!("jit_value_create_nint_constant(func, jit_type_uint, {text})")
}

fn hex(v: i64) -> String {
    if v < 0 {
        format!("-0x{:x}", -v)
    } else {
        format!("0x{v:x}")
    }
}

/// Render a statement sequence into source text.
pub fn render_program(stmts: &[Stmt], session: &mut GenSession, w: &mut CodeWriter) {
    let mut renderer = Renderer {
        session,
        realized: BTreeSet::new(),
    };
    renderer.stmts(stmts, w);
}

struct Renderer<'s> {
    session: &'s mut GenSession,
    /// Names currently bound to realized runtime values.
    realized: BTreeSet<String>,
}

impl Renderer<'_> {
    fn stmts(&mut self, stmts: &[Stmt], w: &mut CodeWriter) {
        for stmt in stmts {
            self.stmt(stmt, w);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, w: &mut CodeWriter) {
        match stmt {
            Stmt::Comment(text) => w.line(format!("/* {text} */")),
            Stmt::Decl { name, value } => {
                if let Some(value) = self.term(Target::Source, value) {
                    w.line(format!("uint32_t {name} = {};", value.text));
                }
            }
            Stmt::Assign { name, value } => {
                if let Some(value) = self.term(Target::Source, value) {
                    w.line(format!("{name} = {};", value.text));
                }
            }
            Stmt::Guard { cond, body } => {
                if let Some(cond) = self.term(Target::Source, cond) {
                    w.open(format!("if({}) {{", cond.text));
                    self.stmts(body, w);
                    w.close("}");
                }
            }
            Stmt::Emit(actions) => self.actions(actions, w),
            Stmt::Switch { key, arms } => {
                if let Some(key) = self.term(Target::Source, key) {
                    w.open(format!("switch({}) {{", key.text));
                    for (value, body) in arms {
                        // Each arm is its own scope in the artifact.
                        self.realized.clear();
                        w.open(format!("case {}: {{", hex(*value as i64)));
                        self.stmts(body, w);
                        w.line("break;");
                        w.close("}");
                    }
                    w.close("}");
                }
            }
            Stmt::Return(value) => {
                if let Some(value) = self.term(Target::Source, value) {
                    w.line(format!("return {};", value.text));
                }
            }
        }
    }

    fn actions(&mut self, actions: &[Action], w: &mut CodeWriter) {
        for action in actions {
            self.action(action, w);
        }
    }

    fn action(&mut self, action: &Action, w: &mut CodeWriter) {
        match action {
            Action::Bind { name, value } => {
                let Some(value) = self.term(Target::Jit, value) else {
                    return;
                };
                w.line(format!("jit_value_t {name} = {};", value.value()));
                self.realized.insert(name.clone());
            }
            Action::Store { place, value } => {
                let Some(value) = self.term(Target::Jit, value) else {
                    return;
                };
                match place {
                    Place::Gpr(index) => {
                        let Some(index) = self.term(Target::Jit, index) else {
                            return;
                        };
                        w.line(format!(
                            "jit_insn_store_relative(func, jit_insn_add(func, state, \
                             jit_insn_mul(func, {}, {})), 0, {});",
                            index.value(),
                            constant("0x4"),
                            value.value()
                        ));
                    }
                    Place::Pc => w.line(format!(
                        "jit_insn_store_relative(func, state, 32*4, {});",
                        value.value()
                    )),
                    Place::Hi => w.line(format!(
                        "jit_insn_store_relative(func, state, 33*4, {});",
                        value.value()
                    )),
                    Place::Lo => w.line(format!(
                        "jit_insn_store_relative(func, state, 34*4, {});",
                        value.value()
                    )),
                    Place::CopReg(cop, reg) => {
                        let (Some(cop), Some(reg)) =
                            (self.term(Target::Jit, cop), self.term(Target::Jit, reg))
                        else {
                            return;
                        };
                        w.line(format!(
                            "call_write_copreg(func, {}, {}, {});",
                            cop.text,
                            reg.text,
                            value.value()
                        ));
                    }
                    Place::CopCtrl(cop, reg) => {
                        let (Some(cop), Some(reg)) =
                            (self.term(Target::Jit, cop), self.term(Target::Jit, reg))
                        else {
                            return;
                        };
                        w.line(format!(
                            "call_write_copcreg(func, {}, {}, {});",
                            cop.text,
                            reg.text,
                            value.value()
                        ));
                    }
                }
            }
            Action::If { cond, then, els } => {
                let Some(cond) = self.term(Target::Jit, cond) else {
                    return;
                };
                let skip = self.session.next_label();
                let done = self.session.next_label();
                w.line(format!(
                    "jit_label_t {skip} = jit_label_undefined, {done} = jit_label_undefined;"
                ));
                w.line(format!(
                    "jit_insn_branch_if_not(func, {}, &{skip});",
                    cond.value()
                ));
                self.actions(then, w);
                w.line(format!("jit_insn_branch(func, &{done});"));
                w.line(format!("jit_insn_label(func, &{skip});"));
                self.actions(els, w);
                w.line(format!("jit_insn_label(func, &{done});"));
            }
            Action::When { cond, body } => {
                let Some(cond) = self.term(Target::Jit, cond) else {
                    return;
                };
                let skip = self.session.next_label();
                w.line(format!("jit_label_t {skip} = jit_label_undefined;"));
                w.line(format!(
                    "jit_insn_branch_if_not(func, {}, &{skip});",
                    cond.value()
                ));
                self.actions(body, w);
                w.line(format!("jit_insn_label(func, &{skip});"));
            }
            Action::Branch(target) => {
                if let Some(target) = self.term(Target::Jit, target) {
                    w.line(format!("call_branch(func, {});", target.value()));
                }
            }
            Action::Syscall(code) => {
                if let Some(code) = self.term(Target::Jit, code) {
                    w.line(format!("call_syscall(func, {});", code.text));
                }
            }
            Action::Break(code) => {
                if let Some(code) = self.term(Target::Jit, code) {
                    w.line(format!("call_break(func, {});", code.text));
                }
            }
            Action::Raise(code) => {
                if let Some(code) = self.term(Target::Jit, code) {
                    w.line(format!("call_raise(func, {});", code.text));
                }
            }
            Action::CoFun(cop, fun) => {
                let (Some(cop), Some(fun)) =
                    (self.term(Target::Jit, cop), self.term(Target::Jit, fun))
                else {
                    return;
                };
                w.line(format!("call_copfun(func, {}, {});", cop.text, fun.text));
            }
            Action::Overflow { dir, lhs, rhs } => {
                let (Some(lhs), Some(rhs)) =
                    (self.term(Target::Jit, lhs), self.term(Target::Jit, rhs))
                else {
                    return;
                };
                w.line(format!(
                    "call_overflow(func, {}, {}, {dir});",
                    lhs.value(),
                    rhs.value()
                ));
            }
            Action::StoreMem { width, addr, value } => {
                let (Some(addr), Some(value)) =
                    (self.term(Target::Jit, addr), self.term(Target::Jit, value))
                else {
                    return;
                };
                w.line(format!(
                    "call_store_memory(func, {width}, {}, {});",
                    addr.value(),
                    value.value()
                ));
            }
        }
    }

    fn term(&mut self, target: Target, term: &Term) -> Option<Rendered> {
        match target {
            Target::Source => self.source_term(term),
            Target::Jit => self.jit_term(term),
        }
    }

    fn source_term(&mut self, term: &Term) -> Option<Rendered> {
        Some(match term {
            Term::Int(v) => Rendered::plain(hex(*v)),
            Term::Sym(name) => Rendered::plain(name.clone()),
            Term::Op(kind, a, b) => {
                let a = self.source_term(a)?;
                let b = self.source_term(b)?;
                let text = match kind {
                    OpKind::Nor => format!("~(({}) {} ({}))", a.text, ops::spec(*kind).infix, b.text),
                    OpKind::Shra => {
                        format!("((int32_t)({})) >> ((int32_t)({}))", a.text, b.text)
                    }
                    _ => format!("({}) {} ({})", a.text, ops::spec(*kind).infix, b.text),
                };
                Rendered::plain(text)
            }
            Term::ZeroExt { term, .. } => self.source_term(term)?,
            other => {
                warn!("dropping runtime-only node in source position: {other:?}");
                self.session.note_dropped();
                return None;
            }
        })
    }

    fn jit_term(&mut self, term: &Term) -> Option<Rendered> {
        Some(match term {
            Term::Int(v) => Rendered::plain(hex(*v)),
            Term::Sym(name) => {
                if self.realized.contains(name) {
                    Rendered::value_expr(name.clone())
                } else {
                    Rendered::plain(name.clone())
                }
            }
            Term::Op(kind, a, b) => {
                let a = self.jit_term(a)?;
                let b = self.jit_term(b)?;
                let row = ops::spec(*kind);
                let text = match kind {
                    OpKind::Nor => format!(
                        "jit_insn_not(func, {}(func, {}, {}))",
                        row.jit,
                        a.value(),
                        b.value()
                    ),
                    _ => format!("{}(func, {}, {})", row.jit, a.value(), b.value()),
                };
                Rendered::value_expr(text)
            }
            Term::Read(place) => match place.as_ref() {
                Place::Gpr(index) => {
                    let index = self.jit_term(index)?;
                    Rendered::value_expr(format!(
                        "jit_insn_load_relative(func, jit_insn_add(func, state, \
                         jit_insn_mul(func, {}, {})), 0, jit_type_uint)",
                        index.value(),
                        constant("0x4")
                    ))
                }
                Place::Pc => Rendered::value_expr(
                    "jit_insn_load_relative(func, state, 32*4, jit_type_uint)".to_string(),
                ),
                Place::Hi => Rendered::value_expr(
                    "jit_insn_load_relative(func, state, 33*4, jit_type_uint)".to_string(),
                ),
                Place::Lo => Rendered::value_expr(
                    "jit_insn_load_relative(func, state, 34*4, jit_type_uint)".to_string(),
                ),
                Place::CopReg(cop, reg) => {
                    let cop = self.jit_term(cop)?;
                    let reg = self.jit_term(reg)?;
                    Rendered::value_expr(format!(
                        "call_read_copreg(func, {}, {})",
                        cop.text, reg.text
                    ))
                }
                Place::CopCtrl(cop, reg) => {
                    let cop = self.jit_term(cop)?;
                    let reg = self.jit_term(reg)?;
                    Rendered::value_expr(format!(
                        "call_read_copcreg(func, {}, {})",
                        cop.text, reg.text
                    ))
                }
            },
            Term::LoadMem { width, addr } => {
                let addr = self.jit_term(addr)?;
                Rendered::value_expr(format!(
                    "call_load_memory(func, {width}, {})",
                    addr.value()
                ))
            }
            Term::SignExt { width, term } => {
                let inner = self.jit_term(term)?;
                Rendered::value_expr(format!(
                    "call_signext(func, {width}, {})",
                    inner.value()
                ))
            }
            Term::ZeroExt { term, .. } => self.jit_term(term)?,
        })
    }
}

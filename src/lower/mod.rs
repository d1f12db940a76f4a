// This module rewrites a typed semantic formula into the ordered statement sequence
// the renderer consumes. Lowering is position-driven: statement position produces
// decode-time Stmt nodes (bindings, the zero-register guard, Emit blocks), emit
// position produces runtime Action nodes, and value position produces Terms. A
// general-purpose register store is always wrapped in a guard comparing the
// register index against zero; the index is a decode-time variable, so the guard
// is dynamic in the generated artifact, and register 0 writes become no-ops.
// Semantic conditionals are always realized because their condition depends on
// run-time data. The pass tracks whether any Branch node was lowered; if so, the
// instruction's sequence assigns the branched output flag after every other effect
// and before the final success return. All accumulation happens in a Lowering value
// owned by this pass; nothing is threaded through globals.

//! Semantic lowering: formula -> statement sequence.

use std::collections::BTreeSet;

use log::warn;

use crate::core::GenSession;
use crate::decode;
use crate::expr::{free_vars, Expr, OpKind};
use crate::table::InstructionDef;

pub mod ir;

use ir::{Action, Place, Stmt, Term};

/// Name of the current-instruction-address parameter in the artifact.
pub const PC: &str = "pc";
/// Name of the branch-occurred output flag in the artifact.
pub const BRANCHED: &str = "branched";

/// Lower one instruction into its complete case-body statement sequence.
///
/// The sequence always starts with the instruction comment, the realized
/// store of the current pc into the state block, and the materialized field
/// extractions; it always ends with `return true`, preceded by the
/// branched-flag assignment iff the formula contained a branch.
pub fn lower_instruction(def: &InstructionDef, session: &mut GenSession) -> Vec<Stmt> {
    session.note_instruction();
    let deps = free_vars(&def.semantic);
    let fields = decode::materialize(def.encoding, &deps);

    let mut declared: BTreeSet<String> = BTreeSet::new();
    for stmt in &fields {
        if let Stmt::Decl { name, .. } = stmt {
            declared.insert(name.clone());
        }
    }

    let mut stmts = vec![
        Stmt::Comment(def.name.clone()),
        Stmt::Emit(vec![Action::Store {
            place: Place::Pc,
            value: Term::sym(PC),
        }]),
    ];
    stmts.extend(fields);

    let mut lowering = Lowering {
        session,
        declared,
        branched: false,
    };
    lowering.stmt(&def.semantic, &mut stmts);

    if lowering.branched {
        stmts.push(Stmt::Assign {
            name: BRANCHED.to_string(),
            value: Term::sym("true"),
        });
    }
    stmts.push(Stmt::Return(Term::sym("true")));
    stmts
}

struct Lowering<'s> {
    session: &'s mut GenSession,
    declared: BTreeSet<String>,
    branched: bool,
}

impl Lowering<'_> {
    /// Lower in statement position.
    fn stmt(&mut self, expr: &Expr, out: &mut Vec<Stmt>) {
        match expr {
            Expr::Block(stmts) => {
                for s in stmts {
                    self.stmt(s, out);
                }
            }
            Expr::Let { name, value, body } => {
                let Some(value) = self.term(value) else {
                    return;
                };
                if self.declared.insert(name.clone()) {
                    out.push(Stmt::Decl {
                        name: name.clone(),
                        value,
                    });
                } else {
                    out.push(Stmt::Assign {
                        name: name.clone(),
                        value,
                    });
                }
                for s in body {
                    self.stmt(s, out);
                }
            }
            Expr::RLet { name, value, body } => {
                let Some(value) = self.term(value) else {
                    return;
                };
                let mut actions = vec![Action::Bind {
                    name: name.clone(),
                    value,
                }];
                for s in body {
                    self.action(s, &mut actions);
                }
                out.push(Stmt::Emit(actions));
            }
            Expr::Set(target, value) => {
                let Some(value) = self.term(value) else {
                    return;
                };
                match &**target {
                    Expr::Gpr(index) => {
                        let Some(index) = self.term(index) else {
                            return;
                        };
                        out.push(Stmt::Guard {
                            cond: Term::op(OpKind::Neq, index.clone(), Term::Int(0)),
                            body: vec![Stmt::Emit(vec![Action::Store {
                                place: Place::Gpr(index),
                                value,
                            }])],
                        });
                    }
                    _ => {
                        if let Some(place) = self.place(target) {
                            out.push(Stmt::Emit(vec![Action::Store { place, value }]));
                        }
                    }
                }
            }
            Expr::If(..)
            | Expr::When(..)
            | Expr::Branch(..)
            | Expr::Syscall(..)
            | Expr::Break(..)
            | Expr::Raise(..)
            | Expr::CoFun(..)
            | Expr::Overflow(..)
            | Expr::Store { .. } => {
                let mut actions = Vec::new();
                self.action(expr, &mut actions);
                if !actions.is_empty() {
                    out.push(Stmt::Emit(actions));
                }
            }
            other => {
                warn!("dropping effect-free node in statement position: {other:?}");
                self.session.note_dropped();
            }
        }
    }

    /// Lower in emit position.
    fn action(&mut self, expr: &Expr, out: &mut Vec<Action>) {
        match expr {
            Expr::Block(stmts) => {
                for s in stmts {
                    self.action(s, out);
                }
            }
            // Inside an emit context every binding is realized.
            Expr::Let { name, value, body } | Expr::RLet { name, value, body } => {
                let Some(value) = self.term(value) else {
                    return;
                };
                out.push(Action::Bind {
                    name: name.clone(),
                    value,
                });
                for s in body {
                    self.action(s, out);
                }
            }
            Expr::Set(target, value) => {
                let Some(value) = self.term(value) else {
                    return;
                };
                match &**target {
                    Expr::Gpr(index) => {
                        let Some(index) = self.term(index) else {
                            return;
                        };
                        out.push(Action::When {
                            cond: Term::op(OpKind::Neq, index.clone(), Term::Int(0)),
                            body: vec![Action::Store {
                                place: Place::Gpr(index),
                                value,
                            }],
                        });
                    }
                    _ => {
                        if let Some(place) = self.place(target) {
                            out.push(Action::Store { place, value });
                        }
                    }
                }
            }
            Expr::If(cond, then, els) => {
                let Some(cond) = self.term(cond) else {
                    return;
                };
                let mut then_actions = Vec::new();
                self.action(then, &mut then_actions);
                let mut else_actions = Vec::new();
                self.action(els, &mut else_actions);
                out.push(Action::If {
                    cond,
                    then: then_actions,
                    els: else_actions,
                });
            }
            Expr::When(cond, body) => {
                let Some(cond) = self.term(cond) else {
                    return;
                };
                let mut body_actions = Vec::new();
                self.action(body, &mut body_actions);
                out.push(Action::When {
                    cond,
                    body: body_actions,
                });
            }
            Expr::Branch(target) => {
                let Some(target) = self.term(target) else {
                    return;
                };
                self.branched = true;
                out.push(Action::Branch(target));
            }
            Expr::Syscall(code) => {
                if let Some(code) = self.term(code) {
                    out.push(Action::Syscall(code));
                }
            }
            Expr::Break(code) => {
                if let Some(code) = self.term(code) {
                    out.push(Action::Break(code));
                }
            }
            Expr::Raise(code) => {
                if let Some(code) = self.term(code) {
                    out.push(Action::Raise(code));
                }
            }
            Expr::CoFun(cop, fun) => {
                let (Some(cop), Some(fun)) = (self.term(cop), self.term(fun)) else {
                    return;
                };
                out.push(Action::CoFun(cop, fun));
            }
            Expr::Overflow(inner) => match &**inner {
                Expr::Op(OpKind::Add, a, b) | Expr::Op(OpKind::Sub, a, b) => {
                    let dir = if matches!(&**inner, Expr::Op(OpKind::Add, ..)) {
                        1
                    } else {
                        -1
                    };
                    let (Some(lhs), Some(rhs)) = (self.term(a), self.term(b)) else {
                        return;
                    };
                    out.push(Action::Overflow { dir, lhs, rhs });
                }
                other => {
                    warn!("dropping overflow check over a non-additive operand: {other:?}");
                    self.session.note_dropped();
                }
            },
            Expr::Store { width, addr, value } => {
                let (Some(addr), Some(value)) = (self.term(addr), self.term(value)) else {
                    return;
                };
                out.push(Action::StoreMem {
                    width: *width,
                    addr,
                    value,
                });
            }
            other => {
                warn!("dropping effect-free node in emit position: {other:?}");
                self.session.note_dropped();
            }
        }
    }

    /// Lower in value position.
    fn term(&mut self, expr: &Expr) -> Option<Term> {
        Some(match expr {
            Expr::Int(v) => Term::Int(*v),
            Expr::Sym(name) => Term::Sym(name.clone()),
            Expr::Op(kind, a, b) => Term::op(*kind, self.term(a)?, self.term(b)?),
            Expr::Gpr(index) => Term::Read(Box::new(Place::Gpr(self.term(index)?))),
            Expr::CopReg(cop, reg) => Term::Read(Box::new(Place::CopReg(self.term(cop)?, self.term(reg)?))),
            Expr::CopCtrl(cop, reg) => {
                Term::Read(Box::new(Place::CopCtrl(self.term(cop)?, self.term(reg)?)))
            }
            Expr::Hi => Term::Read(Box::new(Place::Hi)),
            Expr::Lo => Term::Read(Box::new(Place::Lo)),
            // The address of the instruction being decoded is a decode-time
            // parameter, not a state load.
            Expr::Pc => Term::sym(PC),
            // The delay slot follows immediately; a constant offset.
            Expr::Pcd => Term::op(OpKind::Add, Term::sym(PC), Term::Int(4)),
            Expr::Load { width, addr } => Term::LoadMem {
                width: *width,
                addr: Box::new(self.term(addr)?),
            },
            Expr::SignExt(width, inner) => Term::SignExt {
                width: *width,
                term: Box::new(self.term(inner)?),
            },
            Expr::ZeroExt(width, inner) => Term::ZeroExt {
                width: *width,
                term: Box::new(self.term(inner)?),
            },
            Expr::Signed(inner) | Expr::Unsigned(inner) => self.term(inner)?,
            other => {
                warn!("dropping statement node in value position: {other:?}");
                self.session.note_dropped();
                return None;
            }
        })
    }

    /// Resolve an assignment target to a state slot.
    fn place(&mut self, expr: &Expr) -> Option<Place> {
        Some(match expr {
            Expr::Gpr(index) => Place::Gpr(self.term(index)?),
            Expr::Pc => Place::Pc,
            Expr::Hi => Place::Hi,
            Expr::Lo => Place::Lo,
            Expr::CopReg(cop, reg) => Place::CopReg(self.term(cop)?, self.term(reg)?),
            Expr::CopCtrl(cop, reg) => Place::CopCtrl(self.term(cop)?, self.term(reg)?),
            other => {
                warn!("dropping assignment to a non-state target: {other:?}");
                self.session.note_dropped();
                return None;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::SExpr;
    use crate::table::EncodingType;

    fn sym(n: &str) -> Expr {
        Expr::Sym(n.to_string())
    }

    fn gpr(n: &str) -> Expr {
        Expr::Gpr(Box::new(sym(n)))
    }

    fn def_with(encoding: EncodingType, semantic: Expr) -> InstructionDef {
        InstructionDef {
            name: "TEST".to_string(),
            encoding,
            opcode: 0,
            funct: None,
            disasm: String::new(),
            canon: SExpr::list([SExpr::sym("block")]),
            semantic,
        }
    }

    #[test]
    fn gpr_assignment_gets_a_zero_register_guard() {
        let semantic = Expr::Set(
            Box::new(gpr("rd")),
            Box::new(Expr::Op(
                OpKind::Add,
                Box::new(gpr("rs")),
                Box::new(gpr("rt")),
            )),
        );
        let mut session = GenSession::new();
        let stmts = lower_instruction(&def_with(EncodingType::RType, semantic), &mut session);

        let guard = stmts
            .iter()
            .find_map(|s| match s {
                Stmt::Guard { cond, body } => Some((cond, body)),
                _ => None,
            })
            .expect("no guard emitted");
        assert_eq!(
            *guard.0,
            Term::op(OpKind::Neq, Term::sym("rd"), Term::Int(0))
        );
        match &guard.1[..] {
            [Stmt::Emit(actions)] => match &actions[..] {
                [Action::Store {
                    place: Place::Gpr(idx),
                    ..
                }] => assert_eq!(*idx, Term::sym("rd")),
                other => panic!("unexpected actions: {other:?}"),
            },
            other => panic!("unexpected guard body: {other:?}"),
        }
    }

    #[test]
    fn sequence_starts_with_comment_pc_store_and_fields() {
        let semantic = Expr::Set(Box::new(gpr("rt")), Box::new(gpr("rs")));
        let mut session = GenSession::new();
        let stmts = lower_instruction(&def_with(EncodingType::IType, semantic), &mut session);

        assert_eq!(stmts[0], Stmt::Comment("TEST".to_string()));
        assert_eq!(
            stmts[1],
            Stmt::Emit(vec![Action::Store {
                place: Place::Pc,
                value: Term::sym(PC),
            }])
        );
        // rs and rt are used, imm is not.
        let decls: Vec<_> = stmts
            .iter()
            .filter_map(|s| match s {
                Stmt::Decl { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(decls, vec!["rs", "rt"]);
    }

    #[test]
    fn branch_inside_when_orders_flag_before_return() {
        // when (eq rs rt) branch(pcd + imm)
        let semantic = Expr::When(
            Box::new(Expr::Op(
                OpKind::Eq,
                Box::new(gpr("rs")),
                Box::new(gpr("rt")),
            )),
            Box::new(Expr::Branch(Box::new(Expr::Op(
                OpKind::Add,
                Box::new(Expr::Pcd),
                Box::new(sym("imm")),
            )))),
        );
        let mut session = GenSession::new();
        let stmts = lower_instruction(&def_with(EncodingType::IType, semantic), &mut session);

        let n = stmts.len();
        match &stmts[n - 3] {
            Stmt::Emit(actions) => match &actions[..] {
                [Action::When { body, .. }] => {
                    assert!(matches!(body[..], [Action::Branch(_)]))
                }
                other => panic!("unexpected actions: {other:?}"),
            },
            other => panic!("unexpected statement: {other:?}"),
        }
        assert_eq!(
            stmts[n - 2],
            Stmt::Assign {
                name: BRANCHED.to_string(),
                value: Term::sym("true"),
            }
        );
        assert_eq!(stmts[n - 1], Stmt::Return(Term::sym("true")));
    }

    #[test]
    fn no_branch_means_no_flag_assignment() {
        let semantic = Expr::Set(Box::new(gpr("rt")), Box::new(sym("imm")));
        let mut session = GenSession::new();
        let stmts = lower_instruction(&def_with(EncodingType::IType, semantic), &mut session);
        assert!(!stmts.iter().any(|s| matches!(
            s,
            Stmt::Assign { name, .. } if name == BRANCHED
        )));
    }

    #[test]
    fn rlet_realizes_the_binding_first() {
        let semantic = Expr::RLet {
            name: "addr".to_string(),
            value: Box::new(Expr::Op(
                OpKind::Add,
                Box::new(gpr("rs")),
                Box::new(sym("imm")),
            )),
            body: vec![Expr::Store {
                width: 32,
                addr: Box::new(sym("addr")),
                value: Box::new(gpr("rt")),
            }],
        };
        let mut session = GenSession::new();
        let stmts = lower_instruction(&def_with(EncodingType::IType, semantic), &mut session);

        let emit = stmts
            .iter()
            .find_map(|s| match s {
                Stmt::Emit(actions) if actions.len() == 2 => Some(actions),
                _ => None,
            })
            .expect("no realized binding block");
        assert!(matches!(&emit[0], Action::Bind { name, .. } if name == "addr"));
        assert!(matches!(&emit[1], Action::StoreMem { width: 32, .. }));
    }

    #[test]
    fn let_rebinding_a_field_assigns_instead_of_declaring() {
        let semantic = Expr::Let {
            name: "imm".to_string(),
            value: Box::new(Expr::Op(
                OpKind::Shl,
                Box::new(sym("imm")),
                Box::new(Expr::Int(2)),
            )),
            body: vec![Expr::Set(Box::new(gpr("rt")), Box::new(sym("imm")))],
        };
        let mut session = GenSession::new();
        let stmts = lower_instruction(&def_with(EncodingType::IType, semantic), &mut session);
        assert!(stmts
            .iter()
            .any(|s| matches!(s, Stmt::Assign { name, .. } if name == "imm")));
    }

    #[test]
    fn delay_slot_reference_is_a_constant_offset() {
        let semantic = Expr::Branch(Box::new(Expr::Pcd));
        let mut session = GenSession::new();
        let stmts = lower_instruction(&def_with(EncodingType::JType, semantic), &mut session);
        let branch = stmts
            .iter()
            .find_map(|s| match s {
                Stmt::Emit(actions) => actions.iter().find_map(|a| match a {
                    Action::Branch(t) => Some(t),
                    _ => None,
                }),
                _ => None,
            })
            .expect("no branch action");
        assert_eq!(
            *branch,
            Term::op(OpKind::Add, Term::sym(PC), Term::Int(4))
        );
    }

    #[test]
    fn nested_gpr_store_uses_a_runtime_guard() {
        // if (lt rs rt) { rd = 1 } else { rd = 0 }
        let semantic = Expr::If(
            Box::new(Expr::Op(
                OpKind::Lt,
                Box::new(gpr("rs")),
                Box::new(gpr("rt")),
            )),
            Box::new(Expr::Set(Box::new(gpr("rd")), Box::new(Expr::Int(1)))),
            Box::new(Expr::Set(Box::new(gpr("rd")), Box::new(Expr::Int(0)))),
        );
        let mut session = GenSession::new();
        let stmts = lower_instruction(&def_with(EncodingType::RType, semantic), &mut session);
        let cond = stmts
            .iter()
            .filter_map(|s| match s {
                Stmt::Emit(actions) => actions.iter().find_map(|a| match a {
                    Action::If { then, els, .. } => Some((then, els)),
                    _ => None,
                }),
                _ => None,
            })
            .next()
            .expect("no realized conditional");
        assert!(matches!(cond.0[..], [Action::When { .. }]));
        assert!(matches!(cond.1[..], [Action::When { .. }]));
    }

    #[test]
    fn overflow_direction_tracks_the_operator() {
        for (kind, dir) in [(OpKind::Add, 1), (OpKind::Sub, -1)] {
            let semantic = Expr::Overflow(Box::new(Expr::Op(
                kind,
                Box::new(gpr("rs")),
                Box::new(gpr("rt")),
            )));
            let mut session = GenSession::new();
            let stmts = lower_instruction(&def_with(EncodingType::RType, semantic), &mut session);
            let found = stmts.iter().any(|s| match s {
                Stmt::Emit(actions) => actions
                    .iter()
                    .any(|a| matches!(a, Action::Overflow { dir: d, .. } if *d == dir)),
                _ => false,
            });
            assert!(found, "missing overflow action for {kind:?}");
        }
    }
}

// This module is the system boundary between the external table-description
// interpreter and the typed compiler pipeline. DefNode mirrors the structured
// definition trees the interpreter hands over (dag nodes with optionally named
// elements, integers, strings, and references to other table entries). normalize()
// folds a DefNode into the canonical SExpr form: operator tags become the leading
// atom, named elements collapse to their bare name, references resolve to the
// referenced entry's name, and the table's `$` sigil is stripped. parse_expr() then
// lifts the canonical form into the closed Expr tree. This is the only place an
// unrecognized tag can occur, and the only place the permissive drop-and-continue
// policy applies: the offending subtree is logged, counted in the session, and
// omitted, while the rest of the definition keeps compiling.

//! Definition-node normalization and boundary parsing.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::GenSession;
use crate::expr::{Expr, OpKind, SExpr};

/// Structured definition node as supplied by the external table loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefNode {
    Int(i64),
    Str(String),
    Ref {
        #[serde(rename = "ref")]
        target: String,
    },
    Dag {
        dag: Vec<DagElem>,
    },
}

/// One dag element: an optional slot name and a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagElem(pub Option<String>, pub DefNode);

fn strip_sigil(name: &str) -> String {
    name.strip_prefix('$').unwrap_or(name).to_string()
}

/// Fold a definition node into canonical form.
///
/// A node with a single unnamed child collapses to that child's value; named
/// elements collapse to their name so a formula can refer to the sub-slot
/// without re-resolving its value; reference leaves resolve to the bare
/// referenced name. Normalizing an already-canonical tree is a no-op.
pub fn normalize(node: &DefNode) -> SExpr {
    match node {
        DefNode::Int(v) => SExpr::Int(*v),
        DefNode::Str(s) => SExpr::Sym(strip_sigil(s)),
        DefNode::Ref { target } => SExpr::Sym(strip_sigil(target)),
        DefNode::Dag { dag } => {
            if let [DagElem(None, value)] = &dag[..] {
                return normalize(value);
            }
            SExpr::List(
                dag.iter()
                    .map(|DagElem(name, value)| match name {
                        Some(n) => SExpr::Sym(strip_sigil(n)),
                        None => normalize(value),
                    })
                    .collect(),
            )
        }
    }
}

impl From<SExpr> for DefNode {
    fn from(s: SExpr) -> Self {
        match s {
            SExpr::Int(v) => DefNode::Int(v),
            SExpr::Sym(n) => DefNode::Str(n),
            SExpr::List(elems) => DefNode::Dag {
                dag: elems
                    .into_iter()
                    .map(|e| DagElem(None, DefNode::from(e)))
                    .collect(),
            },
        }
    }
}

/// Parse a canonical expression into the typed tree.
///
/// Returns `None` when the node itself is unusable; the caller decides the
/// drop granularity (block members are skipped individually, operands take
/// their whole statement down).
pub fn parse_expr(sexpr: &SExpr, session: &mut GenSession) -> Option<Expr> {
    match sexpr {
        SExpr::Int(v) => Some(Expr::Int(*v)),
        SExpr::Sym(name) => Some(match name.as_str() {
            "pc" => Expr::Pc,
            "pcd" => Expr::Pcd,
            "hi" => Expr::Hi,
            "lo" => Expr::Lo,
            _ => Expr::Sym(name.clone()),
        }),
        SExpr::List(elems) => parse_list(elems, session),
    }
}

fn parse_list(elems: &[SExpr], session: &mut GenSession) -> Option<Expr> {
    let (head, rest) = match elems.split_first() {
        Some(split) => split,
        None => {
            warn!("dropping empty expression node");
            session.note_dropped();
            return None;
        }
    };
    let tag = match head {
        SExpr::Sym(tag) => tag.as_str(),
        other => {
            warn!("dropping expression with non-symbol head: {other:?}");
            session.note_dropped();
            return None;
        }
    };

    if let Some(kind) = OpKind::from_tag(tag) {
        let [a, b] = checked(tag, rest, session)?;
        return Some(Expr::Op(
            kind,
            Box::new(parse_expr(a, session)?),
            Box::new(parse_expr(b, session)?),
        ));
    }

    let parsed = match tag {
        "hi" => Expr::Hi,
        "lo" => Expr::Lo,
        "pc" => Expr::Pc,
        "pcd" => Expr::Pcd,
        "gpr" => {
            let [idx] = checked(tag, rest, session)?;
            Expr::Gpr(Box::new(parse_expr(idx, session)?))
        }
        "copreg" => {
            let [cop, reg] = checked(tag, rest, session)?;
            Expr::CopReg(
                Box::new(parse_expr(cop, session)?),
                Box::new(parse_expr(reg, session)?),
            )
        }
        "copcreg" => {
            let [cop, reg] = checked(tag, rest, session)?;
            Expr::CopCtrl(
                Box::new(parse_expr(cop, session)?),
                Box::new(parse_expr(reg, session)?),
            )
        }
        "set" => {
            let [target, value] = checked(tag, rest, session)?;
            Expr::Set(
                Box::new(parse_expr(target, session)?),
                Box::new(parse_expr(value, session)?),
            )
        }
        "if" => {
            let [c, t, e] = checked(tag, rest, session)?;
            Expr::If(
                Box::new(parse_expr(c, session)?),
                Box::new(parse_expr(t, session)?),
                Box::new(parse_expr(e, session)?),
            )
        }
        "when" => {
            let [c, b] = checked(tag, rest, session)?;
            Expr::When(
                Box::new(parse_expr(c, session)?),
                Box::new(parse_expr(b, session)?),
            )
        }
        "block" => Expr::Block(parse_each(rest, session)),
        "let" | "rlet" => {
            if rest.len() < 2 {
                warn!("dropping `{tag}` with too few operands");
                session.note_dropped();
                return None;
            }
            let name = match &rest[0] {
                SExpr::Sym(n) => n.clone(),
                other => {
                    warn!("dropping `{tag}` with non-symbol binding: {other:?}");
                    session.note_dropped();
                    return None;
                }
            };
            let value = Box::new(parse_expr(&rest[1], session)?);
            let body = parse_each(&rest[2..], session);
            if tag == "let" {
                Expr::Let { name, value, body }
            } else {
                Expr::RLet { name, value, body }
            }
        }
        "load" => {
            let [width, addr] = checked(tag, rest, session)?;
            Expr::Load {
                width: parse_width(tag, width, session)?,
                addr: Box::new(parse_expr(addr, session)?),
            }
        }
        "store" => {
            let [width, addr, value] = checked(tag, rest, session)?;
            Expr::Store {
                width: parse_width(tag, width, session)?,
                addr: Box::new(parse_expr(addr, session)?),
                value: Box::new(parse_expr(value, session)?),
            }
        }
        "branch" => {
            let [target] = checked(tag, rest, session)?;
            Expr::Branch(Box::new(parse_expr(target, session)?))
        }
        "syscall" => {
            let [code] = checked(tag, rest, session)?;
            Expr::Syscall(Box::new(parse_expr(code, session)?))
        }
        "break" => {
            let [code] = checked(tag, rest, session)?;
            Expr::Break(Box::new(parse_expr(code, session)?))
        }
        "raise" => {
            let [code] = checked(tag, rest, session)?;
            Expr::Raise(Box::new(parse_expr(code, session)?))
        }
        "copfun" => {
            let [cop, fun] = checked(tag, rest, session)?;
            Expr::CoFun(
                Box::new(parse_expr(cop, session)?),
                Box::new(parse_expr(fun, session)?),
            )
        }
        "check_overflow" => {
            let [inner] = checked(tag, rest, session)?;
            Expr::Overflow(Box::new(parse_expr(inner, session)?))
        }
        "signext" => {
            let [width, inner] = checked(tag, rest, session)?;
            Expr::SignExt(
                parse_width(tag, width, session)?,
                Box::new(parse_expr(inner, session)?),
            )
        }
        "zeroext" => {
            let [width, inner] = checked(tag, rest, session)?;
            Expr::ZeroExt(
                parse_width(tag, width, session)?,
                Box::new(parse_expr(inner, session)?),
            )
        }
        "signed" => {
            let [inner] = checked(tag, rest, session)?;
            Expr::Signed(Box::new(parse_expr(inner, session)?))
        }
        "unsigned" => {
            let [inner] = checked(tag, rest, session)?;
            Expr::Unsigned(Box::new(parse_expr(inner, session)?))
        }
        _ => {
            warn!("dropping unknown operator tag `{tag}`");
            session.note_dropped();
            return None;
        }
    };
    Some(parsed)
}

/// Parse a statement list, skipping members that fail individually.
fn parse_each(elems: &[SExpr], session: &mut GenSession) -> Vec<Expr> {
    elems
        .iter()
        .filter_map(|e| parse_expr(e, session))
        .collect()
}

fn checked<'a, const N: usize>(
    tag: &str,
    rest: &'a [SExpr],
    session: &mut GenSession,
) -> Option<[&'a SExpr; N]> {
    if rest.len() != N {
        warn!(
            "dropping `{tag}` with {} operands (expected {N})",
            rest.len()
        );
        session.note_dropped();
        return None;
    }
    rest.iter().collect::<Vec<_>>().try_into().ok()
}

fn parse_width(tag: &str, width: &SExpr, session: &mut GenSession) -> Option<u8> {
    match width {
        SExpr::Int(v) if (0..=32).contains(v) => Some(*v as u8),
        other => {
            warn!("dropping `{tag}` with invalid width {other:?}");
            session.note_dropped();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dag(elems: Vec<(Option<&str>, DefNode)>) -> DefNode {
        DefNode::Dag {
            dag: elems
                .into_iter()
                .map(|(n, v)| DagElem(n.map(str::to_string), v))
                .collect(),
        }
    }

    #[test]
    fn tags_and_positional_values_collapse() {
        // (add $rs $rt) -> ["add", "rs", "rt"]
        let node = dag(vec![
            (None, DefNode::Str("add".into())),
            (None, DefNode::Str("$rs".into())),
            (None, DefNode::Str("$rt".into())),
        ]);
        assert_eq!(
            normalize(&node),
            SExpr::list([SExpr::sym("add"), SExpr::sym("rs"), SExpr::sym("rt")])
        );
    }

    #[test]
    fn named_elements_collapse_to_their_name() {
        let node = dag(vec![
            (None, DefNode::Str("set".into())),
            (Some("$dst"), DefNode::Int(7)),
            (None, DefNode::Int(1)),
        ]);
        assert_eq!(
            normalize(&node),
            SExpr::list([SExpr::sym("set"), SExpr::sym("dst"), SExpr::Int(1)])
        );
    }

    #[test]
    fn references_resolve_to_the_bare_name() {
        let node = dag(vec![
            (None, DefNode::Str("branch".into())),
            (
                None,
                DefNode::Ref {
                    target: "$target".into(),
                },
            ),
        ]);
        assert_eq!(
            normalize(&node),
            SExpr::list([SExpr::sym("branch"), SExpr::sym("target")])
        );
    }

    #[test]
    fn single_unnamed_children_collapse_to_their_value() {
        // (hi) -> "hi"
        let node = dag(vec![(None, DefNode::Str("hi".into()))]);
        assert_eq!(normalize(&node), SExpr::sym("hi"));

        // Nested grouping collapses all the way down.
        let node = dag(vec![(None, dag(vec![(None, DefNode::Int(3))]))]);
        assert_eq!(normalize(&node), SExpr::Int(3));
    }

    #[test]
    fn bare_state_symbols_become_dedicated_nodes() {
        let mut session = GenSession::new();
        let s = SExpr::list([SExpr::sym("add"), SExpr::sym("hi"), SExpr::sym("lo")]);
        let e = parse_expr(&s, &mut session).unwrap();
        assert_eq!(
            e,
            Expr::Op(OpKind::Add, Box::new(Expr::Hi), Box::new(Expr::Lo))
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let canon = SExpr::list([
            SExpr::sym("set"),
            SExpr::list([SExpr::sym("gpr"), SExpr::sym("rd")]),
            SExpr::list([SExpr::sym("add"), SExpr::sym("rs"), SExpr::Int(4)]),
        ]);
        assert_eq!(normalize(&DefNode::from(canon.clone())), canon);
    }

    #[test]
    fn parses_an_immediate_formula() {
        let mut session = GenSession::new();
        // (set (gpr rt) (add (gpr rs) (signext 16 imm)))
        let s = SExpr::list([
            SExpr::sym("set"),
            SExpr::list([SExpr::sym("gpr"), SExpr::sym("rt")]),
            SExpr::list([
                SExpr::sym("add"),
                SExpr::list([SExpr::sym("gpr"), SExpr::sym("rs")]),
                SExpr::list([SExpr::sym("signext"), SExpr::Int(16), SExpr::sym("imm")]),
            ]),
        ]);
        let e = parse_expr(&s, &mut session).unwrap();
        match e {
            Expr::Set(target, value) => {
                assert_eq!(*target, Expr::Gpr(Box::new(Expr::Sym("rt".into()))));
                match *value {
                    Expr::Op(OpKind::Add, _, ext) => {
                        assert_eq!(
                            *ext,
                            Expr::SignExt(16, Box::new(Expr::Sym("imm".into())))
                        );
                    }
                    other => panic!("unexpected value: {other:?}"),
                }
            }
            other => panic!("unexpected expr: {other:?}"),
        }
        assert_eq!(session.stats().dropped_nodes, 0);
    }

    #[test]
    fn pc_symbols_become_dedicated_nodes() {
        let mut session = GenSession::new();
        let s = SExpr::list([SExpr::sym("add"), SExpr::sym("pcd"), SExpr::Int(4)]);
        let e = parse_expr(&s, &mut session).unwrap();
        assert_eq!(
            e,
            Expr::Op(OpKind::Add, Box::new(Expr::Pcd), Box::new(Expr::Int(4)))
        );
    }

    #[test]
    fn unknown_tags_drop_without_killing_the_block() {
        let mut session = GenSession::new();
        let s = SExpr::list([
            SExpr::sym("block"),
            SExpr::list([SExpr::sym("frobnicate"), SExpr::Int(1)]),
            SExpr::list([SExpr::sym("syscall"), SExpr::Int(0)]),
        ]);
        let e = parse_expr(&s, &mut session).unwrap();
        assert_eq!(e, Expr::Block(vec![Expr::Syscall(Box::new(Expr::Int(0)))]));
        assert_eq!(session.stats().dropped_nodes, 1);
    }

    #[test]
    fn arity_violations_drop_the_node() {
        let mut session = GenSession::new();
        let s = SExpr::list([SExpr::sym("add"), SExpr::Int(1)]);
        assert!(parse_expr(&s, &mut session).is_none());
        assert_eq!(session.stats().dropped_nodes, 1);
    }
}

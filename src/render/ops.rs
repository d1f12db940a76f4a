// One operator-name table shared by both render backends. Each row maps an OpKind
// to its literal source spelling and to the JIT emission call that realizes it.
// The two composite operators are marked: nor renders as or plus complement, and
// the arithmetic shift needs signed reinterpretation in the literal backend. The
// backends read the same rows and diverge only in which column they use.

//! The shared operator algebra.

use crate::expr::OpKind;

/// One operator row: literal spelling and JIT emission entry point.
#[derive(Debug, Clone, Copy)]
pub struct OpSpec {
    pub kind: OpKind,
    pub infix: &'static str,
    pub jit: &'static str,
}

pub const OPS: &[OpSpec] = &[
    OpSpec { kind: OpKind::Add, infix: "+", jit: "jit_insn_add" },
    OpSpec { kind: OpKind::Sub, infix: "-", jit: "jit_insn_sub" },
    OpSpec { kind: OpKind::And, infix: "&", jit: "jit_insn_and" },
    OpSpec { kind: OpKind::Or, infix: "|", jit: "jit_insn_or" },
    // Realized as or plus complement by both backends.
    OpSpec { kind: OpKind::Nor, infix: "|", jit: "jit_insn_or" },
    OpSpec { kind: OpKind::Xor, infix: "^", jit: "jit_insn_xor" },
    OpSpec { kind: OpKind::Mul, infix: "*", jit: "jit_insn_mul" },
    OpSpec { kind: OpKind::Div, infix: "/", jit: "jit_insn_div" },
    OpSpec { kind: OpKind::Mod, infix: "%", jit: "jit_insn_rem" },
    OpSpec { kind: OpKind::Shl, infix: "<<", jit: "jit_insn_shl" },
    OpSpec { kind: OpKind::Shra, infix: ">>", jit: "jit_insn_sshr" },
    OpSpec { kind: OpKind::Shrl, infix: ">>", jit: "jit_insn_ushr" },
    OpSpec { kind: OpKind::Eq, infix: "==", jit: "jit_insn_eq" },
    OpSpec { kind: OpKind::Ge, infix: ">=", jit: "jit_insn_ge" },
    OpSpec { kind: OpKind::Gt, infix: ">", jit: "jit_insn_gt" },
    OpSpec { kind: OpKind::Le, infix: "<=", jit: "jit_insn_le" },
    OpSpec { kind: OpKind::Lt, infix: "<", jit: "jit_insn_lt" },
    OpSpec { kind: OpKind::Neq, infix: "!=", jit: "jit_insn_ne" },
];

/// Look up the row for an operator.
pub fn spec(kind: OpKind) -> &'static OpSpec {
    OPS.iter()
        .find(|s| s.kind == kind)
        .expect("operator table covers every OpKind")
}

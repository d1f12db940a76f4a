// This module knows the bit layout of every encoding shape and turns it into the
// minimal set of decode-time field extractions. Each encoding type maps to a fixed
// table of (field name, shift, mask) rows over the raw instruction word; the
// materializer emits a declaration for a row iff the field's name occurs in the
// instruction's dependency set, so untouched fields are never computed. The module
// also owns the secondary dispatch key rule: where in the word the function code is
// read from, which depends on the encoding type and is distinct from the field
// table itself.

//! Decoder field layouts and dependency-driven materialization.

use std::collections::BTreeSet;

use crate::expr::OpKind;
use crate::lower::ir::{Stmt, Term};
use crate::table::EncodingType;

/// Name of the raw instruction-word variable in the generated artifact.
pub const INST: &str = "inst";

/// One extractable bitfield: `(inst >> shift) & mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub shift: u32,
    pub mask: u32,
}

const fn field(name: &'static str, shift: u32, mask: u32) -> Field {
    Field { name, shift, mask }
}

const I_FIELDS: &[Field] = &[
    field("rs", 21, 0x1f),
    field("rt", 16, 0x1f),
    field("imm", 0, 0xffff),
];

const J_FIELDS: &[Field] = &[field("imm", 0, 0x3ff_ffff)];

const R_FIELDS: &[Field] = &[
    field("rs", 21, 0x1f),
    field("rt", 16, 0x1f),
    field("rd", 11, 0x1f),
    field("shamt", 6, 0x1f),
];

const S_FIELDS: &[Field] = &[field("code", 6, 0xf_ffff)];

const CF_FIELDS: &[Field] = &[
    field("cop", 26, 0x3),
    field("rt", 16, 0x1f),
    field("rd", 11, 0x1f),
    field("cofun", 0, 0x01ff_ffff),
];

/// The field layout of one encoding shape.
pub fn fields(encoding: EncodingType) -> &'static [Field] {
    match encoding {
        EncodingType::IType | EncodingType::RIType => I_FIELDS,
        EncodingType::JType => J_FIELDS,
        EncodingType::RType => R_FIELDS,
        EncodingType::SType => S_FIELDS,
        EncodingType::CFType => CF_FIELDS,
    }
}

impl Field {
    /// The extraction expression over the raw word.
    pub fn extract(&self) -> Term {
        let word = Term::sym(INST);
        let shifted = if self.shift == 0 {
            word
        } else {
            Term::op(OpKind::Shrl, word, Term::Int(self.shift as i64))
        };
        Term::op(OpKind::And, shifted, Term::Int(self.mask as i64))
    }
}

/// Emit extraction declarations for exactly the fields the formula uses.
pub fn materialize(encoding: EncodingType, deps: &BTreeSet<String>) -> Vec<Stmt> {
    fields(encoding)
        .iter()
        .filter(|f| deps.contains(f.name))
        .map(|f| Stmt::Decl {
            name: f.name.to_string(),
            value: f.extract(),
        })
        .collect()
}

/// Where a nested dispatch reads its function code from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLocation {
    /// Coprocessor opcodes key on bits 25:21.
    CopIndex,
    /// Register-immediate opcodes key on bits 20:16.
    RtIndex,
    /// Everything else keys on the low-order function field.
    Funct,
}

pub fn key_location(encoding: EncodingType) -> KeyLocation {
    match encoding {
        EncodingType::CFType => KeyLocation::CopIndex,
        EncodingType::RIType => KeyLocation::RtIndex,
        _ => KeyLocation::Funct,
    }
}

/// The secondary dispatch key expression for one encoding shape.
pub fn secondary_key(encoding: EncodingType) -> Term {
    let word = Term::sym(INST);
    match key_location(encoding) {
        KeyLocation::CopIndex => Term::op(
            OpKind::And,
            Term::op(OpKind::Shrl, word, Term::Int(21)),
            Term::Int(0x1f),
        ),
        KeyLocation::RtIndex => Term::op(
            OpKind::And,
            Term::op(OpKind::Shrl, word, Term::Int(16)),
            Term::Int(0x1f),
        ),
        KeyLocation::Funct => Term::op(OpKind::And, word, Term::Int(0x3f)),
    }
}

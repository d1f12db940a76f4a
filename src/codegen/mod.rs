// This module assembles the generated artifact. It walks the opcode table in
// ascending order and builds the dispatch tree: an outer switch on bits 31:26 of
// the raw word, with a nested switch per function-coded opcode whose key location
// comes from the entry's encoding type. Each leaf is the rendered lowering of one
// instruction. The final artifact is the do-not-edit banner, the verbatim runtime
// stub, and the decompile() wrapper whose body is the rendered tree falling
// through to a failure return when no case matches. Because the table iterates
// ordered maps and all label names come from the session counter, assembling the
// same table twice produces byte-identical text.

//! Dispatch-tree construction and artifact assembly.

use crate::core::GenSession;
use crate::decode::{self, INST};
use crate::expr::OpKind;
use crate::lower::ir::{Stmt, Term};
use crate::lower::lower_instruction;
use crate::render::{render_program, CodeWriter};
use crate::table::{OpcodeEntry, OpcodeTable};

/// Banner prepended to the generated file.
pub const ARTIFACT_BANNER: &str = "/* Autogenerated from the instruction table. DO NOT EDIT */";

/// Build the full dispatch tree over the opcode table.
pub fn dispatch_tree(table: &OpcodeTable, session: &mut GenSession) -> Stmt {
    let mut arms = Vec::new();
    for (opcode, entry) in table.entries() {
        let body = match entry {
            OpcodeEntry::Leaf(def) => lower_instruction(def, session),
            OpcodeEntry::Table { encoding, map } => {
                let sub = map
                    .iter()
                    .map(|(funct, def)| (*funct as u32, lower_instruction(def, session)))
                    .collect();
                vec![Stmt::Switch {
                    key: decode::secondary_key(*encoding),
                    arms: sub,
                }]
            }
        };
        arms.push((opcode as u32, body));
    }
    Stmt::Switch {
        key: Term::op(OpKind::Shrl, Term::sym(INST), Term::Int(26)),
        arms,
    }
}

/// Render the dispatch tree as the body of the decompile function.
pub fn render_dispatch(table: &OpcodeTable, session: &mut GenSession) -> String {
    let tree = dispatch_tree(table, session);
    let mut w = CodeWriter::with_indent(1);
    render_program(std::slice::from_ref(&tree), session, &mut w);
    w.finish()
}

/// Assemble the complete generated source file.
pub fn assemble_artifact(table: &OpcodeTable, stub: &str, session: &mut GenSession) -> String {
    let body = render_dispatch(table, session);
    format!(
        "{ARTIFACT_BANNER}\n{stub}\n\
         bool decompile(jit_function_t func, jit_value_t state, uint32_t pc, uint32_t inst, \
         bool &branched) {{\n{body}\treturn false;\n}}\n"
    )
}

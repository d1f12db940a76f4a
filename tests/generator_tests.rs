//! End-to-end generation scenarios.
//!
//! These tests drive the whole pipeline (canonical formula in, generated
//! source text out) over small hand-built instruction sets and pin the
//! properties the artifact has to keep: minimal field extraction, dispatch
//! partitioning, the zero-register guard, branch-flag ordering, and
//! byte-identical output across runs and cache round-trips.

use decompgen::codegen::{assemble_artifact, render_dispatch};
use decompgen::core::GenSession;
use decompgen::table::cache::CacheEntry;
use decompgen::{BuildError, EncodingType, InstructionDef, OpcodeTable, SExpr};

fn sym(name: &str) -> SExpr {
    SExpr::sym(name)
}

fn list(elems: Vec<SExpr>) -> SExpr {
    SExpr::List(elems)
}

fn gpr(name: &str) -> SExpr {
    list(vec![sym("gpr"), sym(name)])
}

fn def(
    name: &str,
    encoding: EncodingType,
    opcode: u8,
    funct: Option<u16>,
    canon: SExpr,
    session: &mut GenSession,
) -> InstructionDef {
    InstructionDef::from_canon(
        name.to_string(),
        encoding,
        opcode,
        funct,
        format!("{} ...", name.to_lowercase()),
        canon,
        session,
    )
    .unwrap()
}

/// ADD: RType, opcode 0, function 0x20, rd = overflow-checked rs + rt.
fn add_canon() -> SExpr {
    list(vec![
        sym("block"),
        list(vec![
            sym("check_overflow"),
            list(vec![sym("add"), gpr("rs"), gpr("rt")]),
        ]),
        list(vec![
            sym("set"),
            gpr("rd"),
            list(vec![sym("add"), gpr("rs"), gpr("rt")]),
        ]),
    ])
}

/// ADDI: IType, opcode 0x08, no function code, rt = rs + signext(imm).
fn addi_canon() -> SExpr {
    list(vec![
        sym("set"),
        gpr("rt"),
        list(vec![
            sym("add"),
            gpr("rs"),
            list(vec![sym("signext"), SExpr::Int(16), sym("imm")]),
        ]),
    ])
}

/// BEQ-like conditional branch: when rs == rt, branch to pcd + imm.
fn beq_canon() -> SExpr {
    list(vec![
        sym("when"),
        list(vec![sym("eq"), gpr("rs"), gpr("rt")]),
        list(vec![
            sym("branch"),
            list(vec![sym("add"), sym("pcd"), sym("imm")]),
        ]),
    ])
}

#[test]
fn plain_register_instruction_materializes_only_its_fields() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = GenSession::new();
    let table = OpcodeTable::build(vec![def(
        "ADD",
        EncodingType::RType,
        0x00,
        Some(0x20),
        add_canon(),
        &mut session,
    )])
    .unwrap();

    let out = render_dispatch(&table, &mut session);
    assert!(out.contains("uint32_t rs = ((inst) >> (0x15)) & (0x1f);"));
    assert!(out.contains("uint32_t rt = ((inst) >> (0x10)) & (0x1f);"));
    assert!(out.contains("uint32_t rd = ((inst) >> (0xb)) & (0x1f);"));
    assert!(!out.contains("shamt"), "unreferenced field was materialized");

    // The register store sits behind the zero-register guard.
    assert!(out.contains("if((rd) != (0x0)) {"));
    assert!(out.contains("call_overflow(func, "));
    let guard = out.find("if((rd) != (0x0))").unwrap();
    let store = out.rfind("jit_insn_store_relative(func, jit_insn_add(func, state,").unwrap();
    assert!(store > guard, "store is outside the guard");
}

#[test]
fn immediate_instruction_binds_as_a_direct_leaf() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = GenSession::new();
    let table = OpcodeTable::build(vec![def(
        "ADDI",
        EncodingType::IType,
        0x08,
        None,
        addi_canon(),
        &mut session,
    )])
    .unwrap();

    let out = render_dispatch(&table, &mut session);
    // Leaf at 0x8: no nested switch inside the case body.
    let case = out.find("case 0x8: {").expect("missing opcode case");
    let body = &out[case..];
    assert!(body.contains("/* ADDI */"));
    assert_eq!(body.matches("switch(").count(), 0);

    assert!(out.contains("uint32_t rs = ((inst) >> (0x15)) & (0x1f);"));
    assert!(out.contains("uint32_t rt = ((inst) >> (0x10)) & (0x1f);"));
    assert!(out.contains("uint32_t imm = (inst) & (0xffff);"));
    assert!(!out.contains("shamt"));
    assert!(out.contains("call_signext(func, 16, "));
}

#[test]
fn opcode_collision_fails_before_any_output() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = GenSession::new();
    let first = def(
        "ADDI",
        EncodingType::IType,
        0x08,
        None,
        addi_canon(),
        &mut session,
    );
    let second = def(
        "ADDI_DUP",
        EncodingType::IType,
        0x08,
        None,
        addi_canon(),
        &mut session,
    );
    let err = OpcodeTable::build(vec![first, second]).unwrap_err();
    assert!(matches!(err, BuildError::DuplicateOpcode { opcode: 0x08, .. }));
}

#[test]
fn conditional_branch_orders_flag_after_all_effects() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = GenSession::new();
    let table = OpcodeTable::build(vec![def(
        "BEQ",
        EncodingType::IType,
        0x04,
        None,
        beq_canon(),
        &mut session,
    )])
    .unwrap();

    let out = render_dispatch(&table, &mut session);
    let branch_call = out.find("call_branch(func, ").expect("missing branch call");
    let guard = out
        .find("jit_insn_branch_if_not(func, ")
        .expect("branch is not guarded");
    let flag = out.find("branched = true;").expect("missing flag assignment");
    let ret = out.find("return true;").expect("missing success return");

    assert!(guard < branch_call, "guard must precede the branch call");
    assert!(branch_call < flag, "flag must follow the branch call");
    assert!(flag < ret, "flag must precede the success return");
    assert_eq!(out.matches("branched = true;").count(), 1);
}

#[test]
fn unconditionally_branchless_instructions_skip_the_flag() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = GenSession::new();
    let table = OpcodeTable::build(vec![def(
        "ADDI",
        EncodingType::IType,
        0x08,
        None,
        addi_canon(),
        &mut session,
    )])
    .unwrap();
    let out = render_dispatch(&table, &mut session);
    assert!(!out.contains("branched = true;"));
}

#[test]
fn generation_is_byte_identical_across_runs_and_cache_round_trips() {
    let _ = env_logger::builder().is_test(true).try_init();

    let build = |session: &mut GenSession| {
        OpcodeTable::build(vec![
            def("ADD", EncodingType::RType, 0x00, Some(0x20), add_canon(), session),
            def("ADDI", EncodingType::IType, 0x08, None, addi_canon(), session),
            def("BEQ", EncodingType::IType, 0x04, None, beq_canon(), session),
        ])
        .unwrap()
    };

    let mut s1 = GenSession::new();
    let table = build(&mut s1);
    let first = assemble_artifact(&table, "/* stub */", &mut s1);

    let mut s2 = GenSession::new();
    let table = build(&mut s2);
    let second = assemble_artifact(&table, "/* stub */", &mut s2);
    assert_eq!(first, second, "repeated runs diverged");

    // Round-trip every definition through the serialized cache form.
    let mut s3 = GenSession::new();
    let defs = vec![
        def("ADD", EncodingType::RType, 0x00, Some(0x20), add_canon(), &mut s3),
        def("ADDI", EncodingType::IType, 0x08, None, addi_canon(), &mut s3),
        def("BEQ", EncodingType::IType, 0x04, None, beq_canon(), &mut s3),
    ];
    let entries: Vec<CacheEntry> = defs.iter().map(CacheEntry::from_def).collect();
    let text = serde_json::to_string(&entries).unwrap();
    let reloaded: Vec<CacheEntry> = serde_json::from_str(&text).unwrap();
    let defs: Vec<InstructionDef> = reloaded
        .into_iter()
        .map(|e| e.into_def(&mut s3).unwrap())
        .collect();
    let table = OpcodeTable::build(defs).unwrap();
    let third = assemble_artifact(&table, "/* stub */", &mut s3);
    assert_eq!(first, third, "cache round-trip diverged");
}

#[test]
fn unknown_tags_compile_to_incomplete_but_valid_output() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = GenSession::new();
    let canon = list(vec![
        sym("block"),
        list(vec![sym("mystery_op"), sym("rs")]),
        list(vec![sym("set"), gpr("rt"), gpr("rs")]),
    ]);
    let table = OpcodeTable::build(vec![def(
        "ODD",
        EncodingType::IType,
        0x09,
        None,
        canon,
        &mut session,
    )])
    .unwrap();

    let out = render_dispatch(&table, &mut session);
    assert!(out.contains("return true;"), "instruction stopped compiling");
    assert!(out.contains("if((rt) != (0x0)) {"));
    assert_eq!(session.stats().dropped_nodes, 1);
}

//! The recursive schema compiler.
//!
//! Walks a `SchemaNode` and emits the statement tree that checks one document
//! node against it. Dispatch order is fixed: `$ref` short-circuits, then
//! `type`, the object facet, the array facet, composition, `enum`. A block
//! that runs off its end means the subtree is satisfied; every failing check
//! returns out of the enclosing predicate early.
//!
//! Context discipline:
//! - `Ctx` is an immutable value; every descent builds a copy with depth+1
//!   and a fresh variable name, never a shared mutation.
//! - composition branches compile against an isolated context (`node`,
//!   depth 0) and fail silently; only reporting contexts call `boom`.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::ir::{Block, Stmt};
use crate::schema::{Composition, Items, SchemaNode, TypeTag};

// ------------------------------- Errors ----------------------------------- //

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unresolved $ref `{0}` (no matching definitions entry)")]
    UnresolvedRef(String),
    #[error("definitions entry `{key}` sanitizes to `{ident}`, which is already taken")]
    DuplicateDefinition { key: String, ident: String },
    #[error("tuple-style `items` is not supported; use a single item schema")]
    TupleItems,
}

// ------------------------------- Context ---------------------------------- //

/// Per-call compile state. Copied on every descent; callees cannot leak
/// mutations back into the parent scope.
#[derive(Debug, Clone)]
pub struct Ctx {
    /// Name of the document-node variable the emitted checks read.
    pub var: String,
    pub depth: usize,
    /// Whether failing checks may call the diagnostic reporter.
    pub report: bool,
}

impl Ctx {
    pub fn top(var: &str) -> Self {
        Self {
            var: var.to_string(),
            depth: 0,
            report: true,
        }
    }

    /// One scope deeper: object property or array item.
    pub fn child(&self) -> Self {
        Self {
            var: format!("n_{}", self.depth + 1),
            depth: self.depth + 1,
            report: self.report,
        }
    }

    /// Isolated context for a composition branch closure. Branches are
    /// speculative, so they never report.
    pub fn branch(&self) -> Self {
        Self {
            var: "node".to_string(),
            depth: 0,
            report: false,
        }
    }
}

// --------------------------- Definition table ----------------------------- //

pub const REF_PREFIX: &str = "#/definitions/";

static IDENT_CLEANUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^[0-9])|[^0-9A-Za-z]").expect("identifier cleanup pattern"));

/// Deterministic function identifier for a definitions key.
pub fn definition_ident(key: &str) -> String {
    format!("v_{}", IDENT_CLEANUP.replace_all(key, "_"))
}

/// Reference path → generated predicate identifier. Built once, before any
/// body is compiled, so definitions may reference each other in any order.
/// Read-only afterwards.
#[derive(Debug, Default)]
pub struct DefinitionTable {
    entries: IndexMap<String, String>,
}

impl DefinitionTable {
    pub fn build(root: &SchemaNode) -> Result<Self, CompileError> {
        let mut entries = IndexMap::new();
        for key in root.definitions.keys() {
            let ident = definition_ident(key);
            if entries.values().any(|taken| taken == &ident) {
                return Err(CompileError::DuplicateDefinition {
                    key: key.clone(),
                    ident,
                });
            }
            entries.insert(format!("{REF_PREFIX}{key}"), ident);
        }
        Ok(Self { entries })
    }

    pub fn resolve(&self, reference: &str) -> Option<&str> {
        self.entries.get(reference).map(String::as_str)
    }

    pub fn resolve_key(&self, key: &str) -> Option<&str> {
        self.resolve(&format!("{REF_PREFIX}{key}"))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One compiled `definitions` entry, ready for emission.
#[derive(Debug)]
pub struct CompiledDefinition {
    pub ident: String,
    pub body: Block,
}

/// Compile every definitions entry against an already-built table. Runs to
/// completion before the root body so `$ref` call sites always resolve.
pub fn compile_definitions(
    root: &SchemaNode,
    defs: &DefinitionTable,
) -> Result<Vec<CompiledDefinition>, CompileError> {
    let mut out = Vec::with_capacity(root.definitions.len());
    for (key, schema) in &root.definitions {
        let ident = defs
            .resolve_key(key)
            .map(str::to_string)
            .ok_or_else(|| CompileError::UnresolvedRef(format!("{REF_PREFIX}{key}")))?;
        let ctx = Ctx::top("n");
        let body = compile_node(schema, &ctx, defs)?;
        out.push(CompiledDefinition { ident, body });
    }
    Ok(out)
}

// ----------------------------- Node compiler ------------------------------ //

pub fn compile_node(
    node: &SchemaNode,
    ctx: &Ctx,
    defs: &DefinitionTable,
) -> Result<Block, CompileError> {
    let mut block = Block::new();

    // All other facets on a `$ref` node are ignored.
    if let Some(reference) = &node.reference {
        let ident = defs
            .resolve(reference)
            .ok_or_else(|| CompileError::UnresolvedRef(reference.clone()))?;
        block.push(Stmt::Line(format!(
            "if (! definition::{ident}({})) {{ return false; }}",
            ctx.var
        )));
        return Ok(block);
    }

    if let Some(tags) = &node.types {
        // A tag set names alternatives: the instance satisfies any one of them.
        let cond = tags
            .iter()
            .map(|tag| format!("{}.{}()", ctx.var, tag.predicate()))
            .collect::<Vec<_>>()
            .join(" || ");
        block.push(Stmt::Line(format!(
            "if (!({cond})) {{ return false; }}; // type check"
        )));
    }

    if let Some(object) = &node.object {
        if node.could_be(TypeTag::Object) {
            let mut body = Block::new();
            if !object.required.is_empty() {
                body.push(Stmt::Comment("check required key(s)".into()));
                let keys = object
                    .required
                    .iter()
                    .map(|key| format!("\"{key}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                body.push(Stmt::ForEach {
                    binding: "auto key".into(),
                    range: format!("{{ {keys} }}"),
                    body: vec![Stmt::If {
                        cond: format!("!{}[key]", ctx.var),
                        body: vec![Stmt::Line(fail(ctx, node, "required key missing"))],
                    }],
                });
            }
            if !object.properties.is_empty() {
                body.push(Stmt::Comment("check properties".into()));
                for (key, schema) in &object.properties {
                    let child = ctx.child();
                    let mut checks = vec![Stmt::Line(format!(
                        "auto {} = {}[\"{key}\"];",
                        child.var, ctx.var
                    ))];
                    checks.extend(compile_node(schema, &child, defs)?);
                    // absent keys are governed by `required` alone
                    body.push(Stmt::If {
                        cond: format!("{}[\"{key}\"]", ctx.var),
                        body: checks,
                    });
                }
            }
            if !body.is_empty() {
                if node.must_be(TypeTag::Object) {
                    block.extend(body);
                } else {
                    block.push(Stmt::If {
                        cond: format!("{}.IsMap()", ctx.var),
                        body,
                    });
                }
            }
        }
    }

    if let Some(array) = &node.array {
        if node.could_be(TypeTag::Array) {
            let mut body = Block::new();
            if let Some(count) = array.min_items {
                body.push(Stmt::Line(format!(
                    "if ({var}.IsSequence() && {var}.size() < {count}) {{ {fail} }}",
                    var = ctx.var,
                    fail = fail(ctx, node, "minItems")
                )));
            }
            if let Some(count) = array.max_items {
                body.push(Stmt::Line(format!(
                    "if ({var}.IsSequence() && {var}.size() > {count}) {{ {fail} }}",
                    var = ctx.var,
                    fail = fail(ctx, node, "maxItems")
                )));
            }
            match &array.items {
                None => {}
                Some(Items::Single(item)) => {
                    let child = ctx.child();
                    body.push(Stmt::Comment("check items".into()));
                    body.push(Stmt::ForEach {
                        binding: format!("const auto & {}", child.var),
                        range: ctx.var.clone(),
                        body: compile_node(item, &child, defs)?,
                    });
                }
                Some(Items::Tuple(_)) => return Err(CompileError::TupleItems),
            }
            if !body.is_empty() {
                if node.must_be(TypeTag::Array) {
                    block.extend(body);
                } else {
                    block.push(Stmt::If {
                        cond: format!("{}.IsSequence()", ctx.var),
                        body,
                    });
                }
            }
        }
    }

    if let Some(composition) = &node.composition {
        let (tag, schemas) = match composition {
            Composition::OneOf(schemas) => ("oneOf", schemas),
            Composition::AnyOf(schemas) => ("anyOf", schemas),
        };
        block.push(Stmt::Comment(tag.into()));
        let branch_ctx = ctx.branch();
        let mut arms = Vec::with_capacity(schemas.len());
        for schema in schemas {
            arms.push(compile_node(schema, &branch_ctx, defs)?);
        }
        block.push(Stmt::BranchTable { arms });
        match composition {
            Composition::AnyOf(_) => {
                block.push(Stmt::Line(format!(
                    "if (! std::any_of(branches.begin(), branches.end(), [&] (const Validator & v) {{ return v({var}); }})) {{ {fail} }}",
                    var = ctx.var,
                    fail = fail(ctx, node, "any_of")
                )));
            }
            Composition::OneOf(_) => {
                block.push(Stmt::Line("size_t count = 0;".into()));
                // a second match bails with no diagnostic
                block.push(Stmt::ForEach {
                    binding: "const auto & v".into(),
                    range: "branches".into(),
                    body: vec![Stmt::Line(format!(
                        "if (v({}) && ++count > 1) {{ return false; }}",
                        ctx.var
                    ))],
                });
                block.push(Stmt::If {
                    cond: "count == 0".into(),
                    body: vec![Stmt::Line(fail(ctx, node, "oneOf"))],
                });
            }
        }
    }

    if let Some(literals) = &node.enumeration {
        let table = literals
            .iter()
            .map(|lit| format!("YAML::Load(R\"lit({})lit\")", lit.text()))
            .collect::<Vec<_>>()
            .join(", ");
        block.push(Stmt::Line(format!(
            "static std::array<YAML::Node, {}> values = {{{table}}};",
            literals.len()
        )));
        // no reason attached: enum mismatches fail without a diagnostic
        block.push(Stmt::Line(format!(
            "if (! std::any_of(values.begin(), values.end(), [&] (const YAML::Node & enum_node) -> bool {{ return equal(enum_node, {}); }})) {{ return false; }}",
            ctx.var
        )));
    }

    Ok(block)
}

fn fail(ctx: &Ctx, node: &SchemaNode, reason: &str) -> String {
    if ctx.report {
        format!(
            "return boom({}, {}, \"{reason}\");",
            ctx.var,
            description_of(node)
        )
    } else {
        "return false;".to_string()
    }
}

fn description_of(node: &SchemaNode) -> String {
    match &node.description {
        Some(text) => format!("R\"msg({text})msg\""),
        None => "\"No description available\"".to_string(),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir;

    fn parse(src: &str) -> SchemaNode {
        let doc: serde_yaml::Value = serde_yaml::from_str(src).unwrap();
        SchemaNode::from_document(&doc).unwrap()
    }

    fn emit(src: &str) -> String {
        let root = parse(src);
        let defs = DefinitionTable::build(&root).unwrap();
        ir::render(&compile_node(&root, &Ctx::top("n_0"), &defs).unwrap(), 1)
    }

    fn emit_err(src: &str) -> CompileError {
        let root = parse(src);
        let defs = DefinitionTable::build(&root).unwrap();
        compile_node(&root, &Ctx::top("n_0"), &defs).unwrap_err()
    }

    #[test]
    fn single_type_emits_one_predicate() {
        let text = emit("type: string");
        assert_eq!(
            text,
            "  if (!(n_0.IsScalar())) { return false; }; // type check\n"
        );
    }

    #[test]
    fn type_set_accepts_any_member() {
        let text = emit("type: [string, number]");
        assert!(text.contains("if (!(n_0.IsScalar() || n_0.IsNumber())) { return false; };"));
    }

    #[test]
    fn required_keys_fail_fast_with_reason() {
        let text = emit(
            r#"
type: object
description: a widget
required: [name, id]
"#,
        );
        assert!(text.contains("for ( auto key : { \"name\", \"id\" } ) {"));
        assert!(text.contains("if (!n_0[key]) {"));
        assert!(text.contains("return boom(n_0, R\"msg(a widget)msg\", \"required key missing\");"));
    }

    #[test]
    fn properties_descend_one_scope_per_level() {
        let text = emit(
            r#"
type: object
properties:
  name: { type: string }
"#,
        );
        // exactly object: no runtime IsMap guard
        assert!(!text.contains("if (n_0.IsMap())"));
        assert!(text.contains("if (n_0[\"name\"]) {"));
        assert!(text.contains("auto n_1 = n_0[\"name\"];"));
        assert!(text.contains("if (!(n_1.IsScalar())) { return false; }; // type check"));
    }

    #[test]
    fn untyped_object_checks_are_guarded() {
        let text = emit("required: [name]");
        assert!(text.contains("if (n_0.IsMap()) {"));
    }

    #[test]
    fn object_checks_skipped_when_type_excludes_object() {
        let text = emit(
            r#"
type: string
required: [name]
"#,
        );
        assert!(!text.contains("IsMap"));
        assert!(!text.contains("required"));
    }

    #[test]
    fn size_bounds_report_distinct_reasons() {
        let text = emit(
            r#"
type: array
minItems: 2
maxItems: 3
"#,
        );
        assert!(text.contains(
            "if (n_0.IsSequence() && n_0.size() < 2) { return boom(n_0, \"No description available\", \"minItems\"); }"
        ));
        assert!(text.contains(
            "if (n_0.IsSequence() && n_0.size() > 3) { return boom(n_0, \"No description available\", \"maxItems\"); }"
        ));
    }

    #[test]
    fn items_loop_binds_a_fresh_variable() {
        let text = emit(
            r#"
type: array
items: { type: number }
"#,
        );
        assert!(text.contains("for ( const auto & n_1 : n_0 ) {"));
        assert!(text.contains("if (!(n_1.IsNumber())) { return false; }; // type check"));
    }

    #[test]
    fn tuple_items_fail_closed() {
        let err = emit_err("items: [{ type: string }, { type: number }]");
        assert!(matches!(err, CompileError::TupleItems));
    }

    #[test]
    fn any_of_reports_when_no_branch_matches() {
        let text = emit(
            r#"
anyOf:
  - { type: string }
  - { type: number }
"#,
        );
        assert!(text.contains("// anyOf"));
        assert!(text.contains("std::array<Validator, 2> branches = {"));
        assert!(text.contains(
            "if (! std::any_of(branches.begin(), branches.end(), [&] (const Validator & v) { return v(n_0); })) { return boom(n_0, \"No description available\", \"any_of\"); }"
        ));
    }

    #[test]
    fn one_of_counts_matches_and_keeps_the_asymmetry() {
        let text = emit(
            r#"
oneOf:
  - { type: string }
  - { type: number }
"#,
        );
        assert!(text.contains("size_t count = 0;"));
        // more than one match bails silently
        assert!(text.contains("if (v(n_0) && ++count > 1) { return false; }"));
        // zero matches report
        assert!(text.contains("if (count == 0) {"));
        assert!(text.contains("return boom(n_0, \"No description available\", \"oneOf\");"));
    }

    #[test]
    fn branch_closures_never_report() {
        let text = emit(
            r#"
oneOf:
  - type: object
    required: [name]
  - { type: number }
"#,
        );
        // the required check inside the branch fails silently
        let arm = text
            .split("[] (const YAML::Node & node) -> bool {")
            .nth(1)
            .unwrap();
        let arm = arm.split("},").next().unwrap();
        assert!(arm.contains("for ( auto key : { \"name\" } ) {"));
        assert!(arm.contains("return false;"));
        assert!(!arm.contains("boom"));
        // branches rebind the shared closure parameter
        assert!(arm.contains("!node[key]"));
    }

    #[test]
    fn enum_builds_a_static_table_compared_with_equal() {
        let text = emit("enum: [up, down]");
        assert!(text.contains(
            "static std::array<YAML::Node, 2> values = {YAML::Load(R\"lit(up)lit\"), YAML::Load(R\"lit(down)lit\")};"
        ));
        assert!(text.contains("return equal(enum_node, n_0);"));
        // gap preserved: no reason, no boom
        assert!(!text.contains("boom"));
    }

    #[test]
    fn ref_short_circuits_every_sibling_facet() {
        let text = emit(
            r##"
definitions:
  item: { type: string }
$ref: "#/definitions/item"
type: object
required: [ignored]
"##,
        );
        assert_eq!(text, "  if (! definition::v_item(n_0)) { return false; }\n");
    }

    #[test]
    fn unresolved_ref_is_an_error() {
        let err = emit_err(r##"$ref: "#/definitions/missing""##);
        assert!(matches!(err, CompileError::UnresolvedRef(path) if path == "#/definitions/missing"));
    }

    #[test]
    fn definition_idents_are_sanitized() {
        assert_eq!(definition_ident("item"), "v_item");
        assert_eq!(definition_ident("foo-bar.baz"), "v_foo_bar_baz");
        assert_eq!(definition_ident("2nd"), "v__nd");
    }

    #[test]
    fn sanitization_collisions_fail_loudly() {
        let root = parse(
            r#"
definitions:
  a-b: { type: string }
  a_b: { type: number }
"#,
        );
        let err = DefinitionTable::build(&root).unwrap_err();
        assert!(
            matches!(err, CompileError::DuplicateDefinition { ident, .. } if ident == "v_a_b")
        );
    }

    #[test]
    fn definitions_resolve_in_any_order() {
        let root = parse(
            r##"
definitions:
  outer:
    type: array
    items: { $ref: "#/definitions/inner" }
  inner: { type: string }
"##,
        );
        let defs = DefinitionTable::build(&root).unwrap();
        let compiled = compile_definitions(&root, &defs).unwrap();
        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled[0].ident, "v_outer");
        let outer = ir::render(&compiled[0].body, 1);
        // forward reference resolved through the pre-built table
        assert!(outer.contains("if (! definition::v_inner(n_1)) { return false; }"));
        // definition bodies start from the shared parameter at depth zero
        assert!(outer.contains("for ( const auto & n_1 : n ) {"));
    }

    #[test]
    fn nested_scopes_nest_the_emitted_code() {
        let text = emit(
            r#"
type: object
properties:
  tags:
    type: array
    minItems: 1
    items: { type: string }
"#,
        );
        assert!(text.contains("  if (n_0[\"tags\"]) {\n    auto n_1 = n_0[\"tags\"];\n"));
        assert!(text.contains("    if (!(n_1.IsSequence())) { return false; }; // type check\n"));
        assert!(text.contains("    if (n_1.IsSequence() && n_1.size() < 1)"));
        assert!(text.contains("    for ( const auto & n_2 : n_1 ) {\n"));
        assert!(text.contains("      if (!(n_2.IsScalar())) { return false; }; // type check\n"));
    }
}

// Statement tree for the emitted validator code. No raw indentation here:
// the printer below owns every indent decision, so nesting correctness is
// its property alone.

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone)]
pub enum Stmt {
    /// One complete statement, emitted verbatim on its own line.
    Line(String),
    Comment(String),
    If { cond: String, body: Block },
    ForEach { binding: String, range: String, body: Block },
    /// `std::array<Validator, N>` of non-capturing branch closures; each arm
    /// falls through to `return true;`.
    BranchTable { arms: Vec<Block> },
}

const INDENT: &str = "  ";

/// Render a block with `depth` levels of indent on its outermost statements.
pub fn render(block: &Block, depth: usize) -> String {
    let mut out = String::new();
    render_into(block, depth, &mut out);
    out
}

fn render_into(block: &Block, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    for stmt in block {
        match stmt {
            Stmt::Line(text) => {
                out.push_str(&pad);
                out.push_str(text);
                out.push('\n');
            }
            Stmt::Comment(text) => {
                out.push_str(&format!("{pad}// {text}\n"));
            }
            Stmt::If { cond, body } => {
                out.push_str(&format!("{pad}if ({cond}) {{\n"));
                render_into(body, depth + 1, out);
                out.push_str(&format!("{pad}}}\n"));
            }
            Stmt::ForEach { binding, range, body } => {
                out.push_str(&format!("{pad}for ( {binding} : {range} ) {{\n"));
                render_into(body, depth + 1, out);
                out.push_str(&format!("{pad}}}\n"));
            }
            Stmt::BranchTable { arms } => {
                out.push_str(&format!(
                    "{pad}std::array<Validator, {}> branches = {{\n",
                    arms.len()
                ));
                for arm in arms {
                    out.push_str(&format!(
                        "{pad}{INDENT}[] (const YAML::Node & node) -> bool {{\n"
                    ));
                    render_into(arm, depth + 2, out);
                    out.push_str(&format!("{pad}{INDENT}{INDENT}return true;\n"));
                    out.push_str(&format!("{pad}{INDENT}}},\n"));
                }
                out.push_str(&format!("{pad}}};\n"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_indents_one_unit_per_scope() {
        let block = vec![Stmt::If {
            cond: "n.IsMap()".into(),
            body: vec![Stmt::ForEach {
                binding: "auto key".into(),
                range: "{ \"a\" }".into(),
                body: vec![Stmt::Line("return false;".into())],
            }],
        }];
        let text = render(&block, 1);
        assert_eq!(
            text,
            "  if (n.IsMap()) {\n    for ( auto key : { \"a\" } ) {\n      return false;\n    }\n  }\n"
        );
    }

    #[test]
    fn branch_table_arms_close_with_return_true() {
        let block = vec![Stmt::BranchTable {
            arms: vec![vec![Stmt::Line(
                "if (!(node.IsScalar())) { return false; };".into(),
            )]],
        }];
        let text = render(&block, 1);
        assert!(text.starts_with("  std::array<Validator, 1> branches = {\n"));
        assert!(text.contains("    [] (const YAML::Node & node) -> bool {\n"));
        assert!(text.contains("      if (!(node.IsScalar())) { return false; };\n"));
        assert!(text.contains("      return true;\n    },\n"));
        assert!(text.ends_with("  };\n"));
    }

    #[test]
    fn comments_render_at_scope_depth() {
        let block = vec![
            Stmt::Comment("check properties".into()),
            Stmt::If {
                cond: "x".into(),
                body: vec![Stmt::Comment("inner".into())],
            },
        ];
        assert_eq!(
            render(&block, 0),
            "// check properties\nif (x) {\n  // inner\n}\n"
        );
    }
}

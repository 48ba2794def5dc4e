//! Artifact assembly: one declaration artifact (header) and one definition
//! artifact (source) per run. Everything is built in memory; callers decide
//! when (and whether) the text reaches the filesystem.

use crate::compile::{
    compile_definitions, compile_node, CompileError, Ctx, DefinitionTable,
};
use crate::ir;
use crate::schema::SchemaNode;

#[derive(Debug)]
pub struct Artifacts {
    pub header: String,
    pub source: String,
}

pub struct Codegen {
    class_name: String,
    header_name: String,
}

const BOOM_HELPER: &str = r#"bool boom(const YAML::Node & node, std::string_view desc, std::string_view reason) {
  std::cout << "Validation of " << desc << " failed: " << reason << " at line " << node.Mark().line << std::endl;
  return false;
}

"#;

impl Codegen {
    pub fn new(class_name: &str, header_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            header_name: header_name.to_string(),
        }
    }

    pub fn generate(&self, root: &SchemaNode) -> Result<Artifacts, CompileError> {
        let defs = DefinitionTable::build(root)?;
        let compiled = compile_definitions(root, &defs)?;
        let root_body = compile_node(root, &Ctx::top("n_0"), &defs)?;

        let mut source = String::new();
        source.push_str(
            "#include <functional>\n#include <array>\n#include <algorithm>\n#include <iostream>\n#include <string_view>\n\n",
        );
        source.push_str(&format!("#include \"{}\"\n\n", self.header_name));
        source.push_str("using Validator = std::function<bool (const YAML::Node &)>;\n\n");
        source.push_str("extern bool equal(const YAML::Node &, const YAML::Node &);\n\n");
        source.push_str(BOOM_HELPER);

        if !defs.is_empty() {
            source.push_str("namespace definition {\n\n");
            // prototypes first: definitions may call each other in any order
            for def in &compiled {
                source.push_str(&format!("bool {} (const YAML::Node & n);\n", def.ident));
            }
            source.push('\n');
            for def in &compiled {
                source.push_str(&format!("bool {} (const YAML::Node & n) {{\n", def.ident));
                source.push_str(&ir::render(&def.body, 1));
                source.push_str("  return true;\n}\n\n");
            }
            source.push_str("} // definition\n\n");
        }

        source.push_str(&format!(
            "bool {}::operator()(const YAML::Node & n_0) {{\n",
            self.class_name
        ));
        source.push_str(&ir::render(&root_body, 1));
        source.push_str("  return true;\n}\n");

        let mut header = String::new();
        header.push_str("#include \"yaml-cpp/yaml.h\"\n\n");
        header.push_str(&format!(
            "class {} {{\npublic:\n  bool operator()(const YAML::Node & n);\n}};\n",
            self.class_name
        ));

        Ok(Artifacts { header, source })
    }
}

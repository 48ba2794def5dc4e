//! CLI: compile one schema document into C++ validator artifacts.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile a YAML/JSON validation schema into a C++ validator class
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// The input schema file (YAML, or JSON with a .json extension)
    schema: PathBuf,

    /// The header file to be generated (defaults to <schema stem>.h)
    #[arg(long)]
    header: Option<PathBuf>,

    /// The source file to be generated (defaults to <schema stem>.cc)
    #[arg(long)]
    source: Option<PathBuf>,

    /// The name of the validator class (defaults to the schema stem)
    #[arg(long = "class")]
    classname: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        let stem = schema_stem(&self.schema);
        let classname = self.classname.clone().unwrap_or_else(|| stem.clone());
        let header = self
            .header
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{stem}.h")));
        let source = self
            .source
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{stem}.cc")));

        println!(
            "Processing {} to {},{} in class {}",
            self.schema.display(),
            header.display(),
            source.display(),
            classname
        );

        let document = crate::load::document_from_path(&self.schema)?;
        let root = crate::schema::SchemaNode::from_document(&document)
            .with_context(|| format!("reading schema {}", self.schema.display()))?;

        let header_name = header
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{stem}.h"));
        let artifacts = crate::codegen::Codegen::new(&classname, &header_name)
            .generate(&root)
            .with_context(|| format!("compiling schema {}", self.schema.display()))?;

        write_artifacts(&header, &artifacts.header, &source, &artifacts.source)?;
        eprintln!("{} wrote {}", "✓".green(), header.display());
        eprintln!("{} wrote {}", "✓".green(), source.display());
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Base name of the schema file, cut at the first dot.
fn schema_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("schema");
    stem.split('.').next().unwrap_or(stem).to_string()
}

fn write_artifacts(
    header_path: &Path,
    header: &str,
    source_path: &Path,
    source: &str,
) -> Result<()> {
    for path in [header_path, source_path] {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating output directory {}", parent.display()))?;
            }
        }
    }
    std::fs::write(header_path, header)
        .with_context(|| format!("writing header file {}", header_path.display()))?;
    if let Err(err) = std::fs::write(source_path, source)
        .with_context(|| format!("writing source file {}", source_path.display()))
    {
        // don't leave a half-generated artifact pair behind
        let _ = std::fs::remove_file(header_path);
        return Err(err);
    }
    Ok(())
}

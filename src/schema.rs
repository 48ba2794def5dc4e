//! Typed schema model.
//!
//! The input dialect is parsed into explicit facets up front, so the compiler
//! dispatches over variants instead of probing a mapping for keyword presence.
//! Facets may coexist on a single node; `$ref` wins over all of them at
//! compile time. Unknown keywords pass through unchecked, but malformed known
//! keywords are errors with the document path attached.

use indexmap::IndexMap;
use serde_yaml::Value;
use thiserror::Error;

// ------------------------------- Errors ----------------------------------- //

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("at {path}: expected {expected}, found {found}")]
    Shape {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("at {path}: unknown type tag `{name}`")]
    UnknownType { path: String, name: String },
    #[error("at {path}: `oneOf` and `anyOf` cannot be combined on one node")]
    BothCompositions { path: String },
    #[error("at {path}: cannot render enum literal as text: {source}")]
    EnumLiteral {
        path: String,
        source: serde_yaml::Error,
    },
}

// ------------------------------- Types ------------------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
}

impl TypeTag {
    pub fn parse(name: &str, path: &str) -> Result<Self, SchemaError> {
        match name {
            "null" => Ok(Self::Null),
            "boolean" => Ok(Self::Boolean),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            _ => Err(SchemaError::UnknownType {
                path: path.to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Type-predicate method name on the generated code's document type.
    pub fn predicate(self) -> &'static str {
        match self {
            Self::Null => "IsNull",
            Self::Boolean => "IsBoolean",
            Self::Object => "IsMap",
            Self::Array => "IsSequence",
            Self::Number => "IsNumber",
            Self::String => "IsScalar",
        }
    }
}

/// One node of the constraint tree. Every facet is optional and independent.
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    pub types: Option<Vec<TypeTag>>,
    pub reference: Option<String>,
    pub object: Option<ObjectFacet>,
    pub array: Option<ArrayFacet>,
    pub composition: Option<Composition>,
    pub enumeration: Option<Vec<EnumLiteral>>,
    pub description: Option<String>,
    /// Named reusable sub-schemas. Only the root's entries are compiled.
    pub definitions: IndexMap<String, SchemaNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectFacet {
    pub required: Vec<String>,
    pub properties: IndexMap<String, SchemaNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ArrayFacet {
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub items: Option<Items>,
}

/// `items` comes in two shapes; the tuple shape is parsed so the compiler can
/// reject it as a visible case instead of skipping an unknown keyword.
#[derive(Debug, Clone)]
pub enum Items {
    Single(Box<SchemaNode>),
    Tuple(Vec<SchemaNode>),
}

#[derive(Debug, Clone)]
pub enum Composition {
    OneOf(Vec<SchemaNode>),
    AnyOf(Vec<SchemaNode>),
}

/// One `enum` entry, kept as the document text of the parsed fragment so the
/// generated code can rebuild the value verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumLiteral(String);

impl EnumLiteral {
    pub fn text(&self) -> &str {
        &self.0
    }
}

// ------------------------------- Parsing ---------------------------------- //

impl SchemaNode {
    pub fn from_document(value: &Value) -> Result<Self, SchemaError> {
        Self::from_value(value, "#")
    }

    pub fn from_value(value: &Value, path: &str) -> Result<Self, SchemaError> {
        let mapping = value
            .as_mapping()
            .ok_or_else(|| shape(path, "a schema mapping", value))?;

        let mut node = SchemaNode::default();
        let mut object = ObjectFacet::default();
        let mut array = ArrayFacet::default();
        let mut has_object = false;
        let mut has_array = false;

        for (key, entry) in mapping {
            let Some(key) = key.as_str() else { continue };
            let entry_path = format!("{path}/{key}");
            match key {
                "type" => node.types = Some(parse_types(entry, &entry_path)?),
                "$ref" => node.reference = Some(expect_str(entry, &entry_path)?.to_string()),
                "required" => {
                    object.required = parse_string_seq(entry, &entry_path)?;
                    has_object = true;
                }
                "properties" => {
                    object.properties = parse_node_map(entry, &entry_path)?;
                    has_object = true;
                }
                "minItems" => {
                    array.min_items = Some(expect_count(entry, &entry_path)?);
                    has_array = true;
                }
                "maxItems" => {
                    array.max_items = Some(expect_count(entry, &entry_path)?);
                    has_array = true;
                }
                "items" => {
                    array.items = Some(parse_items(entry, &entry_path)?);
                    has_array = true;
                }
                "oneOf" => {
                    let branches = parse_node_seq(entry, &entry_path)?;
                    set_composition(&mut node, Composition::OneOf(branches), path)?;
                }
                "anyOf" => {
                    let branches = parse_node_seq(entry, &entry_path)?;
                    set_composition(&mut node, Composition::AnyOf(branches), path)?;
                }
                "enum" => node.enumeration = Some(parse_enum(entry, &entry_path)?),
                "description" => {
                    node.description = Some(expect_str(entry, &entry_path)?.to_string())
                }
                "definitions" => node.definitions = parse_node_map(entry, &entry_path)?,
                _ => {}
            }
        }

        if has_object {
            node.object = Some(object);
        }
        if has_array {
            node.array = Some(array);
        }
        Ok(node)
    }

    /// The node's type constraint does not rule out `tag`.
    pub fn could_be(&self, tag: TypeTag) -> bool {
        match &self.types {
            None => true,
            Some(tags) => tags.contains(&tag),
        }
    }

    /// The node's type constraint is exactly `tag` and nothing else.
    pub fn must_be(&self, tag: TypeTag) -> bool {
        matches!(self.types.as_deref(), Some([only]) if *only == tag)
    }
}

fn set_composition(
    node: &mut SchemaNode,
    composition: Composition,
    path: &str,
) -> Result<(), SchemaError> {
    if node.composition.is_some() {
        return Err(SchemaError::BothCompositions {
            path: path.to_string(),
        });
    }
    node.composition = Some(composition);
    Ok(())
}

// ------------------------------- Helpers ---------------------------------- //

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn shape(path: &str, expected: &'static str, found: &Value) -> SchemaError {
    SchemaError::Shape {
        path: path.to_string(),
        expected,
        found: kind_of(found),
    }
}

fn expect_str<'a>(value: &'a Value, path: &str) -> Result<&'a str, SchemaError> {
    value.as_str().ok_or_else(|| shape(path, "a string", value))
}

fn expect_count(value: &Value, path: &str) -> Result<u64, SchemaError> {
    value
        .as_u64()
        .ok_or_else(|| shape(path, "a non-negative integer", value))
}

fn parse_types(value: &Value, path: &str) -> Result<Vec<TypeTag>, SchemaError> {
    match value {
        Value::String(name) => Ok(vec![TypeTag::parse(name, path)?]),
        Value::Sequence(entries) => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let entry_path = format!("{path}/{i}");
                TypeTag::parse(expect_str(entry, &entry_path)?, &entry_path)
            })
            .collect(),
        other => Err(shape(path, "a type tag or sequence of type tags", other)),
    }
}

fn parse_string_seq(value: &Value, path: &str) -> Result<Vec<String>, SchemaError> {
    let entries = value
        .as_sequence()
        .ok_or_else(|| shape(path, "a sequence of strings", value))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let entry_path = format!("{path}/{i}");
            Ok(expect_str(entry, &entry_path)?.to_string())
        })
        .collect()
}

fn parse_node_seq(value: &Value, path: &str) -> Result<Vec<SchemaNode>, SchemaError> {
    let entries = value
        .as_sequence()
        .ok_or_else(|| shape(path, "a sequence of schemas", value))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| SchemaNode::from_value(entry, &format!("{path}/{i}")))
        .collect()
}

fn parse_node_map(value: &Value, path: &str) -> Result<IndexMap<String, SchemaNode>, SchemaError> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| shape(path, "a mapping of schemas", value))?;
    let mut out = IndexMap::new();
    for (key, entry) in mapping {
        let key = expect_str(key, path)?.to_string();
        let child = SchemaNode::from_value(entry, &format!("{path}/{key}"))?;
        out.insert(key, child);
    }
    Ok(out)
}

fn parse_items(value: &Value, path: &str) -> Result<Items, SchemaError> {
    match value {
        Value::Mapping(_) => Ok(Items::Single(Box::new(SchemaNode::from_value(
            value, path,
        )?))),
        Value::Sequence(entries) => {
            let schemas = entries
                .iter()
                .enumerate()
                .map(|(i, entry)| SchemaNode::from_value(entry, &format!("{path}/{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Items::Tuple(schemas))
        }
        other => Err(shape(path, "an item schema or sequence of item schemas", other)),
    }
}

fn parse_enum(value: &Value, path: &str) -> Result<Vec<EnumLiteral>, SchemaError> {
    let entries = value
        .as_sequence()
        .ok_or_else(|| shape(path, "a sequence of literal values", value))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let text = serde_yaml::to_string(entry).map_err(|source| SchemaError::EnumLiteral {
                path: format!("{path}/{i}"),
                source,
            })?;
            Ok(EnumLiteral(text.trim_end().to_string()))
        })
        .collect()
}

// ------------------------------- Tests ------------------------------------ //

//! The type metadata produced by the scanner and consumed by the emitter.

use fxhash::FxHashMap;
use once_cell::sync::Lazy;

use crate::schema::SchemaSet;

pub mod pretty;

/// Built-in scalar kinds understood by the generators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    UInt,
    Long,
    ULong,
    Char,
    Float,
    Bool,
    String,
}

static ONE_WORD_SPELLINGS: Lazy<FxHashMap<&'static str, Primitive>> = Lazy::new(|| {
    [
        ("int", Primitive::Int),
        ("long", Primitive::Long),
        ("size_t", Primitive::ULong),
        ("double", Primitive::Float),
        ("float", Primitive::Float),
        ("char", Primitive::Char),
        ("bool", Primitive::Bool),
    ]
    .into_iter()
    .collect()
});

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::Int,
        Primitive::UInt,
        Primitive::Long,
        Primitive::ULong,
        Primitive::Char,
        Primitive::Float,
        Primitive::Bool,
        Primitive::String,
    ];

    /// Look up a single identifier type spelling such as `int` or `size_t`.
    pub fn from_spelling(name: &str) -> Option<Primitive> {
        ONE_WORD_SPELLINGS.get(name).copied()
    }

    /// Look up a two identifier type spelling such as `unsigned long`.
    pub fn from_two_word_spelling(first: &str, second: &str) -> Option<Primitive> {
        match (first, second) {
            ("unsigned", "int") => Some(Primitive::UInt),
            ("unsigned", "long") => Some(Primitive::ULong),
            _ => None,
        }
    }

    /// The category tag used by template conditions.
    pub fn tag(self) -> &'static str {
        match self {
            Primitive::Int => "CINT",
            Primitive::UInt => "CUINT",
            Primitive::Long => "CLONG",
            Primitive::ULong => "CULONG",
            Primitive::Char => "CCHAR",
            Primitive::Float => "CFLOAT",
            Primitive::Bool => "CBOOL",
            Primitive::String => "CSTRING",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::UInt => "uint",
            Primitive::Long => "long",
            Primitive::ULong => "ulong",
            Primitive::Char => "char",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::String => "string",
        }
    }
}

/// The tag of [`FieldType::External`] fields in template conditions.
pub const EXTERNAL_TAG: &str = "CEXTERNAL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(Primitive),
    /// Another compound type, referenced by name and never resolved while
    /// scanning.
    External(String),
}

impl FieldType {
    pub fn tag(&self) -> &'static str {
        match self {
            FieldType::Primitive(primitive) => primitive.tag(),
            FieldType::External(_) => EXTERNAL_TAG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub tag: Option<String>,
    pub r#type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, r#type: FieldType) -> Field {
        Field {
            name: name.into(),
            tag: None,
            r#type,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Field {
        self.tag = Some(tag.into());
        self
    }

    /// The serialization key, falling back to the field name.
    pub fn key(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundType {
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    pub derived_schemas: SchemaSet,
}

impl CompoundType {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> CompoundType {
        CompoundType {
            name: name.into(),
            fields,
            derived_schemas: SchemaSet::EMPTY,
        }
    }

    pub fn with_schemas(mut self, derived_schemas: SchemaSet) -> CompoundType {
        self.derived_schemas = derived_schemas;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spellings() {
        assert_eq!(Primitive::from_spelling("size_t"), Some(Primitive::ULong));
        assert_eq!(Primitive::from_spelling("double"), Some(Primitive::Float));
        assert_eq!(Primitive::from_spelling("unsigned"), None);
        assert_eq!(
            Primitive::from_two_word_spelling("unsigned", "long"),
            Some(Primitive::ULong),
        );
        assert_eq!(Primitive::from_two_word_spelling("long", "long"), None);
    }

    #[test]
    fn tags() {
        assert_eq!(Primitive::Long.tag(), "CLONG");
        assert_eq!(FieldType::Primitive(Primitive::String).tag(), "CSTRING");
        assert_eq!(FieldType::External("Person".to_owned()).tag(), EXTERNAL_TAG);
    }

    #[test]
    fn key_defaults_to_name() {
        let field = Field::new("age", FieldType::Primitive(Primitive::Int));
        assert_eq!(field.key(), "age");
        assert_eq!(field.with_tag("Age").key(), "Age");
    }
}

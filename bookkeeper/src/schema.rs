//! Schemas and the registry that assigns each of them a bit in a
//! [`SchemaSet`].
//!
//! Static schemas come first, in registration order, followed by dynamic
//! schemas. A schema's position in that sequence is its bit in every
//! [`CompoundType::derived_schemas`], so the registry is fixed before any
//! input is scanned.

use std::fmt;

use fxhash::FxHashMap;

use crate::config::FormatConfig;
use crate::emit::{Operation, Phase};
use crate::model::CompoundType;
use crate::source::FileRange;

pub mod debug;
pub mod file;
pub mod json;

/// Attribute that selects every registered schema.
pub const DERIVE_ALL: &str = "derive_all";

/// Per-field serialization key attribute, reserved by the scanner.
pub const TAG_ATTRIBUTE: &str = "tag";

/// The number of schemas a [`SchemaSet`] can address.
pub const MAX_SCHEMAS: usize = u64::BITS as usize;

/// The position of a schema in a [`SchemaRegistry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A bitmask of schemas, indexed by [`SchemaId`].
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct SchemaSet(u64);

impl SchemaSet {
    pub const EMPTY: SchemaSet = SchemaSet(0);
    /// Every bit set, whatever the size of the registry.
    pub const ALL: SchemaSet = SchemaSet(u64::MAX);

    pub fn single(id: SchemaId) -> SchemaSet {
        let mut set = SchemaSet::EMPTY;
        set.insert(id);
        set
    }

    pub fn insert(&mut self, id: SchemaId) {
        if id.0 < MAX_SCHEMAS {
            self.0 |= 1 << id.0;
        }
    }

    pub fn contains(self, id: SchemaId) -> bool {
        id.0 < MAX_SCHEMAS && self.0 & (1 << id.0) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: SchemaSet) -> SchemaSet {
        SchemaSet(self.0 | other.0)
    }
}

impl fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaSet({:#b})", self.0)
    }
}

/// Writes a schema's prelude: definitions shared by every type using it.
pub type PreludeFn = fn(&mut String) -> fmt::Result;

/// Writes one declaration or implementation for a compound type.
pub type GenFn = fn(&mut String, &CompoundType, &FormatConfig) -> fmt::Result;

/// A schema implemented by native generator functions. Every slot is
/// optional and an empty slot contributes nothing.
#[derive(Clone)]
pub struct StaticSchema {
    pub name: String,
    pub derive_attr: String,
    pub gen_prelude: Option<PreludeFn>,
    pub gen_dump_decl: Option<GenFn>,
    pub gen_parse_decl: Option<GenFn>,
    pub gen_dump_impl: Option<GenFn>,
    pub gen_parse_impl: Option<GenFn>,
}

impl StaticSchema {
    pub fn new(name: impl Into<String>, derive_attr: impl Into<String>) -> StaticSchema {
        StaticSchema {
            name: name.into(),
            derive_attr: derive_attr.into(),
            gen_prelude: None,
            gen_dump_decl: None,
            gen_parse_decl: None,
            gen_dump_impl: None,
            gen_parse_impl: None,
        }
    }

    pub fn generator(&self, phase: Phase, operation: Operation) -> Option<GenFn> {
        match (phase, operation) {
            (Phase::Declaration, Operation::Dump) => self.gen_dump_decl,
            (Phase::Declaration, Operation::Parse) => self.gen_parse_decl,
            (Phase::Implementation, Operation::Dump) => self.gen_dump_impl,
            (Phase::Implementation, Operation::Parse) => self.gen_parse_impl,
        }
    }
}

impl fmt::Debug for StaticSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSchema")
            .field("name", &self.name)
            .field("derive_attr", &self.derive_attr)
            .finish_non_exhaustive()
    }
}

/// A schema whose generator is a text template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicSchema {
    pub name: String,
    pub derive_attr: String,
    pub template: String,
    /// Where the template text came from, for diagnostics.
    pub template_range: Option<FileRange>,
}

impl DynamicSchema {
    pub fn new(
        name: impl Into<String>,
        derive_attr: impl Into<String>,
        template: impl Into<String>,
    ) -> DynamicSchema {
        DynamicSchema {
            name: name.into(),
            derive_attr: derive_attr.into(),
            template: template.into(),
            template_range: None,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub enum SchemaRef<'a> {
    Static(&'a StaticSchema),
    Dynamic(&'a DynamicSchema),
}

impl<'a> SchemaRef<'a> {
    pub fn name(self) -> &'a str {
        match self {
            SchemaRef::Static(schema) => &schema.name,
            SchemaRef::Dynamic(schema) => &schema.name,
        }
    }

    pub fn derive_attr(self) -> &'a str {
        match self {
            SchemaRef::Static(schema) => &schema.derive_attr,
            SchemaRef::Dynamic(schema) => &schema.derive_attr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    TooManySchemas { count: usize },
    ReservedDeriveAttribute { schema: String, attribute: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::TooManySchemas { count } => write!(
                f,
                "{count} schemas were registered, but at most {MAX_SCHEMAS} are supported"
            ),
            RegistryError::ReservedDeriveAttribute { schema, attribute } => write!(
                f,
                "schema `{schema}` uses the reserved attribute `{attribute}`"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

pub struct SchemaRegistry {
    static_schemas: Vec<StaticSchema>,
    dynamic_schemas: Vec<DynamicSchema>,
    /// The first schema registered for each derive attribute.
    derive_attrs: FxHashMap<String, SchemaId>,
}

impl SchemaRegistry {
    /// Build a registry, rejecting more schemas than a [`SchemaSet`] can
    /// address.
    pub fn new(
        static_schemas: Vec<StaticSchema>,
        dynamic_schemas: Vec<DynamicSchema>,
    ) -> Result<SchemaRegistry, RegistryError> {
        let count = static_schemas.len() + dynamic_schemas.len();
        if count > MAX_SCHEMAS {
            return Err(RegistryError::TooManySchemas { count });
        }

        let names = static_schemas
            .iter()
            .map(|schema| (&schema.name, &schema.derive_attr))
            .chain(dynamic_schemas.iter().map(|schema| (&schema.name, &schema.derive_attr)));
        for (name, attribute) in names {
            if attribute == DERIVE_ALL || attribute == TAG_ATTRIBUTE {
                return Err(RegistryError::ReservedDeriveAttribute {
                    schema: name.clone(),
                    attribute: attribute.clone(),
                });
            }
        }

        Ok(SchemaRegistry::from_parts(static_schemas, dynamic_schemas))
    }

    /// The built-in `json` and `debug` schemas followed by `dynamic_schemas`.
    pub fn with_dynamic(
        dynamic_schemas: Vec<DynamicSchema>,
    ) -> Result<SchemaRegistry, RegistryError> {
        SchemaRegistry::new(vec![json::schema(), debug::schema()], dynamic_schemas)
    }

    /// The built-in `json` and `debug` schemas.
    pub fn builtin() -> SchemaRegistry {
        SchemaRegistry::from_parts(vec![json::schema(), debug::schema()], Vec::new())
    }

    fn from_parts(
        static_schemas: Vec<StaticSchema>,
        dynamic_schemas: Vec<DynamicSchema>,
    ) -> SchemaRegistry {
        let mut registry = SchemaRegistry {
            static_schemas,
            dynamic_schemas,
            derive_attrs: FxHashMap::default(),
        };
        let attrs: Vec<_> = (registry.schemas())
            .map(|(id, schema)| (schema.derive_attr().to_owned(), id))
            .collect();
        for (attr, id) in attrs {
            registry.derive_attrs.entry(attr).or_insert(id);
        }
        registry
    }

    pub(crate) fn len(&self) -> usize {
        self.static_schemas.len() + self.dynamic_schemas.len()
    }

    pub fn static_id(&self, index: usize) -> SchemaId {
        SchemaId(index)
    }

    pub fn dynamic_id(&self, index: usize) -> SchemaId {
        SchemaId(self.static_schemas.len() + index)
    }

    /// Every schema in registry order.
    pub fn schemas(&self) -> impl Iterator<Item = (SchemaId, SchemaRef<'_>)> {
        let statics = (self.static_schemas.iter().enumerate())
            .map(|(index, schema)| (SchemaId(index), SchemaRef::Static(schema)));
        let dynamics = (self.dynamic_schemas.iter().enumerate()).map(|(index, schema)| {
            (self.dynamic_id(index), SchemaRef::Dynamic(schema))
        });
        statics.chain(dynamics)
    }

    /// The schemas in `set`, in registry order.
    pub fn selected(&self, set: SchemaSet) -> impl Iterator<Item = (SchemaId, SchemaRef<'_>)> {
        self.schemas().filter(move |(id, _)| set.contains(*id))
    }

    pub fn selected_static(
        &self,
        set: SchemaSet,
    ) -> impl Iterator<Item = (SchemaId, &StaticSchema)> {
        (self.static_schemas.iter().enumerate())
            .map(|(index, schema)| (SchemaId(index), schema))
            .filter(move |(id, _)| set.contains(*id))
    }

    pub fn selected_dynamic(
        &self,
        set: SchemaSet,
    ) -> impl Iterator<Item = (SchemaId, &DynamicSchema)> {
        (self.dynamic_schemas.iter().enumerate())
            .map(|(index, schema)| (self.dynamic_id(index), schema))
            .filter(move |(id, _)| set.contains(*id))
    }

    /// The first schema registered with the given derive attribute.
    pub fn find_derive_attr(&self, attribute: &str) -> Option<SchemaId> {
        self.derive_attrs.get(attribute).copied()
    }

    /// The registered attribute closest to `attribute`, if any is close
    /// enough to be a plausible typo.
    pub fn suggest_derive_attr(&self, attribute: &str) -> Option<&str> {
        const MAX_DISTANCE: usize = 3;

        (self.schemas())
            .map(|(_, schema)| schema.derive_attr())
            .chain(std::iter::once(DERIVE_ALL))
            .map(|candidate| (levenshtein::levenshtein(attribute, candidate), candidate))
            .filter(|(distance, _)| *distance <= MAX_DISTANCE)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate)
    }
}

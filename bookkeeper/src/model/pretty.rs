//! Pretty printing of scanned compound types, used by `bk types`.

use pretty::{Arena, DocAllocator, DocBuilder};

use crate::model::{CompoundType, Field, FieldType};
use crate::schema::SchemaRegistry;

const INDENT: isize = 4;

pub struct Context<'arena> {
    arena: &'arena Arena<'arena>,
    registry: &'arena SchemaRegistry,
}

impl<'arena> Context<'arena> {
    pub fn new(arena: &'arena Arena<'arena>, registry: &'arena SchemaRegistry) -> Context<'arena> {
        Context { arena, registry }
    }

    pub fn compound_type(&self, ty: &CompoundType) -> DocBuilder<'arena, Arena<'arena>> {
        let arena = self.arena;
        let schemas: Vec<_> = (self.registry.selected(ty.derived_schemas))
            .map(|(_, schema)| arena.text(schema.name().to_owned()))
            .collect();

        let header = if schemas.is_empty() {
            arena.text(ty.name.clone())
        } else {
            arena.concat([
                arena.text(ty.name.clone()),
                arena.space(),
                arena.text("["),
                arena.intersperse(schemas, arena.text(", ")),
                arena.text("]"),
            ])
        };

        if ty.fields.is_empty() {
            return arena.concat([header, arena.space(), arena.text("{}")]);
        }

        arena.concat([
            header,
            arena.space(),
            arena.text("{"),
            arena
                .concat(ty.fields.iter().map(|field| {
                    arena.concat([arena.hardline(), self.field(field), arena.text(",")])
                }))
                .nest(INDENT),
            arena.hardline(),
            arena.text("}"),
        ])
    }

    fn field(&self, field: &Field) -> DocBuilder<'arena, Arena<'arena>> {
        let arena = self.arena;
        let r#type = match &field.r#type {
            FieldType::Primitive(primitive) => arena.text(primitive.name()),
            FieldType::External(name) => arena.text(name.clone()),
        };
        let doc = arena.concat([
            arena.text(field.name.clone()),
            arena.text(":"),
            arena.space(),
            r#type,
        ]);

        match &field.tag {
            None => doc,
            Some(tag) => arena.concat([
                doc,
                arena.space(),
                arena.text("as"),
                arena.space(),
                arena.text(format!("{tag:?}")),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Primitive;
    use crate::schema::{SchemaRegistry, SchemaSet};

    fn render(registry: &SchemaRegistry, ty: &CompoundType) -> String {
        let arena = Arena::new();
        let context = Context::new(&arena, registry);
        let doc = context.compound_type(ty).into_doc();
        doc.pretty(80).to_string()
    }

    #[test]
    fn fields_one_per_line() {
        let registry = SchemaRegistry::builtin();
        let ty = CompoundType::new(
            "Person",
            vec![
                Field::new("name", FieldType::Primitive(Primitive::String)).with_tag("Name"),
                Field::new("boss", FieldType::External("Person".to_owned())),
            ],
        )
        .with_schemas(SchemaSet::ALL);

        assert_eq!(
            render(&registry, &ty),
            "Person [json, debug] {\n    name: string as \"Name\",\n    boss: Person,\n}",
        );
    }

    #[test]
    fn empty_type() {
        let registry = SchemaRegistry::builtin();
        let ty = CompoundType::new("Unit", Vec::new());

        assert_eq!(render(&registry, &ty), "Unit {}");
    }
}

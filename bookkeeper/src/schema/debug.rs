//! The built-in `debug` schema: an indented, human readable dump.

use std::fmt::{self, Write};

use crate::config::FormatConfig;
use crate::model::{CompoundType, FieldType, Primitive};
use crate::schema::StaticSchema;

pub fn schema() -> StaticSchema {
    StaticSchema {
        gen_dump_decl: Some(dump_decl),
        gen_dump_impl: Some(dump_impl),
        ..StaticSchema::new("debug", "derive_debug")
    }
}

fn dump_decl(out: &mut String, ty: &CompoundType, config: &FormatConfig) -> fmt::Result {
    let (name, dst) = (&ty.name, &config.dst_type);
    writeln!(out, "void __indent_dump_debug_{name}({name}* item, {dst} dst, int indent);")?;
    writeln!(out, "void dump_debug_{name}({name}* item, {dst} dst);")
}

fn dump_impl(out: &mut String, ty: &CompoundType, config: &FormatConfig) -> fmt::Result {
    let (name, dst, fmt) = (&ty.name, &config.dst_type, &config.fmt_macro);

    writeln!(out, "void __indent_dump_debug_{name}({name}* item, {dst} dst, int indent) {{")?;
    writeln!(out, "    {} offset = {{0}};", config.offset_type)?;
    writeln!(out, "    (void)offset;")?;
    writeln!(out, r#"    {fmt}("{name} {{\n");"#)?;
    for field in &ty.fields {
        let field_name = &field.name;
        match &field.r#type {
            FieldType::Primitive(primitive) => {
                let (conversion, value) = match primitive {
                    Primitive::Int => ("%d", format!("item->{field_name}")),
                    Primitive::UInt => ("%u", format!("item->{field_name}")),
                    Primitive::Long => ("%ld", format!("item->{field_name}")),
                    Primitive::ULong => ("%lu", format!("item->{field_name}")),
                    Primitive::Float => ("%f", format!("item->{field_name}")),
                    Primitive::Char => ("%c", format!("item->{field_name}")),
                    Primitive::String => ("%s", format!("item->{field_name}")),
                    Primitive::Bool => {
                        ("%s", format!(r#"item->{field_name} ? "true" : "false""#))
                    }
                };
                writeln!(
                    out,
                    r#"    {fmt}("%*s({}) {field_name}: {conversion}\n", indent + 4, "", {value});"#,
                    primitive.name(),
                )?;
            }
            FieldType::External(external) => {
                writeln!(out, r#"    {fmt}("%*s{field_name}: ", indent + 4, "");"#)?;
                writeln!(
                    out,
                    "    __indent_dump_debug_{external}(&item->{field_name}, dst, indent + 4);"
                )?;
            }
        }
    }
    writeln!(out, r#"    {fmt}("%*s}}\n", indent, "");"#)?;
    writeln!(out, "}}")?;

    writeln!(out, "void dump_debug_{name}({name}* item, {dst} dst) {{")?;
    writeln!(out, "    __indent_dump_debug_{name}(item, dst, 0);")?;
    writeln!(out, "}}")
}

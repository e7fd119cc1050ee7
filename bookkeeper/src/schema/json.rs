//! The built-in `json` schema: dumping through the format macro and parsing
//! through cJSON.

use std::fmt::{self, Write};

use crate::config::FormatConfig;
use crate::model::{CompoundType, FieldType, Primitive};
use crate::schema::StaticSchema;

pub fn schema() -> StaticSchema {
    StaticSchema {
        gen_prelude: Some(prelude),
        gen_dump_decl: Some(dump_decl),
        gen_parse_decl: Some(parse_decl),
        gen_dump_impl: Some(dump_impl),
        gen_parse_impl: Some(parse_impl),
        ..StaticSchema::new("json", "derive_json")
    }
}

fn prelude(out: &mut String) -> fmt::Result {
    writeln!(out, "typedef enum {{")?;
    writeln!(out, "    BKJSON_OK = 0,")?;
    writeln!(out, "    BKJSON_cJSON_ERROR,")?;
    writeln!(out, "    BKJSON_FIELD_NOT_FOUND,")?;
    writeln!(out, "    BKJSON_MISMATCHED_FIELD_TYPE,")?;
    writeln!(out, "}} BkJSON_Result;")
}

fn dump_decl(out: &mut String, ty: &CompoundType, config: &FormatConfig) -> fmt::Result {
    let name = &ty.name;
    writeln!(out, "void dump_json_{name}({name}* item, {} dst);", config.dst_type)
}

fn parse_decl(out: &mut String, ty: &CompoundType, _: &FormatConfig) -> fmt::Result {
    let name = &ty.name;
    writeln!(out, "BkJSON_Result parse_cjson_{name}(cJSON* src, {name}* dst);")?;
    writeln!(out, "/// WARN: Immediately returns on error, so `dst` might be partially filled.")?;
    writeln!(
        out,
        "BkJSON_Result parse_json_{name}(const char* src, unsigned long len, {name}* dst);"
    )
}

fn dump_impl(out: &mut String, ty: &CompoundType, config: &FormatConfig) -> fmt::Result {
    let name = &ty.name;
    let fmt = &config.fmt_macro;

    writeln!(out, "void dump_json_{name}({name}* item, {} dst) {{", config.dst_type)?;
    writeln!(out, "    {} offset = {{0}};", config.offset_type)?;
    writeln!(out, "    (void)offset;")?;
    writeln!(out, r#"    {fmt}("{{");"#)?;
    for (index, field) in ty.fields.iter().enumerate() {
        let (key, field_name) = (field.key(), &field.name);
        match &field.r#type {
            FieldType::Primitive(Primitive::Bool) => writeln!(
                out,
                r#"    {fmt}("\"{key}\":%s", item->{field_name} ? "true" : "false");"#
            )?,
            FieldType::Primitive(Primitive::String) => writeln!(
                out,
                r#"    {fmt}("\"{key}\":\"%s\"", item->{field_name});"#
            )?,
            FieldType::Primitive(primitive) => writeln!(
                out,
                r#"    {fmt}("\"{key}\":{}", item->{field_name});"#,
                conversion(*primitive),
            )?,
            FieldType::External(external) => {
                writeln!(out, r#"    {fmt}("\"{key}\":");"#)?;
                writeln!(out, "    dump_json_{external}(&item->{field_name}, dst);")?;
            }
        }
        if index + 1 < ty.fields.len() {
            writeln!(out, r#"    {fmt}(",");"#)?;
        }
    }
    writeln!(out, r#"    {fmt}("}}");"#)?;
    writeln!(out, "}}")
}

/// The printf conversion for a numeric or character primitive.
fn conversion(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Int => "%d",
        Primitive::UInt => "%u",
        Primitive::Long => "%ld",
        Primitive::ULong => "%lu",
        Primitive::Float => "%f",
        Primitive::Char => "%c",
        Primitive::Bool | Primitive::String => "%s",
    }
}

fn parse_impl(out: &mut String, ty: &CompoundType, _: &FormatConfig) -> fmt::Result {
    let name = &ty.name;

    writeln!(out, "BkJSON_Result parse_cjson_{name}(cJSON* src, {name}* dst) {{")?;
    writeln!(out, "    BkJSON_Result _res = 0; (void)_res;")?;
    for field in &ty.fields {
        let (key, field_name) = (field.key(), &field.name);
        let item = format!("{name}_{field_name}");

        writeln!(
            out,
            r#"    cJSON* {item} = cJSON_GetObjectItemCaseSensitive(src, "{key}");"#
        )?;
        writeln!(out, "    if (!{item}) return BKJSON_FIELD_NOT_FOUND;")?;

        let (check, value) = match &field.r#type {
            FieldType::External(external) => {
                writeln!(out, "    _res = parse_cjson_{external}({item}, &dst->{field_name});")?;
                writeln!(out, "    if (_res) return _res;")?;
                continue;
            }
            FieldType::Primitive(Primitive::Int | Primitive::UInt) => {
                ("cJSON_IsNumber", format!("{item}->valueint"))
            }
            FieldType::Primitive(Primitive::Long | Primitive::ULong | Primitive::Float) => {
                ("cJSON_IsNumber", format!("{item}->valuedouble"))
            }
            FieldType::Primitive(Primitive::Bool) => ("cJSON_IsBool", format!("{item}->valueint")),
            FieldType::Primitive(Primitive::Char) => {
                ("cJSON_IsString", format!("*{item}->valuestring"))
            }
            FieldType::Primitive(Primitive::String) => {
                ("cJSON_IsString", format!("strdup({item}->valuestring)"))
            }
        };

        writeln!(out, "    if ({check}({item})) {{")?;
        if check == "cJSON_IsString" {
            writeln!(out, "        if (!{item}->valuestring) return BKJSON_MISMATCHED_FIELD_TYPE;")?;
        }
        writeln!(out, "        dst->{field_name} = {value};")?;
        writeln!(out, "    }} else {{")?;
        writeln!(out, "        return BKJSON_MISMATCHED_FIELD_TYPE;")?;
        writeln!(out, "    }}")?;
    }
    writeln!(out, "    return BKJSON_OK;")?;
    writeln!(out, "}}")?;

    writeln!(out, "/// WARN: Immediately returns on error, so `dst` might be partially filled.")?;
    writeln!(
        out,
        "BkJSON_Result parse_json_{name}(const char* src, unsigned long len, {name}* dst) {{"
    )?;
    writeln!(out, "    cJSON* json = cJSON_ParseWithLength(src, len);")?;
    writeln!(out, "    if (!json) return BKJSON_cJSON_ERROR;")?;
    writeln!(out, "    BkJSON_Result res = parse_cjson_{name}(json, dst);")?;
    writeln!(out, "    cJSON_Delete(json);")?;
    writeln!(out, "    return res;")?;
    writeln!(out, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    fn person() -> CompoundType {
        CompoundType::new(
            "Person",
            vec![
                Field::new("name", FieldType::Primitive(Primitive::String)).with_tag("Name"),
                Field::new("age", FieldType::Primitive(Primitive::Int)),
                Field::new("boss", FieldType::External("Person".to_owned())),
            ],
        )
    }

    #[test]
    fn dump_writes_fields_in_order() {
        let mut out = String::new();
        dump_impl(&mut out, &person(), &FormatConfig::default()).unwrap();

        let name = out.find(r#"BK_FMT("\"Name\":\"%s\"", item->name);"#).unwrap();
        let age = out.find(r#"BK_FMT("\"age\":%d", item->age);"#).unwrap();
        let boss = out.find("dump_json_Person(&item->boss, dst);").unwrap();
        assert!(name < age && age < boss);
        assert_eq!(out.matches(r#"BK_FMT(",");"#).count(), 2);
        assert!(out.starts_with("void dump_json_Person(Person* item, BK_FMT_DST_t dst) {\n"));
        assert!(out.ends_with("    BK_FMT(\"}\");\n}\n"));
    }

    #[test]
    fn dump_uses_configured_names() {
        let config = FormatConfig {
            fmt_macro: "PRINT".to_owned(),
            dst_type: "Writer*".to_owned(),
            ..FormatConfig::default()
        };
        let mut out = String::new();
        dump_decl(&mut out, &person(), &config).unwrap();
        assert_eq!(out, "void dump_json_Person(Person* item, Writer* dst);\n");

        out.clear();
        dump_impl(&mut out, &person(), &config).unwrap();
        assert!(out.contains(r#"PRINT("{");"#));
    }

    #[test]
    fn parse_looks_up_tags() {
        let mut out = String::new();
        parse_impl(&mut out, &person(), &FormatConfig::default()).unwrap();

        assert!(out.contains(r#"cJSON_GetObjectItemCaseSensitive(src, "Name");"#));
        assert!(out.contains("dst->name = strdup(Person_name->valuestring);"));
        assert!(out.contains("dst->age = Person_age->valueint;"));
        assert!(out.contains("_res = parse_cjson_Person(Person_boss, &dst->boss);"));
    }
}

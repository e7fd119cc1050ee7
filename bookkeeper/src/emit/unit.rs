//! Assembly of generated headers: one unit per input file, plus the shared
//! `derives.h` and `generics.h`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::{FormatConfig, OutputMode};
use crate::emit::guard::{self, Guard};
use crate::emit::{Emitter, Operation, Phase};
use crate::model::CompoundType;
use crate::reporting::EmitMessage;
use crate::schema::{SchemaRegistry, SchemaSet, DERIVE_ALL, TAG_ATTRIBUTE};

/// Appended to an input's name to get the name of its generated unit.
pub const GENERATED_EXTENSION: &str = ".bk.h";

pub const DERIVES_HEADER: &str = "derives.h";
pub const GENERICS_HEADER: &str = "generics.h";

/// The djb2 string hash, used to keep unit guards distinct.
pub fn djb2(text: &str) -> u64 {
    text.bytes().fold(5381, |hash: u64, byte| {
        hash.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

/// Generate the unit for the types scanned from one input.
///
/// Returns `None` when there is nothing to write: no declarations were
/// produced and no dynamic schema applies to any of the types.
pub fn generate_unit(
    emitter: &Emitter<'_>,
    path: &str,
    index: usize,
    types: &[CompoundType],
    operations: &[Operation],
    on_message: &mut dyn FnMut(EmitMessage),
) -> Option<String> {
    if types.is_empty() {
        return None;
    }

    let config = emitter.config();
    let unit_guard = format!("__BK_{}_{index}_H__", djb2(path));
    let mut out = String::new();

    out.push_str(&format!("#ifndef {unit_guard} // Generated from: {path}\n"));
    out.push_str(&format!("#define {unit_guard}\n"));
    default_definitions(config, &mut out);

    let before_declarations = out.len();
    let mut declarations = 0;
    for ty in types {
        emitter.emit_prelude(ty, &mut out, on_message);
        for operation in operations {
            declarations += emitter.emit_declarations(ty, *operation, &mut out, on_message);
        }
    }

    let registry = emitter.registry();
    let has_dynamic = (types.iter())
        .any(|ty| registry.selected_dynamic(ty.derived_schemas).next().is_some());
    if declarations == 0 && !has_dynamic {
        return None;
    }

    if declarations > 0 {
        out.push('\n');
        guard::open_implementation(config, &mut out);
        for ty in types {
            for operation in operations {
                emitter.emit_implementations(ty, *operation, &mut out, on_message);
            }
            out.push_str(&format!("#define ___BK_INCLUDE_TYPE_{}\n", ty.name));
        }
        guard::close_implementation(config, &mut out);
    } else {
        out.truncate(before_declarations);
    }

    for ty in types {
        emitter.emit_dynamic(ty, &mut out, on_message);
    }

    out.push('\n');
    out.push_str(&format!("#endif // {unit_guard}\n"));
    Some(out)
}

fn default_definitions(config: &FormatConfig, out: &mut String) {
    let definitions = [
        (config.dst_type.as_str(), "FILE*"),
        (config.fmt_macro.as_str(), "(...) offset += fprintf(dst, __VA_ARGS__)"),
        (config.offset_type.as_str(), "size_t"),
    ];
    for (name, definition) in definitions {
        let separator = if definition.starts_with('(') { "" } else { " " };
        out.push_str(&format!("#ifndef {name}\n"));
        out.push_str(&format!("#define {name}{separator}{definition}\n"));
        out.push_str(&format!("#endif // {name}\n"));
    }
}

/// Where the unit generated from `input` is written.
pub fn output_path(input: &Path, mode: OutputMode, output_dir: Option<&Path>) -> Option<PathBuf> {
    match mode {
        OutputMode::Mirror => {
            let mut path = OsString::from(input.as_os_str());
            path.push(GENERATED_EXTENSION);
            Some(PathBuf::from(path))
        }
        OutputMode::Dir => {
            let mut name = OsString::from(input.file_name()?);
            name.push(GENERATED_EXTENSION);
            Some(output_dir?.join(name))
        }
    }
}

/// Empty definitions of every attribute, so that annotated sources compile
/// without the generator.
pub fn derives_header(registry: &SchemaRegistry) -> String {
    let mut out = String::new();
    out.push_str("#ifndef __DERIVES_H__\n");
    out.push_str("#define __DERIVES_H__\n");
    out.push_str(&format!("#define {TAG_ATTRIBUTE}(s)\n"));
    out.push_str(&format!("#define {DERIVE_ALL}(...)\n"));
    for (_, schema) in registry.schemas() {
        out.push_str(&format!("#define {}(...)\n", schema.derive_attr()));
    }
    out.push_str("#endif // __DERIVES_H__\n");
    out
}

/// `_Generic` macros dispatching `dump_<schema>` and `parse_<schema>` to the
/// functions generated for each type. A type only takes part once its
/// implementations have been included.
pub fn generics_header(
    registry: &SchemaRegistry,
    config: &FormatConfig,
    types: &[CompoundType],
) -> String {
    let mut out = String::new();

    for ty in types {
        let name = &ty.name;
        out.push_str(&format!("#ifdef ___BK_IF_TYPE_{name}\n"));
        out.push_str(&format!("#undef ___BK_IF_TYPE_{name}\n"));
        out.push_str(&format!("#endif // ___BK_IF_TYPE_{name}\n"));
        out.push_str(&format!("#ifdef ___BK_INCLUDE_TYPE_{name}\n"));
        out.push_str(&format!("#define ___BK_IF_TYPE_{name}(x) x,\n"));
        out.push_str(&format!("#else // ___BK_INCLUDE_TYPE_{name}\n"));
        out.push_str(&format!("#define ___BK_IF_TYPE_{name}(x)\n"));
        out.push_str(&format!("#endif // ___BK_INCLUDE_TYPE_{name}\n"));
    }

    for (id, schema) in registry.selected_static(SchemaSet::ALL) {
        for operation in Operation::ALL {
            if schema.generator(Phase::Implementation, operation).is_none() {
                continue;
            }

            let (op, upper) = (operation.lower(), operation.upper());
            let schema_name = &schema.name;
            let cases = format!("___BK_GENERIC_{upper}_{schema_name}_CASES");
            let dispatch = format!("{op}_{schema_name}");

            let guard = Guard::generic(schema_name, operation);
            guard.open(config, &mut out);

            out.push_str(&format!("#ifdef {cases}\n#undef {cases}\n#endif // {cases}\n"));
            out.push_str(&format!("#define {cases}\\\n"));
            for ty in types.iter().filter(|ty| ty.derived_schemas.contains(id)) {
                let name = &ty.name;
                out.push_str(&format!("    ___BK_IF_TYPE_{name}({name}*: {dispatch}_{name})\\\n"));
            }
            out.push('\n');

            out.push_str(&format!("#ifdef {dispatch}\n#undef {dispatch}\n#endif // {dispatch}\n"));
            match operation {
                Operation::Dump => {
                    out.push_str(&format!("#define {dispatch}(item, dst)\\\n"));
                    out.push_str(&format!(
                        "_Generic((item), {cases} default: NULL)((item), (dst))\n"
                    ));
                }
                Operation::Parse => {
                    out.push_str(&format!("#define {dispatch}(src, len, dst)\\\n"));
                    out.push_str(&format!(
                        "_Generic((dst), {cases} default: NULL)((src), (len), (dst))\n"
                    ));
                }
            }

            guard.close(config, &mut out);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldType, Primitive};
    use crate::schema::{DynamicSchema, SchemaSet};

    fn person(derived_schemas: SchemaSet) -> CompoundType {
        CompoundType::new(
            "Person",
            vec![
                Field::new("name", FieldType::Primitive(Primitive::String)),
                Field::new("age", FieldType::Primitive(Primitive::Int)),
            ],
        )
        .with_schemas(derived_schemas)
    }

    #[test]
    fn djb2_values() {
        assert_eq!(djb2(""), 5381);
        assert_eq!(djb2("a"), 177_670);
        assert_ne!(djb2("a.h"), djb2("b.h"));
    }

    #[test]
    fn unit_layout() {
        let registry = SchemaRegistry::builtin();
        let config = FormatConfig::default();
        let emitter = Emitter::new(&registry, &config);
        let json = registry.find_derive_attr("derive_json").unwrap();
        let types = [person(SchemaSet::single(json))];

        let out = generate_unit(&emitter, "person.h", 0, &types, &Operation::ALL, &mut |_| {})
            .unwrap();
        let unit_guard = format!("__BK_{}_0_H__", djb2("person.h"));

        assert!(out.starts_with(&format!(
            "#ifndef {unit_guard} // Generated from: person.h\n#define {unit_guard}\n\
             #ifndef BK_FMT_DST_t\n#define BK_FMT_DST_t FILE*\n#endif // BK_FMT_DST_t\n\
             #ifndef BK_FMT\n#define BK_FMT(...) offset += fprintf(dst, __VA_ARGS__)\n#endif // BK_FMT\n"
        )));
        assert!(out.ends_with(&format!("\n#endif // {unit_guard}\n")));

        let prelude = out.find("#ifndef ___BK_PRELUDE_json___").unwrap();
        let declaration = out.find("void dump_json_Person(Person* item, BK_FMT_DST_t dst);").unwrap();
        let implementation = out.find("#ifdef BK_IMPLEMENTATION").unwrap();
        let include = out.find("#define ___BK_INCLUDE_TYPE_Person\n").unwrap();
        assert!(prelude < declaration && declaration < implementation && implementation < include);
        assert!(guard::nesting_depth(&out).is_some());
    }

    #[test]
    fn no_unit_without_schemas() {
        let registry = SchemaRegistry::builtin();
        let config = FormatConfig::default();
        let emitter = Emitter::new(&registry, &config);

        let types = [person(SchemaSet::EMPTY)];
        assert_eq!(generate_unit(&emitter, "a.h", 0, &types, &Operation::ALL, &mut |_| {}), None);
        assert_eq!(generate_unit(&emitter, "a.h", 0, &[], &Operation::ALL, &mut |_| {}), None);

        let types = [person(SchemaSet::ALL)];
        assert_eq!(generate_unit(&emitter, "a.h", 0, &types, &[], &mut |_| {}), None);
    }

    #[test]
    fn dynamic_only_unit() {
        let registry = SchemaRegistry::with_dynamic(vec![DynamicSchema::new(
            "names",
            "derive_names",
            "$for {$$it$ $}$",
        )])
        .unwrap();
        let config = FormatConfig::default();
        let emitter = Emitter::new(&registry, &config);
        let types = [person(SchemaSet::single(registry.dynamic_id(0)))];

        let out = generate_unit(&emitter, "a.h", 3, &types, &Operation::ALL, &mut |_| {}).unwrap();

        assert!(out.contains("name age \n"));
        assert!(!out.contains("BK_IMPLEMENTATION"));
        assert!(!out.contains("BK_DISABLE_DUMP"));
        assert!(out.contains("_3_H__"));
        assert!(guard::nesting_depth(&out).is_some());
    }

    #[test]
    fn output_paths() {
        let input = Path::new("src/person.h");
        assert_eq!(
            output_path(input, OutputMode::Mirror, None),
            Some(PathBuf::from("src/person.h.bk.h")),
        );
        assert_eq!(
            output_path(input, OutputMode::Dir, Some(Path::new("gen"))),
            Some(PathBuf::from("gen/person.h.bk.h")),
        );
        assert_eq!(output_path(input, OutputMode::Dir, None), None);
    }

    #[test]
    fn derives_header_defines_every_attribute() {
        let registry = SchemaRegistry::with_dynamic(vec![DynamicSchema::new("x", "derive_x", "")])
            .unwrap();
        assert_eq!(
            derives_header(&registry),
            "#ifndef __DERIVES_H__\n\
             #define __DERIVES_H__\n\
             #define tag(s)\n\
             #define derive_all(...)\n\
             #define derive_json(...)\n\
             #define derive_debug(...)\n\
             #define derive_x(...)\n\
             #endif // __DERIVES_H__\n",
        );
    }

    #[test]
    fn generics_dispatch_to_deriving_types() {
        let registry = SchemaRegistry::builtin();
        let config = FormatConfig::default();
        let json = registry.find_derive_attr("derive_json").unwrap();
        let debug = registry.find_derive_attr("derive_debug").unwrap();
        let types = [
            person(SchemaSet::single(json)),
            CompoundType::new("Unit", Vec::new()).with_schemas(SchemaSet::single(debug)),
        ];

        let out = generics_header(&registry, &config, &types);

        assert!(out.contains("    ___BK_IF_TYPE_Person(Person*: dump_json_Person)\\\n"));
        assert!(out.contains("    ___BK_IF_TYPE_Person(Person*: parse_json_Person)\\\n"));
        assert!(out.contains("    ___BK_IF_TYPE_Unit(Unit*: dump_debug_Unit)\\\n"));
        assert!(!out.contains("dump_json_Unit"));
        assert!(!out.contains("parse_debug"));
        assert!(out.contains("#define dump_json(item, dst)\\\n"));
        assert!(guard::nesting_depth(&out).is_some());
    }
}

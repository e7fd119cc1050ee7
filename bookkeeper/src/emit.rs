//! The code emitter.
//!
//! For each compound type and each phase the emitter opens a guard scoped to
//! the phase, the type, and the phase for that type. Every selected static
//! schema then contributes its generator's output inside a narrower guard
//! for that schema. Dynamic schemas are expanded once per type by
//! [`Emitter::emit_dynamic`], since their templates carry their own guards.

use std::fmt;

use crate::config::FormatConfig;
use crate::model::CompoundType;
use crate::reporting::EmitMessage;
use crate::schema::{SchemaRegistry, StaticSchema};
use crate::template;

pub mod guard;
pub mod unit;

use self::guard::Guard;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Dump,
    Parse,
}

impl Operation {
    pub const ALL: [Operation; 2] = [Operation::Dump, Operation::Parse];

    /// The spelling used in guard macro names.
    pub fn upper(self) -> &'static str {
        match self {
            Operation::Dump => "DUMP",
            Operation::Parse => "PARSE",
        }
    }

    /// The spelling used in generated function names.
    pub fn lower(self) -> &'static str {
        match self {
            Operation::Dump => "dump",
            Operation::Parse => "parse",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    Declaration,
    Implementation,
}

pub struct Emitter<'a> {
    registry: &'a SchemaRegistry,
    config: &'a FormatConfig,
}

impl<'a> Emitter<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &'a FormatConfig) -> Emitter<'a> {
        Emitter { registry, config }
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    pub fn config(&self) -> &'a FormatConfig {
        self.config
    }

    /// Write the preludes of the static schemas selected by `ty`. Each
    /// prelude has its own include guard, so repeating it for every type in
    /// a unit is harmless.
    pub fn emit_prelude(
        &self,
        ty: &CompoundType,
        out: &mut String,
        on_message: &mut dyn FnMut(EmitMessage),
    ) {
        for (_, schema) in self.registry.selected_static(ty.derived_schemas) {
            let guard = format!("___BK_PRELUDE_{}___", schema.name);
            let prelude = match schema.gen_prelude {
                None => String::new(),
                Some(gen_prelude) => {
                    let mut text = String::new();
                    match gen_prelude(&mut text) {
                        Ok(()) => text,
                        Err(fmt::Error) => {
                            on_message(generator_failed(schema, ty));
                            continue;
                        }
                    }
                }
            };

            out.push_str(&format!("#ifndef {guard}\n#define {guard}\n"));
            push_lines(out, &prelude);
            out.push_str(&format!("#endif // {guard}\n"));
        }
    }

    /// Write the declarations for one operation, returning the number of
    /// schemas that contributed one.
    pub fn emit_declarations(
        &self,
        ty: &CompoundType,
        operation: Operation,
        out: &mut String,
        on_message: &mut dyn FnMut(EmitMessage),
    ) -> usize {
        self.emit_phase(ty, Phase::Declaration, operation, out, on_message)
    }

    /// Write the implementations for one operation, returning the number of
    /// schemas that contributed one.
    pub fn emit_implementations(
        &self,
        ty: &CompoundType,
        operation: Operation,
        out: &mut String,
        on_message: &mut dyn FnMut(EmitMessage),
    ) -> usize {
        self.emit_phase(ty, Phase::Implementation, operation, out, on_message)
    }

    fn emit_phase(
        &self,
        ty: &CompoundType,
        phase: Phase,
        operation: Operation,
        out: &mut String,
        on_message: &mut dyn FnMut(EmitMessage),
    ) -> usize {
        if ty.derived_schemas.is_empty() {
            return 0;
        }

        let selected: Vec<_> = (self.registry.selected_static(ty.derived_schemas))
            .map(|(_, schema)| schema)
            .collect();
        let outer = selected.iter().fold(Guard::phase(&ty.name, operation), |guard, schema| {
            guard.or(&Guard::schema(&ty.name, &schema.name, operation))
        });

        let mut count = 0;
        outer.open(self.config, out);
        for schema in selected {
            let generate = match schema.generator(phase, operation) {
                Some(generate) => generate,
                None => continue,
            };

            let mut text = String::new();
            if generate(&mut text, ty, self.config).is_err() {
                on_message(generator_failed(schema, ty));
                continue;
            }

            let guard = Guard::schema(&ty.name, &schema.name, operation);
            guard.open(self.config, out);
            push_lines(out, &text);
            guard.close(self.config, out);
            count += 1;
        }
        outer.close(self.config, out);

        count
    }

    /// Expand the dynamic schemas selected by `ty`, returning the number of
    /// templates that expanded. A template with a structural error is
    /// reported and contributes nothing, without affecting the others.
    pub fn emit_dynamic(
        &self,
        ty: &CompoundType,
        out: &mut String,
        on_message: &mut dyn FnMut(EmitMessage),
    ) -> usize {
        let selected: Vec<_> = (self.registry.selected_dynamic(ty.derived_schemas))
            .map(|(_, schema)| schema)
            .collect();
        if selected.is_empty() {
            return 0;
        }

        let outer = selected.iter().fold(Guard::compound_type(&ty.name), |guard, schema| {
            guard.or(&Guard::dynamic_schema(&ty.name, &schema.name))
        });

        let mut count = 0;
        outer.open(self.config, out);
        for schema in selected {
            match template::expand_dynamic(ty, schema, self.config) {
                Ok(text) => {
                    let guard = Guard::dynamic_schema(&ty.name, &schema.name);
                    guard.open(self.config, out);
                    push_lines(out, &text);
                    guard.close(self.config, out);
                    count += 1;
                }
                Err(error) => on_message(EmitMessage::TemplateFailed {
                    schema: schema.name.clone(),
                    type_name: ty.name.clone(),
                    error,
                    template_range: schema.template_range,
                }),
            }
        }
        outer.close(self.config, out);

        count
    }
}

fn generator_failed(schema: &StaticSchema, ty: &CompoundType) -> EmitMessage {
    EmitMessage::GeneratorFailed {
        schema: schema.name.clone(),
        type_name: ty.name.clone(),
    }
}

/// Append `text`, keeping guard lines on lines of their own.
fn push_lines(out: &mut String, text: &str) {
    out.push_str(text);
    if !text.is_empty() && !text.ends_with('\n') {
        out.push('\n');
    }
}

//! Diagnostic messages produced while generating code.
//!
//! These can be converted to [`Diagnostic`]s in order to present them to the user.

use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::config::{self, Warning};
use crate::files::FileId;
use crate::schema::{self, RegistryError};
use crate::source::{ByteRange, FileRange};
use crate::template;

/// Global diagnostic messages
#[derive(Debug, Clone)]
pub enum Message {
    Scan(ScanMessage),
    Emit(EmitMessage),
    SchemaFile {
        file_id: FileId,
        error: schema::file::Error,
    },
    Registry(RegistryError),
    Config(config::Error),
    /// Generation was requested without an output directory.
    NoOutputDir,
    /// No input files were given or found in the include directories.
    NoInputs,
}

impl From<ScanMessage> for Message {
    fn from(message: ScanMessage) -> Message {
        Message::Scan(message)
    }
}

impl From<EmitMessage> for Message {
    fn from(message: EmitMessage) -> Message {
        Message::Emit(message)
    }
}

impl From<RegistryError> for Message {
    fn from(error: RegistryError) -> Message {
        Message::Registry(error)
    }
}

impl From<config::Error> for Message {
    fn from(error: config::Error) -> Message {
        Message::Config(error)
    }
}

impl Message {
    /// The warning that can switch this message off, if any.
    pub fn warning(&self) -> Option<Warning> {
        match self {
            Message::Scan(ScanMessage::UnknownAttribute { .. }) => Some(Warning::UnknownAttr),
            Message::NoOutputDir => Some(Warning::NoOutput),
            Message::NoInputs => Some(Warning::NoInclude),
            _ => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        match self {
            Message::Scan(message) => message.to_diagnostic(),
            Message::Emit(message) => message.to_diagnostic(),
            Message::SchemaFile { file_id, error } => Diagnostic::error()
                .with_message(format!("invalid schema file header: {error}"))
                .with_labels(vec![Label::primary(*file_id, error.range())])
                .with_notes(vec![
                    "schema files start with `name: \"<name>\", derive: \"<attribute>\"`".to_owned(),
                ]),
            Message::Registry(error) => Diagnostic::error().with_message(error.to_string()),
            Message::Config(error) => Diagnostic::error().with_message(error.to_string()),
            Message::NoOutputDir => Diagnostic::warning()
                .with_message("no output directory set")
                .with_notes(vec![
                    "units are written next to their inputs, and `derives.h` is not written"
                        .to_owned(),
                ]),
            Message::NoInputs => Diagnostic::warning().with_message("no files were included"),
        }
    }
}

/// Messages produced while scanning declarations
#[derive(Debug, Clone)]
pub enum ScanMessage {
    UnknownAttribute {
        range: FileRange,
        attribute: String,
        type_name: String,
        suggestion: Option<String>,
    },
    /// A `/*` with no matching `*/`, hiding the rest of the file.
    UnclosedBlockComment { range: FileRange },
}

impl ScanMessage {
    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        match self {
            ScanMessage::UnknownAttribute {
                range,
                attribute,
                type_name,
                suggestion,
            } => Diagnostic::warning()
                .with_message(format!(
                    "unknown attribute `{attribute}` on type `{type_name}`"
                ))
                .with_labels(vec![Label::primary(range.file_id(), *range)
                    .with_message("no schema derives this attribute")])
                .with_notes(match suggestion {
                    Some(suggestion) => vec![format!("help: did you mean `{suggestion}`?")],
                    None => Vec::new(),
                }),
            ScanMessage::UnclosedBlockComment { range } => Diagnostic::error()
                .with_message("unclosed block comment")
                .with_labels(vec![
                    Label::primary(range.file_id(), *range).with_message("comment starts here")
                ])
                .with_notes(vec![
                    "declarations after this point are not scanned".to_owned()
                ]),
        }
    }
}

/// Messages produced while emitting code
#[derive(Debug, Clone)]
pub enum EmitMessage {
    TemplateFailed {
        schema: String,
        type_name: String,
        error: template::Error,
        /// Where the template is in its schema file.
        template_range: Option<FileRange>,
    },
    GeneratorFailed {
        schema: String,
        type_name: String,
    },
}

impl EmitMessage {
    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        match self {
            EmitMessage::TemplateFailed {
                schema,
                type_name,
                error,
                template_range,
            } => {
                let labels = match template_range {
                    Some(template_range) => {
                        let range = ByteRange::from_offsets(error.range.start, error.range.end)
                            .shift(template_range.start());
                        vec![Label::primary(template_range.file_id(), range)
                            .with_message(error.kind.to_string())]
                    }
                    None => Vec::new(),
                };

                Diagnostic::error()
                    .with_message(format!("{error} in template of schema `{schema}`"))
                    .with_labels(labels)
                    .with_notes(vec![format!(
                        "no `{schema}` code was generated for `{type_name}`"
                    )])
            }
            EmitMessage::GeneratorFailed { schema, type_name } => Diagnostic::bug()
                .with_message(format!(
                    "schema `{schema}` failed to generate code for `{type_name}`"
                )),
        }
    }
}

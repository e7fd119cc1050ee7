use codespan_reporting::diagnostic::{Diagnostic, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::termcolor::{BufferedStandardStream, ColorChoice, WriteColor};
use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::{self, Config, OutputMode};
use crate::emit::unit::{self, GENERATED_EXTENSION};
use crate::emit::{Emitter, Operation};
use crate::files::{FileId, Files};
use crate::model::CompoundType;
use crate::reporting::Message;
use crate::scanner::Scanner;
use crate::schema::{self, SchemaRegistry};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Error => 1,
        }
    }
}

pub struct Driver {
    files: Files,
    config: Config,
    registry: SchemaRegistry,

    seen_errors: RefCell<bool>,
    codespan_config: codespan_reporting::term::Config,
    diagnostic_writer: RefCell<Box<dyn WriteColor>>,

    emit_width: usize,
    emit_writer: RefCell<Box<dyn WriteColor>>,
}

impl Driver {
    pub fn new() -> Driver {
        Driver {
            files: Files::new(),
            config: Config::default(),
            registry: SchemaRegistry::builtin(),

            seen_errors: RefCell::new(false),
            codespan_config: codespan_reporting::term::Config::default(),
            diagnostic_writer: RefCell::new(Box::new(BufferedStandardStream::stderr(
                if atty::is(atty::Stream::Stderr) {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                },
            ))),

            emit_width: usize::MAX,
            emit_writer: RefCell::new(Box::new(BufferedStandardStream::stdout(
                if atty::is(atty::Stream::Stdout) {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                },
            ))),
        }
    }

    /// Setup a global panic hook
    pub fn install_panic_hook(&self) {
        // Use the currently set codespan configuration
        let term_config = self.codespan_config.clone();
        // Fetch the default hook (which prints the panic message and an optional backtrace)
        let default_hook = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            let location = info.location();
            let message = if let Some(message) = info.payload().downcast_ref::<String>() {
                message.as_str()
            } else if let Some(message) = info.payload().downcast_ref::<&str>() {
                message
            } else {
                "unknown panic type"
            };

            let diagnostic = Diagnostic::bug()
                .with_message(format!("bk panicked at '{message}'"))
                .with_notes(vec![
                    match location {
                        Some(location) => format!("panicked at: {location}"),
                        None => "panicked at: unknown location".to_owned(),
                    },
                    "this is a bug in bk, please report it along with the input that caused it"
                        .to_owned(),
                ]);

            let mut writer = BufferedStandardStream::stderr(if atty::is(atty::Stream::Stderr) {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            });
            let dummy_files = SimpleFiles::<String, String>::new();

            default_hook(info);
            eprintln!();
            codespan_reporting::term::emit(&mut writer, &term_config, &dummy_files, &diagnostic)
                .unwrap();
        }));
    }

    /// Set the writer to use when rendering diagnostics
    pub fn set_diagnostic_writer(&mut self, stream: impl 'static + WriteColor) {
        self.diagnostic_writer = RefCell::new(Box::new(stream) as Box<dyn WriteColor>);
    }

    /// Set the width to use when pretty printing types
    pub fn set_emit_width(&mut self, emit_width: usize) {
        self.emit_width = emit_width;
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Read the configuration at `path`, or the default configuration file if
    /// it exists.
    pub fn load_config(&self, path: Option<&Path>) -> Option<Config> {
        let result = match path {
            Some(path) => Config::load(path, true),
            None => Config::load(Path::new(config::DEFAULT_CONFIG_PATH), false),
        };
        match result {
            Ok(config) => Some(config),
            Err(error) => {
                self.emit_message(Message::from(error));
                None
            }
        }
    }

    /// Load a source string into the file database.
    pub fn load_source_string(&mut self, name: String, source: String) -> FileId {
        self.files.add(name, source)
    }

    /// Load a source file into the file database using a reader.
    pub fn load_source(&mut self, name: String, mut reader: impl Read) -> Option<FileId> {
        let mut source = String::new();
        match reader.read_to_string(&mut source) {
            Ok(_) => Some(self.load_source_string(name, source)),
            Err(error) => {
                self.emit_read_diagnostic(name, error);
                None
            }
        }
    }

    /// Load a source file into the file database from the given path.
    pub fn load_source_path(&mut self, path: &Path) -> Option<FileId> {
        match std::fs::File::open(path) {
            Ok(file) => self.load_source(path.display().to_string(), file),
            Err(error) => {
                self.emit_read_diagnostic(path.display(), error);
                None
            }
        }
    }

    /// Load the configured schema files and register them after the
    /// built-in schemas.
    pub fn load_schemas(&mut self) -> Status {
        let mut dynamic_schemas = Vec::new();
        let mut status = Status::Ok;

        for path in self.config.schema_files.clone() {
            let file_id = match self.load_source_path(&path) {
                Some(file_id) => file_id,
                None => {
                    status = Status::Error;
                    continue;
                }
            };
            match schema::file::parse(file_id, self.files.source(file_id)) {
                Ok(schema) => dynamic_schemas.push(schema),
                Err(error) => {
                    self.emit_message(Message::SchemaFile { file_id, error });
                    status = Status::Error;
                }
            }
        }

        if status == Status::Error {
            return status;
        }

        match SchemaRegistry::with_dynamic(dynamic_schemas) {
            Ok(registry) => {
                self.registry = registry;
                Status::Ok
            }
            Err(error) => {
                self.emit_message(Message::from(error));
                Status::Error
            }
        }
    }

    /// Load the configured include files, followed by the inputs found in
    /// each include directory.
    pub fn load_inputs(&mut self) -> Vec<FileId> {
        let mut paths = self.config.include_files.clone();

        for dir in self.config.include_dirs.clone() {
            match include_dir_files(&dir) {
                Ok(dir_paths) => paths.extend(dir_paths),
                Err(error) => self.emit_read_diagnostic(dir.display(), error),
            }
        }

        let mut seen = Vec::with_capacity(paths.len());
        let mut file_ids = Vec::with_capacity(paths.len());
        for path in paths {
            if seen.contains(&path) {
                continue;
            }
            if let Some(file_id) = self.load_source_path(&path) {
                file_ids.push(file_id);
            }
            seen.push(path);
        }
        file_ids
    }

    /// Generate a unit for each input, writing it to the path given by the
    /// output mode, followed by the shared headers.
    pub fn generate(&mut self, inputs: &[FileId]) -> Status {
        let output_dir = self.config.output_dir.clone();
        let output_mode = self.config.output_mode;

        if inputs.is_empty() {
            self.emit_message(Message::NoInputs);
        }
        if output_dir.is_none() {
            self.emit_message(Message::NoOutputDir);
            if output_mode == OutputMode::Dir {
                self.emit_diagnostic(
                    Diagnostic::error()
                        .with_message("output mode `dir` requires an output directory")
                        .with_notes(vec!["set one with `--output-dir`".to_owned()]),
                );
                return Status::Error;
            }
        }
        if let Some(output_dir) = &output_dir {
            if let Err(error) = std::fs::create_dir_all(output_dir) {
                self.emit_write_diagnostic(output_dir.display(), error);
                return Status::Error;
            }
        }

        let mut seen_types = Vec::new();
        let mut index = 0;

        for &file_id in inputs {
            let name = self.files.name(file_id).to_owned();
            self.emit_note(format!("analyzing `{name}`"));

            let types = self.scan(file_id);
            if let Some(unit) = self.generate_unit(file_id, index, &types) {
                let path = unit::output_path(Path::new(&name), output_mode, output_dir.as_deref());
                if let Some(path) = path {
                    self.write_output(&path, &unit);
                }
                index += 1;
            }
            seen_types.extend(types);
        }

        if let Some(output_dir) = &output_dir {
            let derives = unit::derives_header(&self.registry);
            self.write_output(&output_dir.join(unit::DERIVES_HEADER), &derives);

            if self.config.generics {
                let generics =
                    unit::generics_header(&self.registry, &self.config.format, &seen_types);
                self.write_output(&output_dir.join(unit::GENERICS_HEADER), &generics);
            }
        }

        self.status()
    }

    /// Generate the unit for a single input and write it to the emit writer.
    pub fn generate_and_emit_unit(&mut self, file_id: FileId) -> Status {
        let types = self.scan(file_id);
        if let Some(unit) = self.generate_unit(file_id, 0, &types) {
            self.emit_text(&unit);
        }
        self.status()
    }

    /// Pretty print the compound types recognised in a file.
    pub fn emit_types(&self, file_id: FileId) -> Status {
        let types = self.scan(file_id);
        let arena = pretty::Arena::new();
        let context = crate::model::pretty::Context::new(&arena, &self.registry);

        for ty in &types {
            self.emit_doc(context.compound_type(ty).into_doc());
        }

        self.status()
    }

    /// Write the derive attribute header for the current registry.
    pub fn emit_derives(&self) -> Status {
        self.emit_text(&unit::derives_header(&self.registry));
        self.status()
    }

    pub fn status(&self) -> Status {
        match *self.seen_errors.borrow() {
            true => Status::Error,
            false => Status::Ok,
        }
    }

    fn operations(&self) -> Vec<Operation> {
        (Operation::ALL.into_iter())
            .filter(|operation| match operation {
                Operation::Dump => !self.config.disable_dump,
                Operation::Parse => !self.config.disable_parse,
            })
            .collect()
    }

    fn scan(&self, file_id: FileId) -> Vec<CompoundType> {
        let scanner = Scanner::new(&self.registry).derive_all(self.config.derive_all);
        scanner.scan(file_id, self.files.source(file_id), &mut |m| {
            self.emit_message(m.into());
        })
    }

    fn generate_unit(
        &self,
        file_id: FileId,
        index: usize,
        types: &[CompoundType],
    ) -> Option<String> {
        let emitter = Emitter::new(&self.registry, &self.config.format);
        let operations = self.operations();

        unit::generate_unit(
            &emitter,
            self.files.name(file_id),
            index,
            types,
            &operations,
            &mut |m| self.emit_message(m.into()),
        )
    }

    fn write_output(&self, path: &Path, contents: &str) {
        match std::fs::write(path, contents) {
            Ok(()) => self.emit_note(format!("generated `{}`", path.display())),
            Err(error) => self.emit_write_diagnostic(path.display(), error),
        }
    }

    fn emit_text(&self, text: &str) {
        let mut emit_writer = self.emit_writer.borrow_mut();
        write!(emit_writer, "{text}").unwrap();
        emit_writer.flush().unwrap();
    }

    fn emit_doc(&self, doc: pretty::RefDoc) {
        let mut emit_writer = self.emit_writer.borrow_mut();
        writeln!(emit_writer, "{}", doc.pretty(self.emit_width)).unwrap();
        emit_writer.flush().unwrap();
    }

    /// Report a message, unless it is a disabled warning or the run is silent.
    fn emit_message(&self, message: Message) {
        if let Some(warning) = message.warning() {
            if !self.config.warning_enabled(warning) {
                return;
            }
        }

        let diagnostic = message.to_diagnostic();
        if self.config.silent && diagnostic.severity < Severity::Error {
            return;
        }
        self.emit_diagnostic(diagnostic);
    }

    fn emit_note(&self, message: String) {
        if self.config.verbose && !self.config.silent {
            self.emit_diagnostic(Diagnostic::note().with_message(message));
        }
    }

    fn emit_diagnostic(&self, diagnostic: Diagnostic<FileId>) {
        let mut writer = self.diagnostic_writer.borrow_mut();
        let config = &self.codespan_config;

        codespan_reporting::term::emit(&mut *writer, config, &self.files, &diagnostic).unwrap();
        writer.flush().unwrap();

        if diagnostic.severity >= Severity::Error {
            *self.seen_errors.borrow_mut() = true;
        }
    }

    fn emit_read_diagnostic(&self, name: impl std::fmt::Display, error: io::Error) {
        let diagnostic =
            Diagnostic::error().with_message(format!("couldn't read `{name}`: {error}"));
        self.emit_diagnostic(diagnostic);
    }

    fn emit_write_diagnostic(&self, name: impl std::fmt::Display, error: io::Error) {
        let diagnostic =
            Diagnostic::error().with_message(format!("couldn't write `{name}`: {error}"));
        self.emit_diagnostic(diagnostic);
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Whether a file found in an include directory should be scanned.
fn is_input_file_name(name: &str) -> bool {
    (name.ends_with(".c") || name.ends_with(".h")) && !name.ends_with(GENERATED_EXTENSION)
}

/// The C sources and headers directly inside `dir`, sorted by path.
fn include_dir_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if is_input_file_name(&entry.file_name().to_string_lossy()) {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

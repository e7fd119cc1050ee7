use bookkeeper::config::{Config, OutputMode, Warning};
use bookkeeper::files::FileId;
use bookkeeper::{Driver, Status};
use clap::Parser;
use std::path::PathBuf;

/// Generate dump and parse code for annotated C structs
#[derive(Parser)]
#[clap(author, version, about)]
enum Cli {
    /// Generate a header for each input declaring annotated structs
    #[clap(after_help = GEN_COMMAND_AFTER_HELP)]
    Gen {
        /// C sources or headers to scan, or `-` to generate from stdin to stdout
        #[clap(name = "FILE")]
        files: Vec<PathOrStdin>,
        /// Scan every `.c` and `.h` file directly inside a directory
        #[clap(short = 'I', long = "include-dir", value_name = "DIR", display_order = 0)]
        include_dirs: Vec<PathBuf>,
        /// Directory for `derives.h`, `generics.h` and units in `dir` mode
        #[clap(short = 'o', long = "output-dir", value_name = "DIR", display_order = 1)]
        output_dir: Option<PathBuf>,
        /// Where generated units are written
        #[clap(long = "output-mode", value_enum, display_order = 2)]
        output_mode: Option<OutputMode>,
        #[clap(flatten)]
        schemas: SchemaArgs,
        /// Derive every schema for every struct, whatever its attributes
        #[clap(long = "derive-all")]
        derive_all: bool,
        /// Don't generate dump functions
        #[clap(long = "disable-dump")]
        disable_dump: bool,
        /// Don't generate parse functions
        #[clap(long = "disable-parse")]
        disable_parse: bool,
        /// Write guards that need an enable macro instead of a disable macro
        #[clap(long = "disabled")]
        disabled: bool,
        /// Write `generics.h` with `_Generic` dispatch macros
        #[clap(long = "generics")]
        generics: bool,
        /// Only report errors
        #[clap(long = "silent")]
        silent: bool,
        /// Report each file as it is analyzed and generated
        #[clap(long = "verbose", conflicts_with = "silent")]
        verbose: bool,
        /// Enable a warning
        #[clap(short = 'W', long = "warn", value_name = "WARNING", value_enum)]
        warn: Vec<Warning>,
        /// Disable a warning
        #[clap(long = "no-warn", value_name = "WARNING", value_enum)]
        no_warn: Vec<Warning>,
        #[clap(flatten)]
        format: FormatArgs,
    },
    /// Print the structs recognised in a file, and the schemas they derive
    Types {
        /// C source or header to scan
        #[clap(name = "FILE")]
        file: PathOrStdin,
        #[clap(flatten)]
        schemas: SchemaArgs,
        /// Derive every schema for every struct, whatever its attributes
        #[clap(long = "derive-all")]
        derive_all: bool,
    },
    /// Print a header defining every derive attribute as an empty macro
    Derives {
        #[clap(flatten)]
        schemas: SchemaArgs,
    },
}

const GEN_COMMAND_AFTER_HELP: &str = "\
Examples:

  $ bk gen src/person.h
  $ bk gen -I src -o gen --output-mode dir --generics
  $ bk gen --schema schemas/xml.bks - < src/person.h
";

#[derive(clap::Args)]
struct SchemaArgs {
    /// Configuration file, instead of `.bk.toml` in the working directory
    #[clap(long = "config", value_name = "CONFIG_FILE")]
    config_file: Option<PathBuf>,
    /// Register a dynamic schema from a file
    #[clap(long = "schema", value_name = "SCHEMA_FILE")]
    schema_files: Vec<PathBuf>,
}

#[derive(clap::Args)]
struct FormatArgs {
    /// Macro used to write formatted output
    #[clap(long = "fmt-macro", value_name = "NAME")]
    fmt_macro: Option<String>,
    /// Type of the destination passed to dump functions
    #[clap(long = "dst-type", value_name = "NAME")]
    dst_type: Option<String>,
    /// Type of the offset accumulated by dump functions
    #[clap(long = "offset-type", value_name = "NAME")]
    offset_type: Option<String>,
    /// Macro guarding implementations
    #[clap(long = "impl-macro", value_name = "NAME")]
    impl_macro: Option<String>,
    #[clap(long = "disable-prefix", value_name = "PREFIX")]
    disable_prefix: Option<String>,
    #[clap(long = "enable-prefix", value_name = "PREFIX")]
    enable_prefix: Option<String>,
}

impl FormatArgs {
    fn apply(self, config: &mut Config) {
        let format = &mut config.format;
        let overrides = [
            (self.fmt_macro, &mut format.fmt_macro),
            (self.dst_type, &mut format.dst_type),
            (self.offset_type, &mut format.offset_type),
            (self.impl_macro, &mut format.implementation_macro),
            (self.disable_prefix, &mut format.disable_prefix),
            (self.enable_prefix, &mut format.enable_prefix),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

#[derive(Clone, Debug)]
enum PathOrStdin {
    StdIn,
    Path(PathBuf),
}

impl std::str::FromStr for PathOrStdin {
    type Err = std::convert::Infallible;

    fn from_str(src: &str) -> Result<PathOrStdin, std::convert::Infallible> {
        match src {
            "-" => Ok(PathOrStdin::StdIn),
            _ => Ok(PathOrStdin::Path(PathBuf::from(src))),
        }
    }
}

fn unwrap_or_exit<T>(option: Option<T>) -> T {
    option.unwrap_or_else(|| std::process::exit(Status::Error.exit_code()))
}

fn load_file_or_exit(driver: &mut Driver, file: PathOrStdin) -> FileId {
    unwrap_or_exit(match file {
        PathOrStdin::StdIn => driver.load_source("<stdin>".to_owned(), std::io::stdin()),
        PathOrStdin::Path(path) => driver.load_source_path(&path),
    })
}

/// Load the configuration file and the schemas it names, along with any
/// given on the command line.
fn load_config_or_exit(driver: &mut Driver, schemas: SchemaArgs) -> Config {
    let mut config = unwrap_or_exit(driver.load_config(schemas.config_file.as_deref()));
    config.schema_files.extend(schemas.schema_files);
    config
}

fn load_schemas_or_exit(driver: &mut Driver, config: Config) {
    driver.set_config(config);
    if driver.load_schemas() == Status::Error {
        std::process::exit(Status::Error.exit_code());
    }
}

const MAX_PRETTY_WIDTH: usize = 80;

fn get_pretty_width() -> usize {
    let term_width = termsize::get().map_or(usize::MAX, |size| usize::from(size.cols));
    std::cmp::min(term_width, MAX_PRETTY_WIDTH)
}

fn main() -> ! {
    match Cli::parse() {
        Cli::Gen {
            files,
            include_dirs,
            output_dir,
            output_mode,
            schemas,
            derive_all,
            disable_dump,
            disable_parse,
            disabled,
            generics,
            silent,
            verbose,
            warn,
            no_warn,
            format,
        } => {
            let mut driver = Driver::new();
            driver.install_panic_hook();

            let mut config = load_config_or_exit(&mut driver, schemas);
            let mut read_stdin = false;
            for file in files {
                match file {
                    PathOrStdin::StdIn => read_stdin = true,
                    PathOrStdin::Path(path) => config.include_files.push(path),
                }
            }
            config.include_dirs.extend(include_dirs);
            config.output_dir = output_dir.or(config.output_dir);
            config.output_mode = output_mode.unwrap_or(config.output_mode);
            config.derive_all |= derive_all;
            config.disable_dump |= disable_dump;
            config.disable_parse |= disable_parse;
            config.format.disabled_by_default |= disabled;
            config.generics |= generics;
            config.silent = (config.silent || silent) && !verbose;
            config.verbose = (config.verbose || verbose) && !silent;
            for warning in warn {
                config.set_warning(warning, true);
            }
            for warning in no_warn {
                config.set_warning(warning, false);
            }
            format.apply(&mut config);

            // Stdin on its own doesn't need the rest of the generation pass
            let stdin_only =
                read_stdin && config.include_files.is_empty() && config.include_dirs.is_empty();
            load_schemas_or_exit(&mut driver, config);

            let mut status = Status::Ok;
            if !stdin_only {
                let inputs = driver.load_inputs();
                status = driver.generate(&inputs);
            }
            if read_stdin {
                let file_id = load_file_or_exit(&mut driver, PathOrStdin::StdIn);
                status = driver.generate_and_emit_unit(file_id);
            }

            std::process::exit(status.exit_code());
        }
        Cli::Types {
            file,
            schemas,
            derive_all,
        } => {
            let mut driver = Driver::new();
            driver.install_panic_hook();
            driver.set_emit_width(get_pretty_width());

            let mut config = load_config_or_exit(&mut driver, schemas);
            config.derive_all |= derive_all;
            load_schemas_or_exit(&mut driver, config);

            let file_id = load_file_or_exit(&mut driver, file);
            let status = driver.emit_types(file_id);

            std::process::exit(status.exit_code());
        }
        Cli::Derives { schemas } => {
            let mut driver = Driver::new();
            driver.install_panic_hook();

            let config = load_config_or_exit(&mut driver, schemas);
            load_schemas_or_exit(&mut driver, config);
            let status = driver.emit_derives();

            std::process::exit(status.exit_code());
        }
    }
}

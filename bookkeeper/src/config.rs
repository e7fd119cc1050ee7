//! Run configuration, read from a TOML file and overridden on the command
//! line.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".bk.toml";

/// Names threaded through generated code. Generators treat every value as
/// opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
#[serde(default)]
pub struct FormatConfig {
    /// Macro used to write formatted output, called like `printf`.
    pub fmt_macro: String,
    /// Type of the `dst` parameter of dump functions.
    pub dst_type: String,
    /// Type of the `offset` accumulator in dump functions.
    pub offset_type: String,
    /// Macro that must be defined for implementations to be compiled.
    pub implementation_macro: String,
    pub disable_prefix: String,
    pub enable_prefix: String,
    /// Write guards that require an enable macro rather than allowing
    /// everything until a disable macro is defined.
    pub disabled_by_default: bool,
}

impl Default for FormatConfig {
    fn default() -> FormatConfig {
        FormatConfig {
            fmt_macro: "BK_FMT".to_owned(),
            dst_type: "BK_FMT_DST_t".to_owned(),
            offset_type: "BK_OFFSET_t".to_owned(),
            implementation_macro: "BK_IMPLEMENTATION".to_owned(),
            disable_prefix: "BK_DISABLE_".to_owned(),
            enable_prefix: "BK_ENABLE_".to_owned(),
            disabled_by_default: false,
        }
    }
}

/// Where generated units are written.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Next to each input, as `<input>.bk.h`.
    Mirror,
    /// In the output directory, as `<file name>.bk.h`.
    Dir,
}

/// Warnings that can be switched on and off.
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum Warning {
    /// A type used an attribute that no schema derives.
    UnknownAttr,
    /// No output directory was set.
    NoOutput,
    /// No input files were given or found.
    NoInclude,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
#[serde(default)]
pub struct Config {
    pub include_files: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_mode: OutputMode,
    pub schema_files: Vec<PathBuf>,
    /// Derive every schema for every type, whatever its attributes.
    pub derive_all: bool,
    pub disable_dump: bool,
    pub disable_parse: bool,
    /// Write `generics.h` with `_Generic` dispatch macros.
    pub generics: bool,
    pub silent: bool,
    pub verbose: bool,
    pub warn_unknown_attr: bool,
    pub warn_no_output: bool,
    pub warn_no_include: bool,
    pub format: FormatConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            include_files: Vec::new(),
            include_dirs: Vec::new(),
            output_dir: None,
            output_mode: OutputMode::Mirror,
            schema_files: Vec::new(),
            derive_all: false,
            disable_dump: false,
            disable_parse: false,
            generics: false,
            silent: false,
            verbose: false,
            warn_unknown_attr: true,
            warn_no_output: true,
            warn_no_include: false,
            format: FormatConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(source)
    }

    /// Read a configuration file. A missing file is only an error if it was
    /// asked for explicitly.
    pub fn load(path: &Path, required: bool) -> Result<Config, Error> {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(error) if !required && error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Config::default());
            }
            Err(error) => {
                return Err(Error::Read {
                    path: path.to_owned(),
                    error: error.to_string(),
                })
            }
        };

        Config::from_toml(&source).map_err(|error| Error::Parse {
            path: path.to_owned(),
            error,
        })
    }

    pub fn warning_enabled(&self, warning: Warning) -> bool {
        match warning {
            Warning::UnknownAttr => self.warn_unknown_attr,
            Warning::NoOutput => self.warn_no_output,
            Warning::NoInclude => self.warn_no_include,
        }
    }

    pub fn set_warning(&mut self, warning: Warning, enabled: bool) {
        match warning {
            Warning::UnknownAttr => self.warn_unknown_attr = enabled,
            Warning::NoOutput => self.warn_no_output = enabled,
            Warning::NoInclude => self.warn_no_include = enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Read { path: PathBuf, error: String },
    Parse { path: PathBuf, error: toml::de::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Read { path, error } => {
                write!(f, "couldn't read config `{}`: {error}", path.display())
            }
            Error::Parse { path, error } => {
                write!(f, "invalid config `{}`: {error}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {}

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default report width in columns.
pub const DEFAULT_WIDTH: usize = 70;

/// Default bytecode format name.
pub const DEFAULT_FORMAT: &str = "2.7";

/// Name of the optional per-project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "compage.json";

/// Runtime configuration for the compage CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Bytecode format name ("2.6" or "2.7").
    pub format: String,

    /// Report width in columns.
    pub width: usize,

    /// Worker threads for directory scans. `None` lets rayon decide.
    pub jobs: Option<usize>,

    /// Host interpreter used to compile sources.
    pub python: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            format: DEFAULT_FORMAT.to_string(),
            width: DEFAULT_WIDTH,
            jobs: None,
            python: None,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set the bytecode format name.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Set the report width.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Set the number of scan threads.
    #[must_use]
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the host interpreter.
    #[must_use]
    pub fn with_python(mut self, python: Option<PathBuf>) -> Self {
        self.python = python;
        self
    }

    /// Fill the values the command line left unset from a project file.
    ///
    /// `width`, `format` and `python` only take the project value when the
    /// current value is still the built-in default.
    #[must_use]
    pub fn merged_with(mut self, project: &ProjectConfig) -> Self {
        if self.width == DEFAULT_WIDTH {
            if let Some(width) = project.width {
                self.width = width;
            }
        }
        if self.format == DEFAULT_FORMAT {
            if let Some(format) = &project.format {
                self.format.clone_from(format);
            }
        }
        if self.python.is_none() {
            self.python.clone_from(&project.python);
        }
        self
    }
}

/// Per-project settings read from `compage.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Packages the project declares as required.
    pub required: Vec<String>,

    /// Top-level module names left out of reports.
    pub ignore: Vec<String>,

    pub width: Option<usize>,
    pub format: Option<String>,
    pub python: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load `compage.json` from `root` (or from the parent of `root` when it
    /// names a file). A missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let dir = if root.is_file() {
            root.parent().unwrap_or_else(|| Path::new("."))
        } else {
            root
        };
        let path = dir.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_path(&path)
    }

    /// Parse a configuration file at an explicit path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

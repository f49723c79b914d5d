#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]

mod commands;
mod logging;

use clap::Parser;
use compage_core::config::DEFAULT_FORMAT;
use compage_core::Config;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "compage")]
#[command(author, version, about = "Import reports for CPython 2 code bases", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// List the imports of one source file
    Scan {
        /// Python source file
        file: PathBuf,

        /// Bytecode format: 2.6 or 2.7
        #[arg(long, default_value = DEFAULT_FORMAT)]
        format: String,

        /// Host interpreter used to compile the source
        #[arg(long, value_name = "PATH")]
        python: Option<PathBuf>,

        /// Read the sibling .pyc instead of compiling
        #[arg(long)]
        pyc: bool,
    },

    /// Aggregate imports over a directory and print a report
    Report {
        /// File or directory to scan (defaults to the working directory)
        root: Option<PathBuf>,

        /// Packages the project requires
        #[arg(long, value_delimiter = ',')]
        required: Vec<String>,

        /// Top-level modules to leave out
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,

        /// Report width in columns
        #[arg(long)]
        width: Option<usize>,

        /// Report a single module
        #[arg(long, value_name = "NAME", conflicts_with_all = ["rank", "dependencies"])]
        module: Option<String>,

        /// Rank modules by import count
        #[arg(long, conflicts_with = "dependencies")]
        rank: bool,

        /// Compare imports with the required packages
        #[arg(long)]
        dependencies: bool,

        /// Worker threads (1 scans sequentially)
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Bytecode format: 2.6 or 2.7
        #[arg(long, default_value = DEFAULT_FORMAT)]
        format: String,

        /// Host interpreter used to compile sources
        #[arg(long, value_name = "PATH")]
        python: Option<PathBuf>,

        /// Read sibling .pyc files instead of compiling
        #[arg(long)]
        pyc: bool,

        /// Write the report to a file instead of stdout
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Compile a source file with the host interpreter and save the .pyc
    Compile {
        /// Python source file
        file: PathBuf,

        /// Output .pyc path
        #[arg(long, value_name = "OUT")]
        emit: PathBuf,

        /// Bytecode format the host must produce: 2.6 or 2.7
        #[arg(long, default_value = DEFAULT_FORMAT)]
        format: String,

        /// Host interpreter
        #[arg(long, value_name = "PATH")]
        python: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(cli.json),
        Some(Commands::Scan {
            file,
            format,
            python,
            pyc,
        }) => {
            let span = tracing::info_span!("scan", cmd = "scan", cwd = %cwd.display());
            let _guard = span.enter();
            let config = config.with_format(format).with_python(python);
            commands::scan::run(&config, &file, pyc, cli.json)
        }
        Some(Commands::Report {
            root,
            required,
            ignore,
            width,
            module,
            rank,
            dependencies,
            jobs,
            format,
            python,
            pyc,
            output,
        }) => {
            let span = tracing::info_span!("report", cmd = "report", cwd = %cwd.display());
            let _guard = span.enter();
            let mut config = config
                .with_format(format)
                .with_python(python)
                .with_jobs(jobs);
            if let Some(width) = width {
                config = config.with_width(width);
            }
            let kind = match (module, rank, dependencies) {
                (Some(name), _, _) => commands::report::ReportKind::Module(name),
                (None, true, _) => commands::report::ReportKind::Rank,
                (None, false, true) => commands::report::ReportKind::Dependencies,
                (None, false, false) => commands::report::ReportKind::Imports,
            };
            let action = commands::report::ReportAction {
                root: root.unwrap_or_else(|| cwd.clone()),
                required,
                ignore,
                kind,
                pyc,
                output,
            };
            commands::report::run(&config, action, cli.json)
        }
        Some(Commands::Compile {
            file,
            emit,
            format,
            python,
        }) => {
            let config = config.with_format(format).with_python(python);
            commands::compile::run(&config, &file, &emit, cli.json)
        }
    }
}

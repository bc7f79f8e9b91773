use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, warn};

use vscov::cli::{self, TreeOptions};
use vscov::config;
use vscov::model::{ReportConfiguration, ReportFormat, ViewLevel};
use vscov::view::ColumnPreset;

/// vscov: inspect, merge and report on Visual Studio coverage XML files.
#[derive(Parser)]
#[command(name = "vscov", version, about)]
struct Cli {
    /// Directory for cached report assets (default: per-machine data dir)
    #[arg(long, global = true, env = "VSCOV_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show line and block totals for each coverage file.
    Summary {
        /// Coverage files (.coveragexml).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show the coverage tree expanded to a given level.
    Tree {
        /// Coverage files (.coveragexml).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Deepest level to show.
        #[arg(long, value_enum, default_value_t = ViewLevel::Classes)]
        level: ViewLevel,

        /// Column preset.
        #[arg(long, value_enum, default_value_t = ColumnPreset::All)]
        columns: ColumnPreset,

        /// Covered ratio (0.0-1.0) at or above which a node is marked covered.
        #[arg(long, default_value_t = config::DEFAULT_THRESHOLD)]
        threshold: f64,

        /// JSON metadata used to rename types and members.
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Merge coverage files into one, renumbering source file IDs.
    Merge {
        /// Coverage files to merge, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination coverage file.
        #[arg(short, long)]
        output: PathBuf,

        /// Full name of a node to drop before merging, e.g. "[app.dll]App.Program".
        /// May be repeated.
        #[arg(long)]
        remove: Vec<String>,
    },

    /// Generate an HTML coverage report.
    Report {
        /// Coverage files to include.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination HTML file.
        #[arg(short, long)]
        output: PathBuf,

        /// Project name shown in the report.
        #[arg(long, default_value = "Coverage")]
        name: String,

        /// single: one HTML file using a CDN script; multi: HTML plus a
        /// `<name>_files` folder that works offline.
        #[arg(long, value_enum, default_value_t = ReportFormat::HtmlSingleFile)]
        format: ReportFormat,

        /// Level the report is expanded to when opened.
        #[arg(long, value_enum, default_value_t = ViewLevel::Classes)]
        expand: ViewLevel,

        /// Open the report when done.
        #[arg(long)]
        open: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(config::data_directory);
    debug!("Using data directory {}", data_dir.display());

    let output = match cli.command {
        Commands::Summary { files, json } => {
            let session = cli::open_session(&files)?;
            cli::cmd_summary(&session, json)?
        }
        Commands::Tree {
            files,
            level,
            columns,
            threshold,
            metadata,
        } => {
            let mut session = cli::open_session(&files)?;
            let options = TreeOptions {
                level,
                columns,
                threshold,
                metadata: metadata.as_deref(),
            };
            cli::cmd_tree(&mut session, &options)?
        }
        Commands::Merge {
            files,
            output,
            remove,
        } => {
            let mut session = cli::open_session(&files)?;
            cli::cmd_merge(&mut session, &output, &remove)?
        }
        Commands::Report {
            files,
            output,
            name,
            format,
            expand,
            open,
        } => {
            let session = cli::open_session(&files)?;
            let config = ReportConfiguration {
                destination_path: output,
                project_name: name,
                default_expansion: expand,
                report_format: format,
                open_when_done: open,
            };
            let out = cli::cmd_report(&session, &config, &data_dir)?;
            if config.open_when_done {
                if let Err(e) = open_in_browser(&config.destination_path) {
                    warn!("{:#}", e);
                }
            }
            out
        }
    };

    print!("{}", output);
    Ok(())
}

fn open_in_browser(path: &Path) -> Result<()> {
    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };

    command
        .arg(path)
        .spawn()
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(())
}

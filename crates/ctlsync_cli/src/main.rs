//! ctlsync CLI
//!
//! Command-line tools for keeping control mappings and evidence records in
//! step with a compliance platform.
//!
//! # Commands
//!
//! - `reconcile` - Merge missing control mappings from a master table into a target table
//! - `probe` - Check API connectivity and credentials
//! - `list`, `get`, `search`, `export` - Read evidence records
//! - `create`, `update`, `delete`, `associate` - Change evidence records
//! - `projects`, `controls` - List association targets
//!
//! Remote commands read `CTLSYNC_API_URL` and `CTLSYNC_API_KEY` from flags,
//! the environment, or a `.env` file.

mod commands;

use clap::{Args, Parser, Subcommand};
use commands::evidence::{self, CreateArgs};
use commands::io::{read_items, CliResult};
use commands::reconcile::{self, ReconcileArgs};
use ctlsync_reconcile::ColumnSpec;
use ctlsync_remote::{BulkOptions, RecordId, RecordInput, RecordRef, SubjectType};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Control mapping reconciliation and evidence sync tools.
#[derive(Parser)]
#[command(name = "ctlsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the remote API
    #[arg(global = true, long, env = "CTLSYNC_API_URL")]
    api_url: Option<String>,

    /// API bearer token
    #[arg(global = true, long, env = "CTLSYNC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which record a command acts on.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Record id
    #[arg(long)]
    id: Option<String>,

    /// Record name (case-insensitive, must be unique)
    #[arg(long = "by-name")]
    by_name: Option<String>,
}

impl Target {
    fn to_ref(&self) -> CliResult<RecordRef> {
        match (&self.id, &self.by_name) {
            (Some(id), _) => {
                let id = RecordId::new(id.trim());
                id.validate()?;
                Ok(RecordRef::ById(id))
            }
            (None, Some(name)) => Ok(RecordRef::ByName(name.clone())),
            (None, None) => Err("pass --id or --by-name".into()),
        }
    }
}

/// Record fields settable from the command line.
#[derive(Args)]
struct Fields {
    /// Record name
    #[arg(short, long)]
    name: Option<String>,

    /// Caller-assigned reference id
    #[arg(short, long)]
    reference_id: Option<String>,

    /// Description
    #[arg(short, long)]
    description: Option<String>,

    /// Collection instructions
    #[arg(short, long)]
    instructions: Option<String>,

    /// Remarks or notes
    #[arg(long)]
    remarks: Option<String>,

    /// Whether collection is automated
    #[arg(long)]
    automated: Option<bool>,
}

impl Fields {
    fn to_input(&self) -> RecordInput {
        let mut input = RecordInput::new();
        let text = [
            ("name", &self.name),
            ("referenceId", &self.reference_id),
            ("description", &self.description),
            ("instructions", &self.instructions),
            ("remarks", &self.remarks),
        ];
        for (key, value) in text {
            if let Some(value) = value {
                input.set(key, value.as_str());
            }
        }
        if let Some(automated) = self.automated {
            input.set("automated", automated);
        }
        input
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Merge missing control mappings from a master table into a target table
    Reconcile {
        /// Master table (JSON)
        #[arg(short, long)]
        master: PathBuf,

        /// Target table to update (JSON)
        #[arg(short, long)]
        target: PathBuf,

        /// Column holding the capability name
        #[arg(long, default_value = "Solution Capability")]
        key_column: String,

        /// Column holding newline-delimited mappings
        #[arg(long, default_value = "Suggested Mappings")]
        tags_column: String,

        /// Dry run - show what would change
        #[arg(long)]
        dry_run: bool,

        /// Backup directory (default: "backups" next to the target)
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// Write the result here instead of over the target
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check API connectivity and credentials
    Probe,

    /// List all evidence records
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one evidence record
    Get {
        #[command(flatten)]
        target: Target,
    },

    /// Create evidence records from a JSON file or from flags
    Create {
        /// JSON file holding a list of records
        #[arg(short, long, conflicts_with = "name")]
        file: Option<PathBuf>,

        #[command(flatten)]
        fields: Fields,

        /// Create records even when a duplicate exists
        #[arg(long)]
        allow_duplicates: bool,

        /// Skip the duplicate check entirely
        #[arg(long)]
        no_duplicate_check: bool,

        /// Dry run - show what would be created
        #[arg(long)]
        dry_run: bool,
    },

    /// Update fields of one evidence record
    Update {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        fields: Fields,
    },

    /// Delete one evidence record
    Delete {
        #[command(flatten)]
        target: Target,
    },

    /// Link an evidence record to a control implementation or capability
    Associate {
        #[command(flatten)]
        target: Target,

        /// Subject id
        #[arg(long)]
        subject: String,

        /// Subject type (control-implementation, solution-capability)
        #[arg(long, default_value = "control-implementation")]
        subject_type: String,
    },

    /// Search evidence by name or reference id
    Search {
        /// Text to look for
        term: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Export all evidence records to a JSON file
    Export {
        /// Output file
        path: PathBuf,
    },

    /// List projects
    Projects {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List control implementations of a project
    Controls {
        /// Project id
        project: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> CliResult<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Reconcile {
        master,
        target,
        key_column,
        tags_column,
        dry_run,
        backup_dir,
        output,
    } = &cli.command
    {
        reconcile::run(&ReconcileArgs {
            master,
            target,
            columns: ColumnSpec::new(key_column, tags_column),
            dry_run: *dry_run,
            backup_dir: backup_dir.as_deref(),
            output: output.as_deref(),
        })?;
        return Ok(());
    }

    let api_url = cli
        .api_url
        .as_deref()
        .ok_or("API URL required: set CTLSYNC_API_URL or pass --api-url")?;
    let api_key = cli
        .api_key
        .as_deref()
        .ok_or("API key required: set CTLSYNC_API_KEY or pass --api-key")?;
    let store = evidence::connect(api_url, api_key)?;

    match cli.command {
        Commands::Reconcile { .. } => {}
        Commands::Probe => evidence::probe(&store)?,
        Commands::List { format } => {
            evidence::list(&store, &format)?;
        }
        Commands::Get { target } => {
            evidence::get(&store, &target.to_ref()?)?;
        }
        Commands::Create {
            file,
            fields,
            allow_duplicates,
            no_duplicate_check,
            dry_run,
        } => {
            let items = match file {
                Some(path) => read_items(&path)?,
                None => vec![fields.to_input()],
            };
            let args = CreateArgs {
                options: BulkOptions::default()
                    .with_check_duplicates(!no_duplicate_check)
                    .with_allow_duplicates(allow_duplicates),
                dry_run,
            };
            if !dry_run {
                evidence::probe(&store)?;
            }
            evidence::create(&store, &items, args)?;
        }
        Commands::Update { target, fields } => {
            evidence::update(&store, &target.to_ref()?, &fields.to_input())?;
        }
        Commands::Delete { target } => {
            evidence::delete(&store, &target.to_ref()?)?;
        }
        Commands::Associate {
            target,
            subject,
            subject_type,
        } => {
            let subject_type: SubjectType = subject_type.parse()?;
            evidence::associate(&store, &target.to_ref()?, &subject, subject_type)?;
        }
        Commands::Search { term, format } => {
            evidence::search(&store, &term, &format)?;
        }
        Commands::Export { path } => {
            evidence::export(&store, &path)?;
        }
        Commands::Projects { format } => evidence::projects(&store, &format)?,
        Commands::Controls { project, format } => {
            evidence::controls(&store, &project, &format)?
        }
    }

    Ok(())
}

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lendlog_types::LoanKind;

#[derive(Parser)]
#[command(
    name = "lendlog",
    about = "Lendlog: library checkout ledger and lending desk",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file; missing means defaults.
    #[arg(short, long, global = true, env = "LENDLOG_CONFIG", default_value = "lendlog.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP service
    Serve(ServeArgs),
    /// Show the catalog with current availability
    Catalog(CatalogArgs),
    /// List borrowers currently holding books
    Borrowers,
    /// Show open loans with days held and overdue status
    Overdue(OverdueArgs),
    /// Show ledger history, newest first
    History(HistoryArgs),
    /// Append a borrow or return to the ledger
    Record(RecordArgs),
    /// Report ledger anomalies
    Audit,
    /// Create or replace a borrower account
    Register(RegisterArgs),
    /// Print an Argon2id hash for a password
    HashPassword(HashPasswordArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Directory with front-end assets
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct CatalogArgs {
    /// Hide titles with no copies on the shelf
    #[arg(long)]
    pub available: bool,
}

#[derive(Args)]
pub struct OverdueArgs {
    /// Include loans that are not yet overdue
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// Only events belonging to this account email
    pub email: Option<String>,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct RecordArgs {
    pub action: ActionArg,
    pub student: String,
    pub book: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ActionArg {
    Borrow,
    Return,
}

impl From<ActionArg> for LoanKind {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Borrow => LoanKind::Borrow,
            ActionArg::Return => LoanKind::Return,
        }
    }
}

#[derive(Args)]
pub struct RegisterArgs {
    pub email: String,
    pub name: String,
    #[arg(long, env = "LENDLOG_ACCOUNT_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub student_id: Option<String>,
}

#[derive(Args)]
pub struct HashPasswordArgs {
    pub password: String,
}

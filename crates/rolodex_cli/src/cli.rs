use clap::{Args, Parser, Subcommand, ValueEnum};
use rolodex_core::sanitize::check_for_date;
use rolodex_core::{Date, EntityId, InteractionType};
use std::path::PathBuf;

/// Top-level CLI parser for the `rolodex` binary.
#[derive(Debug, Parser)]
#[command(name = "rolodex", version, about = "Rolodex - contacts, history and tasks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// SQLite database file (overrides `database_path`)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Rolling log directory; logs go to stderr when unset
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add a contact; `@todo` lines of the note become tasks.
    Add(ContactArgs),
    /// Edit a contact; its tasks are rebuilt from the note.
    Edit(EditArgs),
    /// Remove a contact and its tasks.
    Remove { id: EntityId },
    /// List contacts.
    List(ListArgs),
    /// List tasks of all contacts.
    Tasks(TaskArgs),
    /// Show interaction history, newest first.
    History(HistoryArgs),
    /// Print entity counts.
    Stats,
    /// Write every contact, task and interaction to a JSON file.
    Export { path: PathBuf },
    /// Import a JSON file produced by `export`.
    Import { path: PathBuf },
}

#[derive(Debug, Args)]
pub struct ContactArgs {
    #[arg(long)]
    pub first: String,
    #[arg(long)]
    pub last: String,
    #[command(flatten)]
    pub profile: ProfileFields,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    pub id: EntityId,
    #[arg(long)]
    pub first: Option<String>,
    #[arg(long)]
    pub last: Option<String>,
    #[command(flatten)]
    pub profile: ProfileFields,
}

/// Optional profile fields; unset fields keep their value on edit.
#[derive(Debug, Args)]
pub struct ProfileFields {
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    /// Free-text note, e.g. "@todo Call back @date 01/12/2025"
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortKey {
    Name,
    Date,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Substring of "Last First"
    #[arg(long)]
    pub name: Option<String>,
    /// Substring of the company
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long, value_enum, default_value = "name")]
    pub sort: SortKey,
    #[arg(long)]
    pub reverse: bool,
}

#[derive(Debug, Args)]
pub struct TaskArgs {
    /// Substring of the owner name, description or dd/mm/yyyy date
    #[arg(long, default_value = "")]
    pub search: String,
    /// Only tasks without a due date
    #[arg(long)]
    pub urgent: bool,
    /// dd/mm/yyyy
    #[arg(long, value_parser = parse_date)]
    pub from: Option<Date>,
    /// dd/mm/yyyy
    #[arg(long, value_parser = parse_date)]
    pub to: Option<Date>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum HistoryKind {
    Added,
    Removed,
    Edited,
    Other,
}

impl From<HistoryKind> for InteractionType {
    fn from(value: HistoryKind) -> Self {
        match value {
            HistoryKind::Added => Self::ContactAdded,
            HistoryKind::Removed => Self::ContactRemoved,
            HistoryKind::Edited => Self::ContactEdited,
            HistoryKind::Other => Self::Unclassified,
        }
    }
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Only interactions owned by this contact
    #[arg(long)]
    pub contact: Option<EntityId>,
    #[arg(long, value_enum)]
    pub kind: Option<HistoryKind>,
    /// dd/mm/yyyy
    #[arg(long, value_parser = parse_date)]
    pub from: Option<Date>,
    /// dd/mm/yyyy
    #[arg(long, value_parser = parse_date)]
    pub to: Option<Date>,
}

fn parse_date(value: &str) -> Result<Date, String> {
    check_for_date(value).ok_or_else(|| format!("`{value}` is not a dd/mm/yyyy date"))
}

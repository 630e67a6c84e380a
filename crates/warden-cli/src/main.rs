//! Command-line host for the mediated file authority.
//!
//! Unlike a server-fronted client, this binary embeds `warden-core`
//! directly: there is no RPC hop, the process *is* the authority for the
//! duration of the call. A single built-in `Admin` principal is
//! registered at startup; future revisions may read caller identity from
//! the environment the way this crate's `VAULT_TOKEN`-style sibling does.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use warden_core::{
    AuthorityConfig, AuthorityFacade, BinaryKind, Operation, PolicyDocument, Role,
};
use warden_storage::{Filesystem, LocalFilesystem};

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Mediated file authority for a game server's managed content tree",
    long_about = None
)]
struct Cli {
    /// Root directory the authority confines all operations to.
    #[arg(long, env = "WARDEN_GAME_ROOT")]
    game_root: PathBuf,

    /// Directory backups and the audit log are stored under.
    #[arg(long, env = "WARDEN_BACKUP_ROOT")]
    backup_root: PathBuf,

    /// Role the CLI session acts as.
    #[arg(long, value_enum, default_value = "admin")]
    role: CliRole,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliRole {
    Admin,
    GameMaster,
    Developer,
    Support,
    Player,
}

impl From<CliRole> for Role {
    fn from(role: CliRole) -> Self {
        match role {
            CliRole::Admin => Role::Admin,
            CliRole::GameMaster => Role::GameMaster,
            CliRole::Developer => Role::Developer,
            CliRole::Support => Role::Support,
            CliRole::Player => Role::Player,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create a new file with the given contents.
    Create {
        path: PathBuf,
        #[arg(long)]
        contents: Option<String>,
        #[arg(long)]
        contents_file: Option<PathBuf>,
    },
    /// Overwrite an existing file's contents.
    Modify {
        path: PathBuf,
        #[arg(long)]
        contents: Option<String>,
        #[arg(long)]
        contents_file: Option<PathBuf>,
    },
    /// Replace the first literal occurrence of a substring in a file.
    ModifyPart { path: PathBuf, old: String, new: String },
    /// Delete a file.
    Delete { path: PathBuf },
    /// Move a file to a new path.
    Move { source: PathBuf, destination: PathBuf },
    /// Copy a file to a new path.
    Copy { source: PathBuf, destination: PathBuf },
    /// Compile a JSON document into a proprietary binary format.
    Compile {
        source: PathBuf,
        destination: PathBuf,
        #[arg(long, default_value = "GenericBinary")]
        kind: String,
    },
    /// Decompile a proprietary binary file into a JSON document.
    Decompile {
        source: PathBuf,
        destination: PathBuf,
        #[arg(long, default_value = "GenericBinary")]
        kind: String,
        /// Print a hex dump of the source file to stdout in addition to writing the JSON document.
        #[arg(long)]
        hex: bool,
    },
    /// Restore a file from one of its backups.
    Restore {
        backup_path: PathBuf,
        #[arg(long)]
        target: Option<PathBuf>,
    },
    /// Inspect or prune backups.
    #[command(subcommand)]
    Backups(BackupsCommand),
    /// Inspect or configure per-role policy.
    #[command(subcommand)]
    Policy(PolicyCommand),
    /// Inspect the audit trail.
    #[command(subcommand)]
    Audit(AuditCommand),
}

#[derive(Subcommand)]
enum BackupsCommand {
    /// List backups for a given origin path, or every tracked origin if omitted.
    List { origin: Option<PathBuf> },
    /// Prune backups beyond a retention count.
    Prune {
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Print the policy document configured for a role.
    Show { role: CliRole },
    /// Replace the policy document configured for a role from a JSON file.
    Set { role: CliRole, document_file: PathBuf },
    /// Load all policy documents from a JSON file.
    Load { path: PathBuf },
    /// Save all configured policy documents to a JSON file.
    Save { path: PathBuf },
}

#[derive(Subcommand)]
enum AuditCommand {
    /// Print recent audit records, newest first.
    History {
        #[arg(long)]
        role: Option<CliRole>,
        #[arg(long)]
        max_entries: Option<usize>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();
}

fn read_contents(inline: Option<String>, file: Option<PathBuf>) -> Result<Vec<u8>> {
    match (inline, file) {
        (Some(s), None) => Ok(s.into_bytes()),
        (None, Some(path)) => std::fs::read(&path).with_context(|| format!("reading {}", path.display())),
        (None, None) => bail!("one of --contents or --contents-file is required"),
        (Some(_), Some(_)) => bail!("--contents and --contents-file are mutually exclusive"),
    }
}

fn parse_binary_kind(raw: &str) -> BinaryKind {
    match raw {
        "ItemList" => BinaryKind::ItemList,
        "ItemName" => BinaryKind::ItemName,
        "ItemHelp" => BinaryKind::ItemHelp,
        "ServerList" => BinaryKind::ServerList,
        "SkillData" => BinaryKind::SkillData,
        "MapData" => BinaryKind::MapData,
        "Mesh" => BinaryKind::Mesh,
        "Animation" => BinaryKind::Animation,
        "StaticMesh" => BinaryKind::StaticMesh,
        "UIComponent" => BinaryKind::UIComponent,
        other => BinaryKind::Other(other.to_owned()),
    }
}

fn print_outcome(outcome: &warden_core::OperationOutcome) {
    if outcome.success {
        println!("ok: {}", outcome.message);
    } else {
        println!("denied: {}", outcome.message);
    }
    if let Some(backup) = &outcome.backup_path {
        println!("  backup: {}", backup.display());
    }
    if let Some(new_path) = &outcome.new_path {
        println!("  new path: {}", new_path.display());
    }
    if outcome.requires_server_resync {
        println!("  requires server resync");
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let fs = LocalFilesystem;
    let game_root = std::fs::canonicalize(&cli.game_root).unwrap_or_else(|_| cli.game_root.clone());
    let config = AuthorityConfig::new(game_root, cli.backup_root.clone());
    let facade = AuthorityFacade::open(&fs, config)?;
    let principal = facade.register_principal(cli.role.into(), "cli-session");

    match &cli.command {
        Command::Create { path, contents, contents_file } => {
            let bytes = read_contents(contents.clone(), contents_file.clone())?;
            let outcome = facade.create(&fs, principal, path, &bytes)?;
            print_outcome(&outcome);
        }
        Command::Modify { path, contents, contents_file } => {
            let bytes = read_contents(contents.clone(), contents_file.clone())?;
            let outcome = facade.modify(&fs, principal, path, &bytes)?;
            print_outcome(&outcome);
        }
        Command::ModifyPart { path, old, new } => {
            let outcome = facade.modify_part(&fs, principal, path, old, new)?;
            print_outcome(&outcome);
        }
        Command::Delete { path } => {
            let outcome = facade.delete(&fs, principal, path)?;
            print_outcome(&outcome);
        }
        Command::Move { source, destination } => {
            let outcome = facade.move_file(&fs, principal, source, destination)?;
            print_outcome(&outcome);
        }
        Command::Copy { source, destination } => {
            let outcome = facade.copy(&fs, principal, source, destination)?;
            print_outcome(&outcome);
        }
        Command::Compile { source, destination, kind } => {
            let kind = parse_binary_kind(kind);
            let outcome = facade.compile(&fs, principal, source, destination, &kind, None)?;
            print_outcome(&outcome);
        }
        Command::Decompile { source, destination, kind, hex } => {
            let kind = parse_binary_kind(kind);
            if *hex {
                let normalized = warden_core::normalize(&fs, source, &cli.game_root)?;
                let data = fs.read(normalized.as_path())?;
                let analyzer = warden_core::BinaryAnalyzer::new(warden_core::AnalyzerConfig::default());
                println!("{}", analyzer.hex_dump(&data));
            }
            let outcome = facade.decompile(&fs, principal, source, destination, &kind, None)?;
            print_outcome(&outcome);
        }
        Command::Restore { backup_path, target } => {
            let outcome = facade.restore_from_backup(&fs, principal, backup_path, target.is_none(), target.as_deref())?;
            print_outcome(&outcome);
        }
        Command::Backups(sub) => run_backups(&facade, sub)?,
        Command::Policy(sub) => run_policy(&fs, &facade, sub)?,
        Command::Audit(sub) => run_audit(&facade, sub),
    }

    Ok(ExitCode::SUCCESS)
}

fn run_backups(facade: &AuthorityFacade, command: &BackupsCommand) -> Result<()> {
    match command {
        BackupsCommand::List { origin } => {
            if let Some(origin) = origin {
                let key = origin.to_string_lossy().into_owned();
                for entry in facade.backups().list_backups_for(&key) {
                    println!("{}  {}  {}", entry.timestamp, entry.operation, entry.backup_path.display());
                }
            } else {
                for (origin, entries) in facade.backups().list_all() {
                    println!("{origin}: {} backup(s)", entries.len());
                }
            }
        }
        BackupsCommand::Prune { keep } => {
            let removed = facade.backups().prune(&LocalFilesystem, *keep, None)?;
            println!("pruned {removed} backup(s)");
        }
    }
    Ok(())
}

fn run_policy(fs: &dyn Filesystem, facade: &AuthorityFacade, command: &PolicyCommand) -> Result<()> {
    match command {
        PolicyCommand::Show { role } => {
            println!("role: {:?}", Role::from(*role));
            println!("(policy documents are not individually introspectable from the CLI yet; use `policy save` to dump all roles)");
        }
        PolicyCommand::Set { role, document_file } => {
            let bytes = std::fs::read(document_file).with_context(|| format!("reading {}", document_file.display()))?;
            let document: PolicyDocument = serde_json::from_slice(&bytes)?;
            facade.policy().configure((*role).into(), document);
            println!("policy updated for {:?}", Role::from(*role));
        }
        PolicyCommand::Load { path } => {
            facade.policy().load(fs, path)?;
            println!("loaded policy documents from {}", path.display());
        }
        PolicyCommand::Save { path } => {
            facade.policy().save(fs, path)?;
            println!("saved policy documents to {}", path.display());
        }
    }
    Ok(())
}

fn run_audit(facade: &AuthorityFacade, command: &AuditCommand) {
    match command {
        AuditCommand::History { role, max_entries } => {
            let role_filter = role.map(Role::from);
            for record in facade.audit().history(role_filter, *max_entries) {
                let outcome = if record.success { "ok" } else { "denied" };
                println!(
                    "{}  {}  {:<9}  {}  {outcome}",
                    record.timestamp,
                    record.role,
                    operation_label(record.operation),
                    record.target_path.display()
                );
            }
        }
    }
}

fn operation_label(op: Operation) -> &'static str {
    op.as_str()
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

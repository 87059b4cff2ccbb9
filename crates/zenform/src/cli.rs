//! Clap derive structures for the `zenform` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use zenform_core::EntityKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// zenform -- converge an MLOps server to a declared manifest
#[derive(Debug, Parser)]
#[command(
    name = "zenform",
    version,
    about = "Declaratively manage MLOps server stacks, components and access",
    long_about = "Reconciles workspaces, projects, stacks, stack components, service\n\
        connectors, teams and role assignments against a YAML manifest.\n\n\
        Every entity is validated locally before any network call.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "ZENFORM_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "ZENFORM_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', global = true)]
    pub server: Option<String>,

    /// Service-account API key (overrides profile credentials)
    #[arg(long, global = true, conflicts_with = "api_token")]
    pub api_key: Option<String>,

    /// Bearer API token (overrides profile credentials)
    #[arg(long, global = true)]
    pub api_token: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Per-request timeout in seconds (overrides profile)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Deadline for a single entity pass in seconds
    #[arg(long, global = true)]
    pub pass_timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a manifest offline; no server is contacted
    Validate(ManifestArgs),

    /// Show what apply would change
    Plan(PlanArgs),

    /// Converge the server to the manifest
    Apply(ManifestArgs),

    /// Delete every entity the manifest declares
    Destroy(DestroyArgs),

    /// Adopt an existing remote entity by id and print it
    Import(ImportArgs),

    /// Look up one remote entity by id or name
    Get(GetArgs),
}

#[derive(Debug, Args)]
pub struct ManifestArgs {
    /// Path to the YAML manifest
    pub manifest: PathBuf,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Path to the YAML manifest
    pub manifest: PathBuf,

    /// Plan against an empty in-memory server instead of the real one
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct DestroyArgs {
    /// Path to the YAML manifest
    pub manifest: PathBuf,

    /// Skip the confirmation guard
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Entity kind
    pub kind: KindArg,

    /// Server-assigned id
    pub id: String,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// What to look up
    pub kind: GetKind,

    /// Id or name (not used for `server`)
    pub target: Option<String>,
}

/// Reconciled entity kinds as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Workspace,
    Project,
    Stack,
    #[value(alias = "stack-component")]
    Component,
    #[value(alias = "service-connector")]
    Connector,
    Team,
    RoleAssignment,
}

impl KindArg {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Workspace => EntityKind::Workspace,
            Self::Project => EntityKind::Project,
            Self::Stack => EntityKind::Stack,
            Self::Component => EntityKind::StackComponent,
            Self::Connector => EntityKind::ServiceConnector,
            Self::Team => EntityKind::Team,
            Self::RoleAssignment => EntityKind::RoleAssignment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GetKind {
    Workspace,
    Project,
    Stack,
    #[value(alias = "stack-component")]
    Component,
    #[value(alias = "service-connector")]
    Connector,
    Team,
    RoleAssignment,
    User,
    /// Server metadata
    Server,
}

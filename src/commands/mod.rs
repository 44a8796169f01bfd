//! CLI command definitions and dispatch.

pub mod bulk;
pub mod check;
pub mod folder;
pub mod grant;
pub mod ls;
pub mod migrate;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use filer_auth::PermissionResolver;
use filer_core::config::AppConfig;
use filer_core::error::AppError;
use filer_core::types::{GroupId, UserId};
use filer_database::DatabasePool;
use filer_entity::user::Actor;
use filer_service::{BulkEngine, FolderService, RequestContext, TreeService};

use crate::output::OutputFormat;

/// Filer: folder permission and bulk operation administration
#[derive(Debug, Parser)]
#[command(name = "filer", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Configuration overlay loaded from `config/{env}.toml`
    #[arg(long, env = "FILER_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// List a folder
    Ls(ls::LsArgs),
    /// Run a bulk operation over a selection
    Bulk(bulk::BulkArgs),
    /// Audit tree invariants
    Check(check::CheckArgs),
    /// Single folder and file actions
    Folder(folder::FolderArgs),
    /// Folder permission management
    Grant(grant::GrantArgs),
}

/// The identity a command acts as.
#[derive(Debug, Clone, Args)]
pub struct ActorArgs {
    /// Acting user ID
    #[arg(long = "as", env = "FILER_USER")]
    pub user: UserId,

    /// Act as a superuser
    #[arg(long)]
    pub superuser: bool,

    /// Act as a non-staff user
    #[arg(long)]
    pub no_staff: bool,

    /// Group memberships of the acting user
    #[arg(long = "group")]
    pub groups: Vec<GroupId>,
}

impl ActorArgs {
    /// Build the request context for the configured actor.
    pub fn context(&self) -> RequestContext {
        let actor = Actor {
            user_id: self.user,
            is_superuser: self.superuser,
            is_staff: !self.no_staff || self.superuser,
            groups: self.groups.clone(),
        };
        RequestContext::new(actor)
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Ls(args) => ls::execute(args, &config, self.format).await,
            Commands::Bulk(args) => bulk::execute(args, &config, self.format).await,
            Commands::Check(args) => check::execute(args, &config, self.format).await,
            Commands::Folder(args) => folder::execute(args, &config, self.format).await,
            Commands::Grant(args) => grant::execute(args, &config, self.format).await,
        }
    }
}

/// Services wired over the PostgreSQL store.
pub struct Services {
    /// Connection pool, closed when the command is done.
    pub pool: DatabasePool,
    /// Bulk operation engine.
    pub bulk: BulkEngine,
    /// Folder service.
    pub folders: FolderService,
    /// Tree walks.
    pub tree: TreeService,
}

impl Services {
    /// Connect and build every service from configuration.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let pool = DatabasePool::connect(&config.database).await?;
        let tree = pool.tree_store(&config.filer);
        let grants = pool.grant_store();
        let resolver = Arc::new(PermissionResolver::new(
            &config.filer,
            tree.clone(),
            grants.clone(),
        ));

        Ok(Self {
            bulk: BulkEngine::new(&config.filer, tree.clone(), resolver.clone()),
            folders: FolderService::new(&config.filer, tree.clone(), grants, resolver),
            tree: TreeService::new(&config.filer, tree),
            pool,
        })
    }
}

//! Folder permission management commands.

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use filer_core::config::AppConfig;
use filer_core::error::AppError;
use filer_core::types::{FolderId, FolderPermissionId, GroupId, UserId};
use filer_entity::permission::{FolderPermission, GrantState, PermissionScope, Principal, Right};

use super::{ActorArgs, Services};
use crate::output::{self, OutputFormat};

/// Arguments for grant commands
#[derive(Debug, Args)]
pub struct GrantArgs {
    /// Grant subcommand
    #[command(subcommand)]
    pub command: GrantCommand,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Grant subcommands
#[derive(Debug, Subcommand)]
pub enum GrantCommand {
    /// List the grants attached to a folder
    List {
        /// Folder ID
        folder: FolderId,
    },
    /// Attach a grant to a folder
    Add {
        /// Folder ID
        folder: FolderId,
        /// Grantee user
        #[arg(long, conflicts_with = "group", required_unless_present = "group")]
        user: Option<UserId>,
        /// Grantee group
        #[arg(long)]
        group: Option<GroupId>,
        /// Which nodes the grant covers
        #[arg(long, value_enum, default_value = "children")]
        scope: ScopeArg,
        /// Read decision
        #[arg(long, value_enum)]
        read: Option<StateArg>,
        /// Edit decision
        #[arg(long, value_enum)]
        edit: Option<StateArg>,
        /// Add-children decision
        #[arg(long, value_enum)]
        add_children: Option<StateArg>,
    },
    /// Remove a grant
    Remove {
        /// Grant ID
        grant: FolderPermissionId,
    },
}

/// Grant scope selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// The folder itself
    This,
    /// The folder and its descendants
    Children,
}

/// Explicit decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    /// Grant the right
    Allow,
    /// Refuse the right
    Deny,
}

impl From<StateArg> for GrantState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Allow => Self::Allow,
            StateArg::Deny => Self::Deny,
        }
    }
}

/// Grant row
#[derive(Debug, Serialize, Tabled)]
struct GrantRow {
    /// Grant ID
    #[tabled(rename = "ID")]
    id: String,
    /// Grantee
    #[tabled(rename = "Principal")]
    principal: String,
    /// Scope
    #[tabled(rename = "Scope")]
    scope: String,
    /// Read decision
    #[tabled(rename = "Read")]
    read: String,
    /// Edit decision
    #[tabled(rename = "Edit")]
    edit: String,
    /// Add-children decision
    #[tabled(rename = "Add children")]
    add_children: String,
}

impl From<&FolderPermission> for GrantRow {
    fn from(grant: &FolderPermission) -> Self {
        let state = |right| match grant.state(right) {
            Some(GrantState::Allow) => "allow".to_string(),
            Some(GrantState::Deny) => "deny".to_string(),
            None => "-".to_string(),
        };
        Self {
            id: grant.id.to_string(),
            principal: match grant.principal {
                Principal::User(id) => format!("user {id}"),
                Principal::Group(id) => format!("group {id}"),
            },
            scope: grant.scope.to_string(),
            read: state(Right::Read),
            edit: state(Right::Edit),
            add_children: state(Right::AddChildren),
        }
    }
}

/// Execute grant commands
pub async fn execute(
    args: &GrantArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;
    let ctx = args.actor.context();

    match &args.command {
        GrantCommand::List { folder } => {
            let grants = services.folders.grants_on(&ctx, *folder).await?;
            let rows: Vec<GrantRow> = grants.iter().map(GrantRow::from).collect();
            output::print_rows(&rows, &grants, format);
        }
        GrantCommand::Add {
            folder,
            user,
            group,
            scope,
            read,
            edit,
            add_children,
        } => {
            let principal = match (user, group) {
                (Some(user), _) => Principal::User(*user),
                (None, Some(group)) => Principal::Group(*group),
                (None, None) => {
                    return Err(AppError::validation("Either --user or --group is required"));
                }
            };
            let scope = match scope {
                ScopeArg::This => PermissionScope::This,
                ScopeArg::Children => PermissionScope::Children,
            };
            let mut grant = FolderPermission::new(*folder, principal, scope);
            for (right, state) in [
                (Right::Read, read),
                (Right::Edit, edit),
                (Right::AddChildren, add_children),
            ] {
                if let Some(state) = state {
                    grant = grant.with(right, GrantState::from(*state));
                }
            }

            let grant = services.folders.add_grant(&ctx, grant).await?;
            match format {
                OutputFormat::Json => output::print_item(&grant, format),
                OutputFormat::Table => {
                    output::print_success("Folder permission added.");
                    output::print_kv("ID", &grant.id.to_string());
                }
            }
        }
        GrantCommand::Remove { grant } => {
            services.folders.remove_grant(&ctx, *grant).await?;
            output::print_success("Folder permission removed.");
        }
    }

    services.pool.close().await;
    Ok(())
}

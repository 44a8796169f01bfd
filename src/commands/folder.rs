//! Single folder and file commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use filer_core::config::AppConfig;
use filer_core::error::AppError;
use filer_core::types::{FileId, FolderId, UserId};
use filer_entity::node::NodeRef;
use filer_entity::permission::Right;

use super::{ActorArgs, Services};
use crate::output::{self, OutputFormat};

/// Arguments for folder commands
#[derive(Debug, Args)]
pub struct FolderArgs {
    /// Folder subcommand
    #[command(subcommand)]
    pub command: FolderCommand,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Folder subcommands
#[derive(Debug, Subcommand)]
pub enum FolderCommand {
    /// Create a new folder
    Create {
        /// Folder name
        name: String,
        /// Parent folder ID (omit for root)
        #[arg(short, long)]
        parent: Option<FolderId>,
    },
    /// Give a folder or file a new owner
    Chown {
        /// Node reference
        node: NodeRef,
        /// New owner (omit to clear)
        owner: Option<UserId>,
    },
    /// Set the focal point of an image as `x,y` (empty clears it)
    Subject {
        /// Image file ID
        file: FileId,
        /// Focal point
        location: String,
    },
    /// Show the acting user's rights on a node
    Rights {
        /// Node reference
        node: NodeRef,
    },
}

/// Rights row
#[derive(Debug, Serialize, Tabled)]
struct RightRow {
    /// Right
    #[tabled(rename = "Right")]
    right: String,
    /// Whether it is granted
    #[tabled(rename = "Allowed")]
    allowed: bool,
    /// Deciding rule
    #[tabled(rename = "Source")]
    source: String,
}

/// Execute folder commands
pub async fn execute(
    args: &FolderArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;
    let ctx = args.actor.context();

    match &args.command {
        FolderCommand::Create { name, parent } => {
            let folder = services.folders.create_folder(&ctx, *parent, name).await?;
            match format {
                OutputFormat::Json => output::print_item(&folder, format),
                OutputFormat::Table => {
                    output::print_success(&format!("Folder '{}' created.", folder.name));
                    output::print_kv("ID", &folder.id.to_string());
                }
            }
        }
        FolderCommand::Chown { node, owner } => {
            let node = services.folders.change_owner(&ctx, *node, *owner).await?;
            match format {
                OutputFormat::Json => output::print_item(&node, format),
                OutputFormat::Table => {
                    output::print_success(&format!("Owner of '{}' changed.", node.effective_name()))
                }
            }
        }
        FolderCommand::Subject { file, location } => {
            let file = services
                .folders
                .set_subject_location(&ctx, *file, location)
                .await?;
            let location = file
                .image
                .and_then(|i| i.subject_location)
                .map(|l| l.to_string())
                .unwrap_or_default();
            match format {
                OutputFormat::Json => output::print_item(&file, format),
                OutputFormat::Table => {
                    output::print_success(&format!(
                        "Subject location of '{}' updated.",
                        file.effective_name()
                    ));
                    output::print_kv("Subject location", &location);
                }
            }
        }
        FolderCommand::Rights { node } => {
            let rights = services.folders.effective_rights(&ctx, *node).await?;
            let rows: Vec<RightRow> = Right::ALL
                .into_iter()
                .map(|right| {
                    let decision = rights.get(right);
                    RightRow {
                        right: right.to_string(),
                        allowed: decision.allowed,
                        source: format!("{:?}", decision.source),
                    }
                })
                .collect();
            output::print_rows(&rows, &rights, format);
        }
    }

    services.pool.close().await;
    Ok(())
}

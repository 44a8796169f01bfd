//! Directory listing command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use filer_core::config::AppConfig;
use filer_core::error::AppError;
use filer_core::types::{FolderId, PageRequest, SortField};
use filer_entity::node::Node;

use super::{ActorArgs, Services};
use crate::output::{self, OutputFormat};

/// Arguments for the ls command
#[derive(Debug, Args)]
pub struct LsArgs {
    /// Folder to list (omit for the root)
    pub folder: Option<FolderId>,

    /// Sort order: name, owner, modified or size; prefix with '-' to reverse
    #[arg(short, long, default_value = "name")]
    pub sort: SortField,

    /// Page number (1-based)
    #[arg(long, default_value = "1")]
    pub page: u64,

    /// Items per page (defaults to `filer.paginate_by`)
    #[arg(long)]
    pub page_size: Option<u64>,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Listing row
#[derive(Debug, Serialize, Tabled)]
pub struct NodeRow {
    /// Folder or file reference
    #[tabled(rename = "Node")]
    pub node: String,
    /// Folder or file
    #[tabled(rename = "Kind")]
    pub kind: &'static str,
    /// Effective name
    #[tabled(rename = "Name")]
    pub name: String,
    /// Owner ID
    #[tabled(rename = "Owner")]
    pub owner: String,
    /// Size in bytes
    #[tabled(rename = "Size")]
    pub size: i64,
    /// Last modification
    #[tabled(rename = "Modified")]
    pub modified: String,
}

impl From<&Node> for NodeRow {
    fn from(node: &Node) -> Self {
        Self {
            node: node.node_ref().to_string(),
            kind: node.kind().as_str(),
            name: node.effective_name().to_string(),
            owner: node.owner_id().map(|o| o.to_string()).unwrap_or_default(),
            size: node.size_bytes(),
            modified: node.updated_at().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute the ls command
pub async fn execute(
    args: &LsArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;
    let ctx = args.actor.context();
    let page = PageRequest::new(args.page, args.page_size.unwrap_or(config.filer.paginate_by));

    if format == OutputFormat::Table {
        if let Some(folder) = args.folder {
            let path: Vec<String> = services
                .tree
                .breadcrumbs(folder)
                .await?
                .into_iter()
                .map(|f| f.name)
                .collect();
            output::print_kv("Folder", &format!("/{}", path.join("/")));
        } else {
            output::print_kv("Folder", "/");
        }
    }

    let listing = services
        .folders
        .list_directory(&ctx, args.folder, args.sort, Some(page))
        .await?;
    let rows: Vec<NodeRow> = listing.items.iter().map(NodeRow::from).collect();
    output::print_rows(&rows, &listing, format);

    if format == OutputFormat::Table {
        output::print_kv(
            "Page",
            &format!(
                "{}/{} ({} items)",
                listing.page, listing.total_pages, listing.total_items
            ),
        );
    }

    services.pool.close().await;
    Ok(())
}

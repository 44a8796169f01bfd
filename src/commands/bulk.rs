//! Bulk operation command.

use clap::{Args, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use filer_core::config::AppConfig;
use filer_core::error::AppError;
use filer_entity::node::NodeRef;
use filer_service::bulk::{BulkOperation, BulkParams, DeletePhase, Destination};

use super::{ActorArgs, Services};
use crate::output::{self, OutputFormat};

/// Arguments for the bulk command
#[derive(Debug, Args)]
pub struct BulkArgs {
    /// Operation: move, copy, rename, delete, set-public, set-private, resize
    pub operation: BulkOperation,

    /// Selected nodes, as `folder-<uuid>` or `file-<uuid>`
    #[arg(required = true, num_args = 1..)]
    pub selection: Vec<NodeRef>,

    /// Destination folder ID, or `root` (move, copy)
    #[arg(long, value_parser = parse_destination)]
    pub to: Option<Destination>,

    /// Suffix inserted into copied file names
    #[arg(long)]
    pub suffix: Option<String>,

    /// New name (rename)
    #[arg(long)]
    pub name: Option<String>,

    /// Delete phase
    #[arg(long, value_enum)]
    pub phase: Option<PhaseArg>,

    /// Target width (resize)
    #[arg(long)]
    pub width: Option<u32>,

    /// Target height (resize)
    #[arg(long)]
    pub height: Option<u32>,

    /// Crop to the exact target size (resize)
    #[arg(long)]
    pub crop: bool,

    /// Allow upscaling (resize)
    #[arg(long)]
    pub upscale: bool,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Delete phase selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhaseArg {
    /// Report what would be removed
    Preview,
    /// Remove
    Confirmed,
}

impl From<PhaseArg> for DeletePhase {
    fn from(phase: PhaseArg) -> Self {
        match phase {
            PhaseArg::Preview => Self::Preview,
            PhaseArg::Confirmed => Self::Confirmed,
        }
    }
}

fn parse_destination(value: &str) -> Result<Destination, String> {
    if value.eq_ignore_ascii_case("root") {
        return Ok(Destination::Root);
    }
    value
        .parse()
        .map(Destination::Folder)
        .map_err(|e| format!("expected a folder ID or 'root': {e}"))
}

/// Outcome row
#[derive(Debug, Serialize, Tabled)]
struct OutcomeRow {
    /// Selected node
    #[tabled(rename = "Node")]
    node: String,
    /// Status
    #[tabled(rename = "Status")]
    status: String,
    /// Explanation or covering folder
    #[tabled(rename = "Detail")]
    detail: String,
    /// Number of touched nodes
    #[tabled(rename = "Affected")]
    affected: usize,
}

/// Execute the bulk command
pub async fn execute(
    args: &BulkArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let params = BulkParams {
        destination: args.to,
        suffix: args.suffix.clone(),
        name: args.name.clone(),
        phase: args.phase.map(DeletePhase::from),
        width: args.width,
        height: args.height,
        crop: args.crop,
        upscale: args.upscale,
    };
    // Fail before connecting when the request is malformed.
    params.validate(args.operation)?;

    let services = Services::connect(config).await?;
    let ctx = args.actor.context();
    let result = services
        .bulk
        .execute(&ctx, args.operation, &args.selection, &params)
        .await?;

    let rows: Vec<OutcomeRow> = result
        .items
        .iter()
        .map(|item| OutcomeRow {
            node: item.node.to_string(),
            status: item.status.to_string(),
            detail: match (&item.detail, item.covered_by) {
                (Some(detail), _) => detail.clone(),
                (None, Some(cover)) => format!("with {cover}"),
                (None, None) => String::new(),
            },
            affected: item.affected.len(),
        })
        .collect();
    output::print_rows(&rows, &result, format);

    if format == OutputFormat::Table {
        let summary = format!(
            "{}: {} succeeded, {} failed",
            result.operation, result.succeeded, result.failed
        );
        if result.preview {
            output::print_warning(&format!("{summary} (nothing was changed)"));
        } else if result.all_succeeded() {
            output::print_success(&summary);
        } else {
            output::print_warning(&summary);
        }
    }

    services.pool.close().await;
    Ok(())
}

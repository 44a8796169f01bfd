//! Tree invariant audit command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use filer_core::config::AppConfig;
use filer_core::error::AppError;
use filer_core::types::FolderId;

use super::Services;
use crate::output::{self, OutputFormat};

/// Arguments for the check command
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Audit only below this folder
    pub folder: Option<FolderId>,
}

/// Issue row
#[derive(Debug, Serialize, Tabled)]
struct IssueRow {
    /// Issue kind
    #[tabled(rename = "Issue")]
    kind: String,
    /// Offending node
    #[tabled(rename = "Node")]
    node: String,
    /// Description
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Execute the check command
pub async fn execute(
    args: &CheckArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;
    let report = services.tree.audit(args.folder).await?;

    let rows: Vec<IssueRow> = report
        .issues
        .iter()
        .map(|issue| IssueRow {
            kind: format!("{:?}", issue.kind),
            node: issue.node.to_string(),
            detail: issue.detail.clone(),
        })
        .collect();

    match format {
        OutputFormat::Json => output::print_item(&report, format),
        OutputFormat::Table => {
            output::print_kv("Folders", &report.folders.to_string());
            output::print_kv("Files", &report.files.to_string());
            if report.is_clean() {
                output::print_success("Tree is consistent.");
            } else {
                output::print_rows(&rows, &report, format);
                output::print_warning(&format!("{} problem(s) found.", report.issues.len()));
            }
        }
    }

    services.pool.close().await;
    Ok(())
}

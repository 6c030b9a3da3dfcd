//! Plan command implementation
//!
//! Splits a list of DWD archive or product names into contiguous groups so
//! that several invocations can share the work.

use crate::app::services::file_catalog::{parse_file_name, split_into_groups};
use crate::cli::args::{OutputFormat, PlanArgs};
use crate::cli::commands::shared::{print_json, setup_logging};
use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Groups of names, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub total: usize,
    pub unrecognized: Vec<String>,
    pub groups: Vec<Vec<String>>,
}

/// Names listed in a file, separated by commas or newlines
pub fn parse_name_list(content: &str) -> Vec<String> {
    content
        .split([',', '\n'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_names(source: &Path) -> Result<Vec<String>> {
    if source.is_dir() {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(source)
            .with_context(|| format!("Failed to read directory {}", source.display()))?
        {
            let entry = entry.context("Failed to read directory entry")?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    } else {
        let content = std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read name list {}", source.display()))?;
        Ok(parse_name_list(&content))
    }
}

/// Split `names` into `groups` parts, noting names that are not DWD files
pub fn build_plan(names: Vec<String>, groups: usize) -> crate::Result<Plan> {
    let unrecognized = names
        .iter()
        .filter(|name| parse_file_name(name).is_err())
        .cloned()
        .collect();
    Ok(Plan {
        total: names.len(),
        unrecognized,
        groups: split_into_groups(&names, groups)?,
    })
}

/// Run the plan command
pub async fn run_plan(args: PlanArgs) -> Result<()> {
    setup_logging(&args.log)?;
    args.validate()?;

    let names = read_names(&args.source)?;
    info!("Read {} names from {}", names.len(), args.source.display());

    let plan = build_plan(names, args.groups)?;
    if !plan.unrecognized.is_empty() {
        warn!(
            "{} names are not DWD archive, product or metadata files",
            plan.unrecognized.len()
        );
    }

    match args.format {
        OutputFormat::Human => {
            println!(
                "\n{} {} names in {} groups",
                "Plan:".bright_green().bold(),
                plan.total,
                plan.groups.len()
            );
            for (i, group) in plan.groups.iter().enumerate() {
                println!("  {} ({} names)", format!("Group {}", i + 1).cyan(), group.len());
                for name in group {
                    println!("    {}", name);
                }
            }
        }
        OutputFormat::Json => print_json(&plan)?,
    }
    Ok(())
}

//! Leases command handler.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rigging_runtime::LeaseRegistry;
use serde::Serialize;

use crate::CliContext;

/// One row of `rigging leases` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseRow {
    pub port: u16,
    pub expires_at: DateTime<Utc>,
    pub live: bool,
}

/// Leases in the configured directory; expired ones only with `all`.
pub fn collect(ctx: &CliContext, all: bool) -> Result<Vec<LeaseRow>> {
    let registry = LeaseRegistry::from_config(&ctx.config)?;
    let now = registry.now();
    Ok(registry
        .leases()?
        .into_iter()
        .map(|lease| LeaseRow {
            port: lease.port,
            expires_at: lease.expires_at,
            live: lease.is_live(now),
        })
        .filter(|row| all || row.live)
        .collect())
}

pub fn render_table(rows: &[LeaseRow]) -> String {
    if rows.is_empty() {
        return "No leases".to_string();
    }
    let mut out = format!("{:<6}  {:<20}  {}\n", "PORT", "EXPIRES", "STATUS");
    for row in rows {
        let status = if row.live { "live" } else { "expired" };
        let _ = writeln!(
            out,
            "{:<6}  {:<20}  {}",
            row.port,
            row.expires_at.format("%Y-%m-%d %H:%M:%S"),
            status
        );
    }
    out.truncate(out.trim_end().len());
    out
}

/// Execute the leases command.
pub fn execute(ctx: &CliContext, all: bool, json: bool) -> Result<()> {
    let rows = collect(ctx, all)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{}", render_table(&rows));
    }
    Ok(())
}

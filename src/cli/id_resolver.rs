//! Short ID prefix resolution for CLI commands.
//!
//! Allows users to specify any unique prefix of an optimization record's UUID
//! instead of the full ID, similar to git short hashes.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

const OPTIMIZATION_QUERY: &str = "SELECT id FROM optimization_records WHERE id LIKE ? ORDER BY id";

/// Resolve an optimization record ID prefix to a full UUID.
pub async fn resolve_optimization_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "optimization", OPTIMIZATION_QUERY).await
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("Invalid ID prefix '{prefix}': must contain only hex characters and dashes");
    }
    Ok(())
}

async fn resolve_prefix(pool: &SqlitePool, prefix: &str, entity: &str, query: &str) -> Result<Uuid> {
    // Fast path: a full UUID needs no lookup
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }

    validate_prefix(prefix)?;

    let pattern = format!("{}%", prefix.to_lowercase());
    let rows: Vec<(String,)> = sqlx::query_as(query).bind(&pattern).fetch_all(pool).await?;

    match rows.len() {
        0 => bail!("No {entity} found matching '{prefix}'"),
        1 => Ok(Uuid::parse_str(&rows[0].0)?),
        n => {
            let mut msg = format!("Ambiguous prefix '{prefix}': matches {n} {entity}s:");
            for row in &rows {
                msg.push_str("\n  ");
                msg.push_str(&row.0);
            }
            bail!("{msg}")
        }
    }
}

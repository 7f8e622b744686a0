use anyhow::Result;
use std::path::Path;
use std::process;

use cookbook_core::cache::LocalCache;
use cookbook_core::remote::{HealthReport, RemoteStore, WriteTestReport};
use cookbook_core::service::remote_write_test;

use crate::postgrest::PostgrestClient;

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn print_health(report: &HealthReport) {
    if report.is_healthy() {
        let count = report.recipes_count.unwrap_or(0);
        println!("Connected to remote store ({count} recipes)");
        return;
    }
    println!("Configured: {}", yes_no(report.configured));
    if report.configured {
        println!("Reachable: {}", yes_no(report.reachable));
    }
    println!("Table exists: {}", yes_no(report.table_exists));
    if let Some(error) = &report.error {
        println!("Error: {error}");
    }
    if let Some(hint) = &report.hint {
        println!("Hint: {hint}");
    }
}

fn print_write_test(report: &WriteTestReport) {
    if report.success {
        let id = report.id.as_deref().unwrap_or("-");
        println!("Write test succeeded (row {id})");
        if !report.cleaned_up {
            println!("Warning: row {id} could not be removed");
        }
        return;
    }
    println!("Write test failed: {}", report.error.as_deref().unwrap_or("-"));
    for (label, value) in [
        ("Code", &report.code),
        ("Details", &report.details),
        ("Hint", &report.hint),
    ] {
        if let Some(value) = value {
            println!("{label}: {value}");
        }
    }
}

pub(crate) async fn cmd_health(
    remote: &PostgrestClient,
    write_test: bool,
    json: bool,
) -> Result<()> {
    let report = remote.health().await;
    let write = if write_test && remote.is_enabled() {
        Some(remote_write_test(remote).await)
    } else {
        None
    };

    if json {
        let value = match &write {
            Some(write) => serde_json::json!({ "health": report, "writeTest": write }),
            None => serde_json::to_value(&report)?,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_health(&report);
        if let Some(write) = &write {
            println!();
            print_write_test(write);
        }
    }

    if !report.is_healthy() || write.is_some_and(|w| !w.success) {
        process::exit(2);
    }
    Ok(())
}

/// Drop the cached collection so the next command hydrates from the remote
/// store or the bundled seed.
pub(crate) fn cmd_clear_cache(cache_path: &Path, json: bool) -> Result<()> {
    let cache = LocalCache::open(cache_path)?;
    let cleared = cache.clear()?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "cleared": cleared, "cache": cache_path.display().to_string() })
        );
    } else if cleared {
        println!("Cleared recipe cache at {}", cache_path.display());
    } else {
        println!("Recipe cache at {} was already empty", cache_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookbook_core::models::Recipe;
    use cookbook_core::seed::seed_recipes;

    #[test]
    fn test_clear_cache_empties_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookbook.db");
        {
            let cache = LocalCache::open(&path).unwrap();
            cache.save(&seed_recipes().unwrap()).unwrap();
        }

        cmd_clear_cache(&path, true).unwrap();
        // Second run finds nothing to remove
        cmd_clear_cache(&path, true).unwrap();

        let cache = LocalCache::open(&path).unwrap();
        let loaded: Option<Vec<Recipe>> = cache.load();
        assert_eq!(loaded, None);
    }
}

//! Folder indexing and extraction commands.

use crate::error::{Error, Result};
use crate::extract;
use crate::remote::DriveStore;

use super::Context;

fn store(ctx: &Context) -> Result<DriveStore> {
    let key = ctx
        .config
        .drive
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            Error::config("no Drive API key configured (set DRIVE_API_KEY or [drive] api_key)")
        })?;
    Ok(DriveStore::new(key))
}

pub async fn run_index(ctx: &Context, folder_id: &str) -> Result<()> {
    let store = store(ctx)?;
    let count = extract::index_folder(
        &ctx.db,
        &store,
        folder_id,
        ctx.config.drive.folder_item_cap,
    )
    .await?;
    println!("Indexed {count} files in folder {folder_id}");
    Ok(())
}

pub async fn run_extract(ctx: &Context, folder_id: &str, force: bool) -> Result<()> {
    let store = store(ctx)?;
    let results = extract::extract_pending(
        &ctx.db,
        &ctx.client,
        &store,
        folder_id,
        force,
        &ctx.config.limits,
    )
    .await?;

    if results.is_empty() {
        println!("Nothing to extract. Run `cram index {folder_id}` first.");
        return Ok(());
    }

    let mut failed = 0;
    for result in &results {
        match &result.error {
            Some(e) => {
                failed += 1;
                println!("  FAIL {} - {e}", result.name);
            }
            None => println!(
                "  ok   {} - {} topics, {} chars",
                result.name, result.topic_count, result.excerpt_chars
            ),
        }
    }
    println!(
        "Processed {} files ({failed} failed)",
        results.len()
    );
    Ok(())
}

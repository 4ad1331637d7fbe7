//! Study guide compilation command.

use crate::db::GuideKind;
use crate::error::{Error, Result};
use crate::guide;

use super::Context;

pub async fn run(ctx: &Context, folder_id: &str, kind: &str, show: bool) -> Result<()> {
    let kind = GuideKind::parse(kind)
        .ok_or_else(|| Error::config(format!("unknown guide kind '{kind}'")))?;

    if show {
        let guide = ctx
            .db
            .latest_guide(folder_id, kind)?
            .ok_or_else(|| Error::not_found("compiled guide"))?;
        println!("{}", guide.content_markdown);
        return Ok(());
    }

    let summary = guide::compile_guide(&ctx.db, &ctx.client, folder_id, kind).await?;
    println!(
        "Compiled {kind} guide {} with {} modules. View it with `cram guide {folder_id} --kind {kind} --show`.",
        summary.guide_id, summary.module_count
    );
    Ok(())
}

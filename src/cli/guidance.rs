//! Guidance and notes commands.

use crate::error::Result;
use crate::guidance;

use super::Context;

pub async fn run_guidance(
    ctx: &Context,
    topic_id: i64,
    force: bool,
    extra_context: Option<&str>,
) -> Result<()> {
    let outcome =
        guidance::get_or_generate_guidance(&ctx.db, &ctx.client, topic_id, force, extra_context)
            .await?;
    println!("[{}]", outcome.tier);
    println!();
    println!("{}", outcome.text);
    Ok(())
}

pub async fn run_notes(
    ctx: &Context,
    topic_id: i64,
    force: bool,
    extra_context: Option<&str>,
) -> Result<()> {
    let outcome =
        guidance::get_or_generate_notes(&ctx.db, &ctx.client, topic_id, force, extra_context)
            .await?;
    println!("[{}]", outcome.tier);
    println!();
    println!("{}", outcome.text);
    Ok(())
}

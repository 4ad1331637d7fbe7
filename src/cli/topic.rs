//! Topic commands.

use crate::db::{Priority, TopicPatch, TopicSeed};
use crate::error::{Error, Result};
use crate::topics;

use super::{Context, TopicCommands};

pub async fn run(ctx: &Context, command: TopicCommands) -> Result<()> {
    match command {
        TopicCommands::Add {
            material_id,
            name,
            category,
            priority,
        } => add(ctx, material_id, &name, category, &priority),
        TopicCommands::Update {
            id,
            name,
            priority,
            status,
            notes,
        } => update(ctx, id, name, priority, status, notes),
        TopicCommands::Delete { id } => {
            ctx.db.delete_topic(id)?;
            println!("Deleted topic {id}");
            Ok(())
        }
        TopicCommands::Generate { material_id } => generate(ctx, material_id).await,
    }
}

fn parse_priority(s: &str) -> Result<Priority> {
    match s {
        "high" | "medium" | "low" => Ok(Priority::parse(s)),
        other => Err(Error::config(format!(
            "unknown priority '{other}', expected high, medium or low"
        ))),
    }
}

fn add(
    ctx: &Context,
    material_id: i64,
    name: &str,
    category: Option<String>,
    priority: &str,
) -> Result<()> {
    if ctx.db.get_material(material_id)?.is_none() {
        return Err(Error::not_found("study material"));
    }
    let seed = TopicSeed {
        name: name.to_string(),
        category,
        priority: parse_priority(priority)?,
    };
    let id = ctx.db.insert_topic(material_id, &seed, "")?;
    println!("Added topic {id}");
    Ok(())
}

fn update(
    ctx: &Context,
    id: i64,
    name: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let patch = TopicPatch {
        name,
        priority: priority.as_deref().map(parse_priority).transpose()?,
        status,
        notes,
    };
    ctx.db.update_topic(id, &patch)?;
    println!("Updated topic {id}");
    Ok(())
}

async fn generate(ctx: &Context, material_id: i64) -> Result<()> {
    let material = ctx
        .db
        .get_material(material_id)?
        .ok_or_else(|| Error::not_found("study material"))?;

    let seeds = topics::generate_topics(&ctx.client, &ctx.config, &material.position).await;
    for seed in &seeds {
        ctx.db.insert_topic(material_id, seed, "")?;
    }
    println!("Added {} topics to material {material_id}", seeds.len());
    Ok(())
}

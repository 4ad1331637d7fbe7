//! Study material commands.

use crate::error::Result;
use crate::topics;

use super::{Context, MaterialCommands};

pub async fn run(ctx: &Context, command: MaterialCommands) -> Result<()> {
    match command {
        MaterialCommands::Add {
            company,
            position,
            date,
            no_topics,
        } => add(ctx, &company, &position, date.as_deref(), no_topics).await,
        MaterialCommands::List => list(ctx),
        MaterialCommands::Show { id } => show(ctx, id),
        MaterialCommands::Delete { id } => delete(ctx, id),
    }
}

async fn add(
    ctx: &Context,
    company: &str,
    position: &str,
    date: Option<&str>,
    no_topics: bool,
) -> Result<()> {
    let id = ctx.db.create_material(company, position, date)?;
    println!("Created material {id}");

    if !no_topics {
        let seeds = topics::generate_topics(&ctx.client, &ctx.config, position).await;
        for seed in &seeds {
            ctx.db.insert_topic(id, seed, "")?;
        }
        println!("Seeded {} starter topics", seeds.len());
    }

    Ok(())
}

fn list(ctx: &Context) -> Result<()> {
    let materials = ctx.db.list_materials()?;
    if materials.is_empty() {
        println!("No materials yet. Add one with `cram material add`.");
        return Ok(());
    }

    for summary in materials {
        let m = &summary.material;
        let date = m.date.as_deref().unwrap_or("no date");
        println!(
            "[{}] {} - {} ({}) {}/{} topics done",
            m.id, m.company, m.position, date, summary.completed_topics, summary.topic_count
        );
    }
    Ok(())
}

fn show(ctx: &Context, id: i64) -> Result<()> {
    let material = ctx
        .db
        .get_material(id)?
        .ok_or_else(|| crate::error::Error::not_found("study material"))?;

    let date = material.date.as_deref().unwrap_or("no date");
    println!("{} - {} ({})", material.company, material.position, date);
    println!();

    let topics = ctx.db.topics_for_material(id)?;
    if topics.is_empty() {
        println!("No topics.");
        return Ok(());
    }

    let mut current_category: Option<&str> = None;
    for topic in &topics {
        let category = topic.category_path.as_deref().unwrap_or("");
        if current_category != Some(category) {
            if !category.is_empty() {
                println!("{category}:");
            }
            current_category = Some(category);
        }
        let marker = match topic.status.as_str() {
            "completed" => "x",
            "in_progress" => "~",
            _ => " ",
        };
        println!(
            "  [{marker}] {} {} ({})",
            topic.id,
            topic.name,
            topic.priority.as_str()
        );
    }
    Ok(())
}

fn delete(ctx: &Context, id: i64) -> Result<()> {
    ctx.db.delete_material(id)?;
    println!("Deleted material {id}");
    Ok(())
}

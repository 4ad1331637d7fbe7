//! Flashcard deck command.

use crate::error::{Error, Result};
use crate::flashcards::{self, Flashcard, DECK_KIND};
use crate::remote::DriveStore;

use super::Context;

pub async fn run(ctx: &Context, folder_id: &str, show: bool) -> Result<()> {
    if show {
        let deck = ctx
            .db
            .latest_deck(folder_id, DECK_KIND)?
            .ok_or_else(|| Error::not_found("flashcard deck"))?;
        let cards: Vec<Flashcard> = serde_json::from_str(&deck.deck_json)?;
        for (i, card) in cards.iter().enumerate() {
            println!("{}. [{}] {}", i + 1, card.difficulty, card.question);
            println!("   {}", card.answer);
            println!("   ({})", card.source);
        }
        return Ok(());
    }

    // A store is optional here: without one the deck is built from
    // already-extracted excerpts only.
    let store = ctx
        .config
        .drive
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(DriveStore::new);

    let summary = flashcards::compile_flashcards(
        &ctx.db,
        &ctx.client,
        store.as_ref(),
        folder_id,
        &ctx.config.limits,
    )
    .await?;

    for (name, count) in &summary.per_file {
        println!("  {name}: {count} cards");
    }
    println!(
        "Deck {} compiled with {} cards. View it with `cram flashcards {folder_id} --show`.",
        summary.deck_id, summary.total_cards
    );
    Ok(())
}

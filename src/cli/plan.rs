//! Study plan command.

use chrono::{NaiveDate, Utc};

use crate::db::Topic;
use crate::error::Result;
use crate::plan;

use super::Context;

pub fn run(ctx: &Context, material_id: i64, with_schedule: bool) -> Result<()> {
    let study_plan = plan::study_plan(&ctx.db, material_id)?;

    if study_plan.total == 0 {
        println!("No topics for material {material_id}.");
        return Ok(());
    }

    print_group("High priority", &study_plan.high);
    print_group("Medium priority", &study_plan.medium);
    print_group("Low priority", &study_plan.low);
    println!("{} topics total", study_plan.total);

    if with_schedule {
        let days_until = days_until(study_plan.date.as_deref());
        let mut all = study_plan.high;
        all.extend(study_plan.medium);
        all.extend(study_plan.low);

        println!();
        for day in plan::schedule(&all, days_until) {
            println!("Day {} ({}):", day.day_number, day.date);
            for entry in &day.topics {
                println!("  {} ({})", entry.name, entry.priority.as_str());
            }
        }
    }

    Ok(())
}

fn print_group(label: &str, topics: &[Topic]) {
    if topics.is_empty() {
        return;
    }
    println!("{label}:");
    for topic in topics {
        let category = topic
            .category_path
            .as_deref()
            .map(|c| format!(" [{c}]"))
            .unwrap_or_default();
        println!("  {} {}{category}", topic.id, topic.name);
    }
}

/// Days from today to the stored date, defaulting to a week when the
/// date is absent, unparseable or already past.
fn days_until(date: Option<&str>) -> usize {
    const DEFAULT_DAYS: usize = 7;
    let Some(date) = date else {
        return DEFAULT_DAYS;
    };
    let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return DEFAULT_DAYS;
    };
    let delta = (parsed - Utc::now().date_naive()).num_days();
    if delta <= 0 {
        DEFAULT_DAYS
    } else {
        delta as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_until_fallbacks() {
        assert_eq!(days_until(None), 7);
        assert_eq!(days_until(Some("not a date")), 7);
        assert_eq!(days_until(Some("2001-01-01")), 7);
    }
}

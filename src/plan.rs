//! Study-plan assembly: priority grouping and day-by-day scheduling.

use chrono::{Duration, Utc};

use crate::db::{Database, Priority, Topic};
use crate::error::{Error, Result};

/// Topics for a material grouped by priority.
#[derive(Debug)]
pub struct StudyPlan {
    pub date: Option<String>,
    pub high: Vec<Topic>,
    pub medium: Vec<Topic>,
    pub low: Vec<Topic>,
    pub total: usize,
}

/// One scheduled day.
#[derive(Debug, Clone)]
pub struct PlanDay {
    pub date: String,
    pub day_number: usize,
    pub topics: Vec<PlanEntry>,
}

/// A topic slotted into a day.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub topic_id: i64,
    pub name: String,
    pub priority: Priority,
}

/// Group a material's topics by priority.
pub fn study_plan(db: &Database, material_id: i64) -> Result<StudyPlan> {
    let material = db
        .get_material(material_id)?
        .ok_or_else(|| Error::not_found("study material"))?;
    let topics = db.topics_for_material(material_id)?;

    let mut plan = StudyPlan {
        date: material.date,
        high: Vec::new(),
        medium: Vec::new(),
        low: Vec::new(),
        total: topics.len(),
    };
    for topic in topics {
        match topic.priority {
            Priority::High => plan.high.push(topic),
            Priority::Medium => plan.medium.push(topic),
            Priority::Low => plan.low.push(topic),
        }
    }
    Ok(plan)
}

/// Spread topics across the days before the interview, highest priority
/// first. The final day is reserved for review, and remainder topics land
/// on the earliest days.
pub fn schedule(topics: &[Topic], days_until: usize) -> Vec<PlanDay> {
    if topics.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&Topic> = topics.iter().collect();
    sorted.sort_by(|a, b| {
        a.priority
            .rank()
            .cmp(&b.priority.rank())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let study_days = days_until.saturating_sub(1).max(1);
    let per_day = (sorted.len() / study_days).max(1);
    let remainder = sorted.len() % study_days;

    let today = Utc::now().date_naive();
    let mut plan = Vec::new();
    let mut index = 0;

    for day in 0..study_days {
        if index >= sorted.len() {
            break;
        }
        let count = per_day + usize::from(day < remainder);
        let entries = sorted[index..(index + count).min(sorted.len())]
            .iter()
            .map(|t| PlanEntry {
                topic_id: t.id,
                name: t.name.clone(),
                priority: t.priority,
            })
            .collect();
        index += count;

        plan.push(PlanDay {
            date: (today + Duration::days(day as i64)).format("%Y-%m-%d").to_string(),
            day_number: day + 1,
            topics: entries,
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TopicSeed;

    fn topic(id: i64, name: &str, priority: Priority) -> Topic {
        Topic {
            id,
            study_material_id: 1,
            name: name.to_string(),
            category_path: None,
            priority,
            status: "pending".to_string(),
            notes: String::new(),
            ai_guidance: None,
            ai_notes: None,
        }
    }

    #[test]
    fn test_grouping_by_priority() {
        let db = Database::open_memory().unwrap();
        let id = db.create_material("Acme", "DS", Some("2026-09-10")).unwrap();
        for (name, priority) in [
            ("a", Priority::High),
            ("b", Priority::Medium),
            ("c", Priority::Low),
            ("d", Priority::High),
        ] {
            db.insert_topic(
                id,
                &TopicSeed {
                    name: name.to_string(),
                    category: None,
                    priority,
                },
                "",
            )
            .unwrap();
        }

        let plan = study_plan(&db, id).unwrap();
        assert_eq!(plan.high.len(), 2);
        assert_eq!(plan.medium.len(), 1);
        assert_eq!(plan.low.len(), 1);
        assert_eq!(plan.total, 4);
        assert_eq!(plan.date.as_deref(), Some("2026-09-10"));
    }

    #[test]
    fn test_schedule_orders_high_first_and_reserves_review_day() {
        let topics = vec![
            topic(1, "zeta", Priority::Low),
            topic(2, "alpha", Priority::High),
            topic(3, "beta", Priority::Medium),
            topic(4, "gamma", Priority::High),
        ];
        let plan = schedule(&topics, 3);

        // 3 days until: 2 study days, last day free for review.
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].topics.len(), 2);
        assert_eq!(plan[0].topics[0].name, "alpha");
        assert_eq!(plan[0].topics[1].name, "gamma");
        assert_eq!(plan[1].topics[0].name, "beta");
        assert_eq!(plan[1].topics[1].name, "zeta");
    }

    #[test]
    fn test_schedule_single_day_takes_everything() {
        let topics = vec![topic(1, "a", Priority::High), topic(2, "b", Priority::Low)];
        let plan = schedule(&topics, 1);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].topics.len(), 2);
    }

    #[test]
    fn test_schedule_empty() {
        assert!(schedule(&[], 5).is_empty());
    }
}

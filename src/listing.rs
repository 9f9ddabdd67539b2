use crate::{Injection, Level, Record};
use chrono::TimeZone;
use serde::Serialize;

const SHORT_COMMENT_LENGTH: usize = 20;
const SHORT_COMMENT_ENDING: &str = "<...>";

/// A record with its attachments and the one-line summaries of the diary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedRecord {
    pub id: i64,
    pub when: String,
    pub sugar_meterings: Vec<Level>,
    pub meals: Vec<Level>,
    pub insulin_injections: Vec<Injection>,
    pub comments: Vec<String>,
    pub meal_info: Option<String>,
    pub injections_info: Option<String>,
    pub short_comments: Option<String>,
}

impl ListedRecord {
    pub fn new<Tz: TimeZone>(record: &Record, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            id: record.id,
            when: record.local_when(tz).format("%Y-%m-%d %H:%M").to_string(),
            sugar_meterings: record.meterings.clone(),
            meals: record.meals.clone(),
            insulin_injections: record.injections.clone(),
            comments: record.comments.clone(),
            meal_info: meal_info(&record.meals),
            injections_info: injections_info(&record.injections),
            short_comments: short_comments(&record.comments),
        }
    }
}

/// `"2.0+1.5"`, `None` without meals.
pub fn meal_info(meals: &[Level]) -> Option<String> {
    if meals.is_empty() {
        return None;
    }
    Some(
        meals
            .iter()
            .map(Level::to_string)
            .collect::<Vec<_>>()
            .join("+"),
    )
}

/// `"2+3 Foo, 4 Bar"`: quantities per kind, kinds in first-seen order.
/// Unknown quantities show as `?`.
pub fn injections_info(injections: &[Injection]) -> Option<String> {
    if injections.is_empty() {
        return None;
    }

    let mut by_kind: Vec<(&str, Vec<String>)> = Vec::new();
    for injection in injections {
        let quantity = injection
            .quantity
            .map(|q| q.to_string())
            .unwrap_or_else(|| "?".to_string());
        match by_kind.iter_mut().find(|(kind, _)| *kind == injection.kind) {
            Some((_, quantities)) => quantities.push(quantity),
            None => by_kind.push((&injection.kind, vec![quantity])),
        }
    }

    Some(
        by_kind
            .iter()
            .map(|(kind, quantities)| format!("{} {}", quantities.join("+"), kind))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub fn short_comment(content: &str) -> String {
    if content.chars().count() <= SHORT_COMMENT_LENGTH {
        return content.to_string();
    }
    let kept: String = content
        .chars()
        .take(SHORT_COMMENT_LENGTH - SHORT_COMMENT_ENDING.len())
        .collect();
    format!("{}{}", kept, SHORT_COMMENT_ENDING)
}

pub fn short_comments(comments: &[String]) -> Option<String> {
    if comments.is_empty() {
        return None;
    }
    Some(
        comments
            .iter()
            .map(|c| short_comment(c))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

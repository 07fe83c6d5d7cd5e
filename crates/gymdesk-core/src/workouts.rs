//! Workout logging and history queries
//!
//! Free-text workout descriptions are parsed by the LLM into structured
//! fields; muscle groups come from a keyword match on the original text.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::calendar::{day_bounds, local_today};
use crate::llm::{strip_code_fence, ChatClient, ChatMessage};
use crate::store::workouts::{NewWorkout, WorkoutEntry, WorkoutQuery};
use crate::store::GymDb;

const DEFAULT_LOOKBACK_DAYS: i64 = 30;

const PARSE_INSTRUCTION: &str = "You are a fitness tracking assistant. Parse the following workout description and extract the information in a JSON format with the following fields: exercise, weight, sets, reps, bodyweight (if mentioned), notes (any additional comments). Return null for any fields not mentioned. Clean up the formatting of the field info in your extraction as applicable (e.g. Capitalize first letters, spelled out numbers should be converted to numbers, add punctuation to notes when applicable). Return only the JSON object without any markdown formatting.";

/// Keyword variations per muscle group, matched as substrings
const MUSCLE_GROUP_KEYWORDS: &[(&str, &[&str])] = &[
    ("chest", &["chest", "pec", "bench"]),
    ("back", &["back", "lat", "row", "pull"]),
    ("shoulders", &["shoulder", "delt", "press", "ohp"]),
    ("legs", &["leg", "quad", "squat", "calf", "calves"]),
    ("biceps", &["bicep", "curl", "bi"]),
    ("triceps", &["tricep", "extension", "tri"]),
    ("core", &["core", "ab", "abs", "plank"]),
    ("glutes", &["glute", "hip", "bridge"]),
];

/// Muscle groups mentioned in `text`, in keyword-table order
pub fn detect_muscle_groups(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    MUSCLE_GROUP_KEYWORDS
        .iter()
        .filter(|(_, terms)| terms.iter().any(|t| lower.contains(t)))
        .map(|(group, _)| group.to_string())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedWorkout {
    pub exercise: String,
    pub weight: Option<String>,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub bodyweight: Option<f64>,
    pub notes: String,
    pub muscle_groups: Vec<String>,
}

impl ParsedWorkout {
    /// Clean up the model's JSON. Numbers may arrive as strings.
    pub fn from_llm_json(value: &serde_json::Value, original_text: &str) -> Self {
        Self {
            exercise: text_field(value.get("exercise")).unwrap_or_default(),
            weight: text_field(value.get("weight")),
            sets: number_field(value.get("sets")).map(|n| n as i32),
            reps: number_field(value.get("reps")).map(|n| n as i32),
            bodyweight: number_field(value.get("bodyweight")),
            notes: text_field(value.get("notes")).unwrap_or_default(),
            muscle_groups: detect_muscle_groups(original_text),
        }
    }

    /// What gets stored when the model can't be reached or returns junk
    pub fn fallback(original_text: &str) -> Self {
        Self {
            muscle_groups: detect_muscle_groups(original_text),
            ..Default::default()
        }
    }
}

fn text_field(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => leading_number(s),
        _ => None,
    }
    .filter(|n| *n != 0.0)
}

/// Leading numeric part of a string ("135 lbs" -> 135.0)
pub fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    s[..end].parse().ok()
}

#[derive(Clone)]
pub struct WorkoutParser {
    llm: ChatClient,
}

impl WorkoutParser {
    pub fn new(llm: ChatClient) -> Self {
        Self { llm }
    }

    pub async fn parse(&self, text: &str) -> ParsedWorkout {
        let messages = [ChatMessage::system(PARSE_INSTRUCTION), ChatMessage::user(text)];
        let raw = match self.llm.complete(&messages, Some(0.7)).await {
            Ok(r) => r,
            Err(e) => {
                error!("Error parsing workout text: {}", e);
                return ParsedWorkout::fallback(text);
            }
        };

        match serde_json::from_str::<serde_json::Value>(strip_code_fence(&raw)) {
            Ok(value) if value.is_object() => ParsedWorkout::from_llm_json(&value, text),
            _ => {
                warn!("Workout parser returned non-JSON output: {}", raw);
                ParsedWorkout::fallback(text)
            }
        }
    }
}

// ============================================================================
// Date ranges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Today,
    /// The last 7 days, from local midnight
    Week,
    /// The last 30 days, from local midnight
    Month,
    Day(NaiveDate),
    /// Anything unrecognised: the last 30 days
    Default,
}

impl DateRange {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_lowercase().as_str() {
            "today" => return DateRange::Today,
            "week" => return DateRange::Week,
            "month" => return DateRange::Month,
            _ => {}
        }
        if raw.contains('-') {
            if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                return DateRange::Day(date);
            }
        }
        DateRange::Default
    }

    pub fn label(&self) -> String {
        match self {
            DateRange::Today => "today".to_string(),
            DateRange::Week => "week".to_string(),
            DateRange::Month => "month".to_string(),
            DateRange::Day(d) => d.format("%Y-%m-%d").to_string(),
            DateRange::Default => format!("last {} days", DEFAULT_LOOKBACK_DAYS),
        }
    }

    /// `[since, until)`; an open end means "up to now"
    pub fn bounds(&self, now: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        let today = local_today(now, tz);
        match self {
            DateRange::Today => {
                let (start, end) = day_bounds(today, tz);
                (start, Some(end))
            }
            DateRange::Day(date) => {
                let (start, end) = day_bounds(*date, tz);
                (start, Some(end))
            }
            DateRange::Week => (day_bounds(today - Duration::days(7), tz).0, None),
            DateRange::Month | DateRange::Default => (
                day_bounds(today - Duration::days(DEFAULT_LOOKBACK_DAYS), tz).0,
                None,
            ),
        }
    }
}

// ============================================================================
// Aggregates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseStats {
    pub exercise: String,
    pub period: String,
    pub workout_count: usize,
    pub total_sets: i64,
    /// Sum of sets x reps
    pub total_reps: i64,
    pub max_weight: f64,
    pub last_workout: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutSummary {
    pub period: String,
    pub total_days: usize,
    pub total_exercises: usize,
    pub category_summary: BTreeMap<String, usize>,
    pub muscle_group_summary: BTreeMap<String, usize>,
    pub first_workout: Option<NaiveDate>,
    pub last_workout: Option<NaiveDate>,
}

/// Stats over entries ordered newest first
pub fn exercise_stats(exercise: &str, period: String, entries: &[WorkoutEntry], tz: Tz) -> ExerciseStats {
    let mut total_sets = 0i64;
    let mut total_reps = 0i64;
    let mut max_weight = 0f64;

    for e in entries {
        let sets = i64::from(e.sets.unwrap_or(0));
        total_sets += sets;
        total_reps += sets * i64::from(e.reps.unwrap_or(0));
        if let Some(w) = e.weight.as_deref().and_then(leading_number) {
            max_weight = max_weight.max(w);
        }
    }

    ExerciseStats {
        exercise: exercise.to_string(),
        period,
        workout_count: entries.len(),
        total_sets,
        total_reps,
        max_weight,
        last_workout: entries.first().map(|e| e.date.with_timezone(&tz).date_naive()),
    }
}

/// Summary over entries ordered newest first
pub fn summarize(period: String, entries: &[WorkoutEntry], tz: Tz) -> WorkoutSummary {
    let days: BTreeSet<NaiveDate> = entries
        .iter()
        .map(|e| e.date.with_timezone(&tz).date_naive())
        .collect();

    let mut category_summary = BTreeMap::new();
    let mut muscle_group_summary = BTreeMap::new();
    for e in entries {
        if let Some(category) = &e.exercise_category {
            *category_summary.entry(category.clone()).or_insert(0) += 1;
        }
        for group in &e.muscle_groups {
            *muscle_group_summary.entry(group.clone()).or_insert(0) += 1;
        }
    }

    WorkoutSummary {
        period,
        total_days: days.len(),
        total_exercises: entries.len(),
        category_summary,
        muscle_group_summary,
        first_workout: entries.last().map(|e| e.date.with_timezone(&tz).date_naive()),
        last_workout: entries.first().map(|e| e.date.with_timezone(&tz).date_naive()),
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct WorkoutService {
    db: Arc<GymDb>,
    parser: WorkoutParser,
    timezone: Tz,
}

impl WorkoutService {
    pub fn new(db: Arc<GymDb>, parser: WorkoutParser, timezone: Tz) -> Self {
        Self {
            db,
            parser,
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Parse a free-text description and store it dated now
    pub async fn create_entry(&self, user_id: Uuid, text: &str) -> Result<WorkoutEntry> {
        let parsed = self.parser.parse(text).await;
        let entry = self.db.workouts().insert(&NewWorkout {
            id: Uuid::new_v4(),
            user_id,
            exercise: parsed.exercise,
            weight: parsed.weight,
            sets: parsed.sets,
            reps: parsed.reps,
            bodyweight: parsed.bodyweight,
            notes: parsed.notes,
            muscle_groups: parsed.muscle_groups,
            exercise_category: None,
            date: Utc::now(),
        })?;
        info!("🏋️ Logged workout {} for {}", entry.id, user_id);
        Ok(entry)
    }

    pub fn history(&self, user_id: Uuid, range: DateRange) -> Result<Vec<WorkoutEntry>> {
        self.query(user_id, range, None)
    }

    pub fn exercise_stats(&self, user_id: Uuid, exercise: &str, range: DateRange) -> Result<ExerciseStats> {
        let entries = self.query(user_id, range, Some(exercise))?;
        Ok(exercise_stats(exercise, range.label(), &entries, self.timezone))
    }

    pub fn summary(&self, user_id: Uuid, range: DateRange) -> Result<WorkoutSummary> {
        let entries = self.query(user_id, range, None)?;
        Ok(summarize(range.label(), &entries, self.timezone))
    }

    /// Entries from the last `days` days, for balance analysis
    pub fn recent(&self, user_id: Uuid, days: i64) -> Result<Vec<WorkoutEntry>> {
        self.db.workouts().history(
            user_id,
            &WorkoutQuery {
                since: Some(Utc::now() - Duration::days(days)),
                ..Default::default()
            },
        )
    }

    fn query(&self, user_id: Uuid, range: DateRange, exercise: Option<&str>) -> Result<Vec<WorkoutEntry>> {
        let (since, until) = range.bounds(Utc::now(), self.timezone);
        self.db.workouts().history(
            user_id,
            &WorkoutQuery {
                since: Some(since),
                until,
                exercise,
            },
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::workout;
    use super::*;
    use crate::llm::test_support::{mock_completion, mock_failure};
    use chrono::TimeZone;
    use wiremock::MockServer;

    #[test]
    fn test_detect_muscle_groups() {
        assert_eq!(detect_muscle_groups("Bench press 3x10"), vec!["chest", "shoulders"]);
        assert_eq!(detect_muscle_groups("SQUATS and planks"), vec!["legs", "core"]);
        assert!(detect_muscle_groups("went for a swim").is_empty());
    }

    #[test]
    fn test_parse_cleans_fields() {
        let json = serde_json::json!({
            "exercise": "Deadlift",
            "weight": "225 lbs",
            "sets": "3",
            "reps": 5,
            "bodyweight": null,
            "notes": null
        });
        let parsed = ParsedWorkout::from_llm_json(&json, "deadlift 225 for 3 sets of 5");
        assert_eq!(parsed.exercise, "Deadlift");
        assert_eq!(parsed.weight.as_deref(), Some("225 lbs"));
        assert_eq!(parsed.sets, Some(3));
        assert_eq!(parsed.reps, Some(5));
        assert_eq!(parsed.bodyweight, None);
        assert_eq!(parsed.notes, "");
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("135 lbs"), Some(135.0));
        assert_eq!(leading_number("22.5kg"), Some(22.5));
        assert_eq!(leading_number("heavy"), None);
    }

    #[tokio::test]
    async fn test_parser_strips_fences() {
        let server = MockServer::start().await;
        mock_completion(
            &server,
            "```json\n{\"exercise\": \"Barbell Curl\", \"sets\": 3, \"reps\": 12}\n```",
        )
        .await;
        let parser = WorkoutParser::new(ChatClient::new(&server.uri(), "k", "gpt-4").unwrap());
        let parsed = parser.parse("barbell curls 3x12").await;
        assert_eq!(parsed.exercise, "Barbell Curl");
        assert_eq!(parsed.sets, Some(3));
        assert_eq!(parsed.muscle_groups, vec!["biceps"]);
    }

    #[tokio::test]
    async fn test_parser_falls_back_on_failure() {
        let server = MockServer::start().await;
        mock_failure(&server, 503).await;
        let parser = WorkoutParser::new(ChatClient::new(&server.uri(), "k", "gpt-4").unwrap());
        let parsed = parser.parse("leg day").await;
        assert_eq!(parsed.exercise, "");
        assert_eq!(parsed.sets, None);
        assert_eq!(parsed.muscle_groups, vec!["legs"]);
    }

    #[test]
    fn test_date_range_parse() {
        assert_eq!(DateRange::parse("today"), DateRange::Today);
        assert_eq!(DateRange::parse("Week"), DateRange::Week);
        assert_eq!(DateRange::parse("month"), DateRange::Month);
        assert_eq!(
            DateRange::parse("2025-01-18"),
            DateRange::Day(NaiveDate::from_ymd_opt(2025, 1, 18).unwrap())
        );
        assert_eq!(DateRange::parse("2025-13-45"), DateRange::Default);
        assert_eq!(DateRange::parse("yesterday"), DateRange::Default);
    }

    #[test]
    fn test_date_range_bounds() {
        let now = Utc.with_ymd_and_hms(2025, 1, 18, 15, 0, 0).unwrap();
        let (start, end) = DateRange::Today.bounds(now, chrono_tz::UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 18, 0, 0, 0).unwrap());
        assert_eq!(end, Some(Utc.with_ymd_and_hms(2025, 1, 19, 0, 0, 0).unwrap()));

        let (start, end) = DateRange::Week.bounds(now, chrono_tz::UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap());
        assert_eq!(end, None);

        let (start, _) = DateRange::Default.bounds(now, chrono_tz::UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 19, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_exercise_stats() {
        let mut heavy = workout(17, &["chest"]);
        heavy.weight = Some("155".into());
        heavy.sets = Some(5);
        heavy.reps = Some(5);
        let entries = vec![workout(18, &["chest"]), heavy];

        let stats = exercise_stats("bench", "week".into(), &entries, chrono_tz::UTC);
        assert_eq!(stats.workout_count, 2);
        assert_eq!(stats.total_sets, 8);
        assert_eq!(stats.total_reps, 30 + 25);
        assert_eq!(stats.max_weight, 155.0);
        assert_eq!(stats.last_workout, NaiveDate::from_ymd_opt(2025, 1, 18));
    }

    #[test]
    fn test_summary_counts() {
        let mut categorized = workout(16, &["legs"]);
        categorized.exercise_category = Some("strength".into());
        let entries = vec![
            workout(18, &["chest", "triceps"]),
            workout(18, &["chest"]),
            categorized,
        ];

        let summary = summarize("week".into(), &entries, chrono_tz::UTC);
        assert_eq!(summary.total_days, 2);
        assert_eq!(summary.total_exercises, 3);
        assert_eq!(summary.muscle_group_summary.get("chest"), Some(&2));
        assert_eq!(summary.category_summary.get("strength"), Some(&1));
        assert_eq!(summary.first_workout, NaiveDate::from_ymd_opt(2025, 1, 16));
        assert_eq!(summary.last_workout, NaiveDate::from_ymd_opt(2025, 1, 18));
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize("today".into(), &[], chrono_tz::UTC);
        assert_eq!(summary.total_days, 0);
        assert_eq!(summary.first_workout, None);
    }
}

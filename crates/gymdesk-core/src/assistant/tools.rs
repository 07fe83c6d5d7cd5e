//! Tools the member assistant can call
//!
//! Member-specific tools are constructed per session with the member's id
//! baked in, so the model never supplies a user id.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use super::agent::{Tool, ToolResult};
use crate::analysis::{self, analyze_muscle_balance, DEFAULT_WINDOW_DAYS, RECOMMENDATION_SOURCE};
use crate::calendar::day_bounds;
use crate::knowledge::KnowledgeSearch;
use crate::store::classes::BookingError;
use crate::store::GymDb;
use crate::workouts::{DateRange, WorkoutService};

/// Done tool - signals the agent is finished and doesn't need to send another message
pub struct DoneTool;

#[async_trait]
impl Tool for DoneTool {
    fn name(&self) -> &str {
        "done"
    }

    fn description(&self) -> &str {
        "No-op signal. Use ONLY when messages is [] AND no other tools needed. Indicates nothing to do this turn."
    }

    fn args_schema(&self) -> &str {
        r#"{}"#
    }

    async fn execute(&self, _args: &HashMap<String, String>) -> Result<ToolResult> {
        Ok(ToolResult::success("Done."))
    }
}

pub struct KnowledgeSearchTool {
    search: KnowledgeSearch,
}

impl KnowledgeSearchTool {
    pub fn new(search: KnowledgeSearch) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        "knowledge_search"
    }

    fn description(&self) -> &str {
        "Search the gym's knowledge base (policies, hours, pricing, facilities, amenities)."
    }

    fn args_schema(&self) -> &str {
        r#"{"query": "what to look up"}"#
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let query = args
            .get("query")
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| anyhow::anyhow!("query argument required"))?;

        let entries = self.search.find_relevant(query).await;
        if entries.is_empty() {
            return Ok(ToolResult::success("No matching gym information found."));
        }

        let text = entries
            .iter()
            .map(|e| format!("[{}]: {}", e.title, e.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(ToolResult::success(text))
    }
}

pub struct MuscleBalanceTool {
    db: Arc<GymDb>,
    workouts: WorkoutService,
    user_id: Uuid,
}

impl MuscleBalanceTool {
    pub fn new(db: Arc<GymDb>, workouts: WorkoutService, user_id: Uuid) -> Self {
        Self {
            db,
            workouts,
            user_id,
        }
    }
}

#[async_trait]
impl Tool for MuscleBalanceTool {
    fn name(&self) -> &str {
        "muscle_balance"
    }

    fn description(&self) -> &str {
        "Analyze the member's recent training for push/pull imbalance and neglected muscle groups, with injury-prevention recommendations."
    }

    fn args_schema(&self) -> &str {
        r#"{"days": "days of history to analyze (default 30)"}"#
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let days = args
            .get("days")
            .and_then(|d| d.trim().parse::<i64>().ok())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_WINDOW_DAYS);

        let entries = self.workouts.recent(self.user_id, days)?;
        let report = analyze_muscle_balance(&entries);

        if let Some(first) = report.recommendations.first() {
            if let Err(e) = self
                .db
                .users()
                .record_recommendation(self.user_id, first, RECOMMENDATION_SOURCE)
            {
                // The analysis is still useful without the stored copy
                warn!("Failed to store recommendation for {}: {}", self.user_id, e);
            }
        }

        Ok(ToolResult::success(analysis::describe(&report, days)))
    }
}

pub struct ClassBookingTool {
    db: Arc<GymDb>,
    user_id: Uuid,
    timezone: Tz,
}

impl ClassBookingTool {
    pub fn new(db: Arc<GymDb>, user_id: Uuid, timezone: Tz) -> Self {
        Self {
            db,
            user_id,
            timezone,
        }
    }

    fn list_classes(&self, date: Option<&str>) -> Result<serde_json::Value, BookingError> {
        let window = match date.map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => {
                let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| anyhow::anyhow!("date must be YYYY-MM-DD"))?;
                Some(day_bounds(day, self.timezone))
            }
            None => None,
        };

        let classes = self.db.classes().list_available(window)?;
        let tz = self.timezone;
        let listed: Vec<serde_json::Value> = classes
            .into_iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "name": c.name,
                    "instructor": c.instructor,
                    "schedule": c.schedule.with_timezone(&tz).format("%m/%d/%Y, %-I:%M %p").to_string(),
                    "duration": c.duration,
                    "capacity": c.capacity,
                    "available_spots": c.available_spots,
                    "description": c.description,
                })
            })
            .collect();
        Ok(serde_json::json!({ "success": true, "classes": listed }))
    }

    /// `class_id`, or the id of the first upcoming class matching `class_name`
    fn resolve_class_id(&self, args: &HashMap<String, String>) -> Result<String, BookingError> {
        if let Some(id) = args.get("class_id").filter(|s| !s.trim().is_empty()) {
            return Ok(id.clone());
        }
        match args.get("class_name").filter(|s| !s.trim().is_empty()) {
            Some(name) => Ok(self.db.classes().find_by_name(name)?.id.to_string()),
            None => Err(anyhow::anyhow!("class_id or class_name is required").into()),
        }
    }

    fn run(&self, action: &str, args: &HashMap<String, String>) -> Result<serde_json::Value, BookingError> {
        let tz = self.timezone;
        match action {
            "list_classes" => self.list_classes(args.get("date").map(String::as_str)),
            "check_availability" => {
                let id = self.resolve_class_id(args)?;
                let a = self.db.classes().check_availability(&id)?;
                Ok(serde_json::json!({
                    "success": true,
                    "class_name": a.class_name,
                    "available_spots": a.available_spots,
                    "is_available": a.is_available,
                    "schedule": a.schedule.with_timezone(&tz).format("%m/%d/%Y, %-I:%M %p").to_string(),
                }))
            }
            "book_class" => {
                let id = self.resolve_class_id(args)?;
                let booking = self.db.classes().book(&id, self.user_id)?;
                let when = booking
                    .schedule
                    .with_timezone(&tz)
                    .format("%m/%d/%Y, %-I:%M %p")
                    .to_string();
                Ok(serde_json::json!({
                    "success": true,
                    "message": format!("Successfully booked {} for {}", booking.class_name, when),
                    "booking_id": booking.booking_id,
                }))
            }
            other => Err(anyhow::anyhow!("Unknown action: {}", other).into()),
        }
    }
}

/// Tool output shape: `{name, action, success, ...}`
fn booking_result(action: &str, outcome: Result<serde_json::Value, BookingError>) -> ToolResult {
    let mut body = serde_json::json!({ "name": "class_booking", "action": action });
    let ok = outcome.is_ok();
    match outcome {
        Ok(serde_json::Value::Object(fields)) => {
            if let serde_json::Value::Object(map) = &mut body {
                map.extend(fields);
            }
        }
        Ok(other) => body["result"] = other,
        Err(e) => {
            if matches!(e, BookingError::Database(_)) {
                error!("Class booking tool error: {}", e);
            }
            body["success"] = serde_json::json!(false);
            body["error"] = serde_json::json!(e.to_string());
        }
    }

    if ok {
        ToolResult::success(body.to_string())
    } else {
        ToolResult {
            success: false,
            output: String::new(),
            error: Some(body.to_string()),
        }
    }
}

#[async_trait]
impl Tool for ClassBookingTool {
    fn name(&self) -> &str {
        "class_booking"
    }

    fn description(&self) -> &str {
        "View upcoming classes and manage the member's class bookings. Pass class_name to book or check a class by name."
    }

    fn args_schema(&self) -> &str {
        r#"{"action": "list_classes|book_class|check_availability", "class_name": "name of the class (optional)", "class_id": "UUID of the class (optional)", "date": "YYYY-MM-DD to filter list_classes (optional)"}"#
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let action = args.get("action").map(String::as_str).unwrap_or("list_classes");
        Ok(booking_result(action, self.run(action, args)))
    }
}

pub struct LogWorkoutTool {
    workouts: WorkoutService,
    user_id: Uuid,
}

impl LogWorkoutTool {
    pub fn new(workouts: WorkoutService, user_id: Uuid) -> Self {
        Self { workouts, user_id }
    }
}

pub const LOG_FAILED_MESSAGE: &str =
    "Sorry, I couldn't log your workout. Please try again with exercise name, sets, and reps clearly stated.";

#[async_trait]
impl Tool for LogWorkoutTool {
    fn name(&self) -> &str {
        "log_workout"
    }

    fn description(&self) -> &str {
        "Log a workout from the member's own description. Include exercise name, weight, sets, reps and any notes."
    }

    fn args_schema(&self) -> &str {
        r#"{"description": "the workout as the member described it"}"#
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let description = args
            .get("description")
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| anyhow::anyhow!("description argument required"))?;

        match self.workouts.create_entry(self.user_id, description).await {
            Ok(entry) => {
                let mut details = Vec::new();
                if !entry.exercise.is_empty() {
                    details.push(format!("Exercise: {}", entry.exercise));
                }
                if let Some(w) = &entry.weight {
                    details.push(format!("Weight: {}", w));
                }
                if let Some(s) = entry.sets {
                    details.push(format!("Sets: {}", s));
                }
                if let Some(r) = entry.reps {
                    details.push(format!("Reps: {}", r));
                }
                if let Some(b) = entry.bodyweight {
                    details.push(format!("Bodyweight: {}", b));
                }
                if !entry.notes.is_empty() {
                    details.push(format!("Notes: {}", entry.notes));
                }
                if !entry.muscle_groups.is_empty() {
                    details.push(format!("Muscle Groups: {}", entry.muscle_groups.join(", ")));
                }
                Ok(ToolResult::success(format!(
                    "Workout logged successfully!\n{}",
                    details.join("\n")
                )))
            }
            Err(e) => {
                error!("Error in workout entry tool: {}", e);
                Ok(ToolResult::error(LOG_FAILED_MESSAGE))
            }
        }
    }
}

pub struct WorkoutHistoryTool {
    workouts: WorkoutService,
    user_id: Uuid,
}

impl WorkoutHistoryTool {
    pub fn new(workouts: WorkoutService, user_id: Uuid) -> Self {
        Self { workouts, user_id }
    }

    fn run(&self, action: &str, args: &HashMap<String, String>) -> Result<serde_json::Value> {
        let range = DateRange::parse(args.get("date_range").map(String::as_str).unwrap_or("month"));
        let tz = self.workouts.timezone();

        match action {
            "show_history" => {
                let entries = self.workouts.history(self.user_id, range)?;
                let rows: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|w| {
                        serde_json::json!({
                            "date": w.date.with_timezone(&tz).format("%m/%d/%Y").to_string(),
                            "exercise": w.exercise,
                            "weight": w.weight,
                            "sets": w.sets,
                            "reps": w.reps,
                            "notes": w.notes,
                            "muscle_groups": w.muscle_groups,
                        })
                    })
                    .collect();
                Ok(serde_json::json!({ "success": true, "period": range.label(), "workouts": rows }))
            }
            "exercise_stats" => {
                let exercise = args
                    .get("exercise")
                    .map(|e| e.trim())
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| anyhow::anyhow!("Exercise name is required for stats"))?;
                let stats = self.workouts.exercise_stats(self.user_id, exercise, range)?;
                Ok(serde_json::json!({ "success": true, "stats": stats }))
            }
            "summary" => {
                let summary = self.workouts.summary(self.user_id, range)?;
                Ok(serde_json::json!({ "success": true, "summary": summary }))
            }
            other => Err(anyhow::anyhow!("Unknown action: {}", other)),
        }
    }
}

#[async_trait]
impl Tool for WorkoutHistoryTool {
    fn name(&self) -> &str {
        "workout_history"
    }

    fn description(&self) -> &str {
        "Query the member's logged workouts: recent history, stats for one exercise, or a summary by muscle group."
    }

    fn args_schema(&self) -> &str {
        r#"{"action": "show_history|exercise_stats|summary", "date_range": "today|week|month or YYYY-MM-DD (default month)", "exercise": "exercise name (required for exercise_stats)"}"#
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let action = args.get("action").map(String::as_str).unwrap_or("show_history");
        let mut body = serde_json::json!({ "name": "workout_history", "action": action });

        match self.run(action, args) {
            Ok(serde_json::Value::Object(fields)) => {
                if let serde_json::Value::Object(map) = &mut body {
                    map.extend(fields);
                }
                Ok(ToolResult::success(body.to_string()))
            }
            Ok(other) => {
                body["result"] = other;
                Ok(ToolResult::success(body.to_string()))
            }
            Err(e) => {
                error!("Workout history tool error: {}", e);
                body["success"] = serde_json::json!(false);
                body["error"] = serde_json::json!(e.to_string());
                Ok(ToolResult::error(body.to_string()))
            }
        }
    }
}

/// Exposes a rig tool through the assistant's string-argument contract
pub struct RigToolAdapter<T> {
    inner: T,
    description: &'static str,
    args_schema: &'static str,
}

impl<T> RigToolAdapter<T> {
    pub fn new(inner: T, description: &'static str, args_schema: &'static str) -> Self {
        Self {
            inner,
            description,
            args_schema,
        }
    }
}

/// String args as a JSON object; values that parse as JSON keep their type
pub fn args_to_json(args: &HashMap<String, String>) -> serde_json::Value {
    let map = args
        .iter()
        .map(|(k, v)| {
            let value = match serde_json::from_str::<serde_json::Value>(v) {
                Ok(parsed @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => parsed,
                _ => serde_json::Value::String(v.clone()),
            };
            (k.clone(), value)
        })
        .collect();
    serde_json::Value::Object(map)
}

#[async_trait]
impl<T> Tool for RigToolAdapter<T>
where
    T: rig::tool::Tool + Send + Sync,
{
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        self.description
    }

    fn args_schema(&self) -> &str {
        self.args_schema
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let parsed: T::Args = match serde_json::from_value(args_to_json(args)) {
            Ok(a) => a,
            Err(e) => return Ok(ToolResult::error(format!("Invalid arguments: {}", e))),
        };

        match self.inner.call(parsed).await {
            Ok(output) => {
                let text = match serde_json::to_value(&output)? {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Ok(ToolResult::success(text))
            }
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymdesk_tools::CurrentDateTime;

    #[tokio::test]
    async fn test_done_tool() {
        let result = DoneTool.execute(&HashMap::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Done.");
    }

    #[test]
    fn test_args_to_json() {
        let args = HashMap::from([
            ("format".to_string(), "day".to_string()),
            ("days".to_string(), "14".to_string()),
        ]);
        let json = args_to_json(&args);
        assert_eq!(json["format"], "day");
        assert_eq!(json["days"], 14);
    }

    #[tokio::test]
    async fn test_rig_adapter_runs_datetime_tool() {
        let tool = RigToolAdapter::new(
            CurrentDateTime::new(chrono_tz::UTC),
            "Get the current date or time",
            r#"{"format": "date|time|both|day"}"#,
        );
        assert_eq!(tool.name(), "current_datetime");

        let args = HashMap::from([("format".to_string(), "day".to_string())]);
        let result = tool.execute(&args).await.unwrap();
        assert!(result.success);
        let weekdays = [
            "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
        ];
        assert!(weekdays.contains(&result.output.as_str()));
    }

    #[tokio::test]
    async fn test_rig_adapter_rejects_bad_args() {
        let tool = RigToolAdapter::new(CurrentDateTime::new(chrono_tz::UTC), "", "");
        let args = HashMap::from([("format".to_string(), "fortnight".to_string())]);
        let result = tool.execute(&args).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid arguments"));
    }

    #[test]
    fn test_booking_result_shapes() {
        let ok = booking_result(
            "book_class",
            Ok(serde_json::json!({"success": true, "message": "Successfully booked Yoga for 01/20/2025, 9:00 AM"})),
        );
        assert!(ok.success);
        let body: serde_json::Value = serde_json::from_str(&ok.output).unwrap();
        assert_eq!(body["name"], "class_booking");
        assert_eq!(body["action"], "book_class");
        assert_eq!(body["success"], true);

        let err = booking_result("book_class", Err(BookingError::FullyBooked));
        assert!(!err.success);
        let body: serde_json::Value = serde_json::from_str(err.error.as_deref().unwrap()).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Class is fully booked");
    }
}

//! Workout history rows

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::schema::workout_history;

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Serialize)]
#[diesel(table_name = workout_history)]
pub struct WorkoutEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exercise: String,
    pub weight: Option<String>,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub bodyweight: Option<f64>,
    pub notes: String,
    pub muscle_groups: Vec<String>,
    pub exercise_category: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = workout_history)]
pub struct NewWorkout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exercise: String,
    pub weight: Option<String>,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub bodyweight: Option<f64>,
    pub notes: String,
    pub muscle_groups: Vec<String>,
    pub exercise_category: Option<String>,
    pub date: DateTime<Utc>,
}

/// Which rows a history query returns
#[derive(Debug, Clone, Default)]
pub struct WorkoutQuery<'a> {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Case-insensitive substring match on the exercise name
    pub exercise: Option<&'a str>,
}

pub struct WorkoutDb {
    conn: Arc<Mutex<PgConnection>>,
}

impl WorkoutDb {
    pub fn new(conn: Arc<Mutex<PgConnection>>) -> Self {
        Self { conn }
    }

    pub fn insert(&self, workout: &NewWorkout) -> Result<WorkoutEntry> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let entry = diesel::insert_into(workout_history::table)
            .values(workout)
            .returning(WorkoutEntry::as_returning())
            .get_result(&mut *conn)
            .context("Failed to insert workout")?;

        Ok(entry)
    }

    /// A member's workouts, newest first
    pub fn history(&self, user_id: Uuid, query: &WorkoutQuery<'_>) -> Result<Vec<WorkoutEntry>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let mut q = workout_history::table
            .filter(workout_history::user_id.eq(user_id))
            .select(WorkoutEntry::as_select())
            .into_boxed();

        if let Some(since) = query.since {
            q = q.filter(workout_history::date.ge(since));
        }
        if let Some(until) = query.until {
            q = q.filter(workout_history::date.lt(until));
        }
        if let Some(exercise) = query.exercise {
            q = q.filter(workout_history::exercise.ilike(format!("%{}%", exercise.trim())));
        }

        let entries = q
            .order(workout_history::date.desc())
            .load(&mut *conn)
            .context("Failed to load workout history")?;

        Ok(entries)
    }
}

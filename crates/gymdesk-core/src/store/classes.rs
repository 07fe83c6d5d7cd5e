//! Classes and bookings

use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::schema::{class_bookings, classes};

pub const BOOKING_CONFIRMED: &str = "confirmed";

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid class ID format")]
    InvalidClassId,
    #[error("No matching classes found")]
    NoMatchingClass,
    #[error("Class not found")]
    ClassNotFound,
    #[error("Class is fully booked")]
    FullyBooked,
    #[error("You have already booked this class")]
    AlreadyBooked,
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl From<diesel::result::Error> for BookingError {
    fn from(e: diesel::result::Error) -> Self {
        BookingError::Database(e.into())
    }
}

#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = classes)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub instructor: String,
    pub schedule: DateTime<Utc>,
    pub duration: i32,
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
}

/// A class with its remaining capacity
#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub id: Uuid,
    pub name: String,
    pub instructor: String,
    pub schedule: DateTime<Utc>,
    pub duration: i32,
    pub capacity: i32,
    pub available_spots: i64,
    pub description: Option<String>,
}

impl ClassSummary {
    fn new(class: Class, booked: i64) -> Self {
        Self {
            available_spots: available_spots(class.capacity, booked),
            id: class.id,
            name: class.name,
            instructor: class.instructor,
            schedule: class.schedule,
            duration: class.duration,
            capacity: class.capacity,
            description: class.description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub class_name: String,
    pub available_spots: i64,
    pub is_available: bool,
    pub schedule: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub booking_id: Uuid,
    pub class_name: String,
    pub schedule: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = class_bookings)]
struct NewBookingRow<'a> {
    id: Uuid,
    class_id: Uuid,
    user_id: Uuid,
    status: &'a str,
}

pub fn available_spots(capacity: i32, booked: i64) -> i64 {
    i64::from(capacity) - booked
}

/// Class ids arrive as free text from the assistant
pub fn parse_class_id(raw: &str) -> Result<Uuid, BookingError> {
    let raw = raw.trim();
    if raw.len() != 36 {
        return Err(BookingError::InvalidClassId);
    }
    Uuid::parse_str(raw).map_err(|_| BookingError::InvalidClassId)
}

pub struct ClassDb {
    conn: Arc<Mutex<PgConnection>>,
}

impl ClassDb {
    pub fn new(conn: Arc<Mutex<PgConnection>>) -> Self {
        Self { conn }
    }

    /// First upcoming class whose name contains `name`, case-insensitively
    pub fn find_by_name(&self, name: &str) -> Result<Class, BookingError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let pattern = format!("%{}%", escape_like(name.trim()));
        classes::table
            .filter(classes::name.ilike(pattern))
            .filter(classes::schedule.gt(Utc::now()))
            .order(classes::schedule.asc())
            .select(Class::as_select())
            .first(&mut *conn)
            .optional()?
            .ok_or(BookingError::NoMatchingClass)
    }

    /// Upcoming classes with remaining spots, optionally limited to `[start, end)`
    pub fn list_available(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> anyhow::Result<Vec<ClassSummary>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let mut query = classes::table
            .filter(classes::schedule.gt(Utc::now()))
            .select(Class::as_select())
            .into_boxed();

        if let Some((start, end)) = window {
            query = query
                .filter(classes::schedule.ge(start))
                .filter(classes::schedule.lt(end));
        }

        let found: Vec<Class> = query
            .order(classes::schedule.asc())
            .load(&mut *conn)
            .context("Failed to list classes")?;

        let ids: Vec<Uuid> = found.iter().map(|c| c.id).collect();
        let counts: HashMap<Uuid, i64> = class_bookings::table
            .filter(class_bookings::class_id.eq_any(ids))
            .group_by(class_bookings::class_id)
            .select((class_bookings::class_id, diesel::dsl::count_star()))
            .load::<(Uuid, i64)>(&mut *conn)?
            .into_iter()
            .collect();

        Ok(found
            .into_iter()
            .map(|c| {
                let booked = counts.get(&c.id).copied().unwrap_or(0);
                ClassSummary::new(c, booked)
            })
            .collect())
    }

    pub fn check_availability(&self, class_id: &str) -> Result<Availability, BookingError> {
        let id = parse_class_id(class_id)?;
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        availability(&mut conn, id)
    }

    pub fn book(&self, class_id: &str, user_id: Uuid) -> Result<Booking, BookingError> {
        let id = parse_class_id(class_id)?;
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        conn.transaction::<_, BookingError, _>(|conn| {
            let availability = availability(conn, id)?;
            if !availability.is_available {
                return Err(BookingError::FullyBooked);
            }

            let already: bool = diesel::dsl::select(diesel::dsl::exists(
                class_bookings::table
                    .filter(class_bookings::class_id.eq(id))
                    .filter(class_bookings::user_id.eq(user_id)),
            ))
            .get_result(conn)?;
            if already {
                return Err(BookingError::AlreadyBooked);
            }

            let booking_id = Uuid::new_v4();
            diesel::insert_into(class_bookings::table)
                .values(&NewBookingRow {
                    id: booking_id,
                    class_id: id,
                    user_id,
                    status: BOOKING_CONFIRMED,
                })
                .execute(conn)?;

            Ok(Booking {
                booking_id,
                class_name: availability.class_name,
                schedule: availability.schedule,
            })
        })
    }
}

fn availability(conn: &mut PgConnection, id: Uuid) -> Result<Availability, BookingError> {
    let class: Class = classes::table
        .find(id)
        .select(Class::as_select())
        .first(conn)
        .optional()?
        .ok_or(BookingError::ClassNotFound)?;

    let booked: i64 = class_bookings::table
        .filter(class_bookings::class_id.eq(id))
        .count()
        .get_result(conn)?;

    let spots = available_spots(class.capacity, booked);
    Ok(Availability {
        class_name: class.name,
        available_spots: spots,
        is_available: spots > 0,
        schedule: class.schedule,
    })
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_spots() {
        assert_eq!(available_spots(20, 5), 15);
        assert_eq!(available_spots(10, 10), 0);
        assert_eq!(available_spots(10, 12), -2);
    }

    #[test]
    fn test_parse_class_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_class_id(&id.to_string()).unwrap(), id);
        assert_eq!(parse_class_id(&format!(" {} ", id)).unwrap(), id);
        assert!(matches!(
            parse_class_id("yoga-monday"),
            Err(BookingError::InvalidClassId)
        ));
        assert!(matches!(
            parse_class_id(&id.simple().to_string()),
            Err(BookingError::InvalidClassId)
        ));
    }

    #[test]
    fn test_booking_error_messages() {
        assert_eq!(BookingError::FullyBooked.to_string(), "Class is fully booked");
        assert_eq!(
            BookingError::AlreadyBooked.to_string(),
            "You have already booked this class"
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}

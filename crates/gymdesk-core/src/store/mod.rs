//! Postgres persistence
//!
//! One connection shared behind a mutex; each table gets a small `*Db`
//! accessor handed out by `GymDb`.

pub mod classes;
pub mod knowledge;
pub mod tickets;
pub mod users;
pub mod workouts;

use anyhow::{Context, Result};
use diesel::pg::PgConnection;
use diesel::Connection;
use std::sync::{Arc, Mutex};

use crate::events::EventBus;

pub use classes::ClassDb;
pub use knowledge::KnowledgeDb;
pub use tickets::TicketDb;
pub use users::UserDb;
pub use workouts::WorkoutDb;

pub struct GymDb {
    tickets: TicketDb,
    users: UserDb,
    knowledge: KnowledgeDb,
    classes: ClassDb,
    workouts: WorkoutDb,
}

impl GymDb {
    pub fn connect(database_url: &str, events: EventBus) -> Result<Self> {
        let conn = PgConnection::establish(database_url).context("Failed to connect to database")?;
        Ok(Self::new(Arc::new(Mutex::new(conn)), events))
    }

    pub fn new(conn: Arc<Mutex<PgConnection>>, events: EventBus) -> Self {
        Self {
            tickets: TicketDb::new(conn.clone(), events.clone()),
            users: UserDb::new(conn.clone()),
            knowledge: KnowledgeDb::new(conn.clone(), events),
            classes: ClassDb::new(conn.clone()),
            workouts: WorkoutDb::new(conn),
        }
    }

    pub fn tickets(&self) -> &TicketDb {
        &self.tickets
    }

    pub fn users(&self) -> &UserDb {
        &self.users
    }

    pub fn knowledge(&self) -> &KnowledgeDb {
        &self.knowledge
    }

    pub fn classes(&self) -> &ClassDb {
        &self.classes
    }

    pub fn workouts(&self) -> &WorkoutDb {
        &self.workouts
    }
}

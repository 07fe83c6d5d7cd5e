//! Member and staff directory

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::schema::users;

/// Injury-prevention recommendations kept per member
pub const MAX_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Agent | Role::Admin)
    }

    /// Where a signed-in user of this role lands
    pub fn portal_path(&self) -> &'static str {
        match self {
            Role::Member => "/member",
            Role::Agent | Role::Admin => "/admin/dashboard",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "member" => Ok(Role::Member),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation: String,
    pub created_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub injury_prevention_recommendations: Vec<Recommendation>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUserRow<'a> {
    id: Uuid,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    role: &'a str,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = users)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    phone: Option<String>,
    last_sign_in_at: Option<DateTime<Utc>>,
    injury_prevention_recommendations: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let recommendations = parse_recommendations(row.injury_prevention_recommendations)?;

        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role: Role::from_str(&row.role)?,
            phone: row.phone,
            last_sign_in_at: row.last_sign_in_at,
            injury_prevention_recommendations: recommendations,
            created_at: row.created_at,
        })
    }
}

fn parse_recommendations(value: serde_json::Value) -> Result<Vec<Recommendation>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).context("Failed to parse injury prevention recommendations")
}

/// Append a recommendation, keeping only the most recent `MAX_RECOMMENDATIONS`
/// (oldest first).
pub fn push_recommendation(
    mut list: Vec<Recommendation>,
    recommendation: Recommendation,
) -> Vec<Recommendation> {
    list.push(recommendation);
    if list.len() > MAX_RECOMMENDATIONS {
        let excess = list.len() - MAX_RECOMMENDATIONS;
        list.drain(..excess);
    }
    list
}

pub struct UserDb {
    conn: Arc<Mutex<PgConnection>>,
}

impl UserDb {
    pub fn new(conn: Arc<Mutex<PgConnection>>) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: Uuid) -> Result<Option<User>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let row = users::table
            .find(id)
            .select(UserRow::as_select())
            .first(&mut *conn)
            .optional()?;

        row.map(User::try_from).transpose()
    }

    pub fn insert(&self, user: &NewUser) -> Result<User> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let row = diesel::insert_into(users::table)
            .values(&NewUserRow {
                id: user.id,
                email: &user.email,
                first_name: &user.first_name,
                last_name: &user.last_name,
                role: user.role.as_str(),
            })
            .returning(UserRow::as_returning())
            .get_result(&mut *conn)
            .context("Failed to insert user")?;

        User::try_from(row)
    }

    /// Insert the profile unless one already exists. Returns whether a row
    /// was created.
    pub fn ensure_profile(&self, user: &NewUser) -> Result<bool> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let inserted = diesel::insert_into(users::table)
            .values(&NewUserRow {
                id: user.id,
                email: &user.email,
                first_name: &user.first_name,
                last_name: &user.last_name,
                role: user.role.as_str(),
            })
            .on_conflict_do_nothing()
            .execute(&mut *conn)
            .context("Failed to create user profile")?;

        Ok(inserted > 0)
    }

    /// Agents and admins, newest first
    pub fn list_staff(&self) -> Result<Vec<User>> {
        self.list_by_roles(&[Role::Agent.as_str(), Role::Admin.as_str()])
    }

    pub fn list_members(&self) -> Result<Vec<User>> {
        self.list_by_roles(&[Role::Member.as_str()])
    }

    fn list_by_roles(&self, roles: &[&str]) -> Result<Vec<User>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let rows = users::table
            .filter(users::role.eq_any(roles.to_vec()))
            .order(users::created_at.desc())
            .select(UserRow::as_select())
            .load(&mut *conn)?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub fn touch_last_sign_in(&self, id: Uuid) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        diesel::update(users::table.find(id))
            .set(users::last_sign_in_at.eq(Some(Utc::now())))
            .execute(&mut *conn)?;

        Ok(())
    }

    /// Record a recommendation, keeping the most recent three
    pub fn record_recommendation(
        &self,
        id: Uuid,
        text: &str,
        source: &str,
    ) -> Result<Vec<Recommendation>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let current: serde_json::Value = users::table
                .find(id)
                .select(users::injury_prevention_recommendations)
                .for_update()
                .first(conn)
                .context("User not found")?;

            let list = push_recommendation(
                parse_recommendations(current)?,
                Recommendation {
                    recommendation: text.to_string(),
                    created_at: Utc::now(),
                    source: source.to_string(),
                },
            );

            diesel::update(users::table.find(id))
                .set(users::injury_prevention_recommendations.eq(serde_json::to_value(&list)?))
                .execute(conn)?;

            Ok(list)
        })
    }
}

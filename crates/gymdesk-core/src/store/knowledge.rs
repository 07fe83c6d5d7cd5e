//! Knowledge base entries and vector search
//!
//! Entries are written without an embedding; the `embed-knowledge` batch job
//! fills `embedding` from `embedding_text`. Similarity search goes through
//! the `match_entries` SQL function.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{Array, Double, Integer, Text, Uuid as DieselUuid};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::events::{ChangeKind, EventBus};
use crate::schema::knowledge_base;

pub const TABLE: &str = "knowledge_base";

/// Knowledge base entry (embedding vector left out)
#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = knowledge_base)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub embedding_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    /// Comma-separated, as typed into the entry form
    #[serde(default)]
    pub tags: String,
}

impl NewEntry {
    pub fn tag_list(&self) -> Vec<String> {
        parse_tags(&self.tags)
    }

    pub fn embedding_text(&self) -> String {
        embedding_text(&self.title, &self.content, &self.tags)
    }
}

/// A `match_entries` hit
#[derive(QueryableByName, Debug, Clone, Serialize)]
pub struct EntryMatch {
    #[diesel(sql_type = DieselUuid)]
    pub id: Uuid,
    #[diesel(sql_type = Text)]
    pub title: String,
    #[diesel(sql_type = Text)]
    pub content: String,
    #[diesel(sql_type = Array<Text>)]
    pub tags: Vec<String>,
    #[diesel(sql_type = Double)]
    pub similarity: f64,
}

/// Row awaiting an embedding
#[derive(Queryable, Debug, Clone)]
pub struct PendingEmbedding {
    pub id: Uuid,
    pub embedding_text: String,
}

#[derive(Insertable)]
#[diesel(table_name = knowledge_base)]
struct NewEntryRow<'a> {
    id: Uuid,
    title: &'a str,
    content: &'a str,
    tags: Vec<String>,
    embedding_text: String,
}

/// Split a comma-separated tag string, dropping blanks
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn embedding_text(title: &str, content: &str, tags: &str) -> String {
    format!("Title: {}\nContent: {}\nTags: {}", title, content, tags)
}

pub struct KnowledgeDb {
    conn: Arc<Mutex<PgConnection>>,
    events: EventBus,
}

impl KnowledgeDb {
    pub fn new(conn: Arc<Mutex<PgConnection>>, events: EventBus) -> Self {
        Self { conn, events }
    }

    /// Newest first
    pub fn list(&self) -> Result<Vec<KnowledgeEntry>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let entries = knowledge_base::table
            .order(knowledge_base::created_at.desc())
            .select(KnowledgeEntry::as_select())
            .load(&mut *conn)?;

        Ok(entries)
    }

    pub fn create(&self, entry: &NewEntry) -> Result<KnowledgeEntry> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let created = diesel::insert_into(knowledge_base::table)
            .values(&NewEntryRow {
                id: Uuid::new_v4(),
                title: &entry.title,
                content: &entry.content,
                tags: entry.tag_list(),
                embedding_text: entry.embedding_text(),
            })
            .returning(KnowledgeEntry::as_returning())
            .get_result(&mut *conn)
            .context("Failed to insert knowledge base entry")?;

        self.events.publish(TABLE, ChangeKind::Insert, created.id);
        Ok(created)
    }

    /// Replace the content. The embedding is cleared so the batch job picks
    /// the entry up again.
    pub fn update_content(&self, id: Uuid, content: &str) -> Result<Option<KnowledgeEntry>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let updated = conn.transaction::<_, anyhow::Error, _>(|conn| {
            let existing: Option<KnowledgeEntry> = knowledge_base::table
                .find(id)
                .select(KnowledgeEntry::as_select())
                .for_update()
                .first(conn)
                .optional()?;

            let Some(existing) = existing else {
                return Ok(None);
            };

            let text = embedding_text(&existing.title, content, &existing.tags.join(", "));
            let updated = diesel::update(knowledge_base::table.find(id))
                .set((
                    knowledge_base::content.eq(content),
                    knowledge_base::embedding_text.eq(text),
                    knowledge_base::embedding.eq(None::<Vector>),
                    knowledge_base::updated_at.eq(Utc::now()),
                ))
                .returning(KnowledgeEntry::as_returning())
                .get_result(conn)?;
            Ok(Some(updated))
        })?;

        if let Some(entry) = &updated {
            self.events.publish(TABLE, ChangeKind::Update, entry.id);
        }
        Ok(updated)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let deleted = diesel::delete(knowledge_base::table.find(id)).execute(&mut *conn)?;
        if deleted > 0 {
            self.events.publish(TABLE, ChangeKind::Delete, id);
        }
        Ok(deleted > 0)
    }

    /// Entries with no embedding yet
    pub fn missing_embeddings(&self) -> Result<Vec<PendingEmbedding>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let pending = knowledge_base::table
            .filter(knowledge_base::embedding.is_null())
            .select((knowledge_base::id, knowledge_base::embedding_text))
            .load::<PendingEmbedding>(&mut *conn)?;

        Ok(pending)
    }

    pub fn set_embedding(&self, id: Uuid, embedding: Vec<f32>) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        diesel::update(knowledge_base::table.find(id))
            .set((
                knowledge_base::embedding.eq(Some(Vector::from(embedding))),
                knowledge_base::updated_at.eq(Utc::now()),
            ))
            .execute(&mut *conn)
            .context("Failed to store embedding")?;

        Ok(())
    }

    /// Cosine similarity search via the `match_entries` SQL function
    pub fn match_entries(
        &self,
        query_embedding: Vec<f32>,
        similarity_threshold: f64,
        match_count: i32,
    ) -> Result<Vec<EntryMatch>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let matches = diesel::sql_query(
            "SELECT id, title, content, tags, similarity FROM match_entries($1, $2, $3)",
        )
        .bind::<pgvector::sql_types::Vector, _>(Vector::from(query_embedding))
        .bind::<Double, _>(similarity_threshold)
        .bind::<Integer, _>(match_count)
        .load::<EntryMatch>(&mut *conn)
        .context("match_entries failed")?;

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags_drops_blanks() {
        assert_eq!(
            parse_tags(" hours, , parking ,pool"),
            vec!["hours", "parking", "pool"]
        );
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_embedding_text_layout() {
        let entry = NewEntry {
            title: "Opening hours".into(),
            content: "6am to 10pm".into(),
            tags: "hours, schedule".into(),
        };
        assert_eq!(
            entry.embedding_text(),
            "Title: Opening hours\nContent: 6am to 10pm\nTags: hours, schedule"
        );
        assert_eq!(entry.tag_list(), vec!["hours", "schedule"]);
    }
}

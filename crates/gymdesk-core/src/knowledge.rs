//! Knowledge base retrieval for prompts

use std::sync::Arc;
use tracing::{debug, error};

use crate::embedding::EmbeddingService;
use crate::store::knowledge::EntryMatch;
use crate::store::GymDb;

#[derive(Clone)]
pub struct KnowledgeSearch {
    db: Arc<GymDb>,
    embeddings: EmbeddingService,
    threshold: f64,
    match_count: i32,
}

impl KnowledgeSearch {
    pub fn new(db: Arc<GymDb>, embeddings: EmbeddingService, threshold: f64, match_count: i32) -> Self {
        Self {
            db,
            embeddings,
            threshold,
            match_count,
        }
    }

    /// Entries similar to `query`. Failures are logged and yield no entries.
    pub async fn find_relevant(&self, query: &str) -> Vec<EntryMatch> {
        let embedding = match self.embeddings.embed(query).await {
            Ok(e) => e,
            Err(e) => {
                error!("Error finding relevant knowledge base entries: {}", e);
                return Vec::new();
            }
        };

        match self
            .db
            .knowledge()
            .match_entries(embedding, self.threshold, self.match_count)
        {
            Ok(matches) => {
                debug!(
                    "Knowledge base matches for '{}': {:?}",
                    query,
                    matches
                        .iter()
                        .map(|m| (m.title.as_str(), m.similarity))
                        .collect::<Vec<_>>()
                );
                matches
            }
            Err(e) => {
                error!("Error finding relevant knowledge base entries: {}", e);
                Vec::new()
            }
        }
    }
}

/// Prompt block listing matched entries, empty when nothing matched
pub fn format_context(entries: &[EntryMatch]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let body = entries
        .iter()
        .map(|e| format!("{}:\n{}", e.title, e.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("\nRelevant gym policies and information:\n{}", body)
}

/// `Sources:` footer naming the entries a reply drew on
pub fn format_citations(entries: &[EntryMatch]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let list = entries
        .iter()
        .map(|e| format!("• {}", e.title))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\n---\nSources:\n{}", list)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use uuid::Uuid;

    pub fn entry(title: &str, content: &str) -> EntryMatch {
        EntryMatch {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            tags: Vec::new(),
            similarity: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::entry;
    use super::*;

    #[test]
    fn test_empty_context_and_citations() {
        assert_eq!(format_context(&[]), "");
        assert_eq!(format_citations(&[]), "");
    }

    #[test]
    fn test_context_lists_entries() {
        let entries = vec![
            entry("Guest Policy", "Guests pay $10."),
            entry("Hours", "Open 5am-11pm."),
        ];
        assert_eq!(
            format_context(&entries),
            "\nRelevant gym policies and information:\nGuest Policy:\nGuests pay $10.\n\nHours:\nOpen 5am-11pm."
        );
    }

    #[test]
    fn test_citations_footer() {
        let entries = vec![entry("Guest Policy", "x"), entry("Hours", "y")];
        assert_eq!(
            format_citations(&entries),
            "\n\n---\nSources:\n• Guest Policy\n• Hours"
        );
    }
}

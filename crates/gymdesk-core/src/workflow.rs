//! Ticket workflow: agent replies, member submissions, AI-drafted responses

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::knowledge::{format_citations, format_context, KnowledgeSearch};
use crate::llm::{ChatClient, ChatMessage};
use crate::notifications::{NotificationKind, NotificationService, TicketNotification};
use crate::store::tickets::{
    HistoryEntry, NewTicket, Priority, Ticket, TicketMember, TicketStatus, TicketWithMember,
};
use crate::store::GymDb;

pub const FALLBACK_SUBJECT: &str = "Support Request";

const SUBJECT_INSTRUCTION: &str = "You are a helpful assistant that generates concise subject lines. Create a brief (2-5 words) subject line that captures the main topic of the message. Return only the subject line text, nothing else.";

const QUICK_ANSWER_INSTRUCTION: &str = "You are a helpful gym assistant. Provide clear, concise answers about gym membership, classes, facilities, and fitness advice. Keep responses friendly and professional.";

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Ticket not found")]
    TicketNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Delivery result of the email that accompanies a reply or submission
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationOutcome {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyOutcome {
    pub ticket: Ticket,
    pub notification: NotificationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub ticket: Ticket,
    /// Present in AI mode when the model answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaffTicketForm {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    /// Member the ticket is for; the creating agent when absent
    #[serde(default)]
    pub member_id: Option<Uuid>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftResponse {
    /// Draft text with the `Sources:` footer when entries were used
    pub response: String,
    pub sources: Vec<String>,
}

/// Trimmed text, or `EmptyMessage` when nothing is left
pub fn require_text(text: &str) -> Result<&str, WorkflowError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(WorkflowError::EmptyMessage)
    } else {
        Ok(trimmed)
    }
}

fn member_name(member: &TicketMember) -> String {
    let name = format!("{} {}", member.first_name, member.last_name);
    let name = name.trim();
    if name.is_empty() {
        "Customer".to_string()
    } else {
        name.to_string()
    }
}

fn agent_name(agent: &AuthUser) -> String {
    let name = format!("{} {}", agent.first_name, agent.last_name);
    let name = name.trim();
    if name.is_empty() {
        "Support Agent".to_string()
    } else {
        name.to_string()
    }
}

/// Email payload for an agent reply
pub fn reply_notification(ticket: &TicketWithMember, reply_text: &str, bcc: Vec<String>) -> TicketNotification {
    TicketNotification {
        title: ticket.ticket.title.clone(),
        description: ticket.ticket.description.clone(),
        priority: ticket.ticket.priority.to_string(),
        status: ticket.ticket.status.to_string(),
        created_by: Some(ticket.ticket.created_by.to_string()),
        member_email: ticket.member.email.clone(),
        kind: NotificationKind::Reply,
        reply_text: Some(reply_text.to_string()),
        bcc,
    }
}

/// Prompt asking the model to draft a reply as the given agent
pub fn draft_prompt(
    title: &str,
    description: &str,
    member_name: &str,
    agent_name: &str,
    agent_position: &str,
    knowledge_context: &str,
) -> String {
    format!(
        r#"Please write a professional and helpful response to this support ticket. Write the response as if you are directly replying to the customer's email - do not include any subject line or email headers, just the message body. If you use information from the provided gym policies, make sure to reference it naturally in your response:

Title: {title}
Customer Name: {member_name}
Customer Request: {description}
Agent Name: {agent_name}
Agent Position: {agent_position}{knowledge_context}

Write a response that is:
1. Professional and courteous
2. Directly addresses the customer's request
3. Clear and concise
4. Helpful and solution-oriented
5. Start with "Hi {member_name}" if a name is provided (use the first name if possible), otherwise use an appropriate greeting
6. End with a professional signature using the agent's name and position
7. Incorporate relevant gym policies and information from the knowledge base when applicable

Best regards,
[Agent Name - use first name if possible]
GymDesk Team"#
    )
}

/// Short subject for a member message; never fails
pub async fn generate_subject_line(llm: &ChatClient, message: &str) -> String {
    let messages = [ChatMessage::system(SUBJECT_INSTRUCTION), ChatMessage::user(message)];
    match llm.complete(&messages, Some(0.7)).await {
        Ok(subject) if !subject.is_empty() => subject.trim_matches('"').to_string(),
        Ok(_) => FALLBACK_SUBJECT.to_string(),
        Err(e) => {
            error!("Error generating subject line: {}", e);
            FALLBACK_SUBJECT.to_string()
        }
    }
}

/// One-shot answer for AI-mode submissions
pub async fn quick_answer(llm: &ChatClient, question: &str) -> Result<String> {
    let messages = [
        ChatMessage::system(QUICK_ANSWER_INSTRUCTION),
        ChatMessage::user(question),
    ];
    llm.complete(&messages, Some(0.7)).await
}

#[derive(Clone)]
pub struct TicketWorkflow {
    db: Arc<GymDb>,
    llm: ChatClient,
    notifications: NotificationService,
    knowledge: KnowledgeSearch,
}

impl TicketWorkflow {
    pub fn new(
        db: Arc<GymDb>,
        llm: ChatClient,
        notifications: NotificationService,
        knowledge: KnowledgeSearch,
    ) -> Self {
        Self {
            db,
            llm,
            notifications,
            knowledge,
        }
    }

    /// Append an agent reply to the history, then email it to the member.
    /// The history entry stays even if the email fails.
    pub async fn reply(
        &self,
        ticket_id: Uuid,
        agent: &AuthUser,
        text: &str,
        bcc: Vec<String>,
    ) -> Result<ReplyOutcome, WorkflowError> {
        let text = require_text(text)?;
        let current = self
            .db
            .tickets()
            .get_with_member(ticket_id)?
            .ok_or(WorkflowError::TicketNotFound)?;

        let ticket = self
            .db
            .tickets()
            .append_history(ticket_id, HistoryEntry::agent_reply(text, Utc::now()))?
            .ok_or(WorkflowError::TicketNotFound)?;
        info!("💬 {} replied to ticket {}", agent.email, ticket_id);

        let payload = reply_notification(&current, text, bcc);
        let notification = match self.notifications.send(&payload).await {
            Ok(_) => NotificationOutcome {
                sent: true,
                error: None,
            },
            Err(e) => {
                warn!("Reply saved but email failed for ticket {}: {}", ticket_id, e);
                NotificationOutcome {
                    sent: false,
                    error: Some(e.to_string()),
                }
            }
        };

        Ok(ReplyOutcome {
            ticket,
            notification,
        })
    }

    /// A member's question: stored as a ticket, then either emailed to
    /// staff or answered right away in AI mode
    pub async fn submit_member_request(
        &self,
        member: &AuthUser,
        message: &str,
        ai_mode: bool,
    ) -> Result<SubmissionOutcome, WorkflowError> {
        let message = require_text(message)?;
        let title = generate_subject_line(&self.llm, message).await;
        debug!("Generated subject line: {}", title);

        let ticket = self.db.tickets().create(NewTicket {
            title,
            description: message.to_string(),
            priority: Priority::Medium,
            status: if ai_mode { TicketStatus::Ai } else { TicketStatus::Open },
            created_by: member.id,
            assigned_to: None,
        })?;
        info!("🎫 Ticket {} created by {} (ai_mode={})", ticket.id, member.email, ai_mode);

        if ai_mode {
            let answer = match quick_answer(&self.llm, message).await {
                Ok(a) => Some(a),
                Err(e) => {
                    error!("Error getting AI response for ticket {}: {}", ticket.id, e);
                    None
                }
            };
            return Ok(SubmissionOutcome {
                ticket,
                answer,
                notification: None,
            });
        }

        let payload = TicketNotification {
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            priority: ticket.priority.to_string(),
            status: ticket.status.to_string(),
            created_by: Some(member.id.to_string()),
            member_email: member.email.clone(),
            kind: NotificationKind::Notification,
            reply_text: None,
            bcc: Vec::new(),
        };
        let notification = match self.notifications.send(&payload).await {
            Ok(_) => NotificationOutcome {
                sent: true,
                error: None,
            },
            Err(e) => {
                error!("Email error for ticket {}: {}", ticket.id, e);
                NotificationOutcome {
                    sent: false,
                    error: Some(e.to_string()),
                }
            }
        };

        Ok(SubmissionOutcome {
            ticket,
            answer: None,
            notification: Some(notification),
        })
    }

    pub fn staff_create(&self, agent: &AuthUser, form: StaffTicketForm) -> Result<Ticket, WorkflowError> {
        let title = require_text(&form.title)?.to_string();
        let description = require_text(&form.description)?.to_string();

        let ticket = self.db.tickets().create(NewTicket {
            title,
            description,
            priority: form.priority,
            status: TicketStatus::Open,
            created_by: form.member_id.unwrap_or(agent.id),
            assigned_to: form.assigned_to,
        })?;
        info!("🎫 Ticket {} created by staff {}", ticket.id, agent.email);
        Ok(ticket)
    }

    /// Draft a reply for the agent to review, grounded in the knowledge base
    pub async fn draft_response(&self, ticket_id: Uuid, agent: &AuthUser) -> Result<DraftResponse, WorkflowError> {
        let current = self
            .db
            .tickets()
            .get_with_member(ticket_id)?
            .ok_or(WorkflowError::TicketNotFound)?;
        let ticket = &current.ticket;
        info!("🤖 Generating AI response for ticket {}", ticket_id);

        let entries = self
            .knowledge
            .find_relevant(&format!("{} {}", ticket.title, ticket.description))
            .await;

        let prompt = draft_prompt(
            &ticket.title,
            &ticket.description,
            &member_name(&current.member),
            &agent_name(agent),
            agent.role.as_str(),
            &format_context(&entries),
        );

        let response = self
            .llm
            .complete(&[ChatMessage::user(prompt)], None)
            .await
            .map_err(|e| {
                error!("Error generating AI response: {}", e);
                WorkflowError::Internal(e)
            })?;

        Ok(DraftResponse {
            response: format!("{}{}", response, format_citations(&entries)),
            sources: entries.into_iter().map(|e| e.title).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{mock_completion, mock_failure};
    use crate::store::users::Role;
    use wiremock::MockServer;

    fn ticket_with_member() -> TicketWithMember {
        let now = Utc::now();
        TicketWithMember {
            ticket: Ticket {
                id: Uuid::new_v4(),
                title: "Locker broken".into(),
                description: "Locker 12 won't close".into(),
                priority: Priority::High,
                status: TicketStatus::InProgress,
                created_by: Uuid::new_v4(),
                assigned_to: None,
                history: Vec::new(),
                created_at: now,
                updated_at: now,
            },
            member: TicketMember {
                id: Uuid::new_v4(),
                email: "sam@example.com".into(),
                first_name: "Sam".into(),
                last_name: String::new(),
            },
        }
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("  hi  ").unwrap(), "hi");
        assert!(matches!(require_text(" \n "), Err(WorkflowError::EmptyMessage)));
    }

    #[test]
    fn test_reply_notification_payload() {
        let ticket = ticket_with_member();
        let payload = reply_notification(&ticket, "Fixed it", vec!["lead@example.com".into()]);
        assert_eq!(payload.kind, NotificationKind::Reply);
        assert_eq!(payload.member_email, "sam@example.com");
        assert_eq!(payload.priority, "high");
        assert_eq!(payload.status, "in_progress");
        assert_eq!(payload.bcc, vec!["lead@example.com".to_string()]);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_names_fall_back() {
        let mut member = ticket_with_member().member;
        assert_eq!(member_name(&member), "Sam");
        member.first_name.clear();
        assert_eq!(member_name(&member), "Customer");

        let agent = AuthUser {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            role: Role::Agent,
            first_name: String::new(),
            last_name: String::new(),
        };
        assert_eq!(agent_name(&agent), "Support Agent");
    }

    #[test]
    fn test_draft_prompt_fields() {
        let prompt = draft_prompt(
            "Guest pass",
            "Can I bring a friend?",
            "Sam Lee",
            "Jo Park",
            "agent",
            "\nRelevant gym policies and information:\nGuest Policy:\nGuests pay $10.",
        );
        assert!(prompt.contains("Customer Name: Sam Lee"));
        assert!(prompt.contains("Agent Position: agent\nRelevant gym policies"));
        assert!(prompt.contains("Start with \"Hi Sam Lee\""));
        assert!(prompt.ends_with("GymDesk Team"));
    }

    #[tokio::test]
    async fn test_subject_line_from_model() {
        let server = MockServer::start().await;
        mock_completion(&server, "\"Locker Key Lost\"").await;
        let llm = ChatClient::new(&server.uri(), "k", "gpt-4").unwrap();
        assert_eq!(
            generate_subject_line(&llm, "I lost my locker key").await,
            "Locker Key Lost"
        );
    }

    #[tokio::test]
    async fn test_subject_line_fallback() {
        let server = MockServer::start().await;
        mock_failure(&server, 500).await;
        let llm = ChatClient::new(&server.uri(), "k", "gpt-4").unwrap();
        assert_eq!(generate_subject_line(&llm, "help").await, FALLBACK_SUBJECT);
    }

    #[tokio::test]
    async fn test_quick_answer_propagates_failure() {
        let server = MockServer::start().await;
        mock_failure(&server, 502).await;
        let llm = ChatClient::new(&server.uri(), "k", "gpt-4").unwrap();
        assert!(quick_answer(&llm, "When do you open?").await.is_err());
    }
}

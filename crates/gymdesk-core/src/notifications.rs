//! Ticket email notifications
//!
//! Two templates: `notification` announces a new ticket, `reply` carries an
//! agent's answer back to the member. In testing mode every message goes to
//! the override address instead of the member.

use gymdesk_tools::{EmailClient, EmailError, OutgoingEmail, SentEmail};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Notification,
    Reply,
}

/// Request body of `send-ticket-notification`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketNotification {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub member_email: String,
    #[serde(default, rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub reply_text: Option<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("reply_text is required for reply type tickets")]
    MissingReplyText,
    #[error("Missing RESEND_API_KEY")]
    Disabled,
    #[error("Failed to send email: {0}")]
    Email(#[from] EmailError),
}

impl TicketNotification {
    pub fn validate(&self) -> Result<(), NotificationError> {
        let required = [
            ("title", &self.title),
            ("description", &self.description),
            ("priority", &self.priority),
            ("status", &self.status),
            ("member_email", &self.member_email),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(NotificationError::MissingFields(missing));
        }

        if self.kind == NotificationKind::Reply
            && self.reply_text.as_deref().map_or(true, |t| t.trim().is_empty())
        {
            return Err(NotificationError::MissingReplyText);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Subject and body for a validated notification
pub fn render(ticket: &TicketNotification) -> EmailContent {
    let title = html_escape(&ticket.title);
    let description = html_escape(&ticket.description);
    let priority = html_escape(&ticket.priority);

    match ticket.kind {
        NotificationKind::Reply => {
            let reply = html_escape(ticket.reply_text.as_deref().unwrap_or_default());
            EmailContent {
                subject: format!("Re: {}", ticket.title),
                html: format!(
                    r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #333;">Response to Your Support Ticket</h2>
  <div style="background-color: #f9f9f9; padding: 20px; border-radius: 5px; margin: 20px 0;">
    <p style="margin: 0; color: #555;">{reply}</p>
  </div>
  <div style="border-top: 1px solid #eee; margin-top: 20px; padding-top: 20px;">
    <p style="color: #666; font-size: 14px;"><strong>Original Request:</strong></p>
    <p style="color: #666; font-size: 14px;">{description}</p>
  </div>
  <div style="margin-top: 20px; font-size: 12px; color: #999;">
    <p>Ticket #{title} &bull; Priority: {priority}</p>
  </div>
</div>"#
                ),
            }
        }
        NotificationKind::Notification => {
            let status = html_escape(&ticket.status);
            let member_email = html_escape(&ticket.member_email);
            EmailContent {
                subject: format!("New Support Ticket: {}", ticket.title),
                html: format!(
                    r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #333;">New Support Ticket</h2>
  <div style="background-color: #f9f9f9; padding: 20px; border-radius: 5px;">
    <p><strong>Title:</strong> {title}</p>
    <p><strong>Priority:</strong> {priority}</p>
    <p><strong>Status:</strong> {status}</p>
    <p><strong>Member Email:</strong> {member_email}</p>
    <p><strong>Description:</strong></p>
    <p>{description}</p>
  </div>
</div>"#
                ),
            }
        }
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Clone)]
pub struct NotificationService {
    client: Option<EmailClient>,
    from: String,
    override_recipient: Option<String>,
}

impl NotificationService {
    pub fn new(client: Option<EmailClient>, from: String, override_recipient: Option<String>) -> Self {
        Self {
            client,
            from,
            override_recipient,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = config
            .resend_api_key
            .clone()
            .map(EmailClient::new)
            .transpose()?;
        Ok(Self::new(
            client,
            config.email_from.clone(),
            config.email_override_recipient.clone(),
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Validate and render; the recipient honours testing mode
    pub fn build_email(&self, ticket: &TicketNotification) -> Result<OutgoingEmail, NotificationError> {
        ticket.validate()?;
        let content = render(ticket);

        let (to, html) = match &self.override_recipient {
            Some(override_to) => {
                let html = if ticket.kind == NotificationKind::Reply {
                    format!(
                        r#"{}
<div style="margin-top: 20px; padding-top: 20px; border-top: 1px solid #eee;">
  <p style="color: #666; font-size: 12px;">[Testing Mode] This email would normally be sent to: {}</p>
</div>"#,
                        content.html,
                        html_escape(&ticket.member_email)
                    )
                } else {
                    content.html
                };
                (override_to.clone(), html)
            }
            None => (ticket.member_email.clone(), content.html),
        };

        Ok(OutgoingEmail {
            from: self.from.clone(),
            to,
            bcc: ticket.bcc.clone(),
            subject: content.subject,
            html,
        })
    }

    pub async fn send(&self, ticket: &TicketNotification) -> Result<SentEmail, NotificationError> {
        let email = self.build_email(ticket)?;
        let Some(client) = &self.client else {
            error!("RESEND_API_KEY not set, cannot send '{}'", email.subject);
            return Err(NotificationError::Disabled);
        };

        match client.send(&email).await {
            Ok(sent) => {
                info!(
                    "📧 Sent {:?} email '{}' (id {}, actual recipient {})",
                    ticket.kind, email.subject, sent.id, ticket.member_email
                );
                Ok(sent)
            }
            Err(e) => {
                error!("Failed to send '{}': {}", email.subject, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply() -> TicketNotification {
        TicketNotification {
            title: "Locker broken".into(),
            description: "Locker 12 won't close".into(),
            priority: "medium".into(),
            status: "open".into(),
            created_by: None,
            member_email: "member@example.com".into(),
            kind: NotificationKind::Reply,
            reply_text: Some("We fixed it <today>".into()),
            bcc: vec!["agent@example.com".into()],
        }
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let err = TicketNotification::default().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required fields: title, description, priority, status, member_email"
        );
    }

    #[test]
    fn test_reply_requires_text() {
        let mut ticket = reply();
        ticket.reply_text = Some("   ".into());
        assert!(matches!(
            ticket.validate(),
            Err(NotificationError::MissingReplyText)
        ));
    }

    #[test]
    fn test_type_field_deserializes() {
        let ticket: TicketNotification = serde_json::from_value(serde_json::json!({
            "title": "t", "description": "d", "priority": "high", "status": "open",
            "member_email": "m@example.com", "type": "reply", "reply_text": "r"
        }))
        .unwrap();
        assert_eq!(ticket.kind, NotificationKind::Reply);
        assert!(ticket.bcc.is_empty());
    }

    #[test]
    fn test_reply_content_is_escaped() {
        let content = render(&reply());
        assert_eq!(content.subject, "Re: Locker broken");
        assert!(content.html.contains("We fixed it &lt;today&gt;"));
        assert!(content.html.contains("Locker 12 won&#39;t close"));
        assert!(content.html.contains("Priority: medium"));
    }

    #[test]
    fn test_notification_content() {
        let mut ticket = reply();
        ticket.kind = NotificationKind::Notification;
        let content = render(&ticket);
        assert_eq!(content.subject, "New Support Ticket: Locker broken");
        assert!(content.html.contains("<strong>Member Email:</strong> member@example.com"));
    }

    #[test]
    fn test_testing_mode_redirects_and_notes_recipient() {
        let service = NotificationService::new(
            None,
            "desk@example.com".into(),
            Some("qa@example.com".into()),
        );
        let email = service.build_email(&reply()).unwrap();
        assert_eq!(email.to, "qa@example.com");
        assert_eq!(email.bcc, vec!["agent@example.com".to_string()]);
        assert!(email
            .html
            .contains("[Testing Mode] This email would normally be sent to: member@example.com"));
    }

    #[test]
    fn test_direct_delivery_without_override() {
        let service = NotificationService::new(None, "desk@example.com".into(), None);
        let email = service.build_email(&reply()).unwrap();
        assert_eq!(email.to, "member@example.com");
        assert!(!email.html.contains("Testing Mode"));
    }

    #[tokio::test]
    async fn test_send_disabled_without_key() {
        let service = NotificationService::new(None, "desk@example.com".into(), None);
        assert!(matches!(
            service.send(&reply()).await,
            Err(NotificationError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_send_through_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(body_partial_json(serde_json::json!({
                "subject": "Re: Locker broken",
                "to": "member@example.com"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "em_9"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = EmailClient::with_base_url("re_test".into(), server.uri()).unwrap();
        let service = NotificationService::new(Some(client), "desk@example.com".into(), None);
        let sent = service.send(&reply()).await.unwrap();
        assert_eq!(sent.id, "em_9");
    }
}

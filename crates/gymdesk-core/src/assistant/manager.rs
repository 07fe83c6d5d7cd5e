//! Assistant Manager - one assistant session per member
//!
//! Each member gets an isolated `GymAssistant` with its own short-term
//! memory and tools bound to that member. Sessions live in memory only and
//! are dropped after `SESSION_IDLE_TIMEOUT` without use.

use anyhow::Result;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use super::agent::{AssistantEvent, AssistantReply, GymAssistant, ToolRegistry};
use super::tools::{
    ClassBookingTool, DoneTool, KnowledgeSearchTool, LogWorkoutTool, MuscleBalanceTool,
    RigToolAdapter, WorkoutHistoryTool,
};
use crate::auth::AuthUser;
use crate::knowledge::{format_context, KnowledgeSearch};
use crate::store::GymDb;
use crate::workouts::WorkoutService;

pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

struct Session {
    assistant: Arc<Mutex<GymAssistant>>,
    last_used: Instant,
}

/// Drop sessions idle past the timeout, unless a request still holds one
fn evict_idle(sessions: &mut HashMap<Uuid, Session>, now: Instant) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| {
        now.saturating_duration_since(s.last_used) < SESSION_IDLE_TIMEOUT
            || Arc::strong_count(&s.assistant) > 1
    });
    before - sessions.len()
}

/// Who the assistant is talking to
pub fn member_context(member: &AuthUser) -> String {
    format!(
        "Member Context:\n- Name: {} {}\n- Membership Status: Member\n- Email: {}",
        member.first_name, member.last_name, member.email
    )
}

pub struct AssistantManager {
    db: Arc<GymDb>,
    knowledge: KnowledgeSearch,
    workouts: WorkoutService,
    timezone: Tz,
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl AssistantManager {
    pub fn new(db: Arc<GymDb>, knowledge: KnowledgeSearch, workouts: WorkoutService, timezone: Tz) -> Self {
        Self {
            db,
            knowledge,
            workouts,
            timezone,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn build_tools(&self, member_id: Uuid) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(KnowledgeSearchTool::new(self.knowledge.clone())));
        tools.register(Arc::new(MuscleBalanceTool::new(
            self.db.clone(),
            self.workouts.clone(),
            member_id,
        )));
        tools.register(Arc::new(ClassBookingTool::new(
            self.db.clone(),
            member_id,
            self.timezone,
        )));
        tools.register(Arc::new(LogWorkoutTool::new(self.workouts.clone(), member_id)));
        tools.register(Arc::new(WorkoutHistoryTool::new(self.workouts.clone(), member_id)));
        tools.register(Arc::new(RigToolAdapter::new(
            gymdesk_tools::CurrentDateTime::new(self.timezone),
            "Get the current date, time, or both in the gym's timezone. Use for 'today', 'tomorrow' or day-of-week questions.",
            r#"{"format": "date|time|both|day"}"#,
        )));
        tools.register(Arc::new(DoneTool));
        tools
    }

    /// Get or create the member's session
    pub async fn session(&self, member: &AuthUser) -> Arc<Mutex<GymAssistant>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;

        let evicted = evict_idle(&mut sessions, now);
        if evicted > 0 {
            debug!("Evicted {} idle assistant session(s)", evicted);
        }

        let active = sessions.len();
        let session = sessions.entry(member.id).or_insert_with(|| {
            info!("🧠 New assistant session for {} ({} active)", member.email, active + 1);
            Session {
                assistant: Arc::new(Mutex::new(GymAssistant::new(
                    self.build_tools(member.id),
                    member_context(member),
                ))),
                last_used: now,
            }
        });
        session.last_used = now;
        session.assistant.clone()
    }

    /// Run one message through the member's assistant. Requests for the
    /// same member queue on the session lock.
    pub async fn chat(
        &self,
        member: &AuthUser,
        message: &str,
        events: Option<mpsc::UnboundedSender<AssistantEvent>>,
    ) -> Result<AssistantReply> {
        let message = message.trim();
        if message.is_empty() {
            anyhow::bail!("Message cannot be empty");
        }

        let session = self.session(member).await;
        let mut assistant = session.lock().await;

        let entries = self.knowledge.find_relevant(message).await;
        debug!("{} knowledge entries for assistant message", entries.len());

        assistant
            .process_message(message, &format_context(&entries), events)
            .await
    }

    /// Forget the member's conversation
    pub async fn clear_session(&self, member_id: Uuid) -> bool {
        let removed = self.sessions.lock().await.remove(&member_id).is_some();
        if removed {
            info!("🧹 Cleared assistant session for {}", member_id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::users::Role;

    fn idle_session(last_used: Instant) -> Session {
        Session {
            assistant: Arc::new(Mutex::new(GymAssistant::new(
                ToolRegistry::new(),
                String::new(),
            ))),
            last_used,
        }
    }

    #[test]
    fn test_evict_idle_sessions() {
        let start = Instant::now();
        let now = start + SESSION_IDLE_TIMEOUT + Duration::from_secs(60);
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let busy = Uuid::new_v4();

        let mut sessions = HashMap::new();
        sessions.insert(stale, idle_session(start));
        sessions.insert(fresh, idle_session(now));
        let busy_session = idle_session(start);
        let in_flight = busy_session.assistant.clone();
        sessions.insert(busy, busy_session);

        assert_eq!(evict_idle(&mut sessions, now), 1);
        assert!(!sessions.contains_key(&stale));
        assert!(sessions.contains_key(&fresh));
        assert!(sessions.contains_key(&busy));

        drop(in_flight);
        assert_eq!(evict_idle(&mut sessions, now), 1);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_member_context_block() {
        let member = AuthUser {
            id: Uuid::new_v4(),
            email: "sam@example.com".into(),
            role: Role::Member,
            first_name: "Sam".into(),
            last_name: "Lee".into(),
        };
        assert_eq!(
            member_context(&member),
            "Member Context:\n- Name: Sam Lee\n- Membership Status: Member\n- Email: sam@example.com"
        );
    }
}

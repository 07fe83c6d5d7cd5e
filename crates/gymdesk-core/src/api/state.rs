//! Shared state for the HTTP handlers

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use super::extract::AuthState;
use crate::assistant::AssistantManager;
use crate::auth::{AuthUser, JwtVerifier};
use crate::config::Config;
use crate::embedding::EmbeddingService;
use crate::events::EventBus;
use crate::knowledge::KnowledgeSearch;
use crate::llm::ChatClient;
use crate::notifications::NotificationService;
use crate::store::GymDb;
use crate::team::TeamService;
use crate::workflow::TicketWorkflow;
use crate::workouts::{WorkoutParser, WorkoutService};

pub struct AppState {
    pub config: Config,
    pub db: Arc<GymDb>,
    pub events: EventBus,
    pub verifier: JwtVerifier,
    pub workflow: TicketWorkflow,
    pub notifications: NotificationService,
    pub team: TeamService,
    pub workouts: WorkoutService,
    pub assistant: AssistantManager,
}

impl AppState {
    /// Wire every service from config over one database handle
    pub fn build(config: Config, db: Arc<GymDb>, events: EventBus) -> Result<Self> {
        let llm = ChatClient::new(&config.llm_api_url, &config.llm_api_key, &config.llm_model)?;
        let embeddings = EmbeddingService::new(
            &config.llm_api_url,
            &config.llm_api_key,
            &config.embedding_model,
        );
        let knowledge = KnowledgeSearch::new(
            db.clone(),
            embeddings,
            config.kb_similarity_threshold,
            config.kb_match_count,
        );
        let notifications = NotificationService::from_config(&config)?;
        let workflow = TicketWorkflow::new(
            db.clone(),
            llm.clone(),
            notifications.clone(),
            knowledge.clone(),
        );
        let workouts = WorkoutService::new(db.clone(), WorkoutParser::new(llm), config.gym_timezone);
        let assistant = AssistantManager::new(
            db.clone(),
            knowledge,
            workouts.clone(),
            config.gym_timezone,
        );
        let team = TeamService::from_config(db.clone(), &config)?;

        Ok(Self {
            verifier: JwtVerifier::new(&config.auth_jwt_secret),
            config,
            db,
            events,
            workflow,
            notifications,
            team,
            workouts,
            assistant,
        })
    }
}

impl AuthState for AppState {
    fn verifier(&self) -> &JwtVerifier {
        &self.verifier
    }

    fn ensure_member(&self, member: &AuthUser) -> Result<()> {
        if self.db.users().ensure_profile(&member.profile())? {
            info!("🆕 Created member profile for {}", member.email);
        }
        Ok(())
    }
}

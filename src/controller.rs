// src/controller.rs
use crate::errors::StarcrazeError;
use crate::models::{
    DetailLevel, GenerationRequest, GenerationResult, OperationKind, PromptStyle, View,
};
use crate::services::{Orchestrator, SessionStore, SharedSession};
use crate::session::{Session, Ticket};
use log::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Drives user actions against session state: build the request from the
/// current view, mark the family pending, run it, settle the outcome.
pub struct Controller {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<SessionStore>,
}

impl Controller {
    pub fn new(orchestrator: Arc<Orchestrator>, sessions: Arc<SessionStore>) -> Self {
        Self {
            orchestrator,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn create_session(&self) -> Session {
        let (_, session) = self.sessions.create().await;
        let snapshot = session.lock().await.clone();
        snapshot
    }

    pub async fn snapshot(&self, id: &Uuid) -> Result<Session, StarcrazeError> {
        let session = self.sessions.get(id).await?;
        let snapshot = session.lock().await.clone();
        Ok(snapshot)
    }

    /// Applies a local edit (option change, upload, view switch) and returns
    /// the resulting state.
    pub async fn update<F>(&self, id: &Uuid, edit: F) -> Result<Session, StarcrazeError>
    where
        F: FnOnce(&mut Session) -> Result<(), StarcrazeError>,
    {
        let session = self.sessions.get(id).await?;
        let mut guard = session.lock().await;
        edit(&mut *guard)?;
        Ok(guard.clone())
    }

    /// Like `update`, but for inputs of one view: refused with `Busy` while an
    /// operation of that view is in flight.
    pub async fn edit_view<F>(&self, id: &Uuid, view: View, edit: F) -> Result<Session, StarcrazeError>
    where
        F: FnOnce(&mut Session) -> Result<(), StarcrazeError>,
    {
        self.update(id, |s| {
            s.ensure_idle(view)?;
            edit(s)
        })
        .await
    }

    pub async fn generate_prompt(&self, id: &Uuid) -> Result<Session, StarcrazeError> {
        self.run(id, |s| s.prompt.generate_request()).await
    }

    pub async fn restyle_prompt(&self, id: &Uuid, style: PromptStyle) -> Result<Session, StarcrazeError> {
        self.run(id, move |s| s.prompt.restyle_request(style)).await
    }

    pub async fn generate_story(&self, id: &Uuid) -> Result<Session, StarcrazeError> {
        self.run(id, |s| s.story.generate_request()).await
    }

    pub async fn generate_images(
        &self,
        id: &Uuid,
        detail_override: Option<DetailLevel>,
    ) -> Result<Session, StarcrazeError> {
        self.run(id, move |s| s.studio.generate_request(detail_override))
            .await
    }

    pub async fn random_prompt(&self, id: &Uuid) -> Result<Session, StarcrazeError> {
        self.run(id, |s| s.studio.random_prompt_request()).await
    }

    pub async fn suggest_negative(&self, id: &Uuid) -> Result<Session, StarcrazeError> {
        self.run(id, |s| s.studio.negative_request()).await
    }

    /// Only `Busy` and an unknown session come back as errors; operation
    /// failures are stored on the family and show up in the returned state.
    async fn run<F>(&self, id: &Uuid, build: F) -> Result<Session, StarcrazeError>
    where
        F: FnOnce(&Session) -> GenerationRequest,
    {
        let session = self.sessions.get(id).await?;
        let (ticket, request) = {
            let mut guard = session.lock().await;
            let request = build(&*guard);
            let ticket = guard.begin(request.kind)?;
            (ticket, request)
        };

        debug!("Session {}: {} started (ticket {})", id, request.kind, ticket.id);
        let outcome = self.orchestrator.execute(&request).await;
        if let Err(e) = &outcome {
            warn!("Session {}: {} failed: {}", id, request.kind, e);
        }

        Ok(self.settle(&session, ticket, &request, outcome).await)
    }

    async fn settle(
        &self,
        session: &SharedSession,
        ticket: Ticket,
        request: &GenerationRequest,
        outcome: Result<GenerationResult, StarcrazeError>,
    ) -> Session {
        let succeeded = outcome.is_ok();
        let mut guard = session.lock().await;
        let applied = guard.settle(ticket, outcome);
        if applied && succeeded && request.kind == OperationKind::SynthesizeImages {
            guard.note_detail_level(request.options.detail_level);
        }
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AspectRatio;
    use crate::services::orchestrator::tests::{FakeApi, attachment};
    use crate::services::orchestrator::{NEGATIVE_PROMPT_FALLBACK, RANDOM_PROMPT_FALLBACK};
    use crate::session::Subject;

    fn controller(api: FakeApi) -> (Arc<FakeApi>, Controller) {
        let api = Arc::new(api);
        let orchestrator = Arc::new(Orchestrator::new(api.clone()));
        (api, Controller::new(orchestrator, Arc::new(SessionStore::new())))
    }

    #[tokio::test]
    async fn generate_prompt_stores_the_result() {
        let (api, controller) = controller(FakeApi::default().with_text("samurai --ar 16:9"));
        let id = controller.create_session().await.id;

        let state = controller.generate_prompt(&id).await.unwrap();
        let family = state.family(OperationKind::EnhancePrompt);
        assert!(!family.pending);
        assert!(family.error.is_none());
        assert_eq!(state.prompt.generated_prompt.as_deref(), Some("samurai --ar 16:9"));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn empty_subject_records_a_validation_error_without_calling_out() {
        let (api, controller) = controller(FakeApi::default());
        let id = controller.create_session().await.id;

        controller
            .update(&id, |s| {
                s.prompt.set_text("  ");
                Ok(())
            })
            .await
            .unwrap();
        let state = controller.generate_prompt(&id).await.unwrap();

        assert_eq!(
            state.family(OperationKind::EnhancePrompt).error.as_deref(),
            Some("Please enter a prompt idea or upload an image.")
        );
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn image_subject_is_described_and_captioned() {
        let (api, controller) = controller(FakeApi::default().with_text("a misty forest"));
        let id = controller.create_session().await.id;
        controller
            .update(&id, |s| {
                s.prompt.attach(attachment());
                Ok(())
            })
            .await
            .unwrap();

        let state = controller.generate_prompt(&id).await.unwrap();
        assert_eq!(state.prompt.generated_prompt.as_deref(), Some("a misty forest"));
        assert!(matches!(state.prompt.subject, Subject::Image { caption: Some(_), .. }));
        assert!(api.text_calls.lock().unwrap()[0].media.is_some());
    }

    #[tokio::test]
    async fn restyle_without_a_prompt_is_rejected_locally() {
        let (api, controller) = controller(FakeApi::default());
        let id = controller.create_session().await.id;

        let state = controller.restyle_prompt(&id, PromptStyle::Anime).await.unwrap();
        assert!(state.family(OperationKind::RestylePrompt).error.is_some());
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn studio_failure_surfaces_an_error_and_keeps_no_images() {
        let (_, controller) = controller(FakeApi::default().with_text("master").with_image_error());
        let id = controller.create_session().await.id;
        controller
            .update(&id, |s| {
                s.switch_view(View::Studio);
                s.studio.aspect_ratio = AspectRatio::ThreeTwo;
                Ok(())
            })
            .await
            .unwrap();

        let state = controller.generate_images(&id, None).await.unwrap();
        assert!(state.studio.images.is_empty());
        assert!(state.family(OperationKind::SynthesizeImages).error.is_some());
        assert!(state.studio.last_detail_level.is_none());
    }

    #[tokio::test]
    async fn upscale_records_the_override_detail_level() {
        let (_, controller) = controller(FakeApi::default().with_text("master").with_images(1));
        let id = controller.create_session().await.id;

        let state = controller.generate_images(&id, Some(DetailLevel::Ultra)).await.unwrap();
        assert_eq!(state.studio.images.len(), 1);
        assert_eq!(state.studio.last_detail_level, Some(DetailLevel::Ultra));
        assert_eq!(state.studio.detail_level, DetailLevel::High);
    }

    #[tokio::test]
    async fn suggestion_failures_fill_in_fallbacks() {
        let (_, controller) = controller(FakeApi::default().with_text_error().with_text_error());
        let id = controller.create_session().await.id;

        let state = controller.random_prompt(&id).await.unwrap();
        assert_eq!(state.studio.prompt, RANDOM_PROMPT_FALLBACK);

        let state = controller.suggest_negative(&id).await.unwrap();
        assert_eq!(state.studio.negative.text, NEGATIVE_PROMPT_FALLBACK);
        assert!(state.studio.negative.enabled);
        assert!(state.family(OperationKind::SuggestNegative).error.is_none());
    }

    #[tokio::test]
    async fn view_edits_wait_for_the_pending_operation() {
        let (_, controller) = controller(FakeApi::default().with_text("from text"));
        let id = controller.create_session().await.id;
        let state = controller
            .update(&id, |s| s.begin(OperationKind::EnhancePrompt).map(|_| ()))
            .await
            .unwrap();
        assert!(state.family(OperationKind::EnhancePrompt).pending);

        let err = controller
            .edit_view(&id, View::Prompt, |s| {
                s.prompt.attach(attachment());
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StarcrazeError::Busy(_)));

        let state = controller.snapshot(&id).await.unwrap();
        assert!(state.prompt.attachment().is_none());

        let err = controller.restyle_prompt(&id, PromptStyle::Anime).await.unwrap_err();
        assert!(matches!(err, StarcrazeError::Busy(_)));

        controller
            .edit_view(&id, View::Studio, |s| s.studio.set_quantity(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (_, controller) = controller(FakeApi::default());
        let err = controller.generate_story(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StarcrazeError::SessionNotFound(_)));
    }
}

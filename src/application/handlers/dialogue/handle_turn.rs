//! HandleTurnHandler - Processes one inbound message into one reply.
//!
//! Each turn:
//! 1. Serialises on the identity's lock
//! 2. Loads the conversation state
//! 3. Answers the pending sub-dialogue (selection, switch confirmation) or
//!    classifies the message and merges extracted slots
//! 4. Resolves the target event, checks requirements and, when ready,
//!    executes the task and resets the state
//! 5. Saves the state if the turn changed it
//!
//! Every failure is turned into a reply here; `handle` never returns an error.
//! Transient collaborator failures and invariant violations leave the stored
//! state exactly as it was before the turn.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::time::timeout;

use crate::domain::dialogue::{
    missing_fields, parse_choice, replies, Confirmation, ConversationState, DialogueError, Intent,
    IntentClassifier, MissingField, SlotExtractor, SubDialogue, TurnContext,
};
use crate::domain::foundation::Identity;
use crate::ports::{CalendarError, CalendarExecutor, ConversationStateStore, StateStoreError};

use super::event_resolver::{EventResolver, Resolution};
use super::identity_locks::IdentityLocks;

/// Command to process one message.
#[derive(Debug, Clone)]
pub struct HandleTurnCommand {
    pub identity: Identity,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Which branch of the dialogue produced the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// No task open and no intent recognised.
    IntentRequested,
    /// The answer to a pending question was not understood.
    Reprompted,
    SwitchProposed(Intent),
    SwitchDiscarded,
    MissingFields(Vec<MissingField>),
    SelectionRequested { candidates: usize },
    Executed {
        intent: Intent,
        event_id: Option<String>,
    },
    /// Execution was refused for good; the task was dropped.
    ExecutionFailed { intent: Intent },
    /// A collaborator failed transiently; nothing was saved.
    RetryLater,
    /// The turn hit an internal error; nothing was saved.
    Failed,
}

/// Reply produced by a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub outcome: TurnOutcome,
}

impl OutboundMessage {
    fn new(text: impl Into<String>, outcome: TurnOutcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }

    fn retry_later() -> Self {
        Self::new(replies::retry_later(), TurnOutcome::RetryLater)
    }

    fn failed() -> Self {
        Self::new(replies::generic_error(), TurnOutcome::Failed)
    }
}

/// Settings for the turn handler.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub timezone: Tz,
    /// Bound on every state store and calendar call.
    pub collaborator_timeout: Duration,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Argentina::Buenos_Aires,
            collaborator_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a turn could not produce a normal reply.
#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error("calendar: {0}")]
    Calendar(CalendarError),

    #[error("dialogue invariant: {0}")]
    Invariant(#[from] DialogueError),
}

/// Handler for conversation turns.
pub struct HandleTurnHandler {
    store: Arc<dyn ConversationStateStore>,
    classifier: Arc<dyn IntentClassifier>,
    extractor: Arc<dyn SlotExtractor>,
    resolver: EventResolver,
    executor: Arc<dyn CalendarExecutor>,
    locks: Arc<IdentityLocks>,
    config: TurnConfig,
}

impl HandleTurnHandler {
    pub fn new(
        store: Arc<dyn ConversationStateStore>,
        classifier: Arc<dyn IntentClassifier>,
        extractor: Arc<dyn SlotExtractor>,
        resolver: EventResolver,
        executor: Arc<dyn CalendarExecutor>,
        config: TurnConfig,
    ) -> Self {
        Self {
            store,
            classifier,
            extractor,
            resolver,
            executor,
            locks: Arc::new(IdentityLocks::new()),
            config,
        }
    }

    /// Shares a lock registry with other handlers of the same store.
    pub fn with_locks(mut self, locks: Arc<IdentityLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub async fn handle(&self, cmd: HandleTurnCommand) -> OutboundMessage {
        let identity = &cmd.identity;
        let _turn = self.locks.acquire(identity).await;
        let ctx = TurnContext::new(self.config.timezone, cmd.received_at);

        let loaded = timeout(
            self.config.collaborator_timeout,
            self.store.load(identity, cmd.received_at),
        )
        .await;
        let mut state = match loaded {
            Ok(Ok(state)) => state,
            Ok(Err(StateStoreError::Corrupt(reason))) => {
                tracing::error!(identity = %identity, reason = %reason, "Stored conversation state is corrupt");
                return OutboundMessage::failed();
            }
            Ok(Err(e)) => {
                tracing::warn!(identity = %identity, error = %e, "Failed to load conversation state");
                return OutboundMessage::retry_later();
            }
            Err(_) => {
                tracing::warn!(identity = %identity, "Loading conversation state timed out");
                return OutboundMessage::retry_later();
            }
        };
        let before = state.clone();

        let reply = match self.run(&mut state, &cmd.text, &ctx).await {
            Ok(reply) => reply,
            Err(TurnError::Calendar(e)) => {
                tracing::warn!(identity = %identity, error = %e, "Calendar failed during turn");
                return OutboundMessage::retry_later();
            }
            Err(TurnError::Invariant(e)) => {
                tracing::error!(identity = %identity, error = %e, "Dialogue invariant violated");
                return OutboundMessage::failed();
            }
        };

        tracing::debug!(
            identity = %identity,
            outcome = ?reply.outcome,
            intent = ?state.active_intent(),
            "Turn processed"
        );

        if state == before {
            return reply;
        }

        let saved = timeout(
            self.config.collaborator_timeout,
            self.store.save(&state, cmd.received_at),
        )
        .await;
        let failure = match saved {
            Ok(Ok(_version)) => return reply,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "timed out".to_string(),
        };

        // The calendar already changed; the user must see what happened.
        if matches!(reply.outcome, TurnOutcome::Executed { .. }) {
            tracing::error!(identity = %identity, error = %failure, "Executed task but failed to reset state");
            return reply;
        }
        tracing::warn!(identity = %identity, error = %failure, "Failed to save conversation state");
        OutboundMessage::retry_later()
    }

    async fn run(
        &self,
        state: &mut ConversationState,
        text: &str,
        ctx: &TurnContext,
    ) -> Result<OutboundMessage, TurnError> {
        match state.sub_dialogue().clone() {
            SubDialogue::SelectingEvent { candidates } => {
                let Some(choice) = parse_choice(text) else {
                    return Ok(OutboundMessage::new(
                        replies::selection_reprompt(&candidates),
                        TurnOutcome::Reprompted,
                    ));
                };
                match state.select_candidate(choice) {
                    Ok(picked) => {
                        tracing::debug!(event_id = %picked.event_id, "Event selected");
                        self.conclude(state, ctx).await
                    }
                    Err(DialogueError::SelectionOutOfRange { .. }) => Ok(OutboundMessage::new(
                        replies::selection_reprompt(&candidates),
                        TurnOutcome::Reprompted,
                    )),
                    Err(e) => Err(e.into()),
                }
            }

            SubDialogue::ConfirmingSwitch { intent, .. } => match Confirmation::parse(text) {
                Some(Confirmation::Affirmative) => {
                    let pending = state.commit_switch()?;
                    let combined = format!("{} {}", pending, text);
                    self.absorb(state, &combined, ctx)?;
                    self.conclude(state, ctx).await
                }
                Some(Confirmation::Negative) => {
                    state.discard_switch()?;
                    let text = match state.slots() {
                        Some(slots) => {
                            replies::missing_fields(slots.intent(), &missing_fields(slots))
                        }
                        None => replies::ask_intent(),
                    };
                    Ok(OutboundMessage::new(text, TurnOutcome::SwitchDiscarded))
                }
                None => Ok(OutboundMessage::new(
                    replies::confirm_switch_reprompt(intent),
                    TurnOutcome::Reprompted,
                )),
            },

            SubDialogue::Idle => {
                let detected = self.classifier.classify(text);
                match (state.active_intent(), detected) {
                    (None, None) => Ok(OutboundMessage::new(
                        replies::ask_intent(),
                        TurnOutcome::IntentRequested,
                    )),
                    (None, Some(intent)) => {
                        state.start_intent(intent)?;
                        self.absorb(state, text, ctx)?;
                        self.conclude(state, ctx).await
                    }
                    (Some(active), Some(intent)) if intent != active => {
                        state.propose_switch(intent, text)?;
                        Ok(OutboundMessage::new(
                            replies::confirm_switch(active, intent),
                            TurnOutcome::SwitchProposed(intent),
                        ))
                    }
                    (Some(_), _) => {
                        self.absorb(state, text, ctx)?;
                        self.conclude(state, ctx).await
                    }
                }
            }
        }
    }

    /// Extracts proposals from `text` and merges them into the active slots.
    fn absorb(
        &self,
        state: &mut ConversationState,
        text: &str,
        ctx: &TurnContext,
    ) -> Result<(), TurnError> {
        let slots = state.slots_mut().ok_or(DialogueError::NoActiveIntent)?;
        let extraction = self.extractor.extract(slots.intent(), text, Some(&*slots), ctx);

        slots.merge_missing(extraction.proposed)?;
        if let Some(criteria) = extraction.criteria {
            slots.merge_criteria(criteria);
        }
        if let Some(changes) = extraction.changes {
            slots.merge_changes(changes);
        }
        Ok(())
    }

    /// Resolves the target event, checks requirements and executes when ready.
    async fn conclude(
        &self,
        state: &mut ConversationState,
        ctx: &TurnContext,
    ) -> Result<OutboundMessage, TurnError> {
        let identity = state.identity().clone();
        let slots = state.slots().ok_or(DialogueError::NoActiveIntent)?;
        let intent = slots.intent();

        let mut unmatched = false;
        let criteria = slots
            .criteria()
            .filter(|c| !c.is_empty() && slots.event_id().is_none())
            .cloned();

        if let Some(criteria) = criteria {
            let resolution = match self.resolver.resolve(&identity, &criteria, ctx).await {
                Ok(resolution) => resolution,
                Err(e) if e.is_transient() => return Err(TurnError::Calendar(e)),
                Err(e) => return Ok(self.abandon(state, intent, &e)),
            };

            match resolution {
                Resolution::Unique(event_id) => {
                    if let Some(slots) = state.slots_mut() {
                        slots.set_event_id(event_id)?;
                    }
                }
                Resolution::Ambiguous(candidates) => {
                    let text = replies::selection_prompt(&candidates);
                    let count = candidates.len();
                    state.await_selection(candidates)?;
                    return Ok(OutboundMessage::new(
                        text,
                        TurnOutcome::SelectionRequested { candidates: count },
                    ));
                }
                Resolution::NoMatch => {
                    if let Some(slots) = state.slots_mut() {
                        slots.clear_criteria();
                    }
                    unmatched = true;
                }
            }
        }

        let slots = state.slots().ok_or(DialogueError::NoActiveIntent)?;
        let missing = missing_fields(slots);
        if !missing.is_empty() {
            let mut text = replies::missing_fields(intent, &missing);
            if unmatched {
                text = format!("{} {}", replies::no_matching_events(), text);
            }
            return Ok(OutboundMessage::new(text, TurnOutcome::MissingFields(missing)));
        }

        let ready = slots.clone();
        state.reset();
        tracing::debug!(identity = %identity, intent = ?intent, "Executing task");

        let executed = timeout(
            self.config.collaborator_timeout,
            self.executor.execute(&identity, &ready, ctx),
        )
        .await
        .unwrap_or(Err(CalendarError::Timeout));

        match executed {
            Ok(outcome) => {
                tracing::info!(identity = %identity, intent = ?intent, "Task executed");
                Ok(OutboundMessage::new(
                    outcome.summary,
                    TurnOutcome::Executed {
                        intent,
                        event_id: outcome.event_id,
                    },
                ))
            }
            Err(e) if e.is_transient() => Err(TurnError::Calendar(e)),
            Err(e) => Ok(self.abandon(state, intent, &e)),
        }
    }

    /// Drops the task after a permanent calendar failure and reports it.
    fn abandon(
        &self,
        state: &mut ConversationState,
        intent: Intent,
        error: &CalendarError,
    ) -> OutboundMessage {
        tracing::warn!(identity = %state.identity(), error = %error, "Calendar refused task");
        state.reset();
        let text = match error {
            CalendarError::NotFound(_) => replies::event_not_found(),
            CalendarError::Rejected(reason) => replies::rejected(reason),
            other => replies::rejected(&other.to_string()),
        };
        OutboundMessage::new(text, TurnOutcome::ExecutionFailed { intent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::calendar::InMemoryCalendar;
    use crate::adapters::storage::InMemoryStateStore;
    use crate::application::handlers::dialogue::ResolverConfig;
    use crate::domain::dialogue::{
        Awaiting, CreateSlots, IntentSlots, KeywordIntentClassifier, RuleBasedSlotExtractor,
    };
    use crate::ports::{CalendarEvent, EventTime};
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn tz() -> Tz {
        chrono_tz::America::Argentina::Buenos_Aires
    }

    // Wednesday 2025-03-12 09:00 local.
    fn now() -> DateTime<Utc> {
        tz().with_ymd_and_hms(2025, 3, 12, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn identity() -> Identity {
        Identity::new("5491112345678").unwrap()
    }

    fn at(day: u32, h: u32) -> DateTime<Utc> {
        tz().with_ymd_and_hms(2025, 3, day, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn event(id: &str, title: &str, day: u32, h: u32) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            title: Some(title.into()),
            status: Some("confirmed".into()),
            start: EventTime::DateTime(at(day, h)),
            end: EventTime::DateTime(at(day, h + 1)),
        }
    }

    struct Fixture {
        store: InMemoryStateStore,
        calendar: InMemoryCalendar,
        handler: HandleTurnHandler,
    }

    fn fixture(calendar: InMemoryCalendar) -> Fixture {
        let store = InMemoryStateStore::new();
        let handler = HandleTurnHandler::new(
            Arc::new(store.clone()),
            Arc::new(KeywordIntentClassifier::new()),
            Arc::new(RuleBasedSlotExtractor::new()),
            EventResolver::new(Arc::new(calendar.clone()), ResolverConfig::default()),
            Arc::new(calendar.clone()),
            TurnConfig::default(),
        );
        Fixture {
            store,
            calendar,
            handler,
        }
    }

    impl Fixture {
        async fn say(&self, text: &str) -> OutboundMessage {
            self.handler
                .handle(HandleTurnCommand {
                    identity: identity(),
                    text: text.to_string(),
                    received_at: now(),
                })
                .await
        }

        async fn state(&self) -> Option<ConversationState> {
            self.store.get(&identity()).await
        }
    }

    #[tokio::test]
    async fn unknown_message_asks_for_intent_without_saving() {
        let f = fixture(InMemoryCalendar::new());

        let reply = f.say("hola").await;

        assert_eq!(reply.outcome, TurnOutcome::IntentRequested);
        assert_eq!(reply.text, replies::ask_intent());
        assert!(f.state().await.is_none());
    }

    #[tokio::test]
    async fn create_without_title_lists_titulo() {
        let f = fixture(InMemoryCalendar::new());

        let reply = f
            .say("quiero agendar una reunión mañana a las 10 por una hora")
            .await;

        assert_eq!(reply.outcome, TurnOutcome::MissingFields(vec![MissingField::Title]));
        assert!(reply.text.contains("titulo"));
        let state = f.state().await.unwrap();
        assert_eq!(state.active_intent(), Some(Intent::Create));
    }

    #[tokio::test]
    async fn title_follow_up_executes_and_resets() {
        let f = fixture(InMemoryCalendar::new());
        f.say("quiero agendar una reunión mañana a las 10 por una hora").await;

        let reply = f.say("Revisión de presupuesto").await;

        assert!(matches!(reply.outcome, TurnOutcome::Executed { intent: Intent::Create, .. }));
        assert_eq!(
            reply.text,
            "Listo, agendé «Revisión de presupuesto» el jue 13/03 de 10:00 a 11:00 ✅"
        );
        assert!(f.state().await.unwrap().is_blank());
        assert_eq!(f.calendar.events().len(), 1);

        let after = f.say("gracias").await;
        assert_eq!(after.outcome, TurnOutcome::IntentRequested);
    }

    #[tokio::test]
    async fn different_intent_mid_task_asks_to_confirm() {
        let f = fixture(InMemoryCalendar::new());
        f.say("quiero agendar una reunión mañana a las 10 por una hora").await;
        let before = f.state().await.unwrap();

        let reply = f.say("cancelá la reunión del viernes").await;

        assert_eq!(reply.outcome, TurnOutcome::SwitchProposed(Intent::Cancel));
        let state = f.state().await.unwrap();
        assert_eq!(state.active_intent(), Some(Intent::Create));
        assert_eq!(state.slots(), before.slots());
        assert_eq!(state.pending_intent(), Some(Intent::Cancel));
    }

    #[tokio::test]
    async fn negative_answer_restores_missing_field_prompt() {
        let f = fixture(InMemoryCalendar::new());
        let first = f
            .say("quiero agendar una reunión mañana a las 10 por una hora")
            .await;
        f.say("cancelá la reunión del viernes").await;

        let reply = f.say("no").await;

        assert_eq!(reply.outcome, TurnOutcome::SwitchDiscarded);
        assert_eq!(reply.text, first.text);
        let state = f.state().await.unwrap();
        assert_eq!(state.pending_intent(), None);
        assert_eq!(state.active_intent(), Some(Intent::Create));
    }

    #[tokio::test]
    async fn unclear_answer_reprompts_without_change() {
        let f = fixture(InMemoryCalendar::new());
        f.say("quiero agendar una reunión mañana a las 10 por una hora").await;
        f.say("cancelá la reunión del viernes").await;
        let before = f.state().await.unwrap();

        let reply = f.say("mmm no sé").await;

        assert_eq!(reply.outcome, TurnOutcome::Reprompted);
        assert_eq!(f.state().await.unwrap(), before);
    }

    #[tokio::test]
    async fn affirmative_answer_switches_and_reprocesses_message() {
        let calendar = InMemoryCalendar::new().with_event(event("a", "Reunión de equipo", 14, 10));
        let f = fixture(calendar);
        f.say("quiero agendar una reunión mañana a las 10 por una hora").await;
        f.say("cancelá la reunión del viernes").await;

        let reply = f.say("sí").await;

        assert!(matches!(reply.outcome, TurnOutcome::Executed { intent: Intent::Cancel, .. }));
        assert!(f.calendar.events()[0].is_cancelled());
        assert!(f.state().await.unwrap().is_blank());
    }

    #[tokio::test]
    async fn ambiguous_cancel_offers_candidates_and_accepts_choice() {
        let calendar = InMemoryCalendar::new()
            .with_event(event("a", "Daily", 13, 10))
            .with_event(event("b", "Dentista", 13, 15))
            .with_event(event("c", "Cena", 13, 21));
        let f = fixture(calendar);

        let reply = f.say("cancelá lo del jueves").await;
        assert_eq!(reply.outcome, TurnOutcome::SelectionRequested { candidates: 3 });
        assert_eq!(f.state().await.unwrap().awaiting(), Awaiting::EventSelection);

        let out_of_range = f.say("4").await;
        assert_eq!(out_of_range.outcome, TurnOutcome::Reprompted);
        assert_eq!(f.state().await.unwrap().candidate_events().len(), 3);

        let reply = f.say("2").await;
        assert_eq!(
            reply.outcome,
            TurnOutcome::Executed {
                intent: Intent::Cancel,
                event_id: Some("b".into())
            }
        );
        assert!(f.state().await.unwrap().is_blank());
    }

    #[tokio::test]
    async fn no_matching_event_clears_criteria() {
        let f = fixture(InMemoryCalendar::new());

        let reply = f.say("cancelá lo del jueves").await;

        assert_eq!(reply.outcome, TurnOutcome::MissingFields(vec![MissingField::Event]));
        assert!(reply.text.starts_with(&replies::no_matching_events()));
        let state = f.state().await.unwrap();
        assert!(state.slots().unwrap().criteria().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transient_calendar_failure_keeps_previous_state() {
        let f = fixture(InMemoryCalendar::new());
        f.say("quiero agendar una reunión mañana a las 10 por una hora").await;
        let before = f.state().await.unwrap();
        f.calendar.push_failure(CalendarError::Unavailable("503".into()));

        let reply = f.say("Revisión de presupuesto").await;

        assert_eq!(reply.outcome, TurnOutcome::RetryLater);
        assert_eq!(reply.text, replies::retry_later());
        assert_eq!(f.state().await.unwrap(), before);

        let retried = f.say("Revisión de presupuesto").await;
        assert!(matches!(retried.outcome, TurnOutcome::Executed { .. }));
    }

    #[tokio::test]
    async fn permanent_failure_resets_and_reports() {
        let f = fixture(InMemoryCalendar::new());
        f.say("quiero agendar una reunión mañana a las 10 por una hora").await;
        f.calendar
            .push_failure(CalendarError::Rejected("horario inválido".into()));

        let reply = f.say("Revisión de presupuesto").await;

        assert_eq!(reply.outcome, TurnOutcome::ExecutionFailed { intent: Intent::Create });
        assert_eq!(reply.text, "Google rechazó el cambio: horario inválido");
        assert!(f.state().await.unwrap().is_blank());
    }

    #[tokio::test]
    async fn slow_execution_times_out_as_retry() {
        let calendar = InMemoryCalendar::new().with_delay(Duration::from_millis(200));
        let store = InMemoryStateStore::new();
        let handler = HandleTurnHandler::new(
            Arc::new(store.clone()),
            Arc::new(KeywordIntentClassifier::new()),
            Arc::new(RuleBasedSlotExtractor::new()),
            EventResolver::new(Arc::new(calendar.clone()), ResolverConfig::default()),
            Arc::new(calendar),
            TurnConfig {
                collaborator_timeout: Duration::from_millis(20),
                ..TurnConfig::default()
            },
        );

        let reply = handler
            .handle(HandleTurnCommand {
                identity: identity(),
                text: "agendá \"Dentista\" mañana a las 15 por una hora".into(),
                received_at: now(),
            })
            .await;

        assert_eq!(reply.outcome, TurnOutcome::RetryLater);
        assert!(store.get(&identity()).await.is_none());
    }

    #[tokio::test]
    async fn slots_mismatch_is_reported_as_generic_error() {
        let f = fixture(InMemoryCalendar::new());
        // A state whose sub-dialogue is selecting without any open task.
        let broken = ConversationState::reconstitute(
            identity(),
            Some(IntentSlots::Create(CreateSlots {
                title: Some("Dentista".into()),
                day: NaiveDate::from_ymd_opt(2025, 3, 13),
                start_time: NaiveTime::from_hms_opt(15, 0, 0),
                ..Default::default()
            })),
            SubDialogue::SelectingEvent {
                candidates: vec![crate::domain::dialogue::CandidateEvent {
                    title: "X".into(),
                    event_id: "x".into(),
                    display_start: "jue 13/03 10:00".into(),
                    display_end: None,
                }],
            },
            0,
            now(),
            now(),
        );
        f.store.save(&broken, now()).await.unwrap();
        let before = f.state().await.unwrap();

        let reply = f.say("1").await;

        assert_eq!(reply.outcome, TurnOutcome::Failed);
        assert_eq!(reply.text, replies::generic_error());
        assert_eq!(f.state().await.unwrap(), before);
    }
}

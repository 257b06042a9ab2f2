//! Per-identity conversation state and its sub-dialogue modes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize::fold_words;
use super::{DialogueError, Intent, IntentSlots};
use crate::domain::foundation::{Identity, StateMachine, ValidationError};

/// One entry of a disambiguation list, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub title: String,
    pub event_id: String,
    pub display_start: String,
    /// `None` for all-day events.
    pub display_end: Option<String>,
}

/// Sub-dialogue marker as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Awaiting {
    #[default]
    None,
    EventSelection,
}

/// The question, if any, the user still has to answer.
///
/// Holding the pending switch and the candidate list in one enum keeps the
/// two modes mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubDialogue {
    #[default]
    Idle,
    /// A different intent was detected mid-task; waiting for yes/no.
    ConfirmingSwitch { intent: Intent, message: String },
    /// Several events matched; waiting for a number.
    SelectingEvent { candidates: Vec<CandidateEvent> },
}

impl SubDialogue {
    pub fn kind(&self) -> SubDialogueKind {
        match self {
            SubDialogue::Idle => SubDialogueKind::Idle,
            SubDialogue::ConfirmingSwitch { .. } => SubDialogueKind::ConfirmingSwitch,
            SubDialogue::SelectingEvent { .. } => SubDialogueKind::SelectingEvent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubDialogueKind {
    Idle,
    ConfirmingSwitch,
    SelectingEvent,
}

impl StateMachine for SubDialogueKind {
    fn valid_transitions(&self) -> Vec<Self> {
        use SubDialogueKind::*;
        match self {
            Idle => vec![ConfirmingSwitch, SelectingEvent],
            ConfirmingSwitch => vec![Idle],
            SelectingEvent => vec![Idle],
        }
    }
}

/// Dialogue memory of one identity.
///
/// Created empty on the first turn and reset, never deleted, when a task
/// completes. `version` is bumped by the store on every save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    identity: Identity,
    slots: Option<IntentSlots>,
    sub_dialogue: SubDialogue,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Creates an empty state that has never been saved.
    pub fn new(identity: Identity, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            slots: None,
            sub_dialogue: SubDialogue::Idle,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes a state from persistence.
    pub fn reconstitute(
        identity: Identity,
        slots: Option<IntentSlots>,
        sub_dialogue: SubDialogue,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            slots,
            sub_dialogue,
            version,
            created_at,
            updated_at,
        }
    }

    // === Accessors ===

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn slots(&self) -> Option<&IntentSlots> {
        self.slots.as_ref()
    }

    pub fn slots_mut(&mut self) -> Option<&mut IntentSlots> {
        self.slots.as_mut()
    }

    pub fn sub_dialogue(&self) -> &SubDialogue {
        &self.sub_dialogue
    }

    pub fn active_intent(&self) -> Option<Intent> {
        self.slots.as_ref().map(IntentSlots::intent)
    }

    pub fn pending_intent(&self) -> Option<Intent> {
        match &self.sub_dialogue {
            SubDialogue::ConfirmingSwitch { intent, .. } => Some(*intent),
            _ => None,
        }
    }

    pub fn pending_message(&self) -> Option<&str> {
        match &self.sub_dialogue {
            SubDialogue::ConfirmingSwitch { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn awaiting(&self) -> Awaiting {
        match self.sub_dialogue {
            SubDialogue::SelectingEvent { .. } => Awaiting::EventSelection,
            _ => Awaiting::None,
        }
    }

    pub fn candidate_events(&self) -> &[CandidateEvent] {
        match &self.sub_dialogue {
            SubDialogue::SelectingEvent { candidates } => candidates,
            _ => &[],
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// True when nothing is in progress.
    pub fn is_blank(&self) -> bool {
        self.slots.is_none() && self.sub_dialogue == SubDialogue::Idle
    }

    // === Transitions ===

    /// Opens a task for `intent` with empty slots.
    pub fn start_intent(&mut self, intent: Intent) -> Result<(), DialogueError> {
        self.ensure_kind(SubDialogueKind::Idle)?;
        self.slots = Some(IntentSlots::empty(intent));
        Ok(())
    }

    /// Asks to switch the active task to `intent`, remembering the message.
    pub fn propose_switch(
        &mut self,
        intent: Intent,
        message: impl Into<String>,
    ) -> Result<(), DialogueError> {
        self.transition(SubDialogueKind::ConfirmingSwitch)?;
        self.sub_dialogue = SubDialogue::ConfirmingSwitch {
            intent,
            message: message.into(),
        };
        Ok(())
    }

    /// Accepts the pending switch: the proposed intent becomes active with
    /// empty slots. Returns the message that triggered the proposal.
    pub fn commit_switch(&mut self) -> Result<String, DialogueError> {
        let SubDialogue::ConfirmingSwitch { intent, message } = &self.sub_dialogue else {
            return Err(self.unexpected(SubDialogueKind::ConfirmingSwitch));
        };
        let (intent, message) = (*intent, message.clone());
        self.transition(SubDialogueKind::Idle)?;
        self.sub_dialogue = SubDialogue::Idle;
        self.slots = Some(IntentSlots::empty(intent));
        Ok(message)
    }

    /// Rejects the pending switch, keeping the active task as it was.
    pub fn discard_switch(&mut self) -> Result<(), DialogueError> {
        self.ensure_kind(SubDialogueKind::ConfirmingSwitch)?;
        self.transition(SubDialogueKind::Idle)?;
        self.sub_dialogue = SubDialogue::Idle;
        Ok(())
    }

    /// Presents candidates and waits for the user to pick one.
    pub fn await_selection(&mut self, candidates: Vec<CandidateEvent>) -> Result<(), DialogueError> {
        if self.slots.is_none() {
            return Err(DialogueError::NoActiveIntent);
        }
        self.transition(SubDialogueKind::SelectingEvent)?;
        self.sub_dialogue = SubDialogue::SelectingEvent { candidates };
        Ok(())
    }

    /// Picks the 1-based `choice` from the candidate list.
    ///
    /// On error nothing changes.
    pub fn select_candidate(&mut self, choice: usize) -> Result<CandidateEvent, DialogueError> {
        let SubDialogue::SelectingEvent { candidates } = &self.sub_dialogue else {
            return Err(self.unexpected(SubDialogueKind::SelectingEvent));
        };
        let available = candidates.len();
        let picked = choice
            .checked_sub(1)
            .and_then(|i| candidates.get(i))
            .cloned()
            .ok_or(DialogueError::SelectionOutOfRange { choice, available })?;

        let slots = self.slots.as_mut().ok_or(DialogueError::NoActiveIntent)?;
        slots.set_event_id(picked.event_id.clone())?;
        self.sub_dialogue = SubDialogue::Idle;
        Ok(picked)
    }

    /// Clears the task and any sub-dialogue.
    pub fn reset(&mut self) {
        self.slots = None;
        self.sub_dialogue = SubDialogue::Idle;
    }

    /// Records a successful save.
    pub fn mark_saved(&mut self, version: i64, at: DateTime<Utc>) {
        self.version = version;
        self.updated_at = at;
    }

    fn ensure_kind(&self, expected: SubDialogueKind) -> Result<(), DialogueError> {
        if self.sub_dialogue.kind() == expected {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn transition(&self, target: SubDialogueKind) -> Result<SubDialogueKind, DialogueError> {
        Ok(self.sub_dialogue.kind().transition_to(target)?)
    }

    fn unexpected(&self, expected: SubDialogueKind) -> DialogueError {
        ValidationError::malformed(
            "sub_dialogue",
            format!("expected {:?}, found {:?}", expected, self.sub_dialogue.kind()),
        )
        .into()
    }
}

/// Reads a 1-based choice from a reply such as "2", "la 3" or "la primera".
pub fn parse_choice(text: &str) -> Option<usize> {
    let folded = fold_words(text);
    folded.split(' ').find_map(|word| {
        if !word.is_empty() && word.chars().all(|c| c.is_ascii_digit()) {
            return word.parse::<usize>().ok();
        }
        let n = match word {
            "uno" | "una" | "primero" | "primera" | "primer" | "1ro" | "1ra" => 1,
            "dos" | "segundo" | "segunda" | "2do" | "2da" => 2,
            "tres" | "tercero" | "tercera" | "tercer" | "3ro" | "3ra" => 3,
            "cuatro" | "cuarto" | "cuarta" => 4,
            "cinco" | "quinto" | "quinta" => 5,
            _ => return None,
        };
        Some(n)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dialogue::CreateSlots;

    fn state() -> ConversationState {
        ConversationState::new(Identity::new("5491112345678").unwrap(), Utc::now())
    }

    fn candidates(n: usize) -> Vec<CandidateEvent> {
        (1..=n)
            .map(|i| CandidateEvent {
                title: format!("Evento {i}"),
                event_id: format!("evt-{i}"),
                display_start: "10:00".into(),
                display_end: Some("11:00".into()),
            })
            .collect()
    }

    #[test]
    fn new_state_is_blank() {
        let s = state();
        assert!(s.is_blank());
        assert_eq!(s.active_intent(), None);
        assert_eq!(s.awaiting(), Awaiting::None);
        assert!(s.candidate_events().is_empty());
        assert_eq!(s.version(), 0);
    }

    #[test]
    fn switch_round_trip() {
        let mut s = state();
        s.start_intent(Intent::Create).unwrap();
        s.propose_switch(Intent::Update, "mové la reunión").unwrap();

        assert_eq!(s.active_intent(), Some(Intent::Create));
        assert_eq!(s.pending_intent(), Some(Intent::Update));
        assert_eq!(s.pending_message(), Some("mové la reunión"));

        let message = s.commit_switch().unwrap();
        assert_eq!(message, "mové la reunión");
        assert_eq!(s.active_intent(), Some(Intent::Update));
        assert!(s.slots().unwrap().is_empty());
        assert_eq!(s.pending_intent(), None);
    }

    #[test]
    fn discard_keeps_active_task() {
        let mut s = state();
        s.start_intent(Intent::Create).unwrap();
        s.slots_mut()
            .unwrap()
            .merge_missing(IntentSlots::Create(CreateSlots {
                title: Some("Dentista".into()),
                ..Default::default()
            }))
            .unwrap();
        let before = s.slots().cloned();

        s.propose_switch(Intent::Cancel, "cancelá").unwrap();
        s.discard_switch().unwrap();

        assert_eq!(s.slots().cloned(), before);
        assert_eq!(s.pending_intent(), None);
        assert_eq!(s.pending_message(), None);
    }

    #[test]
    fn modes_are_exclusive() {
        let mut s = state();
        s.start_intent(Intent::Cancel).unwrap();
        s.await_selection(candidates(2)).unwrap();
        assert!(matches!(
            s.propose_switch(Intent::Create, "x"),
            Err(DialogueError::InvalidTransition(_))
        ));
        assert_eq!(s.awaiting(), Awaiting::EventSelection);
    }

    #[test]
    fn selection_out_of_range_changes_nothing() {
        let mut s = state();
        s.start_intent(Intent::Cancel).unwrap();
        s.await_selection(candidates(3)).unwrap();
        let before = s.clone();

        assert_eq!(
            s.select_candidate(4),
            Err(DialogueError::SelectionOutOfRange {
                choice: 4,
                available: 3
            })
        );
        assert!(s.select_candidate(0).is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn valid_selection_sets_event_and_clears_candidates() {
        let mut s = state();
        s.start_intent(Intent::Update).unwrap();
        s.await_selection(candidates(3)).unwrap();

        let picked = s.select_candidate(2).unwrap();

        assert_eq!(picked.event_id, "evt-2");
        assert_eq!(s.slots().unwrap().event_id(), Some("evt-2"));
        assert_eq!(s.awaiting(), Awaiting::None);
        assert!(s.candidate_events().is_empty());
    }

    #[test]
    fn await_selection_requires_task() {
        let mut s = state();
        assert_eq!(
            s.await_selection(candidates(2)),
            Err(DialogueError::NoActiveIntent)
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = state();
        s.start_intent(Intent::Create).unwrap();
        s.propose_switch(Intent::Cancel, "cancelá").unwrap();
        s.reset();
        assert!(s.is_blank());
    }

    #[test]
    fn sub_dialogue_transitions() {
        use SubDialogueKind::*;
        assert!(Idle.can_transition_to(&SelectingEvent));
        assert!(!ConfirmingSwitch.can_transition_to(&SelectingEvent));
    }

    #[test]
    fn parses_choices() {
        assert_eq!(parse_choice("2"), Some(2));
        assert_eq!(parse_choice("la 3, gracias"), Some(3));
        assert_eq!(parse_choice("La primera"), Some(1));
        assert_eq!(parse_choice("opción dos"), Some(2));
        assert_eq!(parse_choice("ninguna"), None);
        assert_eq!(parse_choice(""), None);
    }
}

//! PostgreSQL implementation of ConversationStateStore.
//!
//! One `conversation_state` row per identity. The typed slots are stored as
//! `active_intent` plus the variant's fields in `slots_json`; the sub-dialogue
//! is spread over `pending_intent`/`pending_message` and
//! `awaiting`/`candidate_events` with a check constraint keeping the two
//! modes exclusive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{PgPool, Row};

use crate::domain::dialogue::{
    Awaiting, CandidateEvent, ConversationState, Intent, IntentSlots, SubDialogue,
};
use crate::domain::foundation::Identity;
use crate::ports::{ConversationStateStore, StateStoreError};

/// PostgreSQL implementation of ConversationStateStore.
#[derive(Clone)]
pub struct PostgresStateStore {
    pool: PgPool,
}

impl PostgresStateStore {
    /// Creates a new PostgresStateStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Column values of one `conversation_state` row.
#[derive(Debug, Clone, PartialEq)]
struct StateRow {
    identity: String,
    active_intent: Option<String>,
    slots_json: Value,
    pending_intent: Option<String>,
    pending_message: Option<String>,
    awaiting: String,
    candidate_events: Value,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn awaiting_to_str(awaiting: Awaiting) -> &'static str {
    match awaiting {
        Awaiting::None => "NONE",
        Awaiting::EventSelection => "EVENT_SELECTION",
    }
}

fn parse_intent(label: &str) -> Result<Intent, StateStoreError> {
    label
        .parse::<Intent>()
        .map_err(|e| StateStoreError::Corrupt(e.to_string()))
}

fn to_row(state: &ConversationState) -> Result<StateRow, StateStoreError> {
    let (active_intent, slots_json) = match state.slots() {
        Some(slots) => {
            let tagged = serde_json::to_value(slots)
                .map_err(|e| StateStoreError::Serialization(e.to_string()))?;
            let inner = tagged.get("slots").cloned().unwrap_or_else(|| json!({}));
            (Some(slots.intent().as_str().to_string()), inner)
        }
        None => (None, json!({})),
    };

    let candidate_events = serde_json::to_value(state.candidate_events())
        .map_err(|e| StateStoreError::Serialization(e.to_string()))?;

    Ok(StateRow {
        identity: state.identity().as_str().to_string(),
        active_intent,
        slots_json,
        pending_intent: state.pending_intent().map(|i| i.as_str().to_string()),
        pending_message: state.pending_message().map(str::to_string),
        awaiting: awaiting_to_str(state.awaiting()).to_string(),
        candidate_events,
        version: state.version(),
        created_at: state.created_at(),
        updated_at: state.updated_at(),
    })
}

fn from_row(row: StateRow) -> Result<ConversationState, StateStoreError> {
    let identity =
        Identity::new(&row.identity).map_err(|e| StateStoreError::Corrupt(e.to_string()))?;

    let slots = match row.active_intent.as_deref() {
        Some(label) => {
            let intent = parse_intent(label)?;
            let tagged = json!({ "intent": intent.as_str(), "slots": row.slots_json });
            Some(
                serde_json::from_value::<IntentSlots>(tagged)
                    .map_err(|e| StateStoreError::Corrupt(e.to_string()))?,
            )
        }
        None => None,
    };

    let sub_dialogue = match (row.pending_intent.as_deref(), row.awaiting.as_str()) {
        (Some(_), "EVENT_SELECTION") => {
            return Err(StateStoreError::Corrupt(format!(
                "{} has both a pending intent and a pending selection",
                row.identity
            )))
        }
        (Some(label), _) => SubDialogue::ConfirmingSwitch {
            intent: parse_intent(label)?,
            message: row.pending_message.unwrap_or_default(),
        },
        (None, "EVENT_SELECTION") => SubDialogue::SelectingEvent {
            candidates: serde_json::from_value::<Vec<CandidateEvent>>(row.candidate_events)
                .map_err(|e| StateStoreError::Corrupt(e.to_string()))?,
        },
        (None, "NONE") => SubDialogue::Idle,
        (None, other) => {
            return Err(StateStoreError::Corrupt(format!(
                "unknown awaiting value '{}'",
                other
            )))
        }
    };

    Ok(ConversationState::reconstitute(
        identity,
        slots,
        sub_dialogue,
        row.version,
        row.created_at,
        row.updated_at,
    ))
}

#[async_trait]
impl ConversationStateStore for PostgresStateStore {
    async fn load(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<ConversationState, StateStoreError> {
        let row = sqlx::query(
            r#"
            SELECT identity, active_intent, slots_json, pending_intent, pending_message,
                   awaiting, candidate_events, version, created_at, updated_at
            FROM conversation_state
            WHERE identity = $1
            "#,
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StateStoreError::Database(format!("Failed to load state: {}", e)))?;

        let Some(row) = row else {
            return Ok(ConversationState::new(identity.clone(), now));
        };

        let read = |e: sqlx::Error| StateStoreError::Database(format!("Failed to read row: {}", e));
        from_row(StateRow {
            identity: row.try_get("identity").map_err(read)?,
            active_intent: row.try_get("active_intent").map_err(read)?,
            slots_json: row.try_get("slots_json").map_err(read)?,
            pending_intent: row.try_get("pending_intent").map_err(read)?,
            pending_message: row.try_get("pending_message").map_err(read)?,
            awaiting: row.try_get("awaiting").map_err(read)?,
            candidate_events: row.try_get("candidate_events").map_err(read)?,
            version: row.try_get("version").map_err(read)?,
            created_at: row.try_get("created_at").map_err(read)?,
            updated_at: row.try_get("updated_at").map_err(read)?,
        })
    }

    async fn save(
        &self,
        state: &ConversationState,
        now: DateTime<Utc>,
    ) -> Result<i64, StateStoreError> {
        let row = to_row(state)?;

        let result = if row.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO conversation_state (
                    identity, active_intent, slots_json, pending_intent, pending_message,
                    awaiting, candidate_events, version, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $9)
                ON CONFLICT (identity) DO NOTHING
                "#,
            )
            .bind(&row.identity)
            .bind(&row.active_intent)
            .bind(&row.slots_json)
            .bind(&row.pending_intent)
            .bind(&row.pending_message)
            .bind(&row.awaiting)
            .bind(&row.candidate_events)
            .bind(row.created_at)
            .bind(now)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE conversation_state SET
                    active_intent = $2,
                    slots_json = $3,
                    pending_intent = $4,
                    pending_message = $5,
                    awaiting = $6,
                    candidate_events = $7,
                    version = version + 1,
                    updated_at = $9
                WHERE identity = $1 AND version = $8
                "#,
            )
            .bind(&row.identity)
            .bind(&row.active_intent)
            .bind(&row.slots_json)
            .bind(&row.pending_intent)
            .bind(&row.pending_message)
            .bind(&row.awaiting)
            .bind(&row.candidate_events)
            .bind(row.version)
            .bind(now)
            .execute(&self.pool)
            .await
        };
        let result =
            result.map_err(|e| StateStoreError::Database(format!("Failed to save state: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StateStoreError::VersionConflict {
                identity: state.identity().clone(),
                expected: state.version(),
            });
        }

        Ok(row.version + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dialogue::CreateSlots;
    use chrono::NaiveTime;

    fn identity() -> Identity {
        Identity::new("5491112345678").unwrap()
    }

    fn candidate(id: &str) -> CandidateEvent {
        CandidateEvent {
            title: "Daily".into(),
            event_id: id.into(),
            display_start: "jue 13/03 10:00".into(),
            display_end: Some("jue 13/03 10:15".into()),
        }
    }

    #[test]
    fn blank_state_maps_to_empty_columns() {
        let state = ConversationState::new(identity(), Utc::now());
        let row = to_row(&state).unwrap();

        assert_eq!(row.active_intent, None);
        assert_eq!(row.slots_json, json!({}));
        assert_eq!(row.awaiting, "NONE");
        assert_eq!(row.candidate_events, json!([]));
    }

    #[test]
    fn slots_are_stored_without_the_tag() {
        let mut state = ConversationState::new(identity(), Utc::now());
        state.start_intent(Intent::Create).unwrap();
        state
            .slots_mut()
            .unwrap()
            .merge_missing(IntentSlots::Create(CreateSlots {
                title: Some("Dentista".into()),
                start_time: NaiveTime::from_hms_opt(15, 0, 0),
                ..Default::default()
            }))
            .unwrap();

        let row = to_row(&state).unwrap();

        assert_eq!(row.active_intent.as_deref(), Some("CREATE"));
        assert_eq!(row.slots_json["title"], "Dentista");
        assert_eq!(row.slots_json["start_time"], "15:00:00");
        assert_eq!(from_row(row).unwrap(), state);
    }

    #[test]
    fn pending_switch_round_trips() {
        let mut state = ConversationState::new(identity(), Utc::now());
        state.start_intent(Intent::Create).unwrap();
        state.propose_switch(Intent::Cancel, "cancelá lo de mañana").unwrap();

        let row = to_row(&state).unwrap();
        assert_eq!(row.pending_intent.as_deref(), Some("CANCEL"));
        assert_eq!(row.pending_message.as_deref(), Some("cancelá lo de mañana"));
        assert_eq!(from_row(row).unwrap(), state);
    }

    #[test]
    fn selection_round_trips() {
        let mut state = ConversationState::new(identity(), Utc::now());
        state.start_intent(Intent::Cancel).unwrap();
        state
            .await_selection(vec![candidate("a"), candidate("b")])
            .unwrap();

        let row = to_row(&state).unwrap();
        assert_eq!(row.awaiting, "EVENT_SELECTION");
        assert_eq!(row.candidate_events[1]["event_id"], "b");
        assert_eq!(from_row(row).unwrap(), state);
    }

    #[test]
    fn both_modes_at_once_is_corrupt() {
        let state = ConversationState::new(identity(), Utc::now());
        let mut row = to_row(&state).unwrap();
        row.pending_intent = Some("UPDATE".into());
        row.awaiting = "EVENT_SELECTION".into();

        assert!(matches!(from_row(row), Err(StateStoreError::Corrupt(_))));
    }

    #[test]
    fn unknown_intent_is_corrupt() {
        let state = ConversationState::new(identity(), Utc::now());
        let mut row = to_row(&state).unwrap();
        row.active_intent = Some("PLAY".into());

        assert!(matches!(from_row(row), Err(StateStoreError::Corrupt(_))));
    }
}

//! Dialogue domain: intents, slots and the per-identity conversation state.
//!
//! Everything here is pure. Collaborators (calendar, storage, messaging) are
//! reached through `crate::ports` by the application layer.

mod confirmation;
mod errors;
mod extractor;
mod intent;
pub mod normalize;
pub mod replies;
mod requirements;
mod slots;
mod state;
pub mod temporal;

pub use confirmation::Confirmation;
pub use errors::DialogueError;
pub use extractor::{Extraction, TurnContext, RuleBasedSlotExtractor, SlotExtractor};
pub use intent::{Intent, IntentClassifier, KeywordIntentClassifier};
pub use requirements::{missing_fields, MissingField};
pub use slots::{
    CancelSlots, CreateSlots, EventChanges, IntentSlots, QuerySlots, SelectionCriteria,
    UpdateSlots,
};
pub use state::{
    parse_choice, Awaiting, CandidateEvent, ConversationState, SubDialogue, SubDialogueKind,
};

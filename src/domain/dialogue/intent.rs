//! Intents and the keyword intent classifier.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::normalize::normalize;
use crate::domain::foundation::ValidationError;

/// The calendar action a user asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Create,
    QueryAvailability,
    Update,
    Cancel,
}

impl Intent {
    /// All intents in classifier evaluation order.
    pub const EVALUATION_ORDER: [Intent; 4] = [
        Intent::Create,
        Intent::Cancel,
        Intent::Update,
        Intent::QueryAvailability,
    ];

    /// Stable storage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Create => "CREATE",
            Intent::QueryAvailability => "QUERY_AVAILABILITY",
            Intent::Update => "UPDATE",
            Intent::Cancel => "CANCEL",
        }
    }

    /// Phrase used when talking to the user about this intent.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Create => "crear un evento",
            Intent::QueryAvailability => "consultar tu disponibilidad",
            Intent::Update => "modificar un evento",
            Intent::Cancel => "cancelar un evento",
        }
    }

    /// Whether the intent acts on an existing calendar event.
    pub fn targets_existing_event(&self) -> bool {
        matches!(self, Intent::Update | Intent::Cancel)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Intent::Create),
            "QUERY_AVAILABILITY" => Ok(Intent::QueryAvailability),
            "UPDATE" => Ok(Intent::Update),
            "CANCEL" => Ok(Intent::Cancel),
            other => Err(ValidationError::malformed(
                "intent",
                format!("unknown label '{}'", other),
            )),
        }
    }
}

/// Classifies a message into one of the four intents.
pub trait IntentClassifier: Send + Sync {
    /// Returns the detected intent, or `None` when no rule matches.
    fn classify(&self, text: &str) -> Option<Intent>;
}

struct RuleSet {
    intent: Intent,
    alternatives: Vec<Regex>,
}

impl RuleSet {
    fn new(intent: Intent, patterns: &[&str]) -> Self {
        Self {
            intent,
            alternatives: patterns
                .iter()
                .map(|p| Regex::new(p).expect("intent rule must compile"))
                .collect(),
        }
    }

    fn matches(&self, normalized: &str) -> bool {
        self.alternatives.iter().any(|re| re.is_match(normalized))
    }
}

// Order matters: first matching set wins.
static RULES: Lazy<Vec<RuleSet>> = Lazy::new(|| {
    vec![
        RuleSet::new(
            Intent::Create,
            &[
                r"\bcrea(r|me|lo|la)?\b",
                r"\bagend(a|ar|ame|alo|ala|emos)\b",
                r"\bprogram(a|ar|ame|alo|ala)\b",
                r"\bpon(e|er|eme|elo|ela)\b.*\b(calendario|agenda)\b",
                r"\bnuev[oa] (evento|reunion|cita|turno)\b",
                r"\banot(a|ar|ame|alo|ala)\b",
                r"\breserv(a|ar|ame)\b",
            ],
        ),
        RuleSet::new(
            Intent::Cancel,
            &[
                r"\bcancel(a|ar|alo|ala|ame|en)\b",
                r"\belimin(a|ar|alo|ala|ame)\b",
                r"\bborr(a|ar|alo|ala|ame)\b",
                r"\banul(a|ar|alo|ala)\b",
                r"\bdar de baja\b",
                r"\bsuspend(e|er|elo|ela)\b",
            ],
        ),
        RuleSet::new(
            Intent::Update,
            &[
                r"\bmov(er|e|elo|ela|erlo|erla)\b",
                r"\bmuev(e|elo|ela|as)\b",
                r"\bposterg(a|ar|alo|ala)\b",
                r"\bpospon(e|er|elo|ela)\b",
                r"\bcambi(a|ar|alo|ala|arle)\b",
                r"\breprogram(a|ar|alo|ala)\b",
                r"\bmodific(a|ar|alo|ala)\b",
                r"\bpas(ar|alo|ala)\b",
                r"\badelant(a|ar|alo|ala)\b",
                r"\brenombr(a|ar|alo|ala)\b",
            ],
        ),
        RuleSet::new(
            Intent::QueryAvailability,
            &[
                r"\bestoy (libre|ocupad[oa]|disponible)\b",
                r"\bten(go|es) (algo|libre|lugar|espacio|tiempo)\b",
                r"\bdisponib(le|ilidad)\b",
                r"\bhay (hueco|lugar|espacio)\b",
                r"\bque tengo\b",
                r"\bme queda (bien|libre)\b",
                r"\bagenda libre\b",
                r"\bhueco\b",
            ],
        ),
    ]
});

/// Ordered keyword rules over normalized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn classify(&self, text: &str) -> Option<Intent> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }

        RULES
            .iter()
            .find(|set| set.matches(&normalized))
            .map(|set| set.intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Option<Intent> {
        KeywordIntentClassifier::new().classify(text)
    }

    #[test]
    fn rule_order_matches_evaluation_order() {
        let order: Vec<Intent> = RULES.iter().map(|s| s.intent).collect();
        assert_eq!(order, Intent::EVALUATION_ORDER.to_vec());
    }

    #[test]
    fn detects_create() {
        assert_eq!(
            classify("Quiero agendar una reunión mañana a las 10"),
            Some(Intent::Create)
        );
        assert_eq!(classify("anotame el dentista el viernes"), Some(Intent::Create));
    }

    #[test]
    fn detects_cancel() {
        assert_eq!(classify("Cancelá la reunión de mañana"), Some(Intent::Cancel));
        assert_eq!(classify("borra el turno del lunes"), Some(Intent::Cancel));
    }

    #[test]
    fn detects_update() {
        assert_eq!(
            classify("mové la reunión del jueves a las 5"),
            Some(Intent::Update)
        );
        assert_eq!(classify("posterga la cita"), Some(Intent::Update));
    }

    #[test]
    fn detects_availability() {
        assert_eq!(
            classify("¿Estoy libre el viernes a la tarde?"),
            Some(Intent::QueryAvailability)
        );
        assert_eq!(
            classify("que tengo mañana"),
            Some(Intent::QueryAvailability)
        );
    }

    #[test]
    fn create_wins_over_cancel() {
        assert_eq!(
            classify("agenda una reunion y cancela la otra"),
            Some(Intent::Create)
        );
    }

    #[test]
    fn cancel_wins_over_update() {
        assert_eq!(
            classify("no la muevas, cancelala"),
            Some(Intent::Cancel)
        );
    }

    #[test]
    fn returns_none_without_keywords() {
        assert_eq!(classify("hola, como va?"), None);
        assert_eq!(classify("   "), None);
        assert_eq!(classify("mañana a las 10"), None);
    }

    #[test]
    fn intent_labels_round_trip() {
        for intent in Intent::EVALUATION_ORDER {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), intent);
        }
        assert!("PLAY".parse::<Intent>().is_err());
    }

    #[test]
    fn serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Intent::QueryAvailability).unwrap();
        assert_eq!(json, "\"QUERY_AVAILABILITY\"");
    }
}

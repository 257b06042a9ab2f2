//! Yes/no vocabulary for intent-switch confirmations.

use super::normalize::fold_words;

/// Answer to a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Affirmative,
    Negative,
}

const AFFIRMATIVE: &[&str] = &[
    "si",
    "s",
    "dale",
    "ok",
    "okay",
    "okey",
    "de una",
    "claro",
    "confirmo",
    "yes",
    "afirmativo",
    "si dale",
    "dale si",
    "si por favor",
    "si claro",
    "listo",
    "bueno",
    "va",
    "correcto",
];

const NEGATIVE: &[&str] = &[
    "no",
    "n",
    "nop",
    "nope",
    "nah",
    "no gracias",
    "mejor no",
    "negativo",
    "para nada",
    "dejalo",
    "no no",
];

impl Confirmation {
    /// Parses a reply by exact match against the vocabularies.
    ///
    /// Anything that is not exactly one of the known words is neither,
    /// so "si, pero a las 5" re-prompts instead of confirming.
    pub fn parse(text: &str) -> Option<Self> {
        let folded = fold_words(text);
        if AFFIRMATIVE.contains(&folded.as_str()) {
            Some(Confirmation::Affirmative)
        } else if NEGATIVE.contains(&folded.as_str()) {
            Some(Confirmation::Negative)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_affirmatives_regardless_of_accent_and_case() {
        for text in ["Sí", "SI", "¡dale!", "Ok", "de una", "Sí, por favor"] {
            assert_eq!(
                Confirmation::parse(text),
                Some(Confirmation::Affirmative),
                "{text}"
            );
        }
    }

    #[test]
    fn accepts_negatives() {
        for text in ["No", "no.", "Mejor no", "nah"] {
            assert_eq!(Confirmation::parse(text), Some(Confirmation::Negative), "{text}");
        }
    }

    #[test]
    fn rejects_anything_else() {
        assert_eq!(Confirmation::parse("quizás"), None);
        assert_eq!(Confirmation::parse("si, pero a las 5"), None);
        assert_eq!(Confirmation::parse(""), None);
    }
}

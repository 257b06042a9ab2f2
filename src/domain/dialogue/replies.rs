//! Fixed reply templates.
//!
//! Every user-visible sentence lives here so wording changes never touch
//! the state machine.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};

use super::requirements::MissingField;
use super::state::CandidateEvent;
use super::Intent;

pub const ALL_DAY: &str = "todo el día";

pub fn ask_intent() -> String {
    "Puedo ayudarte a crear un evento, consultar tu disponibilidad, modificar un evento o \
     cancelar un evento. ¿Qué querés hacer?"
        .to_string()
}

pub fn confirm_switch(current: Intent, proposed: Intent) -> String {
    format!(
        "Estábamos por {}. ¿Querés dejarlo y {} en su lugar? Respondé sí o no.",
        current.label(),
        proposed.label()
    )
}

pub fn confirm_switch_reprompt(proposed: Intent) -> String {
    format!(
        "No te entendí. ¿Querés {}? Respondé sí o no.",
        proposed.label()
    )
}

pub fn missing_fields(intent: Intent, fields: &[MissingField]) -> String {
    let names: Vec<&str> = fields.iter().map(MissingField::label).collect();
    format!("Para {} me falta: {}.", intent.label(), names.join(", "))
}

pub fn no_matching_events() -> String {
    "No encontré ningún evento que coincida.".to_string()
}

pub fn selection_prompt(candidates: &[CandidateEvent]) -> String {
    format!(
        "Encontré varios eventos. ¿Cuál es? Respondé con el número:\n{}",
        numbered(candidates)
    )
}

pub fn selection_reprompt(candidates: &[CandidateEvent]) -> String {
    format!(
        "Respondé con un número del 1 al {}:\n{}",
        candidates.len(),
        numbered(candidates)
    )
}

fn numbered(candidates: &[CandidateEvent]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| match &c.display_end {
            Some(end) => format!("{}. {} ({} - {})", i + 1, c.title, c.display_start, end),
            None => format!("{}. {} ({})", i + 1, c.title, c.display_start),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn retry_later() -> String {
    "Tuve un problema técnico con Google. Probemos de nuevo en un rato ✋".to_string()
}

pub fn generic_error() -> String {
    "Ups, algo salió mal procesando tu mensaje. Intentá de nuevo en un momento.".to_string()
}

pub fn consent_link_first_time(link: &str) -> String {
    format!(
        "Para conectar tu Google Calendar y poder ayudarte con tus eventos, tocá este enlace \
         seguro: {link}"
    )
}

pub fn consent_link_again(link: &str) -> String {
    format!(
        "Necesito que vuelvas a autorizar el acceso a tu Google Calendar para seguir \
         ayudándote: {link}"
    )
}

pub fn consent_link_recently_sent() -> String {
    "Te envié el enlace para conectar Google Calendar hace un momento. Revisalo y tocá para \
     continuar ✅"
        .to_string()
}

pub fn untitled_event() -> String {
    "(sin título)".to_string()
}

// === Execution summaries ===

pub fn created(title: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!("Listo, agendé «{}» {} ✅", title, span(start, end))
}

pub fn updated(title: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!("Listo, actualicé «{}»: queda {} ✅", title, span(start, end))
}

pub fn renamed(old_title: &str, new_title: &str) -> String {
    format!("Listo, «{}» ahora se llama «{}» ✅", old_title, new_title)
}

pub fn cancelled(title: &str, when: &str) -> String {
    format!("Listo, cancelé «{}» ({}) ✅", title, when)
}

pub fn free_between(start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!("Estás libre {} ✅", span(start, end))
}

pub fn busy_between(start: NaiveDateTime, end: NaiveDateTime, busy: &[(NaiveDateTime, NaiveDateTime)]) -> String {
    let lines: Vec<String> = busy
        .iter()
        .map(|(s, e)| format!("• {}", span(*s, *e)))
        .collect();
    format!(
        "Tenés ocupado {}:\n{}",
        span(start, end),
        lines.join("\n")
    )
}

pub fn event_not_found() -> String {
    "Ese evento ya no existe en tu calendario.".to_string()
}

pub fn rejected(reason: &str) -> String {
    format!("Google rechazó el cambio: {}", reason)
}

// === Formatting ===

pub fn weekday_short(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "lun",
        Weekday::Tue => "mar",
        Weekday::Wed => "mié",
        Weekday::Thu => "jue",
        Weekday::Fri => "vie",
        Weekday::Sat => "sáb",
        Weekday::Sun => "dom",
    }
}

/// "jue 13/03"
pub fn format_day(date: NaiveDate) -> String {
    format!("{} {}", weekday_short(date), date.format("%d/%m"))
}

/// "jue 13/03 10:00"
pub fn format_moment(moment: NaiveDateTime) -> String {
    format!("{} {}", format_day(moment.date()), moment.format("%H:%M"))
}

/// "el jue 13/03 de 10:00 a 11:00", or with both days when they differ.
pub fn span(start: NaiveDateTime, end: NaiveDateTime) -> String {
    if start.date() == end.date() {
        format!(
            "el {} de {} a {}",
            format_day(start.date()),
            start.format("%H:%M"),
            end.format("%H:%M")
        )
    } else {
        format!("desde el {} hasta el {}", format_moment(start), format_moment(end))
    }
}

//! Agenda Assistant - Conversational calendar management over WhatsApp
//!
//! This crate implements a turn-based dialogue manager that turns free-text
//! messages into calendar actions (create, check availability, reschedule,
//! cancel) through slot filling, intent-switch confirmation and event
//! disambiguation.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

//! Loanline API Library Crate
//!
//! This library contains all the logic for the Loanline web service: the
//! application state, configuration, REST handlers for initiating interview
//! calls, the telephony webhook handlers that drive the conversation, TwiML
//! rendering, the Twilio client, result persistence, and routing. The `api`
//! binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod phone;
pub mod router;
pub mod state;
pub mod store;
pub mod twilio;
pub mod twiml;
pub mod webhook;

//! Staffdesk — the messaging core of an internal workplace portal.
//!
//! Two authenticated roles (admin, employee) exchange person-to-person
//! messages with optional file attachments. Admins can broadcast to the
//! whole employee roster; opening an inbox is the read receipt.
//!
//! See `DESIGN.md` for architecture notes and policy decisions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod db;
pub mod logging;

pub mod attachments;
pub mod directory;
pub mod gate;
pub mod inbox;
pub mod ledger;

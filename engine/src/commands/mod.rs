//! Transport-neutral command/query surface (§6). Each function here maps
//! one-to-one onto a row of the §6 command table or onto one of the
//! read-only queries it describes; the HTTP layer that calls these is an
//! external collaborator and is not part of this crate.

pub mod campaigns;
pub mod queries;
pub mod recipients;
pub mod smtp_accounts;
pub mod templates;
pub mod users;

//! Script-callable capability registrations, one module per concern from
//! the `server` capability table.

pub mod auth;
pub mod fs;
pub mod http_client;
pub mod json_table;
pub mod jwt;
pub mod mime;
pub mod sqlite;
pub mod systime;
pub mod uuid;

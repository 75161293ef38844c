//! SQL client for a distributed relational database reached through a
//! PostgreSQL-wire endpoint.
//!
//! Input text is split into statements ([`separator`]), classified
//! ([`statement::build_statement`]), executed against a [`Session`] and
//! rendered by [`format`].

pub mod admin;
pub mod args;
pub mod complete;
pub mod config;
pub mod credentials;
pub mod decoder;
pub mod error;
pub mod format;
pub mod history;
pub mod path;
pub mod repl;
pub mod result;
pub mod runner;
pub mod separator;
pub mod session;
pub mod statement;

pub use admin::{AdminClient, Operation, UpdateDatabaseDdlRequest};
pub use config::ClientConfig;
pub use credentials::Credentials;
pub use error::{CliError, CliResult};
pub use path::DatabasePath;
pub use result::{ResultSet, Row, Stats};
pub use session::{Session, TransactionState};
pub use statement::{build_statement, Statement};

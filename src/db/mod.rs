//! SQLite persistence: pool initialization with pragmas, the embedded
//! schema migrations, and the repository both ledgers read and write
//! through.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;

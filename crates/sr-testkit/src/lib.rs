//! sr-testkit
//!
//! In-memory fakes for the bus cursor and database reader, used by
//! `sr-recon`'s and `sr-cli`'s scenario tests in place of a live broker and
//! warehouse. Mirrors the shape of the real transports in `sr-bus`/`sr-db`
//! exactly, so a scenario test swaps one for the other with no other change.

mod fake_bus;
mod fake_db;

pub use fake_bus::FakeBusSource;
pub use fake_db::FakeDatabaseReader;

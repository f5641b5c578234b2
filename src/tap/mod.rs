//! Session and asynchronous job protocol for the APPLAUSE TAP service.
//!
//! This module provides an authenticated [`TapSession`] bound to the archive's
//! TAP endpoint and the UWS job machinery that executes ADQL queries through
//! it.
//!
//! # Example
//!
//! ```no_run
//! use applause_query::TapSession;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = TapSession::new(None)?;
//! let table = session
//!     .run_async("SELECT TOP 10 plate_id FROM applause_dr3.plate")
//!     .await?;
//! for row in 0..table.n_rows() {
//!     println!("{:?}", table.value(row, "plate_id"));
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod job;
mod session;

pub use error::TapError;
pub use job::{AsyncJob, JobPhase, QueryOptions};
pub use session::{DEFAULT_RESULT_DELAY, TAP_BASE_URL, TapSession};

//! APPLAUSE Archive Client Library
//!
//! This library provides client access to the APPLAUSE plate archive: ADQL
//! queries executed through the archive's Table Access Protocol (TAP) service,
//! and direct downloads of binary artifacts such as plate scans and logbook
//! pages.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`tap`] - Session, authentication, and the asynchronous (UWS) job protocol
//! - [`votable`] - VOTable result parsing into generic [`Table`] values
//! - [`download`] - Direct file retrieval from the archive web server
//! - [`dr3`] - Query producers for the DR3 data release (lightcurves)

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod dr3;
pub mod tap;
pub mod votable;

// Re-export commonly used types
pub use download::{FILES_BASE_URL, FileDownloader, download_file};
pub use tap::{
    AsyncJob, DEFAULT_RESULT_DELAY, JobPhase, QueryOptions, TAP_BASE_URL, TapError, TapSession,
};
pub use votable::Table;

//! Query producers for the APPLAUSE third data release (DR3).
//!
//! These helpers build ADQL query strings for common DR3 lookups and hand
//! them to a [`TapSession`](crate::TapSession); they never touch the job
//! protocol themselves.

mod lightcurve;

pub use lightcurve::lc_by_ucac4_id;

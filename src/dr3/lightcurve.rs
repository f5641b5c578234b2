//! Lightcurve retrieval from the DR3 lightcurve table.

use crate::tap::{TapError, TapSession};
use crate::votable::Table;

/// Retrieves a basic lightcurve for a UCAC4 reference star.
///
/// The result carries the observation date (`jd_mid`, julian date) and the B
/// and V photometric magnitudes with their errors, rows with incomplete
/// photometry filtered out, ordered by observation date ascending. The
/// ordering is enforced by the query itself.
///
/// `ucac4_id` is a UCAC4 identifier in `XXX-YYYYYY` format, e.g.
/// `104-010297`.
///
/// # Errors
///
/// Propagates any [`TapError`] from the query execution; the UCAC4 id is not
/// validated client-side.
pub async fn lc_by_ucac4_id(session: &TapSession, ucac4_id: &str) -> Result<Table, TapError> {
    session.run_async(&lightcurve_query(ucac4_id)).await
}

/// Builds the ADQL query for [`lc_by_ucac4_id`].
fn lightcurve_query(ucac4_id: &str) -> String {
    format!(
        "SELECT jd_mid,bmag,bmagerr,vmag,vmagerr \
         FROM applause_dr3.lightcurve \
         WHERE bmag IS NOT NULL \
         AND bmagerr IS NOT NULL \
         AND vmag IS NOT NULL \
         AND vmagerr IS NOT NULL \
         AND ucac4_id='{ucac4_id}' \
         ORDER BY jd_mid"
    )
}

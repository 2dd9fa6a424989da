//! Best-effort deactivation of ledgered resources

use probe_core::{ApiSession, LedgerEntry};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct CleanupFailure {
    pub entry: LedgerEntry,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub attempted: usize,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Issue the deactivation call for every entry, in creation order.
///
/// A failed call is logged and recorded; it never stops the remaining
/// entries from being attempted and is never returned as an error.
#[instrument(skip_all, fields(entries = entries.len()))]
pub async fn deactivate_all(session: &ApiSession, entries: Vec<LedgerEntry>) -> CleanupReport {
    let mut report = CleanupReport::default();

    for entry in entries {
        report.attempted += 1;
        let deactivation = entry.deactivation();
        let reason = match session.send(deactivation.method.clone(), &deactivation.url, None).await {
            Ok(response) if response.status.is_success() => {
                debug!(kind = %entry.kind, key = %entry.key, version = %entry.version, "Resource deactivated");
                continue;
            }
            Ok(response) => format!(
                "{} {} returned {}",
                deactivation.method, deactivation.url, response.status
            ),
            Err(e) => e.to_string(),
        };

        warn!(
            kind = %entry.kind,
            key = %entry.key,
            version = %entry.version,
            reason = %reason,
            "Cleanup failed"
        );
        report.failures.push(CleanupFailure { entry, reason });
    }

    report
}

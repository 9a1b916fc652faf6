use catalog_common::types::{DbRow, RateLimitRow};

use crate::store::{StoreClient, StoreError};

/// Provider-refresh lifecycle. Every non-terminal state has one success
/// edge; every state can fall to its matching error state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    ExtractingExternal,
    Resolving,
    Fusing,
    BackingUp,
    Deleting,
    Inserting,
    Verifying,
    RateLimitsUpsert,
    Done,
    // Terminal error states.
    AbortedNoMutation,
    RestoredFromBackup,
    InconsistentRequiresManual,
}

impl RefreshState {
    pub fn as_report_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ExtractingExternal => "ExtractingExternal",
            Self::Resolving => "Resolving",
            Self::Fusing => "Fusing",
            Self::BackingUp => "Backing-Up",
            Self::Deleting => "Deleting",
            Self::Inserting => "Inserting",
            Self::Verifying => "Verifying",
            Self::RateLimitsUpsert => "RateLimitsUpsert",
            Self::Done => "Done",
            Self::AbortedNoMutation => "AbortedNoMutation",
            Self::RestoredFromBackup => "RestoredFromBackup",
            Self::InconsistentRequiresManual => "InconsistentRequiresManual",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::AbortedNoMutation | Self::RestoredFromBackup | Self::InconsistentRequiresManual
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::AbortedNoMutation | Self::RestoredFromBackup | Self::InconsistentRequiresManual
        )
    }
}

/// What a refresh run ended as, with the numbers the report needs.
#[derive(Clone, Debug)]
pub struct RefreshOutcome {
    pub state: RefreshState,
    pub initial_count: i64,
    pub backed_up: usize,
    pub inserted: usize,
    pub final_count: i64,
    pub log: Vec<String>,
}

impl RefreshOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == RefreshState::Done
    }
}

/// Refresh one provider slice of the working table:
/// backup → delete → batched insert → exact-count verify, restoring the
/// backup on any failure after the delete commits.
pub async fn refresh_slice(
    store: &StoreClient,
    table: &str,
    provider: &str,
    prepared: &[DbRow],
    batch_size: usize,
) -> Result<RefreshOutcome, StoreError> {
    run_protocol(store, table, provider, prepared, batch_size, CountCheck::Exact).await
}

pub(crate) enum CountCheck {
    Exact,
    /// Allowed absolute deviation, for the production promoter.
    Tolerance(i64),
}

pub(crate) async fn run_protocol(
    store: &StoreClient,
    table: &str,
    provider: &str,
    prepared: &[DbRow],
    batch_size: usize,
    check: CountCheck,
) -> Result<RefreshOutcome, StoreError> {
    let mut outcome = RefreshOutcome {
        state: RefreshState::BackingUp,
        initial_count: 0,
        backed_up: 0,
        inserted: 0,
        final_count: 0,
        log: Vec::new(),
    };
    let log = |outcome: &mut RefreshOutcome, line: String| {
        tracing::info!(provider = provider, table = table, "{line}");
        outcome.log.push(line);
    };

    // Read and backup. Failure here aborts before any mutation.
    outcome.initial_count = match store.count_slice(table, provider).await {
        Ok(count) => count,
        Err(e) => {
            outcome.state = RefreshState::AbortedNoMutation;
            log(&mut outcome, format!("Initial count failed: {e}"));
            return Ok(outcome);
        }
    };
    let initial_count_msg = format!("Initial count: {}", outcome.initial_count);
    log(&mut outcome, initial_count_msg);

    let backup = match store.backup_slice(table, provider).await {
        Ok(rows) => rows,
        Err(e) => {
            outcome.state = RefreshState::AbortedNoMutation;
            log(&mut outcome, format!("Backup failed, aborting before mutation: {e}"));
            return Ok(outcome);
        }
    };
    outcome.backed_up = backup.len();
    log(&mut outcome, format!("Backed up {} rows", backup.len()));

    // Delete the slice. The delete commits on its own; the refresh window
    // is non-atomic by design.
    outcome.state = RefreshState::Deleting;
    match store.delete_slice(table, provider).await {
        Ok(deleted) => log(&mut outcome, format!("Deleted {deleted} rows")),
        Err(e) => {
            outcome.state = RefreshState::AbortedNoMutation;
            log(&mut outcome, format!("Delete failed, no mutation committed: {e}"));
            return Ok(outcome);
        }
    }

    // Insert prepared rows in committed batches.
    outcome.state = RefreshState::Inserting;
    match store.insert_rows(table, prepared, batch_size).await {
        Ok(inserted) => {
            outcome.inserted = inserted;
            log(&mut outcome, format!("Inserted {inserted} rows"));
        }
        Err(e) => {
            log(&mut outcome, format!("Insert failed: {e}"));
            return restore(store, table, provider, &backup, batch_size, outcome).await;
        }
    }

    // Verify.
    outcome.state = RefreshState::Verifying;
    outcome.final_count = match store.count_slice(table, provider).await {
        Ok(count) => count,
        Err(e) => {
            log(&mut outcome, format!("Verification count failed: {e}"));
            return restore(store, table, provider, &backup, batch_size, outcome).await;
        }
    };

    let expected = prepared.len() as i64;
    let within = match check {
        CountCheck::Exact => outcome.final_count == expected,
        CountCheck::Tolerance(allowed) => (outcome.final_count - expected).abs() <= allowed,
    };
    if !within {
        let mismatch_msg = format!(
            "Verification mismatch: expected {expected}, found {}",
            outcome.final_count
        );
        log(&mut outcome, mismatch_msg);
        metrics::counter!("catalog.sync.verify_mismatch").increment(1);
        return restore(store, table, provider, &backup, batch_size, outcome).await;
    }
    let verified_msg = format!("Verified {} rows", outcome.final_count);
    log(&mut outcome, verified_msg);

    outcome.state = RefreshState::Done;
    metrics::counter!("catalog.sync.refresh_done").increment(1);
    Ok(outcome)
}

/// Rollback-restore: clear whatever the failed insert left behind and
/// re-insert the backup through the same batching path.
async fn restore(
    store: &StoreClient,
    table: &str,
    provider: &str,
    backup: &[crate::store::WorkingRow],
    batch_size: usize,
    mut outcome: RefreshOutcome,
) -> Result<RefreshOutcome, StoreError> {
    tracing::warn!(provider = provider, table = table, "Restoring slice from backup");

    let cleanup = store.delete_slice(table, provider).await;
    let reinsert = match cleanup {
        Ok(_) => store.insert_backup_rows(table, backup, batch_size).await,
        Err(e) => Err(e),
    };

    match reinsert {
        Ok(restored) => {
            outcome
                .log
                .push(format!("Restored {restored} rows from backup"));
            outcome.state = RefreshState::RestoredFromBackup;
            metrics::counter!("catalog.sync.restored").increment(1);
        }
        Err(e) => {
            outcome
                .log
                .push(format!("Restore failed, manual intervention required: {e}"));
            outcome.state = RefreshState::InconsistentRequiresManual;
            metrics::counter!("catalog.sync.inconsistent").increment(1);
        }
    }
    Ok(outcome)
}

/// Best-effort rate-limits table update after a successful refresh:
/// delete the provider slice, then upsert each prepared row. Failures are
/// warnings, never errors.
pub async fn update_rate_limits(
    store: &StoreClient,
    table: &str,
    provider: &str,
    rows: &[RateLimitRow],
) -> bool {
    if let Err(e) = store.delete_rate_limits(table, provider).await {
        tracing::warn!(error = %e, "Rate-limits delete failed (non-fatal)");
        return false;
    }
    match store.upsert_rate_limits(table, rows).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Rate-limits upsert failed (non-fatal)");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RefreshState::Done.is_terminal());
        assert!(RefreshState::RestoredFromBackup.is_terminal());
        assert!(RefreshState::AbortedNoMutation.is_terminal());
        assert!(RefreshState::InconsistentRequiresManual.is_terminal());
        assert!(!RefreshState::Inserting.is_terminal());
        assert!(!RefreshState::BackingUp.is_terminal());
    }

    #[test]
    fn test_error_states() {
        assert!(!RefreshState::Done.is_error());
        assert!(RefreshState::RestoredFromBackup.is_error());
        assert!(RefreshState::InconsistentRequiresManual.is_error());
    }

    #[test]
    fn test_report_names() {
        assert_eq!(RefreshState::BackingUp.as_report_str(), "Backing-Up");
        assert_eq!(
            RefreshState::RestoredFromBackup.as_report_str(),
            "RestoredFromBackup"
        );
    }
}

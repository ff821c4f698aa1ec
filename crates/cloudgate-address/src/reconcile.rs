//! Freshness checks of local records against backend state
//!
//! Floating IPs can be deleted out-of-band, directly on the backend. A local
//! record whose floating IP is gone is stale: lookups treat it as absent and
//! listings purge it.

use crate::model::AddressRecord;
use cloudgate_cloud::{FloatingIp, NetworkBackend, RecordStore, Result};

/// Whether the record's floating IP still exists on the backend
///
/// Backend errors other than not-found propagate.
pub async fn is_valid(backend: &dyn NetworkBackend, record: &AddressRecord) -> Result<bool> {
    match backend.get_floating_ip(&record.os_id).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => {
            tracing::debug!(
                "Floating IP {} of record {} is gone from the backend",
                record.os_id,
                record.id
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Result of joining local records with the backend floating IP list
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Records paired with their floating IP, in record order
    pub matched: Vec<(AddressRecord, FloatingIp)>,

    /// Records whose floating IP no longer exists
    pub stale: Vec<AddressRecord>,

    /// Floating IPs with no local record, in backend order
    pub unmanaged: Vec<FloatingIp>,
}

/// Join records with floating IPs by backend id
pub fn reconcile(records: Vec<AddressRecord>, floating_ips: Vec<FloatingIp>) -> Reconciliation {
    let mut remaining = floating_ips;
    let mut result = Reconciliation::default();

    for record in records {
        match remaining.iter().position(|ip| ip.id == record.os_id) {
            Some(pos) => {
                let floating_ip = remaining.remove(pos);
                result.matched.push((record, floating_ip));
            }
            None => result.stale.push(record),
        }
    }

    result.unmanaged = remaining;
    result
}

/// Delete stale records; failures are logged and skipped
///
/// Returns the number of records removed.
pub async fn purge(store: &dyn RecordStore, stale: &[AddressRecord]) -> usize {
    let mut purged = 0;
    for record in stale {
        match store.delete(record.id).await {
            Ok(()) => {
                tracing::warn!(
                    "Purged address record {} ({}): floating IP {} vanished from the backend",
                    record.id,
                    record.public_ip,
                    record.os_id
                );
                purged += 1;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!("Failed to purge stale address record {}: {}", record.id, e);
            }
        }
    }
    purged
}

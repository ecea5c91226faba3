use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{debug, info};

use crate::error::Result;
use crate::store::StateStore;

/// Deletes every stored pipeline whose state was last written before
/// `now - max_age`. Returns how many entries were removed; a `max_age`
/// reaching past the earliest representable time expires nothing.
///
/// # Errors
///
/// Returns an error if the store cannot be listed or a delete fails.
pub async fn prune<S: StateStore + ?Sized>(
    store: &S,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<usize> {
    let Some(cutoff) = now.checked_sub_signed(max_age) else {
        debug!("Retention of {max_age} reaches before the earliest representable time; nothing expired");
        return Ok(0);
    };
    let expired: Vec<_> = store
        .list()
        .await?
        .into_iter()
        .filter(|entry| entry.updated_at < cutoff)
        .collect();

    debug!("{} of the stored pipelines are older than {cutoff}", expired.len());

    let results = join_all(expired.iter().map(|entry| store.delete(entry.pipeline_id))).await;

    let mut removed = 0;
    for result in results {
        if result? {
            removed += 1;
        }
    }

    info!("Pruned {removed} pipeline(s)");
    Ok(removed)
}

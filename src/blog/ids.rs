use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Time-ordered, process-unique id: the current epoch milliseconds, bumped
/// past the last id handed out when two calls land in the same millisecond.
///
/// Uniqueness only holds within one process. Two processes writing to the
/// same database file (a running `solo serve` and a CLI command) can mint
/// the same id in the same millisecond, so only one of them may create
/// rows at a time.
pub fn next_id() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_ID.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return candidate.to_string(),
            Err(actual) => last = actual,
        }
    }
}

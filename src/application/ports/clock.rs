/// Device clock used to stamp field writes and to schedule queue retries.
///
/// Implementations must never go backwards: two successive calls return
/// non-decreasing unix-millisecond values.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

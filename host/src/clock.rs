/// A free-running monotonic clock with microsecond resolution.
///
/// The implementation may start at any point (normally boot). Readings must
/// never go backwards.
pub trait Clock {
    /// Microseconds since an arbitrary fixed point.
    fn now_us(&self) -> u64;

    /// Milliseconds since the same fixed point as [`Clock::now_us`].
    fn now_ms(&self) -> u64 {
        self.now_us() / 1_000
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

use core::fmt::{self, Display, Formatter};

/// Emit one per-period trace line if tracing is switched on with
/// [`set_trace`](crate::set_trace).
///
/// The closure only runs when the line is actually written, so formatting
/// cost stays out of the control period otherwise.
pub fn sample<F>(f: F)
where
    F: Fn(&mut Formatter) -> fmt::Result,
{
    struct Shim<F>(F);

    impl<F> Display for Shim<F>
    where
        F: Fn(&mut Formatter) -> fmt::Result,
    {
        fn fmt(&self, f: &mut Formatter) -> fmt::Result {
            (self.0)(f)
        }
    }

    if crate::trace_enabled() {
        log::trace!("[S] {}", Shim(f));
    }
}

//! Tracing helpers

/// Enter a trace-level span for the rest of the enclosing scope
///
/// ```text
/// let _span = perf_span!("vm_run", start_pc);
/// ```
macro_rules! perf_span {
    ($name:expr) => {
        tracing::trace_span!($name).entered()
    };
    ($name:expr, $($fields:tt)+) => {
        tracing::trace_span!($name, $($fields)+).entered()
    };
}

pub(crate) use perf_span;

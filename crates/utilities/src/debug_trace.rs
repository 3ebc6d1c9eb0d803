//! Tracing for the hot paths of the term store (every construction, retain
//! and release). Compiled away unless the `hashcons_debug-trace` feature is enabled.

/// Forwards to [log::trace] when the `hashcons_debug-trace` feature is enabled,
/// and expands to nothing otherwise.
///
/// # Examples
///
/// ```
/// use hashcons_utilities::debug_trace;
///
/// let index = 3;
/// debug_trace!("Reclaimed node {}", index);
/// ```
#[macro_export]
#[cfg(feature = "hashcons_debug-trace")]
macro_rules! debug_trace {
    ($($arg:tt)*) => {
        {
            log::trace!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "hashcons_debug-trace"))]
macro_rules! debug_trace {
    ($($arg:tt)*) => {{}};
}

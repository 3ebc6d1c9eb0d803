use core::error::Error;
use core::fmt::Debug;
use core::fmt::Display;
use std::backtrace::Backtrace;
use std::backtrace::BacktraceStatus;

/// The catch-all error of the term store crates. Any type implementing
/// [`Error`] converts into it through `?`, and a backtrace is captured at the
/// point of conversion.
///
/// Only recoverable failures travel through this type. Violations of the
/// store invariants (reference count underflow, stale symbol identifiers,
/// unregistered roots) panic instead.
pub struct HashconsError {
    inner: Box<ErrorContext>,
}

/// Kept behind a single box so that `Result<T, HashconsError>` stays one word larger than `T`.
struct ErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>,
    backtrace: Backtrace,
}

impl HashconsError {
    /// Returns the underlying error if it has type `E`.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.source.downcast_ref::<E>()
    }

    /// Returns the backtrace captured when the error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }
}

// Converting through the boxed trait object also gives From<&str> and From<String>.
impl<E> From<E> for HashconsError
where
    Box<dyn Error + Send + Sync + 'static>: From<E>,
{
    #[cold]
    fn from(error: E) -> Self {
        HashconsError {
            inner: Box::new(ErrorContext {
                source: error.into(),
                backtrace: Backtrace::capture(),
            }),
        }
    }
}

impl Display for HashconsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.inner.source)
    }
}

impl Debug for HashconsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{:?}", self.inner.source)?;
        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            writeln!(f, "{}", self.inner.backtrace)?;
        }

        Ok(())
    }
}

//! Redirect capability used when the server rejects credentials.

use std::fmt;

/// Route the client sends users to after a 401.
pub const LOGIN_ROUTE: &str = "/login";

/// Something that can move the user to another route.
///
/// Browser front ends implement this on top of their history API. Headless
/// callers use [`NoopNavigator`].
pub trait Navigator: Send + Sync {
    /// Navigates to `location`.
    fn redirect(&self, location: &str);
}

/// A navigator that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect(&self, location: &str) {
        tracing::trace!(location = %location, "Redirect ignored outside a browser context");
    }
}

/// Adapts a closure into a [`Navigator`].
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tessera::navigator::{FnNavigator, Navigator};
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = hits.clone();
/// let navigator = FnNavigator::new(move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// navigator.redirect("/login");
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
pub struct FnNavigator<F> {
    f: F,
}

impl<F> FnNavigator<F>
where
    F: Fn(&str) + Send + Sync,
{
    /// Wraps `f` as a navigator.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Navigator for FnNavigator<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn redirect(&self, location: &str) {
        (self.f)(location)
    }
}

impl<F> fmt::Debug for FnNavigator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnNavigator").finish_non_exhaustive()
    }
}

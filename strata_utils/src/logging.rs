/// Panics in debug builds, logs an error in release builds.
///
/// Used for invariant violations that should be loud during development but must not take
/// down a running frame loop.
#[macro_export]
macro_rules! debug_panic {
    ($($arg:tt)*) => ( if cfg!(debug_assertions) { panic!($($arg)*); } else { $crate::tracing::error!($($arg)*); } );
}

/// Logs a warning only the first time the call site is reached.
#[macro_export]
macro_rules! warn_once {
    ($($arg:tt)*) => {{
        static WARNED: ::std::sync::atomic::AtomicBool = ::std::sync::atomic::AtomicBool::new(false);
        if !WARNED.swap(true, ::std::sync::atomic::Ordering::Relaxed) {
            $crate::tracing::warn!($($arg)*);
        }
    }};
}

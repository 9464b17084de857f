/// Log an error message unless the verbosity is [`Verbosity::Silent`].
///
/// [`Verbosity::Silent`]: crate::Verbosity::Silent
macro_rules! print_error {
    ($verbosity:expr, $($arg:tt)+) => {
        if $verbosity >= $crate::Verbosity::Errors {
            log::error!(target: "dvdcss", $($arg)+);
        }
    };
}

/// Log a debug message when the verbosity is [`Verbosity::Debug`].
///
/// [`Verbosity::Debug`]: crate::Verbosity::Debug
macro_rules! print_debug {
    ($verbosity:expr, $($arg:tt)+) => {
        if $verbosity >= $crate::Verbosity::Debug {
            log::debug!(target: "dvdcss", $($arg)+);
        }
    };
}

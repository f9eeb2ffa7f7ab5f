/// Print to stderr ahead of tracing initialization.
#[macro_export]
macro_rules! bootstrap {
    ($x:expr $( , $xs:expr )* $(,)?) => {
        eprintln!(concat!("[gslink] ", $x) $( , $xs )*)
    };
}

/// Log the error of a `Result` without consuming it.
#[macro_export]
macro_rules! trace_catch {
    (parent: $parent:expr, $val:expr, $($rest:tt)*) => {
        if let Err(ref e) = $val {
            ::tracing::error!(parent: $parent, error = %e, $($rest)*);
        }
    };

    ($val:expr, $($rest:tt)*) => {
        if let Err(ref e) = $val {
            ::tracing::error!(error = %e, $($rest)*);
        }
    };
}

/// Like [`trace_catch`], at warn level.
#[macro_export]
macro_rules! trace_warn {
    ($val:expr, $($rest:tt)*) => {
        if let Err(ref e) = $val {
            ::tracing::warn!(error = %e, $($rest)*);
        }
    };
}

#[macro_export]
macro_rules! bootstrap {
    ($x:expr $( , $xs:expr )* $(,)?) => {
        eprintln!(concat!("[roplink bootstrap] ", $x) $( , $xs )*)
    };
}

/// Log the error of a `Result` without consuming it.
#[macro_export]
macro_rules! trace_catch {
    (level: warn, $val:expr, $($rest:tt)*) => {
        if let Err(ref e) = $val {
            ::tracing::warn!(error = %e, $($rest)*);
        }
    };

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

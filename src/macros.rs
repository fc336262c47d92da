/// Writes a single line to a `Logger`. The logger decides whether the line
/// ends up anywhere at all (see `DummyLogger`).
#[cfg(not(feature = "no_logging"))]
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {{
        if let Some(w) = $logger.line_writer() {
            let _ = std::io::Write::write_fmt(w, format_args!("{}\n", format_args!($($arg)*)));
        }
    }};
}

#[cfg(feature = "no_logging")]
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {{
        let _ = &$logger;
    }};
}

/// Compile-time switchable debug printing. Modules define their own
/// `debug_log!` on top of this with a constant `true`/`false`.
macro_rules! enabled_debug_print {
    (false, $name:literal, $format:literal) => {};
    (false, $name:literal, $format:literal, $($args:expr),*) => {};
    (true, $name:literal, $format:literal) => {
        println!("[{}] {}", $name, $format)
    };
    (true, $name:literal, $format:literal, $($args:expr),*) => {
        println!("[{}] {}", $name, format!($format, $($args),*))
    };
}

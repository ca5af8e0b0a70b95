use std::time::Duration;

#[macro_export]
macro_rules! exit_error {
    ($($arg:tt)+) => {
        {
            log::error!($($arg)+);
            std::process::exit(1)
        }
    }
}

// Human readable throttling delay, e.g. "250ms" or "disabled".
pub fn format_delay(delay: Option<Duration>) -> String {
    match delay {
        Some(delay) => humantime::format_duration(delay).to_string(),
        None => String::from("disabled"),
    }
}

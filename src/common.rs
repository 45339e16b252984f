pub(crate) mod builder_utils;
pub(crate) mod concurrent;
pub(crate) mod error;
pub(crate) mod expiry_scheduler;
pub(crate) mod time;

pub(crate) fn thread_name(prefix: &str, map_name: Option<&str>) -> String {
    match map_name {
        Some(name) => format!("{prefix}-{name}"),
        None => prefix.to_string(),
    }
}

pub(crate) fn log_prefix(map_name: Option<&str>) -> String {
    map_name
        .map(|name| format!("[{name}] "))
        .unwrap_or_default()
}

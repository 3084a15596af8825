//! logger.rs — scoped console logging
//!
//! Thin scope-tagged wrappers over the `log` facade; `uefi_services::init`
//! installs the console backend, so everything emitted here lands on the
//! firmware text output until ExitBootServices. After that point nothing
//! may log.

#[inline]
pub fn log_debug(scope: &str, message: &str) {
    ::log::debug!("[{}] {}", scope, message);
}

#[inline]
pub fn log_info(scope: &str, message: &str) {
    ::log::info!("[{}] {}", scope, message);
}

#[inline]
pub fn log_warn(scope: &str, message: &str) {
    ::log::warn!("[{}] {}", scope, message);
}

#[inline]
pub fn log_error(scope: &str, message: &str) {
    ::log::error!("[{}] {}", scope, message);
}

#[inline]
pub fn log_critical(scope: &str, message: &str) {
    ::log::error!("[{}] CRITICAL: {}", scope, message);
}

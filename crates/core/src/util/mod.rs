pub mod retry;

#[cfg(test)]
pub(crate) mod log_capture;

pub use retry::{is_loading_status, RetryPolicy, LOADING_STATUS};

use std::env;
use std::sync::OnceLock;

static HEAP_DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Check if the HEAP_DEBUG environment variable is set and print the
/// message if it is. The environment check is cached on first call.
#[inline]
pub(crate) fn heap_debug(msg: &str) {
    let enabled = *HEAP_DEBUG_ENABLED.get_or_init(|| env::var("HEAP_DEBUG").is_ok());
    if enabled {
        println!("HEAP_DEBUG: {}", msg);
    }
}

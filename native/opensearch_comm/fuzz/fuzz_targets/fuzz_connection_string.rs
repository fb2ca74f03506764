#![no_main]
//! Fuzz connection string parsing and option validation

use libfuzzer_sys::fuzz_target;
use opensearch_comm::ConnectionConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(conn_str) = std::str::from_utf8(data) {
        let config = ConnectionConfig::from_connection_string(conn_str);
        if config.validate().is_ok() {
            let _ = config.base_url();
            let _ = config.response_timeout();
        }
    }
});

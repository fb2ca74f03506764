#![no_main]
//! Fuzz the page decoders with arbitrary response bodies

use libfuzzer_sys::fuzz_target;
use opensearch_comm::decode::{parse_column_names, parse_cursor_page, parse_query_page};

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        if let Ok(page) = parse_query_page(body) {
            // Every first page describes its columns as keyword columns
            assert!(page.columns.iter().all(|c| c.type_oid == 1043));
            assert!(page.cursor.as_deref().map_or(true, |c| !c.is_empty()));
        }
        if let Ok(page) = parse_cursor_page(body) {
            assert!(page.columns.is_empty());
        }
        let _ = parse_column_names(body);
    }
});

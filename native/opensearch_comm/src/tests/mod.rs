//! Unit and integration tests for opensearch_comm
//!
//! This module organizes all tests into logical submodules that correspond to the
//! main library modules. Everything runs against an in-process scripted transport.


mod auth_tests;
mod decode_tests;
mod error_tests;
mod proptest_tests;
mod query_tests;

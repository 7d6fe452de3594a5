//! Integration tests for commands-next.

pub mod common;
pub mod concurrency_test;
pub mod dispatch_test;
pub mod scope_test;

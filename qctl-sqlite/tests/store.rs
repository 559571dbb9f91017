//! Store conformance suite, shared with any other backend.

mod common;

qctl::generate_store_spec_tests! {
    backend = "sqlite",
    test_attr = #[tokio::test],
    setup = common::memory_store()
}

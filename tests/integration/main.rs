//! Integration tests for the permission resolver, tree invariants, the bulk
//! engine and directory listings, run against the in-memory store.

mod helpers;

mod bulk_test;
mod invariant_test;
mod listing_test;
mod permission_test;

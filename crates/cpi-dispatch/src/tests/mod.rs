//! Behavioural test suites for the dispatch core.

//! Unit tests for startup wiring and the in-process harness.

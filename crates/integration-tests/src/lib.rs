//! End-to-end tests for the engine live under `tests/`; this crate carries
//! no library code of its own.

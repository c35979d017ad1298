//! End-to-end tests for the KSL workspace live under `tests/`.

//! Integration tests for the rudp workspace live in `tests/`.

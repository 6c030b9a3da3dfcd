//! Tests for value conversion and batch emission

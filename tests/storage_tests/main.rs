//! Tests for pool management and the directory registry

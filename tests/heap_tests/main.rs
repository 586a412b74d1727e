//! Tests for the durable heap
//!
//! - `pool_tests`: create/open, transactions, recovery, capacity
//! - `transaction_tests`: staging rules for allocate/free/set_child

mod transaction_tests;

pub mod common;
mod queue_tests;

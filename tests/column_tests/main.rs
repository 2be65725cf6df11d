//! Column codec tests

mod value_tests;

//! Test suite for the interception middleware.

mod helpers;

mod gate_tests;

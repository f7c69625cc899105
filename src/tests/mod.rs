//! Test modules for the ferry-tracker binary.

mod acquisition_tests;

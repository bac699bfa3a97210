mod common;
mod engine_tests;
mod inject_tests;
mod tailor_tests;

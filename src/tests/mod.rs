// Test modules for CourseChat
// Each module tests the corresponding source file; shared fakes live in helpers

mod auth_tests;
mod catalog_tests;
mod helpers;

pub mod assignments;
pub mod classes;
pub mod core;
pub mod grading;
pub mod roster;
pub mod rubrics;
pub mod setup;

pub mod failpoints;
pub mod rows;
pub mod system;

pub mod process;
pub mod registry;

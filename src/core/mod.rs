pub mod draft;
pub mod task;

pub mod draft;
pub mod slots;
pub mod steps;
pub mod store;
pub mod submission;
pub mod wizard;

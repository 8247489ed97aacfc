pub mod dataset;
pub mod fetch;
pub mod graph_utils;
pub mod layout;
pub mod persistence;
pub mod store;
pub mod viz;

#[cfg(feature = "gui")]
pub mod gui;

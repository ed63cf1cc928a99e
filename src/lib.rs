pub mod console;
pub mod graph_utils;
pub mod ids;
pub mod persistence;
pub mod session;

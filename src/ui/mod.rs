//! Terminal front end for a session

pub mod console;

pub use console::ConsoleDashboard;

pub mod api;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod llm;
pub mod readings;
pub mod recommendations;
pub mod time_window;

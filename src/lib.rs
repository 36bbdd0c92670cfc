pub mod api;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod tns;

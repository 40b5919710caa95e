pub mod recovery;
pub mod settings;
pub mod start;
pub mod web;

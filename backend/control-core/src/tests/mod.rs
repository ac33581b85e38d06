mod command;
mod config;
mod error;
mod response;

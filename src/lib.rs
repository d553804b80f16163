#[macro_use] extern crate log;

pub mod config;
pub mod context;
pub mod logger;
pub mod mime;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;
pub mod utils;

mod common;
mod history;
mod service;

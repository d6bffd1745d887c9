pub mod app;
pub mod checks;
pub mod checksum;
pub mod config;
pub mod doi;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod normalize;
pub mod output;
pub mod target;
pub mod tools;

pub mod app;
pub mod bed;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod genomedata;
pub mod input_json;
pub mod labels;
pub mod portal;
pub mod select;
pub mod trackname;

#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod data_processor;
pub mod doctree;
pub mod error;
pub mod traits;
pub mod types;

pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod export;
pub mod metadata;
pub mod model;
pub mod reader;
pub mod report;
pub mod schema;
pub mod session;
pub mod tree;
pub mod view;
pub mod writer;
pub mod xml;

pub mod container;
pub mod metadata;
pub mod service;

pub mod manifest;
pub mod sample_loader;

//! CLI command implementations

pub mod unmount;

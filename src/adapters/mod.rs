//! Adapters implementing domain ports.
//!
//! This module contains infrastructure implementations of the traits defined
//! in the ports module. Following hexagonal architecture, adapters depend on
//! domain ports, not the other way around.

pub mod file_repository;
pub mod in_memory_repository;

pub use file_repository::FileRepository;
pub use in_memory_repository::InMemoryRepository;

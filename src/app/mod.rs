//! Application layer with dependency injection container.
//!
//! This module provides the dependency injection infrastructure for the
//! agent, following hexagonal architecture principles. The container owns
//! infrastructure dependencies and provides factory methods for creating
//! domain objects.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           Application Layer (app)           │
//! │  ┌──────────────────────────────────────┐   │
//! │  │       App (DI Container)             │   │
//! │  └──────────────┬───────────────────────┘   │
//! │                 │ owns                       │
//! │                 ▼                            │
//! │  ┌──────────────────────────────────────┐   │
//! │  │  Infrastructure (adapters)           │   │
//! │  │  - FileRepository                    │   │
//! │  │  - InMemoryRepository (testing)      │   │
//! │  └──────────────┬───────────────────────┘   │
//! │                 │ implements                 │
//! │                 ▼                            │
//! │  ┌──────────────────────────────────────┐   │
//! │  │  Domain Ports (ports)                │   │
//! │  │  - SnapshotRepository trait          │   │
//! │  │  - Controller trait                  │   │
//! │  └──────────────┬───────────────────────┘   │
//! │                 │ used by                    │
//! │                 ▼                            │
//! │  ┌──────────────────────────────────────┐   │
//! │  │  Domain Logic                        │   │
//! │  │  - QLearningAgent                    │   │
//! │  │  - PersistenceManager                │   │
//! │  │  - ValueStore                        │   │
//! │  └──────────────────────────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production
//!
//! ```no_run
//! use squaro_agent::app::{App, AgentConfig};
//!
//! let app = App::new();
//! let config = AgentConfig::default().with_seed(42);
//! let agent = app.create_agent(config)?;
//! # Ok::<(), squaro_agent::Error>(())
//! ```
//!
//! ## Testing
//!
//! ```
//! use squaro_agent::app::App;
//! use squaro_agent::adapters::InMemoryRepository;
//!
//! let app = App::for_testing()
//!     .with_repository(InMemoryRepository::new())
//!     .with_default_seed(42)
//!     .build();
//! ```

pub mod config;
pub mod container;

pub use config::AgentConfig;
pub use container::{App, AppBuilder};

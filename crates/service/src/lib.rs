//! Service layer of the meal planning backend.
//!
//! - [`UnitOfWork`]: identity maps over the repositories for one command or handler
//! - [`MessageBus`]: runs commands, then dispatches their events to handlers
//!   concurrently under a deadline
//! - [`commands`]: every command the bus accepts
//! - [`event_handlers`]: handlers keeping meals, menus and clients consistent
//! - [`Config`] and [`telemetry`]: environment configuration and tracing setup

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod error;
pub mod event_handlers;
mod handlers;
pub mod message_bus;
pub mod telemetry;
pub mod unit_of_work;

pub use bootstrap::bootstrap;
pub use commands::{Command, CommandResult};
pub use config::{Config, LogFormat};
pub use error::{Result, ServiceError};
pub use event_handlers::EventHandler;
pub use message_bus::{CommandOutcome, DispatchReport, MessageBus};
pub use unit_of_work::{Repositories, TrackingRepository, UnitOfWork};

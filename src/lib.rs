mod client;
mod engine;
mod error;
mod gateway;
mod hold;
mod logger;
mod presence;
mod protocol;
mod report;
mod store;
mod types;

pub use client::{EcobeeClient, EcobeeClientBuilder, PinChallenge};
pub use engine::{CycleReport, Engine, RevisionTracker};
pub use error::{Error, Result};
pub use gateway::ThermostatGateway;
pub use hold::HoldWindow;
pub use presence::{PingProbe, Presence};
pub use store::{Session, TokenStore};
pub use types::*;

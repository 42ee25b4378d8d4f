pub mod access;
pub mod config;
pub mod error;
pub mod locks;
pub mod report;
pub mod service;

pub use access::{AccessCode, AccessPolicy};
pub use config::AppConfig;
pub use error::SessionError;
pub use report::{GameSummary, GameView, NameBook};
pub use service::AssassinService;

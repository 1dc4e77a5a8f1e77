// Library surface for the binary, headless integration tests and reuse.
pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod corpus;
pub mod error;
pub mod events;
pub mod feedback;
pub mod predictor;
pub mod runtime;
pub mod scorer;
pub mod selector;
pub mod session;
pub mod stats;
pub mod ticker;
pub mod util;

pub use controller::SessionController;
pub use events::{SessionEvent, SessionSummary};

//! Arithmetic captcha recognition
//!
//! Raw captcha -> [`preprocessing`] (binary image) -> [`recognizer`]
//! (digit and operator classifiers) -> `"8-6=2"` plus a confidence score.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod preprocessing;
pub mod recognizer;
pub mod server;

pub use cli::{Args, Command};
pub use config::Config;
pub use error::CaptchaError;
pub use preprocessing::binarize;
pub use recognizer::{Recognition, Recognizer, RecognizerState};

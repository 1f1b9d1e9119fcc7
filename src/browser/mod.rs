//! Browser automation module
//!
//! Launches and controls one Chrome/Chromium instance per account and
//! resolves form fields across the page and its child frames.

mod actions;
mod errors;
mod resolver;
mod session;

pub use actions::PunchActions;
pub use errors::BrowserError;
pub use resolver::{fill_field, DocumentScope, FillLocation, CHILD_WAIT, PRIMARY_WAIT};
pub use session::{BrowserSession, BrowserSessionConfig, PageScope};

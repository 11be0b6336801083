//! Headless runner for tradecfg
//!
//! Drives a [`CommandExecutor`](tradecfg_engine::CommandExecutor) from text
//! lines: free-text commands go through the parser, lines starting with `:`
//! are session controls.
//!
//! # Meta Commands
//!
//! - `:confirm` / `:cancel`: resolve the pending plan
//! - `:undo [id,...]` / `:redo`: step history, or undo specific operations
//! - `:accept`: re-run the last input with the router's suggestion confirmed
//! - `:snapshot <message>`: commit the document to the snapshot store
//! - `:scope engines=A,B groups=1 logics=POWER` / `:scope clear`
//! - `:history`: list undoable operations
//!
//! # Example
//!
//! ```rust,ignore
//! use tradecfg_cli::{load_document, Session};
//!
//! let document = load_document("config.json")?;
//! let mut session = Session::new(document, EngineSettings::default())?;
//! let result = session.handle_line("set grid to 500 for G2").await;
//! ```

#![warn(unreachable_pub)]

mod document_io;
mod meta;
mod render;
mod session;

pub use document_io::{load_document, save_document, DocumentFormat};
pub use meta::{MetaCommand, MetaError};
pub use render::render;
pub use session::{Session, SessionError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

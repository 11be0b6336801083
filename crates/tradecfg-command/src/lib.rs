//! tradecfg command understanding
//!
//! Free text in, structured [`Command`] out, then merged with the user's
//! [`EditingScope`].
//!
//! # Pipeline
//!
//! 1. [`CommandParser::parse`] consults the optional [`CommandRouter`]
//! 2. [`preprocess`] strips chat noise
//! 3. [`match_semantic`] tries the ordered semantic rules
//! 4. [`grammar::parse_literal`] tries the literal grammars
//! 5. [`resolve`] intersects the command target with the editing scope
//!
//! # Example
//!
//! ```rust,ignore
//! let parser = CommandParser::new();
//! let command = parser.parse("set grid to 500 for G1", &ParseContext::new()).await;
//! let target = resolve(&command.target, &scope)?;
//! ```

#![warn(unreachable_pub)]

mod command;
pub mod grammar;
mod parser;
mod preprocess;
mod router;
mod scope;
pub mod semantic;

pub use command::{
    json_to_field_value, Command, CommandKind, FieldOperation, FieldValue, OpKind, ParseNotice,
    SemanticCommand, Target, FORMAT_HINT,
};
pub use parser::{parse_local, CommandParser, ParseContext, DEFAULT_ROUTER_TIMEOUT};
pub use preprocess::{is_greeting_only, preprocess};
pub use router::{CommandRouter, HttpCommandRouter, RouteRequest, RouteResponse, RouterError};
pub use scope::{resolve, resolve_targets, Dimension, EditingScope, ScopeConflict};
pub use semantic::{match_semantic, rules, SemanticRule};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

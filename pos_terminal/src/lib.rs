//! Terminal runtime for the cashless POS engine.
//!
//! [`config`] reads the terminal configuration from `POS_*` environment variables, [`ledger_client`] talks to the
//! remote ledger over HTTP, and [`terminal::Terminal`] wires both to the engine's durable booking queue and payment
//! workflows. The `pos-terminal` binary exposes the operator commands in [`cli`].
pub mod cli;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod ledger_client;
pub mod terminal;

pub use config::TerminalConfig;
pub use errors::TerminalError;
pub use ledger_client::HttpLedgerClient;
pub use terminal::Terminal;

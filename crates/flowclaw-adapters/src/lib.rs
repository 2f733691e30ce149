//! # FlowClaw Adapters
//!
//! Pluggable tool adapters and the registry that dispatches intents to them.
//! New tools are added by registering another `Adapter` at wiring time; the
//! engine and the dispatcher never change.
//!
//! ## Built-in adapters
//! | Tool       | Kind       | Verbs                      |
//! |------------|------------|----------------------------|
//! | `telegram` | messaging  | send, notify               |
//! | `discord`  | messaging  | send, notify               |
//! | `jira`     | ticketing  | create, comment            |
//! | `webhook`  | HTTP       | send (POST), read (GET)    |

pub mod discord;
mod http;
pub mod jira;
pub mod registry;
pub mod telegram;
pub mod webhook;

pub use discord::DiscordAdapter;
pub use jira::JiraAdapter;
pub use registry::{AdapterRegistry, check_required, validate_context};
pub use telegram::TelegramAdapter;
pub use webhook::WebhookAdapter;

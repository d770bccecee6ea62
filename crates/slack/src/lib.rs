//! Slack integration for the support autoresponder
//!
//! - **Socket Mode** (`socket`) - event loop over a pluggable transport with reconnect backoff
//! - **Events** (`events`) - channel messages and member joins, routed by `EventDispatcher`
//! - **Normalization** (`normalize`) - raw message events into validated queue messages
//! - **Web API** (`web`) - `chat.postMessage` client behind the `ChatApi` trait
//! - **Replies** (`sender`, `welcome`) - automated nudges and welcome messages
//!
//! ```text
//! Slack Events → EventDispatcher → InboundMessageService → Autoresponder Engine
//!                                → WelcomeService        → ChatApi
//! ```

pub mod events;
pub mod normalize;
pub mod sender;
pub mod socket;
pub mod web;
pub mod welcome;

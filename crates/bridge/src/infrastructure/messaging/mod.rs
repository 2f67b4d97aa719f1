//! Command and event messaging over the harness socket.
//!
//! - `CommandDispatcher`: one-shot commands with id correlation and a hard timeout
//! - `EventSubscriber`: named, push-only event streams
//!
//! Both share the single socket owned by the transport (in the websocket module).

pub mod command_dispatcher;
pub mod event_subscriber;

pub use command_dispatcher::{CommandDispatcher, PendingCalls, Settlement};
pub use event_subscriber::{EventListeners, EventSubscriber, ListenOptions, ListenerId, Unlisten};

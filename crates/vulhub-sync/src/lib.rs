//! Client-side synchronization of vulhub panel state.
//!
//! A [`QueryCache`] keyed by [`QueryKey`] holds the latest snapshot of every
//! remote resource, de-duplicates concurrent fetches and discards responses
//! that a newer fetch has superseded. Keys with a poll interval refetch on a
//! timer while subscribed. Mutations run through the [`MutationCoordinator`],
//! which invalidates the affected keys and emits one [`Notification`] each.

mod cache;
mod config;
mod key;
mod mutation;
mod notify;
mod overview;
mod poll;
mod queries;
mod session;

#[cfg(test)]
mod testing;

pub use cache::{EntryInfo, QueryCache, QueryState, Subscription};
pub use config::{QueryOptions, SyncConfig};
pub use key::QueryKey;
pub use mutation::{Action, Mutation, MutationCoordinator, MutationOutcome};
pub use notify::{ChannelSink, LogSink, Notification, NotificationKind, NotificationSink};
pub use overview::{Overview, reconcile};
pub use poll::PollingScheduler;
pub use queries::Queries;
pub use session::Session;

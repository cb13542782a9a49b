//! Typed access to the vulhub panel REST API.
//!
//! - Wire and domain types for environments, containers and system status.
//! - The [`Transport`] seam and its reqwest implementation, which unwraps the
//!   uniform `{success, data?, error?}` envelope into [`ApiError`].
//! - [`EnvironmentApi`], one method per remote operation, implemented over
//!   HTTP by [`VulhubClient`].

mod client;
mod error;
mod traits;
mod transport;
mod types;

pub use client::{VulhubClient, encode_path};
pub use error::{ApiError, CODE_MULTIPLE_MATCHES, CODE_NOT_FOUND};
pub use traits::EnvironmentApi;
pub use transport::{API_PREFIX, ApiRequest, HttpTransport, Method, Transport};
pub use types::{
    ActionReply, CleanOptions, ContainerStatus, DisplayGroup, Environment, EnvironmentFilter,
    EnvironmentInfo, EnvironmentList, EnvironmentStatus, GroupedEnvironments, PortMapping,
    SYNC_TIME_FORMAT, StartOptions, StatusList, SyncupResult, SystemStatus,
};

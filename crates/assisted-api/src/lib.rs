//! # assisted-api
//!
//! Typed facade over the assisted installation REST API.
//!
//! The harness never talks HTTP directly: it calls [`InstallerApi`]
//! operations on a client bound to one [`Identity`]. Two implementations
//! exist: [`RestClient`] for a real service, and the simulated service in
//! `assisted-sim` for tests.
//!
//! ```text
//! ┌──────────────┐   InstallerApi    ┌──────────────┐   HTTPS/JSON   ┌──────────────────┐
//! │  harness     │──────────────────►│  RestClient  │───────────────►│ assisted-service │
//! └──────────────┘                   └──────────────┘                └──────────────────┘
//! ```

#![forbid(unsafe_code)]

pub mod api;
pub mod auth;
pub mod error;
pub mod identity;
pub mod rest;
pub mod types;

pub use api::InstallerApi;
pub use error::{ApiError, ApiResult, canonical_reason};
pub use identity::Identity;
pub use rest::{ClientOptions, RestClient};
pub use types::{
    Cluster, ClusterCreateParams, ClusterId, ClusterStatus, ClusterUpdateParams, CompletionParams,
    Credentials, DownloadFile, Event, EventSeverity, Host, HostId, HostInventory,
    HostProgressInfo, HostProgressUpdate, HostRegisterParams, HostRole, HostRoleUpdate, HostStage,
    HostStatus, ImageCreateParams, InventoryInterface, Step, StepReply, StepType, Steps,
};

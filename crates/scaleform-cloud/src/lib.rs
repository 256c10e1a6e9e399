//! Scaleform Cloud Infrastructure
//!
//! This crate provides the provider-agnostic core of the Scaleform server
//! resource: the declared schema, the reconciler that maps it onto a remote
//! compute API, and the planning/state machinery around it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Orchestrator                    │
//! │      (plan_all → Applier → StateManager)         │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait ResourceHandler
//! ┌─────────────────▼───────────────────────────────┐
//! │               scaleform-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  InstanceReconciler                       │   │
//! │  │  define / observe / update / delete       │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │    Schema    │  │    Waiter    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait InstanceApi
//! ┌─────────────────▼───────────────────────────────┐
//! │          scaleform-cloud-scaleway                │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod apply;
pub mod error;
pub mod provider;
pub mod reconciler;
pub mod schema;
pub mod state;
pub mod waiter;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary, plan_all, plan_resource};
pub use apply::{ActionResult, Applier, ApplyResult};
pub use error::{CloudError, DefineError, Result};
pub use provider::{
    DeleteOptions, InstanceApi, InstanceDefinition, InstancePatch, PowerAction, RemoteInstance,
    ResourceHandler, VolumeRef,
};
pub use reconciler::{InstanceReconciler, project};
pub use schema::{
    ComputedState, ConnectionInfo, DeclaredConfig, FieldSchema, Mutability, Observation,
    ResourceData, SERVER_SCHEMA, VolumeMap,
};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
pub use waiter::{WaitConfig, wait_until_ready, wait_until_stopped};

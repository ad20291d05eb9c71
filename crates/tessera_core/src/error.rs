//! # ECS Error Types
//!
//! Setup-time failures of the world. Per-access operations never return these:
//! a duplicate `add_component` hands the value back and a missing component is
//! simply `None`/`false`.

use thiserror::Error;

/// Errors that can occur while configuring a [`World`](crate::World).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The component type was registered before.
    #[error("component `{component}` is already registered")]
    AlreadyRegistered {
        /// Type name of the component.
        component: &'static str,
    },

    /// A query or event channel referenced a type that was never registered.
    #[error("component `{component}` is not registered")]
    NotRegistered {
        /// Type name of the component.
        component: &'static str,
    },

    /// Queries take between one and [`MAX_QUERY_PARAMETERS`](crate::MAX_QUERY_PARAMETERS) parameters.
    #[error("queries take 1 to {max} parameters, got {given}")]
    InvalidQueryParameterCount {
        /// Number of parameters passed.
        given: usize,
        /// Maximum supported.
        max: usize,
    },

    /// The system id does not belong to a registered system.
    #[error("system {0} is not registered")]
    SystemNotRegistered(u32),

    /// Invalid world configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECS setup operations.
pub type EcsResult<T> = Result<T, EcsError>;

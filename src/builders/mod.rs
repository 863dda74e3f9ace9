//! Builders to construct worker pools from configuration.

pub mod provisioner;
pub mod registry;

pub use provisioner::{build, PoolPlan, PoolProvisioner, ProvisionedPool};
pub use registry::{RejectionPolicyCtor, StrategyRegistry, ThreadFactoryCtor};

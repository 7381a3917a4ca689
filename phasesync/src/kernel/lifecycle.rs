use super::ConfigError;

/// Constructor validation lifecycle shared by kernel structs.
///
/// Every kernel is built from a plain config value. Validation happens once
/// here so that the `run*` entrypoints only have to check data-dependent
/// invariants.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}

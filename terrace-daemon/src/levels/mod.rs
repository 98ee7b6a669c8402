//! Concrete level definitions for the terrace platform chain.
//!
//! Bring-up order: bootstrap -> settings -> services -> platform, plus
//! an ephemeral startup level that runs leader-only work after the main
//! chain is up.

pub mod bootstrap;
pub mod platform;
pub mod services;
pub mod settings;
pub mod startup;

pub use bootstrap::BootstrapDef;
pub use platform::PlatformDef;
pub use services::ServicesDef;
pub use settings::SettingsDef;
pub use startup::StartupDef;

//! Configuration document: model, validation, built-in defaults, layered
//! merging and discovery.

pub mod defaults;
pub mod env;
pub mod loader;
pub mod merge;
pub mod model;
pub mod validate;

pub use defaults::{DEFAULT_TIMEOUT_MS, KNOWN_PLATFORMS};
pub use env::EnvSnapshot;
pub use loader::{candidate_paths, load_config, load_from_path, parse_config_str, LoadedConfig};
pub use merge::{merge_platform, AuthFailure, AuthKind, EffectiveMetric, EffectivePlatform};
pub use model::{AuthConfig, ConfigDocument, FieldConfig, MetricConfig, PlatformConfig};
pub use validate::validate_document;

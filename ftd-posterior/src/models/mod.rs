pub mod dispersion;
pub mod prior;
pub mod registry;

// re-export for cleaner imports
pub use self::dispersion::{DispersionModel, NegativeBinomialModel};
pub use self::prior::BetaPrior;
pub use self::registry::{DatasetMetadata, ModelRegistry, read_metadata};

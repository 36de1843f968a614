mod error;
mod ground_station;
mod pass_finder;
mod propagation;
mod tle_loader;
mod types;

pub use error::{PredictError, PropagationError};
pub use ground_station::GroundStation;
pub use pass_finder::{Generated, PassGenerator};
pub use propagation::{Propagator, Sgp4Propagator};
pub use tle_loader::TleLoader;
pub use types::{Pass, Satellite, TimeWindow};
#[cfg(test)]
pub use types::PassEvent;

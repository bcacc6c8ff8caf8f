pub mod engagement;
pub mod error;
pub mod geo;
pub mod hlc;
pub mod ids;
pub mod lead_stage;
pub mod people;
pub mod product;
pub mod record;

pub use engagement::*;
pub use error::CoreError;
pub use geo::*;
pub use hlc::Hlc;
pub use ids::*;
pub use lead_stage::{LeadStage, TransitionPolicy};
pub use people::*;
pub use product::*;
pub use record::{Record, Validate};

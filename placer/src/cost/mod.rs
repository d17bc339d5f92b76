pub mod bbox;
pub mod delay;
pub mod region;
pub mod timing;

pub use bbox::BBoxCostModel;
pub use delay::{DelayModel, DeltaDelayModel};
pub use region::RegionCostModel;
pub use timing::TimingCostModel;

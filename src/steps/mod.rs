//! Recording side of the animation engine: step records, layers that own them, and the recorder
//! that turns drawn deltas into steps.

pub mod layer;
pub mod recorder;
pub mod step;

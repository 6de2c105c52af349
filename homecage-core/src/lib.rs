pub mod contact;
pub mod geometry;
pub mod hit;
pub mod stimulus;
pub mod trial;

pub use contact::{ContactId, ContactSet};
pub use geometry::{
    Arrangement, Extent, GeometryLayout, LayoutConfig, LayoutError, Placement, Plate, PlateLayout,
    Point, Rect, Side, SizeSpec,
};
pub use hit::{HitArea, Zone};
pub use stimulus::{Curriculum, FallbackReason, StimulusError, StimulusSet, StimulusSource};
pub use trial::{ItiKind, TrialOutcome, TrialState};

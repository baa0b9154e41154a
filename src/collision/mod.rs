//! Collision detection modules: broad-phase, narrow-phase, contacts, queries, CCD.

pub mod broadphase;
pub mod ccd;
pub mod contact;
pub mod narrowphase;
pub mod queries;
pub mod shapes;

pub use broadphase::{BroadPhase, ProxyId, SpatialGrid};
pub use ccd::{time_of_impact, ToiInput, ToiOutput, ToiState};
pub use contact::{Contact, ContactEdge, ContactFlags, ContactImpulse};
pub use narrowphase::{Manifold, ManifoldPoint};
pub use queries::{RayCastInput, RayCastOutput, RaycastHit};
pub use shapes::{Aabb, Circle, DistanceProxy, Segment, Shape, ShapeKind};

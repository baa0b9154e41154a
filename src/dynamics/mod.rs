//! Simulation dynamics: island building, the contact solver and joints.

pub mod friction;
pub mod island;
pub mod solver;

pub use friction::{FrictionJoint, FrictionJointDef};
pub use island::{Island, IslandBuilder, IslandRange};
pub use solver::{ContactSolver, SolverData, TimeStep};

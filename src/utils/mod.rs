//! Utility helpers including math extensions, allocators, logging, profiling, and debug drawing.

pub mod allocator;
pub mod debug_draw;
pub mod logging;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, GenerationalId, Handle, Linked, Links, Registry};
pub use debug_draw::{Color, DebugDraw, DrawFlags};
pub use math::*;

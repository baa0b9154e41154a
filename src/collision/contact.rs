use glam::Vec2;

use crate::{
    collision::narrowphase::Manifold,
    core::graph::{BodyId, ContactId, FixtureId},
    error::{ensure_non_negative, WorldResult},
    utils::allocator::{Linked, Links},
};

/// State bits of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactFlags(u8);

impl ContactFlags {
    /// Included in the solve. Cleared by the user in `pre_solve` for one step.
    pub const ENABLED: Self = Self(1 << 0);
    /// The shapes overlap (or, for sensors, the overlap test passes).
    pub const TOUCHING: Self = Self(1 << 1);
    /// Already placed in an island this step.
    pub const ISLAND: Self = Self(1 << 2);
    /// Filtering must be re-evaluated before the next update.
    pub const FILTER: Self = Self(1 << 3);
    /// `toi` holds a valid cached time of impact.
    pub const TOI: Self = Self(1 << 4);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl std::ops::BitOr for ContactFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Persistent record of a fixture pair whose broad-phase boxes overlap.
#[derive(Debug)]
pub struct Contact {
    pub(crate) flags: ContactFlags,
    pub(crate) fixture_a: FixtureId,
    pub(crate) fixture_b: FixtureId,
    pub(crate) body_a: BodyId,
    pub(crate) body_b: BodyId,
    pub(crate) manifold: Manifold,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) toi_count: u32,
    pub(crate) toi: f32,
    pub(crate) links: Links<Contact>,
}

impl Linked for Contact {
    fn links(&self) -> &Links<Self> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<Self> {
        &mut self.links
    }
}

impl Contact {
    pub(crate) fn new(
        fixture_a: FixtureId,
        body_a: BodyId,
        fixture_b: FixtureId,
        body_b: BodyId,
        friction: f32,
        restitution: f32,
    ) -> Self {
        Self {
            flags: ContactFlags::ENABLED,
            fixture_a,
            fixture_b,
            body_a,
            body_b,
            manifold: Manifold::default(),
            friction,
            restitution,
            toi_count: 0,
            toi: 1.0,
            links: Links::default(),
        }
    }

    pub fn fixture_a(&self) -> FixtureId {
        self.fixture_a
    }

    pub fn fixture_b(&self) -> FixtureId {
        self.fixture_b
    }

    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn flags(&self) -> ContactFlags {
        self.flags
    }

    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLED)
    }

    /// Disables the contact for the current step. Re-enabled on the next update.
    pub fn set_enabled(&mut self, flag: bool) {
        self.flags.set(ContactFlags::ENABLED, flag);
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) -> WorldResult<()> {
        self.friction = ensure_non_negative("friction", friction)?;
        Ok(())
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) -> WorldResult<()> {
        self.restitution = ensure_non_negative("restitution", restitution)?;
        Ok(())
    }

    /// TOI events handled for this contact since the last completed step.
    pub fn toi_count(&self) -> u32 {
        self.toi_count
    }

    /// World normal pointing from body A to body B.
    pub fn normal(&self) -> Vec2 {
        self.manifold.normal
    }

    pub(crate) fn other_body(&self, body: BodyId) -> BodyId {
        if body == self.body_a {
            self.body_b
        } else {
            self.body_a
        }
    }
}

/// Adjacency entry linking a body to one incident contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEdge {
    pub other: BodyId,
    pub contact: ContactId,
}

/// Impulses applied by the solver, reported through `post_solve`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_are_independent() {
        let mut flags = ContactFlags::ENABLED | ContactFlags::TOUCHING;
        assert!(flags.contains(ContactFlags::TOUCHING));
        flags.remove(ContactFlags::TOUCHING);
        assert!(flags.contains(ContactFlags::ENABLED));
        assert!(!flags.contains(ContactFlags::TOUCHING));
        flags.set(ContactFlags::ISLAND | ContactFlags::TOI, true);
        assert!(flags.contains(ContactFlags::TOI));
        flags.remove(ContactFlags::ISLAND | ContactFlags::TOI);
        assert_eq!(flags, ContactFlags::ENABLED);
    }
}

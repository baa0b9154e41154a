//! User hooks invoked by the world during topology changes and stepping.

use crate::{
    collision::{contact::Contact, contact::ContactImpulse, narrowphase::Manifold},
    core::{
        fixture::Fixture,
        graph::{FixtureId, JointId},
    },
};

/// Notified when a joint or fixture is destroyed implicitly because its body
/// was destroyed. Explicit `destroy_joint` / `destroy_fixture` calls do not
/// trigger it.
pub trait DestructionListener: Send + Sync {
    fn joint_destroyed(&mut self, joint: JointId);

    fn fixture_destroyed(&mut self, fixture: FixtureId);
}

/// Decides whether two fixtures may ever generate a contact.
pub trait ContactFilter: Send + Sync {
    fn should_collide(&self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        fixture_a.filter().should_collide(&fixture_b.filter())
    }
}

/// Filter that applies each fixture's [`crate::core::fixture::Filter`] data.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContactFilter;

impl ContactFilter for DefaultContactFilter {}

/// Contact lifecycle events. All methods default to no-ops.
///
/// `begin_contact` and `end_contact` fire on touching transitions, including
/// those detected during continuous collision. `pre_solve` fires on every
/// update of a touching contact and may disable it for the current step.
pub trait ContactListener: Send + Sync {
    fn begin_contact(&mut self, _contact: &Contact) {}

    fn end_contact(&mut self, _contact: &Contact) {}

    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {}

    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

use crate::{
    collision::{
        broadphase::BroadPhase,
        contact::{Contact, ContactFlags, ContactImpulse},
        narrowphase,
    },
    config::DEFAULT_BROADPHASE_CELL_SIZE,
    core::{
        graph::{BodyId, ContactId, FixtureId, InteractionGraph},
        types::{mix_friction, mix_restitution},
    },
    utils::allocator::Registry,
    world::callbacks::{ContactFilter, ContactListener, DefaultContactFilter},
};

/// Keeps the contact set in sync with the broad-phase and runs the narrow
/// phase on live contacts.
pub struct ContactManager {
    pub(crate) broad_phase: BroadPhase<FixtureId>,
    filter: Box<dyn ContactFilter>,
    listener: Option<Box<dyn ContactListener>>,
}

impl Default for ContactManager {
    fn default() -> Self {
        Self::new(DEFAULT_BROADPHASE_CELL_SIZE)
    }
}

impl ContactManager {
    pub fn new(cell_size: f32) -> Self {
        Self {
            broad_phase: BroadPhase::new(cell_size),
            filter: Box::new(DefaultContactFilter),
            listener: None,
        }
    }

    pub fn broad_phase(&self) -> &BroadPhase<FixtureId> {
        &self.broad_phase
    }

    pub(crate) fn set_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.filter = filter;
    }

    pub(crate) fn set_listener(&mut self, listener: Option<Box<dyn ContactListener>>) {
        self.listener = listener;
    }

    pub(crate) fn listener_mut(&mut self) -> Option<&mut (dyn ContactListener + 'static)> {
        self.listener.as_deref_mut()
    }

    /// Materializes contacts for every new broad-phase pair.
    pub fn find_new_contacts(&mut self, graph: &mut InteractionGraph) {
        for (fixture_a, fixture_b) in self.broad_phase.update_pairs() {
            self.add_pair(graph, fixture_a, fixture_b);
        }
    }

    fn add_pair(&mut self, graph: &mut InteractionGraph, fixture_a: FixtureId, fixture_b: FixtureId) {
        let (Some(fa), Some(fb)) = (graph.fixtures.get(fixture_a), graph.fixtures.get(fixture_b)) else {
            return;
        };
        let (body_a, body_b) = (fa.body, fb.body);
        if body_a == body_b {
            return;
        }
        let (Some(ba), Some(bb)) = (graph.bodies.get(body_a), graph.bodies.get(body_b)) else {
            return;
        };

        let exists = bb.contact_edges.iter().any(|edge| {
            edge.other == body_a
                && graph.contacts.get(edge.contact).is_some_and(|c| {
                    (c.fixture_a == fixture_a && c.fixture_b == fixture_b)
                        || (c.fixture_a == fixture_b && c.fixture_b == fixture_a)
                })
        });
        if exists {
            return;
        }

        if !bb.should_collide(body_a, ba) || !self.filter.should_collide(fa, fb) {
            return;
        }

        let contact = Contact::new(
            fixture_a,
            body_a,
            fixture_b,
            body_b,
            mix_friction(fa.friction, fb.friction),
            mix_restitution(fa.restitution, fb.restitution),
        );
        let id = graph.insert_contact(contact);
        log::trace!("contact {id:?} created between {fixture_a:?} and {fixture_b:?}");
    }

    /// Refreshes every contact: re-filters flagged ones, destroys pairs whose
    /// fat boxes separated and runs the narrow phase on the rest.
    pub fn collide(&mut self, graph: &mut InteractionGraph) {
        let mut cursor = graph.contact_list.head();
        while let Some(id) = cursor {
            cursor = Registry::next(&graph.contacts, id);

            let Some(contact) = graph.contacts.get(id) else {
                continue;
            };
            let (fixture_a, fixture_b) = (contact.fixture_a, contact.fixture_b);
            let (body_a, body_b) = (contact.body_a, contact.body_b);
            let needs_filter = contact.flags.contains(ContactFlags::FILTER);

            let (Some(fa), Some(fb), Some(ba), Some(bb)) = (
                graph.fixtures.get(fixture_a),
                graph.fixtures.get(fixture_b),
                graph.bodies.get(body_a),
                graph.bodies.get(body_b),
            ) else {
                continue;
            };

            if needs_filter {
                if !bb.should_collide(body_a, ba) || !self.filter.should_collide(fa, fb) {
                    self.destroy(graph, id);
                    continue;
                }
                if let Some(contact) = graph.contacts.get_mut(id) {
                    contact.flags.remove(ContactFlags::FILTER);
                }
            }

            let active_a = ba.awake && !ba.is_static();
            let active_b = bb.awake && !bb.is_static();
            if !active_a && !active_b {
                continue;
            }

            let overlap = match (fa.proxy, fb.proxy) {
                (Some(pa), Some(pb)) => self.broad_phase.test_overlap(pa, pb),
                _ => false,
            };
            if !overlap {
                self.destroy(graph, id);
                continue;
            }

            self.update_contact(graph, id);
        }
    }

    /// Runs the narrow phase for one contact and reports touch transitions.
    pub fn update_contact(&mut self, graph: &mut InteractionGraph, id: ContactId) {
        let Some(contact) = graph.contacts.get(id) else {
            return;
        };
        let (Some(fa), Some(fb), Some(ba), Some(bb)) = (
            graph.fixtures.get(contact.fixture_a),
            graph.fixtures.get(contact.fixture_b),
            graph.bodies.get(contact.body_a),
            graph.bodies.get(contact.body_b),
        ) else {
            return;
        };

        let old_manifold = contact.manifold;
        let was_touching = contact.is_touching();
        let sensor = fa.is_sensor || fb.is_sensor;
        let (body_a, body_b) = (contact.body_a, contact.body_b);

        let (manifold, touching) = if sensor {
            let touching = narrowphase::test_overlap(fa.shape.as_ref(), &ba.xf, fb.shape.as_ref(), &bb.xf);
            (narrowphase::Manifold::default(), touching)
        } else {
            let mut manifold = narrowphase::evaluate(fa.shape.as_ref(), &ba.xf, fb.shape.as_ref(), &bb.xf);
            // Carry impulses over for warm starting when the feature pair persists.
            if let (Some(new_point), Some(old_point)) = (manifold.point.as_mut(), old_manifold.point) {
                if new_point.id == old_point.id {
                    new_point.normal_impulse = old_point.normal_impulse;
                    new_point.tangent_impulse = old_point.tangent_impulse;
                }
            }
            let touching = manifold.point_count() > 0;
            (manifold, touching)
        };

        if !sensor && touching != was_touching {
            for body in [body_a, body_b] {
                if let Some(body) = graph.bodies.get_mut(body) {
                    body.set_awake(true);
                }
            }
        }

        let Some(contact) = graph.contacts.get_mut(id) else {
            return;
        };
        contact.flags.insert(ContactFlags::ENABLED);
        contact.manifold = manifold;
        contact.flags.set(ContactFlags::TOUCHING, touching);

        if let Some(listener) = self.listener.as_deref_mut() {
            if !was_touching && touching {
                listener.begin_contact(contact);
            }
            if was_touching && !touching {
                listener.end_contact(contact);
            }
            if !sensor && touching {
                listener.pre_solve(contact, &old_manifold);
            }
        }
    }

    /// Removes a contact, notifying the listener if it was touching.
    pub fn destroy(&mut self, graph: &mut InteractionGraph, id: ContactId) {
        let Some(contact) = graph.contacts.get(id) else {
            return;
        };
        if contact.is_touching() {
            if let Some(listener) = self.listener.as_deref_mut() {
                listener.end_contact(contact);
            }
        }

        if contact.manifold.point_count() > 0 && !graph.involves_sensor(contact) {
            let (body_a, body_b) = (contact.body_a, contact.body_b);
            for body in [body_a, body_b] {
                if let Some(body) = graph.bodies.get_mut(body) {
                    body.set_awake(true);
                }
            }
        }

        graph.remove_contact(id);
    }

    /// Destroys every contact incident to `body`.
    pub fn destroy_body_contacts(&mut self, graph: &mut InteractionGraph, body: BodyId) {
        let ids: Vec<ContactId> = match graph.bodies.get(body) {
            Some(b) => b.contact_edges().map(|edge| edge.contact).collect(),
            None => return,
        };
        for id in ids {
            self.destroy(graph, id);
        }
    }

    /// Moves every proxy of a body to cover its motion over the last step.
    pub fn synchronize_body(&mut self, graph: &mut InteractionGraph, body: BodyId) {
        let Some(b) = graph.bodies.get(body) else {
            return;
        };
        let xf1 = b.sweep_start_transform();
        let xf2 = b.xf;
        for &fixture in &b.fixtures {
            if let Some(f) = graph.fixtures.get_mut(fixture) {
                f.synchronize(&mut self.broad_phase, &xf1, &xf2);
            }
        }
    }

    pub(crate) fn post_solve(&mut self, graph: &InteractionGraph, reports: &[(ContactId, ContactImpulse)]) {
        let Some(listener) = self.listener.as_deref_mut() else {
            return;
        };
        for (id, impulse) in reports {
            if let Some(contact) = graph.contacts.get(*id) {
                listener.post_solve(contact, impulse);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::shapes::Circle,
        core::{
            body::{Body, BodyDef},
            fixture::{Fixture, FixtureDef},
        },
    };
    use glam::Vec2;

    fn attach(graph: &mut InteractionGraph, manager: &mut ContactManager, body: BodyId, radius: f32) -> FixtureId {
        let id = graph.fixtures.insert(Fixture::new(body, FixtureDef::new(Circle::new(radius)).density(1.0)));
        let xf = graph.body(body).unwrap().transform();
        graph.fixtures.get_mut(id).unwrap().create_proxy(&mut manager.broad_phase, &xf, id);
        graph.bodies.get_mut(body).unwrap().fixtures.push(id);
        id
    }

    #[test]
    fn overlapping_fixtures_become_touching_contacts() {
        let mut graph = InteractionGraph::new();
        let mut manager = ContactManager::default();
        let a = graph.insert_body(Body::new(&BodyDef::dynamic()));
        let b = graph.insert_body(Body::new(&BodyDef::dynamic().position(Vec2::new(0.9, 0.0))));
        attach(&mut graph, &mut manager, a, 0.5);
        attach(&mut graph, &mut manager, b, 0.5);

        manager.find_new_contacts(&mut graph);
        assert_eq!(graph.contact_count(), 1);
        // A second pass must not duplicate the contact.
        for (_, f) in graph.fixtures.iter() {
            manager.broad_phase.touch_proxy(f.proxy.unwrap());
        }
        manager.find_new_contacts(&mut graph);
        assert_eq!(graph.contact_count(), 1);

        manager.collide(&mut graph);
        let id = graph.contact_ids()[0];
        assert!(graph.contact(id).unwrap().is_touching());
    }

    #[test]
    fn static_pairs_never_get_contacts() {
        let mut graph = InteractionGraph::new();
        let mut manager = ContactManager::default();
        let a = graph.insert_body(Body::new(&BodyDef::default()));
        let b = graph.insert_body(Body::new(&BodyDef::default()));
        attach(&mut graph, &mut manager, a, 0.5);
        attach(&mut graph, &mut manager, b, 0.5);
        manager.find_new_contacts(&mut graph);
        assert_eq!(graph.contact_count(), 0);
    }
}

//! Continuous collision: finds the earliest time of impact among fast
//! contacts, rewinds the pair to it and resolves a small sub-island there.

use crate::{
    collision::{
        ccd::{time_of_impact, ToiInput, ToiState},
        contact::{ContactFlags, ContactImpulse},
    },
    config::{MAX_SUB_STEPS, MAX_TOI_CONTACTS, TOI_POSITION_ITERATIONS},
    core::graph::{BodyId, ContactId},
    dynamics::{island::Island, solver::TimeStep},
    utils::allocator::Registry,
    world::World,
};

/// Largest number of bodies in one impact sub-island.
const MAX_TOI_BODIES: usize = 2 * MAX_TOI_CONTACTS;

impl World {
    pub(super) fn solve_toi(&mut self, step: &TimeStep) {
        if self.step_complete {
            for (_, body) in self.graph.bodies.iter_mut() {
                body.island_flag = false;
                body.sweep.alpha0 = 0.0;
            }
            for (_, contact) in self.graph.contacts.iter_mut() {
                contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        loop {
            let Some((min_contact, min_alpha)) = self.find_min_toi() else {
                self.step_complete = true;
                break;
            };
            self.profile.toi_events += 1;

            let Some(contact) = self.graph.contacts.get(min_contact) else {
                self.step_complete = true;
                break;
            };
            let (body_a, body_b) = (contact.body_a, contact.body_b);
            let (Some(sweep_a), Some(sweep_b)) = (
                self.graph.bodies.get(body_a).map(|b| b.sweep),
                self.graph.bodies.get(body_b).map(|b| b.sweep),
            ) else {
                self.step_complete = true;
                break;
            };

            for id in [body_a, body_b] {
                if let Some(body) = self.graph.bodies.get_mut(id) {
                    body.advance(min_alpha);
                }
            }

            // The contact may have changed once both bodies moved.
            self.contact_manager.update_contact(&mut self.graph, min_contact);
            let usable = match self.graph.contacts.get_mut(min_contact) {
                Some(contact) => {
                    contact.flags.remove(ContactFlags::TOI);
                    contact.toi_count += 1;
                    let usable = contact.is_enabled() && contact.is_touching();
                    if !usable {
                        contact.set_enabled(false);
                    }
                    usable
                }
                None => false,
            };

            if !usable {
                // Restore the sweeps and try the next impact.
                for (id, sweep) in [(body_a, sweep_a), (body_b, sweep_b)] {
                    if let Some(body) = self.graph.bodies.get_mut(id) {
                        body.sweep = sweep;
                        body.synchronize_transform();
                    }
                }
                continue;
            }

            let (bodies, contacts) = self.build_toi_island(min_contact, body_a, body_b, min_alpha);

            let mut sub_step = TimeStep::new(
                (1.0 - min_alpha) * step.dt,
                step.velocity_iterations,
                TOI_POSITION_ITERATIONS,
            );
            sub_step.dt_ratio = 1.0;
            sub_step.warm_starting = false;

            let mut island = Island::gather(&self.graph, &bodies, &contacts);
            if let (Some(index_a), Some(index_b)) = (island.index_of(body_a), island.index_of(body_b)) {
                island.solve_toi(&sub_step, index_a, index_b);
            }

            for body in &island.bodies {
                if let Some(target) = self.graph.bodies.get_mut(body.id) {
                    body.write_back(target);
                }
            }
            let reports: Vec<(ContactId, ContactImpulse)> = island
                .contacts
                .iter()
                .copied()
                .zip(island.impulses.iter().copied())
                .collect();
            self.contact_manager.post_solve(&self.graph, &reports);

            // Reset island flags and move the proxies of every dynamic body.
            for &id in &bodies {
                let Some(body) = self.graph.bodies.get_mut(id) else {
                    continue;
                };
                body.island_flag = false;
                if !body.is_dynamic() {
                    continue;
                }
                let edges: Vec<ContactId> = body.contact_edges.iter().map(|edge| edge.contact).collect();
                self.contact_manager.synchronize_body(&mut self.graph, id);
                for edge in edges {
                    if let Some(contact) = self.graph.contacts.get_mut(edge) {
                        contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                    }
                }
            }

            // Proxies moved, so new pairs may exist before the next impact.
            self.contact_manager.find_new_contacts(&mut self.graph);

            if self.settings.sub_stepping {
                self.step_complete = false;
                break;
            }
        }
    }

    /// Scans every eligible contact and returns the earliest impact, if any
    /// happens before the end of the step.
    fn find_min_toi(&mut self) -> Option<(ContactId, f32)> {
        let mut min_contact = None;
        let mut min_alpha = 1.0;

        let mut cursor = self.graph.contact_list.head();
        while let Some(id) = cursor {
            cursor = Registry::next(&self.graph.contacts, id);

            let Some(contact) = self.graph.contacts.get(id) else {
                continue;
            };
            if !contact.is_enabled() || contact.toi_count >= MAX_SUB_STEPS {
                continue;
            }

            let alpha = if contact.flags.contains(ContactFlags::TOI) {
                contact.toi
            } else {
                match self.compute_toi(id) {
                    Some(alpha) => alpha,
                    None => continue,
                }
            };

            if alpha < min_alpha {
                min_contact = Some(id);
                min_alpha = alpha;
            }
        }

        match min_contact {
            Some(id) if min_alpha < 1.0 - 10.0 * f32::EPSILON => Some((id, min_alpha)),
            _ => None,
        }
    }

    /// Computes and caches the time of impact of one contact as a fraction of
    /// the full step. Returns `None` for pairs that never need it.
    fn compute_toi(&mut self, id: ContactId) -> Option<f32> {
        let contact = self.graph.contacts.get(id)?;
        let fixture_a = self.graph.fixtures.get(contact.fixture_a)?;
        let fixture_b = self.graph.fixtures.get(contact.fixture_b)?;
        if fixture_a.is_sensor || fixture_b.is_sensor {
            return None;
        }
        let proxy_a = fixture_a.shape.distance_proxy();
        let proxy_b = fixture_b.shape.distance_proxy();
        let (body_a, body_b) = (contact.body_a, contact.body_b);

        let (a, b) = self.graph.bodies.get2_mut(body_a, body_b)?;

        let active_a = a.awake && !a.is_static();
        let active_b = b.awake && !b.is_static();
        if !active_a && !active_b {
            return None;
        }

        // Only bullets sweep against other dynamic bodies.
        let collide_a = a.bullet || !a.is_dynamic();
        let collide_b = b.bullet || !b.is_dynamic();
        if !collide_a && !collide_b {
            return None;
        }

        // Bring both sweeps to a common start time.
        let mut alpha0 = a.sweep.alpha0;
        if a.sweep.alpha0 < b.sweep.alpha0 {
            alpha0 = b.sweep.alpha0;
            a.sweep.advance(alpha0);
        } else if b.sweep.alpha0 < a.sweep.alpha0 {
            alpha0 = a.sweep.alpha0;
            b.sweep.advance(alpha0);
        }
        debug_assert!(alpha0 < 1.0);

        let output = time_of_impact(&ToiInput {
            proxy_a,
            proxy_b,
            sweep_a: a.sweep,
            sweep_b: b.sweep,
            t_max: 1.0,
        });

        let alpha = if output.state == ToiState::Touching {
            (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
        } else {
            1.0
        };

        let contact = self.graph.contacts.get_mut(id)?;
        contact.toi = alpha;
        contact.flags.insert(ContactFlags::TOI);
        Some(alpha)
    }

    /// Collects the impact pair plus the touching neighbours of its dynamic
    /// bodies. Non-bullet dynamic neighbours stay out so fast bodies cannot
    /// drag resting piles along.
    fn build_toi_island(
        &mut self,
        min_contact: ContactId,
        body_a: BodyId,
        body_b: BodyId,
        min_alpha: f32,
    ) -> (Vec<BodyId>, Vec<ContactId>) {
        let mut bodies = Vec::with_capacity(MAX_TOI_BODIES);
        let mut contacts = Vec::with_capacity(MAX_TOI_CONTACTS);

        for id in [body_a, body_b] {
            if let Some(body) = self.graph.bodies.get_mut(id) {
                body.set_awake(true);
                body.island_flag = true;
            }
            bodies.push(id);
        }
        if let Some(contact) = self.graph.contacts.get_mut(min_contact) {
            contact.flags.insert(ContactFlags::ISLAND);
        }
        contacts.push(min_contact);

        for seed in [body_a, body_b] {
            let Some(body) = self.graph.bodies.get(seed) else {
                continue;
            };
            if !body.is_dynamic() {
                continue;
            }
            let seed_bullet = body.bullet;
            let edges: Vec<_> = body.contact_edges.iter().rev().copied().collect();

            for edge in edges {
                if bodies.len() == MAX_TOI_BODIES || contacts.len() == MAX_TOI_CONTACTS {
                    break;
                }

                let Some(contact) = self.graph.contacts.get(edge.contact) else {
                    continue;
                };
                if contact.flags.contains(ContactFlags::ISLAND) || self.graph.involves_sensor(contact) {
                    continue;
                }
                let Some(other) = self.graph.bodies.get_mut(edge.other) else {
                    continue;
                };
                if other.is_dynamic() && !seed_bullet && !other.bullet {
                    continue;
                }

                // Tentatively advance the neighbour to the impact time.
                let backup = other.sweep;
                if !other.island_flag {
                    other.advance(min_alpha);
                }

                self.contact_manager.update_contact(&mut self.graph, edge.contact);

                let usable = self
                    .graph
                    .contacts
                    .get(edge.contact)
                    .is_some_and(|c| c.is_enabled() && c.is_touching());
                let Some(other) = self.graph.bodies.get_mut(edge.other) else {
                    continue;
                };
                if !usable {
                    other.sweep = backup;
                    other.synchronize_transform();
                    continue;
                }

                if let Some(contact) = self.graph.contacts.get_mut(edge.contact) {
                    contact.flags.insert(ContactFlags::ISLAND);
                }
                contacts.push(edge.contact);

                if other.island_flag {
                    continue;
                }
                other.island_flag = true;
                if !other.is_static() {
                    other.set_awake(true);
                }
                bodies.push(edge.other);
            }
        }

        (bodies, contacts)
    }
}

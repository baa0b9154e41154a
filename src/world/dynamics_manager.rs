//! Discrete island solve for one step.

use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    collision::contact::ContactImpulse,
    core::graph::{ContactId, JointId},
    dynamics::{
        island::{Island, JointSlot},
        solver::TimeStep,
    },
    utils::profiling::ScopedTimer,
    world::World,
};
use glam::Vec2;

impl World {
    /// Builds islands over awake bodies, solves each, writes the results back
    /// and refreshes the broad-phase for every body that moved.
    pub(super) fn solve(&mut self, step: &TimeStep) {
        let island_count = self.island_builder.build(&mut self.graph);
        self.profile.island_count = island_count;

        let builder = &self.island_builder;
        let graph = &self.graph;
        let mut islands: Vec<Island<'_>> = builder
            .islands()
            .iter()
            .map(|range| Island::gather(graph, builder.bodies(range), builder.contacts(range)))
            .collect();

        // Hand each island mutable access to its joints, in discovery order.
        let mut placement: HashMap<JointId, (usize, usize)> = HashMap::new();
        let mut pending: Vec<Vec<Option<JointSlot<'_>>>> = Vec::with_capacity(island_count);
        for (island_index, range) in builder.islands().iter().enumerate() {
            let joints = builder.joints(range);
            for (position, &joint) in joints.iter().enumerate() {
                placement.insert(joint, (island_index, position));
            }
            pending.push((0..joints.len()).map(|_| None).collect());
        }
        for (id, record) in self.graph.joints.iter_mut() {
            let Some(&(island_index, position)) = placement.get(&id) else {
                continue;
            };
            let island = &islands[island_index];
            let (Some(body_a), Some(body_b)) =
                (island.index_of(record.body_a), island.index_of(record.body_b))
            else {
                continue;
            };
            pending[island_index][position] = Some(JointSlot {
                id,
                joint: record.joint.as_mut(),
                body_a,
                body_b,
            });
        }
        for (island, slots) in islands.iter_mut().zip(pending) {
            for slot in slots.into_iter().flatten() {
                island.push_joint(slot);
            }
        }

        let asleep = solve_islands(
            &mut islands,
            step,
            self.settings.gravity,
            self.settings.allow_sleep,
            self.settings.parallel_islands,
        );
        if asleep > 0 {
            log::trace!("{asleep} of {island_count} islands fell asleep");
        }

        let mut reports: Vec<(ContactId, ContactImpulse)> = Vec::new();
        for island in &islands {
            island.timings.merge_into(&mut self.profile);
            for body in &island.bodies {
                if let Some(target) = self.graph.bodies.get_mut(body.id) {
                    body.write_back(target);
                }
            }
            for ((&id, manifold), impulse) in island
                .contacts
                .iter()
                .zip(&island.manifolds)
                .zip(&island.impulses)
            {
                if let Some(contact) = self.graph.contacts.get_mut(id) {
                    contact.manifold = *manifold;
                }
                reports.push((id, *impulse));
            }
        }
        drop(islands);

        self.contact_manager.post_solve(&self.graph, &reports);

        let _timer = ScopedTimer::new(&mut self.profile.broadphase);
        for id in self.graph.body_list.ids(&self.graph.bodies) {
            let moved = self
                .graph
                .bodies
                .get(id)
                .is_some_and(|body| body.island_flag && !body.is_static());
            if moved {
                self.contact_manager.synchronize_body(&mut self.graph, id);
            }
        }
        self.contact_manager.find_new_contacts(&mut self.graph);
    }
}

/// Solves every island and returns how many fell asleep.
#[cfg(feature = "parallel")]
fn solve_islands(
    islands: &mut [Island<'_>],
    step: &TimeStep,
    gravity: Vec2,
    allow_sleep: bool,
    parallel: bool,
) -> usize {
    if parallel && islands.len() > 1 {
        islands
            .par_iter_mut()
            .map(|island| usize::from(island.solve(step, gravity, allow_sleep)))
            .sum()
    } else {
        islands
            .iter_mut()
            .map(|island| usize::from(island.solve(step, gravity, allow_sleep)))
            .sum()
    }
}

#[cfg(not(feature = "parallel"))]
fn solve_islands(
    islands: &mut [Island<'_>],
    step: &TimeStep,
    gravity: Vec2,
    allow_sleep: bool,
    _parallel: bool,
) -> usize {
    islands
        .iter_mut()
        .map(|island| usize::from(island.solve(step, gravity, allow_sleep)))
        .sum()
}

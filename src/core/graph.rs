//! The interaction graph: bodies, fixtures, contacts and joints plus their adjacency.

use crate::{
    collision::contact::{Contact, ContactEdge, ContactFlags},
    core::{
        body::Body,
        constraints::{JointEdge, JointRecord},
        fixture::Fixture,
    },
    utils::allocator::{Arena, Handle, Registry},
};

pub type BodyId = Handle<Body>;
pub type FixtureId = Handle<Fixture>;
pub type ContactId = Handle<Contact>;
pub type JointId = Handle<JointRecord>;

/// Owner of every simulated entity.
///
/// Edges are plain back-references stored on the bodies; the arenas own
/// the entities. Every mutation keeps both ends of an edge in sync.
#[derive(Default)]
pub struct InteractionGraph {
    pub(crate) bodies: Arena<Body>,
    pub(crate) body_list: Registry<Body>,
    pub(crate) fixtures: Arena<Fixture>,
    pub(crate) contacts: Arena<Contact>,
    pub(crate) contact_list: Registry<Contact>,
    pub(crate) joints: Arena<JointRecord>,
    pub(crate) joint_list: Registry<JointRecord>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(id)
    }

    pub fn contact(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(id)
    }

    pub fn joint(&self, id: JointId) -> Option<&JointRecord> {
        self.joints.get(id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    /// Bodies, most recently created first.
    pub fn body_ids(&self) -> Vec<BodyId> {
        self.body_list.ids(&self.bodies)
    }

    /// Contacts, most recently created first.
    pub fn contact_ids(&self) -> Vec<ContactId> {
        self.contact_list.ids(&self.contacts)
    }

    /// Joints, most recently created first.
    pub fn joint_ids(&self) -> Vec<JointId> {
        self.joint_list.ids(&self.joints)
    }

    pub(crate) fn insert_body(&mut self, body: Body) -> BodyId {
        let id = self.bodies.insert(body);
        self.body_list.push_front(&mut self.bodies, id);
        id
    }

    pub(crate) fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        self.body_list.unlink(&mut self.bodies, id);
        let body = self.bodies.remove(id)?;
        debug_assert!(body.contact_edges.is_empty() && body.joint_edges.is_empty());
        Some(body)
    }

    /// Registers a contact and its edge on both bodies.
    pub(crate) fn insert_contact(&mut self, contact: Contact) -> ContactId {
        let (body_a, body_b) = (contact.body_a, contact.body_b);
        let id = self.contacts.insert(contact);
        self.contact_list.push_front(&mut self.contacts, id);
        if let Some(body) = self.bodies.get_mut(body_a) {
            body.contact_edges.push(ContactEdge {
                other: body_b,
                contact: id,
            });
        }
        if let Some(body) = self.bodies.get_mut(body_b) {
            body.contact_edges.push(ContactEdge {
                other: body_a,
                contact: id,
            });
        }
        id
    }

    /// Unlinks a contact from the registry and both bodies and frees it.
    pub(crate) fn remove_contact(&mut self, id: ContactId) -> Option<Contact> {
        let (body_a, body_b) = {
            let contact = self.contacts.get(id)?;
            (contact.body_a, contact.body_b)
        };
        for body_id in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.contact_edges.retain(|edge| edge.contact != id);
            }
        }
        self.contact_list.unlink(&mut self.contacts, id);
        self.contacts.remove(id)
    }

    pub(crate) fn insert_joint(&mut self, record: JointRecord) -> JointId {
        let (body_a, body_b, collide_connected) =
            (record.body_a, record.body_b, record.collide_connected);
        let id = self.joints.insert(record);
        self.joint_list.push_front(&mut self.joints, id);
        if let Some(body) = self.bodies.get_mut(body_a) {
            body.joint_edges.push(JointEdge {
                other: body_b,
                joint: id,
                collide_connected,
            });
        }
        if let Some(body) = self.bodies.get_mut(body_b) {
            body.joint_edges.push(JointEdge {
                other: body_a,
                joint: id,
                collide_connected,
            });
        }
        id
    }

    pub(crate) fn remove_joint(&mut self, id: JointId) -> Option<JointRecord> {
        let (body_a, body_b) = {
            let record = self.joints.get(id)?;
            (record.body_a, record.body_b)
        };
        for body_id in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.joint_edges.retain(|edge| edge.joint != id);
            }
        }
        self.joint_list.unlink(&mut self.joints, id);
        self.joints.remove(id)
    }

    pub(crate) fn involves_sensor(&self, contact: &Contact) -> bool {
        [contact.fixture_a, contact.fixture_b]
            .iter()
            .any(|&id| self.fixtures.get(id).is_some_and(|f| f.is_sensor))
    }

    /// Marks every contact between two bodies for re-filtering.
    pub(crate) fn flag_contacts_between(&mut self, body_a: BodyId, body_b: BodyId) {
        let Some(body) = self.bodies.get(body_b) else {
            return;
        };
        for edge in body.contact_edges.iter().filter(|edge| edge.other == body_a) {
            if let Some(contact) = self.contacts.get_mut(edge.contact) {
                contact.flags.insert(ContactFlags::FILTER);
            }
        }
    }

    /// Marks every contact touching a fixture for re-filtering.
    pub(crate) fn flag_contacts_of_fixture(&mut self, fixture: FixtureId) {
        let Some(body) = self.fixtures.get(fixture).and_then(|f| self.bodies.get(f.body)) else {
            return;
        };
        for edge in &body.contact_edges {
            if let Some(contact) = self.contacts.get_mut(edge.contact) {
                if contact.fixture_a == fixture || contact.fixture_b == fixture {
                    contact.flags.insert(ContactFlags::FILTER);
                }
            }
        }
    }

    /// Checks that every edge points at live entities that point back.
    pub fn validate_edges(&self) -> bool {
        self.bodies.iter().all(|(body_id, body)| {
            body.contact_edges.iter().all(|edge| {
                self.contacts.get(edge.contact).is_some_and(|c| {
                    (c.body_a == body_id && c.body_b == edge.other)
                        || (c.body_b == body_id && c.body_a == edge.other)
                }) && self.bodies.contains(edge.other)
            }) && body.joint_edges.iter().all(|edge| {
                self.joints.get(edge.joint).is_some_and(|j| {
                    (j.body_a == body_id && j.body_b == edge.other)
                        || (j.body_b == body_id && j.body_a == edge.other)
                }) && self.bodies.contains(edge.other)
            })
        })
    }
}

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Unique identifier with generation tracking to prevent stale references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GenerationalId {
    pub index: usize,
    pub generation: u32,
}

impl GenerationalId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Typed handle into an [`Arena<T>`].
///
/// Handles of different entity kinds cannot be mixed up, and a handle whose
/// slot was freed and reused resolves to `None`.
pub struct Handle<T> {
    id: GenerationalId,
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn new(index: usize, generation: u32) -> Self {
        Self {
            id: GenerationalId::new(index, generation),
            marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.id.index
    }

    pub fn generation(&self) -> u32 {
        self.id.generation
    }

    pub fn raw(&self) -> GenerationalId {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.id.index, self.id.generation)
    }
}

/// Generational arena that hands out stable IDs while preventing use-after-free.
pub struct Arena<T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free_list.pop_front() {
            let generation = self.generations[index];
            self.items[index] = Some(item);
            return Handle::new(index, generation);
        }

        let index = self.items.len();
        self.items.push(Some(item));
        self.generations.push(0);
        Handle::new(index, 0)
    }

    pub fn get(&self, id: Handle<T>) -> Option<&T> {
        if self.is_valid(id) {
            self.items.get(id.index()).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: Handle<T>) -> Option<&mut T> {
        if self.is_valid(id) {
            self.items.get_mut(id.index()).and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    pub fn get2_mut(&mut self, id_a: Handle<T>, id_b: Handle<T>) -> Option<(&mut T, &mut T)> {
        if id_a.index() == id_b.index() {
            return None;
        }

        if !self.is_valid(id_a) || !self.is_valid(id_b) {
            return None;
        }

        let (first, second, flipped) = if id_a.index() < id_b.index() {
            (id_a, id_b, false)
        } else {
            (id_b, id_a, true)
        };

        let (left, right) = self.items.split_at_mut(second.index());
        let first_slot = left
            .get_mut(first.index())
            .and_then(|slot| slot.as_mut())?;
        let second_slot = right.get_mut(0).and_then(|slot| slot.as_mut())?;

        if flipped {
            Some((second_slot, first_slot))
        } else {
            Some((first_slot, second_slot))
        }
    }

    pub fn contains(&self, id: Handle<T>) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: Handle<T>) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }
        let slot = self.items.get_mut(id.index())?;
        let item = slot.take()?;
        self.generations[id.index()] = self.generations[id.index()].wrapping_add(1);
        self.free_list.push_back(id.index());
        self.len -= 1;
        Some(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|item| (Handle::new(index, self.generations[index]), item))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> + '_ {
        let generations = &self.generations;
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, slot)| {
                slot.as_mut()
                    .map(|item| (Handle::new(index, generations[index]), item))
            })
    }

    pub fn ids(&self) -> impl Iterator<Item = Handle<T>> + '_ {
        self.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_valid(&self, id: Handle<T>) -> bool {
        self.generations
            .get(id.index())
            .copied()
            .map(|gen| gen == id.generation())
            .unwrap_or(false)
    }
}

/// Intrusive prev/next pointers stored inside each registry member.
pub struct Links<T> {
    pub prev: Option<Handle<T>>,
    pub next: Option<Handle<T>>,
}

impl<T> Default for Links<T> {
    fn default() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }
}

impl<T> Clone for Links<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Links<T> {}

impl<T> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Entities that can be threaded into a [`Registry`].
pub trait Linked: Sized {
    fn links(&self) -> &Links<Self>;
    fn links_mut(&mut self) -> &mut Links<Self>;
}

/// Doubly linked registry threaded through arena slots.
///
/// New members are pushed at the head, so iteration visits the most recently
/// created entity first. Traversal order drives solver ordering and must stay
/// reproducible.
pub struct Registry<T> {
    head: Option<Handle<T>>,
    len: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self { head: None, len: 0 }
    }
}

impl<T: Linked> Registry<T> {
    pub fn head(&self) -> Option<Handle<T>> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_front(&mut self, arena: &mut Arena<T>, id: Handle<T>) {
        let old_head = self.head;
        if let Some(item) = arena.get_mut(id) {
            *item.links_mut() = Links {
                prev: None,
                next: old_head,
            };
        } else {
            return;
        }
        if let Some(old) = old_head.and_then(|head| arena.get_mut(head)) {
            old.links_mut().prev = Some(id);
        }
        self.head = Some(id);
        self.len += 1;
    }

    pub fn unlink(&mut self, arena: &mut Arena<T>, id: Handle<T>) {
        let links = match arena.get(id) {
            Some(item) => *item.links(),
            None => return,
        };
        if let Some(prev) = links.prev.and_then(|prev| arena.get_mut(prev)) {
            prev.links_mut().next = links.next;
        }
        if let Some(next) = links.next.and_then(|next| arena.get_mut(next)) {
            next.links_mut().prev = links.prev;
        }
        if self.head == Some(id) {
            self.head = links.next;
        }
        if let Some(item) = arena.get_mut(id) {
            *item.links_mut() = Links::default();
        }
        self.len -= 1;
    }

    pub fn next(arena: &Arena<T>, id: Handle<T>) -> Option<Handle<T>> {
        arena.get(id).and_then(|item| item.links().next)
    }

    /// Walks the registry from the head.
    pub fn iter<'a>(&self, arena: &'a Arena<T>) -> impl Iterator<Item = Handle<T>> + 'a {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = Self::next(arena, current);
            Some(current)
        })
    }

    /// Snapshot of the current order, safe to hold across mutation.
    pub fn ids(&self, arena: &Arena<T>) -> Vec<Handle<T>> {
        let mut ids = Vec::with_capacity(self.len);
        ids.extend(self.iter(arena));
        ids
    }
}

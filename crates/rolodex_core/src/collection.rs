//! Ordered in-memory collections of entities.
//!
//! # Responsibility
//! - Keep entities of one kind in insertion order.
//! - Provide the lookup, removal, sorting, range and set-like operations the
//!   rest of the crate queries through.
//!
//! # Invariants
//! - Ids are not unique inside a collection; lookups return the first match.
//! - Missing entities are an absent result, never an error.
//! - Sorting is stable, but callers must not rely on the relative order of
//!   entities sharing the same key.
//! - Range queries are inclusive and never return urgent entities.

use crate::model::contact::Contact;
use crate::model::date::Date;
use crate::model::interaction::Interaction;
use crate::model::task::Task;
use crate::model::{Entity, EntityId, Owned};
use std::fmt::{Display, Formatter};

/// Insertion-ordered list of entities of one kind.
#[derive(Debug, Clone)]
pub struct EntityCollection<T> {
    items: Vec<T>,
}

impl<T> Default for EntityCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> EntityCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Entity> EntityCollection<T> {
    /// Appends without any uniqueness check.
    pub fn add(&mut self, entity: T) {
        self.items.push(entity);
    }

    pub fn get_by_id(&self, id: EntityId) -> Option<&T> {
        self.items.iter().find(|entity| entity.id() == id)
    }

    pub(crate) fn get_by_id_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.items.iter_mut().find(|entity| entity.id() == id)
    }

    pub fn contains_id(&self, id: EntityId) -> bool {
        self.get_by_id(id).is_some()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.items.iter().map(T::id).collect()
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
    }

    /// Removes the first entity carrying `id`, if any.
    pub fn remove_id(&mut self, id: EntityId) -> Option<T> {
        let index = self.items.iter().position(|entity| entity.id() == id)?;
        Some(self.items.remove(index))
    }

    /// Removes the first entity structurally equal to `entity`.
    ///
    /// Returns `false` when nothing matched.
    pub fn remove_first_matching(&mut self, entity: &T) -> bool {
        match self.items.iter().position(|candidate| candidate == entity) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Sorts chronologically, newest first when `reverse` is set.
    pub fn sort_by_date(&mut self, reverse: bool) {
        if reverse {
            self.items.sort_by(|a, b| b.date().cmp(&a.date()));
        } else {
            self.items.sort_by_key(T::date);
        }
    }

    /// Entities dated inside `[lower, upper]`, both bounds inclusive.
    ///
    /// Urgent entities have no concrete date and are never part of a range.
    pub fn between(&self, lower: Date, upper: Date) -> Self {
        self.filtered(|entity| {
            let date = entity.date();
            !date.is_urgent() && date >= lower && date <= upper
        })
    }

    /// Entities carrying the urgent sentinel date.
    pub fn urgent(&self) -> Self {
        self.filtered(|entity| entity.date().is_urgent())
    }

    /// Copies every element of `other` onto the end of `self`.
    pub fn append_all(&mut self, other: &Self) {
        self.items.extend(other.items.iter().cloned());
    }

    /// New collection holding `self` followed by `other`.
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.append_all(other);
        merged
    }

    /// Copy of `self` with at most one structural match of `entity` removed.
    pub fn without(&self, entity: &T) -> Self {
        let mut remaining = self.clone();
        remaining.remove_first_matching(entity);
        remaining
    }

    fn filtered(&self, predicate: impl Fn(&T) -> bool) -> Self {
        self.items
            .iter()
            .filter(|entity| predicate(entity))
            .cloned()
            .collect()
    }
}

impl<T: Owned> EntityCollection<T> {
    /// Entities whose `owner_id` equals `owner_id`.
    pub fn owned_by(&self, owner_id: EntityId) -> Self {
        self.filtered(|entity| entity.owner_id() == owner_id)
    }
}

impl EntityCollection<Contact> {
    /// Sorts by full name (`"last first"`), descending when `reverse` is set.
    pub fn sort_by_name(&mut self, reverse: bool) {
        if reverse {
            self.items.sort_by_key(|contact| std::cmp::Reverse(contact.full_name()));
        } else {
            self.items.sort_by_key(Contact::full_name);
        }
    }

    /// Contacts whose full name contains `needle`.
    pub fn search_by_name(&self, needle: &str) -> Self {
        self.filtered(|contact| contact.full_name().contains(needle))
    }

    /// Contacts whose company contains `needle`.
    pub fn search_by_company(&self, needle: &str) -> Self {
        self.filtered(|contact| contact.company().contains(needle))
    }

    pub fn tasks_between(&self, lower: Date, upper: Date) -> EntityCollection<Task> {
        self.collect_children(|contact| contact.tasks_between(lower, upper))
    }

    pub fn urgent_tasks(&self) -> EntityCollection<Task> {
        self.collect_children(Contact::urgent_tasks)
    }

    pub fn interactions_between(&self, lower: Date, upper: Date) -> EntityCollection<Interaction> {
        self.collect_children(|contact| contact.interactions_between(lower, upper))
    }

    pub fn urgent_interactions(&self) -> EntityCollection<Interaction> {
        self.collect_children(Contact::urgent_interactions)
    }

    /// Every contact's interactions merged and sorted by date.
    pub fn interactions_sorted_by_date(&self, reverse: bool) -> EntityCollection<Interaction> {
        let mut merged = self.collect_children(|contact| contact.interactions().clone());
        merged.sort_by_date(reverse);
        merged
    }

    /// Every contact's tasks merged and sorted by date.
    pub fn tasks_sorted_by_date(&self, reverse: bool) -> EntityCollection<Task> {
        let mut merged = self.collect_children(|contact| contact.tasks().clone());
        merged.sort_by_date(reverse);
        merged
    }

    fn collect_children<C: Entity>(
        &self,
        children: impl Fn(&Contact) -> EntityCollection<C>,
    ) -> EntityCollection<C> {
        let mut merged = EntityCollection::new();
        for contact in &self.items {
            merged.append_all(&children(contact));
        }
        merged
    }
}

impl<T> FromIterator<T> for EntityCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> From<Vec<T>> for EntityCollection<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> IntoIterator for EntityCollection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a EntityCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Display> Display for EntityCollection<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Collection ({}):", self.items.len())?;
        for item in &self.items {
            writeln!(f, "    ->{item}")?;
        }
        Ok(())
    }
}

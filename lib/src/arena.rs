//! Dense, insertion-ordered storage addressed by typed ids.

use std::{
    marker::PhantomData,
    ops::{Index, IndexMut, Range},
};

#[derive(Clone, Debug, PartialEq)]
pub struct Arena<Id: IdLike + Copy, T> {
    inner: Vec<T>,
    _phantom: PhantomData<Id>,
}

impl<Id: IdLike + Copy, T> Arena<Id, T> {
    pub fn new() -> Self {
        Self {
            inner: Vec::new(),
            _phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn push(&mut self, x: T) -> Id {
        let id = Id::from_raw(self.inner.len());
        self.inner.push(x);
        id
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.inner.get(id.into_raw())
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.inner.get_mut(id.into_raw())
    }

    /// Ids in insertion order. The iterator does not borrow the arena,
    /// so entries may be mutated while walking it.
    pub fn ids(&self) -> Ids<Id> {
        Ids {
            range: 0..self.inner.len(),
            _phantom: PhantomData,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &T)> {
        self.inner
            .iter()
            .enumerate()
            .map(|(i, v)| (Id::from_raw(i), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Id, &mut T)> {
        self.inner
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (Id::from_raw(i), v))
    }
}

impl<Id: IdLike + Copy, T> Default for Arena<Id, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: IdLike + Copy, T> Index<Id> for Arena<Id, T> {
    type Output = T;

    fn index(&self, index: Id) -> &Self::Output {
        &self.inner[index.into_raw()]
    }
}

impl<Id: IdLike + Copy, T> IndexMut<Id> for Arena<Id, T> {
    fn index_mut(&mut self, index: Id) -> &mut Self::Output {
        &mut self.inner[index.into_raw()]
    }
}

#[derive(Clone, Debug)]
pub struct Ids<Id> {
    range: Range<usize>,
    _phantom: PhantomData<Id>,
}

impl<Id: IdLike> Iterator for Ids<Id> {
    type Item = Id;

    fn next(&mut self) -> Option<Self::Item> {
        self.range.next().map(Id::from_raw)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl<Id: IdLike> ExactSizeIterator for Ids<Id> {}

pub trait IdLike {
    fn from_raw(index: usize) -> Self;
    fn into_raw(self) -> usize;
}

#[cfg(test)]
#[derive(Copy, Clone, Debug, PartialEq)]
struct TestId(usize);

#[cfg(test)]
impl IdLike for TestId {
    fn from_raw(index: usize) -> Self {
        Self(index)
    }

    fn into_raw(self) -> usize {
        self.0
    }
}

#[test]
fn ids_follow_insertion_order() {
    let mut arena: Arena<TestId, &str> = Arena::new();
    let a = arena.push("sol");
    let b = arena.push("terra");
    assert_eq!(arena.ids().collect::<Vec<_>>(), vec![a, b]);
    for id in arena.ids() {
        arena[id] = "x";
    }
    assert_eq!(arena[b], "x");
    assert!(arena.get(TestId(2)).is_none());
}

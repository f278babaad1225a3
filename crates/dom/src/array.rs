use itertools::{EitherOrBoth, Itertools};
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::raw::RawVec;
use crate::{Error, Storage, Value};

/// The most elements an [`Array`] may hold.
pub const MAX_ARRAY_LEN: usize = (u32::MAX - 1) as usize;

/// Array is a contiguous sequence of [`Value`]s sharing one [`Storage`].
/// Values pushed or inserted under a different storage are copied into
/// this array's storage first, so that everything a container owns lives
/// in one resource.
pub struct Array<'s> {
    storage: Storage<'s>,
    vec: RawVec<Value<'s>>,
}

impl<'s> Array<'s> {
    pub fn new_in(storage: Storage<'s>) -> Self {
        Self {
            storage,
            vec: RawVec::new(),
        }
    }

    pub fn with_capacity_in(capacity: usize, storage: Storage<'s>) -> Result<Self, Error> {
        if capacity > MAX_ARRAY_LEN {
            return Err(Error::ArrayTooLarge);
        }
        Ok(Self {
            storage,
            vec: RawVec::with_capacity(capacity, storage),
        })
    }

    pub fn storage(&self) -> Storage<'s> {
        self.storage
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.vec.capacity()
    }

    pub fn push(&mut self, value: Value<'s>) -> Result<(), Error> {
        if self.len() == MAX_ARRAY_LEN {
            return Err(Error::ArrayTooLarge);
        }
        let value = self.adopt(value);
        self.vec.push(value, self.storage);
        Ok(())
    }

    /// Insert at `index`, shifting later elements up.
    pub fn insert(&mut self, index: usize, value: Value<'s>) -> Result<(), Error> {
        if self.len() == MAX_ARRAY_LEN {
            return Err(Error::ArrayTooLarge);
        }
        let value = self.adopt(value);
        self.vec.insert(index, value, self.storage);
        Ok(())
    }

    /// Remove and return the element at `index`, shifting later elements
    /// down. Panics if out of bounds.
    pub fn remove(&mut self, index: usize) -> Value<'s> {
        self.vec.remove(index)
    }

    pub fn pop(&mut self) -> Option<Value<'s>> {
        match self.len() {
            0 => None,
            n => Some(self.vec.remove(n - 1)),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value<'s>> {
        self.vec.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value<'s>> {
        self.vec.as_mut_slice().get_mut(index)
    }

    pub fn as_slice(&self) -> &[Value<'s>] {
        self.vec.as_slice()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value<'s>> {
        self.vec.as_slice().iter()
    }

    /// Deep copy into `storage`.
    pub fn clone_in<'t>(&self, storage: Storage<'t>) -> Array<'t> {
        let mut vec = RawVec::with_capacity(self.len(), storage);
        for value in self.iter() {
            vec.push(value.clone_in(storage), storage);
        }
        Array { storage, vec }
    }

    fn adopt(&self, value: Value<'s>) -> Value<'s> {
        if value.storage() == self.storage {
            value
        } else {
            value.clone_in(self.storage)
        }
    }
}

impl<'s> Drop for Array<'s> {
    fn drop(&mut self) {
        // An arena reclaims everything wholesale; skip the walk.
        if !self.storage.needs_free() {
            return;
        }
        for value in self.vec.as_mut_slice() {
            // Safety: dropped exactly once; the backing block is freed
            // without further reads.
            unsafe { std::ptr::drop_in_place(value) };
        }
        self.vec.free(self.storage);
    }
}

impl<'s> Clone for Array<'s> {
    fn clone(&self) -> Self {
        self.clone_in(self.storage)
    }
}

impl<'s> Deref for Array<'s> {
    type Target = [Value<'s>];

    fn deref(&self) -> &[Value<'s>] {
        self.vec.as_slice()
    }
}

impl<'s> DerefMut for Array<'s> {
    fn deref_mut(&mut self) -> &mut [Value<'s>] {
        self.vec.as_mut_slice()
    }
}

impl<'s, 't> PartialEq<Array<'t>> for Array<'s> {
    fn eq(&self, other: &Array<'t>) -> bool {
        self.iter()
            .zip_longest(other.iter())
            .all(|eob| matches!(eob, EitherOrBoth::Both(lhs, rhs) if lhs == rhs))
    }
}

impl<'s, 'a> IntoIterator for &'a Array<'s> {
    type Item = &'a Value<'s>;
    type IntoIter = std::slice::Iter<'a, Value<'s>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s> fmt::Debug for Array<'s> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

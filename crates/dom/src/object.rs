use std::alloc::Layout;
use std::ptr::NonNull;
use std::{fmt, mem, ptr};

use lazy_static::lazy_static;

use crate::raw::RawVec;
use crate::{Error, Storage, Value};

/// The most members an [`Object`] may hold.
pub const MAX_OBJECT_LEN: usize = (u32::MAX - 1) as usize;

// Chain terminator within slot and bucket indices.
const NONE: u32 = u32::MAX;

// Bucket counts are drawn from this roughly-doubling prime schedule.
const BUCKET_PRIMES: [u32; 31] = [
    3, 7, 13, 29, 53, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613,
    393241, 786433, 1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319, 201326611,
    402653189, 805306457, 1610612741, 4294967291,
];

lazy_static! {
    // Per-process hash salt, seeded by where the loader placed us.
    static ref HASH_SEED: u64 = {
        let anchor = BUCKET_PRIMES.as_ptr() as usize as u64;
        xxhash_rust::xxh3::xxh3_64_with_seed(&anchor.to_le_bytes(), 0x9e3779b97f4a7c15)
    };
}

fn hash_key(key: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64_with_seed(key, *HASH_SEED)
}

// An object key: a thin pointer to {len: u32, bytes..} in the object's
// storage. Keys are copied in at insertion and immutable thereafter.
struct Key {
    ptr: NonNull<u8>,
}

const KEY_HEADER: usize = mem::size_of::<u32>();

impl Key {
    fn new(bytes: &[u8], storage: Storage<'_>) -> Self {
        let ptr = storage.allocate(Self::layout(bytes.len()));
        // Safety: the block admits the length header and the key bytes.
        unsafe {
            (ptr.as_ptr() as *mut u32).write(bytes.len() as u32);
            ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr().add(KEY_HEADER), bytes.len());
        }
        Self { ptr }
    }

    fn as_bytes(&self) -> &[u8] {
        // Safety: written by `new`.
        unsafe {
            let len = *(self.ptr.as_ptr() as *const u32) as usize;
            std::slice::from_raw_parts(self.ptr.as_ptr().add(KEY_HEADER), len)
        }
    }

    fn layout(len: usize) -> Layout {
        Layout::from_size_align(KEY_HEADER + len, mem::align_of::<u32>()).expect("key layout")
    }

    // Safety: the key was allocated from `storage` and is not used again.
    unsafe fn free(&self, storage: Storage<'_>) {
        storage.deallocate(self.ptr, Self::layout(self.as_bytes().len()));
    }
}

/// Entry is one member of an [`Object`]: an immutable key, its value, and
/// the intrusive successor index of its bucket chain.
pub struct Entry<'s> {
    key: Key,
    next: u32,
    value: Value<'s>,
}

impl<'s> Entry<'s> {
    pub fn key(&self) -> &str {
        // Safety: keys originate from `&str` inserts, or from unchecked
        // inserts whose callers uphold UTF-8.
        unsafe { std::str::from_utf8_unchecked(self.key.as_bytes()) }
    }

    pub fn key_bytes(&self) -> &[u8] {
        self.key.as_bytes()
    }

    pub fn value(&self) -> &Value<'s> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value<'s> {
        &mut self.value
    }
}

/// Object is an insertion-ordered map from string keys to [`Value`]s.
///
/// Members live contiguously in insertion order in a slot array; a bucket
/// table of slot indices, chained through each entry's successor index,
/// serves lookups. Inserting an existing key keeps the original slot (and
/// its position) and replaces only the value.
///
/// [`Object::remove`] relocates the final slot into the vacated one to
/// keep the slot array contiguous, so removal does not preserve the
/// iteration position of that relocated member.
pub struct Object<'s> {
    storage: Storage<'s>,
    slots: RawVec<Entry<'s>>,
    buckets: RawVec<u32>,
}

impl<'s> Object<'s> {
    pub fn new_in(storage: Storage<'s>) -> Self {
        Self {
            storage,
            slots: RawVec::new(),
            buckets: RawVec::new(),
        }
    }

    pub fn with_capacity_in(capacity: usize, storage: Storage<'s>) -> Result<Self, Error> {
        if capacity > MAX_OBJECT_LEN {
            return Err(Error::ObjectTooLarge);
        }
        let mut obj = Self {
            storage,
            slots: RawVec::with_capacity(capacity, storage),
            buckets: RawVec::new(),
        };
        if capacity > 0 {
            obj.rehash(next_prime(capacity));
        }
        Ok(obj)
    }

    pub fn storage(&self) -> Storage<'s> {
        self.storage
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Members in insertion order.
    pub fn entries(&self) -> &[Entry<'s>] {
        self.slots.as_slice()
    }

    pub fn entry_at(&self, index: usize) -> Option<&Entry<'s>> {
        self.slots.as_slice().get(index)
    }

    pub fn entry_at_mut(&mut self, index: usize) -> Option<&mut Entry<'s>> {
        self.slots.as_mut_slice().get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry<'s>> {
        self.slots.as_slice().iter()
    }

    /// Insert `key`, replacing and returning the previous value if the key
    /// is present (its position is unchanged).
    pub fn insert(&mut self, key: &str, value: Value<'s>) -> Result<Option<Value<'s>>, Error> {
        // Safety: `key` is UTF-8.
        unsafe { self.insert_bytes(key.as_bytes(), value) }
    }

    /// Insert under a raw byte key.
    ///
    /// # Safety
    /// As [`crate::Str::from_utf8_unchecked`]: callers which will read the
    /// key back through [`Entry::key`] must pass valid UTF-8.
    pub unsafe fn insert_bytes(
        &mut self,
        key: &[u8],
        value: Value<'s>,
    ) -> Result<Option<Value<'s>>, Error> {
        let value = self.adopt(value);
        let hash = hash_key(key);

        if let Some((index, _, _)) = self.find(key, hash) {
            let slot = &mut self.slots.as_mut_slice()[index];
            return Ok(Some(mem::replace(&mut slot.value, value)));
        }
        if self.len() == MAX_OBJECT_LEN {
            return Err(Error::ObjectTooLarge);
        }

        if self.len() + 1 > self.bucket_count() {
            self.rehash(next_prime(self.len() + 1));
        }
        let bucket = (hash % self.bucket_count() as u64) as usize;
        let head = self.buckets.as_slice()[bucket];
        let index = self.len() as u32;
        self.slots.push(
            Entry {
                key: Key::new(key, self.storage),
                next: head,
                value,
            },
            self.storage,
        );
        self.buckets.as_mut_slice()[bucket] = index;
        Ok(None)
    }

    pub fn get(&self, key: &str) -> Option<&Value<'s>> {
        self.get_bytes(key.as_bytes())
    }

    pub fn get_bytes(&self, key: &[u8]) -> Option<&Value<'s>> {
        let (index, _, _) = self.find(key, hash_key(key))?;
        Some(&self.slots.as_slice()[index].value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value<'s>> {
        let (index, _, _) = self.find(key.as_bytes(), hash_key(key.as_bytes()))?;
        Some(&mut self.slots.as_mut_slice()[index].value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key.as_bytes(), hash_key(key.as_bytes())).is_some()
    }

    /// Remove `key`, returning its value. The final slot is relocated into
    /// the vacated position (see the type docs for the ordering caveat).
    pub fn remove(&mut self, key: &str) -> Option<Value<'s>> {
        self.remove_bytes(key.as_bytes())
    }

    pub fn remove_bytes(&mut self, key: &[u8]) -> Option<Value<'s>> {
        let (index, bucket, prev) = self.find(key, hash_key(key))?;
        let last = self.len() - 1;

        // Unlink from its chain.
        let next = self.slots.as_slice()[index].next;
        if prev == NONE {
            self.buckets.as_mut_slice()[bucket] = next;
        } else {
            self.slots.as_mut_slice()[prev as usize].next = next;
        }

        // Safety: `index` is unlinked; the slot is read exactly once, and
        // either backfilled from `last` or dropped from the length.
        let entry = unsafe {
            let slots = self.slots.as_mut_slice().as_mut_ptr();
            let entry = ptr::read(slots.add(index));
            if index != last {
                // Bitwise relocation of the trivially-movable slot.
                ptr::write(slots.add(index), ptr::read(slots.add(last)));
                self.relink(last as u32, index as u32);
            }
            self.slots.set_len(last);
            entry
        };

        let Entry { key, next: _, value } = entry;
        if self.storage.needs_free() {
            // Safety: the key came from our storage and is now unreachable.
            unsafe { key.free(self.storage) };
        }
        Some(value)
    }

    /// Deep copy into `storage`.
    pub fn clone_in<'t>(&self, storage: Storage<'t>) -> Object<'t> {
        let mut out = Object::with_capacity_in(self.len(), storage).expect("size already admitted");
        for entry in self.iter() {
            // Safety: key bytes keep whatever UTF-8 status they had.
            unsafe {
                out.insert_bytes(entry.key_bytes(), entry.value.clone_in(storage))
                    .expect("size already admitted");
            }
        }
        out
    }

    // Locate `key`: (slot index, bucket index, predecessor slot or NONE).
    fn find(&self, key: &[u8], hash: u64) -> Option<(usize, usize, u32)> {
        if self.bucket_count() == 0 {
            return None;
        }
        let bucket = (hash % self.bucket_count() as u64) as usize;
        let slots = self.slots.as_slice();
        let mut prev = NONE;
        let mut index = self.buckets.as_slice()[bucket];
        while index != NONE {
            let slot = &slots[index as usize];
            if slot.key.as_bytes() == key {
                return Some((index as usize, bucket, prev));
            }
            prev = index;
            index = slot.next;
        }
        None
    }

    // Rewrite whichever chain link referenced slot `from` to reference
    // `to`, after a relocation.
    fn relink(&mut self, from: u32, to: u32) {
        let key = self.slots.as_slice()[to as usize].key.as_bytes();
        let bucket = (hash_key(key) % self.bucket_count() as u64) as usize;

        let head = self.buckets.as_slice()[bucket];
        if head == from {
            self.buckets.as_mut_slice()[bucket] = to;
            return;
        }
        let mut index = head;
        loop {
            let next = self.slots.as_slice()[index as usize].next;
            if next == from {
                self.slots.as_mut_slice()[index as usize].next = to;
                return;
            }
            debug_assert_ne!(next, NONE, "relocated slot must be reachable");
            index = next;
        }
    }

    // Rebuild the bucket table at `count` buckets, re-chaining slots in
    // order. The slot array itself is untouched.
    fn rehash(&mut self, count: u32) {
        let mut buckets = RawVec::with_capacity(count as usize, self.storage);
        // Safety: every bucket is initialized to NONE just below.
        unsafe { buckets.set_len(count as usize) };
        for head in buckets.as_mut_slice() {
            *head = NONE;
        }

        for index in 0..self.len() {
            let key = self.slots.as_slice()[index].key.as_bytes();
            let bucket = (hash_key(key) % count as u64) as usize;
            self.slots.as_mut_slice()[index].next = buckets.as_slice()[bucket];
            buckets.as_mut_slice()[bucket] = index as u32;
        }

        let mut old = mem::replace(&mut self.buckets, buckets);
        old.free(self.storage);
    }

    fn adopt(&self, value: Value<'s>) -> Value<'s> {
        if value.storage() == self.storage {
            value
        } else {
            value.clone_in(self.storage)
        }
    }
}

impl<'s> Drop for Object<'s> {
    fn drop(&mut self) {
        // An arena reclaims everything wholesale; skip the walk.
        if !self.storage.needs_free() {
            return;
        }
        for entry in self.slots.as_mut_slice() {
            // Safety: each member is torn down exactly once, then the
            // backing blocks are freed without further reads.
            unsafe {
                entry.key.free(self.storage);
                ptr::drop_in_place(&mut entry.value);
            }
        }
        self.slots.free(self.storage);
        self.buckets.free(self.storage);
    }
}

impl<'s> Clone for Object<'s> {
    fn clone(&self) -> Self {
        self.clone_in(self.storage)
    }
}

impl<'s, 't> PartialEq<Object<'t>> for Object<'s> {
    fn eq(&self, other: &Object<'t>) -> bool {
        // Unordered: every member matches by key, sizes equal.
        self.len() == other.len()
            && self
                .iter()
                .all(|e| other.get_bytes(e.key_bytes()) == Some(&e.value))
    }
}

impl<'s, 'a> IntoIterator for &'a Object<'s> {
    type Item = &'a Entry<'s>;
    type IntoIter = std::slice::Iter<'a, Entry<'s>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s> fmt::Debug for Object<'s> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|e| (e.key(), e.value())))
            .finish()
    }
}

fn next_prime(at_least: usize) -> u32 {
    for p in BUCKET_PRIMES {
        if p as usize >= at_least {
            return p;
        }
    }
    BUCKET_PRIMES[BUCKET_PRIMES.len() - 1]
}

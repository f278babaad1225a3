use dom::{Array, Object, Storage, Str, Value};

use crate::{Error, Handler};

// A staged, still-open container: children accumulate in the builder's
// flat scratch stacks from these watermarks up.
struct Frame {
    is_object: bool,
    values_at: u32,
    keys_at: u32,
}

/// TreeBuilder assembles a [`Value`] tree from parse events, allocating
/// from one [`Storage`].
///
/// Children of an open container are staged in scratch space and moved
/// into their final contiguous allocation in one step when the container
/// closes, so each array and object allocates exactly once at its final
/// size. Keys and string parts stage the same way. A later duplicate key
/// replaces the first occurrence's value in place.
pub struct TreeBuilder<'s> {
    storage: Storage<'s>,
    // Partial runs of the string, key, or comment currently in flight.
    stage: Vec<u8>,
    // Staged child values of every open container.
    values: Vec<Value<'s>>,
    // Staged keys: flat bytes plus (start, end) bounds.
    key_flat: Vec<u8>,
    key_bounds: Vec<(u32, u32)>,
    frames: Vec<Frame>,
    root: Option<Value<'s>>,
    error: Option<Error>,
}

impl<'s> TreeBuilder<'s> {
    pub fn new(storage: Storage<'s>) -> Self {
        Self {
            storage,
            stage: Vec::new(),
            values: Vec::new(),
            key_flat: Vec::new(),
            key_bounds: Vec::new(),
            frames: Vec::new(),
            root: None,
            error: None,
        }
    }

    pub fn storage(&self) -> Storage<'s> {
        self.storage
    }

    /// The error behind a halt this builder requested.
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// The completed tree, once the parser reported document end.
    pub fn into_value(self) -> Option<Value<'s>> {
        self.root
    }

    fn fail(&mut self, error: Error) -> bool {
        self.error = Some(error);
        false
    }

    fn push_value(&mut self, value: Value<'s>) -> bool {
        if self.frames.is_empty() {
            self.root = Some(value);
        } else {
            self.values.push(value);
        }
        true
    }

    // Size limits surfaced by the document model, mapped onto parse
    // errors.
    fn container_error(error: dom::Error) -> Error {
        match error {
            dom::Error::StringTooLarge => Error::StringTooLarge,
            dom::Error::ArrayTooLarge => Error::ArrayTooLarge,
            dom::Error::ObjectTooLarge => Error::ObjectTooLarge,
            _ => Error::Syntax,
        }
    }
}

impl<'s> Handler for TreeBuilder<'s> {
    fn on_document_begin(&mut self) -> bool {
        self.stage.clear();
        self.values.clear();
        self.key_flat.clear();
        self.key_bounds.clear();
        self.frames.clear();
        self.root = None;
        self.error = None;
        true
    }

    fn on_document_end(&mut self) -> bool {
        true
    }

    fn on_object_begin(&mut self) -> bool {
        self.frames.push(Frame {
            is_object: true,
            values_at: self.values.len() as u32,
            keys_at: self.key_bounds.len() as u32,
        });
        true
    }

    fn on_object_end(&mut self, _members: usize) -> bool {
        let frame = self.frames.pop().expect("an object frame is open");
        debug_assert!(frame.is_object);

        let values = self.values.split_off(frame.values_at as usize);
        let keys = self.key_bounds.split_off(frame.keys_at as usize);
        debug_assert_eq!(values.len(), keys.len());

        let mut obj = match Object::with_capacity_in(values.len(), self.storage) {
            Ok(obj) => obj,
            Err(err) => return self.fail(Self::container_error(err)),
        };
        for (&(start, end), value) in keys.iter().zip(values) {
            let key = &self.key_flat[start as usize..end as usize];
            // Safety: the parser validated these bytes (or its caller
            // opted out of validation, taking over the obligation).
            if let Err(err) = unsafe { obj.insert_bytes(key, value) } {
                return self.fail(Self::container_error(err));
            }
        }
        if let Some(&(start, _)) = keys.first() {
            self.key_flat.truncate(start as usize);
        }
        self.push_value(Value::from(obj))
    }

    fn on_array_begin(&mut self) -> bool {
        self.frames.push(Frame {
            is_object: false,
            values_at: self.values.len() as u32,
            keys_at: self.key_bounds.len() as u32,
        });
        true
    }

    fn on_array_end(&mut self, _elements: usize) -> bool {
        let frame = self.frames.pop().expect("an array frame is open");
        debug_assert!(!frame.is_object);

        let values = self.values.split_off(frame.values_at as usize);
        let mut arr = match Array::with_capacity_in(values.len(), self.storage) {
            Ok(arr) => arr,
            Err(err) => return self.fail(Self::container_error(err)),
        };
        for value in values {
            if let Err(err) = arr.push(value) {
                return self.fail(Self::container_error(err));
            }
        }
        self.push_value(Value::from(arr))
    }

    fn on_key_part(&mut self, part: &[u8]) -> bool {
        self.stage.extend_from_slice(part);
        true
    }

    fn on_key(&mut self, last: &[u8]) -> bool {
        let start = self.key_flat.len() as u32;
        self.key_flat.extend_from_slice(&self.stage);
        self.key_flat.extend_from_slice(last);
        self.stage.clear();
        self.key_bounds.push((start, self.key_flat.len() as u32));
        true
    }

    fn on_string_part(&mut self, part: &[u8]) -> bool {
        self.stage.extend_from_slice(part);
        true
    }

    fn on_string(&mut self, last: &[u8]) -> bool {
        // Bypass staging entirely for strings which arrived whole.
        let result = if self.stage.is_empty() {
            // Safety: as at `insert_bytes` above.
            unsafe { Str::from_utf8_unchecked(last, self.storage) }
        } else {
            self.stage.extend_from_slice(last);
            let result = unsafe { Str::from_utf8_unchecked(&self.stage, self.storage) };
            self.stage.clear();
            result
        };
        match result {
            Ok(s) => self.push_value(Value::from(s)),
            Err(err) => self.fail(Self::container_error(err)),
        }
    }

    fn on_int64(&mut self, v: i64) -> bool {
        self.push_value(Value::from_i64(v, self.storage))
    }

    fn on_uint64(&mut self, v: u64) -> bool {
        self.push_value(Value::from_u64(v, self.storage))
    }

    fn on_double(&mut self, v: f64) -> bool {
        self.push_value(Value::from_f64(v, self.storage))
    }

    fn on_bool(&mut self, v: bool) -> bool {
        self.push_value(Value::from_bool(v, self.storage))
    }

    fn on_null(&mut self) -> bool {
        self.push_value(Value::null(self.storage))
    }
}

use std::fmt;

use crate::{Array, Error, Object, Storage, Str};

/// Kind tags the eight variants a [`Value`] may take.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int64,
    Uint64,
    Double,
    String,
    Array,
    Object,
}

/// Node is a borrowed view of a [`Value`], for pattern matching without
/// exposing the value's representation.
#[derive(Debug)]
pub enum Node<'a, 's> {
    Null,
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(&'a Str<'s>),
    Array(&'a Array<'s>),
    Object(&'a Object<'s>),
}

// Containers carry their own storage; primitives carry one beside the
// tag, so that every value can reach its resource in O(1).
enum Repr<'s> {
    Null(Storage<'s>),
    Bool(Storage<'s>, bool),
    Int64(Storage<'s>, i64),
    Uint64(Storage<'s>, u64),
    Double(Storage<'s>, f64),
    String(Str<'s>),
    Array(Array<'s>),
    Object(Object<'s>),
}

/// Value is one node of a document: null, a bool, one of three numeric
/// representations, a string, an array, or an object. Container variants
/// own their contents, and every value knows the [`Storage`] that backs
/// it.
pub struct Value<'s> {
    repr: Repr<'s>,
}

impl<'s> Value<'s> {
    pub fn null(storage: Storage<'s>) -> Self {
        Repr::Null(storage).into()
    }

    pub fn from_bool(b: bool, storage: Storage<'s>) -> Self {
        Repr::Bool(storage, b).into()
    }

    pub fn from_i64(v: i64, storage: Storage<'s>) -> Self {
        Repr::Int64(storage, v).into()
    }

    pub fn from_u64(v: u64, storage: Storage<'s>) -> Self {
        Repr::Uint64(storage, v).into()
    }

    pub fn from_f64(v: f64, storage: Storage<'s>) -> Self {
        Repr::Double(storage, v).into()
    }

    /// A string value, copying `s` into `storage`.
    pub fn from_str_in(s: &str, storage: Storage<'s>) -> Result<Self, Error> {
        Ok(Repr::String(Str::from_str(s, storage)?).into())
    }

    pub fn kind(&self) -> Kind {
        match &self.repr {
            Repr::Null(..) => Kind::Null,
            Repr::Bool(..) => Kind::Bool,
            Repr::Int64(..) => Kind::Int64,
            Repr::Uint64(..) => Kind::Uint64,
            Repr::Double(..) => Kind::Double,
            Repr::String(..) => Kind::String,
            Repr::Array(..) => Kind::Array,
            Repr::Object(..) => Kind::Object,
        }
    }

    pub fn storage(&self) -> Storage<'s> {
        match &self.repr {
            Repr::Null(s)
            | Repr::Bool(s, _)
            | Repr::Int64(s, _)
            | Repr::Uint64(s, _)
            | Repr::Double(s, _) => *s,
            Repr::String(v) => v.storage(),
            Repr::Array(v) => v.storage(),
            Repr::Object(v) => v.storage(),
        }
    }

    // We *always* want this inline, because the caller will next match
    // over the returned Node, and (when inlined) the optimizer collapses
    // the chained matches into one.
    #[inline(always)]
    pub fn as_node<'a>(&'a self) -> Node<'a, 's> {
        match &self.repr {
            Repr::Null(..) => Node::Null,
            Repr::Bool(_, b) => Node::Bool(*b),
            Repr::Int64(_, v) => Node::Int64(*v),
            Repr::Uint64(_, v) => Node::Uint64(*v),
            Repr::Double(_, v) => Node::Double(*v),
            Repr::String(v) => Node::String(v),
            Repr::Array(v) => Node::Array(v),
            Repr::Object(v) => Node::Object(v),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.repr, Repr::Null(..))
    }

    pub fn as_bool(&self) -> Result<bool, Error> {
        match &self.repr {
            Repr::Bool(_, b) => Ok(*b),
            _ => Err(Error::NotBool),
        }
    }

    pub fn as_int64(&self) -> Result<i64, Error> {
        match &self.repr {
            Repr::Int64(_, v) => Ok(*v),
            _ => Err(Error::NotInt64),
        }
    }

    pub fn as_uint64(&self) -> Result<u64, Error> {
        match &self.repr {
            Repr::Uint64(_, v) => Ok(*v),
            _ => Err(Error::NotUint64),
        }
    }

    pub fn as_double(&self) -> Result<f64, Error> {
        match &self.repr {
            Repr::Double(_, v) => Ok(*v),
            _ => Err(Error::NotDouble),
        }
    }

    pub fn as_string(&self) -> Result<&Str<'s>, Error> {
        match &self.repr {
            Repr::String(v) => Ok(v),
            _ => Err(Error::NotString),
        }
    }

    pub fn as_string_mut(&mut self) -> Result<&mut Str<'s>, Error> {
        match &mut self.repr {
            Repr::String(v) => Ok(v),
            _ => Err(Error::NotString),
        }
    }

    pub fn as_array(&self) -> Result<&Array<'s>, Error> {
        match &self.repr {
            Repr::Array(v) => Ok(v),
            _ => Err(Error::NotArray),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Array<'s>, Error> {
        match &mut self.repr {
            Repr::Array(v) => Ok(v),
            _ => Err(Error::NotArray),
        }
    }

    pub fn as_object(&self) -> Result<&Object<'s>, Error> {
        match &self.repr {
            Repr::Object(v) => Ok(v),
            _ => Err(Error::NotObject),
        }
    }

    pub fn as_object_mut(&mut self) -> Result<&mut Object<'s>, Error> {
        match &mut self.repr {
            Repr::Object(v) => Ok(v),
            _ => Err(Error::NotObject),
        }
    }

    /// Move this value out, leaving null (with the same storage) behind.
    /// The in-place swap costs nothing beyond the move itself.
    pub fn take(&mut self) -> Value<'s> {
        let storage = self.storage();
        std::mem::replace(self, Value::null(storage))
    }

    /// Deep copy into `storage`.
    pub fn clone_in<'t>(&self, storage: Storage<'t>) -> Value<'t> {
        match &self.repr {
            Repr::Null(_) => Value::null(storage),
            Repr::Bool(_, b) => Value::from_bool(*b, storage),
            Repr::Int64(_, v) => Value::from_i64(*v, storage),
            Repr::Uint64(_, v) => Value::from_u64(*v, storage),
            Repr::Double(_, v) => Value::from_f64(*v, storage),
            Repr::String(v) => Repr::String(v.clone_in(storage)).into(),
            Repr::Array(v) => Repr::Array(v.clone_in(storage)).into(),
            Repr::Object(v) => Repr::Object(v.clone_in(storage)).into(),
        }
    }
}

impl<'s> From<Repr<'s>> for Value<'s> {
    fn from(repr: Repr<'s>) -> Self {
        Value { repr }
    }
}

impl<'s> From<Str<'s>> for Value<'s> {
    fn from(v: Str<'s>) -> Self {
        Repr::String(v).into()
    }
}

impl<'s> From<Array<'s>> for Value<'s> {
    fn from(v: Array<'s>) -> Self {
        Repr::Array(v).into()
    }
}

impl<'s> From<Object<'s>> for Value<'s> {
    fn from(v: Object<'s>) -> Self {
        Repr::Object(v).into()
    }
}

impl Default for Value<'static> {
    fn default() -> Self {
        Value::null(Storage::global())
    }
}

impl<'s> Clone for Value<'s> {
    fn clone(&self) -> Self {
        self.clone_in(self.storage())
    }
}

// The three numeric tags compare by value, not representation: 1, 1u64
// beyond i64 range, and 1.0 are all comparable.
fn number_eq(lhs: &Node<'_, '_>, rhs: &Node<'_, '_>) -> Option<bool> {
    use Node::*;
    Some(match (lhs, rhs) {
        (Int64(l), Int64(r)) => l == r,
        (Uint64(l), Uint64(r)) => l == r,
        (Double(l), Double(r)) => l == r,
        (Int64(l), Uint64(r)) | (Uint64(r), Int64(l)) => *l >= 0 && *l as u64 == *r,
        (Int64(l), Double(r)) | (Double(r), Int64(l)) => *l as f64 == *r,
        (Uint64(l), Double(r)) | (Double(r), Uint64(l)) => *l as f64 == *r,
        _ => return None,
    })
}

impl<'s, 't> PartialEq<Value<'t>> for Value<'s> {
    fn eq(&self, other: &Value<'t>) -> bool {
        let (lhs, rhs) = (self.as_node(), other.as_node());
        if let Some(eq) = number_eq(&lhs, &rhs) {
            return eq;
        }
        match (lhs, rhs) {
            (Node::Null, Node::Null) => true,
            (Node::Bool(l), Node::Bool(r)) => l == r,
            (Node::String(l), Node::String(r)) => l == r,
            (Node::Array(l), Node::Array(r)) => l == r,
            (Node::Object(l), Node::Object(r)) => l == r,
            _ => false,
        }
    }
}

impl<'s> fmt::Debug for Value<'s> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_node() {
            Node::Null => f.write_str("Null"),
            Node::Bool(v) => f.debug_tuple("Bool").field(&v).finish(),
            Node::Int64(v) => f.debug_tuple("Int64").field(&v).finish(),
            Node::Uint64(v) => f.debug_tuple("Uint64").field(&v).finish(),
            Node::Double(v) => f.debug_tuple("Double").field(&v).finish(),
            Node::String(v) => f.debug_tuple("String").field(v).finish(),
            Node::Array(v) => v.fmt(f),
            Node::Object(v) => v.fmt(f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Kind, Value};
    use crate::{Array, Error, Monotonic, Object, Storage, Str};

    #[test]
    fn test_accessors() {
        let storage = Storage::global();

        let v = Value::from_i64(-7, storage);
        assert_eq!(v.kind(), Kind::Int64);
        assert_eq!(v.as_int64(), Ok(-7));
        assert_eq!(v.as_uint64(), Err(Error::NotUint64));
        assert_eq!(v.as_bool(), Err(Error::NotBool));
        assert_eq!(v.as_string().err(), Some(Error::NotString));

        let mut v = Value::from(Array::new_in(storage));
        v.as_array_mut()
            .unwrap()
            .push(Value::from_bool(true, storage))
            .unwrap();
        assert_eq!(v.as_array().unwrap().len(), 1);
        assert_eq!(v.as_object().err(), Some(Error::NotObject));
    }

    #[test]
    fn test_numeric_equality() {
        let s = Storage::global();

        assert_eq!(Value::from_i64(20, s), Value::from_u64(20, s));
        assert_eq!(Value::from_u64(20, s), Value::from_i64(20, s));
        assert_ne!(Value::from_i64(-1, s), Value::from_u64(u64::MAX, s));

        assert_eq!(Value::from_i64(-20, s), Value::from_f64(-20.0, s));
        assert_eq!(Value::from_u64(1 << 52, s), Value::from_f64((1u64 << 52) as f64, s));
        assert_ne!(Value::from_i64(3, s), Value::from_f64(3.5, s));

        assert_ne!(Value::from_i64(0, s), Value::from_bool(false, s));
        assert_ne!(Value::from_f64(f64::NAN, s), Value::from_f64(f64::NAN, s));
    }

    #[test]
    fn test_take_is_destructive_move() {
        let arena = Monotonic::new();
        let storage = Storage::from(&arena);

        let mut v = Value::from_str_in("pilfered", storage).unwrap();
        let out = v.take();
        assert!(v.is_null());
        assert_eq!(v.storage(), storage); // Storage survives the take.
        assert_eq!(out.as_string().unwrap().as_str(), "pilfered");
    }

    #[test]
    fn test_deep_clone_across_storages() {
        let arena = Monotonic::new();
        let storage = Storage::global();

        let mut obj = Object::new_in(storage);
        obj.insert("k", Value::from_str_in("deep value", storage).unwrap())
            .unwrap();
        let v = Value::from(obj);

        let w = v.clone_in(Storage::from(&arena));
        assert_eq!(v, w);
        assert_eq!(
            w.as_object().unwrap().get("k").unwrap().storage(),
            Storage::from(&arena)
        );
    }

    #[test]
    fn test_sizes() {
        // The storage handle is a fat &dyn reference (16 bytes), beside
        // which every variant packs its payload:
        //   primitives: handle + 8-byte payload,
        //   string:     handle + 16-byte small-buffer representation,
        //   array:      handle + thin vector pointer,
        //   object:     handle + slot and bucket pointers.
        assert_eq!(std::mem::size_of::<Storage<'static>>(), 16);
        assert_eq!(std::mem::size_of::<Str<'static>>(), 32);
        assert_eq!(std::mem::size_of::<Array<'static>>(), 24);
        assert_eq!(std::mem::size_of::<Object<'static>>(), 32);

        // A value rounds up to the widest variant plus its tag.
        assert_eq!(std::mem::size_of::<Value<'static>>(), 40);
    }
}

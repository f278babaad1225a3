//! The in-memory document model: a tagged value over null, bool, three
//! numeric representations, string, array, and object, together with the
//! storage abstraction that every container allocates from and propagates
//! to everything it owns.

// Storage is the allocation seam: a polymorphic resource trait, a cheap
// copyable handle, the process-wide default, and a monotonic arena.
mod storage;
pub use storage::{Global, MemoryResource, Monotonic, Storage};

// RawVec is the low-level thin vector underlying arrays and objects.
mod raw;

// Str is a small-buffer-optimized byte string.
mod string;
pub use string::{Str, MAX_STR_LEN};

// Array is a contiguous sequence of values.
mod array;
pub use array::{Array, MAX_ARRAY_LEN};

// Object is an insertion-ordered hash map from string keys to values.
mod object;
pub use object::{Entry, Object, MAX_OBJECT_LEN};

// Value ties the variants together behind a borrowed Node view.
mod value;
pub use value::{Kind, Node, Value};

mod error;
pub use error::Error;

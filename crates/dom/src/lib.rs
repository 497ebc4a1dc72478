// Allocators are capability objects: every container records the one it
// was constructed with, and a process-wide default is atomically swappable.
pub mod alloc;
pub use alloc::{
    default_allocator, null_allocator, set_default_allocator, system_allocator, AllocError,
    AllocRef, Allocator, AllocatorId, NullAllocator, SystemAllocator,
};

// Stable error codes, and errors positioned at an input or output offset.
mod error;
pub use error::{Errc, Error};

// Str is a growable byte string with a shared empty sentinel and a
// guaranteed trailing zero byte.
pub mod string;
pub use string::Str;

// Array is a contiguous growable sequence of Values.
pub mod array;
pub use array::Array;

// Object is an insertion-ordered hash map: hashed buckets for O(1) lookup,
// with a second, doubly linked chain fixing the iteration order.
pub mod object;
pub use object::{Entry, Object};

// Value is the tagged sum over the seven JSON types.
pub mod value;
pub use value::{Kind, Value};

// Keyed SipHash-2-4 over object key bytes.
mod hash;

// The tolerant reader: a byte-range parser with configurable leniency and
// errors keyed to the offending input offset. Includes serde
// deserialization into Value.
pub mod de;
pub use de::{
    read_array, read_bool, read_float, read_int, read_null, read_object, read_string, read_value,
    ReadOptions,
};

// The bounded writer: renders into a caller-supplied byte range, compact
// or pretty. Includes serde Serialize for Value.
pub mod ser;
pub use ser::{
    write_array, write_bool, write_float, write_int, write_null, write_object, write_string,
    write_value, WriteOptions,
};

// Deep ordering and structural equality across Values.
mod compare;
pub use compare::compare;

// Single dispatch over a Value's tag to a caller-supplied callback table.
pub mod visit;
pub use visit::{visit, Visitor};

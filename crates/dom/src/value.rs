use std::{fmt, mem};

use crate::alloc::{default_allocator, AllocRef};
use crate::array::Array;
use crate::de::{self, ReadOptions};
use crate::error::{Errc, Error};
use crate::object::Object;
use crate::string::Str;

/// The seven JSON type tags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
}

/// A JSON datum: the tagged sum over null, booleans, 64-bit signed
/// integers, binary64 floats, strings, arrays, and objects.
///
/// Every value records the allocator it was built with: primitive variants
/// store the reference directly, container variants reach it through their
/// payload, so [`allocator`](Value::allocator) always answers. Container
/// payloads are owned exclusively and embedded in the variant. Reassigning
/// a `Value` releases the prior payload; moving one is a plain Rust move.
pub enum Value<'alloc> {
    Null(AllocRef<'alloc>),
    Bool(bool, AllocRef<'alloc>),
    Int(i64, AllocRef<'alloc>),
    Float(f64, AllocRef<'alloc>),
    String(Str<'alloc>),
    Array(Array<'alloc>),
    Object(Object<'alloc>),
}

impl<'alloc> Value<'alloc> {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null(_) => Kind::Null,
            Value::Bool(..) => Kind::Bool,
            Value::Int(..) => Kind::Int,
            Value::Float(..) => Kind::Float,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }

    /// The allocator this value was built with.
    pub fn allocator(&self) -> AllocRef<'alloc> {
        match self {
            Value::Null(alloc)
            | Value::Bool(_, alloc)
            | Value::Int(_, alloc)
            | Value::Float(_, alloc) => *alloc,
            Value::String(s) => s.allocator(),
            Value::Array(a) => a.allocator(),
            Value::Object(o) => o.allocator(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b, _) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n, _) => Some(*n),
            _ => None,
        }
    }

    /// The value as binary64. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f, _) => Some(*f),
            Value::Int(n, _) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&Str<'alloc>> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array<'alloc>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array<'alloc>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object<'alloc>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object<'alloc>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Moves the value out, leaving a `Null` that keeps this value's
    /// allocator.
    pub fn take(&mut self) -> Value<'alloc> {
        let alloc = self.allocator();
        mem::replace(self, Value::Null(alloc))
    }

    /// Deep copy with the given allocator.
    pub fn try_clone_in<'to>(&self, alloc: AllocRef<'to>) -> Result<Value<'to>, Errc> {
        Ok(match self {
            Value::Null(_) => Value::Null(alloc),
            Value::Bool(b, _) => Value::Bool(*b, alloc),
            Value::Int(n, _) => Value::Int(*n, alloc),
            Value::Float(f, _) => Value::Float(*f, alloc),
            Value::String(s) => Value::String(s.try_clone_in(alloc)?),
            Value::Array(a) => Value::Array(a.try_clone_in(alloc)?),
            Value::Object(o) => Value::Object(o.try_clone_in(alloc)?),
        })
    }

    /// Moves this value to `alloc`: container payloads transfer as-is when
    /// their allocator equals `alloc`, and deep-copy otherwise. Primitives
    /// simply adopt the new allocator.
    pub fn relocate<'to>(self, alloc: AllocRef<'to>) -> Result<Value<'to>, Errc>
    where
        'alloc: 'to,
    {
        Ok(match self {
            Value::Null(_) => Value::Null(alloc),
            Value::Bool(b, _) => Value::Bool(b, alloc),
            Value::Int(n, _) => Value::Int(n, alloc),
            Value::Float(f, _) => Value::Float(f, alloc),
            Value::String(s) => Value::String(s.relocate(alloc)?),
            Value::Array(a) => Value::Array(a.relocate(alloc)?),
            Value::Object(o) => Value::Object(o.relocate(alloc)?),
        })
    }

    /// Parses one JSON value from `input` with default options, returning
    /// it with the count of consumed bytes.
    pub fn parse(input: &[u8], alloc: AllocRef<'alloc>) -> Result<(Value<'alloc>, usize), Error> {
        de::read_value(input, alloc, &ReadOptions::default())
    }
}

impl Default for Value<'_> {
    /// A `Null` carrying the process-wide default allocator.
    fn default() -> Self {
        Value::Null(default_allocator())
    }
}

// Allocator references carry no Debug of their own; payloads print like
// the plain derive would.
impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => f.write_str("Null"),
            Value::Bool(b, _) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n, _) => f.debug_tuple("Int").field(n).finish(),
            Value::Float(v, _) => f.debug_tuple("Float").field(v).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Array(a) => f.debug_tuple("Array").field(a).finish(),
            Value::Object(o) => f.debug_tuple("Object").field(o).finish(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alloc::{null_allocator, system_allocator};

    #[test]
    fn test_kind_and_accessors() {
        let alloc = system_allocator();

        assert_eq!(Value::Null(alloc).kind(), Kind::Null);
        assert_eq!(Value::Bool(true, alloc).kind(), Kind::Bool);
        assert_eq!(Value::Int(-3, alloc).kind(), Kind::Int);
        assert_eq!(Value::Float(0.5, alloc).kind(), Kind::Float);

        let value = Value::String(Str::from_bytes(b"text", alloc).unwrap());
        assert_eq!(value.kind(), Kind::String);
        assert_eq!(value.as_str().unwrap().as_bytes(), b"text");
        assert_eq!(value.as_int(), None);

        assert_eq!(Value::Int(7, alloc).as_float(), Some(7.0));
        assert_eq!(Value::Float(7.5, alloc).as_float(), Some(7.5));
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_allocator_accessor() {
        let system = system_allocator();
        let null = null_allocator();

        // Every variant answers with the allocator it was built with.
        assert!(Value::Null(null).allocator().is_equal(null));
        assert!(Value::Int(1, system).allocator().is_equal(system));
        assert!(!Value::Bool(true, null).allocator().is_equal(system));

        let value = Value::Array(Array::new_in(system));
        assert!(value.allocator().is_equal(system));
    }

    #[test]
    fn test_take_leaves_null() {
        let alloc = system_allocator();
        let mut value = Value::String(Str::from_bytes(b"payload", alloc).unwrap());

        let taken = value.take();
        assert!(value.is_null());
        assert_eq!(taken.as_str().unwrap().as_bytes(), b"payload");

        // The vacated slot retains the original allocator.
        assert!(value.allocator().is_equal(alloc));
    }

    #[test]
    fn test_reassignment_releases_payload() {
        let alloc = crate::alloc::testing::CountingAllocator::default();
        {
            let mut value = Value::String(Str::from_bytes(b"first", &alloc).unwrap());
            value = Value::Int(2, &alloc);
            assert_eq!(value.as_int(), Some(2));
        }
        assert!(alloc.is_balanced());
    }

    #[test]
    fn test_deep_clone() {
        let alloc = system_allocator();
        let mut array = Array::new_in(alloc);
        array.push(Value::Int(1, alloc)).unwrap();
        let mut object = Object::new_in(alloc);
        object.insert(b"items", Value::Array(array)).unwrap();
        let value = Value::Object(object);

        let copy = value.try_clone_in(alloc).unwrap();
        assert_eq!(copy, value);

        // Cloning into a failing allocator surfaces the inner error.
        assert_eq!(
            value.try_clone_in(null_allocator()).unwrap_err(),
            Errc::NotEnoughMemory
        );
    }

    #[test]
    fn test_relocate_equal_allocator_keeps_payload() {
        let alloc = system_allocator();
        let value = Value::String(Str::from_bytes(b"stable", alloc).unwrap());
        let data = value.as_str().unwrap().as_bytes().as_ptr();

        let moved = value.relocate(alloc).unwrap();
        assert_eq!(moved.as_str().unwrap().as_bytes().as_ptr(), data);

        // A primitive relocation adopts the target allocator.
        let null = null_allocator();
        let moved = Value::Int(3, alloc).relocate(null).unwrap();
        assert!(moved.allocator().is_equal(null));
    }
}

use crate::array::Array;
use crate::object::Object;
use crate::string::Str;
use crate::value::Value;

/// A callback table dispatched over a [`Value`]'s type tag. `Output` is
/// whatever the callbacks fold to: an accumulator, an error signal, or
/// nothing at all.
pub trait Visitor<'alloc> {
    type Output;

    fn visit_null(&mut self) -> Self::Output;
    fn visit_bool(&mut self, value: bool) -> Self::Output;
    fn visit_int(&mut self, value: i64) -> Self::Output;
    fn visit_float(&mut self, value: f64) -> Self::Output;
    fn visit_string(&mut self, value: &Str<'alloc>) -> Self::Output;
    fn visit_array(&mut self, value: &Array<'alloc>) -> Self::Output;
    fn visit_object(&mut self, value: &Object<'alloc>) -> Self::Output;
}

/// Invokes the visitor callback matching `value`'s tag.
pub fn visit<'alloc, V: Visitor<'alloc>>(visitor: &mut V, value: &Value<'alloc>) -> V::Output {
    match value {
        Value::Null(_) => visitor.visit_null(),
        Value::Bool(b, _) => visitor.visit_bool(*b),
        Value::Int(n, _) => visitor.visit_int(*n),
        Value::Float(f, _) => visitor.visit_float(*f),
        Value::String(s) => visitor.visit_string(s),
        Value::Array(a) => visitor.visit_array(a),
        Value::Object(o) => visitor.visit_object(o),
    }
}

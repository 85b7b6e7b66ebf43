//! Runtime values and the object heap.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::typeck::types::Type;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Null,
    /// Index into the heap.
    Ref(usize),
    Void,
}

impl Value {
    /// Value of a field or array element that was never assigned.
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Int => Value::Int(0),
            Type::Boolean => Value::Bool(false),
            _ => Value::Null,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<usize> {
        match self {
            Value::Ref(r) => Some(*r),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
            Value::Ref(r) => write!(f, "@{r}"),
            Value::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum HeapObject {
    Instance { class: String, fields: HashMap<String, Value> },
    Array { items: Vec<Value> },
}

/// Objects are never freed; a run is short-lived.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    pub fn alloc(&mut self, object: HeapObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn get(&self, r: usize) -> Option<&HeapObject> {
        self.objects.get(r)
    }

    pub fn get_mut(&mut self, r: usize) -> Option<&mut HeapObject> {
        self.objects.get_mut(r)
    }

    /// Runtime class of an instance; `None` for arrays.
    pub fn class_of(&self, r: usize) -> Option<&str> {
        match self.objects.get(r)? {
            HeapObject::Instance { class, .. } => Some(class),
            HeapObject::Array { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_type() {
        assert_eq!(Value::default_for(&Type::Int), Value::Int(0));
        assert_eq!(Value::default_for(&Type::Boolean), Value::Bool(false));
        assert_eq!(Value::default_for(&Type::Class("A".into())), Value::Null);
    }

    #[test]
    fn heap_tracks_runtime_class() {
        let mut heap = Heap::default();
        let obj = heap.alloc(HeapObject::Instance { class: "A".into(), fields: HashMap::new() });
        let arr = heap.alloc(HeapObject::Array { items: vec![Value::Int(1)] });
        assert_eq!(heap.class_of(obj), Some("A"));
        assert_eq!(heap.class_of(arr), None);
        assert_eq!(heap.len(), 2);
    }
}

//! Tagged host values

use crate::dictionary::Dictionary;
use crate::object::{Object, ObjectRef};
use glam::{Quat, Vec2, Vec3, Vec4};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

/// Tag of a [`Variant`], used in call errors and property descriptions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VariantType {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Vector2,
    Vector3,
    Quat,
    Color,
    NodePath,
    Rid,
    Object,
    Dictionary,
    Array,
    ByteArray,
    IntArray,
    FloatArray,
    StringArray,
    Vector2Array,
    Vector3Array,
    ColorArray,
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariantType::Nil => "Nil",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Float => "float",
            VariantType::String => "String",
            VariantType::Vector2 => "Vector2",
            VariantType::Vector3 => "Vector3",
            VariantType::Quat => "Quat",
            VariantType::Color => "Color",
            VariantType::NodePath => "NodePath",
            VariantType::Rid => "RID",
            VariantType::Object => "Object",
            VariantType::Dictionary => "Dictionary",
            VariantType::Array => "Array",
            VariantType::ByteArray => "ByteArray",
            VariantType::IntArray => "IntArray",
            VariantType::FloatArray => "FloatArray",
            VariantType::StringArray => "StringArray",
            VariantType::Vector2Array => "Vector2Array",
            VariantType::Vector3Array => "Vector3Array",
            VariantType::ColorArray => "ColorArray",
        };
        f.write_str(name)
    }
}

/// A host value.
///
/// Equality and hashing are structural, except for floats (compared by bit
/// pattern so that `Variant` can key a [`Dictionary`]) and objects (compared
/// by instance id).
#[derive(Debug, Clone, Default)]
pub enum Variant {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vector2(Vec2),
    Vector3(Vec3),
    Quat(Quat),
    /// RGBA
    Color(Vec4),
    NodePath(String),
    Rid(u64),
    Object(ObjectRef),
    Dictionary(Dictionary),
    Array(Vec<Variant>),
    ByteArray(Vec<u8>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StringArray(Vec<String>),
    Vector2Array(Vec<Vec2>),
    Vector3Array(Vec<Vec3>),
    ColorArray(Vec<Vec4>),
}

impl Variant {
    pub fn get_type(&self) -> VariantType {
        match self {
            Variant::Nil => VariantType::Nil,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::Vector2(_) => VariantType::Vector2,
            Variant::Vector3(_) => VariantType::Vector3,
            Variant::Quat(_) => VariantType::Quat,
            Variant::Color(_) => VariantType::Color,
            Variant::NodePath(_) => VariantType::NodePath,
            Variant::Rid(_) => VariantType::Rid,
            Variant::Object(_) => VariantType::Object,
            Variant::Dictionary(_) => VariantType::Dictionary,
            Variant::Array(_) => VariantType::Array,
            Variant::ByteArray(_) => VariantType::ByteArray,
            Variant::IntArray(_) => VariantType::IntArray,
            Variant::FloatArray(_) => VariantType::FloatArray,
            Variant::StringArray(_) => VariantType::StringArray,
            Variant::Vector2Array(_) => VariantType::Vector2Array,
            Variant::Vector3Array(_) => VariantType::Vector3Array,
            Variant::ColorArray(_) => VariantType::ColorArray,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Variant::Float(v) => Some(*v),
            Variant::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Variant]> {
        match self {
            Variant::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Variant::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Variant::Object(object) => Some(object),
            _ => None,
        }
    }
}

fn float_bits(values: &[f32]) -> impl Iterator<Item = u32> + '_ {
    values.iter().map(|v| v.to_bits())
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        use Variant as V;
        match (self, other) {
            (V::Nil, V::Nil) => true,
            (V::Bool(a), V::Bool(b)) => a == b,
            (V::Int(a), V::Int(b)) => a == b,
            (V::Float(a), V::Float(b)) => a.to_bits() == b.to_bits(),
            (V::String(a), V::String(b)) | (V::NodePath(a), V::NodePath(b)) => a == b,
            (V::Vector2(a), V::Vector2(b)) => float_bits(&a.to_array()).eq(float_bits(&b.to_array())),
            (V::Vector3(a), V::Vector3(b)) => float_bits(&a.to_array()).eq(float_bits(&b.to_array())),
            (V::Quat(a), V::Quat(b)) => float_bits(&a.to_array()).eq(float_bits(&b.to_array())),
            (V::Color(a), V::Color(b)) => float_bits(&a.to_array()).eq(float_bits(&b.to_array())),
            (V::Rid(a), V::Rid(b)) => a == b,
            (V::Object(a), V::Object(b)) => a.instance_id() == b.instance_id(),
            (V::Dictionary(a), V::Dictionary(b)) => a == b,
            (V::Array(a), V::Array(b)) => a == b,
            (V::ByteArray(a), V::ByteArray(b)) => a == b,
            (V::IntArray(a), V::IntArray(b)) => a == b,
            (V::FloatArray(a), V::FloatArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (V::StringArray(a), V::StringArray(b)) => a == b,
            (V::Vector2Array(a), V::Vector2Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| V::Vector2(*x) == V::Vector2(*y))
            }
            (V::Vector3Array(a), V::Vector3Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| V::Vector3(*x) == V::Vector3(*y))
            }
            (V::ColorArray(a), V::ColorArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| V::Color(*x) == V::Color(*y))
            }
            _ => false,
        }
    }
}

impl Eq for Variant {}

impl Hash for Variant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Variant::Nil => {}
            Variant::Bool(v) => v.hash(state),
            Variant::Int(v) => v.hash(state),
            Variant::Float(v) => v.to_bits().hash(state),
            Variant::String(v) | Variant::NodePath(v) => v.hash(state),
            Variant::Vector2(v) => float_bits(&v.to_array()).for_each(|b| b.hash(state)),
            Variant::Vector3(v) => float_bits(&v.to_array()).for_each(|b| b.hash(state)),
            Variant::Quat(v) => float_bits(&v.to_array()).for_each(|b| b.hash(state)),
            Variant::Color(v) => float_bits(&v.to_array()).for_each(|b| b.hash(state)),
            Variant::Rid(v) => v.hash(state),
            Variant::Object(object) => object.instance_id().hash(state),
            // Entry order is not part of equality, so only the size is hashed.
            Variant::Dictionary(dict) => dict.len().hash(state),
            Variant::Array(items) => items.hash(state),
            Variant::ByteArray(items) => items.hash(state),
            Variant::IntArray(items) => items.hash(state),
            Variant::FloatArray(items) => items.iter().for_each(|v| v.to_bits().hash(state)),
            Variant::StringArray(items) => items.hash(state),
            Variant::Vector2Array(items) => items.len().hash(state),
            Variant::Vector3Array(items) => items.len().hash(state),
            Variant::ColorArray(items) => items.len().hash(state),
        }
    }
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut item: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, value) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item(f, value)?;
    }
    f.write_str("]")
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nil => f.write_str("Null"),
            Variant::Bool(v) => write!(f, "{v}"),
            Variant::Int(v) => write!(f, "{v}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::String(v) | Variant::NodePath(v) => f.write_str(v),
            Variant::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            Variant::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Variant::Quat(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Variant::Color(v) => write!(f, "{},{},{},{}", v.x, v.y, v.z, v.w),
            Variant::Rid(v) => write!(f, "[RID:{v}]"),
            Variant::Object(object) => {
                write!(f, "[{}:{}]", object.class_name(), object.instance_id())
            }
            Variant::Dictionary(dict) => {
                f.write_str("{")?;
                for (i, (key, value)) in dict.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                f.write_str("}")
            }
            Variant::Array(items) => write_list(f, items, |f, v| write!(f, "{v}")),
            Variant::ByteArray(items) => write_list(f, items, |f, v| write!(f, "{v}")),
            Variant::IntArray(items) => write_list(f, items, |f, v| write!(f, "{v}")),
            Variant::FloatArray(items) => write_list(f, items, |f, v| write!(f, "{v}")),
            Variant::StringArray(items) => write_list(f, items, |f, v| f.write_str(v)),
            Variant::Vector2Array(items) => {
                write_list(f, items, |f, v| write!(f, "({}, {})", v.x, v.y))
            }
            Variant::Vector3Array(items) => {
                write_list(f, items, |f, v| write!(f, "({}, {}, {})", v.x, v.y, v.z))
            }
            Variant::ColorArray(items) => {
                write_list(f, items, |f, v| write!(f, "{},{},{},{}", v.x, v.y, v.z, v.w))
            }
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Int(value.into())
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::Int(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Float(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(value: Vec<T>) -> Self {
        Variant::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<Dictionary> for Variant {
    fn from(value: Dictionary) -> Self {
        Variant::Dictionary(value)
    }
}

impl From<ObjectRef> for Variant {
    fn from(value: ObjectRef) -> Self {
        Variant::Object(value)
    }
}

impl<T: Into<Variant>> FromIterator<T> for Variant {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Variant::Array(iter.into_iter().map(Into::into).collect())
    }
}

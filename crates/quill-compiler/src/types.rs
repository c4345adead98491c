//! Static types known to the compiler and runtime type tags.
//!
//! The front end annotates declarations with [`Type`]s; the emitter uses them
//! to pick a conversion branch at compile time. When nothing is known the
//! emitter falls back to checking the runtime [`Tag`] of a tagged value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime type tag stored in slot 0 of every tagged value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tag {
    /// `undefined`
    Undefined = 0,
    /// `null`
    Null = 1,
    /// `true` / `false`
    Boolean = 2,
    /// Byte string
    String = 3,
    /// Arbitrary precision integer
    Number = 4,
    /// Symbol (payload is its description)
    Symbol = 5,
    /// Object (payload is a property map)
    Object = 6,
}

impl Tag {
    /// Every tag, in the order the dynamic string conversion checks them.
    pub const TO_STRING_ORDER: [Tag; 7] = [
        Tag::String,
        Tag::Undefined,
        Tag::Null,
        Tag::Boolean,
        Tag::Number,
        Tag::Symbol,
        Tag::Object,
    ];

    /// The numeric value pushed for this tag.
    pub fn value(self) -> i64 {
        self as u8 as i64
    }

    /// Decodes a tag from its runtime value.
    pub fn from_value(value: i64) -> Option<Self> {
        Some(match value {
            0 => Tag::Undefined,
            1 => Tag::Null,
            2 => Tag::Boolean,
            3 => Tag::String,
            4 => Tag::Number,
            5 => Tag::Symbol,
            6 => Tag::Object,
            _ => return None,
        })
    }

    /// The result of `typeof` for a non-function value of this tag.
    pub fn type_of_name(self) -> &'static str {
        match self {
            Tag::Undefined => "undefined",
            Tag::Null | Tag::Object => "object",
            Tag::Boolean => "boolean",
            Tag::String => "string",
            Tag::Number => "number",
            Tag::Symbol => "symbol",
        }
    }
}

/// A static type as written in (or inferred from) the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// `undefined` / `void`
    Undefined,
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `number`
    Number,
    /// `string`
    String,
    /// `symbol`
    Symbol,
    /// `object`
    Object,
    /// The host byte buffer type
    Buffer,
    /// Fixed point number with the given number of decimals
    Fixed(u8),
    /// A function returning the inner type
    Function(Box<Type>),
    /// A named type: a class declared in the module or an ambient library type
    Reference(String),
    /// A union of types
    Union(Vec<Type>),
    /// Nothing is known statically
    Any,
}

impl Type {
    /// The runtime tag every value of this type carries, if it is unique.
    pub fn static_tag(&self) -> Option<Tag> {
        match self {
            Type::Undefined => Some(Tag::Undefined),
            Type::Null => Some(Tag::Null),
            Type::Boolean => Some(Tag::Boolean),
            Type::Number | Type::Fixed(_) => Some(Tag::Number),
            Type::String => Some(Tag::String),
            Type::Symbol => Some(Tag::Symbol),
            Type::Object | Type::Buffer | Type::Function(_) | Type::Reference(_) => {
                Some(Tag::Object)
            }
            Type::Union(members) => {
                let mut tags = members.iter().map(Type::static_tag);
                let first = tags.next()??;
                tags.all(|tag| tag == Some(first)).then_some(first)
            }
            Type::Any => None,
        }
    }

    /// True when every inhabitant of the type is a primitive value.
    pub fn is_only_primitive(&self) -> bool {
        match self {
            Type::Undefined
            | Type::Null
            | Type::Boolean
            | Type::Number
            | Type::String
            | Type::Symbol => true,
            Type::Union(members) => !members.is_empty() && members.iter().all(Type::is_only_primitive),
            _ => false,
        }
    }

    /// True for fixed point numeric types.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Type::Fixed(_))
    }

    /// True for the host byte buffer type.
    pub fn is_buffer(&self) -> bool {
        matches!(self, Type::Buffer)
    }

    /// True when the type is exactly the given tag's type.
    pub fn is_only(&self, tag: Tag) -> bool {
        self.static_tag() == Some(tag)
    }

    /// The class name when this refers to a named type.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Reference(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Undefined => write!(f, "undefined"),
            Type::Null => write!(f, "null"),
            Type::Boolean => write!(f, "boolean"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Symbol => write!(f, "symbol"),
            Type::Object => write!(f, "object"),
            Type::Buffer => write!(f, "Buffer"),
            Type::Fixed(decimals) => write!(f, "Fixed<{}>", decimals),
            Type::Function(ret) => write!(f, "() => {}", ret),
            Type::Reference(name) => write!(f, "{}", name),
            Type::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            Type::Any => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_tag_of_primitives() {
        assert_eq!(Type::String.static_tag(), Some(Tag::String));
        assert_eq!(Type::Fixed(8).static_tag(), Some(Tag::Number));
        assert_eq!(Type::Buffer.static_tag(), Some(Tag::Object));
        assert_eq!(Type::Any.static_tag(), None);
    }

    #[test]
    fn test_union_tag_requires_agreement() {
        let same = Type::Union(vec![Type::Number, Type::Fixed(2)]);
        assert_eq!(same.static_tag(), Some(Tag::Number));
        let mixed = Type::Union(vec![Type::Number, Type::String]);
        assert_eq!(mixed.static_tag(), None);
    }

    #[test]
    fn test_only_primitive() {
        assert!(Type::Boolean.is_only_primitive());
        assert!(Type::Union(vec![Type::String, Type::Undefined]).is_only_primitive());
        assert!(!Type::Buffer.is_only_primitive());
        assert!(!Type::Reference("MapStorage".into()).is_only_primitive());
    }

    #[test]
    fn test_tag_round_trip_values() {
        for tag in Tag::TO_STRING_ORDER {
            assert_eq!(Tag::from_value(tag.value()), Some(tag));
        }
        assert_eq!(Tag::from_value(9), None);
    }
}

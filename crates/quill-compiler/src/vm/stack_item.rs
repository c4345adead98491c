//! Values on the machine's stacks.

use super::VmError;
use crate::compiler::bytecode::{MAX_INTEGER_SIZE, integer_bytes, integer_from_bytes};
use num_bigint::BigInt;
use num_traits::Zero;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable array storage.
pub type ArrayRef = Rc<RefCell<Vec<StackItem>>>;

/// Shared, mutable map storage; entries keep insertion order.
pub type MapRef = Rc<RefCell<Vec<(StackItem, StackItem)>>>;

/// Host objects handed to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteropItem {
    /// The storage area of the executing contract
    StorageContext,
}

/// A machine value.
///
/// Primitive items compare by their byte form; arrays and maps by identity.
#[derive(Clone)]
pub enum StackItem {
    /// Raw bytes
    ByteArray(Vec<u8>),
    /// Arbitrary precision integer
    Integer(BigInt),
    /// Boolean
    Boolean(bool),
    /// Array, shared by reference
    Array(ArrayRef),
    /// Map, shared by reference
    Map(MapRef),
    /// Host object
    Interop(InteropItem),
}

impl StackItem {
    /// A new array holding `items`.
    pub fn array(items: Vec<StackItem>) -> Self {
        StackItem::Array(Rc::new(RefCell::new(items)))
    }

    /// A new empty map.
    pub fn map() -> Self {
        StackItem::Map(Rc::new(RefCell::new(Vec::new())))
    }

    /// Short name of the item kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StackItem::ByteArray(_) => "ByteArray",
            StackItem::Integer(_) => "Integer",
            StackItem::Boolean(_) => "Boolean",
            StackItem::Array(_) => "Array",
            StackItem::Map(_) => "Map",
            StackItem::Interop(_) => "InteropInterface",
        }
    }

    /// True for arrays and maps.
    pub fn is_container(&self) -> bool {
        matches!(self, StackItem::Array(_) | StackItem::Map(_))
    }

    /// Byte form of a primitive item.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VmError> {
        match self {
            StackItem::ByteArray(bytes) => Ok(bytes.clone()),
            StackItem::Integer(value) => Ok(integer_bytes(value)),
            StackItem::Boolean(true) => Ok(vec![1]),
            StackItem::Boolean(false) => Ok(Vec::new()),
            other => Err(VmError::InvalidType {
                expected: "primitive",
                found: other.kind(),
            }),
        }
    }

    /// Integer value of a primitive item.
    pub fn to_integer(&self) -> Result<BigInt, VmError> {
        match self {
            StackItem::Integer(value) => Ok(value.clone()),
            StackItem::Boolean(value) => Ok(BigInt::from(u8::from(*value))),
            StackItem::ByteArray(bytes) => {
                if bytes.len() > MAX_INTEGER_SIZE {
                    return Err(VmError::IntegerOverflow);
                }
                Ok(integer_from_bytes(bytes))
            }
            other => Err(VmError::InvalidType {
                expected: "integer",
                found: other.kind(),
            }),
        }
    }

    /// Truth value; containers and host objects are true.
    pub fn to_bool(&self) -> bool {
        match self {
            StackItem::Boolean(value) => *value,
            StackItem::Integer(value) => !value.is_zero(),
            StackItem::ByteArray(bytes) => bytes.iter().any(|&b| b != 0),
            StackItem::Array(_) | StackItem::Map(_) | StackItem::Interop(_) => true,
        }
    }

    /// Machine equality, as `EQUAL` computes it.
    pub fn equals(&self, other: &StackItem) -> bool {
        match (self, other) {
            (StackItem::Array(a), StackItem::Array(b)) => Rc::ptr_eq(a, b),
            (StackItem::Map(a), StackItem::Map(b)) => Rc::ptr_eq(a, b),
            (StackItem::Interop(a), StackItem::Interop(b)) => a == b,
            (StackItem::Integer(a), StackItem::Integer(b)) => a == b,
            (a, b) if a.is_container() || b.is_container() => false,
            (StackItem::Interop(_), _) | (_, StackItem::Interop(_)) => false,
            (a, b) => match (a.to_bytes(), b.to_bytes()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Bytes read as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> Result<String, VmError> {
        Ok(String::from_utf8_lossy(&self.to_bytes()?).into_owned())
    }

    fn fmt_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            StackItem::ByteArray(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control()) => {
                    write!(f, "{:?}", text)
                }
                _ => write!(f, "0x{}", hex::encode(bytes)),
            },
            StackItem::Integer(value) => write!(f, "{}", value),
            StackItem::Boolean(value) => write!(f, "{}", value),
            StackItem::Interop(item) => write!(f, "{:?}", item),
            StackItem::Array(_) | StackItem::Map(_) if depth >= MAX_DISPLAY_DEPTH => {
                f.write_str("...")
            }
            StackItem::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_depth(f, depth + 1)?;
                }
                f.write_str("]")
            }
            StackItem::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    key.fmt_depth(f, depth + 1)?;
                    f.write_str(": ")?;
                    value.fmt_depth(f, depth + 1)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Containers nest deeper than this are elided when printed; closures
/// reference themselves through their captured frames.
const MAX_DISPLAY_DEPTH: usize = 4;

impl fmt::Display for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_depth(f, 0)
    }
}

impl fmt::Debug for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind())?;
        self.fmt_depth(f, 0)?;
        f.write_str(")")
    }
}

impl PartialEq for StackItem {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<BigInt> for StackItem {
    fn from(value: BigInt) -> Self {
        StackItem::Integer(value)
    }
}

impl From<i64> for StackItem {
    fn from(value: i64) -> Self {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<i32> for StackItem {
    fn from(value: i32) -> Self {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<bool> for StackItem {
    fn from(value: bool) -> Self {
        StackItem::Boolean(value)
    }
}

impl From<&str> for StackItem {
    fn from(value: &str) -> Self {
        StackItem::ByteArray(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for StackItem {
    fn from(value: Vec<u8>) -> Self {
        StackItem::ByteArray(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_compare_by_bytes() {
        assert!(StackItem::from(0).equals(&StackItem::ByteArray(Vec::new())));
        assert!(StackItem::from(false).equals(&StackItem::from(0)));
        assert!(StackItem::from(true).equals(&StackItem::from(1)));
        assert!(StackItem::from("a").equals(&StackItem::from(0x61)));
        assert!(!StackItem::ByteArray(vec![0]).equals(&StackItem::from(0)));
    }

    #[test]
    fn test_containers_compare_by_identity() {
        let a = StackItem::array(vec![]);
        let b = StackItem::array(vec![]);
        assert!(a.equals(&a.clone()));
        assert!(!a.equals(&b));
        assert!(!a.equals(&StackItem::from(0)));
    }

    #[test]
    fn test_partial_eq_follows_machine_equality() {
        let a = StackItem::array(vec![]);
        assert_eq!(StackItem::from(5), StackItem::ByteArray(vec![5]));
        assert_eq!(a, a.clone());
        assert_ne!(a, StackItem::array(vec![]));
        let result: Result<Option<StackItem>, VmError> = Ok(Some(StackItem::from("k")));
        assert_eq!(result, Ok(Some(StackItem::ByteArray(b"k".to_vec()))));
    }

    #[test]
    fn test_truthiness() {
        assert!(!StackItem::ByteArray(vec![0, 0]).to_bool());
        assert!(StackItem::ByteArray(vec![0, 1]).to_bool());
        assert!(StackItem::map().to_bool());
        assert!(!StackItem::from(0).to_bool());
    }

    #[test]
    fn test_integer_conversion() {
        assert_eq!(StackItem::ByteArray(vec![0xFF]).to_integer().unwrap(), BigInt::from(-1));
        assert_eq!(StackItem::from(true).to_integer().unwrap(), BigInt::from(1));
        assert!(matches!(
            StackItem::ByteArray(vec![1; 33]).to_integer(),
            Err(VmError::IntegerOverflow)
        ));
        assert!(StackItem::array(vec![]).to_integer().is_err());
    }

    #[test]
    fn test_display_elides_self_reference() {
        let items = Rc::new(RefCell::new(Vec::new()));
        let array = StackItem::Array(items.clone());
        items.borrow_mut().push(array.clone());
        assert_eq!(array.to_string(), "[[[[...]]]]");
    }
}

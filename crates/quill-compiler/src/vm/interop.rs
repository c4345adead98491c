//! Interop services and the item serialization format.
//!
//! Serialized items are a type byte followed by a body:
//!
//! | type | body |
//! |------|------|
//! | `0x00` byte array | var-length bytes |
//! | `0x01` boolean | one byte |
//! | `0x02` integer | var-length two's complement bytes |
//! | `0x80` array | var-int count, then each item |
//! | `0x82` map | var-int count, then key and value of each entry |

use super::stack_item::{InteropItem, StackItem};
use super::{ExecutionEngine, VmError};
use crate::compiler::bytecode::{MAX_INTEGER_SIZE, ScriptReader, integer_bytes, integer_from_bytes};
use crate::compiler::syscalls::{
    DESERIALIZE, GET_CONTEXT, LOG, SERIALIZE, STORAGE_DELETE, STORAGE_GET, STORAGE_PUT,
};
use std::rc::Rc;

/// Longest storage key a contract may use.
pub const MAX_STORAGE_KEY_SIZE: usize = 1024;

/// Largest item `Neo.Runtime.Deserialize` accepts or produces.
pub const MAX_ITEM_SIZE: usize = 1024 * 1024;

/// Deepest container nesting the serializer handles.
const MAX_NESTING: usize = 64;

const TYPE_BYTE_ARRAY: u8 = 0x00;
const TYPE_BOOLEAN: u8 = 0x01;
const TYPE_INTEGER: u8 = 0x02;
const TYPE_ARRAY: u8 = 0x80;
const TYPE_STRUCT: u8 = 0x81;
const TYPE_MAP: u8 = 0x82;

impl ExecutionEngine {
    /// Runs the interop service `name`.
    pub(super) fn syscall(&mut self, name: &str) -> Result<(), VmError> {
        tracing::trace!("syscall {}", name);
        match name {
            GET_CONTEXT => self.push(StackItem::Interop(InteropItem::StorageContext)),
            STORAGE_GET => {
                self.pop_storage_context()?;
                let key = self.pop_bytes()?;
                let value = self.storage.get(&key).cloned().unwrap_or_default();
                self.push(StackItem::ByteArray(value));
            }
            STORAGE_PUT => {
                self.pop_storage_context()?;
                let key = self.pop_bytes()?;
                if key.len() > MAX_STORAGE_KEY_SIZE {
                    return Err(VmError::ItemTooLarge(key.len()));
                }
                let value = self.pop_bytes()?;
                self.storage.insert(key, value);
            }
            STORAGE_DELETE => {
                self.pop_storage_context()?;
                let key = self.pop_bytes()?;
                self.storage.remove(&key);
            }
            SERIALIZE => {
                let item = self.pop()?;
                let bytes = serialize(&item)?;
                self.push(StackItem::ByteArray(bytes));
            }
            DESERIALIZE => {
                let bytes = self.pop_bytes()?;
                let item = deserialize(&bytes)?;
                self.push(item);
            }
            LOG => {
                let message = self.pop()?.to_string_lossy()?;
                tracing::info!(target: "quill::vm", "log: {}", message);
                self.logs.push(message);
            }
            other => return Err(VmError::UnknownSyscall(other.to_string())),
        }
        Ok(())
    }

    fn pop_storage_context(&mut self) -> Result<(), VmError> {
        match self.pop()? {
            StackItem::Interop(InteropItem::StorageContext) => Ok(()),
            other => Err(VmError::InvalidType {
                expected: "storage context",
                found: other.kind(),
            }),
        }
    }
}

/// Serializes an item; host objects and cyclic containers fail.
pub fn serialize(item: &StackItem) -> Result<Vec<u8>, VmError> {
    let mut out = Vec::new();
    let mut ancestors = Vec::new();
    write_item(item, &mut out, &mut ancestors)?;
    if out.len() > MAX_ITEM_SIZE {
        return Err(VmError::ItemTooLarge(out.len()));
    }
    Ok(out)
}

fn write_item(
    item: &StackItem,
    out: &mut Vec<u8>,
    ancestors: &mut Vec<*const ()>,
) -> Result<(), VmError> {
    match item {
        StackItem::ByteArray(bytes) => {
            out.push(TYPE_BYTE_ARRAY);
            write_var_bytes(out, bytes);
        }
        StackItem::Boolean(value) => {
            out.push(TYPE_BOOLEAN);
            out.push(u8::from(*value));
        }
        StackItem::Integer(value) => {
            out.push(TYPE_INTEGER);
            write_var_bytes(out, &integer_bytes(value));
        }
        StackItem::Array(items) => {
            enter(Rc::as_ptr(items) as *const (), ancestors)?;
            out.push(TYPE_ARRAY);
            let items = items.borrow();
            write_var_int(out, items.len() as u64);
            for item in items.iter() {
                write_item(item, out, ancestors)?;
            }
            ancestors.pop();
        }
        StackItem::Map(entries) => {
            enter(Rc::as_ptr(entries) as *const (), ancestors)?;
            out.push(TYPE_MAP);
            let entries = entries.borrow();
            write_var_int(out, entries.len() as u64);
            for (key, value) in entries.iter() {
                write_item(key, out, ancestors)?;
                write_item(value, out, ancestors)?;
            }
            ancestors.pop();
        }
        StackItem::Interop(_) => {
            return Err(VmError::Serialization(format!(
                "cannot serialize {}",
                item.kind()
            )));
        }
    }
    Ok(())
}

fn enter(container: *const (), ancestors: &mut Vec<*const ()>) -> Result<(), VmError> {
    if ancestors.contains(&container) {
        return Err(VmError::Serialization("cyclic container".to_string()));
    }
    if ancestors.len() >= MAX_NESTING {
        return Err(VmError::Serialization("containers nested too deeply".to_string()));
    }
    ancestors.push(container);
    Ok(())
}

fn write_var_int(out: &mut Vec<u8>, value: u64) {
    if value < 0xFD {
        out.push(value as u8);
    } else if value <= 0xFFFF {
        out.push(0xFD);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xFFFF_FFFF {
        out.push(0xFE);
        out.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        out.push(0xFF);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_var_int(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Rebuilds an item written by [`serialize`]; trailing bytes are an error.
pub fn deserialize(bytes: &[u8]) -> Result<StackItem, VmError> {
    if bytes.len() > MAX_ITEM_SIZE {
        return Err(VmError::ItemTooLarge(bytes.len()));
    }
    let mut reader = ScriptReader::new(bytes);
    let item = read_item(&mut reader, 0)?;
    if !reader.is_at_end() {
        return Err(VmError::Serialization(format!(
            "{} trailing bytes",
            bytes.len() - reader.position()
        )));
    }
    Ok(item)
}

fn read_item(reader: &mut ScriptReader<'_>, depth: usize) -> Result<StackItem, VmError> {
    if depth > MAX_NESTING {
        return Err(VmError::Serialization("containers nested too deeply".to_string()));
    }
    let malformed = |e: crate::compiler::bytecode::DecodeError| VmError::Serialization(e.to_string());
    let item = match reader.read_u8().map_err(malformed)? {
        TYPE_BYTE_ARRAY => {
            StackItem::ByteArray(reader.read_var_bytes(MAX_ITEM_SIZE).map_err(malformed)?.to_vec())
        }
        TYPE_BOOLEAN => StackItem::Boolean(reader.read_u8().map_err(malformed)? != 0),
        TYPE_INTEGER => {
            let bytes = reader.read_var_bytes(MAX_INTEGER_SIZE).map_err(malformed)?;
            StackItem::Integer(integer_from_bytes(bytes))
        }
        TYPE_ARRAY | TYPE_STRUCT => {
            let count = read_count(reader)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_item(reader, depth + 1)?);
            }
            StackItem::array(items)
        }
        TYPE_MAP => {
            let count = read_count(reader)?;
            let map = StackItem::map();
            if let StackItem::Map(entries) = &map {
                for _ in 0..count {
                    let key = read_item(reader, depth + 1)?;
                    if key.is_container() {
                        return Err(VmError::Serialization("container map key".to_string()));
                    }
                    let value = read_item(reader, depth + 1)?;
                    entries.borrow_mut().push((key, value));
                }
            }
            map
        }
        other => {
            return Err(VmError::Serialization(format!(
                "unknown item type 0x{:02x}",
                other
            )));
        }
    };
    Ok(item)
}

/// An element count, bounded by the bytes left to read.
fn read_count(reader: &mut ScriptReader<'_>) -> Result<usize, VmError> {
    let count = reader
        .read_var_int()
        .map_err(|e| VmError::Serialization(e.to_string()))?;
    if count > MAX_ITEM_SIZE as u64 {
        return Err(VmError::ItemTooLarge(count as usize));
    }
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_tagged_value_survives_storage_format() {
        let object = StackItem::map();
        if let StackItem::Map(entries) = &object {
            entries
                .borrow_mut()
                .push((StackItem::from("name"), StackItem::array(vec![4.into(), "neo".into()])));
        }
        let tagged = StackItem::array(vec![6.into(), object]);

        let restored = deserialize(&serialize(&tagged).unwrap()).unwrap();
        let StackItem::Array(items) = restored else {
            panic!("expected an array");
        };
        let items = items.borrow();
        assert_eq!(items[0].to_integer().unwrap(), BigInt::from(6));
        let StackItem::Map(entries) = &items[1] else {
            panic!("expected a map");
        };
        let entries = entries.borrow();
        assert!(entries[0].0.equals(&StackItem::from("name")));
    }

    #[test]
    fn test_exact_encoding_of_primitives() {
        assert_eq!(serialize(&StackItem::from("ab")).unwrap(), vec![0x00, 2, b'a', b'b']);
        assert_eq!(serialize(&StackItem::from(true)).unwrap(), vec![0x01, 1]);
        assert_eq!(serialize(&StackItem::from(-1)).unwrap(), vec![0x02, 1, 0xFF]);
        assert_eq!(serialize(&StackItem::from(0)).unwrap(), vec![0x02, 0]);
    }

    #[test]
    fn test_cycles_and_host_objects_rejected() {
        let array = StackItem::array(vec![]);
        if let StackItem::Array(items) = &array {
            items.borrow_mut().push(array.clone());
        }
        assert!(matches!(serialize(&array), Err(VmError::Serialization(_))));
        let context = StackItem::Interop(InteropItem::StorageContext);
        assert!(matches!(serialize(&context), Err(VmError::Serialization(_))));
    }

    #[test]
    fn test_shared_non_cyclic_items_allowed() {
        let shared = StackItem::array(vec![1.into()]);
        let outer = StackItem::array(vec![shared.clone(), shared]);
        assert!(serialize(&outer).is_ok());
    }

    #[test]
    fn test_malformed_input_rejected() {
        assert!(deserialize(&[]).is_err());
        assert!(deserialize(&[0x00, 5, 1]).is_err());
        assert!(deserialize(&[0x42]).is_err());
        assert!(deserialize(&[0x01, 1, 0]).is_err());
    }
}

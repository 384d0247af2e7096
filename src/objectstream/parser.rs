/*!
 Logic used to decode the contents of a Java object serialization stream.

 Grammar reference:
   - [Java Object Serialization Specification, chapter 6](https://docs.oracle.com/en/java/javase/17/docs/specs/serialization/protocol.html)
*/

use std::rc::Rc;

use crate::{
    error::objectstream::ObjectStreamError,
    objectstream::{
        handles::HandleTable,
        models::{
            ArrayValue, BlockData, ClassData, ClassDescInfo, ClassDescriptor, Content, Entity,
            EnumValue, FieldDesc, FieldValue, JavaString, ObjectValue,
        },
        source::ByteSource,
    },
};

/// First two bytes of every stream
const STREAM_MAGIC: u16 = 0xACED;
/// The only supported protocol version
const STREAM_VERSION: u16 = 5;

/// Indicates a null reference
const TC_NULL: u8 = 0x70;
/// Indicates a back reference to an already-decoded entity
const TC_REFERENCE: u8 = 0x71;
/// Indicates a new class descriptor
const TC_CLASSDESC: u8 = 0x72;
/// Indicates a new object
const TC_OBJECT: u8 = 0x73;
/// Indicates a new string with a 16-bit length prefix
const TC_STRING: u8 = 0x74;
/// Indicates a new array
const TC_ARRAY: u8 = 0x75;
/// Indicates raw block data with an 8-bit length prefix
const TC_BLOCKDATA: u8 = 0x77;
/// Delimits the end of an annotation region
const TC_ENDBLOCKDATA: u8 = 0x78;
/// Indicates raw block data with a 32-bit length prefix
const TC_BLOCKDATALONG: u8 = 0x7A;
/// Indicates a new string with a 64-bit length prefix
const TC_LONGSTRING: u8 = 0x7C;
/// Indicates a dynamic proxy class descriptor, which is not supported
const TC_PROXYCLASSDESC: u8 = 0x7D;
/// Indicates a new enum constant
const TC_ENUM: u8 = 0x7E;

/// The class wrote its fields through a custom `writeObject` method, so an
/// object annotation follows the field values
const SC_WRITE_METHOD: u8 = 0x01;
/// The class implements `Serializable`
const SC_SERIALIZABLE: u8 = 0x02;
/// The class implements `Externalizable`
const SC_EXTERNALIZABLE: u8 = 0x04;
/// Externalizable contents are framed as block data (protocol version 2)
const SC_BLOCK_DATA: u8 = 0x08;

/// Contains logic and data used to decode a Java object serialization
/// stream.
///
/// The decoder is a recursive descent parser driven by a one-byte type
/// code lookahead. Entities that occupy a wire handle are recorded in a
/// handle table in the exact order the grammar assigns them, so later
/// `TC_REFERENCE` markers can resolve to them.
///
/// # Example:
///
/// ```
/// use jserial::objectstream::{parser::ObjectInputStream, source::SliceSource};
///
/// let bytes = [0xAC, 0xED, 0x00, 0x05]; // Header-only stream
/// let mut stream = ObjectInputStream::new(SliceSource::new(&bytes)).unwrap();
/// assert!(stream.read_all().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct ObjectInputStream<S: ByteSource> {
    /// The byte source we want to decode
    source: S,
    /// As we decode the stream, build a table of handle-bearing entities
    /// to resolve back references against
    handles: HandleTable,
}

impl<S: ByteSource> ObjectInputStream<S> {
    /// Given a byte source, construct a decoder over it, validating the
    /// four-byte stream header.
    pub fn new(mut source: S) -> Result<Self, ObjectStreamError> {
        let magic = source.read_u16()?;
        let version = source.read_u16()?;
        if magic != STREAM_MAGIC || version != STREAM_VERSION {
            return Err(ObjectStreamError::BadHeader { magic, version });
        }
        Ok(Self {
            source,
            handles: HandleTable::new(),
        })
    }

    /// Decode top-level contents until the source is exhausted.
    ///
    /// Either the complete list is returned or the first error aborts the
    /// decode; partial results are never exposed.
    pub fn read_all(&mut self) -> Result<Vec<Content>, ObjectStreamError> {
        let mut contents = vec![];
        while self.source.has_data_left() {
            contents.push(self.read_content()?);
        }
        Ok(contents)
    }

    /// Decode a single content node: a new object, string, or block data,
    /// or a back reference to an earlier entity.
    pub fn read_content(&mut self) -> Result<Content, ObjectStreamError> {
        match self.source.peek()? {
            TC_OBJECT => Ok(Content::Object(self.read_new_object()?)),
            TC_STRING | TC_LONGSTRING => Ok(Content::String(self.read_new_string()?)),
            TC_BLOCKDATA | TC_BLOCKDATALONG => Ok(Content::Block(self.read_block_data()?)),
            TC_REFERENCE => {
                let handle = self.read_reference()?;
                self.resolve_content(handle)
            }
            code => Err(ObjectStreamError::BadTypeCode {
                context: "stream content",
                code,
            }),
        }
    }

    /// Number of wire handles allocated so far.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Consume a `TC_REFERENCE` marker and return the handle it carries.
    fn read_reference(&mut self) -> Result<u32, ObjectStreamError> {
        self.source.skip(1)?;
        Ok(self.source.read_i32()? as u32)
    }

    /// Resolve a handle in content position. Objects and arrays are
    /// cloned at their current decoded state; strings, descriptors, and
    /// enums are shared.
    fn resolve_content(&self, handle: u32) -> Result<Content, ObjectStreamError> {
        match self.handles.resolve(handle)? {
            Entity::String(string) => Ok(Content::String(Rc::clone(string))),
            Entity::ClassDesc(descriptor) => Ok(Content::ClassDesc(Rc::clone(descriptor))),
            Entity::Object(object) => Ok(Content::Object(object.clone())),
            Entity::Array(array) => Ok(Content::Array(array.clone())),
            Entity::Enum(value) => Ok(Content::Enum(value.clone())),
            Entity::Placeholder => Err(ObjectStreamError::BadEntityKind {
                handle,
                expected: "a completed entity",
            }),
        }
    }

    /// Resolve a handle in field-value position.
    fn resolve_field_value(&self, handle: u32) -> Result<FieldValue, ObjectStreamError> {
        match self.handles.resolve(handle)? {
            Entity::String(string) => Ok(FieldValue::String(Rc::clone(string))),
            Entity::Object(object) => Ok(FieldValue::Object(object.clone())),
            Entity::Array(array) => Ok(FieldValue::Array(array.clone())),
            Entity::Enum(value) => Ok(FieldValue::Enum(value.clone())),
            Entity::ClassDesc(_) | Entity::Placeholder => Err(ObjectStreamError::BadEntityKind {
                handle,
                expected: "a field value",
            }),
        }
    }

    /// `classDesc` production: a new descriptor, a back reference to one,
    /// or null.
    fn read_class_desc(&mut self) -> Result<Option<Rc<ClassDescriptor>>, ObjectStreamError> {
        match self.source.peek()? {
            TC_NULL => {
                self.source.skip(1)?;
                Ok(None)
            }
            TC_CLASSDESC => Ok(Some(self.read_new_class_desc()?)),
            TC_PROXYCLASSDESC => Err(ObjectStreamError::UnsupportedProxyClassDesc),
            TC_REFERENCE => {
                let handle = self.read_reference()?;
                match self.handles.resolve(handle)? {
                    Entity::ClassDesc(descriptor) => Ok(Some(Rc::clone(descriptor))),
                    _ => Err(ObjectStreamError::BadEntityKind {
                        handle,
                        expected: "a class descriptor",
                    }),
                }
            }
            code => Err(ObjectStreamError::BadTypeCode {
                context: "class descriptor",
                code,
            }),
        }
    }

    /// `newClassDesc` production.
    ///
    /// The descriptor's handle is assigned after its name and serial UID
    /// but before the rest of the descriptor, so handle numbering matches
    /// the wire: strings allocated inside the field list and annotation
    /// come after the descriptor itself. The reserved slot is patched once
    /// the descriptor is complete.
    fn read_new_class_desc(&mut self) -> Result<Rc<ClassDescriptor>, ObjectStreamError> {
        self.source.skip(1)?;
        let name = self.read_utf()?.text();
        let serial_uid = self.source.read_i64()?;

        let handle = self.handles.allocate(Entity::Placeholder);

        let flags = self.source.read_u8()?;
        let field_count = self.source.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(self.read_field_desc()?);
        }
        let annotation = self.read_annotation()?;
        let super_class = self.read_class_desc()?;

        let descriptor = Rc::new(ClassDescriptor {
            name,
            serial_uid,
            info: ClassDescInfo {
                flags,
                fields,
                annotation,
                super_class,
            },
        });
        self.handles
            .replace(handle, Entity::ClassDesc(Rc::clone(&descriptor)))?;
        Ok(descriptor)
    }

    /// `fieldDesc` production: a one-byte type code and field name, plus
    /// the field's class name for object and array fields.
    fn read_field_desc(&mut self) -> Result<FieldDesc, ObjectStreamError> {
        let code = self.source.read_u8()?;
        let type_code = char::from(code);
        if !matches!(
            type_code,
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' | '[' | 'L'
        ) {
            return Err(ObjectStreamError::BadFieldType(code));
        }
        let name = self.read_utf()?.text();
        let class_name = if matches!(type_code, '[' | 'L') {
            Some(self.read_string_entity()?)
        } else {
            None
        };
        Ok(FieldDesc {
            type_code,
            name,
            class_name,
        })
    }

    /// Read contents until the closing `TC_ENDBLOCKDATA`, consuming the
    /// delimiter and nothing past it.
    fn read_annotation(&mut self) -> Result<Vec<Content>, ObjectStreamError> {
        let mut contents = vec![];
        while self.source.peek()? != TC_ENDBLOCKDATA {
            contents.push(self.read_content()?);
        }
        self.source.skip(1)?;
        Ok(contents)
    }

    /// `newObject` production.
    ///
    /// The object's handle is assigned before its class data is read so
    /// back references from inside the data resolve to this object. The
    /// slot holds the partially decoded object while the data is read,
    /// level by level and field by field; a back reference mid-decode
    /// therefore captures the state decoded so far.
    fn read_new_object(&mut self) -> Result<ObjectValue, ObjectStreamError> {
        self.source.skip(1)?;
        let description = self.read_class_desc()?;

        let handle = self.handles.allocate(Entity::Object(ObjectValue {
            description: description.clone(),
            class_data: vec![],
        }));

        if let Some(descriptor) = description {
            // Instance data is written top of the hierarchy first
            for level in descriptor.hierarchy().into_iter().rev() {
                self.read_class_data(handle, level)?;
            }
        }

        match self.handles.resolve(handle)? {
            Entity::Object(object) => Ok(object.clone()),
            _ => Err(ObjectStreamError::BadEntityKind {
                handle,
                expected: "an object",
            }),
        }
    }

    /// `classdata` production for one hierarchy level, appended onto the
    /// object the handle refers to.
    fn read_class_data(
        &mut self,
        handle: u32,
        descriptor: &ClassDescriptor,
    ) -> Result<(), ObjectStreamError> {
        let flags = descriptor.info.flags;
        let serializable = flags & SC_SERIALIZABLE != 0;
        let externalizable = flags & SC_EXTERNALIZABLE != 0;
        if serializable && externalizable {
            return Err(ObjectStreamError::BadFlags(flags));
        }

        if serializable {
            self.push_level(handle)?;
            for field in &descriptor.info.fields {
                let value = self.read_field_value(field.type_code)?;
                self.current_level_mut(handle)?
                    .values
                    .push((field.name.clone(), value));
            }
            if flags & SC_WRITE_METHOD != 0 {
                let annotation = self.read_annotation()?;
                self.current_level_mut(handle)?.annotation = annotation;
            }
            return Ok(());
        }

        if externalizable {
            if flags & SC_BLOCK_DATA == 0 {
                return Err(ObjectStreamError::UnsupportedExternalV1);
            }
            self.push_level(handle)?;
            let annotation = self.read_annotation()?;
            self.current_level_mut(handle)?.annotation = annotation;
            return Ok(());
        }

        Err(ObjectStreamError::BadFlags(flags))
    }

    /// Start a new empty hierarchy level on the object the handle refers
    /// to.
    fn push_level(&mut self, handle: u32) -> Result<(), ObjectStreamError> {
        match self.handles.get_mut(handle)? {
            Entity::Object(object) => {
                object.class_data.push(ClassData::default());
                Ok(())
            }
            _ => Err(ObjectStreamError::BadEntityKind {
                handle,
                expected: "an object",
            }),
        }
    }

    /// The hierarchy level currently being filled on the object the
    /// handle refers to.
    fn current_level_mut(&mut self, handle: u32) -> Result<&mut ClassData, ObjectStreamError> {
        match self.handles.get_mut(handle)? {
            Entity::Object(object) => {
                object
                    .class_data
                    .last_mut()
                    .ok_or(ObjectStreamError::BadEntityKind {
                        handle,
                        expected: "an object with class data",
                    })
            }
            _ => Err(ObjectStreamError::BadEntityKind {
                handle,
                expected: "an object",
            }),
        }
    }

    /// Read one field value of the given type code.
    fn read_field_value(&mut self, type_code: char) -> Result<FieldValue, ObjectStreamError> {
        match type_code {
            'B' => Ok(FieldValue::Byte(self.source.read_i8()?)),
            'C' => Ok(FieldValue::Char(self.source.read_u16()?)),
            'D' => Ok(FieldValue::Double(self.source.read_f64()?)),
            'F' => Ok(FieldValue::Float(self.source.read_f32()?)),
            'I' => Ok(FieldValue::Int(self.source.read_i32()?)),
            'J' => Ok(FieldValue::Long(self.source.read_i64()?)),
            'S' => Ok(FieldValue::Short(self.source.read_i16()?)),
            'Z' => Ok(FieldValue::Boolean(self.source.read_bool()?)),
            '[' => self.read_array_field(),
            'L' => self.read_object_field(),
            other => Err(ObjectStreamError::BadFieldType(other as u8)),
        }
    }

    /// The value of an array-typed (`[`) field.
    fn read_array_field(&mut self) -> Result<FieldValue, ObjectStreamError> {
        match self.source.peek()? {
            TC_NULL => {
                self.source.skip(1)?;
                Ok(FieldValue::Null)
            }
            TC_ARRAY => Ok(FieldValue::Array(self.read_new_array()?)),
            TC_REFERENCE => {
                let handle = self.read_reference()?;
                self.resolve_field_value(handle)
            }
            code => Err(ObjectStreamError::BadTypeCode {
                context: "array field",
                code,
            }),
        }
    }

    /// The value of an object-typed (`L`) field. Fields declared as
    /// `java.lang.Object` can hold any reference, so arrays and both
    /// string widths are accepted here too.
    fn read_object_field(&mut self) -> Result<FieldValue, ObjectStreamError> {
        match self.source.peek()? {
            TC_NULL => {
                self.source.skip(1)?;
                Ok(FieldValue::Null)
            }
            TC_OBJECT => Ok(FieldValue::Object(self.read_new_object()?)),
            TC_STRING | TC_LONGSTRING => Ok(FieldValue::String(self.read_new_string()?)),
            TC_ARRAY => Ok(FieldValue::Array(self.read_new_array()?)),
            TC_ENUM => Ok(FieldValue::Enum(self.read_new_enum()?)),
            TC_REFERENCE => {
                let handle = self.read_reference()?;
                self.resolve_field_value(handle)
            }
            code => Err(ObjectStreamError::BadTypeCode {
                context: "object field",
                code,
            }),
        }
    }

    /// `newArray` production.
    ///
    /// The array's handle is assigned before its size and elements are
    /// read; the slot holds the partially decoded array while elements
    /// are appended. The element type is the second character of the
    /// array class name.
    fn read_new_array(&mut self) -> Result<ArrayValue, ObjectStreamError> {
        self.source.skip(1)?;
        let descriptor = self
            .read_class_desc()?
            .ok_or(ObjectStreamError::BadTypeCode {
                context: "array class descriptor",
                code: TC_NULL,
            })?;

        let handle = self.handles.allocate(Entity::Array(ArrayValue {
            description: Rc::clone(&descriptor),
            values: vec![],
        }));

        let size = self.source.read_i32()?;
        if size < 0 {
            return Err(ObjectStreamError::BadLength {
                context: "array",
                length: size as i64,
            });
        }

        let element_code = descriptor
            .name
            .chars()
            .nth(1)
            .ok_or(ObjectStreamError::BadFieldType(0))?;

        for _ in 0..size {
            let value = self.read_field_value(element_code)?;
            match self.handles.get_mut(handle)? {
                Entity::Array(array) => array.values.push(value),
                _ => {
                    return Err(ObjectStreamError::BadEntityKind {
                        handle,
                        expected: "an array",
                    })
                }
            }
        }

        match self.handles.resolve(handle)? {
            Entity::Array(array) => Ok(array.clone()),
            _ => Err(ObjectStreamError::BadEntityKind {
                handle,
                expected: "an array",
            }),
        }
    }

    /// `newEnum` production. The enum's slot is reserved before its
    /// constant name is read, since the name may allocate a string handle
    /// of its own.
    fn read_new_enum(&mut self) -> Result<EnumValue, ObjectStreamError> {
        self.source.skip(1)?;
        let description = self
            .read_class_desc()?
            .ok_or(ObjectStreamError::BadTypeCode {
                context: "enum class descriptor",
                code: TC_NULL,
            })?;

        let handle = self.handles.allocate(Entity::Placeholder);
        let constant = self.read_string_entity()?;

        let value = EnumValue {
            description,
            constant,
        };
        self.handles.replace(handle, Entity::Enum(value.clone()))?;
        Ok(value)
    }

    /// `newString` production including back references: `TC_STRING`,
    /// `TC_LONGSTRING`, or `TC_REFERENCE` to an earlier string.
    fn read_string_entity(&mut self) -> Result<Rc<JavaString>, ObjectStreamError> {
        match self.source.peek()? {
            TC_STRING | TC_LONGSTRING => self.read_new_string(),
            TC_REFERENCE => {
                let handle = self.read_reference()?;
                match self.handles.resolve(handle)? {
                    Entity::String(string) => Ok(Rc::clone(string)),
                    _ => Err(ObjectStreamError::BadEntityKind {
                        handle,
                        expected: "a string",
                    }),
                }
            }
            code => Err(ObjectStreamError::BadTypeCode {
                context: "string",
                code,
            }),
        }
    }

    /// Decode a new string entity and record it in the handle table.
    fn read_new_string(&mut self) -> Result<Rc<JavaString>, ObjectStreamError> {
        let string = match self.source.peek()? {
            TC_STRING => {
                self.source.skip(1)?;
                self.read_utf()?
            }
            TC_LONGSTRING => {
                self.source.skip(1)?;
                self.read_long_utf()?
            }
            code => {
                return Err(ObjectStreamError::BadTypeCode {
                    context: "string",
                    code,
                })
            }
        };
        let string = Rc::new(string);
        self.handles.allocate(Entity::String(Rc::clone(&string)));
        Ok(string)
    }

    /// Decode a block data record of either width.
    fn read_block_data(&mut self) -> Result<BlockData, ObjectStreamError> {
        match self.source.peek()? {
            TC_BLOCKDATA => {
                self.source.skip(1)?;
                // The short form's length byte is unsigned, so payloads of
                // 128..=255 bytes are valid
                let length = self.source.read_u8()? as usize;
                Ok(BlockData::Short(self.source.read_bytes(length)?))
            }
            TC_BLOCKDATALONG => {
                self.source.skip(1)?;
                let length = self.source.read_i32()?;
                if length < 0 {
                    return Err(ObjectStreamError::BadLength {
                        context: "block data",
                        length: length as i64,
                    });
                }
                Ok(BlockData::Long(self.source.read_bytes(length as usize)?))
            }
            code => Err(ObjectStreamError::BadTypeCode {
                context: "block data",
                code,
            }),
        }
    }

    /// Read a boolean, as `DataInput.readBoolean` would. The primitive
    /// readers below are thin pass-throughs to the byte source so callers
    /// that walk the decoded tree can re-interpret opaque block data
    /// payloads.
    pub fn read_bool(&mut self) -> Result<bool, ObjectStreamError> {
        Ok(self.source.read_bool()?)
    }

    /// Read a signed byte, as `DataInput.readByte` would.
    pub fn read_i8(&mut self) -> Result<i8, ObjectStreamError> {
        Ok(self.source.read_i8()?)
    }

    /// Read an unsigned byte, as `DataInput.readUnsignedByte` would.
    pub fn read_u8(&mut self) -> Result<u8, ObjectStreamError> {
        Ok(self.source.read_u8()?)
    }

    /// Read a UTF-16 code unit, as `DataInput.readChar` would.
    pub fn read_char(&mut self) -> Result<u16, ObjectStreamError> {
        Ok(self.source.read_u16()?)
    }

    /// Read a signed short, as `DataInput.readShort` would.
    pub fn read_i16(&mut self) -> Result<i16, ObjectStreamError> {
        Ok(self.source.read_i16()?)
    }

    /// Read an unsigned short, as `DataInput.readUnsignedShort` would.
    pub fn read_u16(&mut self) -> Result<u16, ObjectStreamError> {
        Ok(self.source.read_u16()?)
    }

    /// Read a signed int, as `DataInput.readInt` would.
    pub fn read_i32(&mut self) -> Result<i32, ObjectStreamError> {
        Ok(self.source.read_i32()?)
    }

    /// Read a signed long, as `DataInput.readLong` would.
    pub fn read_i64(&mut self) -> Result<i64, ObjectStreamError> {
        Ok(self.source.read_i64()?)
    }

    /// Read a float, as `DataInput.readFloat` would.
    pub fn read_f32(&mut self) -> Result<f32, ObjectStreamError> {
        Ok(self.source.read_f32()?)
    }

    /// Read a double, as `DataInput.readDouble` would.
    pub fn read_f64(&mut self) -> Result<f64, ObjectStreamError> {
        Ok(self.source.read_f64()?)
    }

    /// Read a string with a 16-bit length prefix, as `DataInput.readUTF`
    /// would. The result is not recorded in the handle table.
    pub fn read_utf(&mut self) -> Result<JavaString, ObjectStreamError> {
        let length = self.source.read_u16()? as usize;
        Ok(JavaString::utf(self.source.read_bytes(length)?))
    }

    /// Read a string with a 64-bit length prefix, as
    /// `ObjectInputStream.readLongUTF` would. The result is not recorded
    /// in the handle table.
    pub fn read_long_utf(&mut self) -> Result<JavaString, ObjectStreamError> {
        let length = self.source.read_i64()?;
        if length < 0 {
            return Err(ObjectStreamError::BadLength {
                context: "long string",
                length,
            });
        }
        Ok(JavaString::long_utf(self.source.read_bytes(length as usize)?))
    }
}

/*!
 Data structures and models produced by the object stream decoder.
*/

use std::rc::Rc;

/// Length-prefix variant a string was written with on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    /// `TC_STRING`: 16-bit unsigned length prefix
    Utf,
    /// `TC_LONGSTRING`: 64-bit signed length prefix
    LongUtf,
}

/// A serialized string, kept as the exact modified UTF-8 bytes that
/// appeared on the wire.
///
/// Java encodes strings as modified UTF-8: supplementary characters are
/// written as CESU-8 surrogate pairs and `NUL` is written as the two-byte
/// sequence `C0 80`. The raw payload is preserved byte-exact; [`text`]
/// decodes it on demand.
///
/// [`text`]: JavaString::text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaString {
    kind: StringKind,
    bytes: Vec<u8>,
}

impl JavaString {
    pub(crate) fn utf(bytes: Vec<u8>) -> Self {
        Self {
            kind: StringKind::Utf,
            bytes,
        }
    }

    pub(crate) fn long_utf(bytes: Vec<u8>) -> Self {
        Self {
            kind: StringKind::LongUtf,
            bytes,
        }
    }

    /// The length-prefix variant the string was written with
    pub fn kind(&self) -> StringKind {
        self.kind
    }

    /// The raw modified UTF-8 payload bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode the payload to text. Malformed sequences and unpaired
    /// surrogates become U+FFFD.
    pub fn text(&self) -> String {
        decode_modified_utf8(&self.bytes)
    }
}

/// Metadata describing a serialized class: name, serial version UID, and
/// the field, annotation, and superclass information. Immutable once
/// decoded; objects referring to a descriptor carry their own
/// [`ClassData`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    /// The binary class name, e.g. `java.util.HashMap` or `[B`
    pub name: String,
    /// The `serialVersionUID` of the class
    pub serial_uid: i64,
    /// Flags, declared fields, class annotation, and super descriptor
    pub info: ClassDescInfo,
}

impl ClassDescriptor {
    /// The descriptor chain starting at `self`, most-derived class first.
    pub fn hierarchy(&self) -> Vec<&ClassDescriptor> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.info.super_class.as_deref() {
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

/// The layout half of a class descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescInfo {
    /// `SC_*` flag bits controlling how instance data is laid out
    pub flags: u8,
    /// Declared serializable fields, in declaration order
    pub fields: Vec<FieldDesc>,
    /// Contents written by `ObjectOutputStream.annotateClass`
    pub annotation: Vec<Content>,
    /// The superclass descriptor, up to the first non-serializable class
    pub super_class: Option<Rc<ClassDescriptor>>,
}

/// A single declared field inside a class descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    /// Field type code: one of `B C D F I J S Z [ L`
    pub type_code: char,
    /// The field name
    pub name: String,
    /// For object (`L`) and array (`[`) fields, the field's class name in
    /// JVM descriptor form, e.g. `Ljava/lang/String;`
    pub class_name: Option<Rc<JavaString>>,
}

/// A deserialized object instance
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    /// The object's class descriptor; `None` when the stream wrote a null
    /// descriptor
    pub description: Option<Rc<ClassDescriptor>>,
    /// One [`ClassData`] per level of the class hierarchy, top of the
    /// hierarchy first
    pub class_data: Vec<ClassData>,
}

impl ObjectValue {
    /// The object's class name, if it has a descriptor
    pub fn class_name(&self) -> Option<&str> {
        self.description.as_deref().map(|desc| desc.name.as_str())
    }

    /// Look up a field value by name across all hierarchy levels,
    /// most-derived level first.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.class_data
            .iter()
            .rev()
            .find_map(|data| data.value(name))
    }
}

/// The instance data for one level of an object's class hierarchy:
/// declared field values plus the annotation a custom writer method
/// produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassData {
    /// Field values in declaration order, keyed by field name
    pub values: Vec<(String, FieldValue)>,
    /// Contents written by `writeObject` / `writeExternal`
    pub annotation: Vec<Content>,
}

impl ClassData {
    /// Look up a field value by name.
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find_map(|(field, value)| (field == name).then_some(value))
    }
}

/// A deserialized array
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    /// The array's class descriptor, e.g. for `[I`
    pub description: Rc<ClassDescriptor>,
    /// The elements, in order
    pub values: Vec<FieldValue>,
}

impl ArrayValue {
    /// The element type code, taken from the second character of the
    /// array class name (`[B` holds `B` elements).
    pub fn element_type_code(&self) -> Option<char> {
        self.description.name.chars().nth(1)
    }
}

/// A deserialized enum constant
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// The enum's class descriptor
    pub description: Rc<ClassDescriptor>,
    /// The constant's name
    pub constant: Rc<JavaString>,
}

/// Raw bytes a custom writer method interleaved with structured fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockData {
    /// `TC_BLOCKDATA`: 8-bit unsigned length prefix
    Short(Vec<u8>),
    /// `TC_BLOCKDATALONG`: 32-bit signed length prefix
    Long(Vec<u8>),
}

impl BlockData {
    /// The raw payload bytes
    pub fn bytes(&self) -> &[u8] {
        match self {
            BlockData::Short(bytes) | BlockData::Long(bytes) => bytes,
        }
    }
}

/// The value stored in a single object field or array element
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A `byte` field (`B`)
    Byte(i8),
    /// A `char` field (`C`), kept as its UTF-16 code unit
    Char(u16),
    /// A `double` field (`D`)
    Double(f64),
    /// A `float` field (`F`)
    Float(f32),
    /// An `int` field (`I`)
    Int(i32),
    /// A `long` field (`J`)
    Long(i64),
    /// A `short` field (`S`)
    Short(i16),
    /// A `boolean` field (`Z`)
    Boolean(bool),
    /// A string reference
    String(Rc<JavaString>),
    /// A nested object
    Object(ObjectValue),
    /// A nested array
    Array(ArrayValue),
    /// An enum constant
    Enum(EnumValue),
    /// A null reference
    Null,
}

/// A decoded top-level or annotation content node.
///
/// New objects, strings, and block data appear directly; arrays, enums,
/// and class descriptors can reach content position only through a
/// `TC_REFERENCE` to an entity decoded earlier in a nested production.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Object(ObjectValue),
    String(Rc<JavaString>),
    Block(BlockData),
    Array(ArrayValue),
    Enum(EnumValue),
    ClassDesc(Rc<ClassDescriptor>),
}

impl Content {
    /// If `self` is a string, decode its text.
    pub fn as_string_text(&self) -> Option<String> {
        match self {
            Content::String(string) => Some(string.text()),
            _ => None,
        }
    }
}

/// What a handle-table slot holds
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Entity {
    String(Rc<JavaString>),
    ClassDesc(Rc<ClassDescriptor>),
    Object(ObjectValue),
    Array(ArrayValue),
    Enum(EnumValue),
    /// A slot reserved for an entity whose decoding is still in progress.
    /// Class descriptors and enums reserve their slot before their
    /// trailing data is read so that handle numbering matches the wire.
    Placeholder,
}

/// Decode Java modified UTF-8: standard one- to three-byte UTF-8
/// sequences, CESU-8 surrogate pairs for supplementary characters, and
/// `C0 80` for `NUL`. Malformed sequences become U+FFFD.
fn decode_modified_utf8(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if byte & 0x80 == 0 {
            units.push(byte as u16);
            idx += 1;
        } else if byte & 0xE0 == 0xC0 && idx + 1 < bytes.len() && bytes[idx + 1] & 0xC0 == 0x80 {
            units.push(((byte as u16 & 0x1F) << 6) | (bytes[idx + 1] as u16 & 0x3F));
            idx += 2;
        } else if byte & 0xF0 == 0xE0
            && idx + 2 < bytes.len()
            && bytes[idx + 1] & 0xC0 == 0x80
            && bytes[idx + 2] & 0xC0 == 0x80
        {
            units.push(
                ((byte as u16 & 0x0F) << 12)
                    | ((bytes[idx + 1] as u16 & 0x3F) << 6)
                    | (bytes[idx + 2] as u16 & 0x3F),
            );
            idx += 3;
        } else {
            // Four-byte UTF-8 never appears in modified UTF-8
            units.push(0xFFFD);
            idx += 1;
        }
    }
    String::from_utf16_lossy(&units)
}

//! Wire type descriptors.
//!
//! [`GobType`] is the structural description of a type as both peers see it.
//! It travels on the wire as a [`WireType`], an ordinary struct encoded with
//! the same engines as user values. The descriptor structs therefore describe
//! themselves; their ids are fixed so that neither side has to send them.
use {
    crate::{
        error::{corrupt, Result},
        schema::{Gob, IntSlot, Kind, View, ViewMut},
    },
    core::fmt,
};

/// Identity of a wire type within a session.
///
/// Ids below [`TypeId::FIRST_USER`] are builtin and shared by every peer.
/// On the wire a negative id announces a type definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub i32);

impl TypeId {
    pub const BOOL: Self = Self(1);
    pub const INT: Self = Self(2);
    pub const UINT: Self = Self(3);
    pub const FLOAT: Self = Self(4);
    pub const BYTES: Self = Self(5);
    pub const STRING: Self = Self(6);
    pub const COMPLEX: Self = Self(7);
    pub const INTERFACE: Self = Self(8);
    pub const WIRE_TYPE: Self = Self(16);
    pub const ARRAY_TYPE: Self = Self(17);
    pub const COMMON_TYPE: Self = Self(18);
    pub const SLICE_TYPE: Self = Self(19);
    pub const STRUCT_TYPE: Self = Self(20);
    pub const FIELD_TYPE: Self = Self(21);
    pub const FIELD_TYPE_SLICE: Self = Self(22);
    pub const MAP_TYPE: Self = Self(23);
    pub const CUSTOM_TYPE: Self = Self(24);
    /// First id handed out to user types.
    pub const FIRST_USER: Self = Self(64);

    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Gob for TypeId {
    #[inline]
    fn kind() -> Kind {
        Kind::Int
    }

    #[inline]
    fn zero() -> Self {
        Self(0)
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Int(self.0 as i64)
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Int(IntSlot::I32(&mut self.0))
    }
}

/// A named field of a struct wire type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireField {
    pub name: String,
    pub id: TypeId,
}

/// Structural description of a wire type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GobType {
    Bool,
    Int,
    Uint,
    Float,
    Complex,
    Bytes,
    String,
    Interface,
    Array {
        name: String,
        elem: TypeId,
        len: usize,
    },
    Slice {
        name: String,
        elem: TypeId,
    },
    Map {
        name: String,
        key: TypeId,
        elem: TypeId,
    },
    Struct {
        name: String,
        fields: Vec<WireField>,
    },
    /// A type that carries its own codec; its bytes are opaque.
    Custom {
        name: String,
    },
}

impl GobType {
    pub fn name(&self) -> &str {
        match self {
            GobType::Bool => "bool",
            GobType::Int => "int",
            GobType::Uint => "uint",
            GobType::Float => "float",
            GobType::Complex => "complex",
            GobType::Bytes => "[]byte",
            GobType::String => "string",
            GobType::Interface => "interface",
            GobType::Array { name, .. }
            | GobType::Slice { name, .. }
            | GobType::Map { name, .. }
            | GobType::Struct { name, .. }
            | GobType::Custom { name } => name,
        }
    }

    /// The builtin id of a basic local shape, if it has one.
    pub(crate) fn basic_id(kind: &Kind) -> Option<TypeId> {
        Some(match kind {
            Kind::Bool => TypeId::BOOL,
            Kind::Int => TypeId::INT,
            Kind::Uint => TypeId::UINT,
            Kind::Float => TypeId::FLOAT,
            Kind::Complex => TypeId::COMPLEX,
            Kind::String => TypeId::STRING,
            Kind::Bytes => TypeId::BYTES,
            Kind::Interface => TypeId::INTERFACE,
            _ => return None,
        })
    }

    /// The descriptor sent for this type under `id`.
    ///
    /// Basic types are never sent and yield `None`.
    pub fn to_wire(&self, id: TypeId) -> Option<WireType> {
        let common = |name: &str| CommonType {
            name: name.to_owned(),
            id,
        };
        let mut wire = WireType::default();
        match self {
            GobType::Array { name, elem, len } => {
                wire.array = Some(Box::new(ArrayType {
                    common: common(name),
                    elem: *elem,
                    len: *len as i64,
                }));
            }
            GobType::Slice { name, elem } => {
                wire.slice = Some(Box::new(SliceType {
                    common: common(name),
                    elem: *elem,
                }));
            }
            GobType::Map { name, key, elem } => {
                wire.map = Some(Box::new(MapType {
                    common: common(name),
                    key: *key,
                    elem: *elem,
                }));
            }
            GobType::Struct { name, fields } => {
                wire.strct = Some(Box::new(StructType {
                    common: common(name),
                    fields: fields
                        .iter()
                        .map(|f| FieldType {
                            name: f.name.clone(),
                            id: f.id,
                        })
                        .collect(),
                }));
            }
            GobType::Custom { name } => {
                wire.custom = Some(Box::new(CustomType {
                    common: common(name),
                }));
            }
            _ => return None,
        }
        Some(wire)
    }

    /// Rebuild a description from a received descriptor.
    pub fn from_wire(wire: WireType) -> Result<Self> {
        let WireType {
            array,
            slice,
            strct,
            map,
            custom,
        } = wire;
        let set = [
            array.is_some(),
            slice.is_some(),
            strct.is_some(),
            map.is_some(),
            custom.is_some(),
        ];
        if set.iter().filter(|s| **s).count() != 1 {
            return Err(corrupt("wire type must set exactly one variant"));
        }
        if let Some(a) = array {
            let len = usize::try_from(a.len).map_err(|_| corrupt("negative array length"))?;
            return Ok(GobType::Array {
                name: a.common.name,
                elem: a.elem,
                len,
            });
        }
        if let Some(s) = slice {
            return Ok(GobType::Slice {
                name: s.common.name,
                elem: s.elem,
            });
        }
        if let Some(m) = map {
            return Ok(GobType::Map {
                name: m.common.name,
                key: m.key,
                elem: m.elem,
            });
        }
        if let Some(s) = strct {
            return Ok(GobType::Struct {
                name: s.common.name,
                fields: s
                    .fields
                    .into_iter()
                    .map(|f| WireField {
                        name: f.name,
                        id: f.id,
                    })
                    .collect(),
            });
        }
        match custom {
            Some(c) => Ok(GobType::Custom {
                name: c.common.name,
            }),
            None => Err(corrupt("wire type must set exactly one variant")),
        }
    }
}

#[derive(crate::Gob, Clone, Debug, Default, PartialEq)]
pub struct CommonType {
    #[gob(rename = "Name")]
    pub name: String,
    #[gob(rename = "Id")]
    pub id: TypeId,
}

#[derive(crate::Gob, Clone, Debug, Default, PartialEq)]
pub struct ArrayType {
    #[gob(rename = "CommonType")]
    pub common: CommonType,
    #[gob(rename = "Elem")]
    pub elem: TypeId,
    #[gob(rename = "Len")]
    pub len: i64,
}

#[derive(crate::Gob, Clone, Debug, Default, PartialEq)]
pub struct SliceType {
    #[gob(rename = "CommonType")]
    pub common: CommonType,
    #[gob(rename = "Elem")]
    pub elem: TypeId,
}

#[derive(crate::Gob, Clone, Debug, Default, PartialEq)]
pub struct FieldType {
    #[gob(rename = "Name")]
    pub name: String,
    #[gob(rename = "Id")]
    pub id: TypeId,
}

#[derive(crate::Gob, Clone, Debug, Default, PartialEq)]
pub struct StructType {
    #[gob(rename = "CommonType")]
    pub common: CommonType,
    #[gob(rename = "Field")]
    pub fields: Vec<FieldType>,
}

#[derive(crate::Gob, Clone, Debug, Default, PartialEq)]
pub struct MapType {
    #[gob(rename = "CommonType")]
    pub common: CommonType,
    #[gob(rename = "Key")]
    pub key: TypeId,
    #[gob(rename = "Elem")]
    pub elem: TypeId,
}

#[derive(crate::Gob, Clone, Debug, Default, PartialEq)]
pub struct CustomType {
    #[gob(rename = "CommonType")]
    pub common: CommonType,
}

/// The self-describing descriptor. Exactly one field is set.
#[derive(crate::Gob, Clone, Debug, Default, PartialEq)]
pub struct WireType {
    #[gob(rename = "ArrayT")]
    pub array: Option<Box<ArrayType>>,
    #[gob(rename = "SliceT")]
    pub slice: Option<Box<SliceType>>,
    #[gob(rename = "StructT")]
    pub strct: Option<Box<StructType>>,
    #[gob(rename = "MapT")]
    pub map: Option<Box<MapType>>,
    #[gob(rename = "CustomT")]
    pub custom: Option<Box<CustomType>>,
}

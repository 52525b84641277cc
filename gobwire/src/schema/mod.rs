//! Reflection over Rust values.
//!
//! Every value that can travel on the wire implements [`Gob`]. The trait
//! exposes a closed set of shapes ([`Kind`]) and borrowed accessors
//! ([`View`] for reading, [`ViewMut`] for writing) so that encode and decode
//! engines can walk arbitrary object graphs without knowing their concrete
//! types.
//!
//! Most user types get their implementation from `#[derive(Gob)]`:
//!
//! ```
//! # use gobwire::{Gob, Kind, View};
//! #[derive(Gob, Debug, PartialEq)]
//! struct Point {
//!     x: i64,
//!     y: i64,
//!     #[gob(skip)]
//!     cache: Option<String>,
//! }
//!
//! let Kind::Struct(st) = Point::kind() else { unreachable!() };
//! assert_eq!(st.fields.len(), 2);
//!
//! let p = Point { x: 3, y: 4, cache: None };
//! let View::Struct(fields) = p.view() else { unreachable!() };
//! assert!(matches!(fields.field(1).unwrap().view(), View::Int(4)));
//! ```
use {
    crate::error::{corrupt, Result},
    core::{
        any::{self, Any},
        fmt,
        hash::{Hash, Hasher},
    },
};

pub mod containers;
mod impls;

pub use containers::{Complex, GobCodec, Interface};

/// Object-safe identity and downcasting for [`Gob`] values.
///
/// Implemented for every [`Gob`] type; never implement it by hand.
pub trait Reflect: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// The [`LocalType`] of the concrete value behind a trait object.
    fn local_type(&self) -> LocalType;
}

impl<T: Gob> Reflect for T {
    #[inline(always)]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline(always)]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    #[inline(always)]
    fn local_type(&self) -> LocalType {
        LocalType::of::<T>()
    }
}

/// A type that can be described to and exchanged with a remote peer.
pub trait Gob: Reflect {
    /// The shape of this type.
    fn kind() -> Kind
    where
        Self: Sized;

    /// The zero value decoding starts from.
    fn zero() -> Self
    where
        Self: Sized;

    fn view(&self) -> View<'_>;

    fn view_mut(&mut self) -> ViewMut<'_>;
}

impl dyn Gob {
    #[inline]
    pub fn is<T: Gob>(&self) -> bool {
        self.as_any().is::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Gob>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    #[inline]
    pub fn downcast_mut<T: Gob>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// Identity of a local Rust type.
///
/// The [`Kind`] is computed on demand, which lets self-referential types
/// describe themselves without infinite recursion.
#[derive(Clone, Copy)]
pub struct LocalType {
    id: any::TypeId,
    name: &'static str,
    kind: fn() -> Kind,
}

impl LocalType {
    #[inline]
    pub fn of<T: Gob>() -> Self {
        Self {
            id: any::TypeId::of::<T>(),
            name: any::type_name::<T>(),
            kind: T::kind,
        }
    }

    #[inline]
    pub fn id(&self) -> any::TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        (self.kind)()
    }

    /// Strip pointer layers, returning the base type and the number of layers removed.
    pub fn strip_pointers(self) -> (LocalType, usize) {
        let mut ty = self;
        let mut indir = 0;
        while let Kind::Pointer { elem } = ty.kind() {
            ty = elem;
            indir += 1;
        }
        (ty, indir)
    }
}

impl PartialEq for LocalType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LocalType {}

impl Hash for LocalType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for LocalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The closed set of local shapes.
#[derive(Clone, Debug)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Complex,
    String,
    /// A byte slice, sent as a single length-prefixed blob.
    Bytes,
    Array {
        elem: LocalType,
        len: usize,
    },
    Slice {
        elem: LocalType,
    },
    Map {
        key: LocalType,
        elem: LocalType,
    },
    Struct(StructKind),
    /// An owning pointer or optional value. Never sent on its own; the
    /// pointee is sent in its place.
    Pointer {
        elem: LocalType,
    },
    Interface,
    /// A type carrying its own [`GobCodec`].
    Custom,
}

#[derive(Clone, Debug)]
pub struct StructKind {
    pub name: &'static str,
    /// Reflected fields in declaration order. Position is the wire field number.
    pub fields: Vec<LocalField>,
}

#[derive(Clone, Copy, Debug)]
pub struct LocalField {
    pub name: &'static str,
    pub ty: LocalType,
}

/// Read access to a value.
pub enum View<'a> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    String(&'a str),
    Bytes(&'a [u8]),
    /// Fixed arrays and slices.
    Seq(&'a dyn SeqAccess),
    Map(&'a dyn MapAccess),
    Struct(&'a dyn StructAccess),
    /// `None` for a nil pointer.
    Pointer(Option<&'a dyn Gob>),
    Interface(Option<&'a dyn Gob>),
    Custom(&'a dyn GobCodec),
}

/// Write access to a value.
pub enum ViewMut<'a> {
    Bool(&'a mut bool),
    Int(IntSlot<'a>),
    Uint(UintSlot<'a>),
    Float(FloatSlot<'a>),
    Complex(ComplexSlot<'a>),
    String(&'a mut String),
    /// Fixed arrays, slices and byte slices.
    Seq(&'a mut dyn SeqMut),
    Map(&'a mut dyn MapMut),
    Struct(&'a mut dyn StructMut),
    Pointer(&'a mut dyn PointerMut),
    Interface(&'a mut Option<Box<dyn Gob>>),
    Custom(&'a mut dyn GobCodec),
}

macro_rules! slot {
    ($(#[$meta:meta])* $name:ident, $wide:ty, $($variant:ident($ty:ty)),+ $(,)?) => {
        $(#[$meta])*
        pub enum $name<'a> {
            $($variant(&'a mut $ty)),+
        }

        impl $name<'_> {
            /// Store `value`, returning `false` if it does not fit the destination.
            #[inline]
            pub fn set(self, value: $wide) -> bool {
                match self {
                    $($name::$variant(dst) => match <$ty>::try_from(value) {
                        Ok(v) => {
                            *dst = v;
                            true
                        }
                        Err(_) => false,
                    }),+
                }
            }
        }
    };
}

slot!(
    /// Destination of a signed integer.
    IntSlot, i64, I8(i8), I16(i16), I32(i32), I64(i64), Isize(isize)
);
slot!(
    /// Destination of an unsigned integer.
    UintSlot, u64, U8(u8), U16(u16), U32(u32), U64(u64), Usize(usize)
);

/// Destination of a float.
pub enum FloatSlot<'a> {
    F32(&'a mut f32),
    F64(&'a mut f64),
}

#[inline]
fn fits_f32(v: f64) -> bool {
    !v.is_finite() || v.abs() <= f32::MAX as f64
}

impl FloatSlot<'_> {
    /// Store `value`, returning `false` if a finite value exceeds the destination range.
    #[inline]
    pub fn set(self, value: f64) -> bool {
        match self {
            FloatSlot::F32(dst) => {
                if !fits_f32(value) {
                    return false;
                }
                *dst = value as f32;
            }
            FloatSlot::F64(dst) => *dst = value,
        }
        true
    }
}

/// Destination of a complex number.
pub enum ComplexSlot<'a> {
    C64(&'a mut Complex<f32>),
    C128(&'a mut Complex<f64>),
}

impl ComplexSlot<'_> {
    #[inline]
    pub fn set(self, re: f64, im: f64) -> bool {
        match self {
            ComplexSlot::C64(dst) => {
                if !fits_f32(re) || !fits_f32(im) {
                    return false;
                }
                *dst = Complex::new(re as f32, im as f32);
            }
            ComplexSlot::C128(dst) => *dst = Complex::new(re, im),
        }
        true
    }
}

pub trait SeqAccess {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn elem(&self, index: usize) -> Option<&dyn Gob>;
}

pub trait SeqMut {
    /// Prepare to receive `len` elements.
    ///
    /// Growable sequences are replaced by `len` zero values. Fixed sequences
    /// keep their contents and return `false` if `len` differs from their length.
    fn reset(&mut self, len: usize) -> bool;

    fn elem_mut(&mut self, index: usize) -> Option<&mut dyn Gob>;

    /// The backing buffer of a byte slice.
    fn bytes_mut(&mut self) -> Option<&mut Vec<u8>> {
        None
    }
}

pub trait MapAccess {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit entries in iteration order, stopping at the first error.
    fn for_each_entry(&self, f: &mut dyn FnMut(&dyn Gob, &dyn Gob) -> Result<()>) -> Result<()>;
}

pub trait MapMut {
    /// Build a zero key and element, fill them with `f`, then insert the pair.
    fn insert_with(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Gob, &mut dyn Gob) -> Result<()>,
    ) -> Result<()>;
}

pub trait StructAccess {
    /// The reflected field at `index`.
    fn field(&self, index: usize) -> Option<&dyn Gob>;
}

pub trait StructMut {
    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Gob>;
}

pub trait PointerMut {
    /// The pointee, allocated as a zero value if the pointer is nil.
    fn get_or_insert_zero(&mut self) -> &mut dyn Gob;
}

/// Follow `indir` pointers. Returns `None` at the first nil pointer.
#[inline]
pub(crate) fn deref(mut value: &dyn Gob, indir: usize) -> Option<&dyn Gob> {
    for _ in 0..indir {
        match value.view() {
            View::Pointer(Some(inner)) => value = inner,
            _ => return None,
        }
    }
    Some(value)
}

/// Follow `indir` pointers, allocating nil ones.
#[inline]
pub(crate) fn alloc(mut value: &mut dyn Gob, indir: usize) -> Result<&mut dyn Gob> {
    for _ in 0..indir {
        let current = value;
        value = match current.view_mut() {
            ViewMut::Pointer(slot) => slot.get_or_insert_zero(),
            _ => return Err(corrupt("pointer indirection on a non-pointer value")),
        };
    }
    Ok(value)
}

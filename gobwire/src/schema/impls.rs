//! Blanket implementations for std types.
//!
//! Integers of every width share the `Int`/`Uint` kinds; the destination
//! width is only checked when a value is stored. `Vec<u8>` is treated as a
//! byte slice rather than a slice of `u8`, and `Option<T>` and `Box<T>` are
//! pointers to `T`.
use {
    crate::{
        error::Result,
        schema::{
            FloatSlot, Gob, IntSlot, Kind, LocalType, MapAccess, MapMut, PointerMut, SeqAccess,
            SeqMut, UintSlot, View, ViewMut,
        },
    },
    core::{
        any::{self, Any},
        hash::{BuildHasher, Hash},
    },
    std::collections::{BTreeMap, HashMap},
};

macro_rules! impl_int {
    ($($type:ty => $slot:ident),+ $(,)?) => {$(
        impl Gob for $type {
            #[inline(always)]
            fn kind() -> Kind {
                Kind::Int
            }

            #[inline(always)]
            fn zero() -> Self {
                0
            }

            #[inline(always)]
            fn view(&self) -> View<'_> {
                View::Int(*self as i64)
            }

            #[inline(always)]
            fn view_mut(&mut self) -> ViewMut<'_> {
                ViewMut::Int(IntSlot::$slot(self))
            }
        }
    )+};
}

macro_rules! impl_uint {
    ($($type:ty => $slot:ident),+ $(,)?) => {$(
        impl Gob for $type {
            #[inline(always)]
            fn kind() -> Kind {
                Kind::Uint
            }

            #[inline(always)]
            fn zero() -> Self {
                0
            }

            #[inline(always)]
            fn view(&self) -> View<'_> {
                View::Uint(*self as u64)
            }

            #[inline(always)]
            fn view_mut(&mut self) -> ViewMut<'_> {
                ViewMut::Uint(UintSlot::$slot(self))
            }
        }
    )+};
}

macro_rules! impl_float {
    ($($type:ty => $slot:ident),+ $(,)?) => {$(
        impl Gob for $type {
            #[inline(always)]
            fn kind() -> Kind {
                Kind::Float
            }

            #[inline(always)]
            fn zero() -> Self {
                0.0
            }

            #[inline(always)]
            fn view(&self) -> View<'_> {
                View::Float(*self as f64)
            }

            #[inline(always)]
            fn view_mut(&mut self) -> ViewMut<'_> {
                ViewMut::Float(FloatSlot::$slot(self))
            }
        }
    )+};
}

impl_int!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize);
impl_uint!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize);
impl_float!(f32 => F32, f64 => F64);

impl Gob for bool {
    #[inline(always)]
    fn kind() -> Kind {
        Kind::Bool
    }

    #[inline(always)]
    fn zero() -> Self {
        false
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Bool(*self)
    }

    #[inline(always)]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Bool(self)
    }
}

impl Gob for String {
    #[inline]
    fn kind() -> Kind {
        Kind::String
    }

    #[inline]
    fn zero() -> Self {
        String::new()
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::String(self)
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::String(self)
    }
}

#[inline(always)]
fn is_byte<T: 'static>() -> bool {
    any::TypeId::of::<T>() == any::TypeId::of::<u8>()
}

impl<T: Gob> Gob for Vec<T> {
    #[inline]
    fn kind() -> Kind {
        if is_byte::<T>() {
            Kind::Bytes
        } else {
            Kind::Slice {
                elem: LocalType::of::<T>(),
            }
        }
    }

    #[inline]
    fn zero() -> Self {
        Vec::new()
    }

    #[inline]
    fn view(&self) -> View<'_> {
        match (self as &dyn Any).downcast_ref::<Vec<u8>>() {
            Some(bytes) => View::Bytes(bytes),
            None => View::Seq(self),
        }
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Seq(self)
    }
}

impl<T: Gob> SeqAccess for Vec<T> {
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    #[inline]
    fn elem(&self, index: usize) -> Option<&dyn Gob> {
        <[T]>::get(self, index).map(|v| v as &dyn Gob)
    }
}

impl<T: Gob> SeqMut for Vec<T> {
    #[inline]
    fn reset(&mut self, len: usize) -> bool {
        self.clear();
        self.resize_with(len, T::zero);
        true
    }

    #[inline]
    fn elem_mut(&mut self, index: usize) -> Option<&mut dyn Gob> {
        <[T]>::get_mut(self, index).map(|v| v as &mut dyn Gob)
    }

    #[inline]
    fn bytes_mut(&mut self) -> Option<&mut Vec<u8>> {
        (self as &mut dyn Any).downcast_mut::<Vec<u8>>()
    }
}

impl<T: Gob, const N: usize> Gob for [T; N] {
    #[inline]
    fn kind() -> Kind {
        Kind::Array {
            elem: LocalType::of::<T>(),
            len: N,
        }
    }

    #[inline]
    fn zero() -> Self {
        core::array::from_fn(|_| T::zero())
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Seq(self)
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Seq(self)
    }
}

impl<T: Gob, const N: usize> SeqAccess for [T; N] {
    #[inline]
    fn len(&self) -> usize {
        N
    }

    #[inline]
    fn elem(&self, index: usize) -> Option<&dyn Gob> {
        <[T]>::get(self, index).map(|v| v as &dyn Gob)
    }
}

impl<T: Gob, const N: usize> SeqMut for [T; N] {
    #[inline]
    fn reset(&mut self, len: usize) -> bool {
        len == N
    }

    #[inline]
    fn elem_mut(&mut self, index: usize) -> Option<&mut dyn Gob> {
        <[T]>::get_mut(self, index).map(|v| v as &mut dyn Gob)
    }
}

impl<K, V, S> Gob for HashMap<K, V, S>
where
    K: Gob + Eq + Hash,
    V: Gob,
    S: BuildHasher + Default + Send + Sync + 'static,
{
    #[inline]
    fn kind() -> Kind {
        Kind::Map {
            key: LocalType::of::<K>(),
            elem: LocalType::of::<V>(),
        }
    }

    #[inline]
    fn zero() -> Self {
        HashMap::default()
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Map(self)
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Map(self)
    }
}

impl<K, V, S> MapAccess for HashMap<K, V, S>
where
    K: Gob + Eq + Hash,
    V: Gob,
    S: BuildHasher,
{
    #[inline]
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(&dyn Gob, &dyn Gob) -> Result<()>) -> Result<()> {
        for (k, v) in self {
            f(k as &dyn Gob, v as &dyn Gob)?;
        }
        Ok(())
    }
}

impl<K, V, S> MapMut for HashMap<K, V, S>
where
    K: Gob + Eq + Hash,
    V: Gob,
    S: BuildHasher,
{
    fn insert_with(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Gob, &mut dyn Gob) -> Result<()>,
    ) -> Result<()> {
        let mut k = K::zero();
        let mut v = V::zero();
        f(&mut k as &mut dyn Gob, &mut v as &mut dyn Gob)?;
        self.insert(k, v);
        Ok(())
    }
}

impl<K: Gob + Ord, V: Gob> Gob for BTreeMap<K, V> {
    #[inline]
    fn kind() -> Kind {
        Kind::Map {
            key: LocalType::of::<K>(),
            elem: LocalType::of::<V>(),
        }
    }

    #[inline]
    fn zero() -> Self {
        BTreeMap::new()
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Map(self)
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Map(self)
    }
}

impl<K: Gob + Ord, V: Gob> MapAccess for BTreeMap<K, V> {
    #[inline]
    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(&dyn Gob, &dyn Gob) -> Result<()>) -> Result<()> {
        for (k, v) in self {
            f(k as &dyn Gob, v as &dyn Gob)?;
        }
        Ok(())
    }
}

impl<K: Gob + Ord, V: Gob> MapMut for BTreeMap<K, V> {
    fn insert_with(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Gob, &mut dyn Gob) -> Result<()>,
    ) -> Result<()> {
        let mut k = K::zero();
        let mut v = V::zero();
        f(&mut k as &mut dyn Gob, &mut v as &mut dyn Gob)?;
        self.insert(k, v);
        Ok(())
    }
}

impl<T: Gob> Gob for Option<T> {
    #[inline]
    fn kind() -> Kind {
        Kind::Pointer {
            elem: LocalType::of::<T>(),
        }
    }

    #[inline]
    fn zero() -> Self {
        None
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Pointer(self.as_ref().map(|v| v as &dyn Gob))
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Pointer(self)
    }
}

impl<T: Gob> PointerMut for Option<T> {
    #[inline]
    fn get_or_insert_zero(&mut self) -> &mut dyn Gob {
        self.get_or_insert_with(T::zero)
    }
}

impl<T: Gob> Gob for Box<T> {
    #[inline]
    fn kind() -> Kind {
        Kind::Pointer {
            elem: LocalType::of::<T>(),
        }
    }

    #[inline]
    fn zero() -> Self {
        Box::new(T::zero())
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Pointer(Some(&**self))
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Pointer(self)
    }
}

impl<T: Gob> PointerMut for Box<T> {
    #[inline]
    fn get_or_insert_zero(&mut self) -> &mut dyn Gob {
        &mut **self
    }
}

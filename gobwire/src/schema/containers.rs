//! Value containers with no direct std counterpart.
//!
//! - [`Complex`] carries a pair of floats sent as one complex value.
//! - [`Interface`] holds a dynamically typed value that travels with its
//!   registered name.
//! - [`GobCodec`] lets a type take over its own byte representation; wire it
//!   up with [`custom_gob!`](crate::custom_gob).
use {
    crate::{
        error::Result,
        schema::{ComplexSlot, Gob, Kind, View, ViewMut},
    },
    core::fmt,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex<F> {
    pub re: F,
    pub im: F,
}

impl<F> Complex<F> {
    #[inline]
    pub const fn new(re: F, im: F) -> Self {
        Self { re, im }
    }
}

impl Gob for Complex<f32> {
    #[inline]
    fn kind() -> Kind {
        Kind::Complex
    }

    #[inline]
    fn zero() -> Self {
        Self::default()
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Complex(self.re as f64, self.im as f64)
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Complex(ComplexSlot::C64(self))
    }
}

impl Gob for Complex<f64> {
    #[inline]
    fn kind() -> Kind {
        Kind::Complex
    }

    #[inline]
    fn zero() -> Self {
        Self::default()
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Complex(self.re, self.im)
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Complex(ComplexSlot::C128(self))
    }
}

/// A dynamically typed value.
///
/// The concrete type must be registered with the
/// [`Registry`](crate::Registry) on both ends; it is sent as its registered
/// name followed by the value. A nil interface is sent as an empty name.
///
/// ```
/// # use gobwire::Interface;
/// let mut v = Interface::new(7u32);
/// assert_eq!(v.downcast_ref::<u32>(), Some(&7));
/// *v.downcast_mut::<u32>().unwrap() += 1;
/// assert_eq!(v.downcast_ref::<u32>(), Some(&8));
/// assert!(Interface::nil().is_nil());
/// ```
#[derive(Default)]
pub struct Interface(Option<Box<dyn Gob>>);

impl Interface {
    #[inline]
    pub const fn nil() -> Self {
        Self(None)
    }

    #[inline]
    pub fn new<T: Gob>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    #[inline]
    pub fn get(&self) -> Option<&dyn Gob> {
        self.0.as_deref()
    }

    #[inline]
    pub fn downcast_ref<T: Gob>(&self) -> Option<&T> {
        self.0.as_deref()?.downcast_ref()
    }

    #[inline]
    pub fn downcast_mut<T: Gob>(&mut self) -> Option<&mut T> {
        self.0.as_deref_mut()?.downcast_mut()
    }

    #[inline]
    pub fn into_inner(self) -> Option<Box<dyn Gob>> {
        self.0
    }
}

impl From<Box<dyn Gob>> for Interface {
    fn from(value: Box<dyn Gob>) -> Self {
        Self(Some(value))
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => f
                .debug_tuple("Interface")
                .field(&value.local_type())
                .finish(),
            None => f.write_str("Interface(nil)"),
        }
    }
}

impl Gob for Interface {
    #[inline]
    fn kind() -> Kind {
        Kind::Interface
    }

    #[inline]
    fn zero() -> Self {
        Self::nil()
    }

    #[inline]
    fn view(&self) -> View<'_> {
        View::Interface(self.0.as_deref())
    }

    #[inline]
    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Interface(&mut self.0)
    }
}

/// A type that produces its own wire bytes.
///
/// The bytes are sent as a single length-prefixed blob and handed back to
/// [`gob_decode`](GobCodec::gob_decode) on the receiving side. Use
/// [`error::codec`](crate::error::codec) to report failures.
pub trait GobCodec: Send + Sync {
    fn gob_encode(&self) -> Result<Vec<u8>>;

    fn gob_decode(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Implement [`Gob`] for types that implement [`GobCodec`] and [`Default`].
///
/// ```
/// # use gobwire::{custom_gob, GobCodec, Result};
/// #[derive(Default, Debug, PartialEq)]
/// struct Celsius(i16);
///
/// impl GobCodec for Celsius {
///     fn gob_encode(&self) -> Result<Vec<u8>> {
///         Ok(self.0.to_le_bytes().to_vec())
///     }
///
///     fn gob_decode(&mut self, bytes: &[u8]) -> Result<()> {
///         let raw = bytes.try_into().map_err(gobwire::error::codec)?;
///         self.0 = i16::from_le_bytes(raw);
///         Ok(())
///     }
/// }
///
/// custom_gob!(Celsius);
///
/// let bytes = gobwire::serialize(&Celsius(-40)).unwrap();
/// assert_eq!(gobwire::deserialize::<Celsius>(&bytes).unwrap(), Celsius(-40));
/// ```
#[macro_export]
macro_rules! custom_gob {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Gob for $ty {
            #[inline]
            fn kind() -> $crate::Kind {
                $crate::Kind::Custom
            }

            #[inline]
            fn zero() -> Self {
                <Self as ::core::default::Default>::default()
            }

            #[inline]
            fn view(&self) -> $crate::View<'_> {
                $crate::View::Custom(self)
            }

            #[inline]
            fn view_mut(&mut self) -> $crate::ViewMut<'_> {
                $crate::ViewMut::Custom(self)
            }
        }
    )+};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_downcast() {
        let mut v = Interface::new(String::from("hi"));
        assert!(!v.is_nil());
        assert!(v.downcast_ref::<u8>().is_none());
        v.downcast_mut::<String>().unwrap().push('!');
        assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("hi!"));
        assert!(matches!(v.view(), View::Interface(Some(_))));
        assert!(matches!(Interface::nil().view(), View::Interface(None)));
    }

    #[test]
    fn complex64_rejects_wide_parts() {
        let mut c = Complex::<f32>::default();
        let ViewMut::Complex(slot) = c.view_mut() else {
            panic!("expected complex view");
        };
        assert!(!slot.set(1.0, f64::MAX));
        let ViewMut::Complex(slot) = c.view_mut() else {
            panic!("expected complex view");
        };
        assert!(slot.set(1.5, -2.0));
        assert_eq!(c, Complex::new(1.5, -2.0));
    }
}

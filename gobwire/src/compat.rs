//! Structural compatibility between a local type and a remote wire type.
use {
    crate::{
        schema::{Kind, LocalType},
        types::{GobType, TypeId},
    },
    core::any,
    std::collections::HashSet,
};

/// Whether values of wire type `remote` can be decoded into `local`.
///
/// Structs always match at this level; their fields are paired by name when
/// the decode engine is compiled. A type with a custom codec only matches a
/// remote custom type. `lookup` resolves remote ids.
pub fn compatible_type(
    local: LocalType,
    remote: TypeId,
    lookup: &impl Fn(TypeId) -> Option<GobType>,
) -> bool {
    check(local, remote, lookup, &mut HashSet::new())
}

fn check(
    local: LocalType,
    remote: TypeId,
    lookup: &impl Fn(TypeId) -> Option<GobType>,
    in_progress: &mut HashSet<(any::TypeId, TypeId)>,
) -> bool {
    let (base, _) = local.strip_pointers();
    let pair = (base.id(), remote);
    // A pair already under comparison further up is assumed compatible.
    if !in_progress.insert(pair) {
        return true;
    }
    let compatible = check_shape(base, remote, lookup, in_progress);
    in_progress.remove(&pair);
    compatible
}

fn check_shape(
    base: LocalType,
    remote: TypeId,
    lookup: &impl Fn(TypeId) -> Option<GobType>,
    in_progress: &mut HashSet<(any::TypeId, TypeId)>,
) -> bool {
    let Some(wire) = lookup(remote) else {
        return false;
    };
    match (base.kind(), wire) {
        (Kind::Bool, GobType::Bool)
        | (Kind::Int, GobType::Int)
        | (Kind::Uint, GobType::Uint)
        | (Kind::Float, GobType::Float)
        | (Kind::Complex, GobType::Complex)
        | (Kind::Interface, GobType::Interface)
        | (Kind::String | Kind::Bytes, GobType::String | GobType::Bytes)
        | (Kind::Struct(_), GobType::Struct { .. })
        | (Kind::Custom, GobType::Custom { .. }) => true,
        (
            Kind::Array { elem, len },
            GobType::Array {
                elem: remote_elem,
                len: remote_len,
                ..
            },
        ) => len == remote_len && check(elem, remote_elem, lookup, in_progress),
        (
            Kind::Slice { elem },
            GobType::Slice {
                elem: remote_elem, ..
            },
        ) => check(elem, remote_elem, lookup, in_progress),
        (
            Kind::Map { key, elem },
            GobType::Map {
                key: remote_key,
                elem: remote_elem,
                ..
            },
        ) => {
            check(key, remote_key, lookup, in_progress)
                && check(elem, remote_elem, lookup, in_progress)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{custom_gob, Complex, GobCodec, Interface, Registry, Result},
        std::collections::HashMap as Map,
    };

    #[derive(crate::Gob, Default)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[derive(Default)]
    struct Opaque;

    impl GobCodec for Opaque {
        fn gob_encode(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn gob_decode(&mut self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    custom_gob!(Opaque);

    fn compatible<T: crate::Gob, U: crate::Gob>() -> bool {
        let registry = Registry::new();
        let remote = registry.type_id_of::<U>().unwrap();
        compatible_type(LocalType::of::<T>(), remote, &|id| registry.describe(id))
    }

    #[test]
    fn basic_kinds_match_by_family() {
        assert!(compatible::<i8, i64>());
        assert!(compatible::<u64, u8>());
        assert!(compatible::<f32, f64>());
        assert!(compatible::<Complex<f32>, Complex<f64>>());
        assert!(compatible::<Option<Box<bool>>, bool>());
        assert!(!compatible::<i32, u32>());
        assert!(!compatible::<String, i64>());
        assert!(!compatible::<f64, i64>());
    }

    #[test]
    fn strings_and_bytes_interchange() {
        assert!(compatible::<String, Vec<u8>>());
        assert!(compatible::<Vec<u8>, String>());
        assert!(!compatible::<Vec<u8>, Vec<u16>>());
    }

    #[test]
    fn composites_recurse() {
        assert!(compatible::<[i8; 3], [i64; 3]>());
        assert!(!compatible::<[i8; 3], [i8; 4]>());
        assert!(compatible::<Vec<Vec<u8>>, Vec<String>>());
        assert!(!compatible::<Vec<i8>, Vec<String>>());
        assert!(compatible::<Map<String, Point>, Map<String, Point>>());
        assert!(!compatible::<Map<String, i8>, Map<i8, i8>>());
        assert!(!compatible::<Vec<i8>, [i8; 1]>());
    }

    #[test]
    fn repeated_local_type_checks_each_position() {
        assert!(compatible::<Map<String, String>, Map<String, Vec<u8>>>());
        assert!(compatible::<Map<Vec<u8>, Vec<u8>>, Map<String, Vec<u8>>>());
        // Key and element are distinct remote arrays of the same local type.
        assert!(compatible::<Map<[i8; 2], [i8; 2]>, Map<[i8; 2], [i16; 2]>>());
        assert!(compatible::<Vec<[u8; 2]>, Vec<[u64; 2]>>());
        assert!(!compatible::<Map<[i8; 2], [i8; 2]>, Map<[i8; 2], [u8; 2]>>());
        assert!(!compatible::<Map<String, String>, Map<String, i64>>());
    }

    #[test]
    fn structs_interfaces_and_custom() {
        assert!(compatible::<Point, Point>());
        assert!(!compatible::<Point, i64>());
        assert!(compatible::<Interface, Interface>());
        assert!(compatible::<Opaque, Opaque>());
        assert!(!compatible::<Opaque, Vec<u8>>());
        assert!(!compatible::<Vec<u8>, Opaque>());
    }

    #[test]
    fn unknown_remote_id_is_incompatible() {
        let registry = Registry::new();
        assert!(!compatible_type(
            LocalType::of::<Point>(),
            TypeId(900),
            &|id| registry.describe(id)
        ));
    }
}

//! Process-wide type tables.
//!
//! A [`Registry`] assigns wire [`TypeId`]s to local types, caches compiled
//! encode engines and maps interface names to concrete types. Sessions hold
//! an `Arc<Registry>`; [`Registry::global`] is the default shared by every
//! session that is not configured otherwise.
use {
    crate::{
        enc::{EncEngine, EncEngines},
        error::{duplicate_registration, no_exported_fields, Result},
        schema::{Gob, Kind, LocalType},
        types::{
            ArrayType, CommonType, CustomType, FieldType, GobType, MapType, SliceType, StructType,
            TypeId, WireField, WireType,
        },
    },
    core::{any, fmt},
    once_cell::sync::{Lazy, OnceCell},
    parking_lot::{Mutex, RwLock},
    std::{collections::HashMap, sync::Arc},
    tracing::debug,
};

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// Type id table, encode engine cache and interface name registry.
///
/// Type ids and engines are created on first use and never evicted. The
/// compilation lock is held only while finding or building an entry, never
/// while a value is walked.
pub struct Registry {
    state: Mutex<Tables>,
    names: RwLock<NameTable>,
}

struct Tables {
    types: TypeTable,
    engines: EncEngines,
}

struct TypeTable {
    ids: HashMap<any::TypeId, TypeId>,
    defs: HashMap<TypeId, GobType>,
    next_id: i32,
}

#[derive(Clone, Copy)]
struct Registered {
    ty: any::TypeId,
    make: fn() -> Box<dyn Gob>,
}

#[derive(Default)]
struct NameTable {
    by_name: HashMap<Arc<str>, Registered>,
    by_type: HashMap<any::TypeId, Arc<str>>,
}

fn make_boxed<T: Gob>() -> Box<dyn Gob> {
    Box::new(T::zero())
}

impl Registry {
    /// A registry holding only the builtin types.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Tables {
                types: TypeTable::bootstrap(),
                engines: EncEngines::default(),
            }),
            names: RwLock::new(NameTable::default()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Registry> {
        GLOBAL.clone()
    }

    /// The wire id of `T`, allocating ids for it and its component types on first use.
    pub fn type_id_of<T: Gob>(&self) -> Result<TypeId> {
        self.type_id_for(LocalType::of::<T>())
    }

    /// Pointer layers are transparent: `Box<T>` and `Option<T>` share the id of `T`.
    pub fn type_id_for(&self, local: LocalType) -> Result<TypeId> {
        self.state.lock().types.id_for(local)
    }

    /// The structural description registered under `id`.
    pub fn describe(&self, id: TypeId) -> Option<GobType> {
        self.state.lock().types.defs.get(&id).cloned()
    }

    /// Find or compile the encode engine for a pointer-free local type.
    pub(crate) fn enc_engine(&self, base: LocalType) -> Result<Arc<OnceCell<EncEngine>>> {
        self.state.lock().engines.engine(base)
    }

    /// Register `T` for use inside [`Interface`](crate::Interface) values under its type name.
    pub fn register<T: Gob>(&self) -> Result<()> {
        self.register_name::<T>(any::type_name::<T>())
    }

    /// Register `T` for use inside [`Interface`](crate::Interface) values under `name`.
    ///
    /// Repeating an identical registration is a no-op. Reusing either the
    /// name or the type for something else fails with
    /// [`Error::DuplicateRegistration`](crate::Error::DuplicateRegistration).
    pub fn register_name<T: Gob>(&self, name: &str) -> Result<()> {
        let ty = any::TypeId::of::<T>();
        let mut names = self.names.write();
        let by_name = names.by_name.get(name).map(|r| r.ty);
        let by_type = names.by_type.get(&ty).cloned();
        match (by_name, by_type) {
            (Some(existing), Some(registered)) if existing == ty && &*registered == name => {
                return Ok(());
            }
            (None, None) => {}
            _ => return Err(duplicate_registration(name)),
        }
        let name: Arc<str> = Arc::from(name);
        names.by_name.insert(
            name.clone(),
            Registered {
                ty,
                make: make_boxed::<T>,
            },
        );
        names.by_type.insert(ty, name.clone());
        debug!(%name, ty = any::type_name::<T>(), "registered interface type");
        Ok(())
    }

    /// The name a concrete type was registered under.
    pub fn name_of(&self, ty: any::TypeId) -> Option<Arc<str>> {
        self.names.read().by_type.get(&ty).cloned()
    }

    /// A zero value of the type registered under `name`.
    pub fn make_named(&self, name: &str) -> Option<Box<dyn Gob>> {
        let make = self.names.read().by_name.get(name)?.make;
        Some(make())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = self.state.lock().types.defs.len();
        let names = self.names.read().by_name.len();
        f.debug_struct("Registry")
            .field("types", &types)
            .field("interface_names", &names)
            .finish()
    }
}

fn wire_struct(name: &str, fields: &[(&str, TypeId)]) -> GobType {
    GobType::Struct {
        name: name.to_owned(),
        fields: fields
            .iter()
            .map(|&(name, id)| WireField {
                name: name.to_owned(),
                id,
            })
            .collect(),
    }
}

impl TypeTable {
    /// Builtin types, known to every peer without transmission.
    fn bootstrap() -> Self {
        let ids = [
            (LocalType::of::<WireType>(), TypeId::WIRE_TYPE),
            (LocalType::of::<ArrayType>(), TypeId::ARRAY_TYPE),
            (LocalType::of::<CommonType>(), TypeId::COMMON_TYPE),
            (LocalType::of::<SliceType>(), TypeId::SLICE_TYPE),
            (LocalType::of::<StructType>(), TypeId::STRUCT_TYPE),
            (LocalType::of::<FieldType>(), TypeId::FIELD_TYPE),
            (LocalType::of::<Vec<FieldType>>(), TypeId::FIELD_TYPE_SLICE),
            (LocalType::of::<MapType>(), TypeId::MAP_TYPE),
            (LocalType::of::<CustomType>(), TypeId::CUSTOM_TYPE),
        ];
        let common = ("CommonType", TypeId::COMMON_TYPE);
        let defs = [
            (TypeId::BOOL, GobType::Bool),
            (TypeId::INT, GobType::Int),
            (TypeId::UINT, GobType::Uint),
            (TypeId::FLOAT, GobType::Float),
            (TypeId::BYTES, GobType::Bytes),
            (TypeId::STRING, GobType::String),
            (TypeId::COMPLEX, GobType::Complex),
            (TypeId::INTERFACE, GobType::Interface),
            (
                TypeId::WIRE_TYPE,
                wire_struct(
                    "WireType",
                    &[
                        ("ArrayT", TypeId::ARRAY_TYPE),
                        ("SliceT", TypeId::SLICE_TYPE),
                        ("StructT", TypeId::STRUCT_TYPE),
                        ("MapT", TypeId::MAP_TYPE),
                        ("CustomT", TypeId::CUSTOM_TYPE),
                    ],
                ),
            ),
            (
                TypeId::ARRAY_TYPE,
                wire_struct(
                    "ArrayType",
                    &[common, ("Elem", TypeId::INT), ("Len", TypeId::INT)],
                ),
            ),
            (
                TypeId::COMMON_TYPE,
                wire_struct(
                    "CommonType",
                    &[("Name", TypeId::STRING), ("Id", TypeId::INT)],
                ),
            ),
            (
                TypeId::SLICE_TYPE,
                wire_struct("SliceType", &[common, ("Elem", TypeId::INT)]),
            ),
            (
                TypeId::STRUCT_TYPE,
                wire_struct(
                    "StructType",
                    &[common, ("Field", TypeId::FIELD_TYPE_SLICE)],
                ),
            ),
            (
                TypeId::FIELD_TYPE,
                wire_struct("FieldType", &[("Name", TypeId::STRING), ("Id", TypeId::INT)]),
            ),
            (
                TypeId::FIELD_TYPE_SLICE,
                GobType::Slice {
                    name: LocalType::of::<Vec<FieldType>>().name().to_owned(),
                    elem: TypeId::FIELD_TYPE,
                },
            ),
            (
                TypeId::MAP_TYPE,
                wire_struct(
                    "MapType",
                    &[common, ("Key", TypeId::INT), ("Elem", TypeId::INT)],
                ),
            ),
            (
                TypeId::CUSTOM_TYPE,
                wire_struct("CustomType", &[common]),
            ),
        ];
        Self {
            ids: ids.into_iter().map(|(local, id)| (local.id(), id)).collect(),
            defs: defs.into_iter().collect(),
            next_id: TypeId::FIRST_USER.0,
        }
    }

    fn id_for(&mut self, local: LocalType) -> Result<TypeId> {
        let mut fresh = Vec::new();
        let result = self.resolve(local, &mut fresh);
        if result.is_err() {
            for (ty, id) in fresh.iter().rev() {
                self.ids.remove(ty);
                self.defs.remove(id);
            }
            if let Some((_, first)) = fresh.first() {
                self.next_id = first.0;
            }
        }
        result
    }

    fn alloc(&mut self, base: LocalType, fresh: &mut Vec<(any::TypeId, TypeId)>) -> TypeId {
        let id = TypeId(self.next_id);
        self.next_id += 1;
        self.ids.insert(base.id(), id);
        fresh.push((base.id(), id));
        debug!(%id, ty = base.name(), "allocated type id");
        id
    }

    /// The id is recorded before component types are resolved, so
    /// self-referential types find it on the way back in.
    fn resolve(
        &mut self,
        local: LocalType,
        fresh: &mut Vec<(any::TypeId, TypeId)>,
    ) -> Result<TypeId> {
        let (base, _) = local.strip_pointers();
        let kind = base.kind();
        if let Some(id) = GobType::basic_id(&kind) {
            return Ok(id);
        }
        if let Some(&id) = self.ids.get(&base.id()) {
            return Ok(id);
        }
        let def = match kind {
            Kind::Array { elem, len } => {
                let id = self.alloc(base, fresh);
                let elem = self.resolve(elem, fresh)?;
                (id, GobType::Array {
                    name: base.name().to_owned(),
                    elem,
                    len,
                })
            }
            Kind::Slice { elem } => {
                let id = self.alloc(base, fresh);
                let elem = self.resolve(elem, fresh)?;
                (id, GobType::Slice {
                    name: base.name().to_owned(),
                    elem,
                })
            }
            Kind::Map { key, elem } => {
                let id = self.alloc(base, fresh);
                let key = self.resolve(key, fresh)?;
                let elem = self.resolve(elem, fresh)?;
                (id, GobType::Map {
                    name: base.name().to_owned(),
                    key,
                    elem,
                })
            }
            Kind::Struct(st) => {
                if st.fields.is_empty() {
                    return Err(no_exported_fields(st.name));
                }
                let id = self.alloc(base, fresh);
                let mut fields = Vec::with_capacity(st.fields.len());
                for field in &st.fields {
                    fields.push(WireField {
                        name: field.name.to_owned(),
                        id: self.resolve(field.ty, fresh)?,
                    });
                }
                (id, GobType::Struct {
                    name: st.name.to_owned(),
                    fields,
                })
            }
            Kind::Custom => {
                let id = self.alloc(base, fresh);
                (id, GobType::Custom {
                    name: base.name().to_owned(),
                })
            }
            // Basic kinds returned above; pointers were stripped.
            _ => return Err(crate::error::corrupt("unresolvable local type")),
        };
        let (id, def) = def;
        self.defs.insert(id, def);
        Ok(id)
    }
}

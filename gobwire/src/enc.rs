//! Encode engines.
//!
//! An [`EncEngine`] is the compiled walk plan for one local type: one
//! instruction per reflected struct field, or a single operation for any
//! other top-level value. Engines are compiled once per type and shared by
//! every session through the [`Registry`].
//!
//! Nested struct operations hold a weak handle to the nested engine's cell.
//! The cell is inserted before the nested type is compiled, so recursive
//! types resolve to the cell under construction instead of recursing.
use {
    crate::{
        error::{
            corrupt, message_too_large, nil_pointer, no_exported_fields,
            unregistered_interface_type, Result,
        },
        registry::Registry,
        schema::{deref, Gob, Kind, LocalType, View},
        types::TypeId,
        varint::{encode_float, encode_int, encode_uint},
    },
    core::any,
    once_cell::sync::OnceCell,
    std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Weak},
    },
    tracing::debug,
};

/// Field number of the implicit field holding a non-struct top-level value.
pub(crate) const SINGLETON_FIELD: u64 = 0;

#[derive(Debug)]
pub(crate) enum EncOp {
    Bool,
    Int,
    Uint,
    Float,
    Complex,
    String,
    Bytes,
    Array {
        elem: Box<EncOp>,
        indir: usize,
    },
    Slice {
        elem: Box<EncOp>,
        indir: usize,
    },
    Map {
        key: Box<EncOp>,
        key_indir: usize,
        elem: Box<EncOp>,
        elem_indir: usize,
    },
    Struct(Weak<OnceCell<EncEngine>>),
    Interface,
    Custom,
}

#[derive(Debug)]
pub(crate) struct EncInstr {
    pub(crate) op: EncOp,
    /// Wire field number, also the index of the field accessor.
    pub(crate) field: usize,
    /// Pointer layers between the field and its value.
    pub(crate) indir: usize,
}

#[derive(Debug)]
pub(crate) enum EncEngine {
    Struct(Vec<EncInstr>),
    Singleton(EncOp),
}

/// Encode engine cache, keyed by pointer-free local type.
#[derive(Default)]
pub(crate) struct EncEngines {
    cells: HashMap<any::TypeId, Arc<OnceCell<EncEngine>>>,
    fresh: Vec<any::TypeId>,
}

impl EncEngines {
    /// Find or compile the engine for `base`. A failed compile leaves no entries behind.
    pub(crate) fn engine(&mut self, base: LocalType) -> Result<Arc<OnceCell<EncEngine>>> {
        let result = self.get_or_compile(base);
        let fresh = core::mem::take(&mut self.fresh);
        if result.is_err() {
            for ty in fresh {
                self.cells.remove(&ty);
            }
        }
        result
    }

    fn get_or_compile(&mut self, base: LocalType) -> Result<Arc<OnceCell<EncEngine>>> {
        if let Some(cell) = self.cells.get(&base.id()) {
            return Ok(cell.clone());
        }
        let cell = Arc::new(OnceCell::new());
        self.cells.insert(base.id(), cell.clone());
        self.fresh.push(base.id());
        let engine = self.compile(base)?;
        debug!(ty = base.name(), "compiled encode engine");
        // The placeholder is only ever filled here.
        let _ = cell.set(engine);
        Ok(cell)
    }

    fn compile(&mut self, base: LocalType) -> Result<EncEngine> {
        match base.kind() {
            Kind::Struct(st) => {
                if st.fields.is_empty() {
                    return Err(no_exported_fields(st.name));
                }
                let instrs = st
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(field, f)| {
                        let (op, indir) = self.op_for(f.ty)?;
                        Ok(EncInstr { op, field, indir })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(EncEngine::Struct(instrs))
            }
            _ => self.op_for(base).map(|(op, _)| EncEngine::Singleton(op)),
        }
    }

    fn op_for(&mut self, local: LocalType) -> Result<(EncOp, usize)> {
        let (base, indir) = local.strip_pointers();
        let op = match base.kind() {
            Kind::Bool => EncOp::Bool,
            Kind::Int => EncOp::Int,
            Kind::Uint => EncOp::Uint,
            Kind::Float => EncOp::Float,
            Kind::Complex => EncOp::Complex,
            Kind::String => EncOp::String,
            Kind::Bytes => EncOp::Bytes,
            Kind::Array { elem, .. } => {
                let (elem, indir) = self.op_for(elem)?;
                EncOp::Array {
                    elem: Box::new(elem),
                    indir,
                }
            }
            Kind::Slice { elem } => {
                let (elem, indir) = self.op_for(elem)?;
                EncOp::Slice {
                    elem: Box::new(elem),
                    indir,
                }
            }
            Kind::Map { key, elem } => {
                let (key, key_indir) = self.op_for(key)?;
                let (elem, elem_indir) = self.op_for(elem)?;
                EncOp::Map {
                    key: Box::new(key),
                    key_indir,
                    elem: Box::new(elem),
                    elem_indir,
                }
            }
            Kind::Struct(_) => EncOp::Struct(Arc::downgrade(&self.get_or_compile(base)?)),
            Kind::Interface => EncOp::Interface,
            Kind::Custom => EncOp::Custom,
            Kind::Pointer { .. } => return Err(corrupt("unresolved pointer type")),
        };
        Ok((op, indir))
    }
}

/// How a type descriptor is framed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Framing {
    /// A stand-alone message: `uint(len) int(-id) descriptor`.
    Message,
    /// Inside an interface value: `int(-id) uint(len) descriptor`.
    Inline,
}

/// Per-call encoding state.
pub(crate) struct EncState<'s> {
    pub(crate) registry: &'s Registry,
    /// Ids known to the peer.
    pub(crate) sent: &'s mut HashSet<TypeId>,
    /// Ids first marked as sent during this call.
    pub(crate) fresh: &'s mut Vec<TypeId>,
    pub(crate) limit: usize,
}

#[inline]
fn write_blob(out: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

impl EncState<'_> {
    /// Append the descriptor messages `value` still needs, then the value message.
    pub(crate) fn encode_message(&mut self, out: &mut Vec<u8>, value: &dyn Gob) -> Result<()> {
        let local = value.local_type();
        self.send_type(out, local, Framing::Message)?;
        let id = self.registry.type_id_for(local)?;
        let mut payload = Vec::new();
        encode_int(&mut payload, id.0 as i64);
        self.encode_value(&mut payload, value)?;
        self.write_frame(out, &payload)
    }

    fn write_frame(&self, out: &mut Vec<u8>, payload: &[u8]) -> Result<()> {
        if payload.len() > self.limit {
            return Err(message_too_large(payload.len() as u64, self.limit));
        }
        write_blob(out, payload);
        Ok(())
    }

    /// Encode a top-level value: a struct body, or a singleton field.
    pub(crate) fn encode_value(&mut self, out: &mut Vec<u8>, value: &dyn Gob) -> Result<()> {
        let (base, indir) = value.local_type().strip_pointers();
        let Some(value) = deref(value, indir) else {
            return Err(nil_pointer(base.name()));
        };
        let cell = self.registry.enc_engine(base)?;
        match cell.get() {
            Some(EncEngine::Struct(instrs)) => self.encode_struct(out, value, instrs),
            Some(EncEngine::Singleton(op)) => {
                encode_uint(out, SINGLETON_FIELD);
                self.encode_payload(out, op, value)
            }
            None => Err(corrupt("encode engine not compiled")),
        }
    }

    fn encode_struct(
        &mut self,
        out: &mut Vec<u8>,
        value: &dyn Gob,
        instrs: &[EncInstr],
    ) -> Result<()> {
        let View::Struct(fields) = value.view() else {
            return Err(corrupt("struct engine applied to a non-struct value"));
        };
        // Field numbers start at -1 so that field 0 is sent as delta 1.
        let mut last = -1i64;
        for instr in instrs {
            let field = fields
                .field(instr.field)
                .ok_or_else(|| corrupt("struct field accessor out of range"))?;
            let Some(field) = deref(field, instr.indir) else {
                continue;
            };
            if is_zero(&instr.op, field) {
                continue;
            }
            encode_uint(out, (instr.field as i64 - last) as u64);
            last = instr.field as i64;
            self.encode_payload(out, &instr.op, field)?;
        }
        encode_uint(out, 0);
        Ok(())
    }

    fn encode_elem(
        &mut self,
        out: &mut Vec<u8>,
        op: &EncOp,
        indir: usize,
        elem: &dyn Gob,
    ) -> Result<()> {
        match deref(elem, indir) {
            Some(elem) => self.encode_payload(out, op, elem),
            None => Err(nil_pointer(elem.local_type().name())),
        }
    }

    fn encode_payload(&mut self, out: &mut Vec<u8>, op: &EncOp, value: &dyn Gob) -> Result<()> {
        match (op, value.view()) {
            (EncOp::Bool, View::Bool(b)) => encode_uint(out, b as u64),
            (EncOp::Int, View::Int(i)) => encode_int(out, i),
            (EncOp::Uint, View::Uint(u)) => encode_uint(out, u),
            (EncOp::Float, View::Float(f)) => encode_float(out, f),
            (EncOp::Complex, View::Complex(re, im)) => {
                encode_float(out, re);
                encode_float(out, im);
            }
            (EncOp::String, View::String(s)) => write_blob(out, s.as_bytes()),
            (EncOp::Bytes, View::Bytes(b)) => write_blob(out, b),
            (EncOp::Array { elem, indir } | EncOp::Slice { elem, indir }, View::Seq(seq)) => {
                encode_uint(out, seq.len() as u64);
                for i in 0..seq.len() {
                    let e = seq
                        .elem(i)
                        .ok_or_else(|| corrupt("sequence shorter than its length"))?;
                    self.encode_elem(out, elem, *indir, e)?;
                }
            }
            (
                EncOp::Map {
                    key,
                    key_indir,
                    elem,
                    elem_indir,
                },
                View::Map(map),
            ) => {
                encode_uint(out, map.len() as u64);
                map.for_each_entry(&mut |k: &dyn Gob, v: &dyn Gob| {
                    self.encode_elem(out, key, *key_indir, k)?;
                    self.encode_elem(out, elem, *elem_indir, v)
                })?;
            }
            (EncOp::Struct(engine), View::Struct(_)) => {
                let cell = engine
                    .upgrade()
                    .ok_or_else(|| corrupt("encode engine dropped"))?;
                let Some(EncEngine::Struct(instrs)) = cell.get() else {
                    return Err(corrupt("encode engine not compiled"));
                };
                self.encode_struct(out, value, instrs)?;
            }
            (EncOp::Interface, View::Interface(inner)) => self.encode_interface(out, inner)?,
            (EncOp::Custom, View::Custom(codec)) => write_blob(out, &codec.gob_encode()?),
            _ => return Err(corrupt("value does not match its encode engine")),
        }
        Ok(())
    }

    /// `uint(nameLen) name [descriptors] int(id) uint(len) value`, or a zero
    /// name length for nil.
    fn encode_interface(&mut self, out: &mut Vec<u8>, inner: Option<&dyn Gob>) -> Result<()> {
        let Some(inner) = inner else {
            encode_uint(out, 0);
            return Ok(());
        };
        let local = inner.local_type();
        let name = self
            .registry
            .name_of(local.id())
            .ok_or_else(|| unregistered_interface_type(local.name()))?;
        write_blob(out, name.as_bytes());
        self.send_type(out, local, Framing::Inline)?;
        let id = self.registry.type_id_for(local)?;
        encode_int(out, id.0 as i64);
        let mut body = Vec::new();
        self.encode_value(&mut body, inner)?;
        write_blob(out, &body);
        Ok(())
    }

    /// Send the descriptor of `local` and everything it refers to, unless the peer has it.
    pub(crate) fn send_type(
        &mut self,
        out: &mut Vec<u8>,
        local: LocalType,
        framing: Framing,
    ) -> Result<()> {
        let (base, _) = local.strip_pointers();
        let id = self.registry.type_id_for(base)?;
        if self.sent.contains(&id) {
            return Ok(());
        }
        self.sent.insert(id);
        self.fresh.push(id);
        if id.is_builtin() {
            return Ok(());
        }
        let wire = self
            .registry
            .describe(id)
            .and_then(|def| def.to_wire(id))
            .ok_or_else(|| corrupt("user type without a descriptor"))?;
        let mut def = Vec::new();
        self.encode_value(&mut def, &wire)?;
        match framing {
            Framing::Message => {
                let mut payload = Vec::with_capacity(def.len() + 5);
                encode_int(&mut payload, -(id.0 as i64));
                payload.extend_from_slice(&def);
                self.write_frame(out, &payload)?;
            }
            Framing::Inline => {
                encode_int(out, -(id.0 as i64));
                write_blob(out, &def);
            }
        }
        debug!(%id, ty = base.name(), ?framing, "sent type descriptor");

        match base.kind() {
            Kind::Array { elem, .. } | Kind::Slice { elem } => self.send_type(out, elem, framing),
            Kind::Map { key, elem } => {
                self.send_type(out, key, framing)?;
                self.send_type(out, elem, framing)
            }
            Kind::Struct(st) => st
                .fields
                .iter()
                .try_for_each(|f| self.send_type(out, f.ty, framing)),
            _ => Ok(()),
        }
    }
}

/// Zero values are suppressed inside structs. Arrays, nested structs and
/// custom values are always sent.
fn is_zero(op: &EncOp, value: &dyn Gob) -> bool {
    match (op, value.view()) {
        (_, View::Bool(b)) => !b,
        (_, View::Int(i)) => i == 0,
        (_, View::Uint(u)) => u == 0,
        (_, View::Float(f)) => f == 0.0,
        (_, View::Complex(re, im)) => re == 0.0 && im == 0.0,
        (_, View::String(s)) => s.is_empty(),
        (_, View::Bytes(b)) => b.is_empty(),
        (EncOp::Slice { .. }, View::Seq(seq)) => seq.is_empty(),
        (_, View::Map(map)) => map.is_empty(),
        (_, View::Interface(inner)) => inner.is_none(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{Error, Interface},
        std::collections::BTreeMap,
    };

    #[derive(crate::Gob, Default)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[derive(crate::Gob, Default)]
    struct Mixed {
        flag: bool,
        name: String,
        tags: Vec<u16>,
        grid: [u8; 2],
        at: Point,
        opt: Option<u32>,
        any: Interface,
    }

    #[derive(crate::Gob, Default)]
    struct Tree {
        label: String,
        kids: Vec<Tree>,
    }

    fn body<T: Gob>(registry: &Registry, value: &T) -> Result<Vec<u8>> {
        let mut sent = HashSet::new();
        let mut fresh = Vec::new();
        let mut state = EncState {
            registry,
            sent: &mut sent,
            fresh: &mut fresh,
            limit: usize::MAX,
        };
        let mut out = Vec::new();
        state.encode_value(&mut out, value)?;
        Ok(out)
    }

    #[test]
    fn point_body_suppresses_zero_field() {
        let registry = Registry::new();
        assert_eq!(
            body(&registry, &Point { x: 3, y: 0 }).unwrap(),
            [0x01, 0x06, 0x00]
        );
        assert_eq!(
            body(&registry, &Point { x: 0, y: -1 }).unwrap(),
            [0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn zero_struct_is_a_terminator() {
        let registry = Registry::new();
        // The nested struct and the array are always sent.
        assert_eq!(
            body(&registry, &Mixed::default()).unwrap(),
            [0x04, 0x02, 0x00, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(body(&registry, &Point::default()).unwrap(), [0x00]);
    }

    #[test]
    fn pointer_to_zero_is_suppressed() {
        let registry = Registry::new();
        let value = Mixed {
            opt: Some(0),
            ..Mixed::default()
        };
        assert_eq!(body(&registry, &value).unwrap(), body(&registry, &Mixed::default()).unwrap());
    }

    #[test]
    fn singletons_always_send_zero() {
        let registry = Registry::new();
        assert_eq!(body(&registry, &0u32).unwrap(), [0x00, 0x00]);
        assert_eq!(body(&registry, &Some(Box::new(-2i8))).unwrap(), [0x00, 0x03]);
        assert_eq!(
            body(&registry, &vec![0u16, 1]).unwrap(),
            [0x00, 0x02, 0x00, 0x01]
        );
        assert_eq!(body(&registry, &String::from("hi")).unwrap(), [0x00, 0x02, b'h', b'i']);
    }

    #[test]
    fn maps_send_count_then_pairs() {
        let registry = Registry::new();
        let map: BTreeMap<u8, bool> = [(1, false), (2, true)].into_iter().collect();
        assert_eq!(
            body(&registry, &map).unwrap(),
            [0x00, 0x02, 0x01, 0x00, 0x02, 0x01]
        );
    }

    #[test]
    fn nil_pointers_in_forced_positions() {
        let registry = Registry::new();
        let none: Option<Point> = None;
        assert!(matches!(body(&registry, &none), Err(Error::NilPointer(_))));
        let elems: Vec<Option<u8>> = vec![Some(1), None];
        assert!(matches!(body(&registry, &elems), Err(Error::NilPointer(_))));
    }

    #[test]
    fn recursive_types_compile_once() {
        let registry = Registry::new();
        let tree = Tree {
            label: "root".into(),
            kids: vec![Tree {
                label: "leaf".into(),
                kids: Vec::new(),
            }],
        };
        let out = body(&registry, &tree).unwrap();
        assert_eq!(
            out,
            [
                0x01, 0x04, b'r', b'o', b'o', b't', 0x01, 0x01, 0x01, 0x04, b'l', b'e', b'a',
                b'f', 0x00, 0x00
            ]
        );
        let cell = registry.enc_engine(LocalType::of::<Tree>()).unwrap();
        let Some(EncEngine::Struct(instrs)) = cell.get() else {
            panic!("expected struct engine");
        };
        let EncOp::Slice { elem, .. } = &instrs[1].op else {
            panic!("expected slice op");
        };
        let EncOp::Struct(nested) = &**elem else {
            panic!("expected struct op");
        };
        assert!(Arc::ptr_eq(&nested.upgrade().unwrap(), &cell));
    }

    #[test]
    fn unregistered_interface_value() {
        let registry = Registry::new();
        let value = Mixed {
            any: Interface::new(5u8),
            ..Mixed::default()
        };
        assert!(matches!(
            body(&registry, &value),
            Err(Error::UnregisteredInterfaceType(_))
        ));
    }

    #[test]
    fn descriptors_sent_once_in_dependency_order() {
        let registry = Registry::new();
        let mut sent = HashSet::new();
        let mut fresh = Vec::new();
        let mut state = EncState {
            registry: &registry,
            sent: &mut sent,
            fresh: &mut fresh,
            limit: usize::MAX,
        };
        let mut out = Vec::new();
        state
            .send_type(&mut out, LocalType::of::<Tree>(), Framing::Message)
            .unwrap();
        let first = out.len();
        assert!(first > 0);
        state
            .send_type(&mut out, LocalType::of::<Tree>(), Framing::Message)
            .unwrap();
        assert_eq!(out.len(), first);
        // Tree, then its fields in order: the builtin string and Vec<Tree>.
        assert_eq!(fresh, [TypeId::FIRST_USER, TypeId::STRING, TypeId(65)]);
    }
}

//! Decode engines.
//!
//! A [`DecEngine`] is compiled per pair of local type and remote type id. Its
//! struct table is indexed by the remote field number: fields matched by name
//! decode into the local accessor, the rest are consumed by an ignore
//! operation. Remote types with no local destination at all get an
//! [`IgnoreEngine`], which parses and drops a value of any shape.
//!
//! Engines live in the [`DecSession`] because remote type ids are only
//! meaningful within one stream.
use {
    crate::{
        compat::compatible_type,
        error::{
            corrupt, duplicate_type, field_range, invalid_utf8_encoding, length_mismatch,
            overflow, preallocation_size_limit, type_mismatch, unknown_type_id,
            unregistered_interface_type, Result,
        },
        io::Reader,
        registry::Registry,
        schema::{alloc, Gob, Kind, LocalType, ViewMut},
        types::{GobType, TypeId, WireType},
    },
    core::any,
    once_cell::sync::OnceCell,
    std::{
        collections::HashMap,
        sync::{Arc, Weak},
    },
    tracing::debug,
};

#[derive(Debug)]
pub(crate) enum DecOp {
    Bool,
    Int,
    Uint,
    Float,
    Complex,
    String,
    Bytes,
    Array {
        elem: Box<DecOp>,
        indir: usize,
        len: usize,
    },
    Slice {
        elem: Box<DecOp>,
        indir: usize,
    },
    Map {
        key: Box<DecOp>,
        key_indir: usize,
        elem: Box<DecOp>,
        elem_indir: usize,
    },
    Struct(Weak<OnceCell<DecEngine>>),
    Interface,
    Custom,
}

#[derive(Debug)]
pub(crate) enum DecInstr {
    Field {
        op: DecOp,
        /// Index of the local field accessor.
        index: usize,
        indir: usize,
        name: &'static str,
    },
    /// A remote field with no local counterpart.
    Skip(IgnoreOp),
}

#[derive(Debug)]
pub(crate) enum DecEngine {
    Struct(Vec<DecInstr>),
    Singleton(DecOp),
}

/// Consumes a value of a remote type without storing it.
#[derive(Debug)]
pub(crate) enum IgnoreOp {
    /// Bool, integers and floats: one varint.
    Uint,
    Complex,
    /// Strings, byte slices and custom blobs.
    Bytes,
    Array {
        elem: Box<IgnoreOp>,
        len: usize,
    },
    Slice {
        elem: Box<IgnoreOp>,
    },
    Map {
        key: Box<IgnoreOp>,
        elem: Box<IgnoreOp>,
    },
    Struct(Weak<OnceCell<IgnoreEngine>>),
    Interface,
}

#[derive(Debug)]
pub(crate) enum IgnoreEngine {
    Struct(Vec<IgnoreOp>),
    Singleton(IgnoreOp),
}

type EngineKey = (any::TypeId, TypeId);

/// Cache entries created by one compilation, removed again if it fails.
#[derive(Default)]
struct Fresh {
    engines: Vec<EngineKey>,
    ignorers: Vec<TypeId>,
}

/// Receive-side state of one stream.
pub(crate) struct DecSession {
    registry: Arc<Registry>,
    /// Types defined by the peer on this stream.
    wire_types: HashMap<TypeId, GobType>,
    engines: HashMap<EngineKey, Arc<OnceCell<DecEngine>>>,
    ignorers: HashMap<TypeId, Arc<OnceCell<IgnoreEngine>>>,
}

/// Reject element counts that cannot fit in what is left of the message.
/// Every element occupies at least one byte.
#[inline]
fn check_count(r: &Reader<'_>, count: u64) -> Result<usize> {
    match usize::try_from(count) {
        Ok(n) if n <= r.remaining() => Ok(n),
        _ => Err(preallocation_size_limit(count, r.remaining())),
    }
}

#[inline]
fn read_singleton_delta(r: &mut Reader<'_>) -> Result<()> {
    if r.read_uint()? != 0 {
        return Err(corrupt("non-zero delta for singleton"));
    }
    Ok(())
}

/// Next field number of a struct, or `None` at the terminator.
///
/// `next` is one past the last field read; the first field of a struct is
/// sent as delta 1.
#[inline]
fn next_field(r: &mut Reader<'_>, next: u64) -> Result<Option<u64>> {
    if r.is_empty() {
        return Ok(None);
    }
    let delta = r.read_uint()?;
    if delta == 0 {
        return Ok(None);
    }
    match next.checked_add(delta - 1) {
        Some(field) => Ok(Some(field)),
        None => Err(field_range(delta)),
    }
}

impl DecSession {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            wire_types: HashMap::new(),
            engines: HashMap::new(),
            ignorers: HashMap::new(),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The description of a remote id: builtins from the registry, the rest
    /// from definitions received on this stream.
    fn remote(&self, id: TypeId) -> Result<GobType> {
        let def = if id.is_builtin() {
            self.registry.describe(id)
        } else {
            self.wire_types.get(&id).cloned()
        };
        def.ok_or_else(|| unknown_type_id(id))
    }

    fn check_compatible(&self, base: LocalType, remote: TypeId) -> Result<()> {
        if compatible_type(base, remote, &|id| self.remote(id).ok()) {
            return Ok(());
        }
        let wire = self.remote(remote)?;
        Err(type_mismatch(base.name(), wire.name()))
    }

    fn rollback(&mut self, fresh: Fresh) {
        for key in fresh.engines {
            self.engines.remove(&key);
        }
        for id in fresh.ignorers {
            self.ignorers.remove(&id);
        }
    }

    fn engine(&mut self, base: LocalType, remote: TypeId) -> Result<Arc<OnceCell<DecEngine>>> {
        let mut fresh = Fresh::default();
        let result = self.engine_for(base, remote, &mut fresh);
        if result.is_err() {
            self.rollback(fresh);
        }
        result
    }

    fn ignorer(&mut self, remote: TypeId) -> Result<Arc<OnceCell<IgnoreEngine>>> {
        let mut fresh = Fresh::default();
        let result = self.ignorer_for(remote, &mut fresh);
        if result.is_err() {
            self.rollback(fresh);
        }
        result
    }

    fn engine_for(
        &mut self,
        base: LocalType,
        remote: TypeId,
        fresh: &mut Fresh,
    ) -> Result<Arc<OnceCell<DecEngine>>> {
        let key = (base.id(), remote);
        if let Some(cell) = self.engines.get(&key) {
            return Ok(cell.clone());
        }
        self.check_compatible(base, remote)?;
        let cell = Arc::new(OnceCell::new());
        self.engines.insert(key, cell.clone());
        fresh.engines.push(key);

        let engine = match (base.kind(), self.remote(remote)?) {
            (Kind::Struct(st), GobType::Struct { name, fields }) => {
                let mut instrs = Vec::with_capacity(fields.len());
                let mut matched = false;
                for wire_field in &fields {
                    let Some(index) = st.fields.iter().position(|f| f.name == wire_field.name)
                    else {
                        instrs.push(DecInstr::Skip(self.ignore_op_for(wire_field.id, fresh)?));
                        continue;
                    };
                    let local = st.fields[index];
                    if !compatible_type(local.ty, wire_field.id, &|id| self.remote(id).ok()) {
                        let wire = self.remote(wire_field.id)?;
                        return Err(type_mismatch(local.ty.name(), wire.name()));
                    }
                    let (op, indir) = self.op_for(local.ty, wire_field.id, fresh)?;
                    instrs.push(DecInstr::Field {
                        op,
                        index,
                        indir,
                        name: local.name,
                    });
                    matched = true;
                }
                if !matched && !fields.is_empty() && !st.fields.is_empty() {
                    return Err(type_mismatch(st.name, &name));
                }
                DecEngine::Struct(instrs)
            }
            _ => DecEngine::Singleton(self.op_for(base, remote, fresh)?.0),
        };
        debug!(ty = base.name(), %remote, "compiled decode engine");
        let _ = cell.set(engine);
        Ok(cell)
    }

    /// Compatibility has been checked by the caller.
    fn op_for(
        &mut self,
        local: LocalType,
        remote: TypeId,
        fresh: &mut Fresh,
    ) -> Result<(DecOp, usize)> {
        let (base, indir) = local.strip_pointers();
        let wire = self.remote(remote)?;
        let op = match (base.kind(), &wire) {
            (Kind::Bool, _) => DecOp::Bool,
            (Kind::Int, _) => DecOp::Int,
            (Kind::Uint, _) => DecOp::Uint,
            (Kind::Float, _) => DecOp::Float,
            (Kind::Complex, _) => DecOp::Complex,
            (Kind::String, _) => DecOp::String,
            (Kind::Bytes, _) => DecOp::Bytes,
            (Kind::Array { elem, len }, GobType::Array { elem: remote_elem, .. }) => {
                let (elem, indir) = self.op_for(elem, *remote_elem, fresh)?;
                DecOp::Array {
                    elem: Box::new(elem),
                    indir,
                    len,
                }
            }
            (Kind::Slice { elem }, GobType::Slice { elem: remote_elem, .. }) => {
                let (elem, indir) = self.op_for(elem, *remote_elem, fresh)?;
                DecOp::Slice {
                    elem: Box::new(elem),
                    indir,
                }
            }
            (
                Kind::Map { key, elem },
                GobType::Map {
                    key: remote_key,
                    elem: remote_elem,
                    ..
                },
            ) => {
                let (key, key_indir) = self.op_for(key, *remote_key, fresh)?;
                let (elem, elem_indir) = self.op_for(elem, *remote_elem, fresh)?;
                DecOp::Map {
                    key: Box::new(key),
                    key_indir,
                    elem: Box::new(elem),
                    elem_indir,
                }
            }
            (Kind::Struct(_), GobType::Struct { .. }) => {
                DecOp::Struct(Arc::downgrade(&self.engine_for(base, remote, fresh)?))
            }
            (Kind::Interface, _) => DecOp::Interface,
            (Kind::Custom, _) => DecOp::Custom,
            _ => return Err(type_mismatch(base.name(), wire.name())),
        };
        Ok((op, indir))
    }

    fn ignorer_for(
        &mut self,
        remote: TypeId,
        fresh: &mut Fresh,
    ) -> Result<Arc<OnceCell<IgnoreEngine>>> {
        if let Some(cell) = self.ignorers.get(&remote) {
            return Ok(cell.clone());
        }
        let wire = self.remote(remote)?;
        let cell = Arc::new(OnceCell::new());
        self.ignorers.insert(remote, cell.clone());
        fresh.ignorers.push(remote);
        let engine = match wire {
            GobType::Struct { fields, .. } => IgnoreEngine::Struct(
                fields
                    .iter()
                    .map(|f| self.ignore_op_for(f.id, fresh))
                    .collect::<Result<_>>()?,
            ),
            _ => IgnoreEngine::Singleton(self.ignore_op_for(remote, fresh)?),
        };
        debug!(%remote, "compiled ignore engine");
        let _ = cell.set(engine);
        Ok(cell)
    }

    fn ignore_op_for(&mut self, remote: TypeId, fresh: &mut Fresh) -> Result<IgnoreOp> {
        Ok(match self.remote(remote)? {
            GobType::Bool | GobType::Int | GobType::Uint | GobType::Float => IgnoreOp::Uint,
            GobType::Complex => IgnoreOp::Complex,
            GobType::Bytes | GobType::String | GobType::Custom { .. } => IgnoreOp::Bytes,
            GobType::Interface => IgnoreOp::Interface,
            GobType::Array { elem, len, .. } => IgnoreOp::Array {
                elem: Box::new(self.ignore_op_for(elem, fresh)?),
                len,
            },
            GobType::Slice { elem, .. } => IgnoreOp::Slice {
                elem: Box::new(self.ignore_op_for(elem, fresh)?),
            },
            GobType::Map { key, elem, .. } => IgnoreOp::Map {
                key: Box::new(self.ignore_op_for(key, fresh)?),
                elem: Box::new(self.ignore_op_for(elem, fresh)?),
            },
            GobType::Struct { .. } => {
                IgnoreOp::Struct(Arc::downgrade(&self.ignorer_for(remote, fresh)?))
            }
        })
    }

    /// Decode a top-level value of remote type `remote` into `dst`.
    pub(crate) fn decode_value(
        &mut self,
        r: &mut Reader<'_>,
        remote: TypeId,
        dst: &mut dyn Gob,
    ) -> Result<()> {
        let (base, indir) = dst.local_type().strip_pointers();
        let cell = self.engine(base, remote)?;
        let dst = alloc(dst, indir)?;
        match cell.get() {
            Some(DecEngine::Struct(instrs)) => self.decode_struct(r, instrs, dst),
            Some(DecEngine::Singleton(op)) => {
                read_singleton_delta(r)?;
                self.decode_op(r, op, dst, base.name())
            }
            None => Err(corrupt("decode engine not compiled")),
        }
    }

    fn decode_struct(
        &mut self,
        r: &mut Reader<'_>,
        instrs: &[DecInstr],
        dst: &mut dyn Gob,
    ) -> Result<()> {
        let ViewMut::Struct(fields) = dst.view_mut() else {
            return Err(corrupt("struct engine applied to a non-struct value"));
        };
        let mut next = 0u64;
        while let Some(field) = next_field(r, next)? {
            let instr = usize::try_from(field)
                .ok()
                .and_then(|i| instrs.get(i))
                .ok_or_else(|| field_range(field))?;
            match instr {
                DecInstr::Field {
                    op,
                    index,
                    indir,
                    name,
                } => {
                    let slot = fields
                        .field_mut(*index)
                        .ok_or_else(|| corrupt("struct field accessor out of range"))?;
                    let slot = alloc(slot, *indir)?;
                    self.decode_op(r, op, slot, name)?;
                }
                DecInstr::Skip(op) => self.ignore_op(r, op)?,
            }
            next = field + 1;
        }
        Ok(())
    }

    fn decode_elem(
        &mut self,
        r: &mut Reader<'_>,
        op: &DecOp,
        indir: usize,
        dst: &mut dyn Gob,
        name: &'static str,
    ) -> Result<()> {
        let dst = alloc(dst, indir)?;
        self.decode_op(r, op, dst, name)
    }

    /// `name` identifies the destination in overflow errors.
    fn decode_op(
        &mut self,
        r: &mut Reader<'_>,
        op: &DecOp,
        dst: &mut dyn Gob,
        name: &'static str,
    ) -> Result<()> {
        if let DecOp::Struct(engine) = op {
            let cell = engine
                .upgrade()
                .ok_or_else(|| corrupt("decode engine dropped"))?;
            let Some(DecEngine::Struct(instrs)) = cell.get() else {
                return Err(corrupt("decode engine not compiled"));
            };
            return self.decode_struct(r, instrs, dst);
        }
        match (op, dst.view_mut()) {
            (DecOp::Bool, ViewMut::Bool(b)) => *b = r.read_uint()? != 0,
            (DecOp::Int, ViewMut::Int(slot)) => {
                if !slot.set(r.read_int()?) {
                    return Err(overflow(name));
                }
            }
            (DecOp::Uint, ViewMut::Uint(slot)) => {
                if !slot.set(r.read_uint()?) {
                    return Err(overflow(name));
                }
            }
            (DecOp::Float, ViewMut::Float(slot)) => {
                if !slot.set(r.read_float()?) {
                    return Err(overflow(name));
                }
            }
            (DecOp::Complex, ViewMut::Complex(slot)) => {
                let re = r.read_float()?;
                let im = r.read_float()?;
                if !slot.set(re, im) {
                    return Err(overflow(name));
                }
            }
            (DecOp::String, ViewMut::String(s)) => {
                let text = core::str::from_utf8(r.read_bytes()?).map_err(invalid_utf8_encoding)?;
                s.clear();
                s.push_str(text);
            }
            (DecOp::Bytes, ViewMut::Seq(seq)) => {
                let bytes = r.read_bytes()?;
                let buf = seq
                    .bytes_mut()
                    .ok_or_else(|| corrupt("byte slice destination expected"))?;
                buf.clear();
                buf.extend_from_slice(bytes);
            }
            (DecOp::Array { elem, indir, len }, ViewMut::Seq(seq)) => {
                let count = r.read_uint()?;
                if count != *len as u64 {
                    return Err(length_mismatch(*len, count));
                }
                check_count(r, count)?;
                if !seq.reset(*len) {
                    return Err(corrupt("array destination length changed"));
                }
                for i in 0..*len {
                    let e = seq
                        .elem_mut(i)
                        .ok_or_else(|| corrupt("array element out of range"))?;
                    self.decode_elem(r, elem, *indir, e, name)?;
                }
            }
            (DecOp::Slice { elem, indir }, ViewMut::Seq(seq)) => {
                let count = r.read_uint()?;
                let len = check_count(r, count)?;
                seq.reset(len);
                for i in 0..len {
                    let e = seq
                        .elem_mut(i)
                        .ok_or_else(|| corrupt("slice element out of range"))?;
                    self.decode_elem(r, elem, *indir, e, name)?;
                }
            }
            (
                DecOp::Map {
                    key,
                    key_indir,
                    elem,
                    elem_indir,
                },
                ViewMut::Map(map),
            ) => {
                let count = r.read_uint()?;
                let len = check_count(r, count)?;
                for _ in 0..len {
                    map.insert_with(&mut |k: &mut dyn Gob, v: &mut dyn Gob| {
                        self.decode_elem(r, key, *key_indir, k, name)?;
                        self.decode_elem(r, elem, *elem_indir, v, name)
                    })?;
                }
            }
            (DecOp::Interface, ViewMut::Interface(slot)) => self.decode_interface(r, slot)?,
            (DecOp::Custom, ViewMut::Custom(codec)) => codec.gob_decode(r.read_bytes()?)?,
            _ => return Err(corrupt("destination does not match its decode engine")),
        }
        Ok(())
    }

    fn decode_interface(
        &mut self,
        r: &mut Reader<'_>,
        slot: &mut Option<Box<dyn Gob>>,
    ) -> Result<()> {
        let name = r.read_bytes()?;
        if name.is_empty() {
            *slot = None;
            return Ok(());
        }
        // Inline definitions are recorded before the name is resolved; the
        // peer counts them as sent even if this value is rejected.
        let id = self.read_inline_types(r)?;
        let mut body = Reader::new(r.read_bytes()?);
        let name = core::str::from_utf8(name).map_err(invalid_utf8_encoding)?;
        let mut value = self
            .registry
            .make_named(name)
            .ok_or_else(|| unregistered_interface_type(name))?;
        self.decode_value(&mut body, id, &mut *value)?;
        if !body.is_empty() {
            return Err(corrupt("extra data in buffer"));
        }
        *slot = Some(value);
        Ok(())
    }

    /// Record the descriptors that precede an interface value and return the value's id.
    fn read_inline_types(&mut self, r: &mut Reader<'_>) -> Result<TypeId> {
        loop {
            let id = r.read_type_id()?;
            if id.0 >= 0 {
                return Ok(id);
            }
            let id = id
                .0
                .checked_neg()
                .map(TypeId)
                .ok_or_else(|| corrupt("type id out of range"))?;
            let def = r.read_bytes()?;
            self.recv_type(id, def)?;
        }
    }

    /// Record the definition of `id` carried in `bytes`.
    pub(crate) fn recv_type(&mut self, id: TypeId, bytes: &[u8]) -> Result<()> {
        if id.is_builtin() || self.wire_types.contains_key(&id) {
            return Err(duplicate_type(id));
        }
        let mut r = Reader::new(bytes);
        let mut wire = WireType::default();
        self.decode_value(&mut r, TypeId::WIRE_TYPE, &mut wire)?;
        if !r.is_empty() {
            return Err(corrupt("extra data in buffer"));
        }
        let def = GobType::from_wire(wire)?;
        debug!(%id, name = def.name(), "received type descriptor");
        self.wire_types.insert(id, def);
        Ok(())
    }

    /// Consume a top-level value of remote type `remote` without storing it.
    pub(crate) fn ignore_value(&mut self, r: &mut Reader<'_>, remote: TypeId) -> Result<()> {
        let cell = self.ignorer(remote)?;
        match cell.get() {
            Some(IgnoreEngine::Struct(ops)) => self.ignore_struct(r, ops),
            Some(IgnoreEngine::Singleton(op)) => {
                read_singleton_delta(r)?;
                self.ignore_op(r, op)
            }
            None => Err(corrupt("ignore engine not compiled")),
        }
    }

    fn ignore_struct(&mut self, r: &mut Reader<'_>, ops: &[IgnoreOp]) -> Result<()> {
        let mut next = 0u64;
        while let Some(field) = next_field(r, next)? {
            let op = usize::try_from(field)
                .ok()
                .and_then(|i| ops.get(i))
                .ok_or_else(|| field_range(field))?;
            self.ignore_op(r, op)?;
            next = field + 1;
        }
        Ok(())
    }

    fn ignore_op(&mut self, r: &mut Reader<'_>, op: &IgnoreOp) -> Result<()> {
        match op {
            IgnoreOp::Uint => {
                r.read_uint()?;
            }
            IgnoreOp::Complex => {
                r.read_uint()?;
                r.read_uint()?;
            }
            IgnoreOp::Bytes => {
                r.read_bytes()?;
            }
            IgnoreOp::Array { elem, len } => {
                let count = r.read_uint()?;
                if count != *len as u64 {
                    return Err(length_mismatch(*len, count));
                }
                for _ in 0..check_count(r, count)? {
                    self.ignore_op(r, elem)?;
                }
            }
            IgnoreOp::Slice { elem } => {
                let count = r.read_uint()?;
                for _ in 0..check_count(r, count)? {
                    self.ignore_op(r, elem)?;
                }
            }
            IgnoreOp::Map { key, elem } => {
                let count = r.read_uint()?;
                for _ in 0..check_count(r, count)? {
                    self.ignore_op(r, key)?;
                    self.ignore_op(r, elem)?;
                }
            }
            IgnoreOp::Struct(engine) => {
                let cell = engine
                    .upgrade()
                    .ok_or_else(|| corrupt("ignore engine dropped"))?;
                let Some(IgnoreEngine::Struct(ops)) = cell.get() else {
                    return Err(corrupt("ignore engine not compiled"));
                };
                self.ignore_struct(r, ops)?;
            }
            IgnoreOp::Interface => {
                // Definitions are recorded even when the value is dropped;
                // later values may refer to them.
                if !r.read_bytes()?.is_empty() {
                    self.read_inline_types(r)?;
                    r.read_bytes()?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            enc::{EncState, Framing},
            Error, Interface,
        },
        std::collections::{BTreeMap, HashSet},
    };

    #[derive(crate::Gob, Debug, Default, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[derive(crate::Gob, Debug, Default, PartialEq)]
    #[gob(name = "Point")]
    struct Reordered {
        y: i32,
        x: i16,
    }

    #[derive(crate::Gob, Debug, Default)]
    struct Wide {
        x: i64,
        extra: BTreeMap<String, Vec<Point>>,
        y: i64,
        note: Interface,
    }

    #[derive(crate::Gob, Debug, Default, PartialEq)]
    struct Disjoint {
        z: u8,
    }

    #[derive(crate::Gob, Debug, Default, PartialEq)]
    struct Named {
        x: String,
    }

    /// Descriptors for `T` followed by the body of `value`, as a peer would send them.
    fn send<T: Gob>(registry: &Registry, session: &mut DecSession, value: &T) -> (TypeId, Vec<u8>) {
        let mut sent = HashSet::new();
        let mut fresh = Vec::new();
        let mut state = EncState {
            registry,
            sent: &mut sent,
            fresh: &mut fresh,
            limit: usize::MAX,
        };
        let mut defs = Vec::new();
        state
            .send_type(&mut defs, LocalType::of::<T>(), Framing::Inline)
            .unwrap();
        let mut body = Vec::new();
        state.encode_value(&mut body, value).unwrap();
        let mut r = Reader::new(&defs);
        while !r.is_empty() {
            let id = TypeId(-r.read_type_id().unwrap().0);
            session.recv_type(id, r.read_bytes().unwrap()).unwrap();
        }
        (registry.type_id_of::<T>().unwrap(), body)
    }

    fn decode_into<T: Gob>(session: &mut DecSession, id: TypeId, body: &[u8]) -> Result<T> {
        let mut value = T::zero();
        session.decode_value(&mut Reader::new(body), id, &mut value)?;
        Ok(value)
    }

    #[test]
    fn fields_match_by_name() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let (id, body) = send(&sender, &mut session, &Point { x: 3, y: -9 });
        let got: Reordered = decode_into(&mut session, id, &body).unwrap();
        assert_eq!(got, Reordered { y: -9, x: 3 });
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let wide = Wide {
            x: 1,
            extra: [("a".to_owned(), vec![Point { x: 5, y: 6 }])]
                .into_iter()
                .collect(),
            y: 2,
            note: Interface::nil(),
        };
        let (id, body) = send(&sender, &mut session, &wide);
        let got: Point = decode_into(&mut session, id, &body).unwrap();
        assert_eq!(got, Point { x: 1, y: 2 });
    }

    #[test]
    fn missing_fields_stay_zero() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let (id, body) = send(&sender, &mut session, &Point { x: 4, y: 5 });
        let got: Wide = decode_into(&mut session, id, &body).unwrap();
        assert_eq!((got.x, got.y), (4, 5));
        assert!(got.extra.is_empty());
        assert!(got.note.is_nil());
    }

    #[test]
    fn no_matching_fields_is_a_mismatch() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let (id, body) = send(&sender, &mut session, &Point { x: 4, y: 5 });
        assert!(matches!(
            decode_into::<Disjoint>(&mut session, id, &body),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            decode_into::<Named>(&mut session, id, &body),
            Err(Error::TypeMismatch { .. })
        ));
        // The failed compiles left nothing behind.
        assert_eq!(
            decode_into::<Point>(&mut session, id, &body).unwrap(),
            Point { x: 4, y: 5 }
        );
    }

    #[test]
    fn int_into_string_is_a_mismatch() {
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let err = decode_into::<String>(&mut session, TypeId::INT, &[0x00, 0x06]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref remote, .. } if remote == "int"));
    }

    #[test]
    fn narrow_destination_overflows() {
        let mut session = DecSession::new(Arc::new(Registry::new()));
        // 300 zig-zagged.
        let body = [0x00, 0xFE, 0x02, 0x58];
        assert_eq!(decode_into::<i64>(&mut session, TypeId::INT, &body).unwrap(), 300);
        assert!(matches!(
            decode_into::<i8>(&mut session, TypeId::INT, &body),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn field_number_out_of_range() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let (id, _) = send(&sender, &mut session, &Point::default());
        assert!(matches!(
            decode_into::<Point>(&mut session, id, &[0x03, 0x02, 0x00]),
            Err(Error::FieldRange(2))
        ));
        assert!(matches!(
            session.ignore_value(&mut Reader::new(&[0x01, 0x02, 0x05, 0x02]), id),
            Err(Error::FieldRange(5))
        ));
    }

    #[test]
    fn singleton_delta_must_be_zero() {
        let mut session = DecSession::new(Arc::new(Registry::new()));
        assert!(matches!(
            decode_into::<u8>(&mut session, TypeId::UINT, &[0x01, 0x05]),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn arrays_need_exact_length() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let (id, mut body) = send(&sender, &mut session, &[7u8, 8, 9]);
        assert_eq!(decode_into::<[u16; 3]>(&mut session, id, &body).unwrap(), [7, 8, 9]);
        body[1] = 2;
        assert!(matches!(
            decode_into::<[u16; 3]>(&mut session, id, &body),
            Err(Error::LengthMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn oversized_counts_fail_before_allocating() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let (id, _) = send(&sender, &mut session, &vec![String::new()]);
        // Claims u32::MAX elements.
        let body = [0x00, 0xFC, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
        assert!(matches!(
            decode_into::<Vec<String>>(&mut session, id, &body),
            Err(Error::PreallocationSizeLimit { .. })
        ));
        assert!(matches!(
            session.ignore_value(&mut Reader::new(&body), id),
            Err(Error::PreallocationSizeLimit { .. })
        ));
    }

    #[test]
    fn slices_replace_and_maps_merge() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let (id, body) = send(&sender, &mut session, &vec![1u32, 2]);
        let mut dst = vec![9u32, 9, 9];
        session
            .decode_value(&mut Reader::new(&body), id, &mut dst)
            .unwrap();
        assert_eq!(dst, [1, 2]);

        let incoming: BTreeMap<String, bool> = [("b".to_owned(), true)].into_iter().collect();
        let (id, body) = send(&sender, &mut session, &incoming);
        let mut dst: BTreeMap<String, bool> = [("a".to_owned(), false)].into_iter().collect();
        session
            .decode_value(&mut Reader::new(&body), id, &mut dst)
            .unwrap();
        assert_eq!(dst.len(), 2);
        assert_eq!(dst.get("b"), Some(&true));
    }

    #[test]
    fn duplicate_and_builtin_definitions_rejected() {
        let sender = Registry::new();
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let (id, _) = send(&sender, &mut session, &Point::default());
        let wire = sender.describe(id).unwrap().to_wire(id).unwrap();
        let mut state_sent = HashSet::new();
        let mut fresh = Vec::new();
        let mut state = EncState {
            registry: &sender,
            sent: &mut state_sent,
            fresh: &mut fresh,
            limit: usize::MAX,
        };
        let mut def = Vec::new();
        state.encode_value(&mut def, &wire).unwrap();
        assert!(matches!(session.recv_type(id, &def), Err(Error::DuplicateType(_))));
        assert!(matches!(
            session.recv_type(TypeId::STRING, &def),
            Err(Error::DuplicateType(_))
        ));
        def.push(0x00);
        assert!(matches!(
            session.recv_type(TypeId(99), &def),
            Err(Error::Corrupt("extra data in buffer"))
        ));
    }

    #[test]
    fn unknown_value_type() {
        let mut session = DecSession::new(Arc::new(Registry::new()));
        assert!(matches!(
            decode_into::<Point>(&mut session, TypeId(70), &[0x00]),
            Err(Error::UnknownTypeId(TypeId(70)))
        ));
    }

    #[test]
    fn wide_float_into_f32_overflows() {
        let mut session = DecSession::new(Arc::new(Registry::new()));
        let mut body = vec![0x00];
        crate::varint::encode_float(&mut body, f64::MAX);
        assert!(matches!(
            decode_into::<f32>(&mut session, TypeId::FLOAT, &body),
            Err(Error::Overflow(_))
        ));
        let mut body = vec![0x00];
        crate::varint::encode_float(&mut body, f64::INFINITY);
        assert_eq!(
            decode_into::<f32>(&mut session, TypeId::FLOAT, &body).unwrap(),
            f32::INFINITY
        );
    }

    #[test]
    fn interface_body_must_be_consumed() {
        let registry = Arc::new(Registry::new());
        registry.register_name::<u64>("u").unwrap();
        let mut session = DecSession::new(registry);
        // delta, name "u", id uint, value blob [delta 7].
        let exact = [0x00, 0x01, b'u', 0x06, 0x02, 0x00, 0x07];
        let got: Interface = decode_into(&mut session, TypeId::INTERFACE, &exact).unwrap();
        assert_eq!(got.downcast_ref::<u64>(), Some(&7));

        let trailing = [0x00, 0x01, b'u', 0x06, 0x03, 0x00, 0x07, 0x09];
        assert!(matches!(
            decode_into::<Interface>(&mut session, TypeId::INTERFACE, &trailing),
            Err(Error::Corrupt("extra data in buffer"))
        ));
    }
}

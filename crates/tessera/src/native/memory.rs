//! An engine that keeps every type and instance in process memory.
//!
//! Types are declared with `CREATE TYPE` statements. Embedded objects and
//! collection elements live inside their parent and are freed with it; values
//! stored into an instance are always copied, never adopted. The engine keeps
//! allocation statistics and can be told to fail the next call of a given
//! operation, which makes it useful for checking resource handling on error
//! paths.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use time::OffsetDateTime;

use super::{
    AttrHandle, DescriptorHandle, IndicatorHandle, InstanceHandle, LocatorHandle, Native,
    NativeAttrInfo, NativeData, NativeDataTypeInfo, NativeError, NativeIndicator, NativeResult,
    NativeSlot, NativeTypeInfo, NativeTypeRef, RawHandle, StringHandle, TypeHandle, codes,
};
use crate::{DbType, lob::LobKind};

/// Schema that unqualified type names belong to.
pub const DEFAULT_SCHEMA: &str = "TESSERA";

const INCONSISTENT_TYPES: i32 = 932;
const FILE_READ_ONLY: i32 = 22_286;

/// Operations that can be made to fail with [`MemoryEngine::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    ObjectNew,
    ObjectGetInd,
    ObjectFree,
    IndicatorFree,
    ObjectCopy,
    GetAttr,
    SetAttr,
    CollAppend,
    CollAssignElem,
    CollGetElem,
    CollTrim,
    TableDelete,
    StringAssign,
    RawAssign,
    DescriptorAlloc,
    TimestampSet,
    LobAlloc,
    LobLocatorAssign,
    LobWrite,
    DescribeType,
}

/// Allocation counters. `live_*` fields count what is currently allocated,
/// `*_allocs` fields count every allocation made so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub live_instances: usize,
    pub live_indicators: usize,
    pub live_strings: usize,
    pub live_raws: usize,
    pub live_descriptors: usize,
    pub live_locators: usize,
    pub string_allocs: u64,
    pub raw_allocs: u64,
    pub descriptor_allocs: u64,
    pub lob_allocs: u64,
    /// Number of top level instances freed.
    pub object_frees: u64,
}

impl EngineStats {
    /// Total number of value buffers allocated.
    pub fn buffer_allocs(&self) -> u64 {
        self.string_allocs + self.raw_allocs + self.descriptor_allocs + self.lob_allocs
    }
}

#[derive(Debug, Clone)]
enum FieldType {
    Mapped(DbType),
    Object(NativeTypeRef),
    Unmapped(u16),
}

impl FieldType {
    fn type_info(&self) -> NativeDataTypeInfo {
        match self {
            FieldType::Mapped(t) => NativeDataTypeInfo::of(*t),
            FieldType::Object(r) => NativeDataTypeInfo {
                type_code: DbType::Object.code(),
                object_type: Some(r.clone()),
            },
            FieldType::Unmapped(code) => NativeDataTypeInfo {
                type_code: *code,
                object_type: None,
            },
        }
    }
}

#[derive(Debug)]
struct AttrDef {
    handle: AttrHandle,
    name: String,
    ty: FieldType,
}

#[derive(Debug)]
enum Shape {
    Object(Vec<AttrDef>),
    Collection {
        element: FieldType,
        limit: Option<u32>,
    },
}

#[derive(Debug)]
struct TypeDef {
    tdo: TypeHandle,
    schema: String,
    name: String,
    shape: Shape,
}

#[derive(Debug, Clone)]
struct Field {
    data: Option<NativeData>,
    is_null: bool,
}

impl Default for Field {
    fn default() -> Self {
        Self {
            data: None,
            is_null: true,
        }
    }
}

#[derive(Debug, Clone)]
enum Body {
    Object(Vec<Field>),
    Collection {
        len: i32,
        elems: BTreeMap<i32, Field>,
    },
}

impl Body {
    fn into_fields(self) -> Vec<Field> {
        match self {
            Body::Object(fields) => fields,
            Body::Collection { elems, .. } => elems.into_values().collect(),
        }
    }
}

#[derive(Debug)]
struct Instance {
    tdo: TypeHandle,
    indicator: IndicatorHandle,
    embedded: bool,
    body: Body,
}

#[derive(Debug)]
struct Indicator {
    separate: bool,
}

#[derive(Debug)]
struct Descriptor {
    db_type: DbType,
    value: Option<OffsetDateTime>,
}

#[derive(Debug)]
struct Locator {
    kind: LobKind,
    content: Arc<Mutex<Vec<u8>>>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    types: HashMap<TypeHandle, TypeDef>,
    names: HashMap<(String, String), TypeHandle>,
    attrs: HashMap<AttrHandle, (TypeHandle, usize)>,
    instances: HashMap<InstanceHandle, Instance>,
    indicators: HashMap<IndicatorHandle, Indicator>,
    strings: HashMap<StringHandle, Vec<u8>>,
    raws: HashMap<RawHandle, Vec<u8>>,
    descriptors: HashMap<DescriptorHandle, Descriptor>,
    locators: HashMap<LocatorHandle, Locator>,
    failures: HashSet<NativeOp>,
    stats: EngineStats,
}

fn inconsistent(expected: &FieldType, got: &NativeData) -> NativeError {
    NativeError::new(
        INCONSISTENT_TYPES,
        format!("inconsistent datatypes: expected {expected:?} got {got:?}"),
    )
}

fn element_missing(index: i32) -> NativeError {
    NativeError::new(
        codes::ELEMENT_MISSING,
        format!("element at index [{index}] does not exist"),
    )
}

fn lock_content(content: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    content.lock().unwrap_or_else(PoisonError::into_inner)
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&mut self, op: NativeOp) -> NativeResult<()> {
        if self.failures.remove(&op) {
            Err(NativeError::new(
                codes::INJECTED,
                format!("injected failure in {op:?}"),
            ))
        } else {
            Ok(())
        }
    }

    fn type_def(&self, tdo: TypeHandle) -> NativeResult<&TypeDef> {
        self.types
            .get(&tdo)
            .ok_or_else(|| NativeError::invalid_handle("type", tdo.as_raw()))
    }

    fn resolve(&self, r: &NativeTypeRef) -> NativeResult<TypeHandle> {
        self.names
            .get(&(r.schema.clone(), r.name.clone()))
            .copied()
            .ok_or_else(|| {
                NativeError::new(
                    codes::TYPE_NOT_FOUND,
                    format!("object {}.{} does not exist", r.schema, r.name),
                )
            })
    }

    fn instance(&self, handle: InstanceHandle) -> NativeResult<&Instance> {
        self.instances
            .get(&handle)
            .ok_or_else(|| NativeError::invalid_handle("instance", handle.as_raw()))
    }

    fn instance_mut(&mut self, handle: InstanceHandle) -> NativeResult<&mut Instance> {
        self.instances
            .get_mut(&handle)
            .ok_or_else(|| NativeError::invalid_handle("instance", handle.as_raw()))
    }

    fn collection(&self, handle: InstanceHandle) -> NativeResult<(i32, &BTreeMap<i32, Field>)> {
        match &self.instance(handle)?.body {
            Body::Collection { len, elems } => Ok((*len, elems)),
            Body::Object(_) => Err(NativeError::new(
                INCONSISTENT_TYPES,
                format!("instance {} is not a collection", handle.as_raw()),
            )),
        }
    }

    fn element_type(&self, coll: InstanceHandle) -> NativeResult<(FieldType, Option<u32>)> {
        let tdo = self.instance(coll)?.tdo;
        match &self.type_def(tdo)?.shape {
            Shape::Collection { element, limit } => Ok((element.clone(), *limit)),
            Shape::Object(_) => Err(NativeError::new(
                INCONSISTENT_TYPES,
                format!("instance {} is not a collection", coll.as_raw()),
            )),
        }
    }

    fn attr_type(&self, instance: InstanceHandle, attr: AttrHandle) -> NativeResult<(usize, FieldType)> {
        let &(owner, pos) = self
            .attrs
            .get(&attr)
            .ok_or_else(|| NativeError::invalid_handle("attribute", attr.as_raw()))?;
        if self.instance(instance)?.tdo != owner {
            return Err(NativeError::new(
                INCONSISTENT_TYPES,
                format!("attribute {} does not belong to the instance type", attr.as_raw()),
            ));
        }
        match &self.type_def(owner)?.shape {
            Shape::Object(attrs) => Ok((pos, attrs[pos].ty.clone())),
            Shape::Collection { .. } => Err(NativeError::invalid_handle("attribute", attr.as_raw())),
        }
    }

    fn insert_instance(&mut self, tdo: TypeHandle, embedded: bool, body: Body) -> InstanceHandle {
        let handle = InstanceHandle::from_raw(self.next_id());
        // Top level indicators are allocated on first request.
        let indicator = IndicatorHandle::from_raw(self.next_id());
        if embedded {
            self.indicators
                .insert(indicator, Indicator { separate: false });
        }
        self.instances.insert(
            handle,
            Instance {
                tdo,
                indicator,
                embedded,
                body,
            },
        );
        handle
    }

    fn new_instance(&mut self, tdo: TypeHandle, embedded: bool) -> NativeResult<InstanceHandle> {
        let body = match &self.type_def(tdo)?.shape {
            Shape::Object(attrs) => Body::Object(vec![Field::default(); attrs.len()]),
            Shape::Collection { .. } => Body::Collection {
                len: 0,
                elems: BTreeMap::new(),
            },
        };
        Ok(self.insert_instance(tdo, embedded, body))
    }

    fn free_instance(&mut self, handle: InstanceHandle) {
        let Some(instance) = self.instances.remove(&handle) else {
            return;
        };
        if !self
            .indicators
            .get(&instance.indicator)
            .is_some_and(|i| i.separate)
        {
            self.indicators.remove(&instance.indicator);
        }
        for field in instance.body.into_fields() {
            self.free_field(field);
        }
    }

    fn free_field(&mut self, field: Field) {
        match field.data {
            Some(NativeData::String(h)) => {
                self.strings.remove(&h);
            }
            Some(NativeData::Raw(h)) => {
                self.raws.remove(&h);
            }
            Some(NativeData::Timestamp(h)) => {
                self.descriptors.remove(&h);
            }
            Some(NativeData::Lob(h)) => {
                self.locators.remove(&h);
            }
            Some(NativeData::Object(h)) => self.free_instance(h),
            _ => {}
        }
    }

    fn alloc_string(&mut self, bytes: Vec<u8>) -> StringHandle {
        let handle = StringHandle::from_raw(self.next_id());
        self.strings.insert(handle, bytes);
        self.stats.string_allocs += 1;
        handle
    }

    fn alloc_raw(&mut self, bytes: Vec<u8>) -> RawHandle {
        let handle = RawHandle::from_raw(self.next_id());
        self.raws.insert(handle, bytes);
        self.stats.raw_allocs += 1;
        handle
    }

    fn alloc_descriptor(&mut self, db_type: DbType, value: Option<OffsetDateTime>) -> DescriptorHandle {
        let handle = DescriptorHandle::from_raw(self.next_id());
        self.descriptors
            .insert(handle, Descriptor { db_type, value });
        self.stats.descriptor_allocs += 1;
        handle
    }

    fn alloc_locator(&mut self, kind: LobKind, content: Arc<Mutex<Vec<u8>>>) -> LocatorHandle {
        let handle = LocatorHandle::from_raw(self.next_id());
        self.locators.insert(handle, Locator { kind, content });
        self.stats.lob_allocs += 1;
        handle
    }

    /// Copy a value so that the copy is owned by an instance.
    fn duplicate(&mut self, data: &NativeData) -> NativeResult<NativeData> {
        Ok(match data {
            NativeData::String(h) => {
                let bytes = self
                    .strings
                    .get(h)
                    .cloned()
                    .ok_or_else(|| NativeError::invalid_handle("string", h.as_raw()))?;
                NativeData::String(self.alloc_string(bytes))
            }
            NativeData::Raw(h) => {
                let bytes = self
                    .raws
                    .get(h)
                    .cloned()
                    .ok_or_else(|| NativeError::invalid_handle("raw", h.as_raw()))?;
                NativeData::Raw(self.alloc_raw(bytes))
            }
            NativeData::Timestamp(h) => {
                let (db_type, value) = self
                    .descriptors
                    .get(h)
                    .map(|d| (d.db_type, d.value))
                    .ok_or_else(|| NativeError::invalid_handle("descriptor", h.as_raw()))?;
                NativeData::Timestamp(self.alloc_descriptor(db_type, value))
            }
            NativeData::Lob(h) => {
                let (kind, content) = self
                    .locators
                    .get(h)
                    .map(|l| (l.kind, l.content.clone()))
                    .ok_or_else(|| NativeError::invalid_handle("locator", h.as_raw()))?;
                NativeData::Lob(self.alloc_locator(kind, content))
            }
            NativeData::Object(h) => NativeData::Object(self.copy_instance(*h)?),
            other => other.clone(),
        })
    }

    fn copy_fields(&mut self, fields: Vec<Field>) -> NativeResult<Vec<Field>> {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            let data = match &field.data {
                Some(d) => match self.duplicate(d) {
                    Ok(d) => Some(d),
                    Err(e) => {
                        for done in out {
                            self.free_field(done);
                        }
                        return Err(e);
                    }
                },
                None => None,
            };
            out.push(Field {
                data,
                is_null: field.is_null,
            });
        }
        Ok(out)
    }

    fn copy_body(&mut self, body: Body) -> NativeResult<Body> {
        Ok(match body {
            Body::Object(fields) => Body::Object(self.copy_fields(fields)?),
            Body::Collection { len, elems } => {
                let (keys, fields): (Vec<i32>, Vec<Field>) = elems.into_iter().unzip();
                let fields = self.copy_fields(fields)?;
                Body::Collection {
                    len,
                    elems: keys.into_iter().zip(fields).collect(),
                }
            }
        })
    }

    /// Deep copy an instance into a new embedded instance.
    fn copy_instance(&mut self, src: InstanceHandle) -> NativeResult<InstanceHandle> {
        let (tdo, body) = {
            let instance = self.instance(src)?;
            (instance.tdo, instance.body.clone())
        };
        let body = self.copy_body(body)?;
        Ok(self.insert_instance(tdo, true, body))
    }

    /// Check that a value fits a field and copy it in.
    fn copy_in(&mut self, ty: &FieldType, data: &NativeData) -> NativeResult<NativeData> {
        let fits = match (ty, data) {
            (FieldType::Mapped(t), NativeData::String(_)) => t.is_text(),
            (FieldType::Mapped(DbType::Raw), NativeData::Raw(_)) => true,
            (FieldType::Mapped(DbType::NativeInt), NativeData::Int32(_)) => true,
            (FieldType::Mapped(DbType::NativeFloat), NativeData::Float(_)) => true,
            (FieldType::Mapped(DbType::NativeDouble), NativeData::Double(_)) => true,
            (FieldType::Mapped(DbType::Number), NativeData::Number(_)) => true,
            (FieldType::Mapped(DbType::Date), NativeData::Date(_)) => true,
            (FieldType::Mapped(DbType::Boolean), NativeData::Boolean(_)) => true,
            (FieldType::Mapped(t), NativeData::Timestamp(_)) => t.is_timestamp(),
            (FieldType::Mapped(t), NativeData::Lob(_)) => t.is_lob(),
            (FieldType::Object(r), NativeData::Object(h)) => {
                self.resolve(r)? == self.instance(*h)?.tdo
            }
            _ => false,
        };
        if !fits {
            return Err(inconsistent(ty, data));
        }
        self.duplicate(data)
    }

    /// Build the stored form of a slot. Nulls keep whatever was stored before.
    fn store(&mut self, ty: &FieldType, slot: &NativeSlot, old: Option<Field>) -> NativeResult<Field> {
        if slot.is_null {
            let mut field = old.unwrap_or_default();
            field.is_null = true;
            return Ok(field);
        }
        let Some(data) = &slot.data else {
            return Err(NativeError::new(
                INCONSISTENT_TYPES,
                "non-null value without data",
            ));
        };
        let data = self.copy_in(ty, data)?;
        if let Some(old) = old {
            self.free_field(old);
        }
        Ok(Field {
            data: Some(data),
            is_null: false,
        })
    }

    fn load(&self, field: &Field) -> NativeSlot {
        let indicator = match &field.data {
            Some(NativeData::Object(h)) => self.instances.get(h).map(|i| i.indicator),
            _ => None,
        };
        NativeSlot {
            data: field.data.clone(),
            is_null: field.is_null,
            indicator,
        }
    }
}

/// An in-process [`Native`] implementation.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `op` fail.
    pub fn fail_next(&self, op: NativeOp) {
        self.state().failures.insert(op);
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state();
        EngineStats {
            live_instances: state.instances.len(),
            live_indicators: state.indicators.len(),
            live_strings: state.strings.len(),
            live_raws: state.raws.len(),
            live_descriptors: state.descriptors.len(),
            live_locators: state.locators.len(),
            ..state.stats
        }
    }

    /// Execute a script of `CREATE TYPE` statements separated by `;`.
    pub fn execute_ddl(&self, script: &str) -> NativeResult<()> {
        let cleaned: String = script
            .lines()
            .map(|line| match line.find("--") {
                Some(pos) => &line[..pos],
                None => line,
            })
            .filter(|line| line.trim() != "/")
            .collect::<Vec<_>>()
            .join("\n");
        for statement in cleaned.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                self.create_type(statement)?;
            }
        }
        Ok(())
    }

    fn create_type(&self, statement: &str) -> NativeResult<()> {
        let syntax = |msg: &str| NativeError::new(902, format!("{msg}: {statement}"));

        let rest = take_keyword(statement, "CREATE").ok_or_else(|| syntax("expected CREATE"))?;
        let rest = take_keyword(rest, "OR")
            .and_then(|r| take_keyword(r, "REPLACE"))
            .unwrap_or(rest);
        let rest = take_keyword(rest, "TYPE").ok_or_else(|| syntax("expected TYPE"))?;
        let (schema, name, rest) = take_qualified(rest).ok_or_else(|| syntax("expected type name"))?;
        let rest = take_keyword(rest, "AS")
            .or_else(|| take_keyword(rest, "IS"))
            .ok_or_else(|| syntax("expected AS"))?;

        let mut state = self.state();
        let tdo = TypeHandle::from_raw(state.next_id());
        let shape = if let Some(rest) = take_keyword(rest, "OBJECT") {
            let body = parenthesized(rest).ok_or_else(|| syntax("expected attribute list"))?;
            let mut attrs = Vec::new();
            for (pos, part) in split_top_level(body).into_iter().enumerate() {
                let (attr_name, ty) = take_ident(part).ok_or_else(|| syntax("expected attribute"))?;
                let handle = AttrHandle::from_raw(state.next_id());
                state.attrs.insert(handle, (tdo, pos));
                attrs.push(AttrDef {
                    handle,
                    name: attr_name,
                    ty: field_type(ty.trim()),
                });
            }
            Shape::Object(attrs)
        } else if let Some(rest) = take_keyword(rest, "TABLE") {
            let ty = take_keyword(rest, "OF").ok_or_else(|| syntax("expected OF"))?;
            Shape::Collection {
                element: field_type(ty.trim()),
                limit: None,
            }
        } else {
            let rest = take_keyword(rest, "VARRAY")
                .or_else(|| take_keyword(rest, "VARYING").and_then(|r| take_keyword(r, "ARRAY")))
                .ok_or_else(|| syntax("expected OBJECT, TABLE or VARRAY"))?;
            let rest = rest.trim_start();
            let close = rest.find(')').ok_or_else(|| syntax("expected varray limit"))?;
            let limit = rest
                .get(1..close)
                .and_then(|n| n.trim().parse::<u32>().ok())
                .ok_or_else(|| syntax("invalid varray limit"))?;
            let ty = take_keyword(&rest[close + 1..], "OF").ok_or_else(|| syntax("expected OF"))?;
            Shape::Collection {
                element: field_type(ty.trim()),
                limit: Some(limit),
            }
        };

        let schema = schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        if let Some(old) = state.names.insert((schema.clone(), name.clone()), tdo) {
            state.types.remove(&old);
            state.attrs.retain(|_, (owner, _)| *owner != old);
        }
        state.types.insert(
            tdo,
            TypeDef {
                tdo,
                schema,
                name,
                shape,
            },
        );
        Ok(())
    }
}

fn take_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let s = s.trim_start();
    let head = s.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &s[keyword.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '(' => Some(rest),
        _ => None,
    }
}

/// Read an identifier. Quoted identifiers keep their case, others are upper
/// cased.
fn take_ident(s: &str) -> Option<(String, &str)> {
    let s = s.trim_start();
    if let Some(quoted) = s.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some((quoted[..end].to_string(), &quoted[end + 1..]));
    }
    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$' || c == '#'))
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((s[..end].to_ascii_uppercase(), &s[end..]))
}

fn take_qualified(s: &str) -> Option<(Option<String>, String, &str)> {
    let (first, rest) = take_ident(s)?;
    match rest.strip_prefix('.') {
        Some(rest) => {
            let (second, rest) = take_ident(rest)?;
            Some((Some(first), second, rest))
        }
        None => Some((None, first, rest)),
    }
}

/// The content between a leading `(` and its matching `)`.
fn parenthesized(s: &str) -> Option<&str> {
    let s = s.trim_start().strip_prefix('(')?;
    let mut depth = 1;
    for (pos, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..pos]);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (pos, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn field_type(decl: &str) -> FieldType {
    if let Ok(t) = decl.parse::<DbType>() {
        return FieldType::Mapped(t);
    }
    let lower = decl.to_ascii_lowercase();
    let unmapped = [
        ("interval day", 2015),
        ("interval year", 2016),
        ("rowid", 2005),
        ("urowid", 2005),
        ("long raw", 2025),
        ("long", 2024),
        // Opaque types.
        ("sys.anydata", 58),
        ("anydata", 58),
        ("sys.xmltype", 58),
        ("xmltype", 58),
    ];
    if let Some((_, code)) = unmapped.iter().find(|(prefix, _)| lower.starts_with(prefix)) {
        return FieldType::Unmapped(*code);
    }
    match take_qualified(decl) {
        Some((schema, name, _)) => FieldType::Object(NativeTypeRef {
            schema: schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            name,
        }),
        None => FieldType::Unmapped(0),
    }
}

impl Native for MemoryEngine {
    fn object_new(&self, tdo: TypeHandle) -> NativeResult<InstanceHandle> {
        let mut state = self.state();
        state.check(NativeOp::ObjectNew)?;
        state.new_instance(tdo, false)
    }

    fn object_get_ind(&self, instance: InstanceHandle) -> NativeResult<NativeIndicator> {
        let mut state = self.state();
        state.check(NativeOp::ObjectGetInd)?;
        let (handle, separate) = {
            let instance = state.instance(instance)?;
            (instance.indicator, !instance.embedded)
        };
        state
            .indicators
            .entry(handle)
            .or_insert(Indicator { separate });
        Ok(NativeIndicator { handle, separate })
    }

    fn object_free(&self, instance: InstanceHandle, check_error: bool) -> NativeResult<()> {
        let mut state = self.state();
        let result = state.check(NativeOp::ObjectFree).and_then(|_| {
            if state.instance(instance)?.embedded {
                return Err(NativeError::new(
                    codes::INVALID_HANDLE,
                    format!("instance {} is embedded in another", instance.as_raw()),
                ));
            }
            state.free_instance(instance);
            state.stats.object_frees += 1;
            Ok(())
        });
        if check_error { result } else { Ok(()) }
    }

    fn indicator_free(&self, indicator: IndicatorHandle, check_error: bool) -> NativeResult<()> {
        let mut state = self.state();
        let result = state.check(NativeOp::IndicatorFree).and_then(|_| {
            state
                .indicators
                .remove(&indicator)
                .map(|_| ())
                .ok_or_else(|| NativeError::invalid_handle("indicator", indicator.as_raw()))
        });
        if check_error { result } else { Ok(()) }
    }

    fn object_copy(
        &self,
        src: InstanceHandle,
        src_ind: IndicatorHandle,
        dst: InstanceHandle,
        dst_ind: IndicatorHandle,
    ) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::ObjectCopy)?;
        let (src_tdo, body) = {
            let instance = state.instance(src)?;
            if instance.indicator != src_ind {
                return Err(NativeError::invalid_handle("indicator", src_ind.as_raw()));
            }
            (instance.tdo, instance.body.clone())
        };
        let dst_instance = state.instance(dst)?;
        if dst_instance.indicator != dst_ind {
            return Err(NativeError::invalid_handle("indicator", dst_ind.as_raw()));
        }
        if dst_instance.tdo != src_tdo {
            return Err(NativeError::new(
                INCONSISTENT_TYPES,
                "cannot copy between instances of different types",
            ));
        }
        let body = state.copy_body(body)?;
        let old = std::mem::replace(&mut state.instance_mut(dst)?.body, body);
        for field in old.into_fields() {
            state.free_field(field);
        }
        Ok(())
    }

    fn object_get_attr(&self, instance: InstanceHandle, attr: AttrHandle) -> NativeResult<NativeSlot> {
        let mut state = self.state();
        state.check(NativeOp::GetAttr)?;
        let (pos, _) = state.attr_type(instance, attr)?;
        match &state.instance(instance)?.body {
            Body::Object(fields) => Ok(state.load(&fields[pos])),
            Body::Collection { .. } => Err(NativeError::invalid_handle("attribute", attr.as_raw())),
        }
    }

    fn object_set_attr(
        &self,
        instance: InstanceHandle,
        attr: AttrHandle,
        value: &NativeSlot,
    ) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::SetAttr)?;
        let (pos, ty) = state.attr_type(instance, attr)?;
        let old = match &state.instance(instance)?.body {
            Body::Object(fields) => fields[pos].clone(),
            Body::Collection { .. } => {
                return Err(NativeError::invalid_handle("attribute", attr.as_raw()));
            }
        };
        let field = state.store(&ty, value, Some(old))?;
        if let Body::Object(fields) = &mut state.instance_mut(instance)?.body {
            fields[pos] = field;
        }
        Ok(())
    }

    fn coll_append(&self, coll: InstanceHandle, value: &NativeSlot) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::CollAppend)?;
        let (ty, limit) = state.element_type(coll)?;
        let (len, _) = state.collection(coll)?;
        if limit.is_some_and(|limit| len as u32 >= limit) {
            return Err(NativeError::new(
                codes::LIMIT_EXCEEDED,
                "subscript outside of limit",
            ));
        }
        let field = state.store(&ty, value, None)?;
        if let Body::Collection { len, elems } = &mut state.instance_mut(coll)?.body {
            elems.insert(*len, field);
            *len += 1;
        }
        Ok(())
    }

    fn coll_assign_elem(&self, coll: InstanceHandle, index: i32, value: &NativeSlot) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::CollAssignElem)?;
        let (ty, _) = state.element_type(coll)?;
        let (len, elems) = state.collection(coll)?;
        if index < 0 || index >= len {
            return Err(NativeError::new(
                codes::SUBSCRIPT_OUTSIDE_LIMIT,
                format!("index [{index}] must be in the range of [0] to [{len}]"),
            ));
        }
        let old = elems.get(&index).cloned();
        let field = state.store(&ty, value, old)?;
        if let Body::Collection { elems, .. } = &mut state.instance_mut(coll)?.body {
            elems.insert(index, field);
        }
        Ok(())
    }

    fn coll_get_elem(&self, coll: InstanceHandle, index: i32) -> NativeResult<Option<NativeSlot>> {
        let mut state = self.state();
        state.check(NativeOp::CollGetElem)?;
        let (_, elems) = state.collection(coll)?;
        Ok(elems.get(&index).map(|field| state.load(field)))
    }

    fn coll_size(&self, coll: InstanceHandle) -> NativeResult<i32> {
        let state = self.state();
        Ok(state.collection(coll)?.0)
    }

    fn coll_trim(&self, coll: InstanceHandle, count: u32) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::CollTrim)?;
        let (len, _) = state.collection(coll)?;
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        if count > len {
            return Err(NativeError::new(
                codes::TRIM_TOO_LARGE,
                format!("cannot trim {count} elements from a collection of size {len}"),
            ));
        }
        let mut removed = Vec::new();
        if let Body::Collection { len, elems } = &mut state.instance_mut(coll)?.body {
            *len -= count;
            removed = elems.split_off(&*len).into_values().collect();
        }
        for field in removed {
            state.free_field(field);
        }
        Ok(())
    }

    fn table_delete(&self, coll: InstanceHandle, index: i32) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::TableDelete)?;
        state.collection(coll)?;
        let removed = match &mut state.instance_mut(coll)?.body {
            Body::Collection { elems, .. } => elems.remove(&index),
            Body::Object(_) => None,
        };
        let field = removed.ok_or_else(|| element_missing(index))?;
        state.free_field(field);
        Ok(())
    }

    fn table_exists(&self, coll: InstanceHandle, index: i32) -> NativeResult<bool> {
        let state = self.state();
        Ok(state.collection(coll)?.1.contains_key(&index))
    }

    fn table_size(&self, coll: InstanceHandle) -> NativeResult<i32> {
        let state = self.state();
        let (_, elems) = state.collection(coll)?;
        Ok(elems.len() as i32)
    }

    fn table_first(&self, coll: InstanceHandle) -> NativeResult<i32> {
        let state = self.state();
        let (_, elems) = state.collection(coll)?;
        elems.keys().next().copied().ok_or_else(|| element_missing(0))
    }

    fn table_last(&self, coll: InstanceHandle) -> NativeResult<i32> {
        let state = self.state();
        let (_, elems) = state.collection(coll)?;
        elems.keys().next_back().copied().ok_or_else(|| element_missing(0))
    }

    fn table_next(&self, coll: InstanceHandle, index: i32) -> NativeResult<Option<i32>> {
        let state = self.state();
        let (_, elems) = state.collection(coll)?;
        Ok(index
            .checked_add(1)
            .and_then(|from| elems.range(from..).next().map(|(k, _)| *k)))
    }

    fn table_prev(&self, coll: InstanceHandle, index: i32) -> NativeResult<Option<i32>> {
        let state = self.state();
        let (_, elems) = state.collection(coll)?;
        Ok(elems.range(..index).next_back().map(|(k, _)| *k))
    }

    fn string_assign_text(&self, target: Option<StringHandle>, bytes: &[u8]) -> NativeResult<StringHandle> {
        let mut state = self.state();
        state.check(NativeOp::StringAssign)?;
        match target {
            Some(handle) => {
                let buf = state
                    .strings
                    .get_mut(&handle)
                    .ok_or_else(|| NativeError::invalid_handle("string", handle.as_raw()))?;
                *buf = bytes.to_vec();
                Ok(handle)
            }
            None => Ok(state.alloc_string(bytes.to_vec())),
        }
    }

    fn string_bytes(&self, handle: StringHandle) -> NativeResult<Vec<u8>> {
        self.state()
            .strings
            .get(&handle)
            .cloned()
            .ok_or_else(|| NativeError::invalid_handle("string", handle.as_raw()))
    }

    fn string_free(&self, handle: StringHandle) -> NativeResult<()> {
        self.state()
            .strings
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| NativeError::invalid_handle("string", handle.as_raw()))
    }

    fn raw_assign_bytes(&self, target: Option<RawHandle>, bytes: &[u8]) -> NativeResult<RawHandle> {
        let mut state = self.state();
        state.check(NativeOp::RawAssign)?;
        match target {
            Some(handle) => {
                let buf = state
                    .raws
                    .get_mut(&handle)
                    .ok_or_else(|| NativeError::invalid_handle("raw", handle.as_raw()))?;
                *buf = bytes.to_vec();
                Ok(handle)
            }
            None => Ok(state.alloc_raw(bytes.to_vec())),
        }
    }

    fn raw_bytes(&self, handle: RawHandle) -> NativeResult<Vec<u8>> {
        self.state()
            .raws
            .get(&handle)
            .cloned()
            .ok_or_else(|| NativeError::invalid_handle("raw", handle.as_raw()))
    }

    fn raw_free(&self, handle: RawHandle) -> NativeResult<()> {
        self.state()
            .raws
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| NativeError::invalid_handle("raw", handle.as_raw()))
    }

    fn descriptor_alloc(&self, db_type: DbType) -> NativeResult<DescriptorHandle> {
        let mut state = self.state();
        state.check(NativeOp::DescriptorAlloc)?;
        if !db_type.is_timestamp() {
            return Err(NativeError::new(
                INCONSISTENT_TYPES,
                format!("no descriptor for {db_type}"),
            ));
        }
        Ok(state.alloc_descriptor(db_type, None))
    }

    fn descriptor_free(&self, handle: DescriptorHandle, db_type: DbType) -> NativeResult<()> {
        let mut state = self.state();
        match state.descriptors.get(&handle) {
            Some(d) if d.db_type == db_type => {
                state.descriptors.remove(&handle);
                Ok(())
            }
            _ => Err(NativeError::invalid_handle("descriptor", handle.as_raw())),
        }
    }

    fn timestamp_set(&self, handle: DescriptorHandle, value: OffsetDateTime) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::TimestampSet)?;
        let descriptor = state
            .descriptors
            .get_mut(&handle)
            .ok_or_else(|| NativeError::invalid_handle("descriptor", handle.as_raw()))?;
        descriptor.value = Some(value);
        Ok(())
    }

    fn timestamp_get(&self, handle: DescriptorHandle) -> NativeResult<OffsetDateTime> {
        let state = self.state();
        let descriptor = state
            .descriptors
            .get(&handle)
            .ok_or_else(|| NativeError::invalid_handle("descriptor", handle.as_raw()))?;
        descriptor.value.ok_or_else(|| {
            NativeError::new(
                codes::INVALID_HANDLE,
                format!("descriptor {} holds no value", handle.as_raw()),
            )
        })
    }

    fn lob_alloc(&self, kind: LobKind) -> NativeResult<LocatorHandle> {
        let mut state = self.state();
        state.check(NativeOp::LobAlloc)?;
        Ok(state.alloc_locator(kind, Arc::default()))
    }

    fn lob_free(&self, handle: LocatorHandle) -> NativeResult<()> {
        self.state()
            .locators
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| NativeError::invalid_handle("locator", handle.as_raw()))
    }

    fn lob_locator_assign(&self, src: LocatorHandle, dst: LocatorHandle) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::LobLocatorAssign)?;
        let (kind, content) = state
            .locators
            .get(&src)
            .map(|l| (l.kind, l.content.clone()))
            .ok_or_else(|| NativeError::invalid_handle("locator", src.as_raw()))?;
        let target = state
            .locators
            .get_mut(&dst)
            .ok_or_else(|| NativeError::invalid_handle("locator", dst.as_raw()))?;
        target.kind = kind;
        target.content = content;
        Ok(())
    }

    fn lob_write(&self, handle: LocatorHandle, bytes: &[u8]) -> NativeResult<()> {
        let mut state = self.state();
        state.check(NativeOp::LobWrite)?;
        let locator = state
            .locators
            .get(&handle)
            .ok_or_else(|| NativeError::invalid_handle("locator", handle.as_raw()))?;
        if locator.kind == LobKind::Bfile {
            return Err(NativeError::new(FILE_READ_ONLY, "BFILE is read only"));
        }
        *lock_content(&locator.content) = bytes.to_vec();
        Ok(())
    }

    fn lob_read(&self, handle: LocatorHandle) -> NativeResult<Vec<u8>> {
        let state = self.state();
        let locator = state
            .locators
            .get(&handle)
            .ok_or_else(|| NativeError::invalid_handle("locator", handle.as_raw()))?;
        Ok(lock_content(&locator.content).clone())
    }

    fn describe_type(&self, schema: Option<&str>, name: &str) -> NativeResult<NativeTypeInfo> {
        let mut state = self.state();
        state.check(NativeOp::DescribeType)?;
        let r = NativeTypeRef {
            schema: schema.unwrap_or(DEFAULT_SCHEMA).to_string(),
            name: name.to_string(),
        };
        let def = state.type_def(state.resolve(&r)?)?;
        let (is_collection, element, attributes) = match &def.shape {
            Shape::Object(attrs) => (
                false,
                None,
                attrs
                    .iter()
                    .map(|a| NativeAttrInfo {
                        handle: a.handle,
                        name: a.name.clone(),
                        type_info: a.ty.type_info(),
                    })
                    .collect(),
            ),
            Shape::Collection { element, .. } => (true, Some(element.type_info()), Vec::new()),
        };
        Ok(NativeTypeInfo {
            tdo: def.tdo,
            schema: def.schema.clone(),
            name: def.name.clone(),
            package_name: None,
            is_collection,
            element,
            attributes,
        })
    }
}

//! Entity registry
//!
//! The [`Mapping`] is the single place that turns ids and names into entity
//! handles and fetches the attribute records behind them. Every handle is
//! memoized for the lifetime of the registry, every record is fetched through
//! the cache, and relations between entities are built lazily and kept in
//! memory once resolved.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::{pools, ttl, CacheStore};
use crate::entities::{Channel, Device, Function, Parameter, Program, Room, Variable};
use crate::error::{Error, Result, TransportError};
use crate::ids::{
    normalize_name, ChannelId, DeviceId, EntityKind, FunctionId, ParameterId, ProgramId, RoomId,
    VariableId,
};
use crate::records::{
    parse_link_targets, parse_name_index, ChannelRecord, DeviceRecord, FunctionRecord,
    ParameterRecord, ProgramRecord, RoomRecord, StateRecord, VariableRecord,
};
use crate::transport::{Transport, PV};
use crate::translation::Translator;

/// Cache key of the name index within each `*Names` pool.
const NAMES_KEY: &str = "namesToIds";

/// An ordered, re-iterable set of handles keyed by id.
///
/// Enumerations collect every handle up front. Handles are memoized `Rc`s
/// that only hold an id, so building the map fetches nothing beyond the
/// name index; per-entity data is read when an accessor is called.
pub type Entities<K, H> = IndexMap<K, Rc<H>>;

type Memo<K, H> = RefCell<HashMap<K, Rc<H>>>;
type Relation<K, RK, H> = RefCell<HashMap<K, Entities<RK, H>>>;
type NameIndex<I> = RefCell<Option<IndexMap<String, I>>>;

/// Resource collections and the link relation their members carry.
mod resource {
    pub const DEVICE: &str = "device";
    pub const ROOM: &str = "room";
    pub const FUNCTION: &str = "function";
    pub const PROGRAM: &str = "program";
    pub const SYSVAR: &str = "sysvar";
}

pub struct Mapping {
    this: Weak<Mapping>,
    transport: Box<dyn Transport>,
    cache: CacheStore,
    translator: Translator,

    devices: Memo<DeviceId, Device>,
    channels: Memo<ChannelId, Channel>,
    parameters: Memo<ParameterId, Parameter>,
    rooms: Memo<RoomId, Room>,
    functions: Memo<FunctionId, Function>,
    programs: Memo<ProgramId, Program>,
    variables: Memo<VariableId, Variable>,

    devices_to_channels: Relation<DeviceId, u32, Channel>,
    channels_to_parameters: Relation<ChannelId, String, Parameter>,
    rooms_to_channels: Relation<RoomId, ChannelId, Channel>,
    channels_to_rooms: Relation<ChannelId, RoomId, Room>,
    functions_to_channels: Relation<FunctionId, ChannelId, Channel>,
    channels_to_functions: Relation<ChannelId, FunctionId, Function>,

    device_names: NameIndex<DeviceId>,
    channel_names: NameIndex<ChannelId>,
    room_names: NameIndex<RoomId>,
    function_names: NameIndex<FunctionId>,
    program_names: NameIndex<ProgramId>,
    variable_names: NameIndex<VariableId>,
}

impl Mapping {
    pub fn new(transport: Box<dyn Transport>, cache: CacheStore, translator: Translator) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            transport,
            cache,
            translator,
            devices: RefCell::default(),
            channels: RefCell::default(),
            parameters: RefCell::default(),
            rooms: RefCell::default(),
            functions: RefCell::default(),
            programs: RefCell::default(),
            variables: RefCell::default(),
            devices_to_channels: RefCell::default(),
            channels_to_parameters: RefCell::default(),
            rooms_to_channels: RefCell::default(),
            channels_to_rooms: RefCell::default(),
            functions_to_channels: RefCell::default(),
            channels_to_functions: RefCell::default(),
            device_names: RefCell::default(),
            channel_names: RefCell::default(),
            room_names: RefCell::default(),
            function_names: RefCell::default(),
            program_names: RefCell::default(),
            variable_names: RefCell::default(),
        })
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    // --- Rooms ---

    /// The room with the given id. With `check_existence`, the room's record
    /// is fetched first so unknown ids fail here rather than on first use.
    pub fn room(&self, id: RoomId, check_existence: bool) -> Result<Rc<Room>> {
        memoize(&self.rooms, id, || {
            if check_existence {
                verify(EntityKind::Room, id, self.room_data(id))?;
            }
            Ok(Room::new(self.this.clone(), id))
        })
    }

    pub fn rooms(&self) -> Result<Entities<RoomId, Room>> {
        self.room_names()?
            .into_values()
            .map(|id| Ok((id, self.room(id, false)?)))
            .collect()
    }

    /// Look a room up by name, falling back to its untranslated key.
    pub fn room_by_name(&self, name: &str) -> Result<Rc<Room>> {
        let id = self.resolve_translated(EntityKind::Room, &self.room_names()?, name)?;
        self.room(id, false)
    }

    pub fn room_data(&self, id: RoomId) -> Result<RoomRecord> {
        let key = id.to_string();
        self.cached(pools::ROOM_DATA, &key, &[resource::ROOM, &key], RoomRecord::parse)
    }

    pub fn channels_of_room(&self, id: RoomId) -> Result<Entities<ChannelId, Channel>> {
        relation(&self.rooms_to_channels, &id, || {
            self.room_data(id)?
                .channels
                .into_iter()
                .map(|channel| Ok((channel.clone(), self.channel(&channel, false)?)))
                .collect()
        })
    }

    pub fn rooms_of_channel(&self, id: &ChannelId) -> Result<Entities<RoomId, Room>> {
        relation(&self.channels_to_rooms, id, || {
            self.channel_data(id)?
                .rooms
                .into_iter()
                .map(|room| Ok((room, self.room(room, false)?)))
                .collect()
        })
    }

    fn room_names(&self) -> Result<IndexMap<String, RoomId>> {
        self.name_index(&self.room_names, pools::ROOM_NAMES, |this| {
            this.fetch_collection_names(resource::ROOM)
        })
    }

    // --- Devices ---

    pub fn device(&self, id: &str, check_existence: bool) -> Result<Rc<Device>> {
        memoize(&self.devices, id.to_string(), || {
            if check_existence {
                verify(EntityKind::Device, id, self.device_data(id))?;
            }
            Ok(Device::new(self.this.clone(), id.to_string()))
        })
    }

    pub fn devices(&self) -> Result<Entities<DeviceId, Device>> {
        self.device_names()?
            .into_values()
            .map(|id| {
                let device = self.device(&id, false)?;
                Ok((id, device))
            })
            .collect()
    }

    pub fn device_by_name(&self, name: &str) -> Result<Rc<Device>> {
        let id = resolve(EntityKind::Device, &self.device_names()?, name)?;
        self.device(&id, false)
    }

    pub fn device_data(&self, id: &str) -> Result<DeviceRecord> {
        self.cached(pools::DEVICE_DATA, id, &[resource::DEVICE, id], |value| {
            DeviceRecord::parse(id, value)
        })
    }

    /// The channels of a device, keyed by channel number in CCU order.
    pub fn channels_of_device(&self, id: &str) -> Result<Entities<u32, Channel>> {
        relation(&self.devices_to_channels, &id.to_string(), || {
            self.device_data(id)?
                .channels
                .into_iter()
                .map(|link| Ok((link.number, self.channel(&link.id, false)?)))
                .collect()
        })
    }

    fn device_names(&self) -> Result<IndexMap<String, DeviceId>> {
        self.name_index(&self.device_names, pools::DEVICE_NAMES, |this| {
            this.fetch_collection_names(resource::DEVICE)
        })
    }

    // --- Channels ---

    pub fn channel(&self, id: &ChannelId, check_existence: bool) -> Result<Rc<Channel>> {
        memoize(&self.channels, id.clone(), || {
            if check_existence {
                verify(EntityKind::Channel, id, self.channel_data(id))?;
            }
            let device = self.device(id.device(), false)?;
            Ok(Channel::new(self.this.clone(), id.clone(), device))
        })
    }

    pub fn channel_by_name(&self, name: &str) -> Result<Rc<Channel>> {
        let id = resolve(EntityKind::Channel, &self.channel_names()?, name)?;
        self.channel(&id, false)
    }

    pub fn channel_data(&self, id: &ChannelId) -> Result<ChannelRecord> {
        let key = id.to_string();
        let number = id.number().to_string();
        self.cached(
            pools::CHANNEL_DATA,
            &key,
            &[resource::DEVICE, id.device(), &number],
            ChannelRecord::parse,
        )
    }

    /// Channels have no collection of their own, so their names are
    /// gathered by walking every device.
    fn channel_names(&self) -> Result<IndexMap<String, ChannelId>> {
        self.name_index(&self.channel_names, pools::CHANNEL_NAMES, |this| {
            let path = [resource::DEVICE];
            let devices = parse_link_targets(this.transport.fetch(&path)?, resource::DEVICE)
                .map_err(|source| this.malformed(&path, source))?;

            let mut index = IndexMap::new();
            for device in devices {
                for channel in this.device_data(&device)?.channels {
                    index.insert(normalize_name(&channel.name), channel.id);
                }
            }
            Ok(index)
        })
    }

    // --- Parameters ---

    pub fn parameter(&self, id: &ParameterId, check_existence: bool) -> Result<Rc<Parameter>> {
        memoize(&self.parameters, id.clone(), || {
            if check_existence {
                let data = verify(EntityKind::Parameter, id, self.channel_data(id.channel()))?;
                if !data.has_parameter(id.name()) {
                    return Err(Error::not_found(EntityKind::Parameter, id.to_string()));
                }
            }
            let channel = self.channel(id.channel(), false)?;
            Ok(Parameter::new(self.this.clone(), id.clone(), channel))
        })
    }

    /// The parameters of a channel, keyed by name.
    pub fn parameters_of_channel(&self, id: &ChannelId) -> Result<Entities<String, Parameter>> {
        relation(&self.channels_to_parameters, id, || {
            self.channel_data(id)?
                .parameters
                .into_iter()
                .map(|name| {
                    let parameter = self.parameter(&id.parameter(name.clone()), false)?;
                    Ok((name, parameter))
                })
                .collect()
        })
    }

    pub fn parameter_data(&self, id: &ParameterId) -> Result<ParameterRecord> {
        let key = id.to_string();
        let number = id.channel().number().to_string();
        self.cached(
            pools::PARAMETER_DATA,
            &key,
            &[resource::DEVICE, id.channel().device(), &number, id.name()],
            ParameterRecord::parse,
        )
    }

    pub(crate) fn parameter_state(&self, id: &ParameterId, force_reload: bool) -> Result<StateRecord> {
        let number = id.channel().number().to_string();
        self.state(
            pools::PARAMETERS,
            &id.to_string(),
            &[resource::DEVICE, id.channel().device(), &number, id.name(), PV],
            force_reload,
        )
    }

    pub(crate) fn set_parameter_state(&self, id: &ParameterId, value: Value) -> Result<bool> {
        let number = id.channel().number().to_string();
        self.write_state(
            pools::PARAMETERS,
            &id.to_string(),
            &[resource::DEVICE, id.channel().device(), &number, id.name(), PV],
            value,
        )
    }

    // --- Functions ---

    pub fn function(&self, id: FunctionId, check_existence: bool) -> Result<Rc<Function>> {
        memoize(&self.functions, id, || {
            if check_existence {
                verify(EntityKind::Function, id, self.function_data(id))?;
            }
            Ok(Function::new(self.this.clone(), id))
        })
    }

    pub fn functions(&self) -> Result<Entities<FunctionId, Function>> {
        self.function_names()?
            .into_values()
            .map(|id| Ok((id, self.function(id, false)?)))
            .collect()
    }

    /// Look a function up by name, falling back to its untranslated key.
    pub fn function_by_name(&self, name: &str) -> Result<Rc<Function>> {
        let id = self.resolve_translated(EntityKind::Function, &self.function_names()?, name)?;
        self.function(id, false)
    }

    pub fn function_data(&self, id: FunctionId) -> Result<FunctionRecord> {
        let key = id.to_string();
        self.cached(
            pools::FUNCTION_DATA,
            &key,
            &[resource::FUNCTION, &key],
            FunctionRecord::parse,
        )
    }

    pub fn channels_of_function(&self, id: FunctionId) -> Result<Entities<ChannelId, Channel>> {
        relation(&self.functions_to_channels, &id, || {
            self.function_data(id)?
                .channels
                .into_iter()
                .map(|channel| Ok((channel.clone(), self.channel(&channel, false)?)))
                .collect()
        })
    }

    pub fn functions_of_channel(&self, id: &ChannelId) -> Result<Entities<FunctionId, Function>> {
        relation(&self.channels_to_functions, id, || {
            self.channel_data(id)?
                .functions
                .into_iter()
                .map(|function| Ok((function, self.function(function, false)?)))
                .collect()
        })
    }

    fn function_names(&self) -> Result<IndexMap<String, FunctionId>> {
        self.name_index(&self.function_names, pools::FUNCTION_NAMES, |this| {
            this.fetch_collection_names(resource::FUNCTION)
        })
    }

    // --- Programs ---

    pub fn program(&self, id: ProgramId, check_existence: bool) -> Result<Rc<Program>> {
        memoize(&self.programs, id, || {
            if check_existence {
                verify(EntityKind::Program, id, self.program_data(id))?;
            }
            Ok(Program::new(self.this.clone(), id))
        })
    }

    pub fn programs(&self) -> Result<Entities<ProgramId, Program>> {
        self.program_names()?
            .into_values()
            .map(|id| Ok((id, self.program(id, false)?)))
            .collect()
    }

    pub fn program_by_name(&self, name: &str) -> Result<Rc<Program>> {
        let id = resolve(EntityKind::Program, &self.program_names()?, name)?;
        self.program(id, false)
    }

    pub fn program_data(&self, id: ProgramId) -> Result<ProgramRecord> {
        let key = id.to_string();
        self.cached(
            pools::PROGRAM_DATA,
            &key,
            &[resource::PROGRAM, &key],
            ProgramRecord::parse,
        )
    }

    /// Last execution state of a program, always read live.
    pub(crate) fn program_state(&self, id: ProgramId) -> Result<StateRecord> {
        let key = id.to_string();
        let path = [resource::PROGRAM, key.as_str(), PV];
        let value = self.transport.fetch(&path)?;
        StateRecord::parse(value).map_err(|source| self.malformed(&path, source))
    }

    pub(crate) fn execute_program(&self, id: ProgramId) -> Result<bool> {
        let key = id.to_string();
        Ok(self
            .transport
            .send(&[resource::PROGRAM, &key, PV], &json!({ "v": true }))?)
    }

    fn program_names(&self) -> Result<IndexMap<String, ProgramId>> {
        self.name_index(&self.program_names, pools::PROGRAM_NAMES, |this| {
            this.fetch_collection_names(resource::PROGRAM)
        })
    }

    // --- System variables ---

    pub fn variable(&self, id: VariableId, check_existence: bool) -> Result<Rc<Variable>> {
        memoize(&self.variables, id, || {
            if check_existence {
                verify(EntityKind::Variable, id, self.variable_data(id))?;
            }
            Ok(Variable::new(self.this.clone(), id))
        })
    }

    pub fn variables(&self) -> Result<Entities<VariableId, Variable>> {
        self.variable_names()?
            .into_values()
            .map(|id| Ok((id, self.variable(id, false)?)))
            .collect()
    }

    pub fn variable_by_name(&self, name: &str) -> Result<Rc<Variable>> {
        let id = resolve(EntityKind::Variable, &self.variable_names()?, name)?;
        self.variable(id, false)
    }

    pub fn variable_data(&self, id: VariableId) -> Result<VariableRecord> {
        let key = id.to_string();
        self.cached(
            pools::VARIABLE_DATA,
            &key,
            &[resource::SYSVAR, &key],
            VariableRecord::parse,
        )
    }

    pub(crate) fn variable_state(&self, id: VariableId, force_reload: bool) -> Result<StateRecord> {
        let key = id.to_string();
        self.state(pools::VARIABLES, &key, &[resource::SYSVAR, &key, PV], force_reload)
    }

    pub(crate) fn set_variable_state(&self, id: VariableId, value: Value) -> Result<bool> {
        let key = id.to_string();
        self.write_state(pools::VARIABLES, &key, &[resource::SYSVAR, &key, PV], value)
    }

    fn variable_names(&self) -> Result<IndexMap<String, VariableId>> {
        self.name_index(&self.variable_names, pools::VARIABLE_NAMES, |this| {
            this.fetch_collection_names(resource::SYSVAR)
        })
    }

    // --- Fetching and caching ---

    fn malformed(&self, path: &[&str], source: serde_json::Error) -> Error {
        TransportError::Malformed {
            url: self.transport.url(path),
            source,
        }
        .into()
    }

    /// Cache-first fetch of a structural record.
    fn cached<T, F>(&self, pool: &str, key: &str, path: &[&str], parse: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Value) -> serde_json::Result<T>,
    {
        let pool = self.cache.pool(pool)?;
        if let Some(record) = pool.get(key)? {
            return Ok(record);
        }

        let record = parse(self.transport.fetch(path)?).map_err(|source| self.malformed(path, source))?;
        pool.save_deferred(key, &record, ttl::STRUCTURE)?;
        Ok(record)
    }

    /// Runtime state, from the short-lived cache unless a reload is forced.
    fn state(&self, pool: &str, key: &str, path: &[&str], force_reload: bool) -> Result<StateRecord> {
        let pool = self.cache.pool(pool)?;
        if !force_reload {
            if let Some(state) = pool.get(key)? {
                return Ok(state);
            }
        }

        let state = StateRecord::parse(self.transport.fetch(path)?)
            .map_err(|source| self.malformed(path, source))?;
        pool.save_deferred(key, &state, ttl::STATE)?;
        Ok(state)
    }

    /// Write a new value; the cache only learns about it once the CCU
    /// confirmed the write.
    fn write_state(&self, pool: &str, key: &str, path: &[&str], value: Value) -> Result<bool> {
        let confirmed = self.transport.send(path, &json!({ "v": value }))?;
        if confirmed {
            self.cache
                .pool(pool)?
                .save_deferred(key, &StateRecord::now(value), ttl::STATE)?;
        } else {
            log::debug!("CCU did not confirm write to {}", self.transport.url(path));
        }
        Ok(confirmed)
    }

    /// Resolve the name index held in `slot`: from memory, then the cache,
    /// then the CCU. Fetched indexes are persisted immediately.
    fn name_index<I, F>(&self, slot: &NameIndex<I>, pool: &str, fetch: F) -> Result<IndexMap<String, I>>
    where
        I: Clone + Serialize + DeserializeOwned,
        F: FnOnce(&Self) -> Result<IndexMap<String, I>>,
    {
        if let Some(index) = slot.borrow().as_ref() {
            log::trace!("name index {} served from memory", pool);
            return Ok(index.clone());
        }

        let cache = self.cache.pool(pool)?;
        let index = match cache.get(NAMES_KEY)? {
            Some(index) => index,
            None => {
                let index = fetch(self)?;
                cache.save(NAMES_KEY, &index, ttl::NAMES)?;
                index
            }
        };

        *slot.borrow_mut() = Some(index.clone());
        Ok(index)
    }

    fn fetch_collection_names<I: FromStr>(&self, collection: &str) -> Result<IndexMap<String, I>> {
        let path = [collection];
        parse_name_index(self.transport.fetch(&path)?, collection)
            .map_err(|source| self.malformed(&path, source))
    }

    fn resolve_translated<I: Clone>(
        &self,
        kind: EntityKind,
        index: &IndexMap<String, I>,
        name: &str,
    ) -> Result<I> {
        let normalized = normalize_name(name);
        if let Some(id) = index.get(&normalized) {
            return Ok(id.clone());
        }
        let key = self.translator.inverse_translate(&normalized);
        index
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found(kind, normalized))
    }
}

/// Turn a 404 during an existence check into a not-found error for `id`.
fn verify<T>(kind: EntityKind, id: impl ToString, fetched: Result<T>) -> Result<T> {
    match fetched {
        Err(Error::Transport(TransportError::Status { code: 404, .. })) => {
            Err(Error::not_found(kind, id.to_string()))
        }
        other => other,
    }
}

fn resolve<I: Clone>(kind: EntityKind, index: &IndexMap<String, I>, name: &str) -> Result<I> {
    let normalized = normalize_name(name);
    index
        .get(&normalized)
        .cloned()
        .ok_or_else(|| Error::not_found(kind, normalized))
}

/// Return the memoized handle for `key`, building it on first request.
fn memoize<K, H, F>(memo: &Memo<K, H>, key: K, build: F) -> Result<Rc<H>>
where
    K: Eq + Hash,
    F: FnOnce() -> Result<H>,
{
    if let Some(handle) = memo.borrow().get(&key) {
        return Ok(Rc::clone(handle));
    }

    let handle = Rc::new(build()?);
    Ok(Rc::clone(memo.borrow_mut().entry(key).or_insert(handle)))
}

/// Return the related handles of `key`, resolving them on first request.
fn relation<K, RK, H, F>(map: &Relation<K, RK, H>, key: &K, build: F) -> Result<Entities<RK, H>>
where
    K: Eq + Hash + Clone,
    RK: Clone,
    F: FnOnce() -> Result<Entities<RK, H>>,
{
    if let Some(related) = map.borrow().get(key) {
        return Ok(related.clone());
    }

    let related = build()?;
    map.borrow_mut().insert(key.clone(), related.clone());
    Ok(related)
}

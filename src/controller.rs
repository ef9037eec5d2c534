//! Session facade
//!
//! [`Ccu`] wires a transport, a cache store and a translator into one
//! [`Mapping`] and exposes the lookups most callers need. Deferred cache
//! writes are flushed by [`Ccu::close`], or best-effort when the session is
//! dropped.

use std::rc::Rc;

use crate::cache::CacheStore;
use crate::configuration::Configuration;
use crate::entities::{Channel, Device, Function, Parameter, Program, Room, Variable};
use crate::error::{Error, Result};
use crate::ids::{ChannelId, DeviceId, FunctionId, ParameterId, ProgramId, RoomId, VariableId};
use crate::mapping::{Entities, Mapping};
use crate::translation::Translator;
use crate::transport::{HttpTransport, Transport};

pub struct Ccu {
    mapping: Rc<Mapping>,
}

impl Ccu {
    /// Open a session over HTTP with the cache and language from `config`.
    pub fn new(config: Configuration) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        let cache = CacheStore::from_config(&config)?;
        log::debug!(
            "opening CCU session for {} (cache: {})",
            transport.base_url(),
            cache
                .dir()
                .map_or_else(|| "in memory".to_string(), |dir| dir.display().to_string())
        );
        Ok(Self::with_parts(
            transport,
            cache,
            Translator::new(config.language),
        ))
    }

    pub fn with_parts(
        transport: impl Transport + 'static,
        cache: CacheStore,
        translator: Translator,
    ) -> Self {
        Self {
            mapping: Mapping::new(Box::new(transport), cache, translator),
        }
    }

    /// The underlying registry, for relation and raw data access.
    pub fn mapping(&self) -> &Rc<Mapping> {
        &self.mapping
    }

    pub fn devices(&self) -> Result<Entities<DeviceId, Device>> {
        self.mapping.devices()
    }

    pub fn device(&self, id: &str) -> Result<Rc<Device>> {
        self.mapping.device(id, true)
    }

    pub fn device_by_name(&self, name: &str) -> Result<Rc<Device>> {
        self.mapping.device_by_name(name)
    }

    /// A channel by its `DEVICE/NUMBER` id.
    pub fn channel(&self, id: &str) -> Result<Rc<Channel>> {
        let id: ChannelId = id.parse()?;
        self.mapping.channel(&id, true)
    }

    pub fn channel_by_name(&self, name: &str) -> Result<Rc<Channel>> {
        self.mapping.channel_by_name(name)
    }

    /// A parameter by its `DEVICE/NUMBER/NAME` id.
    pub fn parameter(&self, id: &str) -> Result<Rc<Parameter>> {
        let id: ParameterId = id.parse()?;
        self.mapping.parameter(&id, true)
    }

    pub fn rooms(&self) -> Result<Entities<RoomId, Room>> {
        self.mapping.rooms()
    }

    pub fn room(&self, id: RoomId) -> Result<Rc<Room>> {
        self.mapping.room(id, true)
    }

    pub fn room_by_name(&self, name: &str) -> Result<Rc<Room>> {
        self.mapping.room_by_name(name)
    }

    pub fn functions(&self) -> Result<Entities<FunctionId, Function>> {
        self.mapping.functions()
    }

    pub fn function(&self, id: FunctionId) -> Result<Rc<Function>> {
        self.mapping.function(id, true)
    }

    pub fn function_by_name(&self, name: &str) -> Result<Rc<Function>> {
        self.mapping.function_by_name(name)
    }

    pub fn programs(&self) -> Result<Entities<ProgramId, Program>> {
        self.mapping.programs()
    }

    pub fn program(&self, id: ProgramId) -> Result<Rc<Program>> {
        self.mapping.program(id, true)
    }

    pub fn program_by_name(&self, name: &str) -> Result<Rc<Program>> {
        self.mapping.program_by_name(name)
    }

    pub fn variables(&self) -> Result<Entities<VariableId, Variable>> {
        self.mapping.variables()
    }

    pub fn variable(&self, id: VariableId) -> Result<Rc<Variable>> {
        self.mapping.variable(id, true)
    }

    pub fn variable_by_name(&self, name: &str) -> Result<Rc<Variable>> {
        self.mapping.variable_by_name(name)
    }

    /// Flush deferred cache writes without ending the session.
    pub fn commit(&self) -> Result<()> {
        self.mapping.cache().commit_all().map_err(Error::from)
    }

    /// End the session, flushing deferred cache writes.
    pub fn close(self) -> Result<()> {
        self.commit()
    }
}

impl Drop for Ccu {
    fn drop(&mut self) {
        if self.mapping.cache().pending() == 0 {
            return;
        }
        if let Err(err) = self.mapping.cache().commit_all() {
            log::warn!("failed to flush CCU cache on shutdown: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::pools;
    use crate::ids::EntityKind;
    use crate::testing::{FakeCcu, DEVICE};
    use tempfile::TempDir;

    fn fixture_ccu(cache: CacheStore) -> (Ccu, FakeCcu) {
        let fake = FakeCcu::fixture();
        let ccu = Ccu::with_parts(fake.clone(), cache, Translator::default());
        (ccu, fake)
    }

    #[test]
    fn test_lookup_by_id_checks_existence() {
        let (ccu, _fake) = fixture_ccu(CacheStore::in_memory());

        assert_eq!(ccu.room(1234).unwrap().id(), 1234);
        assert!(ccu.room(1).unwrap_err().is_not_found());
        assert!(ccu.program(8).unwrap_err().is_not_found());
        assert!(ccu.variable(42).is_ok());
        assert!(ccu.function(3).is_ok());
    }

    #[test]
    fn test_channel_and_parameter_by_string_id() {
        let (ccu, _fake) = fixture_ccu(CacheStore::in_memory());

        let channel = ccu.channel(&format!("{DEVICE}/1")).unwrap();
        assert_eq!(channel.device().id(), DEVICE);

        let parameter = ccu.parameter(&format!("{DEVICE}/1/STATE")).unwrap();
        assert!(Rc::ptr_eq(parameter.channel(), &channel));

        let err = ccu.channel("no-separator").unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: EntityKind::Channel, .. }));
    }

    #[test]
    fn test_close_persists_deferred_writes() {
        let dir = TempDir::new().unwrap();
        let (ccu, fake) = fixture_ccu(CacheStore::persistent(dir.path(), "https://ccu.test"));

        ccu.device(DEVICE).unwrap().name().unwrap();
        assert_eq!(ccu.mapping().cache().pending(), 1);
        ccu.close().unwrap();

        // A fresh session over the same directory is served from disk.
        let ccu = Ccu::with_parts(
            fake.clone(),
            CacheStore::persistent(dir.path(), "https://ccu.test"),
            Translator::default(),
        );
        assert_eq!(ccu.device(DEVICE).unwrap().name().unwrap(), "Kitchen switch");
        assert_eq!(fake.fetches(&format!("device/{DEVICE}")), 1);
    }

    #[test]
    fn test_drop_flushes_cache() {
        let dir = TempDir::new().unwrap();
        {
            let (ccu, _fake) = fixture_ccu(CacheStore::persistent(dir.path(), "https://ccu.test"));
            ccu.room(1235).unwrap();
        }

        let cache = CacheStore::persistent(dir.path(), "https://ccu.test");
        assert!(cache.pool(pools::ROOM_DATA).unwrap().has("1235").unwrap());
    }

    #[test]
    fn test_name_lookups_through_facade() {
        let (ccu, _fake) = fixture_ccu(CacheStore::in_memory());

        assert_eq!(ccu.room_by_name("kitchen").unwrap().id(), 1234);
        assert_eq!(ccu.function_by_name("Heating").unwrap().id(), 3);
        assert_eq!(ccu.variable_by_name("presence").unwrap().id(), 42);
        assert_eq!(ccu.channel_by_name("Kitchen Light").unwrap().number(), 1);
        assert_eq!(ccu.programs().unwrap().len(), 1);
        assert_eq!(ccu.rooms().unwrap().len(), 2);
    }
}

//! Entity handles
//!
//! Handles are lightweight, memoized views onto CCU entities. They store
//! only their id (and parent handle where one exists) plus a weak reference
//! back to the [`Mapping`] that minted them; every attribute read goes
//! through the registry and its cache.

use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::ids::{ChannelId, DeviceId, FunctionId, ParameterId, ProgramId, RoomId, VariableId};
use crate::mapping::{Entities, Mapping};

fn upgrade(mapping: &Weak<Mapping>) -> Result<Rc<Mapping>> {
    mapping.upgrade().ok_or(Error::SessionClosed)
}

#[derive(Debug)]
pub struct Room {
    mapping: Weak<Mapping>,
    id: RoomId,
}

impl Room {
    pub(crate) fn new(mapping: Weak<Mapping>, id: RoomId) -> Self {
        Self { mapping, id }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Display name, translated when the CCU uses a built-in room key.
    pub fn name(&self) -> Result<String> {
        let mapping = upgrade(&self.mapping)?;
        let name = mapping.room_data(self.id)?.name;
        Ok(mapping.translator().translate(&name))
    }

    pub fn description(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.room_data(self.id)?.description)
    }

    pub fn channels(&self) -> Result<Entities<ChannelId, Channel>> {
        upgrade(&self.mapping)?.channels_of_room(self.id)
    }
}

#[derive(Debug)]
pub struct Device {
    mapping: Weak<Mapping>,
    id: DeviceId,
}

impl Device {
    pub(crate) fn new(mapping: Weak<Mapping>, id: DeviceId) -> Self {
        Self { mapping, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.device_data(&self.id)?.name)
    }

    /// Hardware type, e.g. `HmIP-BSM`
    pub fn device_type(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.device_data(&self.id)?.device_type)
    }

    pub fn firmware(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.device_data(&self.id)?.firmware)
    }

    /// Whether AES signing is active for this device.
    pub fn is_secured(&self) -> Result<bool> {
        Ok(upgrade(&self.mapping)?.device_data(&self.id)?.secured)
    }

    pub fn channels(&self) -> Result<Entities<u32, Channel>> {
        upgrade(&self.mapping)?.channels_of_device(&self.id)
    }

    pub fn channel(&self, number: u32) -> Result<Rc<Channel>> {
        upgrade(&self.mapping)?.channel(&ChannelId::new(self.id.as_str(), number), true)
    }
}

#[derive(Debug)]
pub struct Channel {
    mapping: Weak<Mapping>,
    id: ChannelId,
    device: Rc<Device>,
}

impl Channel {
    pub(crate) fn new(mapping: Weak<Mapping>, id: ChannelId, device: Rc<Device>) -> Self {
        Self {
            mapping,
            id,
            device,
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn number(&self) -> u32 {
        self.id.number()
    }

    pub fn device(&self) -> &Rc<Device> {
        &self.device
    }

    pub fn name(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.channel_data(&self.id)?.name)
    }

    pub fn rooms(&self) -> Result<Entities<RoomId, Room>> {
        upgrade(&self.mapping)?.rooms_of_channel(&self.id)
    }

    pub fn functions(&self) -> Result<Entities<FunctionId, Function>> {
        upgrade(&self.mapping)?.functions_of_channel(&self.id)
    }

    pub fn parameters(&self) -> Result<Entities<String, Parameter>> {
        upgrade(&self.mapping)?.parameters_of_channel(&self.id)
    }

    pub fn parameter(&self, name: &str) -> Result<Rc<Parameter>> {
        upgrade(&self.mapping)?.parameter(&self.id.parameter(name), true)
    }
}

/// A datapoint of a channel, such as `STATE` or `ACTUAL_TEMPERATURE`.
#[derive(Debug)]
pub struct Parameter {
    mapping: Weak<Mapping>,
    id: ParameterId,
    channel: Rc<Channel>,
}

impl Parameter {
    pub(crate) fn new(mapping: Weak<Mapping>, id: ParameterId, channel: Rc<Channel>) -> Self {
        Self {
            mapping,
            id,
            channel,
        }
    }

    pub fn id(&self) -> &ParameterId {
        &self.id
    }

    /// The parameter's key within its channel.
    pub fn name(&self) -> &str {
        self.id.name()
    }

    pub fn channel(&self) -> &Rc<Channel> {
        &self.channel
    }

    /// Human-readable title as reported by the CCU.
    pub fn title(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.parameter_data(&self.id)?.name)
    }

    pub fn data_type(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.parameter_data(&self.id)?.data_type)
    }

    pub fn unit(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.parameter_data(&self.id)?.unit)
    }

    /// Current value. Unless `force_reload` is false and a cached value is
    /// still fresh, the value is read live from the CCU.
    pub fn state(&self, force_reload: bool) -> Result<Value> {
        Ok(upgrade(&self.mapping)?
            .parameter_state(&self.id, force_reload)?
            .value)
    }

    pub fn last_update(&self) -> Result<DateTime<Utc>> {
        Ok(upgrade(&self.mapping)?
            .parameter_state(&self.id, false)?
            .updated_at())
    }

    /// Write a new value. Returns `false` if the CCU did not confirm it.
    pub fn set_state(&self, value: Value) -> Result<bool> {
        upgrade(&self.mapping)?.set_parameter_state(&self.id, value)
    }
}

#[derive(Debug)]
pub struct Function {
    mapping: Weak<Mapping>,
    id: FunctionId,
}

impl Function {
    pub(crate) fn new(mapping: Weak<Mapping>, id: FunctionId) -> Self {
        Self { mapping, id }
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> Result<String> {
        let mapping = upgrade(&self.mapping)?;
        let name = mapping.function_data(self.id)?.name;
        Ok(mapping.translator().translate(&name))
    }

    pub fn description(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.function_data(self.id)?.description)
    }

    pub fn channels(&self) -> Result<Entities<ChannelId, Channel>> {
        upgrade(&self.mapping)?.channels_of_function(self.id)
    }
}

#[derive(Debug)]
pub struct Program {
    mapping: Weak<Mapping>,
    id: ProgramId,
}

impl Program {
    pub(crate) fn new(mapping: Weak<Mapping>, id: ProgramId) -> Self {
        Self { mapping, id }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn name(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.program_data(self.id)?.name)
    }

    pub fn description(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.program_data(self.id)?.description)
    }

    pub fn is_active(&self) -> Result<bool> {
        Ok(upgrade(&self.mapping)?.program_data(self.id)?.active)
    }

    pub fn is_visible(&self) -> Result<bool> {
        Ok(upgrade(&self.mapping)?.program_data(self.id)?.visible)
    }

    /// Run the program now.
    pub fn execute(&self) -> Result<bool> {
        upgrade(&self.mapping)?.execute_program(self.id)
    }

    /// When the program last ran, read live from the CCU.
    pub fn last_update(&self) -> Result<DateTime<Utc>> {
        Ok(upgrade(&self.mapping)?.program_state(self.id)?.updated_at())
    }
}

/// A CCU system variable.
#[derive(Debug)]
pub struct Variable {
    mapping: Weak<Mapping>,
    id: VariableId,
}

impl Variable {
    pub(crate) fn new(mapping: Weak<Mapping>, id: VariableId) -> Self {
        Self { mapping, id }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn name(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.variable_data(self.id)?.name)
    }

    pub fn description(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.variable_data(self.id)?.description)
    }

    pub fn data_type(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.variable_data(self.id)?.data_type)
    }

    pub fn unit(&self) -> Result<String> {
        Ok(upgrade(&self.mapping)?.variable_data(self.id)?.unit)
    }

    /// Current value; see [`Parameter::state`].
    pub fn state(&self, force_reload: bool) -> Result<Value> {
        Ok(upgrade(&self.mapping)?
            .variable_state(self.id, force_reload)?
            .value)
    }

    pub fn last_update(&self) -> Result<DateTime<Utc>> {
        Ok(upgrade(&self.mapping)?
            .variable_state(self.id, false)?
            .updated_at())
    }

    pub fn set_state(&self, value: Value) -> Result<bool> {
        upgrade(&self.mapping)?.set_variable_state(self.id, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::pools;
    use crate::error::TransportError;
    use crate::testing::{fixture_mapping, DEVICE};
    use serde_json::json;

    #[test]
    fn test_room_and_function_names_are_translated() {
        let (mapping, _ccu) = fixture_mapping();

        assert_eq!(mapping.room(1234, true).unwrap().name().unwrap(), "Kitchen");
        assert_eq!(mapping.room(1235, true).unwrap().name().unwrap(), "Office");
        assert_eq!(mapping.function(3, true).unwrap().name().unwrap(), "Heating");
    }

    #[test]
    fn test_device_attributes() {
        let (mapping, ccu) = fixture_mapping();
        let device = mapping.device(DEVICE, true).unwrap();

        assert_eq!(device.name().unwrap(), "Kitchen switch");
        assert_eq!(device.device_type().unwrap(), "HmIP-BSM");
        assert_eq!(device.firmware().unwrap(), "1.6.2");
        assert!(device.is_secured().unwrap());
        assert_eq!(ccu.fetches(&format!("device/{DEVICE}")), 1);
    }

    #[test]
    fn test_channel_parent_and_parameters() {
        let (mapping, _ccu) = fixture_mapping();
        let device = mapping.device(DEVICE, true).unwrap();
        let channel = device.channel(1).unwrap();

        assert!(Rc::ptr_eq(channel.device(), &device));
        assert_eq!(channel.number(), 1);
        assert_eq!(channel.name().unwrap(), "Kitchen light");

        let parameter = channel.parameter("STATE").unwrap();
        assert_eq!(parameter.id().to_string(), format!("{DEVICE}/1/STATE"));
        assert_eq!(parameter.data_type().unwrap(), "BOOL");
        assert!(channel.parameter("LEVEL").unwrap_err().is_not_found());
        assert!(device.channel(9).unwrap_err().is_not_found());
    }

    #[test]
    fn test_state_defaults_to_live_read() {
        let (mapping, ccu) = fixture_mapping();
        let parameter = mapping
            .parameter(&ChannelId::new(DEVICE, 1).parameter("STATE"), false)
            .unwrap();
        let path = format!("device/{DEVICE}/1/STATE/~pv");

        assert_eq!(parameter.state(true).unwrap(), json!(false));
        assert_eq!(parameter.state(true).unwrap(), json!(false));
        assert_eq!(ccu.fetches(&path), 2);

        // An explicit opt-out of reloading is served from the cache.
        assert_eq!(parameter.state(false).unwrap(), json!(false));
        assert_eq!(ccu.fetches(&path), 2);
    }

    #[test]
    fn test_set_state_writes_through() {
        let (mapping, ccu) = fixture_mapping();
        let parameter = mapping
            .parameter(&ChannelId::new(DEVICE, 1).parameter("STATE"), false)
            .unwrap();
        let before = Utc::now();

        assert!(parameter.set_state(json!(true)).unwrap());
        assert_eq!(
            ccu.writes(),
            vec![(format!("device/{DEVICE}/1/STATE/~pv"), json!({"v": true}))]
        );

        assert_eq!(parameter.state(false).unwrap(), json!(true));
        assert!(parameter.last_update().unwrap().timestamp_millis() >= before.timestamp_millis());
        assert_eq!(ccu.fetches(&format!("device/{DEVICE}/1/STATE/~pv")), 0);
    }

    #[test]
    fn test_unconfirmed_write_leaves_cache() {
        let (mapping, ccu) = fixture_mapping();
        ccu.confirm_writes(false);
        let variable = mapping.variable(42, false).unwrap();

        assert!(!variable.set_state(json!(true)).unwrap());
        assert!(!mapping
            .cache()
            .pool(pools::VARIABLES)
            .unwrap()
            .has("42")
            .unwrap());
        assert_eq!(variable.state(false).unwrap(), json!(false));
    }

    #[test]
    fn test_failed_write_raises() {
        let (mapping, ccu) = fixture_mapping();
        ccu.fail("sysvar/42/~pv", 503);
        let variable = mapping.variable(42, false).unwrap();

        let err = variable.set_state(json!(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Status { code: 503, .. })
        ));
    }

    #[test]
    fn test_last_update_uses_cache() {
        let (mapping, ccu) = fixture_mapping();
        let variable = mapping.variable(42, false).unwrap();

        let first = variable.last_update().unwrap();
        let second = variable.last_update().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.timestamp_millis(), 1_588_606_125_497);
        assert_eq!(ccu.fetches("sysvar/42/~pv"), 1);
    }

    #[test]
    fn test_program_is_always_live() {
        let (mapping, ccu) = fixture_mapping();
        let program = mapping.program(7, true).unwrap();

        assert_eq!(program.name().unwrap(), "Night mode");
        assert!(program.is_active().unwrap());
        program.last_update().unwrap();
        program.last_update().unwrap();
        assert_eq!(ccu.fetches("program/7/~pv"), 2);

        assert!(program.execute().unwrap());
        assert_eq!(
            ccu.writes(),
            vec![("program/7/~pv".to_string(), json!({"v": true}))]
        );
    }

    #[test]
    fn test_handle_outliving_registry() {
        let (mapping, _ccu) = fixture_mapping();
        let room = mapping.room(1235, false).unwrap();
        drop(mapping);

        assert_eq!(room.id(), 1235);
        assert!(matches!(room.name(), Err(Error::SessionClosed)));
    }
}

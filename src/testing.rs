//! In-memory CCU used by the registry, handle and facade tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::cache::CacheStore;
use crate::error::TransportError;
use crate::mapping::Mapping;
use crate::translation::Translator;
use crate::transport::Transport;

pub const DEVICE: &str = "ABC1234567";

#[derive(Default)]
struct State {
    routes: RefCell<HashMap<String, Value>>,
    failures: RefCell<HashMap<String, u16>>,
    fetches: RefCell<Vec<String>>,
    writes: RefCell<Vec<(String, Value)>>,
    reject_writes: Cell<bool>,
}

/// Serves canned JSON per path and records every call. Clones share state.
#[derive(Clone, Default)]
pub struct FakeCcu {
    state: Rc<State>,
}

impl FakeCcu {
    /// A CCU with two devices, two rooms, one function, one program and
    /// one system variable.
    pub fn fixture() -> Self {
        let ccu = Self::default();

        ccu.route(
            "device",
            json!({"~links": [
                {"rel": "device", "href": DEVICE, "title": "Kitchen switch"},
                {"rel": "device", "href": "XYZ9876543", "title": "Hallway sensor"},
                {"rel": "root", "href": "..", "title": "Root"}
            ]}),
        );
        ccu.route(
            &format!("device/{DEVICE}"),
            json!({
                "title": "Kitchen switch",
                "type": "HmIP-BSM",
                "firmware": "1.6.2",
                "aesActive": true,
                "~links": [
                    {"rel": "channel", "href": "0", "title": "Kitchen switch:0"},
                    {"rel": "channel", "href": "1", "title": "Kitchen light"},
                    {"rel": "root", "href": "..", "title": "Root"}
                ]
            }),
        );
        ccu.route(
            &format!("device/{DEVICE}/0"),
            json!({"title": "Kitchen switch:0", "~links": [
                {"rel": "parameter", "href": "UNREACH", "title": "Unreachable"}
            ]}),
        );
        ccu.route(
            &format!("device/{DEVICE}/1"),
            json!({"title": "Kitchen light", "~links": [
                {"rel": "device", "href": "..", "title": "Kitchen switch"},
                {"rel": "parameter", "href": "$MASTER", "title": "Master"},
                {"rel": "parameter", "href": "STATE", "title": "State"},
                {"rel": "parameter", "href": "ON_TIME", "title": "On time"},
                {"rel": "room", "href": "/room/1234", "title": "roomKitchen"},
                {"rel": "function", "href": "/function/3", "title": "funcHeating"}
            ]}),
        );
        ccu.route(
            &format!("device/{DEVICE}/1/STATE"),
            json!({"title": "State", "type": "BOOL", "unit": ""}),
        );
        ccu.route(
            &format!("device/{DEVICE}/1/STATE/~pv"),
            json!({"v": false, "ts": 1_588_606_125_497_i64, "s": 0}),
        );
        ccu.route(
            "device/XYZ9876543",
            json!({
                "title": "Hallway sensor",
                "type": "HmIP-SMI",
                "~links": [{"rel": "channel", "href": "0", "title": "Hallway sensor:0"}]
            }),
        );

        ccu.route(
            "room",
            json!({"~links": [
                {"rel": "room", "href": "1234", "title": "roomKitchen"},
                {"rel": "room", "href": "1235", "title": "Office"}
            ]}),
        );
        ccu.route(
            "room/1234",
            json!({"title": "roomKitchen", "~links": [
                {"rel": "channel", "href": format!("/device/{DEVICE}/1"), "title": "Kitchen light"}
            ]}),
        );
        ccu.route("room/1235", json!({"title": "Office", "~links": []}));

        ccu.route(
            "function",
            json!({"~links": [{"rel": "function", "href": "3", "title": "funcHeating"}]}),
        );
        ccu.route(
            "function/3",
            json!({"title": "funcHeating", "description": "", "~links": [
                {"rel": "channel", "href": format!("/device/{DEVICE}/1"), "title": "Kitchen light"}
            ]}),
        );

        ccu.route(
            "program",
            json!({"~links": [{"rel": "program", "href": "7", "title": "Night mode"}]}),
        );
        ccu.route(
            "program/7",
            json!({"title": "Night mode", "description": "Lights off", "active": true, "visible": true}),
        );
        ccu.route(
            "program/7/~pv",
            json!({"v": true, "ts": 1_588_606_000_000_i64, "s": 0}),
        );

        ccu.route(
            "sysvar",
            json!({"~links": [{"rel": "sysvar", "href": "42", "title": "Presence"}]}),
        );
        ccu.route(
            "sysvar/42",
            json!({"title": "Presence", "description": "Anyone home", "type": "BOOL", "unit": ""}),
        );
        ccu.route(
            "sysvar/42/~pv",
            json!({"v": false, "ts": 1_588_606_125_497_i64, "s": 0}),
        );

        ccu
    }

    pub fn route(&self, path: &str, body: Value) {
        self.state.routes.borrow_mut().insert(path.to_string(), body);
    }

    /// Answer every call to `path` with HTTP `code`.
    pub fn fail(&self, path: &str, code: u16) {
        self.state.failures.borrow_mut().insert(path.to_string(), code);
    }

    pub fn confirm_writes(&self, confirm: bool) {
        self.state.reject_writes.set(!confirm);
    }

    pub fn fetches(&self, path: &str) -> usize {
        self.state
            .fetches
            .borrow()
            .iter()
            .filter(|p| *p == path)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.state.fetches.borrow().len()
    }

    pub fn writes(&self) -> Vec<(String, Value)> {
        self.state.writes.borrow().clone()
    }

    fn check(&self, key: &str, path: &[&str]) -> Result<(), TransportError> {
        match self.state.failures.borrow().get(key) {
            Some(&code) => Err(TransportError::Status {
                code,
                url: self.url(path),
            }),
            None => Ok(()),
        }
    }
}

impl Transport for FakeCcu {
    fn fetch(&self, path: &[&str]) -> Result<Value, TransportError> {
        let key = path.join("/");
        self.state.fetches.borrow_mut().push(key.clone());
        self.check(&key, path)?;
        self.state
            .routes
            .borrow()
            .get(&key)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                code: 404,
                url: self.url(path),
            })
    }

    fn send(&self, path: &[&str], payload: &Value) -> Result<bool, TransportError> {
        let key = path.join("/");
        self.check(&key, path)?;
        self.state.writes.borrow_mut().push((key, payload.clone()));
        Ok(!self.state.reject_writes.get())
    }

    fn url(&self, path: &[&str]) -> String {
        format!("https://ccu.test/{}", path.join("/"))
    }
}

/// A registry over [`FakeCcu::fixture`] with an in-memory cache.
pub fn fixture_mapping() -> (Rc<Mapping>, FakeCcu) {
    let ccu = FakeCcu::fixture();
    let mapping = Mapping::new(
        Box::new(ccu.clone()),
        CacheStore::in_memory(),
        Translator::default(),
    );
    (mapping, ccu)
}

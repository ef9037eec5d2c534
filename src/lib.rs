//! hmip - typed client for the Homematic CCU REST interface
//!
//! Resolves devices, channels, parameters, rooms, functions, programs and
//! system variables by id or name, and caches what it fetches so repeated
//! lookups stay off the network.
//!
//! ```no_run
//! use hmip::{Ccu, Configuration};
//!
//! # fn main() -> hmip::Result<()> {
//! let ccu = Ccu::new(Configuration::default())?;
//! for (_, channel) in ccu.room_by_name("Kitchen")?.channels()? {
//!     println!("{} {}", channel.id(), channel.name()?);
//! }
//! ccu.close()
//! # }
//! ```

pub mod cache;
pub mod configuration;
pub mod controller;
pub mod entities;
pub mod error;
pub mod ids;
pub mod mapping;
pub mod records;
pub mod translation;
pub mod transport;

#[cfg(test)]
mod testing;

pub use configuration::{CacheConfig, Configuration};
pub use controller::Ccu;
pub use entities::{Channel, Device, Function, Parameter, Program, Room, Variable};
pub use error::{CacheError, Error, Result, TransportError};
pub use ids::{ChannelId, EntityKind, ParameterId};
pub use mapping::{Entities, Mapping};
pub use translation::{Language, Translator};
pub use transport::{HttpTransport, Transport};

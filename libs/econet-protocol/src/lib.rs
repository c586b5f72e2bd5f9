//! ecoNET boiler protocol
//!
//! Binary request/response protocol spoken by the ecoNET RS-485-over-TCP
//! bridge: framing and CRC, stream reassembly, typed parameter values,
//! a TCP transport and a retrying per-parameter driver.

pub mod constants;
pub mod crc;
pub mod driver;
pub mod error;
pub mod frame;
pub mod params;
pub mod reassembler;
pub mod schedule;
pub mod transport;
pub mod types;
pub mod value;

pub use driver::{Credentials, DeviceClient, DriverConfig, EconetDevice, SessionCounter};
pub use error::{ProtocolError, Result};
pub use frame::Frame;
pub use params::{ExponentConvention, ParameterDef, ParameterMap};
pub use reassembler::{Reassembler, ReassemblerStats};
pub use schedule::{schedule_slugs, DaySchedule, SchedulePeriod};
pub use transport::{TcpLink, TcpTransport, TcpTransportConfig, Transaction, TransportStats};
pub use types::{DataType, ParameterInfo};
pub use value::{decode_value, encode_value, ParamValue};

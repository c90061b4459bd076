//! DDS140 device session
//!
//! [`Dds140`] owns the claimed USB interface, the acquisition state machine
//! for that session, and the configuration last committed to the device.

use std::fmt;

use dds140_core::acquisition::Acquisition;
use dds140_core::error::TransferFault;
use dds140_core::protocol::{EP_IN, READ_TIMEOUT, USB_CONFIGURATION, USB_INTERFACE, WRITE_TIMEOUT};
use dds140_core::transport::RegisterIo;
use dds140_core::{setters, AcquisitionConfig, DeviceProfile};
use nusb::transfer::{Bulk, ControlIn, ControlOut, ControlType, In, Recipient};
use nusb::{Endpoint, Interface, MaybeFuture};

use crate::error::{control_fault, open_failure, Error, Result};
use crate::queue::UsbQueue;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No device handle held
    Inactive,
    /// Handle open, calibration and configuration in progress
    Initializing,
    /// Ready for configuration changes and acquisitions
    Active,
}

/// How a session finds its device again
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbIdentity {
    /// Physical bus/port path, e.g. `"1-4.2"`. `None` matches any port.
    pub connection_id: Option<String>,
    /// Logical bus address; `None` until first opened
    pub address: Option<u8>,
}

impl UsbIdentity {
    /// Identity bound to a physical port
    pub fn at(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: Some(connection_id.into()),
            address: None,
        }
    }
}

impl fmt::Display for UsbIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conn = self.connection_id.as_deref().unwrap_or("?");
        match self.address {
            Some(addr) => write!(f, "{} (logical) / {} (physical)", addr, conn),
            None => write!(f, "? (logical) / {} (physical)", conn),
        }
    }
}

/// Information about an attached DDS140
#[derive(Debug, Clone)]
pub struct Dds140DeviceInfo {
    /// Bus identifier as reported by the OS
    pub bus: String,
    /// Device address on the bus
    pub address: u8,
    /// Physical bus/port path
    pub connection_id: String,
    /// Whether the device enumerates with firmware loaded
    pub firmware_loaded: bool,
}

/// Format a physical connection id as `<bus>-<port>.<port>...`
pub fn format_connection_id(bus: &str, ports: &[u8]) -> String {
    let path = ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(".");
    format!("{}-{}", bus, path)
}

fn connection_id(info: &nusb::DeviceInfo) -> String {
    format_connection_id(info.bus_id(), info.port_chain())
}

/// The parts of an enumerated device that decide whether `open` uses it
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    vendor_id: u16,
    product_id: u16,
    connection_id: String,
    address: u8,
}

impl Candidate {
    fn from_info(info: &nusb::DeviceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            connection_id: connection_id(info),
            address: info.device_address(),
        }
    }
}

/// Index of the device `open` should use: the first with the profile's
/// firmware ids and, when the identity names a port, on that port.
fn select_device(
    profile: &DeviceProfile,
    identity: &UsbIdentity,
    candidates: &[Candidate],
) -> Option<usize> {
    candidates.iter().position(|c| {
        profile.matches_firmware(c.vendor_id, c.product_id)
            && identity
                .connection_id
                .as_ref()
                .is_none_or(|id| *id == c.connection_id)
    })
}

/// Record the opened device's address and port in fields still unset
fn bind_identity(identity: &mut UsbIdentity, device: &Candidate) {
    if identity.address.is_none() {
        identity.address = Some(device.address);
    }
    if identity.connection_id.is_none() {
        identity.connection_id = Some(device.connection_id.clone());
    }
}

struct Connection {
    interface: Interface,
    bulk_in: Endpoint<Bulk, In>,
}

/// A DDS140 session
pub struct Dds140 {
    profile: DeviceProfile,
    identity: UsbIdentity,
    config: AcquisitionConfig,
    status: SessionStatus,
    conn: Option<Connection>,
    acquisition: Acquisition,
}

impl Dds140 {
    /// Create an inactive session; nothing touches the bus until [`open`](Self::open)
    pub fn new(profile: DeviceProfile, identity: UsbIdentity) -> Self {
        Self {
            profile,
            identity,
            config: AcquisitionConfig::default(),
            status: SessionStatus::Inactive,
            conn: None,
            acquisition: Acquisition::new(),
        }
    }

    /// Use `config` for the next initialization and acquisitions
    pub fn with_config(mut self, config: AcquisitionConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound the FIFO poll loop of every acquisition on this session
    pub fn with_poll_limit(mut self, limit: u32) -> Self {
        self.acquisition = Acquisition::new().with_poll_limit(limit);
        self
    }

    /// List attached devices matching `profile`, cold or with firmware
    pub fn list_devices(profile: &DeviceProfile) -> Result<Vec<Dds140DeviceInfo>> {
        let devices = nusb::list_devices()
            .wait()
            .map_err(open_failure)?
            .filter_map(|d| {
                let firmware_loaded = profile.matches_firmware(d.vendor_id(), d.product_id());
                if !firmware_loaded && !profile.matches_cold(d.vendor_id(), d.product_id()) {
                    return None;
                }
                Some(Dds140DeviceInfo {
                    bus: d.bus_id().to_string(),
                    address: d.device_address(),
                    connection_id: connection_id(&d),
                    firmware_loaded,
                })
            })
            .collect();

        Ok(devices)
    }

    /// Open the device and commit calibration, sample rate and voltage ranges.
    ///
    /// The first device matching the profile's firmware ids (and the
    /// identity's connection id, when set) is the only one tried. If
    /// initialization fails the device is closed again.
    pub fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let devices: Vec<nusb::DeviceInfo> =
            nusb::list_devices().wait().map_err(open_failure)?.collect();
        let candidates: Vec<Candidate> = devices.iter().map(Candidate::from_info).collect();
        let index = select_device(&self.profile, &self.identity, &candidates)
            .ok_or(Error::DeviceNotFound)?;

        self.connect(&devices[index], &candidates[index])?;
        self.status = SessionStatus::Initializing;

        if let Err(e) = self.init() {
            log::error!("Failed to initialize device: {}", e);
            self.close();
            return Err(e);
        }

        self.status = SessionStatus::Active;
        Ok(())
    }

    fn connect(&mut self, device_info: &nusb::DeviceInfo, candidate: &Candidate) -> Result<()> {
        let device = device_info.open().wait().map_err(open_failure)?;

        match device.active_configuration() {
            Ok(desc) if desc.configuration_value() == USB_CONFIGURATION => {}
            _ => {
                log::debug!("Setting configuration {}", USB_CONFIGURATION);
                device
                    .set_configuration(USB_CONFIGURATION)
                    .wait()
                    .map_err(open_failure)?;
            }
        }

        let interface = device
            .claim_interface(USB_INTERFACE)
            .wait()
            .map_err(open_failure)?;
        let bulk_in = interface
            .endpoint::<Bulk, In>(EP_IN)
            .map_err(open_failure)?;

        bind_identity(&mut self.identity, candidate);

        log::info!(
            "Opened device on {} interface {}",
            self.identity,
            USB_INTERFACE
        );

        self.conn = Some(Connection { interface, bulk_in });
        Ok(())
    }

    /// Release the interface and handle. Does nothing if not open.
    pub fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        log::info!(
            "Closing device on {} interface {}",
            self.identity,
            USB_INTERFACE
        );
        drop(conn);
        self.status = SessionStatus::Inactive;
    }

    /// Whether a device handle is held
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Current session status
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The session's identity (address is filled in on first open)
    pub fn identity(&self) -> &UsbIdentity {
        &self.identity
    }

    /// Device profile
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Current acquisition configuration
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Calibration sequence followed by sample rate and voltage ranges
    pub fn init(&mut self) -> Result<()> {
        let config = self.config.clone();
        setters::init(self, &config)
    }

    /// Change and commit the sample rate
    pub fn set_samplerate(&mut self, rate_hz: u64) -> Result<()> {
        self.config.samplerate = rate_hz;
        let config = self.config.clone();
        setters::update_samplerate(self, &config)
    }

    /// Change and commit one channel's voltage range
    pub fn set_vdiv(&mut self, channel: usize, range_index: usize) -> Result<()> {
        let slot = self
            .config
            .voltage
            .get_mut(channel)
            .ok_or_else(|| Error::InvalidParameter(format!("channel: {}", channel)))?;
        *slot = range_index;
        let config = self.config.clone();
        setters::update_vdiv(self, &config)
    }

    /// Commit the configured coupling (no-op without coupling support)
    pub fn update_coupling(&mut self) -> Result<()> {
        let (profile, config) = (self.profile, self.config.clone());
        setters::update_coupling(self, &profile, &config)
    }

    /// Commit the configured channel count
    pub fn update_channels(&mut self) -> Result<()> {
        let config = self.config.clone();
        setters::update_channels(self, &config)
    }

    /// Replace the configuration and commit every register it covers
    pub fn apply_config(&mut self, config: AcquisitionConfig) -> Result<()> {
        self.config = config.clone();
        let samplerate = setters::update_samplerate(&mut *self, &config);
        let vdiv = setters::update_vdiv(&mut *self, &config);
        let coupling = self.update_coupling();
        let channels = self.update_channels();
        samplerate.and(vdiv).and(coupling).and(channels)
    }

    /// Arm the trigger for the next capture
    pub fn arm_trigger(&mut self) -> Result<()> {
        setters::arm_trigger(self)
    }

    /// Program the signal generator
    pub fn load_signal_generator(&mut self) -> Result<()> {
        setters::load_signal_generator(self)
    }

    /// Stop a running capture. Not supported by the device protocol.
    pub fn stop(&mut self) -> Result<()> {
        self.acquisition.stop()
    }

    /// Run one acquisition of `amount` bytes, handing the data to `handler`.
    ///
    /// Returns once the handshake has ended. `handler` runs exactly once if
    /// the bulk read was issued, and never if an earlier step failed.
    pub fn acquire<F>(&mut self, amount: usize, handler: F) -> Result<()>
    where
        F: FnOnce(Result<Vec<u8>>) + Send + 'static,
    {
        let conn = self
            .conn
            .as_mut()
            .ok_or(Error::endpoint(EP_IN, TransferFault::Disconnected))?;

        let first = self.acquisition.start(amount, handler)?;
        let mut queue = UsbQueue::new(&conn.interface, &mut conn.bulk_in);
        self.acquisition.drive(&mut queue, first)
    }

    /// Blocking wrapper around [`acquire`](Self::acquire)
    pub fn acquire_block(&mut self, amount: usize) -> Result<Vec<u8>> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.acquire(amount, move |result| {
            let _ = tx.send(result);
        })?;
        rx.recv()
            .map_err(|_| Error::endpoint(EP_IN, TransferFault::Cancelled))?
    }

    fn interface(&self, register: u8) -> Result<&Interface> {
        self.conn
            .as_ref()
            .map(|c| &c.interface)
            .ok_or(Error::register(register, TransferFault::Disconnected))
    }
}

impl RegisterIo for Dds140 {
    fn write_register(&mut self, register: u8, value: u16) -> Result<()> {
        log::trace!("write 0x{:02x} <- 0x{:02x}", register, value);

        self.interface(register)?
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: register,
                    value,
                    index: 0,
                    data: &[0],
                },
                WRITE_TIMEOUT,
            )
            .wait()
            .map_err(|e| Error::register(register, control_fault(e)))
    }

    fn read_register(&mut self, register: u8, length: u16) -> Result<Vec<u8>> {
        let data = self
            .interface(register)?
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: register,
                    value: 0,
                    index: 0,
                    length,
                },
                READ_TIMEOUT,
            )
            .wait()
            .map_err(|e| Error::register(register, control_fault(e)))?;

        log::trace!("read 0x{:02x} -> {:02x?}", register, data);
        if data.is_empty() {
            return Err(Error::register(register, TransferFault::Empty));
        }
        Ok(data)
    }
}

impl Drop for Dds140 {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: DeviceProfile = DeviceProfile::new(0xd4a2, 0x5661);

    #[test]
    fn test_close_unopened_is_noop() {
        let mut dev = Dds140::new(PROFILE, UsbIdentity::default());
        dev.close();
        dev.close();
        assert!(!dev.is_open());
        assert_eq!(dev.status(), SessionStatus::Inactive);
    }

    #[test]
    fn test_register_io_requires_open() {
        let mut dev = Dds140::new(PROFILE, UsbIdentity::at("1-4"));
        assert_eq!(
            dev.write_register(0x33, 0),
            Err(Error::register(0x33, TransferFault::Disconnected))
        );
        assert!(dev.read_register(0x50, 1).is_err());
    }

    #[test]
    fn test_acquire_requires_open() {
        let mut dev = Dds140::new(PROFILE, UsbIdentity::default());
        let err = dev.acquire_block(1024).unwrap_err();
        assert_eq!(err, Error::endpoint(EP_IN, TransferFault::Disconnected));
    }

    #[test]
    fn test_setters_report_first_failure_when_closed() {
        let mut dev = Dds140::new(PROFILE, UsbIdentity::default());
        assert_eq!(
            dev.set_samplerate(625_000),
            Err(Error::register(0x24, TransferFault::Disconnected))
        );
        assert_eq!(dev.config().samplerate, 625_000);
        // No coupling relay: nothing to write, nothing to fail
        assert!(dev.update_coupling().is_ok());
    }

    #[test]
    fn test_stop_unimplemented() {
        let mut dev = Dds140::new(PROFILE, UsbIdentity::default());
        assert_eq!(dev.stop(), Err(Error::Unimplemented("stop")));
    }

    #[test]
    fn test_connection_id_format() {
        assert_eq!(format_connection_id("1", &[4]), "1-4");
        assert_eq!(format_connection_id("3", &[1, 2, 7]), "3-1.2.7");
    }

    #[test]
    fn test_identity_display() {
        let mut id = UsbIdentity::at("1-4.2");
        assert_eq!(id.to_string(), "? (logical) / 1-4.2 (physical)");
        id.address = Some(9);
        assert_eq!(id.to_string(), "9 (logical) / 1-4.2 (physical)");
    }

    fn candidate(vendor_id: u16, product_id: u16, port: &str, address: u8) -> Candidate {
        Candidate {
            vendor_id,
            product_id,
            connection_id: port.to_string(),
            address,
        }
    }

    #[test]
    fn test_select_skips_other_ids() {
        let profile = PROFILE.with_orig_ids(0x04b4, 0x8613);
        let devices = [
            candidate(0x04b4, 0x8613, "1-1", 2),
            candidate(0x1a86, 0x5512, "1-2", 3),
            candidate(0xd4a2, 0x5661, "1-3", 4),
        ];
        assert_eq!(
            select_device(&profile, &UsbIdentity::default(), &devices),
            Some(2)
        );
        assert_eq!(
            select_device(&profile, &UsbIdentity::default(), &devices[..2]),
            None
        );
    }

    #[test]
    fn test_select_by_connection_id() {
        let devices = [
            candidate(0xd4a2, 0x5661, "1-1", 2),
            candidate(0xd4a2, 0x5661, "2-4.1", 7),
        ];
        assert_eq!(
            select_device(&PROFILE, &UsbIdentity::at("2-4.1"), &devices),
            Some(1)
        );
        assert_eq!(
            select_device(&PROFILE, &UsbIdentity::at("3-1"), &devices),
            None
        );
    }

    #[test]
    fn test_select_first_match_only() {
        let devices = [
            candidate(0xd4a2, 0x5661, "1-1", 5),
            candidate(0xd4a2, 0x5661, "1-2", 6),
        ];
        assert_eq!(
            select_device(&PROFILE, &UsbIdentity::default(), &devices),
            Some(0)
        );
    }

    #[test]
    fn test_bind_identity_fills_unset_fields() {
        let device = candidate(0xd4a2, 0x5661, "1-4.2", 9);

        let mut id = UsbIdentity::default();
        bind_identity(&mut id, &device);
        assert_eq!(id.address, Some(9));
        assert_eq!(id.connection_id.as_deref(), Some("1-4.2"));

        let mut id = UsbIdentity {
            connection_id: Some("1-4.2".to_string()),
            address: Some(3),
        };
        bind_identity(&mut id, &device);
        assert_eq!(id.address, Some(3));
        assert_eq!(id.connection_id.as_deref(), Some("1-4.2"));
    }
}

use std::{
    collections::{HashMap, HashSet},
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

use homectl_common::{parse_w1_payload, ActuatorError, ContactState, SensorReadError};

/// Read side of the hardware boundary. Implementations must not panic on
/// hardware faults; every failure comes back as a [`SensorReadError`].
pub trait SensorReader: Send + Sync {
    fn read_temperature(&self, address: &str) -> Result<f32, SensorReadError>;

    fn read_contact(&self, pin: u32) -> Result<ContactState, SensorReadError>;
}

/// Write side of the hardware boundary. Writes are idempotent and have no side
/// effect beyond the pin itself.
pub trait ActuatorDriver: Send + Sync {
    fn set_output(&self, pin: u32, on: bool) -> Result<(), ActuatorError>;

    /// Last commanded level of an output pin. Unknown pins read as off.
    fn get_output(&self, pin: u32) -> bool;
}

/// DS18B20 sensors behind the kernel one-wire driver.
pub struct W1Bus {
    dir: PathBuf,
}

impl W1Bus {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slave_path(&self, address: &str) -> PathBuf {
        self.dir.join(address).join("w1_slave")
    }
}

/// Digital pins through `/sys/class/gpio`. Output levels are cached so
/// read-back does not depend on the value file.
pub struct SysfsGpio {
    base: PathBuf,
    outputs: Mutex<HashMap<u32, bool>>,
}

impl SysfsGpio {
    /// Exports and configures every pin. Inputs rely on external pull-ups.
    pub fn open(
        base: impl Into<PathBuf>,
        outputs: &[u32],
        inputs: &[u32],
    ) -> io::Result<Self> {
        let base = base.into();
        for pin in outputs {
            export(&base, *pin)?;
            fs::write(pin_dir(&base, *pin).join("direction"), "low")?;
        }
        for pin in inputs {
            export(&base, *pin)?;
            fs::write(pin_dir(&base, *pin).join("direction"), "in")?;
        }

        Ok(Self {
            base,
            outputs: Mutex::new(outputs.iter().map(|pin| (*pin, false)).collect()),
        })
    }

    fn value_path(&self, pin: u32) -> PathBuf {
        pin_dir(&self.base, pin).join("value")
    }
}

fn pin_dir(base: &Path, pin: u32) -> PathBuf {
    base.join(format!("gpio{pin}"))
}

fn export(base: &Path, pin: u32) -> io::Result<()> {
    if pin_dir(base, pin).exists() {
        return Ok(());
    }
    match fs::write(base.join("export"), pin.to_string()) {
        // Already exported by someone else.
        Err(err) if err.kind() == ErrorKind::ResourceBusy => Ok(()),
        other => other,
    }
}

/// The controller's view of the board: one-wire temperatures plus GPIO contacts.
pub struct HostSensors {
    w1: W1Bus,
    gpio: Arc<SysfsGpio>,
}

impl HostSensors {
    pub fn new(w1: W1Bus, gpio: Arc<SysfsGpio>) -> Self {
        Self { w1, gpio }
    }
}

impl SensorReader for HostSensors {
    fn read_temperature(&self, address: &str) -> Result<f32, SensorReadError> {
        let path = self.w1.slave_path(address);
        let payload =
            fs::read_to_string(&path).map_err(|source| SensorReadError::Io { path, source })?;
        parse_w1_payload(&payload)
    }

    fn read_contact(&self, pin: u32) -> Result<ContactState, SensorReadError> {
        let path = self.gpio.value_path(pin);
        let raw = fs::read_to_string(&path).map_err(|source| SensorReadError::Io {
            path: path.clone(),
            source,
        })?;
        match raw.trim() {
            "0" => Ok(ContactState::from_level(0)),
            "1" => Ok(ContactState::from_level(1)),
            other => Err(SensorReadError::Malformed(format!(
                "gpio{pin} value '{other}'"
            ))),
        }
    }
}

impl ActuatorDriver for SysfsGpio {
    fn set_output(&self, pin: u32, on: bool) -> Result<(), ActuatorError> {
        let mut outputs = self.outputs.lock();
        let Some(level) = outputs.get_mut(&pin) else {
            return Err(ActuatorError::UnknownPin(pin));
        };
        fs::write(self.value_path(pin), if on { "1" } else { "0" })
            .map_err(|source| ActuatorError::Io { pin, source })?;
        *level = on;
        Ok(())
    }

    fn get_output(&self, pin: u32) -> bool {
        self.outputs.lock().get(&pin).copied().unwrap_or(false)
    }
}

/// In-memory board for bench runs and tests. Temperatures and contacts are set
/// from outside; a sensor with no reading fails like a missing device file.
#[derive(Default)]
pub struct SimulatedHardware {
    temperatures: Mutex<HashMap<String, Result<f32, String>>>,
    contacts: Mutex<HashMap<u32, ContactState>>,
    outputs: Mutex<HashMap<u32, bool>>,
    faulty_outputs: Mutex<HashSet<u32>>,
    #[cfg(test)]
    writes: Mutex<Vec<(u32, bool)>>,
}

impl SimulatedHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_temperature(&self, address: &str, celsius: f32) {
        self.temperatures
            .lock()
            .insert(address.to_string(), Ok(celsius));
    }
}

#[cfg(test)]
impl SimulatedHardware {
    /// Makes the next reads of `address` fail as a malformed payload.
    pub fn fail_sensor(&self, address: &str, reason: &str) {
        self.temperatures
            .lock()
            .insert(address.to_string(), Err(reason.to_string()));
    }

    pub fn set_contact(&self, pin: u32, contact: ContactState) {
        self.contacts.lock().insert(pin, contact);
    }

    /// Every later write to `pin` fails with an I/O error.
    pub fn fail_output(&self, pin: u32) {
        self.faulty_outputs.lock().insert(pin);
    }

    /// Every successful `set_output` call so far, in order.
    pub fn writes(&self) -> Vec<(u32, bool)> {
        self.writes.lock().clone()
    }

    pub fn writes_to(&self, pin: u32) -> Vec<bool> {
        self.writes
            .lock()
            .iter()
            .filter(|(written, _)| *written == pin)
            .map(|(_, level)| *level)
            .collect()
    }
}

impl SensorReader for SimulatedHardware {
    fn read_temperature(&self, address: &str) -> Result<f32, SensorReadError> {
        match self.temperatures.lock().get(address) {
            Some(Ok(celsius)) => Ok(*celsius),
            Some(Err(reason)) => Err(SensorReadError::Malformed(reason.clone())),
            None => Err(SensorReadError::UnknownSensor(address.to_string())),
        }
    }

    fn read_contact(&self, pin: u32) -> Result<ContactState, SensorReadError> {
        Ok(self
            .contacts
            .lock()
            .get(&pin)
            .copied()
            .unwrap_or(ContactState::Closed))
    }
}

impl ActuatorDriver for SimulatedHardware {
    fn set_output(&self, pin: u32, on: bool) -> Result<(), ActuatorError> {
        if self.faulty_outputs.lock().contains(&pin) {
            return Err(ActuatorError::Io {
                pin,
                source: io::Error::other("simulated output fault"),
            });
        }
        self.outputs.lock().insert(pin, on);
        #[cfg(test)]
        self.writes.lock().push((pin, on));
        Ok(())
    }

    fn get_output(&self, pin: u32) -> bool {
        self.outputs.lock().get(&pin).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_gpio(base: &Path, pins: &[u32]) {
        for pin in pins {
            fs::create_dir_all(pin_dir(base, *pin)).unwrap();
        }
    }

    #[test]
    fn reads_w1_slave_file() {
        let dir = tempfile::tempdir().unwrap();
        let sensor_dir = dir.path().join("28-0b239a7f8c8a");
        fs::create_dir_all(&sensor_dir).unwrap();
        fs::write(
            sensor_dir.join("w1_slave"),
            "5e 01 4b 46 7f ff 0c 10 a2 : crc=a2 YES\n5e 01 4b 46 7f ff 0c 10 a2 t=21875\n",
        )
        .unwrap();

        let gpio_dir = tempfile::tempdir().unwrap();
        let gpio = Arc::new(SysfsGpio::open(gpio_dir.path(), &[], &[]).unwrap());
        let sensors = HostSensors::new(W1Bus::new(dir.path()), gpio);

        assert_eq!(sensors.read_temperature("28-0b239a7f8c8a").unwrap(), 21.9);
    }

    #[test]
    fn missing_w1_device_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let gpio_dir = tempfile::tempdir().unwrap();
        let gpio = Arc::new(SysfsGpio::open(gpio_dir.path(), &[], &[]).unwrap());
        let sensors = HostSensors::new(W1Bus::new(dir.path()), gpio);

        assert!(matches!(
            sensors.read_temperature("28-missing"),
            Err(SensorReadError::Io { .. })
        ));
    }

    #[test]
    fn sysfs_outputs_start_low_and_cache_level() {
        let base = tempfile::tempdir().unwrap();
        fake_gpio(base.path(), &[11, 23]);

        let gpio = SysfsGpio::open(base.path(), &[11], &[23]).unwrap();
        assert_eq!(
            fs::read_to_string(base.path().join("gpio11/direction")).unwrap(),
            "low"
        );
        assert_eq!(
            fs::read_to_string(base.path().join("gpio23/direction")).unwrap(),
            "in"
        );
        assert!(!gpio.get_output(11));

        gpio.set_output(11, true).unwrap();
        assert!(gpio.get_output(11));
        assert_eq!(
            fs::read_to_string(base.path().join("gpio11/value")).unwrap(),
            "1"
        );
    }

    #[test]
    fn sysfs_rejects_unregistered_output() {
        let base = tempfile::tempdir().unwrap();
        let gpio = SysfsGpio::open(base.path(), &[], &[]).unwrap();

        assert!(matches!(
            gpio.set_output(4, true),
            Err(ActuatorError::UnknownPin(4))
        ));
    }

    #[test]
    fn sysfs_contacts_follow_pull_up_wiring() {
        let base = tempfile::tempdir().unwrap();
        fake_gpio(base.path(), &[23, 27]);
        let gpio = Arc::new(SysfsGpio::open(base.path(), &[], &[23, 27]).unwrap());
        fs::write(base.path().join("gpio23/value"), "0\n").unwrap();
        fs::write(base.path().join("gpio27/value"), "1\n").unwrap();

        let w1_dir = tempfile::tempdir().unwrap();
        let sensors = HostSensors::new(W1Bus::new(w1_dir.path()), gpio);

        assert_eq!(sensors.read_contact(23).unwrap(), ContactState::Closed);
        assert_eq!(sensors.read_contact(27).unwrap(), ContactState::Open);
    }

    #[test]
    fn simulated_sensor_failure() {
        let hardware = SimulatedHardware::new();
        hardware.fail_sensor("28-a", "garbled");

        assert!(matches!(
            hardware.read_temperature("28-a"),
            Err(SensorReadError::Malformed(_))
        ));
        assert!(matches!(
            hardware.read_temperature("28-b"),
            Err(SensorReadError::UnknownSensor(_))
        ));
    }

    #[test]
    fn simulated_output_fault_keeps_previous_level() {
        let hardware = SimulatedHardware::new();
        hardware.set_output(16, true).unwrap();
        hardware.fail_output(16);

        assert!(matches!(
            hardware.set_output(16, false),
            Err(ActuatorError::Io { pin: 16, .. })
        ));
        assert!(hardware.get_output(16));
        assert_eq!(hardware.writes_to(16), vec![true]);
    }
}

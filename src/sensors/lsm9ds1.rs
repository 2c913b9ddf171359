//! Minimal LSM9DS1 driver over blocking `embedded-hal` I2C.
//!
//! Only what the relay needs: identity probe, soft reset, range setup and a
//! single burst read of accel, gyro and magnetometer outputs.

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::config::{AccelRange, GyroScale, MagGain, SensorRanges};
use crate::error::DriverError;
use crate::frame::{SideReading, Vec3};
use crate::sensors::ImuDevice;

const WHO_AM_I: u8 = 0x0F;
const XG_ID: u8 = 0x68;
const MAG_ID: u8 = 0x3D;

const CTRL_REG1_G: u8 = 0x10;
const OUT_X_L_G: u8 = 0x18;
const CTRL_REG5_XL: u8 = 0x1F;
const CTRL_REG6_XL: u8 = 0x20;
const CTRL_REG8: u8 = 0x22;
const OUT_X_L_XL: u8 = 0x28;

const CTRL_REG2_M: u8 = 0x21;
const CTRL_REG3_M: u8 = 0x22;
const OUT_X_L_M: u8 = 0x28;
// Magnetometer needs the MSB set for multi-byte auto increment
const MAG_AUTO_INCREMENT: u8 = 0x80;

const STANDARD_GRAVITY: f64 = 9.80665;

/// FS_XL bits and m/s² per LSB
fn accel_setting(range: AccelRange) -> (u8, f64) {
    let (bits, mg_per_lsb) = match range {
        AccelRange::G2 => (0b00 << 3, 0.061),
        AccelRange::G16 => (0b01 << 3, 0.732),
        AccelRange::G4 => (0b10 << 3, 0.122),
        AccelRange::G8 => (0b11 << 3, 0.244),
    };
    (bits, mg_per_lsb / 1000.0 * STANDARD_GRAVITY)
}

/// FS_M bits and gauss per LSB
fn mag_setting(gain: MagGain) -> (u8, f64) {
    let (bits, mgauss_per_lsb) = match gain {
        MagGain::Gauss4 => (0b00 << 5, 0.14),
        MagGain::Gauss8 => (0b01 << 5, 0.29),
        MagGain::Gauss12 => (0b10 << 5, 0.43),
        MagGain::Gauss16 => (0b11 << 5, 0.58),
    };
    (bits, mgauss_per_lsb / 1000.0)
}

/// FS_G bits and dps per LSB
fn gyro_setting(scale: GyroScale) -> (u8, f64) {
    let (bits, mdps_per_lsb) = match scale {
        GyroScale::Dps245 => (0b00 << 3, 8.75),
        GyroScale::Dps500 => (0b01 << 3, 17.50),
        GyroScale::Dps2000 => (0b11 << 3, 70.0),
    };
    (bits, mdps_per_lsb / 1000.0)
}

fn decode_triple(raw: &[u8; 6], scale: f64) -> Vec3 {
    let axis = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]) as f64 * scale;
    Vec3::new(axis(0), axis(2), axis(4))
}

pub struct Lsm9ds1<I2C> {
    i2c: I2C,
    xg_address: u8,
    mag_address: u8,
    accel_scale: f64,
    mag_scale: f64,
    gyro_scale: f64,
}

impl<I2C, E> Lsm9ds1<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: Debug,
{
    /// Probe, reset and configure a sensor at the given address pair
    pub fn new(
        i2c: I2C,
        xg_address: u8,
        mag_address: u8,
        ranges: SensorRanges,
    ) -> Result<Self, DriverError> {
        let mut device = Self {
            i2c,
            xg_address,
            mag_address,
            accel_scale: 0.0,
            mag_scale: 0.0,
            gyro_scale: 0.0,
        };

        device.check_identity(xg_address, XG_ID)?;
        device.check_identity(mag_address, MAG_ID)?;

        // Soft reset both dies
        device.write_register(xg_address, CTRL_REG8, 0x05)?;
        device.write_register(mag_address, CTRL_REG2_M, 0x0C)?;
        sleep(Duration::from_millis(10));

        device.configure(ranges)?;
        Ok(device)
    }

    fn configure(&mut self, ranges: SensorRanges) -> Result<(), DriverError> {
        let (accel_bits, accel_scale) = accel_setting(ranges.accel);
        let (mag_bits, mag_scale) = mag_setting(ranges.mag);
        let (gyro_bits, gyro_scale) = gyro_setting(ranges.gyro);

        // 952 Hz gyro, all accel axes, 952 Hz accel, continuous magnetometer
        self.write_register(self.xg_address, CTRL_REG1_G, 0xC0 | gyro_bits)?;
        self.write_register(self.xg_address, CTRL_REG5_XL, 0x38)?;
        self.write_register(self.xg_address, CTRL_REG6_XL, 0xC0 | accel_bits)?;
        self.write_register(self.mag_address, CTRL_REG3_M, 0x00)?;
        self.write_register(self.mag_address, CTRL_REG2_M, mag_bits)?;

        self.accel_scale = accel_scale;
        self.mag_scale = mag_scale;
        self.gyro_scale = gyro_scale;
        Ok(())
    }

    fn check_identity(&mut self, address: u8, expected: u8) -> Result<(), DriverError> {
        let mut id = [0u8; 1];
        self.read_registers(address, WHO_AM_I, &mut id)?;
        if id[0] != expected {
            return Err(DriverError::Identity {
                address,
                found: id[0],
                expected,
            });
        }
        Ok(())
    }

    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), DriverError> {
        self.i2c
            .write(address, &[register, value])
            .map_err(|e| DriverError::Bus {
                address,
                reason: format!("{:?}", e),
            })
    }

    fn read_registers(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), DriverError> {
        self.i2c
            .write_read(address, &[register], buffer)
            .map_err(|e| DriverError::Bus {
                address,
                reason: format!("{:?}", e),
            })
    }

    fn read_raw(&mut self, address: u8, register: u8) -> Result<[u8; 6], DriverError> {
        let mut raw = [0u8; 6];
        self.read_registers(address, register, &mut raw)?;
        Ok(raw)
    }
}

impl<I2C, E> ImuDevice for Lsm9ds1<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E> + Send,
    E: Debug,
{
    fn read_frame(&mut self) -> Result<SideReading, DriverError> {
        let accel = self.read_raw(self.xg_address, OUT_X_L_XL)?;
        let gyro = self.read_raw(self.xg_address, OUT_X_L_G)?;
        let mag = self.read_raw(self.mag_address, MAG_AUTO_INCREMENT | OUT_X_L_M)?;

        Ok(SideReading::new(
            decode_triple(&accel, self.accel_scale),
            decode_triple(&mag, self.mag_scale),
            decode_triple(&gyro, self.gyro_scale),
        ))
    }
}

/// Open a sensor on a Linux I2C character device (e.g. `/dev/i2c-1`)
#[cfg(target_os = "linux")]
pub fn open_linux(
    bus: &str,
    xg_address: u8,
    mag_address: u8,
    ranges: SensorRanges,
) -> Result<Lsm9ds1<linux_embedded_hal::I2cdev>, DriverError> {
    let i2c = linux_embedded_hal::I2cdev::new(bus)
        .map_err(|e| DriverError::Unavailable(format!("{}: {}", bus, e)))?;
    Lsm9ds1::new(i2c, xg_address, mag_address, ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[derive(Debug)]
    struct Nack;

    /// Register-file fake: reads return stored bytes, writes are recorded
    #[derive(Default)]
    struct FakeBus {
        registers: HashMap<(u8, u8), Vec<u8>>,
        writes: Vec<(u8, u8, u8)>,
        fail_reads: bool,
    }

    impl FakeBus {
        fn lsm9ds1(xg: u8, mag: u8) -> Self {
            let mut bus = FakeBus::default();
            bus.registers.insert((xg, WHO_AM_I), vec![XG_ID]);
            bus.registers.insert((mag, WHO_AM_I), vec![MAG_ID]);
            bus
        }
    }

    impl Write for FakeBus {
        type Error = Nack;

        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Nack> {
            self.writes.push((address, bytes[0], bytes[1]));
            Ok(())
        }
    }

    impl WriteRead for FakeBus {
        type Error = Nack;

        fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Nack> {
            if self.fail_reads {
                return Err(Nack);
            }
            let register = bytes[0] & !MAG_AUTO_INCREMENT;
            let stored = self.registers.get(&(address, register)).ok_or(Nack)?;
            buffer.copy_from_slice(&stored[..buffer.len()]);
            Ok(())
        }
    }

    fn le_triple(x: i16, y: i16, z: i16) -> Vec<u8> {
        [x, y, z].iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_identity_mismatch_is_rejected() {
        let mut bus = FakeBus::lsm9ds1(0x6A, 0x1C);
        bus.registers.insert((0x6A, WHO_AM_I), vec![0x00]);

        match Lsm9ds1::new(bus, 0x6A, 0x1C, SensorRanges::default()) {
            Err(DriverError::Identity { address, found, expected }) => {
                assert_eq!(address, 0x6A);
                assert_eq!(found, 0x00);
                assert_eq!(expected, XG_ID);
            }
            other => panic!("expected identity error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_configures_requested_ranges() {
        let bus = FakeBus::lsm9ds1(0x6B, 0x1E);
        let device = Lsm9ds1::new(bus, 0x6B, 0x1E, SensorRanges::default()).unwrap();

        let writes = &device.i2c.writes;
        assert!(writes.contains(&(0x6B, CTRL_REG6_XL, 0xC0 | 0x10)));
        assert!(writes.contains(&(0x6B, CTRL_REG1_G, 0xC0 | 0x08)));
        assert!(writes.contains(&(0x1E, CTRL_REG2_M, 0x40)));
    }

    #[test]
    fn test_read_frame_scales_raw_counts() {
        let mut bus = FakeBus::lsm9ds1(0x6A, 0x1C);
        bus.registers.insert((0x6A, OUT_X_L_XL), le_triple(0, 0, 8197));
        bus.registers.insert((0x6A, OUT_X_L_G), le_triple(100, -100, 0));
        bus.registers.insert((0x1C, OUT_X_L_M), le_triple(1000, 0, -1000));

        let mut device = Lsm9ds1::new(bus, 0x6A, 0x1C, SensorRanges::default()).unwrap();
        let reading = device.read_frame().unwrap();

        // 8197 counts at 4 g is ~1 g
        assert_relative_eq!(reading.accel.z, 9.80665, epsilon = 0.01);
        assert_relative_eq!(reading.gyro.x, 1.75, epsilon = 1e-9);
        assert_relative_eq!(reading.gyro.y, -1.75, epsilon = 1e-9);
        assert_relative_eq!(reading.mag.x, 0.43, epsilon = 1e-9);
        assert_relative_eq!(reading.mag.z, -0.43, epsilon = 1e-9);
    }

    #[test]
    fn test_bus_failure_surfaces_as_driver_error() {
        let bus = FakeBus::lsm9ds1(0x6A, 0x1C);
        let mut device = Lsm9ds1::new(bus, 0x6A, 0x1C, SensorRanges::default()).unwrap();
        device.i2c.fail_reads = true;

        assert!(matches!(
            device.read_frame(),
            Err(DriverError::Bus { address: 0x6A, .. })
        ));
    }
}

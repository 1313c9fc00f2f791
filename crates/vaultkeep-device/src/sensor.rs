//! A minimal concrete sensor controller: simulated numeric readings plus
//! a device state byte, standing in for a real hardware driver.

use rand::Rng;
use vaultkeep_core::telemetry::Telemetry;

/// Mirrors the reference configuration's thermometer profile: one
/// integer-ranged sensor, one float-ranged sensor.
pub struct SensorController {
    state: u8,
    ranges: Vec<(f32, f32)>,
}

impl SensorController {
    /// A thermometer-shaped controller: temperature in `[-120, 120]`,
    /// humidity in `[0, 100]`.
    pub fn thermometer() -> Self {
        Self { state: 0, ranges: vec![(-120.0, 120.0), (0.0, 100.0)] }
    }

    /// Advance the device's mode byte, wrapping at 4 states.
    pub fn change_state(&mut self) {
        self.state = (self.state + 1) % 4;
    }

    /// Draw a fresh reading for each configured sensor and encode it.
    pub fn read_device_bytes(&self) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        let readings = self.ranges.iter().map(|&(lo, hi)| rng.gen_range(lo..=hi)).collect();
        Telemetry { state: self.state, readings }.encode()
    }
}

//! The sensor-controller collaborator's wire record.
//!
//! This is plumbing, not authentication: the handshake and record layers
//! never look inside these bytes, they only carry them as
//! [`crate::authenticator::Authenticator::encrypt`]/`decrypt` plaintext.
//! Device and collector binaries share this module so they agree on the
//! encoding without either one reaching into the other's crate.

use thiserror::Error;

/// One snapshot of a device's simulated sensors.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// A small device "mode" byte — what the device was doing when this
    /// reading was taken. Opaque beyond that to the collector.
    pub state: u8,
    /// Simulated numeric sensor readings, in declaration order.
    pub readings: Vec<f32>,
}

#[derive(Debug, Error)]
pub enum TelemetryCodecError {
    #[error("telemetry payload too short: {0} bytes")]
    TooShort(usize),
    #[error("telemetry payload declares {declared} readings but only {available} bytes remain")]
    Truncated { declared: usize, available: usize },
}

impl Telemetry {
    /// Encode as `state(1) ‖ count(1, u8) ‖ reading[0](4, LE f32) … `.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.readings.len() * 4);
        out.push(self.state);
        out.push(self.readings.len() as u8);
        for reading in &self.readings {
            out.extend_from_slice(&reading.to_le_bytes());
        }
        out
    }

    /// Reverse [`Telemetry::encode`].
    pub fn decode(data: &[u8]) -> Result<Self, TelemetryCodecError> {
        if data.len() < 2 {
            return Err(TelemetryCodecError::TooShort(data.len()));
        }
        let state = data[0];
        let count = data[1] as usize;
        let needed = 2 + count * 4;
        if data.len() < needed {
            return Err(TelemetryCodecError::Truncated { declared: count, available: data.len() - 2 });
        }

        let mut readings = Vec::with_capacity(count);
        let mut offset = 2;
        for _ in 0..count {
            let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
            readings.push(f32::from_le_bytes(bytes));
            offset += 4;
        }
        Ok(Self { state, readings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let telemetry = Telemetry { state: 2, readings: vec![21.5, -3.25, 100.0] };
        let encoded = telemetry.encode();
        let decoded = Telemetry::decode(&encoded).unwrap();
        assert_eq!(decoded, telemetry);
    }

    #[test]
    fn empty_readings_round_trip() {
        let telemetry = Telemetry { state: 0, readings: vec![] };
        let encoded = telemetry.encode();
        assert_eq!(Telemetry::decode(&encoded).unwrap(), telemetry);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert!(matches!(Telemetry::decode(&[0u8]), Err(TelemetryCodecError::TooShort(1))));
    }

    #[test]
    fn decode_rejects_truncated_readings() {
        let mut bytes = Telemetry { state: 1, readings: vec![1.0, 2.0] }.encode();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(Telemetry::decode(&bytes), Err(TelemetryCodecError::Truncated { .. })));
    }
}

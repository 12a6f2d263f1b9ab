//! Makeblock mBot.
//!
//! Requests are little-endian payloads wrapped as `FF 55 <len> <payload>`.
//! Replies arrive as `FF 55 <index> <type> <value> 0D 0A`; a bare
//! `FF 55 0D 0A` acknowledges a command without a reply.
//!
//! ```text
//! request  ┌────┬────┬─────┬───────┬──────┬────────┬──────┬─────┐
//!          │ FF │ 55 │ len │ index │ type │ device │ port │ ... │
//!          └────┴────┴─────┴───────┴──────┴────────┴──────┴─────┘
//! reply    ┌────┬────┬───────┬────────────┬───────┬────┬────┐
//!          │ FF │ 55 │ index │ value type │ value │ 0D │ 0A │
//!          └────┴────┴───────┴────────────┴───────┴────┴────┘
//! ```

use std::ops::{Deref, DerefMut};

use robolink_bytes::{tools, LsbBuffer};
use robolink_stream::StreamReader;

use crate::error::{DeviceError, DeviceResult};

/// Sync bytes opening every frame.
pub const HEADER: [u8; 2] = [0xFF, 0x55];

/// Bytes closing every reply.
pub const FOOTER: [u8; 2] = [0x0D, 0x0A];

/// Smallest fragment the reader keeps. A bare acknowledgement falls below it
/// once the footer is stripped, so the reader drops acks.
pub const MINIMUM_SIZE: usize = 4;

/// Request kinds.
pub mod command_type {
    pub const GET: u8 = 0x01;
    pub const RUN: u8 = 0x02;
    pub const RESET: u8 = 0x04;
    pub const START: u8 = 0x05;
}

/// Device codes understood by the firmware.
pub mod device {
    pub const VERSION: u8 = 0x00;
    pub const ULTRASONIC: u8 = 0x01;
    pub const LIGHTSENSOR: u8 = 0x03;
    pub const LEDLIGHT: u8 = 0x08;
    pub const DCMOTOR: u8 = 0x0A;
    pub const LINEFOLLOWER: u8 = 0x11;
    pub const BUZZER: u8 = 0x22;
    pub const INNER_BUTTON: u8 = 0x23;
}

/// Ports on the mCore board.
pub mod port {
    pub const LINEFOLLOWER: u8 = 0x02;
    pub const ULTRASONIC: u8 = 0x03;
    pub const LIGHTSENSOR: u8 = 0x06;
    pub const LED_LIGHT: u8 = 0x07;
    pub const LEFT_MOTOR: u8 = 0x09;
    pub const RIGHT_MOTOR: u8 = 0x0A;
}

/// Slot of the on-board LED pair.
pub const LED_LIGHT_SLOT: u8 = 0x02;

/// Request indices echoed back in replies.
pub mod callback {
    pub const NONE: u8 = 0x00;
    pub const ULTRASONIC: u8 = 0x10;
    pub const LINEFOLLOWER: u8 = 0x11;
    pub const LIGHTSENSOR: u8 = 0x12;
    pub const INNER_BUTTON: u8 = 0x13;
    pub const VERSION: u8 = 0x14;
}

/// Builder for one mBot request payload.
#[derive(Debug, Clone, Default)]
pub struct MbotBuffer {
    payload: LsbBuffer,
}

impl MbotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_callback(&mut self, index: u8) -> &mut Self {
        self.payload.write_byte(index);
        self
    }

    pub fn write_type(&mut self, command_type: u8) -> &mut Self {
        self.payload.write_byte(command_type);
        self
    }

    pub fn write_device(&mut self, device: u8) -> &mut Self {
        self.payload.write_byte(device);
        self
    }

    pub fn write_port(&mut self, port: u8) -> &mut Self {
        self.payload.write_byte(port);
        self
    }

    /// Wraps the payload as `FF 55 <len> <payload>`.
    pub fn signed(&self) -> LsbBuffer {
        LsbBuffer::with_envelope(&HEADER, self.payload.as_slice())
    }
}

impl Deref for MbotBuffer {
    type Target = LsbBuffer;

    fn deref(&self) -> &LsbBuffer {
        &self.payload
    }
}

impl DerefMut for MbotBuffer {
    fn deref_mut(&mut self) -> &mut LsbBuffer {
        &mut self.payload
    }
}

impl From<MbotBuffer> for LsbBuffer {
    fn from(buffer: MbotBuffer) -> Self {
        buffer.signed()
    }
}

fn run(device: u8) -> MbotBuffer {
    let mut buffer = MbotBuffer::new();
    buffer
        .write_callback(callback::NONE)
        .write_type(command_type::RUN)
        .write_device(device);
    buffer
}

// ============================================================================
// Requests
// ============================================================================

/// Sets the on-board RGB LEDs. `index` 0 addresses both, 1 left, 2 right.
pub fn set_rgb_led(red: u8, green: u8, blue: u8, index: u8) -> MbotBuffer {
    let mut buffer = run(device::LEDLIGHT);
    buffer.write_port(port::LED_LIGHT);
    buffer
        .write_byte(LED_LIGHT_SLOT)
        .write_byte(index)
        .write_byte(red)
        .write_byte(green)
        .write_byte(blue);
    buffer
}

/// Plays a tone on the buzzer.
pub fn play_tone(frequency: u16, duration_ms: u16) -> MbotBuffer {
    let mut buffer = run(device::BUZZER);
    buffer
        .write_short(i32::from(frequency))
        .write_short(i32::from(duration_ms));
    buffer
}

/// Sets the power of the motor on `port`. Negative power reverses.
pub fn move_power(power: i16, port: u8) -> MbotBuffer {
    let mut buffer = run(device::DCMOTOR);
    buffer.write_port(port);
    buffer.write_short(i32::from(power));
    buffer
}

/// Drives straight: the left motor is mounted mirrored.
pub fn drive(power: i16) -> [MbotBuffer; 2] {
    [
        move_power(power.saturating_neg(), port::LEFT_MOTOR),
        move_power(power, port::RIGHT_MOTOR),
    ]
}

/// Spins in place.
pub fn rotate(power: i16) -> [MbotBuffer; 2] {
    [
        move_power(power, port::LEFT_MOTOR),
        move_power(power, port::RIGHT_MOTOR),
    ]
}

/// Requests one sensor reading, answered with `index`.
pub fn get_sensor_data(index: u8, device: u8, port: u8) -> MbotBuffer {
    let mut buffer = MbotBuffer::new();
    buffer
        .write_callback(index)
        .write_type(command_type::GET)
        .write_device(device)
        .write_port(port);
    buffer
}

/// Requests the firmware version string.
pub fn get_version() -> MbotBuffer {
    let mut buffer = MbotBuffer::new();
    buffer
        .write_callback(callback::VERSION)
        .write_type(command_type::GET)
        .write_device(device::VERSION);
    buffer
}

/// Resets the board.
pub fn reset() -> MbotBuffer {
    let mut buffer = MbotBuffer::new();
    buffer
        .write_callback(callback::NONE)
        .write_type(command_type::RESET);
    buffer
}

pub fn start() -> MbotBuffer {
    let mut buffer = MbotBuffer::new();
    buffer
        .write_callback(callback::NONE)
        .write_type(command_type::START);
    buffer
}

/// Resets the board, turns the LEDs off and stops both motors.
pub fn stop() -> Vec<MbotBuffer> {
    vec![
        reset(),
        set_rgb_led(0, 0, 0, 0),
        move_power(0, port::LEFT_MOTOR),
        move_power(0, port::RIGHT_MOTOR),
    ]
}

// ============================================================================
// Replies
// ============================================================================

/// Frame reader for mBot replies.
pub fn reader() -> StreamReader {
    StreamReader::new()
        .with_header(&HEADER)
        .with_footer(&FOOTER)
        .with_minimum_size(MINIMUM_SIZE)
}

/// A decoded reply value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Float(f32),
    Short(i16),
    Text(String),
}

/// One reply, matched to its request by `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub index: u8,
    pub value: Value,
}

/// Decodes a reply frame with the footer already removed.
pub fn decode_reply(frame: &[u8]) -> DeviceResult<Reply> {
    DeviceError::require(frame, 4)?;
    if frame[..2] != HEADER {
        return Err(DeviceError::BadHeader(frame[..2].to_vec()));
    }

    let index = frame[2];
    let data = &frame[4..];
    let value = match frame[3] {
        0x01 => {
            DeviceError::require(data, 1)?;
            Value::Byte(data[0])
        }
        // Firmware doubles are 32-bit on AVR.
        0x02 | 0x05 => Value::Float(tools::bytes_to_float32_le(data)?),
        0x03 => {
            DeviceError::require(data, 2)?;
            Value::Short(i16::from_le_bytes([data[0], data[1]]))
        }
        0x04 => {
            DeviceError::require(data, 1)?;
            let len = usize::from(data[0]);
            let text = data.get(1..1 + len).unwrap_or(&data[1..]);
            Value::Text(tools::to_text(text))
        }
        other => return Err(DeviceError::UnknownValueType(other)),
    };

    log::trace!("mbot reply index {:#04x}: {:?}", index, value);
    Ok(Reply { index, value })
}

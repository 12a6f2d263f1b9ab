//! LEGO WeDo 2.0 hub.
//!
//! The hub has no envelope: each request is a plain little-endian payload
//! written to a GATT characteristic, carried as the buffer's routing tag.
//! Output commands are `<channel> <command> <len> <data>`.

use robolink_bytes::LsbBuffer;

/// Characteristic accepting output commands (motors, tone, LED).
pub const OUTPUT_COMMAND: &str = "00001565-1212-efde-1523-785feabcd123";

/// Characteristic accepting sensor configuration.
pub const INPUT_COMMAND: &str = "00001563-1212-efde-1523-785feabcd123";

/// Hub channels.
pub mod channel {
    pub const PORT1: u8 = 0x01;
    pub const PORT2: u8 = 0x02;
    pub const CURRENT: u8 = 0x03;
    pub const VOLTAGE: u8 = 0x04;
    pub const TONE: u8 = 0x05;
    pub const RGB: u8 = 0x06;
}

/// Attachable device types.
pub mod device {
    pub const MOTOR: u8 = 0x01;
    pub const GYROSCOPE: u8 = 0x22;
    pub const MOTION: u8 = 0x23;
}

/// Motor power for speed levels 0 to 9.
pub const SPEED: [u8; 10] = [0x00, 0x2A, 0x30, 0x36, 0x3D, 0x44, 0x4A, 0x50, 0x5E, 0x7F];

/// Motor power for a speed level; levels above 9 clamp to full power.
pub fn speed(level: usize) -> u8 {
    SPEED[level.min(SPEED.len() - 1)]
}

fn output(channel: u8, command: u8, len: u8) -> LsbBuffer {
    let mut buffer = LsbBuffer::new();
    buffer.set_routing_tag(OUTPUT_COMMAND);
    buffer.write_byte(channel).write_byte(command).write_byte(len);
    buffer
}

/// Plays a tone on the hub's piezo.
pub fn play_tone(frequency: u16, duration_ms: u16) -> LsbBuffer {
    let mut buffer = output(channel::TONE, 0x02, 4);
    buffer
        .write_short(i32::from(frequency))
        .write_short(i32::from(duration_ms));
    buffer
}

/// Sets the hub LED to a predefined colour: 1-9, 0 is off.
pub fn set_rgb(color: u8) -> LsbBuffer {
    let mut buffer = output(channel::RGB, 0x04, 1);
    buffer.write_byte(color);
    buffer
}

/// Sets motor power on `port`: 0-127 forward, 255 down to 129 backward.
pub fn move_power(power: u8, port: u8) -> LsbBuffer {
    let mut buffer = output(port, 0x01, 1);
    buffer.write_byte(power);
    buffer
}

/// Selects the reporting mode of the sensor on `port`.
pub fn set_sensor_mode(port: u8, device_type: u8, mode: u8) -> LsbBuffer {
    let mut buffer = LsbBuffer::new();
    buffer.set_routing_tag(INPUT_COMMAND);
    buffer
        .write_byte(0x01)
        .write_byte(0x02)
        .write_byte(port)
        .write_byte(device_type)
        .write_byte(mode)
        .write_byte(0x01)
        .write_byte(0x00)
        .write_byte(0x00)
        .write_byte(0x00)
        .write_byte(0x02)
        .write_byte(0x01);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_tone() {
        let buffer = play_tone(440, 500);
        assert_eq!(
            buffer.as_slice(),
            &[0x05, 0x02, 0x04, 0xB8, 0x01, 0xF4, 0x01]
        );
        assert_eq!(buffer.routing_tag(), Some(OUTPUT_COMMAND));
    }

    #[test]
    fn test_set_rgb() {
        assert_eq!(set_rgb(3).as_slice(), &[0x06, 0x04, 0x01, 0x03]);
    }

    #[test]
    fn test_move_power() {
        assert_eq!(
            move_power(speed(9), channel::PORT2).as_slice(),
            &[0x02, 0x01, 0x01, 0x7F]
        );
    }

    #[test]
    fn test_set_sensor_mode() {
        let buffer = set_sensor_mode(channel::PORT1, device::MOTION, 0x00);
        assert_eq!(
            buffer.as_slice(),
            &[0x01, 0x02, 0x01, 0x23, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x01]
        );
        assert_eq!(buffer.routing_tag(), Some(INPUT_COMMAND));
    }

    #[test]
    fn test_speed_clamps() {
        assert_eq!(speed(0), 0x00);
        assert_eq!(speed(5), 0x44);
        assert_eq!(speed(42), 0x7F);
    }
}

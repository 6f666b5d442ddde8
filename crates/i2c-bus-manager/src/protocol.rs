//! Command-sequence assembly for 7-bit and 10-bit I2C addressing.
//!
//! Addresses up to 127 are framed as 7-bit, anything above as 10-bit; there
//! is no separate flag. A 10-bit receive needs the write-direction header
//! and low address byte first, then a repeated start with the
//! read-direction header before any data can be clocked in.

use heapless::Vec;

/// Largest address framed as 7-bit; anything above is treated as 10-bit.
pub const ADDRESS_MAX_7BIT: u16 = 127;

const READ: u8 = 1;
const WRITE: u8 = 0;

/// One step of an I2C transaction, submitted to the driver as part of a
/// sequence.
#[derive(Debug, PartialEq, Eq)]
pub enum Op<'a> {
    /// Start (or repeated start) condition.
    Start,
    /// A single address or header byte, ack checked.
    WriteByte(u8),
    /// Payload bytes, each ack checked.
    Write(&'a [u8]),
    /// Read bytes, acking every one.
    Read(&'a mut [u8]),
    /// Read the final byte and nack it to end the transfer.
    ReadLast(&'a mut [u8]),
    /// Stop condition.
    Stop,
}

/// A complete command sequence. Capacity 8 covers the longest case, a
/// 10-bit receive.
pub type OpSeq<'a> = Vec<Op<'a>, 8>;

fn seven_bit(address: u16, rw: u8) -> u8 {
    ((address as u8) << 1) | rw
}

fn ten_bit_header(address: u16, rw: u8) -> u8 {
    0xF0 | (((address >> 7) as u8) & 0x06) | rw
}

fn ten_bit_low(address: u16) -> u8 {
    (address & 0xFF) as u8
}

/// Build the command sequence for a controller send.
///
/// Empty `data` probes the address: only the address phase (and stop,
/// unless `no_stop`) is issued.
pub fn encode_send<'a>(address: u16, data: &'a [u8], no_stop: bool) -> OpSeq<'a> {
    // The sequence capacity is sized for the longest encoding, so the
    // pushes below cannot fail.
    let mut ops = OpSeq::new();
    let _ = ops.push(Op::Start);
    if address > ADDRESS_MAX_7BIT {
        let _ = ops.push(Op::WriteByte(ten_bit_header(address, WRITE)));
        let _ = ops.push(Op::WriteByte(ten_bit_low(address)));
    } else {
        let _ = ops.push(Op::WriteByte(seven_bit(address, WRITE)));
    }
    if !data.is_empty() {
        let _ = ops.push(Op::Write(data));
    }
    if !no_stop {
        let _ = ops.push(Op::Stop);
    }
    ops
}

/// Build the command sequence for a controller receive.
///
/// Every byte but the last is acked; the final byte is nacked to end the
/// transfer. An empty buffer issues only the address phase and stop.
pub fn encode_receive<'a>(address: u16, buffer: &'a mut [u8]) -> OpSeq<'a> {
    let mut ops = OpSeq::new();
    let _ = ops.push(Op::Start);
    if address > ADDRESS_MAX_7BIT {
        let _ = ops.push(Op::WriteByte(ten_bit_header(address, WRITE)));
        let _ = ops.push(Op::WriteByte(ten_bit_low(address)));
        let _ = ops.push(Op::Start);
        let _ = ops.push(Op::WriteByte(ten_bit_header(address, READ)));
    } else {
        let _ = ops.push(Op::WriteByte(seven_bit(address, READ)));
    }
    let len = buffer.len();
    if len > 1 {
        let (head, tail) = buffer.split_at_mut(len - 1);
        let _ = ops.push(Op::Read(head));
        let _ = ops.push(Op::ReadLast(tail));
    } else if len == 1 {
        let _ = ops.push(Op::ReadLast(buffer));
    }
    let _ = ops.push(Op::Stop);
    ops
}

//! LEB128-style unsigned varints, shared by the payload format and the
//! external sort run files.

use std::io::{self, Read};

pub(crate) fn push_uvarint(mut v: u64, out: &mut Vec<u8>) {
    loop {
        let mut b = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            b |= 0x80;
        }
        out.push(b);
        if v == 0 {
            break;
        }
    }
}

pub(crate) fn read_uvarint(buf: &[u8], mut off: usize) -> Option<(u64, usize)> {
    let (mut x, mut s) = (0u64, 0u32);
    for _ in 0..10 {
        let b = *buf.get(off)? as u64;
        off += 1;
        x |= (b & 0x7f) << s;
        if b & 0x80 == 0 {
            return Some((x, off));
        }
        s += 7;
    }
    None
}

/// Read one uvarint from a stream. `Ok(None)` means clean EOF before the
/// first byte; EOF inside a value is an error.
pub(crate) fn read_uvarint_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Option<u64>> {
    let (mut x, mut s) = (0u64, 0u32);
    let mut first = true;
    loop {
        let mut b = [0u8; 1];
        match r.read(&mut b) {
            Ok(0) => {
                return if first {
                    Ok(None)
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated uvarint",
                    ))
                };
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
        first = false;
        x |= ((b[0] & 0x7f) as u64) << s;
        if b[0] & 0x80 == 0 {
            return Ok(Some(x));
        }
        s += 7;
        if s >= 70 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "uvarint too long",
            ));
        }
    }
}

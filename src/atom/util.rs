use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::Result;

/// Big-endian primitive reads over any [`Read`].
pub trait ReadUtil: Read {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_be_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_be_i16(&mut self) -> Result<i16> {
        Ok(self.read_be_u16()? as i16)
    }

    fn read_be_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_be_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    fn read_fourcc(&mut self) -> Result<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_u8_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let buf = self.read_u8_vec(len)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl<T: Read + ?Sized> ReadUtil for T {}

/// Seek helpers used by bounds-only scanning.
pub trait SeekUtil: Seek {
    fn remaining_stream_len(&mut self) -> Result<u64> {
        let current = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(current))?;
        Ok(end.saturating_sub(current))
    }

    fn skip(&mut self, amount: i64) -> Result<u64> {
        Ok(self.seek(SeekFrom::Current(amount))?)
    }
}

impl<T: Seek + ?Sized> SeekUtil for T {}

/// Big-endian primitive writes over any [`Write`].
pub trait WriteUtil: Write {
    fn write_u8(&mut self, n: u8) -> Result<()> {
        self.write_all(&[n])?;
        Ok(())
    }

    fn write_be_u16(&mut self, n: u16) -> Result<()> {
        self.write_all(&n.to_be_bytes())?;
        Ok(())
    }

    fn write_be_i16(&mut self, n: i16) -> Result<()> {
        self.write_be_u16(n as u16)
    }

    fn write_be_u32(&mut self, n: u32) -> Result<()> {
        self.write_all(&n.to_be_bytes())?;
        Ok(())
    }

    fn write_be_u64(&mut self, n: u64) -> Result<()> {
        self.write_all(&n.to_be_bytes())?;
        Ok(())
    }

    fn write_fourcc(&mut self, fourcc: &[u8; 4]) -> Result<()> {
        self.write_all(fourcc)?;
        Ok(())
    }

    fn write_utf8(&mut self, s: &str) -> Result<()> {
        self.write_all(s.as_bytes())?;
        Ok(())
    }
}

impl<T: Write + ?Sized> WriteUtil for T {}

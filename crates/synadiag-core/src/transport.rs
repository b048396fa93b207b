//! Byte-stream transport trait
//!
//! Both protocols reach the controller through one character device. RMI
//! is register indexed and passes `Some(address)` so the backend seeks
//! before every transfer. TCM is a FIFO and passes `None`.
//!
//! All sleeping inside protocol code goes through [`Transport::delay_ms`],
//! which lets simulated transports run poll loops without wall-clock time.

use crate::error::{Error, Result};

/// Low-level access to a touch controller
pub trait Transport {
    /// Read into `buf`, seeking to `addr` first when given.
    ///
    /// Returns the number of bytes transferred.
    fn read(&mut self, addr: Option<u16>, buf: &mut [u8]) -> Result<usize>;

    /// Write `data`, seeking to `addr` first when given.
    fn write(&mut self, addr: Option<u16>, data: &[u8]) -> Result<usize>;

    /// Enable or disable driver raw mode (interrupt handling bypassed)
    fn set_raw_mode(&mut self, raw: bool) -> Result<()>;

    /// Enable or disable the driver's interrupt handling
    fn set_irq(&mut self, enable: bool) -> Result<()>;

    /// Pulse the controller reset line through the driver
    fn hardware_reset(&mut self) -> Result<()>;

    /// Block for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Read exactly `buf.len()` bytes from register `addr`
    fn read_register(&mut self, addr: u16, buf: &mut [u8]) -> Result<()> {
        let n = self.read(Some(addr), buf)?;
        if n != buf.len() {
            return Err(Error::short_transfer("register read", buf.len(), n));
        }
        Ok(())
    }

    /// Read a single byte register
    fn read_byte(&mut self, addr: u16) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_register(addr, &mut b)?;
        Ok(b[0])
    }

    /// Write all of `data` to register `addr`
    fn write_register(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        let n = self.write(Some(addr), data)?;
        if n != data.len() {
            return Err(Error::short_transfer("register write", data.len(), n));
        }
        Ok(())
    }

    /// Write a single byte register
    fn write_byte(&mut self, addr: u16, value: u8) -> Result<()> {
        self.write_register(addr, &[value])
    }

    /// Read exactly `buf.len()` bytes from the FIFO
    fn read_fifo(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = self.read(None, buf)?;
        if n != buf.len() {
            return Err(Error::short_transfer("fifo read", buf.len(), n));
        }
        Ok(())
    }

    /// Write all of `data` to the FIFO
    fn write_fifo(&mut self, data: &[u8]) -> Result<()> {
        let n = self.write(None, data)?;
        if n != data.len() {
            return Err(Error::short_transfer("fifo write", data.len(), n));
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, addr: Option<u16>, buf: &mut [u8]) -> Result<usize> {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: Option<u16>, data: &[u8]) -> Result<usize> {
        (**self).write(addr, data)
    }

    fn set_raw_mode(&mut self, raw: bool) -> Result<()> {
        (**self).set_raw_mode(raw)
    }

    fn set_irq(&mut self, enable: bool) -> Result<()> {
        (**self).set_irq(enable)
    }

    fn hardware_reset(&mut self) -> Result<()> {
        (**self).hardware_reset()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport that returns fewer bytes than asked for
    struct Short;

    impl Transport for Short {
        fn read(&mut self, _addr: Option<u16>, buf: &mut [u8]) -> Result<usize> {
            Ok(buf.len().saturating_sub(1))
        }
        fn write(&mut self, _addr: Option<u16>, data: &[u8]) -> Result<usize> {
            Ok(data.len())
        }
        fn set_raw_mode(&mut self, _raw: bool) -> Result<()> {
            Ok(())
        }
        fn set_irq(&mut self, _enable: bool) -> Result<()> {
            Ok(())
        }
        fn hardware_reset(&mut self) -> Result<()> {
            Ok(())
        }
        fn delay_ms(&mut self, _ms: u32) {}
    }

    #[test]
    fn test_short_register_read_is_io_error() {
        let mut t = Short;
        let mut buf = [0u8; 4];
        let err = t.read_register(0x10, &mut buf).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(t.write_byte(0x10, 1).is_ok());
    }

    #[test]
    fn test_boxed_transport_forwards() {
        let mut t: Box<dyn Transport> = Box::new(Short);
        let mut buf = [0u8; 2];
        assert_eq!(t.read(None, &mut buf).unwrap(), 1);
    }
}

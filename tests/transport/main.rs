use libiot_ingest::network::error::Error;
use libiot_ingest::network::*;

mod client;

/// In-memory connection that replays a canned response and records writes.
#[derive(Debug)]
struct MockConnection {
    incoming: Vec<u8>,
    read_pos: usize,
    written: Vec<u8>,
    max_read: usize,
    is_open: bool,
}

impl MockConnection {
    fn replying(data: &[u8]) -> Self {
        Self {
            incoming: data.to_vec(),
            read_pos: 0,
            written: Vec::new(),
            max_read: usize::MAX,
            is_open: true,
        }
    }

    /// Limits every read to `max_read` bytes, as a slow socket would.
    fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read;
        self
    }

    fn written_text(&self) -> &str {
        core::str::from_utf8(&self.written).unwrap()
    }
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.is_open {
            return Err(Error::NotOpen);
        }
        let readable = self.incoming.len() - self.read_pos;
        let len = buf.len().min(readable).min(self.max_read);
        buf[..len].copy_from_slice(&self.incoming[self.read_pos..self.read_pos + len]);
        self.read_pos += len;
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.is_open {
            return Err(Error::NotOpen);
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if !self.is_open {
            return Err(Error::NotOpen);
        }
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(mut self) -> Result<(), Self::Error> {
        self.is_open = false;
        Ok(())
    }
}

impl Connection for MockConnection {}

#[test]
fn test_read_write() {
    let mut conn = MockConnection::replying(&[5, 6, 7, 8]);
    let write_data = [1, 2, 3, 4];

    let bytes_written = conn.write(&write_data).unwrap();
    assert_eq!(bytes_written, write_data.len());
    assert_eq!(conn.written, write_data);

    let mut read_buf = [0; 4];
    let bytes_read = conn.read(&mut read_buf).unwrap();
    assert_eq!(bytes_read, 4);
    assert_eq!(read_buf, [5, 6, 7, 8]);
    assert_eq!(conn.read(&mut read_buf), Ok(0));
}

#[test]
fn test_op_on_closed_connection() {
    let mut conn = MockConnection::replying(b"");
    conn.is_open = false;

    let mut buf = [0; 4];
    assert_eq!(conn.read(&mut buf), Err(Error::NotOpen));
    assert_eq!(conn.write(&[1, 2]), Err(Error::NotOpen));
    assert_eq!(conn.flush(), Err(Error::NotOpen));
}

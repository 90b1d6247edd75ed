use std::io::{self, ErrorKind, Read, Write};

/// Size of the intermediate buffer used by [`copy`].
pub const COPY_BUFFER_SIZE: usize = 4096;

/// Drain `reader` into `writer` and return the number of bytes copied.
///
/// Works for any byte streams, not only blobs.
pub fn copy<R, W>(reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut count = 0u64;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => return Ok(count),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        count += n as u64;
    }
}

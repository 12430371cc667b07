use std::io::{self, Read, Seek, SeekFrom};

pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u16_le<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32_le<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_i32_le<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub fn read_bytes<R: Read>(reader: &mut R, length: usize) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Not enough bytes remaining for read_bytes({})", length),
        )
    })?;
    Ok(buffer)
}

/// Reads a fixed-width, NUL-padded name field and lowercases it.
pub fn read_fixed_name<R: Read>(reader: &mut R, width: usize) -> io::Result<String> {
    let raw = read_bytes(reader, width)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).to_lowercase())
}

pub fn skip<R: Seek>(reader: &mut R, count: i64) -> io::Result<()> {
    reader.seek(SeekFrom::Current(count))?;
    Ok(())
}

pub fn seek_to<R: Seek>(reader: &mut R, position: u64) -> io::Result<()> {
    let end = reader.seek(SeekFrom::End(0))?;
    if position > end {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Cannot seek to position {} (stream length: {})",
                position, end
            ),
        ));
    }

    reader.seek(SeekFrom::Start(position))?;
    Ok(())
}

pub fn stream_len<R: Seek>(reader: &mut R) -> io::Result<u64> {
    let current = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(current))?;
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_little_endian_values() {
        let data = [0x01u8, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut cursor = Cursor::new(&data[..]);
        assert_eq!(read_u8(&mut cursor).unwrap(), 1);
        assert_eq!(read_u16_le(&mut cursor).unwrap(), 0x1234);
        assert_eq!(read_u32_le(&mut cursor).unwrap(), 0x1234_5678);
        assert_eq!(read_i32_le(&mut cursor).unwrap(), -1);
        assert!(read_u8(&mut cursor).is_err());
    }

    #[test]
    fn fixed_name_stops_at_nul_and_lowercases() {
        let mut data = b"TEST.DEF".to_vec();
        data.resize(16, 0);
        data.extend_from_slice(b"junk");
        let mut cursor = Cursor::new(&data[..]);
        assert_eq!(read_fixed_name(&mut cursor, 16).unwrap(), "test.def");
        assert_eq!(cursor.position(), 16);
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let data = [0u8; 4];
        let mut cursor = Cursor::new(&data[..]);
        assert!(seek_to(&mut cursor, 5).is_err());
        seek_to(&mut cursor, 4).unwrap();
        assert_eq!(stream_len(&mut cursor).unwrap(), 4);
    }
}

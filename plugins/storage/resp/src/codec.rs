use relay_api::StoreError;

/// Decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    Simple(String),
    Error(String),
    Integer(i64),
    /// `None` = null bulk string (`$-1`).
    Bulk(Option<String>),
    /// `None` = null array (`*-1`).
    Array(Option<Vec<RespValue>>),
}

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command(args: &[&str], buf: &mut Vec<u8>) {
    buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
}

/// Decode one frame from the front of `buf`.
///
/// `Ok(None)` — frame incomplete, read more. `Ok(Some((value, consumed)))` —
/// caller drops `consumed` bytes. `Err` — the stream is out of sync.
pub fn decode(buf: &[u8]) -> Result<Option<(RespValue, usize)>, StoreError> {
    decode_at(buf, 0)
}

fn decode_at(buf: &[u8], pos: usize) -> Result<Option<(RespValue, usize)>, StoreError> {
    let Some((line, next)) = read_line(buf, pos) else {
        return Ok(None);
    };
    let Some((&tag, body)) = line.split_first() else {
        return Err(StoreError::protocol("empty RESP line"));
    };
    let text = std::str::from_utf8(body)?;

    match tag {
        b'+' => Ok(Some((RespValue::Simple(text.to_string()), next))),
        b'-' => Ok(Some((RespValue::Error(text.to_string()), next))),
        b':' => Ok(Some((RespValue::Integer(text.parse()?), next))),
        b'$' => {
            let len: i64 = text.parse()?;
            if len < 0 {
                return Ok(Some((RespValue::Bulk(None), next)));
            }
            let end = next + len as usize;
            // payload + CRLF
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(StoreError::protocol("bulk string not terminated by CRLF"));
            }
            let payload = String::from_utf8(buf[next..end].to_vec())?;
            Ok(Some((RespValue::Bulk(Some(payload)), end + 2)))
        }
        b'*' => {
            let len: i64 = text.parse()?;
            if len < 0 {
                return Ok(Some((RespValue::Array(None), next)));
            }
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            let mut cursor = next;
            for _ in 0..len {
                match decode_at(buf, cursor)? {
                    Some((item, after)) => {
                        items.push(item);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(Some(items)), cursor)))
        }
        other => Err(StoreError::protocol(format!(
            "unknown RESP type byte 0x{other:02x}"
        ))),
    }
}

/// Line starting at `pos` without its CRLF, and the offset after it.
fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..end], pos + end + 2))
}

//! The `chunked` transfer coding.

use crate::{coding::registry::TransferCoding, errors::Fault};
use memchr::memmem;

/// Implements the `chunked` transfer coding's decode grammar.
///
/// `encode` is the identity: chunked framing is removed before the codec
/// layer ever sees a response body, so there is nothing to re-encode.
///
/// `decode` accepts chunk extensions syntactically (`1a;foo=bar` reads as
/// size `0x1a`) but never interprets them, and does not support trailer
/// headers - the terminal `0\r\n\r\n` is consumed as trailer-less
/// termination.
pub struct ChunkedCoding;

const TERMINATOR: &[u8] = b"0\r\n\r\n";

impl TransferCoding for ChunkedCoding {
    fn name(&self) -> &str {
        "chunked"
    }

    fn encode(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, Fault> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        if !bytes.ends_with(TERMINATOR) {
            return Err(Fault::malformed(
                "chunked body does not end with the 0\\r\\n\\r\\n terminator",
            ));
        }

        let mut out = Vec::new();
        let mut at = 0;
        loop {
            // read-size mode: accumulate until a bare CRLF
            let line_end = match memmem::find(&bytes[at..], b"\r\n") {
                Some(rel) => at + rel,
                // unreachable while the terminator check holds
                None => {
                    return Err(Fault::malformed("chunk size line is missing its CRLF"));
                }
            };
            let size = parse_chunk_size(&bytes[at..line_end])?;
            at = line_end + 2;

            // a zero-size chunk terminates the stream
            if size == 0 {
                break;
            }

            // read-data mode: copy exactly `size` bytes
            let data_end = at + size;
            if data_end > bytes.len() {
                return Err(Fault::malformed(
                    "chunk data is shorter than its declared size",
                ));
            }
            out.extend_from_slice(&bytes[at..data_end]);
            at = data_end;

            // the CRLF closing the chunk data
            if bytes[at..].starts_with(b"\r\n") {
                at += 2;
            }
        }

        Ok(out)
    }
}

// The size token, after discarding extensions, is a non-negative
// hexadecimal integer. Bad hex and negative sizes are distinguishable
// from a missing terminator by their messages.
fn parse_chunk_size(token: &[u8]) -> Result<usize, Fault> {
    let text = std::str::from_utf8(token)
        .map_err(|_| Fault::malformed("chunk size line is not valid text"))?;
    let token = text
        .trim()
        .split(|c: char| c == ';' || c.is_whitespace())
        .next()
        .unwrap_or("");

    let size = i64::from_str_radix(token, 16)
        .map_err(|_| Fault::malformed(format!("chunk size {token:?} is not in hexadecimal")))?;
    if size < 0 {
        return Err(Fault::malformed("chunk size is negative"));
    }

    usize::try_from(size).map_err(|_| Fault::malformed("chunk size is out of range"))
}

#[cfg(test)]
mod chunked_self {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<Vec<u8>, Fault> {
        ChunkedCoding.decode(bytes)
    }

    #[test]
    fn encode_is_identity() {
        assert_eq!(ChunkedCoding.encode(b"anything"), b"anything".to_vec());
        assert_eq!(ChunkedCoding.encode(b""), Vec::<u8>::new());
    }

    #[test]
    fn decode_fragments() {
        #[rustfmt::skip]
        let cases: [(&[u8], &[u8]); 6] = [
            (b"",                                          b""),
            (b"0\r\n\r\n",                                 b""),
            (b"5\r\nhello\r\n0\r\n\r\n",                   b"hello"),
            (b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",    b"hello world"),
            (b"1\r\na\r\n1\r\nb\r\n1\r\nc\r\n0\r\n\r\n",   b"abc"),
            // chunk data may itself contain CRLF
            (b"6\r\na\r\nb\r\n\r\n0\r\n\r\n",              b"a\r\nb\r\n"),
        ];

        for (input, expected) in cases {
            assert_eq!(
                decode(input).unwrap(),
                expected.to_vec(),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn extensions_are_discarded() {
        // "1a;foo=bar" parses as 0x1a and the extension is ignored
        let payload = b"abcdefghijklmnopqrstuvwxyz"; // 26 == 0x1a bytes
        let mut input = b"1a;foo=bar\r\n".to_vec();
        input.extend_from_slice(payload);
        input.extend_from_slice(b"\r\n0\r\n\r\n");
        assert_eq!(decode(&input).unwrap(), payload.to_vec());

        // whitespace-delimited extension text is discarded the same way
        let input = b"5 ignored\r\nhello\r\n0\r\n\r\n";
        assert_eq!(decode(input).unwrap(), b"hello".to_vec());
    }

    #[test]
    fn missing_terminator() {
        #[rustfmt::skip]
        let cases: [&[u8]; 4] = [
            b"5\r\nhello\r\n",
            b"5\r\nhello\r\n0\r\n",
            b"0\r\n",
            b"hello",
        ];

        for input in cases {
            let fault = decode(input).unwrap_err();
            assert!(
                fault.to_string().contains("terminator"),
                "input {input:?} gave {fault}"
            );
        }
    }

    #[test]
    fn bad_chunk_size_is_distinct_from_missing_terminator() {
        let fault = decode(b"zz\r\nhello\r\n0\r\n\r\n").unwrap_err();
        assert!(fault.to_string().contains("not in hexadecimal"), "{fault}");

        let fault = decode(b"-5\r\nhello\r\n0\r\n\r\n").unwrap_err();
        assert!(fault.to_string().contains("negative"), "{fault}");

        // both are malformed-input faults
        assert_eq!(
            decode(b"zz\r\n0\r\n\r\n").unwrap_err().status(),
            crate::StatusCode::BadRequest
        );
    }

    #[test]
    fn truncated_chunk_data() {
        // declared size runs past the terminator
        let fault = decode(b"ff\r\nshort\r\n0\r\n\r\n").unwrap_err();
        assert!(fault.to_string().contains("shorter"), "{fault}");
    }
}

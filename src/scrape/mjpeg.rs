//! Time-lapse bundles arrive as one multipart body with `--frame\r\n`
//! boundaries. Each part carries a small header block followed by a JPEG.

const FRAME_BOUNDARY: &[u8] = b"--frame\r\n";
/// Parts this short are headers or trailers, not frames.
const MIN_PART_BYTES: usize = 100;

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_jpeg_start(part: &[u8]) -> Option<usize> {
    part.windows(2).position(|w| w == [0xFF, 0xD8])
}

/// Split a time-lapse body into JPEG payloads, in stream order.
pub fn split_frames(body: &[u8]) -> Vec<&[u8]> {
    let mut parts = Vec::new();
    let mut rest = body;
    loop {
        let (part, next) = match find_subslice(rest, FRAME_BOUNDARY) {
            Some(at) => (&rest[..at], Some(&rest[at + FRAME_BOUNDARY.len()..])),
            None => (rest, None),
        };
        if part.len() > MIN_PART_BYTES {
            if let Some(start) = find_jpeg_start(part) {
                parts.push(&part[start..]);
            }
        }
        match next {
            Some(next) => rest = next,
            None => break,
        }
    }
    parts
}

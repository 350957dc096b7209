const COMPONENT_CHARS: [char; 4] = ['x', 'y', 'z', 'w'];

/// Parses a swizzle like `xzy` or `rgba` into component indices and a count.
pub fn swizzle_indices(x: &str, src_component_count: u8) -> Option<([u8; 4], u8)> {
    let bytes = x.as_bytes();
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }

    let mut components = [0u8; 4];
    for (n, &c) in bytes.iter().enumerate() {
        components[n] = swizzle_index(c, src_component_count)?;
    }

    Some((components, bytes.len() as u8))
}

pub const fn swizzle_index(x: u8, src_component_count: u8) -> Option<u8> {
    match x {
        b'r' | b'R' | b'x' | b'X' if src_component_count >= 1 => Some(0),
        b'g' | b'G' | b'y' | b'Y' if src_component_count >= 2 => Some(1),
        b'b' | b'B' | b'z' | b'Z' if src_component_count >= 3 => Some(2),
        b'a' | b'A' | b'w' | b'W' if src_component_count >= 4 => Some(3),
        _ => None,
    }
}

pub fn swizzle_to_string(components: &[u8]) -> String {
    components
        .iter()
        .map(|&c| COMPONENT_CHARS[c as usize])
        .collect()
}

/// Parses a write mask such as `xz`; channels must be increasing.
pub fn write_mask_from_str(x: &str) -> Option<u8> {
    let mut mask = 0u8;
    let mut last = None;
    for c in x.bytes() {
        let index = swizzle_index(c, 4)?;
        if last.is_some_and(|l| l >= index) {
            return None;
        }
        last = Some(index);
        mask |= 1 << index;
    }

    Some(mask)
}

pub fn write_mask_to_string(mask: u8) -> String {
    (0..4)
        .filter(|&n| mask & (1 << n) != 0)
        .map(|n| COMPONENT_CHARS[n])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swizzle_respects_source_width() {
        assert_eq!(swizzle_indices("zyx", 3), Some(([2, 1, 0, 0], 3)));
        assert_eq!(swizzle_indices("w", 3), None);
        assert_eq!(swizzle_indices("xxxxx", 4), None);
    }

    #[test]
    fn write_mask_must_be_increasing() {
        assert_eq!(write_mask_from_str("xz"), Some(0b0101));
        assert_eq!(write_mask_from_str("zx"), None);
        assert_eq!(write_mask_to_string(0b1010), "yw");
    }
}

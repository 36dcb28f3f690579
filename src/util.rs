use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Milliseconds since the Unix epoch; 0 if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// `node-<millis>-<9 base36 chars>`, or `root-<millis>` for structural roots.
pub fn generate_node_id<R: Rng + ?Sized>(rng: &mut R, is_root: bool, now: u64) -> String {
    if is_root {
        return format!("root-{now}");
    }

    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let suffix = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect::<String>();
    format!("node-{now}-{suffix}")
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a. Identical on every platform and toolchain.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Deterministic pair in `[-1, 1]` derived from the FNV-1a hash of the id.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let hash = fnv1a(id.as_bytes());

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

pub fn truncate_label(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_owned();
    }

    let mut label = title.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    label.push('…');
    label
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn stable_pair_is_deterministic_and_bounded() {
        let first = stable_pair("node-a");
        let second = stable_pair("node-a");
        assert_eq!(first, second);
        assert!((-1.0..=1.0).contains(&first.0));
        assert!((-1.0..=1.0).contains(&first.1));
    }

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);
        assert_ne!(stable_pair("node-a"), stable_pair("node-b"));
    }

    #[test]
    fn generated_ids_have_expected_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = generate_node_id(&mut rng, false, 42);
        assert!(id.starts_with("node-42-"));
        assert_eq!(id.len(), "node-42-".len() + 9);
        assert_eq!(generate_node_id(&mut rng, true, 42), "root-42");
    }

    #[test]
    fn truncate_label_keeps_short_titles() {
        assert_eq!(truncate_label("Ideas", 10), "Ideas");
        assert_eq!(truncate_label("A very long title", 6), "A ver…");
    }
}

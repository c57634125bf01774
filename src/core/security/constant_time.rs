/// Compare two byte slices without exiting early at the first difference.
///
/// Slices of different length compare unequal immediately; lengths are never
/// secret in this protocol.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    std::hint::black_box(diff) == 0
}

use ssur_core::derive_substream_seed;

/// Raw offset between consecutive worker seeds: `1000·s³·p·3·iterations`
/// (wrapping).
pub fn worker_stride(s: usize, p: usize, iterations: usize) -> u64 {
    let s = s as u64;
    1000_u64
        .wrapping_mul(s.wrapping_mul(s).wrapping_mul(s))
        .wrapping_mul(p as u64)
        .wrapping_mul(3)
        .wrapping_mul(iterations as u64)
}

/// Seed of the generator that drives exchange pair selection and decisions.
pub fn exchange_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed ^ 0xA5A5_A5A5_A5A5_A5A5, u64::MAX)
}

/// Seed of the generator used for indicator initialisation.
pub fn init_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed ^ 0x5A5A_5A5A_5A5A_5A5A, u64::MAX - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_scales_with_problem_size() {
        assert_eq!(worker_stride(2, 10, 500), 1000 * 8 * 10 * 3 * 500);
        assert_ne!(exchange_seed(7), init_seed(7));
    }
}

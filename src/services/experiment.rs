use crate::models::ExperimentBucket;

/// Assigns a user to an experiment bucket.
///
/// Hashes the decimal user id concatenated with the salt, takes the 128-bit
/// digest as an unsigned integer modulo 100, and splits the percentile range
/// 50/50. Pure function of its inputs: the same (user_id, salt) pair lands
/// in the same bucket on every call and every process instance, which is
/// what makes A/B analysis over the assignment meaningful.
pub fn assign(user_id: i64, salt: &str) -> ExperimentBucket {
    let digest = md5::compute(format!("{}{}", user_id, salt));

    // Digest-as-big-integer mod 100, folded byte by byte so no wide
    // integer arithmetic is needed.
    let percentile = digest
        .0
        .iter()
        .fold(0u32, |acc, &byte| (acc * 256 + u32::from(byte)) % 100);

    if percentile < 50 {
        ExperimentBucket::Control
    } else {
        ExperimentBucket::Test
    }
}

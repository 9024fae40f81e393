//! Fixed-size partitioning of chromosomes into bins.
//!
//! A chromosome of length `L` split with bin size `B` has `((L - 1) / B) + 1`
//! bins. Bin `i` covers the 1-based inclusive range `[i*B + 1, (i+1)*B]`. The
//! last bin's nominal end may run past `L`; it is kept unclipped in
//! [`BinRegion::end`] and [`BinRegion::clipped_end`] gives the I/O bound.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width of the zero-padded decimal form of a bin id.
pub const BIN_ID_WIDTH: usize = 4;

/// Index of a bin within its chromosome.
///
/// Serialized as its zero-padded text, the same form used in paths and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BinId(pub u32);

impl BinId {
    #[must_use]
    pub fn index(self) -> u64 {
        u64::from(self.0)
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = BIN_ID_WIDTH)
    }
}

/// Error parsing a bin id string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid bin id '{0}': expected a non-negative decimal integer")]
pub struct InvalidBinId(pub String);

impl FromStr for BinId {
    type Err = InvalidBinId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidBinId(s.to_string()));
        }
        s.parse::<u32>()
            .map(BinId)
            .map_err(|_| InvalidBinId(s.to_string()))
    }
}

impl From<BinId> for String {
    fn from(bin: BinId) -> Self {
        bin.to_string()
    }
}

impl TryFrom<String> for BinId {
    type Error = InvalidBinId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Number of bins needed to tile a chromosome.
///
/// `length` and `bin_size` must both be at least 1.
#[must_use]
pub fn bin_count(length: u64, bin_size: u64) -> u64 {
    debug_assert!(length >= 1 && bin_size >= 1);
    ((length - 1) / bin_size) + 1
}

/// Coordinate range covered by one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRegion {
    pub bin: BinId,
    /// 1-based inclusive start
    pub begin: u64,
    /// 1-based inclusive nominal end, possibly past the chromosome end
    pub end: u64,
}

impl BinRegion {
    #[must_use]
    pub fn new(bin: BinId, bin_size: u64) -> Self {
        let begin = bin.index() * bin_size + 1;
        let end = (bin.index() + 1) * bin_size;
        Self { bin, begin, end }
    }

    /// End coordinate limited to the chromosome length
    #[must_use]
    pub fn clipped_end(&self, chromosome_length: u64) -> u64 {
        self.end.min(chromosome_length)
    }
}

/// All bins of a chromosome, in increasing order.
// The planner rejects plans with more than u32::MAX bins per chromosome
#[allow(clippy::cast_possible_truncation)]
pub fn chromosome_bins(length: u64, bin_size: u64) -> impl Iterator<Item = BinRegion> {
    let count = bin_count(length, bin_size);
    (0..count).map(move |i| BinRegion::new(BinId(i as u32), bin_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_id_display_is_zero_padded() {
        assert_eq!(BinId(0).to_string(), "0000");
        assert_eq!(BinId(42).to_string(), "0042");
        assert_eq!(BinId(12345).to_string(), "12345");
    }

    #[test]
    fn test_bin_id_parse() {
        assert_eq!("0002".parse::<BinId>().unwrap(), BinId(2));
        assert_eq!("17".parse::<BinId>().unwrap(), BinId(17));
        assert!("".parse::<BinId>().is_err());
        assert!("-1".parse::<BinId>().is_err());
        assert!("00a1".parse::<BinId>().is_err());
    }

    #[test]
    fn test_bin_id_serializes_as_text() {
        assert_eq!(serde_json::to_string(&BinId(2)).unwrap(), "\"0002\"");
        assert_eq!(serde_json::from_str::<BinId>("\"0042\"").unwrap(), BinId(42));
        assert!(serde_json::from_str::<BinId>("\"x\"").is_err());
    }

    #[test]
    fn test_bin_id_lexicographic_matches_numeric() {
        let mut ids: Vec<BinId> = (0..120).map(BinId).collect();
        ids.reverse();
        let mut by_text: Vec<String> = ids.iter().map(ToString::to_string).collect();
        by_text.sort();
        ids.sort();
        let numeric: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(by_text, numeric);
    }

    #[test]
    fn test_bin_count() {
        assert_eq!(bin_count(1, 1_000_000), 1);
        assert_eq!(bin_count(2_500_000, 1_000_000), 3);
        assert_eq!(bin_count(500_000, 1_000_000), 1);
        // Exact multiple of the bin size gets no empty trailing bin
        assert_eq!(bin_count(2_000_000, 1_000_000), 2);
        assert_eq!(bin_count(2_000_001, 1_000_000), 3);
    }

    #[test]
    fn test_bins_tile_chromosome_without_gaps() {
        for (length, bin_size) in [(1, 1), (999, 100), (1000, 100), (1001, 100), (7, 3)] {
            let bins: Vec<BinRegion> = chromosome_bins(length, bin_size).collect();
            assert_eq!(bins.len() as u64, bin_count(length, bin_size));

            let mut next = 1;
            let mut covered = 0;
            for region in &bins {
                assert_eq!(region.begin, next, "gap or overlap at {region:?}");
                let end = region.clipped_end(length);
                covered += end - region.begin + 1;
                next = region.end + 1;
            }
            assert_eq!(covered, length);
        }
    }

    #[test]
    fn test_last_bin_end_is_unclipped() {
        let bins: Vec<BinRegion> = chromosome_bins(2_500_000, 1_000_000).collect();
        let last = bins.last().unwrap();
        assert_eq!(last.bin, BinId(2));
        assert_eq!(last.begin, 2_000_001);
        assert_eq!(last.end, 3_000_000);
        assert_eq!(last.clipped_end(2_500_000), 2_500_000);
    }
}

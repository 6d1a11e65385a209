//! Numeric and naming constants shared across the engine.

/// Position given to the first item of an empty partition.
pub const EMPTY_PARTITION_POSITION: f64 = 1.0;

/// Distance between the last item of a partition and an item appended after it.
pub const TAIL_STEP: f64 = 1.0;

/// Lower bound for positions allocated at the head of a partition.
///
/// Halving the head position repeatedly would otherwise approach zero, and the
/// persistence layer rejects non-positive positions.
pub const HEAD_FLOOR: f64 = 0.1;

/// Gaps between neighbouring positions below this are treated as exhausted.
pub const MIN_POSITION_GAP: f64 = 1e-9;

/// Default quiet period before a debounced edit is written.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Default prefix of optimistic placeholder ids.
pub const DEFAULT_OPTIMISTIC_PREFIX: &str = "optimistic";

/// Number of settled mutations the pipeline ledger keeps for inspection.
pub const LEDGER_HISTORY_LIMIT: usize = 256;

/// Icon shown for pages that have none.
pub const DEFAULT_PAGE_ICON: &str = "📝";

/// Title given to pages created from the sidebar.
pub const DEFAULT_PAGE_TITLE: &str = "New page";

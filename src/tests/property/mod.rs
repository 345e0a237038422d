//! Property-based tests for the dashboard core
//!
//! Property tests verify invariants that should hold for all inputs, rather
//! than testing specific cases.
//!
//! ## Running Property Tests
//!
//! ```sh
//! cargo test property --release
//! ```
//!
//! ## Test Modules
//!
//! - `dice_props`: notation parsing and rolling
//!   - Every value in the accepted grammar parses back to its parts
//!   - Canonical display parses to the same notation
//!   - Totals stay within `[min, max]` and equal dice plus modifier
//!   - Critical and fumble only ever flag a single d20
//!   - Multiset rolls preserve pool order and size
//!
//! - `markup_props`: template and text handling
//!   - Escaped text never yields markup when injected
//!   - Text set on a node reads back unchanged
//!
//! ## Configuration
//!
//! By default, proptest runs 256 cases per property. This can be configured
//! via the `PROPTEST_CASES` environment variable.

//! The update decision engine.
//!
//! Pure comparison logic: given the installed record and the candidates
//! scraped from one fetch of the authoritative page, decide whether a
//! newer build is available, which upload to suggest, and with what
//! confidence. No I/O happens here; everything is deterministic over a
//! snapshot, which is what makes the heuristics unit-testable.

pub mod engine;
pub mod version;

pub use engine::compare_uploads;
pub use version::{SelfUpdateStrategy, TagVersionComparator};

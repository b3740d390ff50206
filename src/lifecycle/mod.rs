//! Member lifecycle tracking: join times and fake-join detection.
//!
//! A "fake join" is a member who leaves shortly after joining, typically to
//! pad an inviter's count. The leave path looks for the member's join time in
//! three places, in order:
//!
//! 1. [`JoinTimestampIndex`], filled when this process handled the join
//! 2. the platform-reported join time on the leave payload
//! 3. the `joined_at` of the member's latest attribution row
//!
//! With none of them the time in server is indeterminate and the leave is
//! not counted as fake.

mod fake;
mod join_index;

pub use fake::{
    Classification, DEFAULT_FAKE_THRESHOLD_MINS, FakeJoinDetector, JoinTimeSources,
};
pub use join_index::JoinTimestampIndex;

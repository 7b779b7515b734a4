//! Independent concepts, each owning one or two collections.
//!
//! Concepts never reference each other; every cross-concept behavior
//! (authorization, cascading deletes, badge side effects) lives in the
//! routing layer that composes them.

pub mod authenticating;
pub mod badging;
pub mod blurring;
pub mod commenting;
pub mod friending;
pub mod liking;
pub mod posting;
pub mod reporting;
pub mod sessioning;

pub use authenticating::Authenticating;
pub use badging::Badging;
pub use blurring::Blurring;
pub use commenting::Commenting;
pub use friending::Friending;
pub use liking::Liking;
pub use posting::Posting;
pub use reporting::Reporting;
pub use sessioning::Sessioning;

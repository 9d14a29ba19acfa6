//! # Follower state
//!
//! The follower's mutually-exclusive operating modes and its error type.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Operating mode of the follower.
///
/// The follower is always in exactly one mode. Entry points
/// ([`super::Follower::follow_path`] and friends) always pass through
/// [`super::Follower::break_following`] first, so switching modes can never
/// leave stale controller state behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerMode {
    /// Doing nothing, motors untouched
    Idle,

    /// Actively holding a single pose
    HoldingPoint,

    /// Following a single path
    FollowingPath,

    /// Following a chain of paths
    FollowingChain,

    /// Driven manually via [`super::Follower::set_teleop_movement`]
    TeleopDrive,
}

/// Errors raised by the follower.
#[derive(Debug, Error)]
pub enum FollowerError {
    #[error("Cannot follow an empty path chain")]
    EmptyChain,

    /// Internal invariant violation: a pathed mode with no path attached.
    #[error("No active path while in mode {0:?}")]
    NoActivePath(FollowerMode),

    #[error("Cannot resume: the follower is not following a path chain")]
    NotFollowingChain,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FollowerMode {
    /// Short name for logs and telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowerMode::Idle => "idle",
            FollowerMode::HoldingPoint => "holding_point",
            FollowerMode::FollowingPath => "following_path",
            FollowerMode::FollowingChain => "following_chain",
            FollowerMode::TeleopDrive => "teleop_drive",
        }
    }

    /// True in either of the path-following modes.
    pub fn is_following(&self) -> bool {
        matches!(
            self,
            FollowerMode::FollowingPath | FollowerMode::FollowingChain
        )
    }
}

impl Default for FollowerMode {
    fn default() -> Self {
        FollowerMode::Idle
    }
}

//! # Holonomic path follower library
//!
//! This library provides the motion control software for a four wheel mecanum
//! platform. It is built around a cascade of scalar feedback loops (see
//! [`ctrl`]) whose outputs are combined into field-frame demand vectors and
//! mapped onto individual wheel powers by [`kinematics::DriveVectorScaler`].
//! The top level [`follower::Follower`] owns the hardware abstractions from
//! [`hw`] and steps the whole chain once per call to
//! [`follower::Follower::update`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod ctrl;
pub mod follower;
pub mod geom;
pub mod hw;
pub mod kinematics;
pub mod path;
pub mod telem;

//! Real-time coaching
//!
//! The session tick loop, the spoken-cue arbitrator, and the sustained-hold
//! timer. The session is the only writer of coaching state; everything else
//! observes it through the event stream.

pub mod arbitrator;
pub mod hold;
pub mod session;

pub use arbitrator::{CueArbitrator, OfferDecision, MIN_CUE_GAP};
pub use hold::{HoldObservation, HoldState, HoldTimer};
pub use session::{
    Session, SessionConfig, AUTH_MISSING_MESSAGE, CAPTURE_FAILED_MESSAGE, COMPLETION_MESSAGE,
};

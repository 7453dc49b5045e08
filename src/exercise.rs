//! Exercise catalog
//!
//! The selectors the pose service understands. Workout exercises are
//! rep-counted by the service; dance poses are held, and only those can
//! produce the hold signal that drives challenge completion.

use serde::{Deserialize, Serialize};

/// Exercise selector sent to the pose service.
///
/// Serialized with the service's wire names (`squats`, `pushups`,
/// `araimandi`, `mulumandi`, `mandi_adavu`); the same values appear in the
/// client state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exercise {
    Squats,
    Pushups,
    Araimandi,
    Mulumandi,
    MandiAdavu,
}

/// Submission kind. Selects which analysis endpoint receives the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseKind {
    Workout,
    Dance,
}

impl Exercise {
    /// All supported exercises. Daily challenge assignment draws from this set.
    pub const ALL: [Exercise; 5] = [
        Exercise::Squats,
        Exercise::Pushups,
        Exercise::Araimandi,
        Exercise::Mulumandi,
        Exercise::MandiAdavu,
    ];

    /// Which analysis endpoint handles this exercise.
    pub fn kind(&self) -> ExerciseKind {
        match self {
            Exercise::Squats | Exercise::Pushups => ExerciseKind::Workout,
            Exercise::Araimandi | Exercise::Mulumandi | Exercise::MandiAdavu => ExerciseKind::Dance,
        }
    }

    /// Wire value used in request bodies and the state file.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Exercise::Squats => "squats",
            Exercise::Pushups => "pushups",
            Exercise::Araimandi => "araimandi",
            Exercise::Mulumandi => "mulumandi",
            Exercise::MandiAdavu => "mandi_adavu",
        }
    }

    /// Human-readable label for terminal output.
    pub fn label(&self) -> &'static str {
        match self {
            Exercise::Squats => "Squats",
            Exercise::Pushups => "Push-ups",
            Exercise::Araimandi => "Araimandi",
            Exercise::Mulumandi => "Mulumandi",
            Exercise::MandiAdavu => "Mandi Adavu",
        }
    }
}

impl std::fmt::Display for Exercise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Exercise {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "squats" => Ok(Exercise::Squats),
            "pushups" => Ok(Exercise::Pushups),
            "araimandi" => Ok(Exercise::Araimandi),
            "mulumandi" => Ok(Exercise::Mulumandi),
            "mandi_adavu" => Ok(Exercise::MandiAdavu),
            other => Err(format!(
                "unknown exercise '{}' (expected one of: squats, pushups, araimandi, mulumandi, mandi_adavu)",
                other
            )),
        }
    }
}

//! Actuator sequencing state machine.
//!
//! ```text
//!  AT_HOME ──move out──▶ MOVING ──done──▶ IDLE_ENERGIZED ──release──▶ HOLDING
//!     ▲                                                                  │
//!     │                                                             pump done
//!     │                                                                  ▼
//!     └─────────────────────────── done ─────────────────────────── RETURNING
//!
//!  Any state ──[fault / interrupt]──▶ DEENERGIZED ──[next cycle]──▶ RETURNING | AT_HOME
//! ```
//!
//! The table below is the single source of truth for which moves are
//! legal; [`sequencer::Sequencer`] asserts against it on every transition.

pub mod sequencer;

/// Where the position actuator is in the cycle choreography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorState {
    /// Plate at its home end, all channels released.
    AtHome,
    /// Stepping away from home.
    Moving,
    /// Travel finished, stepper coils still holding.
    IdleEnergized,
    /// Plate parked, pump running.
    Holding,
    /// Stepping back toward home.
    Returning,
    /// Every channel released after a fault or interrupt.
    Deenergized,
}

impl ActuatorState {
    pub fn name(self) -> &'static str {
        match self {
            Self::AtHome => "AtHome",
            Self::Moving => "Moving",
            Self::IdleEnergized => "IdleEnergized",
            Self::Holding => "Holding",
            Self::Returning => "Returning",
            Self::Deenergized => "Deenergized",
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: ActuatorState) -> bool {
        use ActuatorState::{AtHome, Deenergized, Holding, IdleEnergized, Moving, Returning};
        matches!(
            (self, next),
            (_, Deenergized)
                | (AtHome, Moving)
                | (AtHome, Holding)
                | (Moving, IdleEnergized)
                | (IdleEnergized, Holding)
                | (Holding, Returning)
                | (Holding, AtHome)
                | (Returning, AtHome)
                | (Deenergized, Returning)
                | (Deenergized, AtHome)
        )
    }
}

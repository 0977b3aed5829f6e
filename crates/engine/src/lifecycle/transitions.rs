//! The tournament state machine in one table.
//!
//! Every lifecycle operation checks the current status here before writing.
//! Operations that do not move the tournament still have a row, listing the
//! statuses they may run in.

use std::fmt;

use infra::models::TournamentStatus::{self, *};

use crate::error::{LifecycleError, LifecycleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    OpenRegistration,
    OpenCheckIn,
    ExcludeNoShows,
    Start,
    OpenLateRegistration,
    CloseLateRegistration,
    Finish,
    CancelStart,
    FinalizeResults,
    Archive,
    Register,
    Unregister,
    ConfirmPayment,
    RefundPayment,
    SeatPlayer,
    EliminatePlayer,
    RevivePlayer,
    AwardBonus,
    RebalanceTables,
    ReinstateNoShow,
    SetPointStructure,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::OpenRegistration => "open_registration",
            Operation::OpenCheckIn => "open_check_in",
            Operation::ExcludeNoShows => "exclude_no_shows",
            Operation::Start => "start",
            Operation::OpenLateRegistration => "open_late_registration",
            Operation::CloseLateRegistration => "close_late_registration",
            Operation::Finish => "finish",
            Operation::CancelStart => "cancel_start",
            Operation::FinalizeResults => "finalize_results",
            Operation::Archive => "archive",
            Operation::Register => "register",
            Operation::Unregister => "unregister",
            Operation::ConfirmPayment => "confirm_payment",
            Operation::RefundPayment => "refund_payment",
            Operation::SeatPlayer => "seat_player",
            Operation::EliminatePlayer => "eliminate_player",
            Operation::RevivePlayer => "revive_player",
            Operation::AwardBonus => "award_bonus",
            Operation::RebalanceTables => "rebalance_tables",
            Operation::ReinstateNoShow => "reinstate_no_show",
            Operation::SetPointStructure => "set_point_structure",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    To(TournamentStatus),
    Stay,
}

const PRE_FINISH: &[TournamentStatus] = &[
    Upcoming,
    RegistrationOpen,
    CheckIn,
    Finalizing,
    Started,
    LateRegistration,
    InProgress,
];
const RUNNING: &[TournamentStatus] = &[Started, LateRegistration, InProgress];
const ACCEPTS_SIGNUPS: &[TournamentStatus] = &[Upcoming, RegistrationOpen, CheckIn, LateRegistration];

const TABLE: &[(Operation, &[TournamentStatus], Target)] = &[
    (Operation::OpenRegistration, &[Upcoming], Target::To(RegistrationOpen)),
    (Operation::OpenCheckIn, &[RegistrationOpen], Target::To(CheckIn)),
    (Operation::ExcludeNoShows, &[CheckIn], Target::To(Finalizing)),
    (
        Operation::Start,
        &[Upcoming, RegistrationOpen, CheckIn, Finalizing],
        Target::To(Started),
    ),
    (Operation::OpenLateRegistration, &[Started], Target::To(LateRegistration)),
    (Operation::CloseLateRegistration, &[LateRegistration], Target::To(InProgress)),
    (Operation::Finish, RUNNING, Target::To(Finished)),
    (Operation::CancelStart, RUNNING, Target::To(Upcoming)),
    (Operation::FinalizeResults, &[Finished], Target::To(Completed)),
    (Operation::Archive, &[Completed], Target::To(Archived)),
    (Operation::Register, ACCEPTS_SIGNUPS, Target::Stay),
    (Operation::Unregister, ACCEPTS_SIGNUPS, Target::Stay),
    (Operation::ConfirmPayment, PRE_FINISH, Target::Stay),
    (Operation::RefundPayment, PRE_FINISH, Target::Stay),
    (Operation::SeatPlayer, RUNNING, Target::Stay),
    (Operation::EliminatePlayer, RUNNING, Target::Stay),
    (Operation::RevivePlayer, RUNNING, Target::Stay),
    (Operation::AwardBonus, RUNNING, Target::Stay),
    (Operation::RebalanceTables, RUNNING, Target::Stay),
    (
        Operation::ReinstateNoShow,
        &[CheckIn, Finalizing, Started, LateRegistration, InProgress],
        Target::Stay,
    ),
    (
        Operation::SetPointStructure,
        &[
            Upcoming,
            RegistrationOpen,
            CheckIn,
            Finalizing,
            Started,
            LateRegistration,
            InProgress,
            Finished,
        ],
        Target::Stay,
    ),
];

/// Status after running `operation` from `current`, or `None` if the table
/// has no such row.
pub fn next_status(current: TournamentStatus, operation: Operation) -> Option<TournamentStatus> {
    TABLE
        .iter()
        .find(|(op, from, _)| *op == operation && from.contains(&current))
        .map(|(_, _, target)| match target {
            Target::To(next) => *next,
            Target::Stay => current,
        })
}

/// Like `next_status`, failing with `InvalidTransition`.
pub fn check(current: TournamentStatus, operation: Operation) -> LifecycleResult<TournamentStatus> {
    next_status(current, operation).ok_or(LifecycleError::InvalidTransition {
        status: current,
        operation,
    })
}

//! Transition tables of the four state machines, as specified in
//! IEEE 802.1Q-2014 clause 10.7. Rows are current states, columns are
//! events in declaration order of the event enums. `None` in the state
//! position means the machine stays where it is.

use super::types::{
    ApplicantAction, ApplicantEvent, ApplicantState, LeaveAllAction, LeaveAllEvent, LeaveAllState,
    PeriodicAction, PeriodicEvent, PeriodicState, RegistrarAction, RegistrarEvent, RegistrarState,
    APPLICANT_EVENT_COUNT, LEAVEALL_EVENT_COUNT, PERIODIC_EVENT_COUNT, REGISTRAR_EVENT_COUNT,
};

type RegEntry = (Option<RegistrarState>, RegistrarAction);
type AppEntry = (Option<ApplicantState>, ApplicantAction);
type LaEntry = (Option<LeaveAllState>, LeaveAllAction);
type PerEntry = (Option<PeriodicState>, PeriodicAction);

use ApplicantState::{Aa, An, Ao, Ap, La, Lo, Qa, Qo, Qp, Vn, Vo, Vp};
use RegistrarState::{In, Lv, Mt};

const REGISTRAR_TABLE: [[RegEntry; REGISTRAR_EVENT_COUNT]; 3] = [
    // State: IN
    [
        (Some(Mt), RegistrarAction::None),              // Begin!
        (Some(In), RegistrarAction::NewIndication),     // rNew!
        (Some(In), RegistrarAction::None),              // rJoinIn!
        (Some(In), RegistrarAction::None),              // rJoinMt!
        (Some(Lv), RegistrarAction::StartLeaveTimer),   // rLv!
        (Some(Lv), RegistrarAction::StartLeaveTimer),   // rLA!
        (Some(Lv), RegistrarAction::StartLeaveTimer),   // txLA!
        (Some(Lv), RegistrarAction::StartLeaveTimer),   // Re-declare!
        (Some(Mt), RegistrarAction::None),              // Flush!
        (None, RegistrarAction::None),                  // leavetimer!
    ],
    // State: LV
    [
        (Some(Mt), RegistrarAction::None),
        (Some(In), RegistrarAction::StopLeaveTimerJoin),
        (Some(In), RegistrarAction::StopLeaveTimer),
        (Some(In), RegistrarAction::StopLeaveTimer),
        (None, RegistrarAction::None),
        (None, RegistrarAction::None),
        (None, RegistrarAction::None),
        (None, RegistrarAction::None),
        (Some(Mt), RegistrarAction::LeaveIndication),
        (Some(Mt), RegistrarAction::LeaveIndication),
    ],
    // State: MT
    [
        (Some(Mt), RegistrarAction::None),
        (Some(In), RegistrarAction::NewIndication),
        (Some(In), RegistrarAction::JoinIndication),
        (Some(In), RegistrarAction::JoinIndication),
        (None, RegistrarAction::None),
        (None, RegistrarAction::None),
        (None, RegistrarAction::None),
        (None, RegistrarAction::None),
        (Some(Mt), RegistrarAction::None),
        (Some(Mt), RegistrarAction::None),
    ],
];

#[rustfmt::skip]
const APPLICANT_TABLE: [[AppEntry; APPLICANT_EVENT_COUNT]; 12] = [
    // Columns: Begin! New! Join! Lv! rNew! rJoinIn! rIn! rJoinMt! rMt!
    //          rLv! rLA! Re-declare! periodic! tx! txLA! txLAF!
    // State: VO
    [
        (None, ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Ao), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::SendInvalid),
        (Some(Lo), ApplicantAction::SendInvalid),
        (Some(Lo), ApplicantAction::None),
    ],
    // State: VP
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Vo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Ap), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Aa), ApplicantAction::SendJoin),
        (Some(Aa), ApplicantAction::Send),
        (Some(Vp), ApplicantAction::None),
    ],
    // State: VN
    [
        (Some(Vo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(La), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(An), ApplicantAction::SendNew),
        (Some(An), ApplicantAction::SendNew),
        (Some(Vn), ApplicantAction::None),
    ],
    // State: AN
    [
        (Some(Vo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(La), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Qa), ApplicantAction::SendNew),
        (Some(Qa), ApplicantAction::SendNew),
        (Some(Vn), ApplicantAction::None),
    ],
    // State: AA
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(La), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Qa), ApplicantAction::None),
        (Some(Qa), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Qa), ApplicantAction::SendJoin),
        (Some(Qa), ApplicantAction::SendJoin),
        (Some(Vp), ApplicantAction::None),
    ],
    // State: QA
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(La), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Aa), ApplicantAction::None),
        (Some(Aa), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Aa), ApplicantAction::None),
        (None, ApplicantAction::SendInvalid),
        (None, ApplicantAction::SendJoin),
        (Some(Vp), ApplicantAction::None),
    ],
    // State: LA
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (Some(Aa), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Vo), ApplicantAction::SendLeave),
        (Some(Lo), ApplicantAction::SendInvalid),
        (Some(Lo), ApplicantAction::None),
    ],
    // State: AO
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (Some(Ap), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Qo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::SendInvalid),
        (Some(Lo), ApplicantAction::SendInvalid),
        (Some(Lo), ApplicantAction::None),
    ],
    // State: QO
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (Some(Qp), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Ao), ApplicantAction::None),
        (Some(Ao), ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (Some(Lo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::SendInvalid),
        (Some(Lo), ApplicantAction::SendInvalid),
        (Some(Lo), ApplicantAction::None),
    ],
    // State: AP
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Ao), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Qp), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Qa), ApplicantAction::SendJoin),
        (Some(Qa), ApplicantAction::SendJoin),
        (Some(Vp), ApplicantAction::None),
    ],
    // State: QP
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Qo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Ap), ApplicantAction::None),
        (Some(Ap), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (Some(Ap), ApplicantAction::None),
        (None, ApplicantAction::SendInvalid),
        (Some(Qa), ApplicantAction::SendJoin),
        (Some(Vp), ApplicantAction::None),
    ],
    // State: LO
    [
        (Some(Vo), ApplicantAction::None),
        (Some(Vn), ApplicantAction::None),
        (Some(Vp), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Vo), ApplicantAction::None),
        (Some(Vo), ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (None, ApplicantAction::None),
        (Some(Vo), ApplicantAction::Send),
        (None, ApplicantAction::SendInvalid),
        (None, ApplicantAction::None),
    ],
];

const LEAVEALL_TABLE: [[LaEntry; LEAVEALL_EVENT_COUNT]; 2] = [
    // State: Passive
    [
        (Some(LeaveAllState::Passive), LeaveAllAction::StartTimer),
        (None, LeaveAllAction::None),
        (Some(LeaveAllState::Passive), LeaveAllAction::StartTimer),
        (Some(LeaveAllState::Active), LeaveAllAction::StartTimer),
    ],
    // State: Active
    [
        (Some(LeaveAllState::Passive), LeaveAllAction::StartTimer),
        (Some(LeaveAllState::Passive), LeaveAllAction::SendLeaveAll),
        (Some(LeaveAllState::Passive), LeaveAllAction::StartTimer),
        (Some(LeaveAllState::Active), LeaveAllAction::StartTimer),
    ],
];

const PERIODIC_TABLE: [[PerEntry; PERIODIC_EVENT_COUNT]; 2] = [
    // State: Passive
    [
        (Some(PeriodicState::Active), PeriodicAction::StartTimer),
        (Some(PeriodicState::Active), PeriodicAction::StartTimer),
        (None, PeriodicAction::None),
        (None, PeriodicAction::None),
    ],
    // State: Active
    [
        (Some(PeriodicState::Active), PeriodicAction::StartTimer),
        (None, PeriodicAction::None),
        (Some(PeriodicState::Passive), PeriodicAction::None),
        (Some(PeriodicState::Active), PeriodicAction::StartTimerAndTrigger),
    ],
];

pub(crate) fn registrar_transition(state: RegistrarState, event: RegistrarEvent) -> RegEntry {
    REGISTRAR_TABLE[state as usize][event as usize]
}

pub(crate) fn applicant_transition(state: ApplicantState, event: ApplicantEvent) -> AppEntry {
    APPLICANT_TABLE[state as usize][event as usize]
}

pub(crate) fn leaveall_transition(state: LeaveAllState, event: LeaveAllEvent) -> LaEntry {
    LEAVEALL_TABLE[state as usize][event as usize]
}

pub(crate) fn periodic_transition(state: PeriodicState, event: PeriodicEvent) -> PerEntry {
    PERIODIC_TABLE[state as usize][event as usize]
}

/// States whose entry requests a transmit opportunity (starts the Join
/// timer): the applicant has something to say at the next opportunity.
pub(crate) fn requires_tx(state: ApplicantState) -> bool {
    matches!(state, Vp | Vn | An | Aa | La | Ap | Lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registrar_join_paths() {
        let (next, action) = registrar_transition(Mt, RegistrarEvent::RxJoinIn);
        assert_eq!(next, Some(In));
        assert_eq!(action, RegistrarAction::JoinIndication);

        // Already registered: no second indication.
        let (next, action) = registrar_transition(In, RegistrarEvent::RxJoinIn);
        assert_eq!(next, Some(In));
        assert_eq!(action, RegistrarAction::None);

        // A join while the leave timer runs cancels it silently.
        let (next, action) = registrar_transition(Lv, RegistrarEvent::RxJoinMt);
        assert_eq!(next, Some(In));
        assert_eq!(action, RegistrarAction::StopLeaveTimer);
    }

    #[test]
    fn test_registrar_leave_paths() {
        let (next, action) = registrar_transition(In, RegistrarEvent::RxLeave);
        assert_eq!(next, Some(Lv));
        assert_eq!(action, RegistrarAction::StartLeaveTimer);

        let (next, action) = registrar_transition(Lv, RegistrarEvent::TimerExpired);
        assert_eq!(next, Some(Mt));
        assert_eq!(action, RegistrarAction::LeaveIndication);

        // Leave events while already empty do nothing.
        let (next, action) = registrar_transition(Mt, RegistrarEvent::RxLeave);
        assert_eq!(next, None);
        assert_eq!(action, RegistrarAction::None);
    }

    #[test]
    fn test_registrar_flush_skips_indication_from_in() {
        let (next, action) = registrar_transition(In, RegistrarEvent::Flush);
        assert_eq!(next, Some(Mt));
        assert_eq!(action, RegistrarAction::None);

        let (next, action) = registrar_transition(Lv, RegistrarEvent::Flush);
        assert_eq!(next, Some(Mt));
        assert_eq!(action, RegistrarAction::LeaveIndication);
    }

    #[test]
    fn test_applicant_declare_path() {
        // VO --Join!--> VP --tx!--> AA --tx!--> QA, then quiet.
        let (next, _) = applicant_transition(Vo, ApplicantEvent::Join);
        assert_eq!(next, Some(Vp));
        let (next, action) = applicant_transition(Vp, ApplicantEvent::Tx);
        assert_eq!(next, Some(Aa));
        assert_eq!(action, ApplicantAction::SendJoin);
        let (next, action) = applicant_transition(Aa, ApplicantEvent::Tx);
        assert_eq!(next, Some(Qa));
        assert_eq!(action, ApplicantAction::SendJoin);
        let (next, action) = applicant_transition(Qa, ApplicantEvent::Tx);
        assert_eq!(next, None);
        assert_eq!(action, ApplicantAction::SendInvalid);
    }

    #[test]
    fn test_applicant_quiet_reopened_by_leaveall() {
        // A quiet applicant re-joins at the LeaveAll transmit opportunity
        // without leaving QA.
        let (next, action) = applicant_transition(Qa, ApplicantEvent::TxLeaveAll);
        assert_eq!(next, None);
        assert_eq!(action, ApplicantAction::SendJoin);
        // ...and a received LeaveAll reopens it to VP.
        let (next, _) = applicant_transition(Qa, ApplicantEvent::RxLeaveAll);
        assert_eq!(next, Some(Vp));
    }

    #[test]
    fn test_applicant_withdraw_path() {
        let (next, _) = applicant_transition(Qa, ApplicantEvent::Leave);
        assert_eq!(next, Some(La));
        let (next, action) = applicant_transition(La, ApplicantEvent::Tx);
        assert_eq!(next, Some(Vo));
        assert_eq!(action, ApplicantAction::SendLeave);
    }

    #[test]
    fn test_applicant_observer_tracking() {
        let (next, _) = applicant_transition(Vo, ApplicantEvent::RxJoinIn);
        assert_eq!(next, Some(Ao));
        let (next, _) = applicant_transition(Ao, ApplicantEvent::RxJoinIn);
        assert_eq!(next, Some(Qo));
        let (next, _) = applicant_transition(Qo, ApplicantEvent::RxMt);
        assert_eq!(next, Some(Ao));
    }

    #[test]
    fn test_leaveall_tx_goes_passive() {
        let (next, action) = leaveall_transition(LeaveAllState::Active, LeaveAllEvent::Tx);
        assert_eq!(next, Some(LeaveAllState::Passive));
        assert_eq!(action, LeaveAllAction::SendLeaveAll);

        let (next, action) = leaveall_transition(LeaveAllState::Passive, LeaveAllEvent::TimerExpired);
        assert_eq!(next, Some(LeaveAllState::Active));
        assert_eq!(action, LeaveAllAction::StartTimer);
    }

    #[test]
    fn test_periodic_rearms_while_active() {
        let (next, action) = periodic_transition(PeriodicState::Active, PeriodicEvent::TimerExpired);
        assert_eq!(next, Some(PeriodicState::Active));
        assert_eq!(action, PeriodicAction::StartTimerAndTrigger);

        // Disabled forces passive and the timer is allowed to die out.
        let (next, action) = periodic_transition(PeriodicState::Active, PeriodicEvent::Disabled);
        assert_eq!(next, Some(PeriodicState::Passive));
        assert_eq!(action, PeriodicAction::None);
        let (next, action) = periodic_transition(PeriodicState::Passive, PeriodicEvent::TimerExpired);
        assert_eq!(next, None);
        assert_eq!(action, PeriodicAction::None);
    }

    #[test]
    fn test_requires_tx_states() {
        assert!(requires_tx(Vp));
        assert!(requires_tx(Lo));
        assert!(!requires_tx(Vo));
        assert!(!requires_tx(Qa));
        assert!(!requires_tx(Qo));
    }
}

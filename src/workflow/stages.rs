//! Stage tables: which status each tier acts on, where approval leads, and what
//! each decision does to the subject entity.

use crate::models::approval::{ApprovalRequest, RequestKind, RequestStatus};
use crate::models::user::{ActorTier, Role, UserStatus};
use crate::store::SideEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub tier: ActorTier,
    /// Status the request must be at for this stage to act.
    pub awaiting: RequestStatus,
    pub on_approve: RequestStatus,
}

const TWO_TIER: &[Stage] = &[
    Stage {
        tier: ActorTier::Admin,
        awaiting: RequestStatus::Pending,
        on_approve: RequestStatus::AdminApproved,
    },
    Stage {
        tier: ActorTier::SuperAdmin,
        awaiting: RequestStatus::AdminApproved,
        on_approve: RequestStatus::Approved,
    },
];

#[derive(Debug, Clone, Copy)]
pub struct StageTable {
    pub kind: RequestKind,
    stages: &'static [Stage],
    /// Admin approval becomes terminal when nobody holds the next tier.
    collapses_without_next_tier: bool,
}

/// Where an approval at a given stage leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStep {
    Advance { to: RequestStatus, next: Stage },
    Complete,
}

impl StageTable {
    pub fn for_kind(kind: RequestKind) -> Self {
        match kind {
            RequestKind::UserRegistration => Self {
                kind,
                stages: TWO_TIER,
                collapses_without_next_tier: true,
            },
            RequestKind::ScrapRequest | RequestKind::NewChemicalRequest => Self {
                kind,
                stages: TWO_TIER,
                collapses_without_next_tier: false,
            },
        }
    }

    /// Table for a stored request. Registrations asking for anything above a
    /// plain user account never collapse to a single stage.
    pub fn for_request(request: &ApprovalRequest) -> Self {
        let mut table = Self::for_kind(request.kind);
        if request.kind == RequestKind::UserRegistration
            && request.detail("role") != Some(Role::User.as_str())
        {
            table.collapses_without_next_tier = false;
        }
        table
    }

    pub fn first(&self) -> Stage {
        self.stages[0]
    }

    pub fn stage(&self, tier: ActorTier) -> Option<Stage> {
        self.stages.iter().copied().find(|s| s.tier == tier)
    }

    pub fn next_after(&self, tier: ActorTier) -> Option<Stage> {
        let idx = self.stages.iter().position(|s| s.tier == tier)?;
        self.stages.get(idx + 1).copied()
    }

    /// The stage whose approvers a request at `status` is waiting on.
    pub fn waiting_at(&self, status: RequestStatus) -> Option<Stage> {
        self.stages.iter().copied().find(|s| s.awaiting == status)
    }

    /// Every status a request of this kind may hold.
    pub fn statuses(&self) -> Vec<RequestStatus> {
        let mut all = vec![RequestStatus::Pending];
        all.extend(self.stages.iter().map(|s| s.on_approve));
        all.push(RequestStatus::Denied);
        all
    }

    /// Decides where approving `stage` leads, given whether anyone holds the next tier.
    pub fn approval_step(&self, stage: Stage, next_tier_staffed: bool) -> ApprovalStep {
        match self.next_after(stage.tier) {
            Some(_) if self.collapses_without_next_tier && !next_tier_staffed => {
                ApprovalStep::Complete
            }
            Some(next) => ApprovalStep::Advance {
                to: stage.on_approve,
                next,
            },
            None => ApprovalStep::Complete,
        }
    }
}

/// Side effect committed together with an approval.
pub fn approve_effect(request: &ApprovalRequest, terminal: bool) -> SideEffect {
    match (request.kind, terminal) {
        (RequestKind::UserRegistration, false) => SideEffect::SetUserStatus {
            user_id: request.submitter_id,
            status: UserStatus::AdminApproved,
        },
        (RequestKind::UserRegistration, true) => SideEffect::SetUserStatus {
            user_id: request.submitter_id,
            status: UserStatus::Approved,
        },
        (RequestKind::ScrapRequest, true) => SideEffect::DeleteChemical {
            chemical_id: request.subject_ref.clone(),
        },
        (RequestKind::ScrapRequest, false) => SideEffect::None,
        // approval records intent only; stock is added manually
        (RequestKind::NewChemicalRequest, _) => SideEffect::None,
    }
}

/// Side effect committed together with a denial at any stage.
pub fn deny_effect(request: &ApprovalRequest) -> SideEffect {
    match request.kind {
        RequestKind::UserRegistration => SideEffect::DeleteUser {
            user_id: request.submitter_id,
        },
        RequestKind::ScrapRequest | RequestKind::NewChemicalRequest => SideEffect::None,
    }
}

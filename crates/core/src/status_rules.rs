//! Ordered, table-driven normalization of source status vocabulary.
//!
//! The source system describes a job with a single free-text status. The
//! target schema splits that into a lead pipeline position, a work-order
//! lifecycle status and a work-type classification. Each table is an
//! ordered list of keyword rules evaluated top to bottom against the
//! lowercased input; the first rule with any matching keyword wins and the
//! table's default applies when none match.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// A single rule: any keyword contained in the input selects `result`.
#[derive(Debug, Clone, Copy)]
pub struct StatusRule<T: 'static> {
    pub keywords: &'static [&'static str],
    pub result: T,
}

/// An ordered rule list with an explicit fallback.
#[derive(Debug, Clone, Copy)]
pub struct RuleTable<T: 'static> {
    pub rules: &'static [StatusRule<T>],
    pub default: T,
}

impl<T: Copy> RuleTable<T> {
    /// Index of the first rule matching `input`, if any.
    ///
    /// Matching is a case-insensitive substring test. Keywords must be
    /// written in lowercase.
    pub fn matching_rule(&self, input: &str) -> Option<usize> {
        let haystack = input.to_lowercase();
        self.rules
            .iter()
            .position(|rule| rule.keywords.iter().any(|kw| haystack.contains(kw)))
    }

    /// Resolve `input` against the table. Absent or blank input yields the default.
    pub fn resolve(&self, input: Option<&str>) -> T {
        input
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| self.matching_rule(s))
            .map_or(self.default, |i| self.rules[i].result)
    }
}

// ---------------------------------------------------------------------------
// Lead stage / temperature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStage {
    New,
    Contacted,
    Qualified,
    Proposal,
    Won,
    Lost,
}

impl LeadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTemperature {
    Cold,
    Warm,
    Hot,
}

impl LeadTemperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Warm => "warm",
            Self::Hot => "hot",
        }
    }
}

/// Where a lead sits in the sales pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadPosition {
    pub stage: LeadStage,
    pub temperature: LeadTemperature,
}

const fn lead(stage: LeadStage, temperature: LeadTemperature) -> LeadPosition {
    LeadPosition { stage, temperature }
}

/// Lost/cancelled outrank everything; signed work outranks open proposals.
pub const LEAD_RULES: RuleTable<LeadPosition> = RuleTable {
    rules: &[
        StatusRule {
            keywords: &["lost"],
            result: lead(LeadStage::Lost, LeadTemperature::Cold),
        },
        StatusRule {
            keywords: &["cancel"],
            result: lead(LeadStage::Lost, LeadTemperature::Cold),
        },
        StatusRule {
            keywords: &["complete", "paid", "closed"],
            result: lead(LeadStage::Won, LeadTemperature::Hot),
        },
        StatusRule {
            keywords: &["contract", "signed", "sold", "approved"],
            result: lead(LeadStage::Won, LeadTemperature::Hot),
        },
        StatusRule {
            keywords: &["proposal", "estimate", "quote", "bid"],
            result: lead(LeadStage::Proposal, LeadTemperature::Warm),
        },
        StatusRule {
            keywords: &["appointment", "inspection", "scheduled"],
            result: lead(LeadStage::Qualified, LeadTemperature::Warm),
        },
        StatusRule {
            keywords: &["contact"],
            result: lead(LeadStage::Contacted, LeadTemperature::Warm),
        },
    ],
    default: lead(LeadStage::New, LeadTemperature::Cold),
};

// ---------------------------------------------------------------------------
// Work order status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Pending,
    Scheduled,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::OnHold => "on_hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

pub const WORK_ORDER_STATUS_RULES: RuleTable<WorkOrderStatus> = RuleTable {
    rules: &[
        StatusRule {
            keywords: &["cancel", "lost"],
            result: WorkOrderStatus::Cancelled,
        },
        StatusRule {
            keywords: &["complete", "paid", "closed", "invoiced"],
            result: WorkOrderStatus::Completed,
        },
        StatusRule {
            keywords: &["progress", "production", "started"],
            result: WorkOrderStatus::InProgress,
        },
        StatusRule {
            keywords: &["schedul"],
            result: WorkOrderStatus::Scheduled,
        },
        StatusRule {
            keywords: &["hold"],
            result: WorkOrderStatus::OnHold,
        },
    ],
    default: WorkOrderStatus::Pending,
};

// ---------------------------------------------------------------------------
// Work type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Roofing,
    Gutters,
    Siding,
    WindowsDoors,
    Repair,
    Inspection,
    Insurance,
    General,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roofing => "roofing",
            Self::Gutters => "gutters",
            Self::Siding => "siding",
            Self::WindowsDoors => "windows_doors",
            Self::Repair => "repair",
            Self::Inspection => "inspection",
            Self::Insurance => "insurance",
            Self::General => "general",
        }
    }
}

pub const WORK_TYPE_RULES: RuleTable<WorkType> = RuleTable {
    rules: &[
        StatusRule {
            keywords: &["roof"],
            result: WorkType::Roofing,
        },
        StatusRule {
            keywords: &["gutter"],
            result: WorkType::Gutters,
        },
        StatusRule {
            keywords: &["siding"],
            result: WorkType::Siding,
        },
        StatusRule {
            keywords: &["window", "door"],
            result: WorkType::WindowsDoors,
        },
        StatusRule {
            keywords: &["repair", "leak"],
            result: WorkType::Repair,
        },
        StatusRule {
            keywords: &["inspect"],
            result: WorkType::Inspection,
        },
        StatusRule {
            keywords: &["insurance", "claim"],
            result: WorkType::Insurance,
        },
    ],
    default: WorkType::General,
};

// ---------------------------------------------------------------------------
// Convenience wrappers
// ---------------------------------------------------------------------------

pub fn lead_position(status: Option<&str>) -> LeadPosition {
    LEAD_RULES.resolve(status)
}

pub fn work_order_status(status: Option<&str>) -> WorkOrderStatus {
    WORK_ORDER_STATUS_RULES.resolve(status)
}

/// Classify by the job's type, falling back to its name when the type is
/// absent or matches nothing.
pub fn work_type(job_type: Option<&str>, name: Option<&str>) -> WorkType {
    let by_type = job_type.and_then(|t| WORK_TYPE_RULES.matching_rule(t));
    match by_type {
        Some(i) => WORK_TYPE_RULES.rules[i].result,
        None => WORK_TYPE_RULES.resolve(name),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

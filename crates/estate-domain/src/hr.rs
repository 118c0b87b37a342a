//! Staff records: employees, attendance, leave, and payroll.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    pub id: Uuid,
    pub tid: Tid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub department: String,
    pub start_date: NaiveDate,
    /// Annual gross salary.
    pub salary: f64,
    pub status: EmployeeStatus,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }

    pub fn monthly_salary(&self) -> f64 {
        round_cents(self.salary / 12.0)
    }
}

impl Identifiable for Employee {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Employee {
    fn display_label(&self) -> String {
        format!("{} {} ({})", self.tid, self.full_name(), self.position)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Terminated,
}

crate::labelled_enum!(EmployeeStatus {
    Active => "active",
    Terminated => "terminated",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveTime>,
}

impl AttendanceRecord {
    /// Worked hours, when both clock times are known.
    pub fn hours(&self) -> Option<f64> {
        let (start, end) = (self.check_in?, self.check_out?);
        Some((end - start).num_minutes() as f64 / 60.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    HalfDay,
    OnLeave,
}

crate::labelled_enum!(AttendanceStatus {
    Present => "present",
    Absent => "absent",
    Late => "late",
    HalfDay => "half_day",
    OnLeave => "on_leave",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaveRequest {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kind: LeaveKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub status: LeaveStatus,
}

impl LeaveRequest {
    pub fn days(&self) -> i64 {
        inclusive_days(self.start_date, self.end_date)
    }

    /// Days of this leave falling inside `[from, to]`.
    pub fn days_within(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        inclusive_days(self.start_date.max(from), self.end_date.min(to))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    Annual,
    Vacation,
    Sick,
    Unpaid,
    Other,
}

crate::labelled_enum!(LeaveKind {
    Annual => "annual",
    Vacation => "vacation",
    Sick => "sick",
    Unpaid => "unpaid",
    Other => "other",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

crate::labelled_enum!(LeaveStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayrollEntry {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_salary: f64,
    #[serde(default)]
    pub bonuses: f64,
    #[serde(default)]
    pub deductions: f64,
    pub net_pay: f64,
    pub status: PayrollStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voucher_id: Option<Uuid>,
}

impl PayrollEntry {
    pub fn computed_net(&self) -> f64 {
        round_cents(self.base_salary + self.bonuses - self.deductions)
    }

    pub fn period(&self) -> (NaiveDate, NaiveDate) {
        (self.period_start, self.period_end)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    Draft,
    Posted,
}

crate::labelled_enum!(PayrollStatus {
    Draft => "draft",
    Posted => "posted",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_hours_need_both_times() {
        let mut record = AttendanceRecord {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 11, 19).unwrap(),
            status: AttendanceStatus::Present,
            check_in: NaiveTime::from_hms_opt(9, 0, 0),
            check_out: None,
        };
        assert_eq!(record.hours(), None);
        record.check_out = NaiveTime::from_hms_opt(17, 30, 0);
        assert_eq!(record.hours(), Some(8.5));
    }

    #[test]
    fn leave_days_clip_to_window() {
        let leave = LeaveRequest {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 28).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
            kind: LeaveKind::Unpaid,
            reason: None,
            status: LeaveStatus::Approved,
        };
        assert_eq!(leave.days(), 7);
        let feb_start = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let feb_end = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        assert_eq!(leave.days_within(feb_start, feb_end), 3);
    }
}

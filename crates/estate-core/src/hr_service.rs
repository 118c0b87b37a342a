//! Employee records, attendance, leave approvals, and payroll posting.

use chrono::{NaiveDate, NaiveTime};
use estate_domain::{
    inclusive_days, is_valid_email, ranges_overlap, round_cents, tid_prefix, AttendanceRecord,
    AttendanceStatus, Employee, EmployeeStatus, LeaveKind, LeaveRequest, LeaveStatus,
    PayrollEntry, PayrollStatus, VoucherLine, VoucherSource, VoucherType, Workspace,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    property_service::required, time::Clock, voucher_service::VoucherService, CoreError,
    ServiceResult,
};

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub department: String,
    pub start_date: NaiveDate,
    pub salary: f64,
}

#[derive(Debug, Clone)]
pub struct NewPayroll {
    pub employee_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_salary: f64,
    pub bonuses: f64,
    pub deductions: f64,
    /// When supplied it must equal base + bonuses - deductions.
    pub net_pay: Option<f64>,
}

pub struct HrService;

impl HrService {
    pub fn add_employee(ws: &mut Workspace, draft: NewEmployee) -> ServiceResult<Uuid> {
        let first_name = required("First name", &draft.first_name)?;
        let last_name = required("Last name", &draft.last_name)?;
        let email = draft.email.trim().to_ascii_lowercase();
        if !is_valid_email(&email) {
            return Err(CoreError::Validation(format!("`{}` is not a valid email", email)));
        }
        if ws.employees.iter().any(|e| e.email.eq_ignore_ascii_case(&email)) {
            return Err(CoreError::Conflict(format!(
                "an employee with email {} already exists",
                email
            )));
        }
        if !(draft.salary.is_finite() && draft.salary >= 0.0) {
            return Err(CoreError::validation("salary cannot be negative"));
        }
        let tid = ws.next_tid(tid_prefix::EMPLOYEE);
        let employee = Employee {
            id: Uuid::new_v4(),
            tid,
            first_name,
            last_name,
            email,
            position: draft.position.trim().to_string(),
            department: draft.department.trim().to_string(),
            start_date: draft.start_date,
            salary: round_cents(draft.salary),
            status: EmployeeStatus::Active,
        };
        let id = employee.id;
        info!(employee = %employee.tid, "employee added");
        ws.employees.push(employee);
        ws.touch();
        Ok(id)
    }

    pub fn set_salary(ws: &mut Workspace, id: Uuid, salary: f64) -> ServiceResult<()> {
        if !(salary.is_finite() && salary >= 0.0) {
            return Err(CoreError::validation("salary cannot be negative"));
        }
        Self::employee_mut(ws, id)?.salary = round_cents(salary);
        ws.touch();
        Ok(())
    }

    pub fn terminate(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        let employee = Self::employee_mut(ws, id)?;
        if employee.status == EmployeeStatus::Terminated {
            return Err(CoreError::InvalidOperation("employee already terminated".into()));
        }
        employee.status = EmployeeStatus::Terminated;
        ws.touch();
        Ok(())
    }

    pub fn record_attendance(
        ws: &mut Workspace,
        employee_id: Uuid,
        date: NaiveDate,
        status: AttendanceStatus,
        check_in: Option<NaiveTime>,
        check_out: Option<NaiveTime>,
    ) -> ServiceResult<Uuid> {
        Self::active_employee(ws, employee_id)?;
        if ws
            .attendance
            .iter()
            .any(|record| record.employee_id == employee_id && record.date == date)
        {
            return Err(CoreError::Conflict(format!(
                "attendance for {} is already recorded",
                date
            )));
        }
        match (check_in, check_out) {
            (None, Some(_)) => return Err(CoreError::validation("check-out without check-in")),
            (Some(start), Some(end)) if end <= start => {
                return Err(CoreError::validation("check-out must be after check-in"))
            }
            _ => {}
        }
        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            employee_id,
            date,
            status,
            check_in,
            check_out,
        };
        let id = record.id;
        ws.attendance.push(record);
        ws.touch();
        Ok(id)
    }

    pub fn request_leave(
        ws: &mut Workspace,
        employee_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        kind: LeaveKind,
        reason: Option<&str>,
    ) -> ServiceResult<Uuid> {
        Self::active_employee(ws, employee_id)?;
        if end_date < start_date {
            return Err(CoreError::validation("leave ends before it starts"));
        }
        let request = LeaveRequest {
            id: Uuid::new_v4(),
            employee_id,
            start_date,
            end_date,
            kind,
            reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            status: LeaveStatus::Pending,
        };
        let id = request.id;
        ws.leave_requests.push(request);
        ws.touch();
        Ok(id)
    }

    /// Approves or rejects a pending request. Approval refuses overlap with
    /// another approved leave of the same employee.
    pub fn decide_leave(ws: &mut Workspace, id: Uuid, approve: bool) -> ServiceResult<()> {
        let request = ws
            .leave_requests
            .iter()
            .find(|request| request.id == id)
            .ok_or_else(|| CoreError::not_found("Leave request", id))?;
        if request.status != LeaveStatus::Pending {
            return Err(CoreError::InvalidOperation(format!(
                "leave request is already {}",
                request.status
            )));
        }
        if approve {
            let period = (request.start_date, request.end_date);
            let clash = ws.leave_requests.iter().any(|other| {
                other.id != id
                    && other.employee_id == request.employee_id
                    && other.status == LeaveStatus::Approved
                    && ranges_overlap((other.start_date, other.end_date), period)
            });
            if clash {
                return Err(CoreError::Conflict(
                    "overlaps an approved leave of the same employee".into(),
                ));
            }
        }
        if let Some(request) = ws.leave_requests.iter_mut().find(|r| r.id == id) {
            request.status = if approve {
                LeaveStatus::Approved
            } else {
                LeaveStatus::Rejected
            };
        }
        ws.touch();
        Ok(())
    }

    pub fn record_payroll(ws: &mut Workspace, draft: NewPayroll) -> ServiceResult<Uuid> {
        if ws.employee(draft.employee_id).is_none() {
            return Err(CoreError::not_found("Employee", draft.employee_id));
        }
        if draft.period_end < draft.period_start {
            return Err(CoreError::validation("payroll period ends before it starts"));
        }
        for (label, amount) in [
            ("base salary", draft.base_salary),
            ("bonuses", draft.bonuses),
            ("deductions", draft.deductions),
        ] {
            if !(amount.is_finite() && amount >= 0.0) {
                return Err(CoreError::Validation(format!("{} cannot be negative", label)));
            }
        }
        let computed = round_cents(draft.base_salary + draft.bonuses - draft.deductions);
        if let Some(net) = draft.net_pay {
            if !estate_domain::amounts_match(net, computed) {
                return Err(CoreError::Validation(format!(
                    "net pay {:.2} does not match base + bonuses - deductions ({:.2})",
                    net, computed
                )));
            }
        }
        if computed < 0.0 {
            return Err(CoreError::validation("deductions exceed gross pay"));
        }
        if Self::has_overlapping_entry(ws, draft.employee_id, draft.period_start, draft.period_end) {
            return Err(CoreError::Conflict(
                "employee already has payroll for an overlapping period".into(),
            ));
        }
        let entry = PayrollEntry {
            id: Uuid::new_v4(),
            employee_id: draft.employee_id,
            period_start: draft.period_start,
            period_end: draft.period_end,
            base_salary: round_cents(draft.base_salary),
            bonuses: round_cents(draft.bonuses),
            deductions: round_cents(draft.deductions),
            net_pay: computed,
            status: PayrollStatus::Draft,
            voucher_id: None,
        };
        let id = entry.id;
        ws.payroll.push(entry);
        ws.touch();
        Ok(id)
    }

    /// Drafts payroll for every active employee that has none for the period.
    ///
    /// Base pay is the monthly salary; approved unpaid leave inside the period
    /// is deducted pro rata by calendar days.
    pub fn generate_payroll(
        ws: &mut Workspace,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> ServiceResult<Vec<Uuid>> {
        if period_end < period_start {
            return Err(CoreError::validation("payroll period ends before it starts"));
        }
        let period_days = inclusive_days(period_start, period_end) as f64;
        let drafts: Vec<NewPayroll> = ws
            .employees
            .iter()
            .filter(|employee| employee.is_active() && employee.start_date <= period_end)
            .filter(|employee| {
                !Self::has_overlapping_entry(ws, employee.id, period_start, period_end)
            })
            .map(|employee| {
                let base = employee.monthly_salary();
                let unpaid_days: i64 = ws
                    .leave_requests
                    .iter()
                    .filter(|leave| {
                        leave.employee_id == employee.id
                            && leave.kind == LeaveKind::Unpaid
                            && leave.status == LeaveStatus::Approved
                    })
                    .map(|leave| leave.days_within(period_start, period_end))
                    .sum();
                let deductions = round_cents(base / period_days * unpaid_days as f64).min(base);
                NewPayroll {
                    employee_id: employee.id,
                    period_start,
                    period_end,
                    base_salary: base,
                    bonuses: 0.0,
                    deductions,
                    net_pay: None,
                }
            })
            .collect();
        drafts
            .into_iter()
            .map(|draft| Self::record_payroll(ws, draft))
            .collect()
    }

    /// Books a payroll entry: salaries expense against salaries payable.
    pub fn post_payroll(
        ws: &mut Workspace,
        id: Uuid,
        date: NaiveDate,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let entry = ws
            .payroll
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| CoreError::not_found("Payroll entry", id))?;
        if entry.status != PayrollStatus::Draft {
            return Err(CoreError::InvalidOperation("payroll entry already posted".into()));
        }
        if entry.net_pay <= 0.0 {
            return Err(CoreError::validation("nothing to post for a zero net pay"));
        }
        let description = ws
            .employee(entry.employee_id)
            .map(|employee| format!("Payroll {} {}", employee.tid, entry.period_start))
            .unwrap_or_else(|| format!("Payroll {}", entry.period_start));
        let lines = vec![
            VoucherLine::debit(ws.posting.salaries_expense.clone(), entry.net_pay),
            VoucherLine::credit(ws.posting.salaries_payable.clone(), entry.net_pay),
        ];
        let voucher = VoucherService::post_with_source(
            ws,
            VoucherType::Journal,
            date,
            &description,
            lines,
            VoucherSource::Payroll(id),
            clock,
        )?;
        if let Some(entry) = ws.payroll.iter_mut().find(|entry| entry.id == id) {
            entry.status = PayrollStatus::Posted;
            entry.voucher_id = Some(voucher);
        }
        ws.touch();
        Ok(voucher)
    }

    pub fn find_employee<'a>(ws: &'a Workspace, key: &str) -> Option<&'a Employee> {
        let key = key.trim();
        ws.employees.iter().find(|employee| {
            employee.tid.as_str().eq_ignore_ascii_case(key) || employee.email.eq_ignore_ascii_case(key)
        })
    }

    fn has_overlapping_entry(ws: &Workspace, employee_id: Uuid, start: NaiveDate, end: NaiveDate) -> bool {
        ws.payroll.iter().any(|entry| {
            entry.employee_id == employee_id && ranges_overlap(entry.period(), (start, end))
        })
    }

    fn employee_mut(ws: &mut Workspace, id: Uuid) -> ServiceResult<&mut Employee> {
        ws.employees
            .iter_mut()
            .find(|employee| employee.id == id)
            .ok_or_else(|| CoreError::not_found("Employee", id))
    }

    fn active_employee(ws: &Workspace, id: Uuid) -> ServiceResult<&Employee> {
        let employee = ws
            .employee(id)
            .ok_or_else(|| CoreError::not_found("Employee", id))?;
        if employee.is_active() {
            Ok(employee)
        } else {
            Err(CoreError::InvalidOperation(format!(
                "employee {} is terminated",
                employee.tid
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{time::FixedClock, FinanceService};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn hire(ws: &mut Workspace, email: &str, salary: f64) -> Uuid {
        HrService::add_employee(
            ws,
            NewEmployee {
                first_name: "Sam".into(),
                last_name: "Lee".into(),
                email: email.into(),
                position: "Accountant".into(),
                department: "Finance".into(),
                start_date: date(1, 1),
                salary,
            },
        )
        .unwrap()
    }

    #[test]
    fn attendance_is_unique_per_day_and_times_are_ordered() {
        let mut ws = Workspace::new("HR");
        let emp = hire(&mut ws, "sam@example.com", 60_000.0);
        let nine = NaiveTime::from_hms_opt(9, 0, 0);
        let five = NaiveTime::from_hms_opt(17, 0, 0);
        HrService::record_attendance(&mut ws, emp, date(2, 3), AttendanceStatus::Present, nine, five).unwrap();
        assert!(HrService::record_attendance(&mut ws, emp, date(2, 3), AttendanceStatus::Late, nine, None).is_err());
        assert!(HrService::record_attendance(&mut ws, emp, date(2, 4), AttendanceStatus::Present, five, nine).is_err());
    }

    #[test]
    fn approving_overlapping_leave_is_refused() {
        let mut ws = Workspace::new("HR");
        let emp = hire(&mut ws, "sam@example.com", 60_000.0);
        let first = HrService::request_leave(&mut ws, emp, date(3, 1), date(3, 5), LeaveKind::Vacation, None).unwrap();
        let second = HrService::request_leave(&mut ws, emp, date(3, 5), date(3, 7), LeaveKind::Sick, None).unwrap();
        HrService::decide_leave(&mut ws, first, true).unwrap();
        assert!(matches!(HrService::decide_leave(&mut ws, second, true), Err(CoreError::Conflict(_))));
        HrService::decide_leave(&mut ws, second, false).unwrap();
        assert!(HrService::decide_leave(&mut ws, second, true).is_err());
    }

    #[test]
    fn payroll_net_must_match_and_periods_cannot_overlap() {
        let mut ws = Workspace::new("HR");
        let emp = hire(&mut ws, "sam@example.com", 60_000.0);
        let mut draft = NewPayroll {
            employee_id: emp,
            period_start: date(1, 1),
            period_end: date(1, 31),
            base_salary: 5000.0,
            bonuses: 500.0,
            deductions: 200.0,
            net_pay: Some(5000.0),
        };
        assert!(HrService::record_payroll(&mut ws, draft.clone()).is_err());
        draft.net_pay = Some(5300.0);
        let id = HrService::record_payroll(&mut ws, draft.clone()).unwrap();
        assert_eq!(ws.payroll[0].net_pay, 5300.0);
        draft.period_start = date(1, 15);
        draft.period_end = date(2, 14);
        assert!(matches!(HrService::record_payroll(&mut ws, draft), Err(CoreError::Conflict(_))));

        let clock = FixedClock::on(date(2, 1));
        HrService::post_payroll(&mut ws, id, date(1, 31), &clock).unwrap();
        assert_eq!(FinanceService::balance_of(&ws, "5100"), 5300.0);
        assert_eq!(FinanceService::balance_of(&ws, "2200"), 5300.0);
        assert!(HrService::post_payroll(&mut ws, id, date(1, 31), &clock).is_err());
    }

    #[test]
    fn generated_payroll_deducts_unpaid_leave() {
        let mut ws = Workspace::new("HR");
        let emp = hire(&mut ws, "sam@example.com", 36_000.0);
        let other = hire(&mut ws, "kim@example.com", 24_000.0);
        HrService::terminate(&mut ws, other).unwrap();
        let leave = HrService::request_leave(&mut ws, emp, date(4, 29), date(5, 2), LeaveKind::Unpaid, None).unwrap();
        HrService::decide_leave(&mut ws, leave, true).unwrap();

        let created = HrService::generate_payroll(&mut ws, date(4, 1), date(4, 30)).unwrap();
        assert_eq!(created.len(), 1);
        let entry = &ws.payroll[0];
        assert_eq!(entry.base_salary, 3000.0);
        assert_eq!(entry.deductions, 200.0);
        assert_eq!(entry.net_pay, 2800.0);
        assert!(HrService::generate_payroll(&mut ws, date(4, 1), date(4, 30)).unwrap().is_empty());
    }
}

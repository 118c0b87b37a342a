//! Posting engine: validates vouchers against double-entry discipline and the
//! per-type posting rules, then numbers and posts them.

use chrono::NaiveDate;
use estate_domain::{
    amounts_match, AccountSubtype, Tid, Voucher, VoucherLine, VoucherSource, VoucherStatus, VoucherType,
    Workspace,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{time::Clock, CoreError, ServiceResult, VoucherError};

pub struct VoucherService;

impl VoucherService {
    /// Checks a voucher without touching the workspace.
    ///
    /// Reversals are only held to the structural checks: their mirrored legs
    /// put cash and bank accounts on a journal. That includes reversing a
    /// reversal, which restores the legs of the voucher it undid.
    pub fn validate(ws: &Workspace, voucher: &Voucher) -> Result<(), VoucherError> {
        Self::validate_structure(ws, voucher)?;
        if matches!(voucher.source, VoucherSource::Reversal(_)) {
            return Ok(());
        }
        Self::validate_rule(ws, voucher)
    }

    /// Stores a validated voucher as a draft.
    pub fn create_draft(
        ws: &mut Workspace,
        voucher_type: VoucherType,
        date: NaiveDate,
        description: &str,
        lines: Vec<VoucherLine>,
    ) -> ServiceResult<Uuid> {
        let voucher = Voucher::new(voucher_type, date, description.trim(), lines);
        Self::validate(ws, &voucher)?;
        let id = voucher.id;
        debug!(voucher = %id, kind = voucher_type.code(), "voucher drafted");
        ws.vouchers.push(voucher);
        ws.touch();
        Ok(id)
    }

    /// Re-validates a draft, assigns its number, and marks it posted.
    pub fn post(ws: &mut Workspace, id: Uuid, clock: &dyn Clock) -> ServiceResult<Tid> {
        let index = Self::index_of(ws, id)?;
        let voucher = &ws.vouchers[index];
        if voucher.status != VoucherStatus::Draft {
            return Err(VoucherError::NotDraft(voucher.reference()).into());
        }
        Self::validate(ws, voucher)?;
        let code = voucher.voucher_type.code();
        let number = ws.next_tid(code);
        let voucher = &mut ws.vouchers[index];
        voucher.number = Some(number.clone());
        voucher.status = VoucherStatus::Posted;
        voucher.posted_at = Some(clock.now());
        info!(
            voucher = %number,
            debit = voucher.total_debit(),
            "voucher posted"
        );
        ws.touch();
        Ok(number)
    }

    pub fn create_and_post(
        ws: &mut Workspace,
        voucher_type: VoucherType,
        date: NaiveDate,
        description: &str,
        lines: Vec<VoucherLine>,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        Self::post_with_source(
            ws,
            voucher_type,
            date,
            description,
            lines,
            VoucherSource::Manual,
            clock,
        )
    }

    /// Posts a voucher generated on behalf of another document.
    pub fn post_with_source(
        ws: &mut Workspace,
        voucher_type: VoucherType,
        date: NaiveDate,
        description: &str,
        lines: Vec<VoucherLine>,
        source: VoucherSource,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let voucher =
            Voucher::new(voucher_type, date, description.trim(), lines).with_source(source);
        Self::validate(ws, &voucher)?;
        let id = voucher.id;
        ws.vouchers.push(voucher);
        Self::post(ws, id, clock)?;
        Ok(id)
    }

    /// Deletes a draft. Posted vouchers are reversed, never removed.
    pub fn remove(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        let index = Self::index_of(ws, id)?;
        if ws.vouchers[index].status != VoucherStatus::Draft {
            return Err(VoucherError::NotDraft(ws.vouchers[index].reference()).into());
        }
        ws.vouchers.remove(index);
        ws.touch();
        Ok(())
    }

    /// Posts a journal voucher that mirrors every line of a posted voucher and
    /// marks the original reversed. Returns the id of the reversing voucher.
    pub fn reverse(
        ws: &mut Workspace,
        id: Uuid,
        date: NaiveDate,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let index = Self::index_of(ws, id)?;
        let original = &ws.vouchers[index];
        if original.status != VoucherStatus::Posted {
            return Err(VoucherError::NotPosted(original.reference()).into());
        }
        let description = format!("Reversal of {}", original.reference());
        let lines = original.lines.iter().map(VoucherLine::mirrored).collect();
        let reversal = Self::post_with_source(
            ws,
            VoucherType::Journal,
            date,
            &description,
            lines,
            VoucherSource::Reversal(id),
            clock,
        )?;
        ws.vouchers[index].status = VoucherStatus::Reversed;
        info!(voucher = %ws.vouchers[index].reference(), "voucher reversed");
        ws.touch();
        Ok(reversal)
    }

    /// Resolves a voucher by number (`BPV-0001`) or id.
    pub fn find<'a>(ws: &'a Workspace, key: &str) -> ServiceResult<&'a Voucher> {
        if let Some(voucher) = ws.voucher_by_number(key) {
            return Ok(voucher);
        }
        key.trim()
            .parse::<Uuid>()
            .ok()
            .and_then(|id| ws.voucher(id))
            .ok_or_else(|| CoreError::not_found("Voucher", key))
    }

    pub fn list(ws: &Workspace, status: Option<VoucherStatus>) -> Vec<&Voucher> {
        ws.vouchers
            .iter()
            .filter(|voucher| status.map_or(true, |status| voucher.status == status))
            .collect()
    }

    fn index_of(ws: &Workspace, id: Uuid) -> ServiceResult<usize> {
        ws.vouchers
            .iter()
            .position(|voucher| voucher.id == id)
            .ok_or_else(|| VoucherError::NotFound(id).into())
    }

    fn validate_structure(ws: &Workspace, voucher: &Voucher) -> Result<(), VoucherError> {
        if voucher.lines.len() < 2 {
            return Err(VoucherError::TooFewLines(voucher.lines.len()));
        }
        for (index, line) in voucher.lines.iter().enumerate() {
            let number = index + 1;
            if !line.debit.is_finite() || !line.credit.is_finite() {
                return Err(VoucherError::InvalidLine {
                    line: number,
                    reason: "amounts must be finite".into(),
                });
            }
            if line.debit < 0.0 || line.credit < 0.0 {
                return Err(VoucherError::InvalidLine {
                    line: number,
                    reason: "amounts cannot be negative".into(),
                });
            }
            if line.side().is_none() {
                return Err(VoucherError::InvalidLine {
                    line: number,
                    reason: "exactly one of debit or credit must be positive".into(),
                });
            }
            let account = ws
                .account(&line.account_code)
                .ok_or_else(|| VoucherError::UnknownAccount(line.account_code.clone()))?;
            if !account.active {
                return Err(VoucherError::InactiveAccount(account.code.clone()));
            }
        }
        let (debit, credit) = (voucher.total_debit(), voucher.total_credit());
        if !amounts_match(debit, credit) {
            return Err(VoucherError::Unbalanced { debit, credit });
        }
        Ok(())
    }

    fn validate_rule(ws: &Workspace, voucher: &Voucher) -> Result<(), VoucherError> {
        let rule = voucher.voucher_type.posting_rule();
        let code = voucher.voucher_type.code();
        let mut legs = Vec::with_capacity(voucher.lines.len());
        for line in &voucher.lines {
            let account = ws
                .account(&line.account_code)
                .ok_or_else(|| VoucherError::UnknownAccount(line.account_code.clone()))?;
            legs.push((line, account));
        }

        let is_control = |subtype: AccountSubtype| rule.control.map_or(false, |c| c.subtype == subtype);
        if let Some(control) = rule.control {
            let controls: Vec<_> = legs
                .iter()
                .filter(|(_, account)| is_control(account.subtype))
                .collect();
            match controls.as_slice() {
                [] => {
                    return Err(VoucherError::MissingControlLeg {
                        voucher_type: code,
                        subtype: control.subtype,
                    })
                }
                [(line, account)] => {
                    if line.side() != Some(control.side) {
                        return Err(VoucherError::ControlSideMismatch {
                            account: account.code.clone(),
                            expected: control.side,
                        });
                    }
                }
                many => {
                    return Err(VoucherError::MultipleControlLegs {
                        voucher_type: code,
                        count: many.len(),
                    })
                }
            }
        }

        for (line, account) in legs.iter().filter(|(_, a)| !is_control(a.subtype)) {
            if rule.forbidden_user_subtypes.contains(&account.subtype) {
                return Err(VoucherError::CashOnUserLeg(account.code.clone()));
            }
            if let Some(expected) = rule.user_side() {
                if line.side() != Some(expected) {
                    return Err(VoucherError::UserSideMismatch {
                        account: account.code.clone(),
                        expected,
                        voucher_type: code,
                    });
                }
            }
            if !rule.allowed_user_categories.contains(&account.category) {
                return Err(VoucherError::CategoryNotAllowed {
                    account: account.code.clone(),
                    category: account.category,
                    voucher_type: code,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use estate_domain::{AccountCategory, LedgerAccount, Side};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock::on(date())
    }

    fn draft(ws: &mut Workspace, kind: VoucherType, lines: Vec<VoucherLine>) -> ServiceResult<Uuid> {
        VoucherService::create_draft(ws, kind, date(), "test", lines)
    }

    fn voucher_err(result: ServiceResult<Uuid>) -> VoucherError {
        match result {
            Err(CoreError::Voucher(err)) => err,
            other => panic!("expected voucher error, got {other:?}"),
        }
    }

    #[test]
    fn bank_payment_posts_and_is_numbered() {
        let mut ws = Workspace::new("Test");
        let id = draft(
            &mut ws,
            VoucherType::BankPayment,
            vec![VoucherLine::debit("5000", 250.0), VoucherLine::credit("1010", 250.0)],
        )
        .expect("valid BPV");
        let number = VoucherService::post(&mut ws, id, &clock()).expect("post");
        assert_eq!(number.as_str(), "BPV-0001");
        assert_eq!(ws.voucher(id).unwrap().status, VoucherStatus::Posted);
    }

    #[test]
    fn control_leg_on_wrong_side_is_rejected() {
        let mut ws = Workspace::new("Test");
        let err = voucher_err(draft(
            &mut ws,
            VoucherType::BankReceipt,
            vec![VoucherLine::debit("4000", 100.0), VoucherLine::credit("1010", 100.0)],
        ));
        assert_eq!(
            err,
            VoucherError::ControlSideMismatch {
                account: "1010".into(),
                expected: Side::Debit
            }
        );
    }

    #[test]
    fn missing_and_duplicate_control_legs() {
        let mut ws = Workspace::new("Test");
        let err = voucher_err(draft(
            &mut ws,
            VoucherType::CashPayment,
            vec![VoucherLine::debit("5000", 10.0), VoucherLine::credit("2000", 10.0)],
        ));
        assert!(matches!(err, VoucherError::MissingControlLeg { subtype: AccountSubtype::Cash, .. }));

        let err = voucher_err(draft(
            &mut ws,
            VoucherType::CashPayment,
            vec![
                VoucherLine::debit("5000", 20.0),
                VoucherLine::credit("1000", 10.0),
                VoucherLine::credit("1000", 10.0),
            ],
        ));
        assert!(matches!(err, VoucherError::MultipleControlLegs { count: 2, .. }));
    }

    #[test]
    fn receipt_rejects_expense_user_leg() {
        let mut ws = Workspace::new("Test");
        let err = voucher_err(draft(
            &mut ws,
            VoucherType::CashReceipt,
            vec![VoucherLine::debit("1000", 40.0), VoucherLine::credit("5000", 40.0)],
        ));
        assert!(matches!(
            err,
            VoucherError::CategoryNotAllowed { category: AccountCategory::Expense, .. }
        ));
    }

    #[test]
    fn journal_rejects_cash_accounts_and_imbalance() {
        let mut ws = Workspace::new("Test");
        let err = voucher_err(draft(
            &mut ws,
            VoucherType::Journal,
            vec![VoucherLine::debit("1000", 40.0), VoucherLine::credit("4200", 40.0)],
        ));
        assert_eq!(err, VoucherError::CashOnUserLeg("1000".into()));

        let err = voucher_err(draft(
            &mut ws,
            VoucherType::Journal,
            vec![VoucherLine::debit("5000", 40.0), VoucherLine::credit("2000", 39.99)],
        ));
        assert!(matches!(err, VoucherError::Unbalanced { .. }));
    }

    #[test]
    fn rounding_noise_within_tolerance_is_balanced() {
        let mut ws = Workspace::new("Test");
        draft(
            &mut ws,
            VoucherType::Journal,
            vec![
                VoucherLine::debit("5000", 0.1),
                VoucherLine::debit("5000", 0.2),
                VoucherLine::credit("2000", 0.3),
            ],
        )
        .expect("0.1 + 0.2 balances 0.3");
    }

    #[test]
    fn line_shape_and_account_checks() {
        let mut ws = Workspace::new("Test");
        let err = voucher_err(draft(&mut ws, VoucherType::Journal, vec![VoucherLine::debit("5000", 1.0)]));
        assert_eq!(err, VoucherError::TooFewLines(1));

        let two_sided = VoucherLine {
            account_code: "5000".into(),
            debit: 5.0,
            credit: 5.0,
            memo: None,
        };
        let err = voucher_err(draft(
            &mut ws,
            VoucherType::Journal,
            vec![two_sided, VoucherLine::credit("2000", 0.0)],
        ));
        assert!(matches!(err, VoucherError::InvalidLine { line: 1, .. }));

        let err = voucher_err(draft(
            &mut ws,
            VoucherType::Journal,
            vec![VoucherLine::debit("9999", 5.0), VoucherLine::credit("2000", 5.0)],
        ));
        assert_eq!(err, VoucherError::UnknownAccount("9999".into()));

        ws.accounts.push({
            let mut closed = LedgerAccount::new("5900", "Closed", AccountCategory::Expense);
            closed.active = false;
            closed
        });
        let err = voucher_err(draft(
            &mut ws,
            VoucherType::Journal,
            vec![VoucherLine::debit("5900", 5.0), VoucherLine::credit("2000", 5.0)],
        ));
        assert_eq!(err, VoucherError::InactiveAccount("5900".into()));
    }

    #[test]
    fn reversal_mirrors_lines_and_only_drafts_are_removable() {
        let mut ws = Workspace::new("Test");
        let id = VoucherService::create_and_post(
            &mut ws,
            VoucherType::BankReceipt,
            date(),
            "deposit",
            vec![VoucherLine::debit("1010", 75.0), VoucherLine::credit("3000", 75.0)],
            &clock(),
        )
        .unwrap();
        assert!(VoucherService::remove(&mut ws, id).is_err());

        let reversal = VoucherService::reverse(&mut ws, id, date(), &clock()).expect("reverse");
        let mirror = ws.voucher(reversal).unwrap();
        assert_eq!(mirror.voucher_type, VoucherType::Journal);
        assert_eq!(mirror.number.as_ref().unwrap().as_str(), "JV-0001");
        assert_eq!(mirror.lines[0].credit, 75.0);
        assert_eq!(mirror.source, VoucherSource::Reversal(id));
        assert_eq!(ws.voucher(id).unwrap().status, VoucherStatus::Reversed);
        assert!(VoucherService::reverse(&mut ws, id, date(), &clock()).is_err());
    }

    #[test]
    fn reversing_a_reversal_restores_the_original_legs() {
        let mut ws = Workspace::new("Test");
        let original_lines = vec![VoucherLine::debit("5000", 40.0), VoucherLine::credit("1000", 40.0)];
        let id = VoucherService::create_and_post(
            &mut ws,
            VoucherType::CashPayment,
            date(),
            "supplies",
            original_lines.clone(),
            &clock(),
        )
        .unwrap();
        let first = VoucherService::reverse(&mut ws, id, date(), &clock()).unwrap();
        let second = VoucherService::reverse(&mut ws, first, date(), &clock()).expect("cash legs on a reversal JV");

        let restored = ws.voucher(second).unwrap();
        assert_eq!(restored.voucher_type, VoucherType::Journal);
        assert_eq!(restored.status, VoucherStatus::Posted);
        assert_eq!(restored.source, VoucherSource::Reversal(first));
        assert_eq!(restored.lines, original_lines);
        assert_eq!(ws.voucher(first).unwrap().status, VoucherStatus::Reversed);
        assert!(VoucherService::validate(&ws, restored).is_ok());

        let mut plain = restored.clone();
        plain.source = VoucherSource::Manual;
        assert!(matches!(
            VoucherService::validate(&ws, &plain),
            Err(VoucherError::CashOnUserLeg(code)) if code == "1000"
        ));
    }

    #[test]
    fn find_accepts_number_case_insensitively() {
        let mut ws = Workspace::new("Test");
        VoucherService::create_and_post(
            &mut ws,
            VoucherType::Journal,
            date(),
            "accrual",
            vec![VoucherLine::debit("5000", 5.0), VoucherLine::credit("2000", 5.0)],
            &clock(),
        )
        .unwrap();
        assert!(VoucherService::find(&ws, "jv-0001").is_ok());
        assert!(VoucherService::find(&ws, "JV-0002").is_err());
    }
}

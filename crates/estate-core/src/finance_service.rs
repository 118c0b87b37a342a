//! Chart of accounts, balances, invoicing, payments, and commissions.
//!
//! Every money movement here is booked through [`VoucherService`], so the
//! ledger stays the single source of truth for balances.

use chrono::NaiveDate;
use estate_domain::{
    round_cents, tid_prefix, AccountCategory, Commission, CommissionStatus, Invoice, InvoiceItem,
    InvoiceStatus, LedgerAccount, Payment, PaymentMethod, Side, VoucherLine, VoucherSource,
    VoucherType, Workspace,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    property_service::required, time::Clock, voucher_service::VoucherService, CoreError,
    ServiceResult,
};

/// Inputs for [`FinanceService::create_invoice`].
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub tenant_id: Option<Uuid>,
    pub buyer_id: Option<Uuid>,
    pub lease_id: Option<Uuid>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountBalance {
    pub code: String,
    pub name: String,
    pub category: AccountCategory,
    pub debit: f64,
    pub credit: f64,
    /// Net balance signed towards the category's normal side.
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrialBalanceRow {
    pub code: String,
    pub name: String,
    pub debit: f64,
    pub credit: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: f64,
    pub total_credit: f64,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        estate_domain::amounts_match(self.total_debit, self.total_credit)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatementLine {
    pub date: NaiveDate,
    pub voucher: String,
    pub description: String,
    pub debit: f64,
    pub credit: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    Days1To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgingBucket {
    pub fn for_days_past_due(days: i64) -> Self {
        match days {
            d if d <= 0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Over90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgingBucket::Current => "current",
            AgingBucket::Days1To30 => "1-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days61To90 => "61-90",
            AgingBucket::Over90 => "90+",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgingRow {
    pub invoice: String,
    pub party: String,
    pub due_date: NaiveDate,
    pub days_past_due: i64,
    pub bucket: AgingBucket,
    pub outstanding: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AgingTotals {
    pub current: f64,
    pub days_1_30: f64,
    pub days_31_60: f64,
    pub days_61_90: f64,
    pub over_90: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub rows: Vec<AgingRow>,
    pub totals: AgingTotals,
}

pub struct FinanceService;

impl FinanceService {
    pub fn add_account(ws: &mut Workspace, account: LedgerAccount) -> ServiceResult<()> {
        let code = required("Account code", &account.code)?;
        required("Account name", &account.name)?;
        if ws.account(&code).is_some() {
            return Err(CoreError::Conflict(format!("account {} already exists", code)));
        }
        ws.accounts.push(LedgerAccount { code, ..account });
        ws.accounts.sort_by(|a, b| a.code.cmp(&b.code));
        ws.touch();
        Ok(())
    }

    /// Deactivates an account whose balance is zero and that automatic postings do not use.
    pub fn deactivate_account(ws: &mut Workspace, code: &str) -> ServiceResult<()> {
        if ws.account(code).is_none() {
            return Err(CoreError::not_found("Account", code));
        }
        let posting = &ws.posting;
        let reserved = [
            &posting.cash,
            &posting.bank,
            &posting.receivable,
            &posting.tax_payable,
            &posting.salaries_payable,
            &posting.commissions_payable,
            &posting.rental_income,
            &posting.sales_revenue,
            &posting.salaries_expense,
            &posting.commission_expense,
        ];
        if reserved.iter().any(|reserved| reserved.as_str() == code) {
            return Err(CoreError::InvalidOperation(format!(
                "account {} is used by automatic postings",
                code
            )));
        }
        let balance = Self::balance_of(ws, code);
        if balance.abs() >= estate_domain::BALANCE_TOLERANCE {
            return Err(CoreError::InvalidOperation(format!(
                "account {} still carries a balance of {:.2}",
                code, balance
            )));
        }
        if let Some(account) = ws.accounts.iter_mut().find(|account| account.code == code) {
            account.active = false;
        }
        ws.touch();
        Ok(())
    }

    /// Balance of one account, signed towards its normal side.
    pub fn balance_of(ws: &Workspace, code: &str) -> f64 {
        Self::account_balances(ws)
            .into_iter()
            .find(|row| row.code == code)
            .map_or(0.0, |row| row.balance)
    }

    pub fn account_balances(ws: &Workspace) -> Vec<AccountBalance> {
        ws.accounts
            .iter()
            .map(|account| {
                let (debit, credit) = ws
                    .vouchers
                    .iter()
                    .filter(|voucher| voucher.affects_balances())
                    .flat_map(|voucher| voucher.lines.iter())
                    .filter(|line| line.account_code == account.code)
                    .fold((0.0, 0.0), |(d, c), line| (d + line.debit, c + line.credit));
                let balance = match account.category.normal_side() {
                    Side::Debit => debit - credit,
                    Side::Credit => credit - debit,
                };
                AccountBalance {
                    code: account.code.clone(),
                    name: account.name.clone(),
                    category: account.category,
                    debit: round_cents(debit),
                    credit: round_cents(credit),
                    balance: round_cents(balance),
                }
            })
            .collect()
    }

    pub fn trial_balance(ws: &Workspace) -> TrialBalance {
        let rows: Vec<TrialBalanceRow> = Self::account_balances(ws)
            .into_iter()
            .filter(|row| row.debit != 0.0 || row.credit != 0.0)
            .map(|row| {
                let net = round_cents(row.debit - row.credit);
                TrialBalanceRow {
                    code: row.code,
                    name: row.name,
                    debit: net.max(0.0),
                    credit: (-net).max(0.0),
                }
            })
            .collect();
        let total_debit = round_cents(rows.iter().map(|row| row.debit).sum());
        let total_credit = round_cents(rows.iter().map(|row| row.credit).sum());
        TrialBalance {
            rows,
            total_debit,
            total_credit,
        }
    }

    /// Every posted line touching `code`, oldest first, with a running balance.
    pub fn account_statement(ws: &Workspace, code: &str) -> ServiceResult<Vec<StatementLine>> {
        let account = ws
            .account(code)
            .ok_or_else(|| CoreError::not_found("Account", code))?;
        let normal = account.category.normal_side();
        let mut vouchers: Vec<_> = ws
            .vouchers
            .iter()
            .filter(|voucher| voucher.affects_balances())
            .collect();
        vouchers.sort_by(|a, b| (a.date, &a.number).cmp(&(b.date, &b.number)));

        let mut running = 0.0;
        let mut lines = Vec::new();
        for voucher in vouchers {
            for line in voucher.lines.iter().filter(|line| line.account_code == code) {
                running += match normal {
                    Side::Debit => line.debit - line.credit,
                    Side::Credit => line.credit - line.debit,
                };
                lines.push(StatementLine {
                    date: voucher.date,
                    voucher: voucher.reference(),
                    description: line
                        .memo
                        .clone()
                        .unwrap_or_else(|| voucher.description.clone()),
                    debit: line.debit,
                    credit: line.credit,
                    balance: round_cents(running),
                });
            }
        }
        Ok(lines)
    }

    pub fn create_invoice(ws: &mut Workspace, draft: NewInvoice) -> ServiceResult<Uuid> {
        if draft.items.is_empty() {
            return Err(CoreError::validation("an invoice needs at least one item"));
        }
        for item in &draft.items {
            required("Item description", &item.description)?;
            if !(item.quantity.is_finite() && item.quantity > 0.0) {
                return Err(CoreError::validation("item quantity must be positive"));
            }
            if !(item.unit_price.is_finite() && item.unit_price >= 0.0) {
                return Err(CoreError::validation("item price cannot be negative"));
            }
            if !(0.0..=1.0).contains(&item.tax_rate) {
                return Err(CoreError::validation("tax rate must be between 0 and 1"));
            }
        }
        if draft.due_date < draft.issue_date {
            return Err(CoreError::validation("due date precedes issue date"));
        }
        match (draft.tenant_id, draft.buyer_id) {
            (None, None) => {
                return Err(CoreError::validation("an invoice needs a tenant or a buyer"))
            }
            (Some(_), Some(_)) => {
                return Err(CoreError::validation(
                    "an invoice is billed to either a tenant or a buyer",
                ))
            }
            (Some(tenant), None) if ws.tenant(tenant).is_none() => {
                return Err(CoreError::not_found("Tenant", tenant))
            }
            (None, Some(buyer)) if ws.buyer(buyer).is_none() => {
                return Err(CoreError::not_found("Buyer", buyer))
            }
            _ => {}
        }
        if let Some(lease_id) = draft.lease_id {
            let lease = ws
                .lease(lease_id)
                .ok_or_else(|| CoreError::not_found("Lease", lease_id))?;
            if Some(lease.tenant_id) != draft.tenant_id {
                return Err(CoreError::validation("lease belongs to another tenant"));
            }
        }
        let number = ws.next_tid(tid_prefix::INVOICE);
        let mut invoice = Invoice::new(number, draft.issue_date, draft.due_date, draft.items);
        invoice.tenant_id = draft.tenant_id;
        invoice.buyer_id = draft.buyer_id;
        invoice.lease_id = draft.lease_id;
        let id = invoice.id;
        ws.invoices.push(invoice);
        ws.touch();
        Ok(id)
    }

    /// Issues a draft invoice and books the receivable against revenue and tax.
    pub fn issue_invoice(ws: &mut Workspace, id: Uuid, clock: &dyn Clock) -> ServiceResult<Uuid> {
        let invoice = ws.invoice(id).ok_or_else(|| CoreError::not_found("Invoice", id))?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(CoreError::InvalidOperation(format!(
                "invoice {} is already {}",
                invoice.number, invoice.status
            )));
        }
        let (subtotal, tax, total) = (invoice.subtotal(), invoice.tax_amount(), invoice.total_amount());
        if total <= 0.0 {
            return Err(CoreError::validation("cannot issue an invoice with a zero total"));
        }
        let posting = &ws.posting;
        let revenue = if invoice.buyer_id.is_some() {
            posting.sales_revenue.clone()
        } else {
            posting.rental_income.clone()
        };
        let mut lines = vec![VoucherLine::debit(posting.receivable.clone(), total)];
        if subtotal > 0.0 {
            lines.push(VoucherLine::credit(revenue, subtotal));
        }
        if tax > 0.0 {
            lines.push(VoucherLine::credit(posting.tax_payable.clone(), tax));
        }
        let description = format!("Invoice {}", invoice.number);
        let date = invoice.issue_date;
        let voucher = VoucherService::post_with_source(
            ws,
            VoucherType::Journal,
            date,
            &description,
            lines,
            VoucherSource::Invoice(id),
            clock,
        )?;
        if let Some(invoice) = ws.invoice_mut(id) {
            invoice.status = InvoiceStatus::Issued;
            invoice.voucher_id = Some(voucher);
            info!(invoice = %invoice.number, total, "invoice issued");
        }
        ws.touch();
        Ok(voucher)
    }

    /// Voids an invoice with no payments, reversing its posting if it was issued.
    pub fn void_invoice(ws: &mut Workspace, id: Uuid, clock: &dyn Clock) -> ServiceResult<()> {
        let invoice = ws.invoice(id).ok_or_else(|| CoreError::not_found("Invoice", id))?;
        if invoice.amount_paid > 0.0 {
            return Err(CoreError::InvalidOperation(format!(
                "invoice {} has payments and cannot be voided",
                invoice.number
            )));
        }
        if invoice.status == InvoiceStatus::Void {
            return Err(CoreError::InvalidOperation(format!(
                "invoice {} is already void",
                invoice.number
            )));
        }
        if let Some(voucher) = invoice.voucher_id {
            VoucherService::reverse(ws, voucher, clock.today(), clock)?;
        }
        if let Some(invoice) = ws.invoice_mut(id) {
            invoice.status = InvoiceStatus::Void;
        }
        ws.touch();
        Ok(())
    }

    /// Records a payment against an issued invoice and posts the matching receipt voucher.
    pub fn record_payment(
        ws: &mut Workspace,
        invoice_id: Uuid,
        amount: f64,
        method: PaymentMethod,
        date: NaiveDate,
        reference: Option<&str>,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let invoice = ws
            .invoice(invoice_id)
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id))?;
        if !invoice.accepts_payments() {
            return Err(CoreError::InvalidOperation(format!(
                "invoice {} is {} and does not accept payments",
                invoice.number, invoice.status
            )));
        }
        let amount = round_cents(amount);
        if !(amount.is_finite() && amount > 0.0) {
            return Err(CoreError::validation("payment amount must be positive"));
        }
        let outstanding = invoice.outstanding();
        if amount - outstanding >= estate_domain::BALANCE_TOLERANCE {
            return Err(CoreError::Validation(format!(
                "payment of {:.2} exceeds the outstanding {:.2}",
                amount, outstanding
            )));
        }
        let voucher_type = method.receipt_voucher();
        let control = match voucher_type {
            VoucherType::CashReceipt => ws.posting.cash.clone(),
            _ => ws.posting.bank.clone(),
        };
        let lines = vec![
            VoucherLine::debit(control, amount),
            VoucherLine::credit(ws.posting.receivable.clone(), amount),
        ];
        let description = format!("Payment for {}", invoice.number);
        let mut payment = Payment::new(invoice_id, date, amount, method);
        if let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) {
            payment = payment.with_reference(reference);
        }
        let voucher = VoucherService::post_with_source(
            ws,
            voucher_type,
            date,
            &description,
            lines,
            VoucherSource::Payment(payment.id),
            clock,
        )?;
        payment.voucher_id = Some(voucher);
        let payment_id = payment.id;
        ws.payments.push(payment);
        if let Some(invoice) = ws.invoice_mut(invoice_id) {
            invoice.amount_paid = round_cents(invoice.amount_paid + amount);
            invoice.status = if invoice.outstanding() < estate_domain::BALANCE_TOLERANCE {
                InvoiceStatus::Paid
            } else {
                InvoiceStatus::PartiallyPaid
            };
            info!(invoice = %invoice.number, amount, status = %invoice.status, "payment recorded");
        }
        ws.touch();
        Ok(payment_id)
    }

    /// Accrues an agent commission. `amount` overrides `base_amount * rate` when given.
    #[allow(clippy::too_many_arguments)]
    pub fn accrue_commission(
        ws: &mut Workspace,
        agent_id: Uuid,
        deal_id: Option<Uuid>,
        base_amount: f64,
        rate: f64,
        amount: Option<f64>,
        date: NaiveDate,
        description: Option<&str>,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        if ws.employee(agent_id).is_none() {
            return Err(CoreError::not_found("Agent", agent_id));
        }
        if let Some(deal_id) = deal_id {
            if ws.deal(deal_id).is_none() {
                return Err(CoreError::not_found("Deal", deal_id));
            }
        }
        if !(base_amount.is_finite() && base_amount >= 0.0) {
            return Err(CoreError::validation("commission base cannot be negative"));
        }
        if !(0.0..=1.0).contains(&rate) {
            return Err(CoreError::validation("commission rate must be between 0 and 1"));
        }
        let amount = round_cents(amount.unwrap_or(base_amount * rate));
        if !(amount.is_finite() && amount > 0.0) {
            return Err(CoreError::validation("commission amount must be positive"));
        }
        let commission = Commission {
            id: Uuid::new_v4(),
            agent_id,
            deal_id,
            base_amount,
            rate,
            amount,
            description: description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            date,
            status: CommissionStatus::Accrued,
            voucher_id: None,
        };
        let lines = vec![
            VoucherLine::debit(ws.posting.commission_expense.clone(), amount),
            VoucherLine::credit(ws.posting.commissions_payable.clone(), amount),
        ];
        let voucher = VoucherService::post_with_source(
            ws,
            VoucherType::Journal,
            date,
            "Commission accrual",
            lines,
            VoucherSource::Commission(commission.id),
            clock,
        )?;
        let id = commission.id;
        ws.commissions.push(Commission {
            voucher_id: Some(voucher),
            ..commission
        });
        ws.touch();
        Ok(id)
    }

    /// Settles an accrued commission from the bank.
    pub fn pay_commission(
        ws: &mut Workspace,
        id: Uuid,
        date: NaiveDate,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let commission = ws
            .commissions
            .iter()
            .find(|commission| commission.id == id)
            .ok_or_else(|| CoreError::not_found("Commission", id))?;
        if commission.status != CommissionStatus::Accrued {
            return Err(CoreError::InvalidOperation("commission is already paid".into()));
        }
        let lines = vec![
            VoucherLine::debit(ws.posting.commissions_payable.clone(), commission.amount),
            VoucherLine::credit(ws.posting.bank.clone(), commission.amount),
        ];
        let voucher = VoucherService::post_with_source(
            ws,
            VoucherType::BankPayment,
            date,
            "Commission payout",
            lines,
            VoucherSource::Commission(id),
            clock,
        )?;
        if let Some(commission) = ws.commissions.iter_mut().find(|c| c.id == id) {
            commission.status = CommissionStatus::Paid;
        }
        ws.touch();
        Ok(voucher)
    }

    pub fn receivables_aging(ws: &Workspace, today: NaiveDate) -> AgingReport {
        let mut rows: Vec<AgingRow> = ws
            .invoices
            .iter()
            .filter(|invoice| invoice.outstanding() > 0.0)
            .map(|invoice| {
                let days_past_due = (today - invoice.due_date).num_days();
                AgingRow {
                    invoice: invoice.number.to_string(),
                    party: Self::billed_party(ws, invoice),
                    due_date: invoice.due_date,
                    days_past_due: days_past_due.max(0),
                    bucket: AgingBucket::for_days_past_due(days_past_due),
                    outstanding: invoice.outstanding(),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.days_past_due.cmp(&a.days_past_due));

        let mut totals = AgingTotals::default();
        for row in &rows {
            let slot = match row.bucket {
                AgingBucket::Current => &mut totals.current,
                AgingBucket::Days1To30 => &mut totals.days_1_30,
                AgingBucket::Days31To60 => &mut totals.days_31_60,
                AgingBucket::Days61To90 => &mut totals.days_61_90,
                AgingBucket::Over90 => &mut totals.over_90,
            };
            *slot = round_cents(*slot + row.outstanding);
            totals.total = round_cents(totals.total + row.outstanding);
        }
        AgingReport {
            as_of: today,
            rows,
            totals,
        }
    }

    pub fn find_invoice<'a>(ws: &'a Workspace, key: &str) -> ServiceResult<&'a Invoice> {
        ws.invoices
            .iter()
            .find(|invoice| invoice.number.as_str().eq_ignore_ascii_case(key.trim()))
            .or_else(|| key.trim().parse().ok().and_then(|id| ws.invoice(id)))
            .ok_or_else(|| CoreError::not_found("Invoice", key))
    }

    fn billed_party(ws: &Workspace, invoice: &Invoice) -> String {
        invoice
            .tenant_id
            .and_then(|id| ws.tenant(id))
            .map(|tenant| tenant.name.clone())
            .or_else(|| {
                invoice
                    .buyer_id
                    .and_then(|id| ws.buyer(id))
                    .map(|buyer| buyer.name.clone())
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{party_service::PartyService, time::FixedClock};
    use estate_domain::{VoucherStatus, VoucherType};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn setup() -> (Workspace, Uuid, FixedClock) {
        let mut ws = Workspace::new("Finance");
        let tenant = PartyService::add_tenant(&mut ws, "Jane", "jane@example.com", None).unwrap();
        (ws, tenant, FixedClock::on(date(1, 1)))
    }

    fn issued_invoice(ws: &mut Workspace, tenant: Uuid, clock: &FixedClock) -> Uuid {
        let id = FinanceService::create_invoice(
            ws,
            NewInvoice {
                tenant_id: Some(tenant),
                buyer_id: None,
                lease_id: None,
                issue_date: date(1, 1),
                due_date: date(1, 31),
                items: vec![InvoiceItem::new("Rent", 1.0, 1000.0).with_tax(0.1)],
            },
        )
        .unwrap();
        FinanceService::issue_invoice(ws, id, clock).unwrap();
        id
    }

    #[test]
    fn issuing_books_receivable_revenue_and_tax() {
        let (mut ws, tenant, clock) = setup();
        issued_invoice(&mut ws, tenant, &clock);
        assert_eq!(FinanceService::balance_of(&ws, "1100"), 1100.0);
        assert_eq!(FinanceService::balance_of(&ws, "4000"), 1000.0);
        assert_eq!(FinanceService::balance_of(&ws, "2100"), 100.0);
        assert!(FinanceService::trial_balance(&ws).is_balanced());
    }

    #[test]
    fn payments_pick_voucher_type_by_method_and_cap_at_outstanding() {
        let (mut ws, tenant, clock) = setup();
        let invoice = issued_invoice(&mut ws, tenant, &clock);

        FinanceService::record_payment(&mut ws, invoice, 600.0, PaymentMethod::Cash, date(1, 5), None, &clock)
            .unwrap();
        assert_eq!(ws.invoice(invoice).unwrap().status, InvoiceStatus::PartiallyPaid);
        let err = FinanceService::record_payment(
            &mut ws,
            invoice,
            600.0,
            PaymentMethod::BankTransfer,
            date(1, 6),
            None,
            &clock,
        )
        .expect_err("overpayment");
        assert!(matches!(err, CoreError::Validation(_)));

        FinanceService::record_payment(
            &mut ws,
            invoice,
            500.0,
            PaymentMethod::BankTransfer,
            date(1, 6),
            Some("TRX-1"),
            &clock,
        )
        .unwrap();
        assert_eq!(ws.invoice(invoice).unwrap().status, InvoiceStatus::Paid);
        let kinds: Vec<_> = ws.vouchers.iter().map(|v| v.voucher_type).collect();
        assert_eq!(
            kinds,
            vec![VoucherType::Journal, VoucherType::CashReceipt, VoucherType::BankReceipt]
        );
        assert_eq!(FinanceService::balance_of(&ws, "1000"), 600.0);
        assert_eq!(FinanceService::balance_of(&ws, "1010"), 500.0);
        assert_eq!(FinanceService::balance_of(&ws, "1100"), 0.0);
    }

    #[test]
    fn void_reverses_issue_posting() {
        let (mut ws, tenant, clock) = setup();
        let invoice = issued_invoice(&mut ws, tenant, &clock);
        FinanceService::void_invoice(&mut ws, invoice, &clock).unwrap();
        assert_eq!(ws.invoice(invoice).unwrap().status, InvoiceStatus::Void);
        assert_eq!(ws.vouchers[0].status, VoucherStatus::Reversed);
        assert_eq!(FinanceService::balance_of(&ws, "1100"), 0.0);
        assert!(FinanceService::record_payment(
            &mut ws,
            invoice,
            1.0,
            PaymentMethod::Cash,
            date(1, 2),
            None,
            &clock
        )
        .is_err());
    }

    #[test]
    fn invoice_validation() {
        let (mut ws, tenant, _) = setup();
        let mut draft = NewInvoice {
            tenant_id: Some(tenant),
            buyer_id: None,
            lease_id: None,
            issue_date: date(2, 1),
            due_date: date(1, 1),
            items: vec![InvoiceItem::new("Rent", 1.0, 10.0)],
        };
        assert!(FinanceService::create_invoice(&mut ws, draft.clone()).is_err());
        draft.due_date = date(2, 10);
        draft.items = vec![InvoiceItem::new("Rent", 1.0, 10.0).with_tax(1.5)];
        assert!(FinanceService::create_invoice(&mut ws, draft.clone()).is_err());
        draft.items = vec![];
        assert!(FinanceService::create_invoice(&mut ws, draft).is_err());
    }

    #[test]
    fn aging_buckets_by_days_past_due() {
        assert_eq!(AgingBucket::for_days_past_due(-3), AgingBucket::Current);
        assert_eq!(AgingBucket::for_days_past_due(0), AgingBucket::Current);
        assert_eq!(AgingBucket::for_days_past_due(30), AgingBucket::Days1To30);
        assert_eq!(AgingBucket::for_days_past_due(31), AgingBucket::Days31To60);
        assert_eq!(AgingBucket::for_days_past_due(91), AgingBucket::Over90);

        let (mut ws, tenant, clock) = setup();
        issued_invoice(&mut ws, tenant, &clock);
        let report = FinanceService::receivables_aging(&ws, date(3, 15));
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].days_past_due, 43);
        assert_eq!(report.totals.days_31_60, 1100.0);
        assert_eq!(report.totals.total, 1100.0);
    }

    #[test]
    fn deactivation_requires_zero_balance() {
        let (mut ws, tenant, clock) = setup();
        issued_invoice(&mut ws, tenant, &clock);
        assert!(FinanceService::deactivate_account(&mut ws, "1100").is_err());
        FinanceService::add_account(
            &mut ws,
            LedgerAccount::new("5400", "Utilities", AccountCategory::Expense),
        )
        .unwrap();
        FinanceService::deactivate_account(&mut ws, "5400").unwrap();
        assert!(!ws.account("5400").unwrap().active);
    }

    #[test]
    fn account_statement_runs_balance() {
        let (mut ws, tenant, clock) = setup();
        let invoice = issued_invoice(&mut ws, tenant, &clock);
        FinanceService::record_payment(&mut ws, invoice, 100.0, PaymentMethod::Card, date(1, 3), None, &clock)
            .unwrap();
        let statement = FinanceService::account_statement(&ws, "1100").unwrap();
        assert_eq!(statement.len(), 2);
        assert_eq!(statement[0].balance, 1100.0);
        assert_eq!(statement[1].balance, 1000.0);
    }
}

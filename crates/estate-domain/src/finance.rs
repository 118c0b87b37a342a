//! Chart of accounts, vouchers and their posting rules, invoices, payments, and commissions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Debit,
    Credit,
}

crate::labelled_enum!(Side {
    Debit => "debit",
    Credit => "credit",
});

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// Top-level classification of a ledger account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AccountCategory {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

crate::labelled_enum!(AccountCategory {
    Asset => "asset",
    Liability => "liability",
    Equity => "equity",
    Revenue => "revenue",
    Expense => "expense",
});

impl AccountCategory {
    /// The side on which balances of this category normally accumulate.
    pub fn normal_side(self) -> Side {
        match self {
            AccountCategory::Asset | AccountCategory::Expense => Side::Debit,
            AccountCategory::Liability | AccountCategory::Equity | AccountCategory::Revenue => {
                Side::Credit
            }
        }
    }
}

/// Finer role of an account; cash and bank accounts are the voucher control accounts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountSubtype {
    Cash,
    Bank,
    Receivable,
    Payable,
    #[default]
    General,
}

crate::labelled_enum!(AccountSubtype {
    Cash => "cash",
    Bank => "bank",
    Receivable => "receivable",
    Payable => "payable",
    General => "general",
});

impl AccountSubtype {
    pub fn is_cash_equivalent(self) -> bool {
        matches!(self, AccountSubtype::Cash | AccountSubtype::Bank)
    }
}

/// An entry in the chart of accounts, addressed by its code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerAccount {
    pub code: String,
    pub name: String,
    pub category: AccountCategory,
    #[serde(default)]
    pub subtype: AccountSubtype,
    #[serde(default = "LedgerAccount::default_active")]
    pub active: bool,
}

impl LedgerAccount {
    pub fn new(code: impl Into<String>, name: impl Into<String>, category: AccountCategory) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            category,
            subtype: AccountSubtype::General,
            active: true,
        }
    }

    pub fn with_subtype(mut self, subtype: AccountSubtype) -> Self {
        self.subtype = subtype;
        self
    }

    fn default_active() -> bool {
        true
    }
}

impl NamedEntity for LedgerAccount {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for LedgerAccount {
    fn display_label(&self) -> String {
        format!("{} {} ({})", self.code, self.name, self.category)
    }
}

/// Chart of accounts seeded into every new workspace.
pub fn default_chart() -> Vec<LedgerAccount> {
    use AccountCategory::*;
    use AccountSubtype::*;
    vec![
        LedgerAccount::new("1000", "Cash in Hand", Asset).with_subtype(Cash),
        LedgerAccount::new("1010", "Operating Bank Account", Asset).with_subtype(Bank),
        LedgerAccount::new("1100", "Accounts Receivable", Asset).with_subtype(Receivable),
        LedgerAccount::new("2000", "Accounts Payable", Liability).with_subtype(Payable),
        LedgerAccount::new("2100", "Tax Payable", Liability),
        LedgerAccount::new("2200", "Salaries Payable", Liability).with_subtype(Payable),
        LedgerAccount::new("2300", "Commissions Payable", Liability).with_subtype(Payable),
        LedgerAccount::new("2400", "Tenant Deposits", Liability),
        LedgerAccount::new("3000", "Owner's Equity", Equity),
        LedgerAccount::new("4000", "Rental Income", Revenue),
        LedgerAccount::new("4100", "Sales Revenue", Revenue),
        LedgerAccount::new("4200", "Other Income", Revenue),
        LedgerAccount::new("5000", "Operating Expenses", Expense),
        LedgerAccount::new("5100", "Salaries Expense", Expense),
        LedgerAccount::new("5200", "Commission Expense", Expense),
        LedgerAccount::new("5300", "Maintenance Expense", Expense),
    ]
}

/// Account codes used by postings the system generates on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostingAccounts {
    pub cash: String,
    pub bank: String,
    pub receivable: String,
    pub tax_payable: String,
    pub salaries_payable: String,
    pub commissions_payable: String,
    pub rental_income: String,
    pub sales_revenue: String,
    pub salaries_expense: String,
    pub commission_expense: String,
}

impl Default for PostingAccounts {
    fn default() -> Self {
        Self {
            cash: "1000".into(),
            bank: "1010".into(),
            receivable: "1100".into(),
            tax_payable: "2100".into(),
            salaries_payable: "2200".into(),
            commissions_payable: "2300".into(),
            rental_income: "4000".into(),
            sales_revenue: "4100".into(),
            salaries_expense: "5100".into(),
            commission_expense: "5200".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    BankPayment,
    BankReceipt,
    CashPayment,
    CashReceipt,
    Journal,
}

crate::labelled_enum!(VoucherType {
    BankPayment => "bank_payment",
    BankReceipt => "bank_receipt",
    CashPayment => "cash_payment",
    CashReceipt => "cash_receipt",
    Journal => "journal",
});

impl VoucherType {
    /// Short document code, also used as the voucher number prefix.
    pub fn code(self) -> &'static str {
        match self {
            VoucherType::BankPayment => "BPV",
            VoucherType::BankReceipt => "BRV",
            VoucherType::CashPayment => "CPV",
            VoucherType::CashReceipt => "CRV",
            VoucherType::Journal => "JV",
        }
    }

    /// Accepts either the document code (`bpv`) or the long label (`bank_payment`).
    pub fn from_code(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.code() == upper)
            .or_else(|| raw.parse().ok())
    }

    pub fn posting_rule(self) -> PostingRule {
        const PAYMENT_LEGS: &[AccountCategory] = &[
            AccountCategory::Expense,
            AccountCategory::Liability,
            AccountCategory::Asset,
            AccountCategory::Equity,
        ];
        const RECEIPT_LEGS: &[AccountCategory] = &[
            AccountCategory::Revenue,
            AccountCategory::Asset,
            AccountCategory::Liability,
            AccountCategory::Equity,
        ];
        const ANY_LEG: &[AccountCategory] = &[
            AccountCategory::Asset,
            AccountCategory::Liability,
            AccountCategory::Equity,
            AccountCategory::Revenue,
            AccountCategory::Expense,
        ];
        const NO_CASH: &[AccountSubtype] = &[AccountSubtype::Cash, AccountSubtype::Bank];

        let (control, user_categories) = match self {
            VoucherType::BankPayment => (
                Some(ControlLeg::new(AccountSubtype::Bank, Side::Credit)),
                PAYMENT_LEGS,
            ),
            VoucherType::CashPayment => (
                Some(ControlLeg::new(AccountSubtype::Cash, Side::Credit)),
                PAYMENT_LEGS,
            ),
            VoucherType::BankReceipt => (
                Some(ControlLeg::new(AccountSubtype::Bank, Side::Debit)),
                RECEIPT_LEGS,
            ),
            VoucherType::CashReceipt => (
                Some(ControlLeg::new(AccountSubtype::Cash, Side::Debit)),
                RECEIPT_LEGS,
            ),
            VoucherType::Journal => (None, ANY_LEG),
        };
        PostingRule {
            control,
            allowed_user_categories: user_categories,
            forbidden_user_subtypes: NO_CASH,
        }
    }
}

/// The leg a voucher type forces onto a cash or bank account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLeg {
    pub subtype: AccountSubtype,
    pub side: Side,
}

impl ControlLeg {
    pub const fn new(subtype: AccountSubtype, side: Side) -> Self {
        Self { subtype, side }
    }
}

/// Double-entry constraints for one voucher type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingRule {
    pub control: Option<ControlLeg>,
    pub allowed_user_categories: &'static [AccountCategory],
    pub forbidden_user_subtypes: &'static [AccountSubtype],
}

impl PostingRule {
    /// Side every non-control leg must take, if the type fixes one.
    pub fn user_side(&self) -> Option<Side> {
        self.control.map(|leg| leg.side.opposite())
    }

    pub fn allows_user_account(&self, account: &LedgerAccount) -> bool {
        self.allowed_user_categories.contains(&account.category)
            && !self.forbidden_user_subtypes.contains(&account.subtype)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoucherLine {
    pub account_code: String,
    #[serde(default)]
    pub debit: f64,
    #[serde(default)]
    pub credit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl VoucherLine {
    pub fn debit(account_code: impl Into<String>, amount: f64) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: 0.0,
            memo: None,
        }
    }

    pub fn credit(account_code: impl Into<String>, amount: f64) -> Self {
        Self {
            account_code: account_code.into(),
            debit: 0.0,
            credit: amount,
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// The side carrying an amount, or `None` when both or neither do.
    pub fn side(&self) -> Option<Side> {
        match (self.debit > 0.0, self.credit > 0.0) {
            (true, false) => Some(Side::Debit),
            (false, true) => Some(Side::Credit),
            _ => None,
        }
    }

    pub fn amount(&self) -> f64 {
        self.debit.max(self.credit)
    }

    /// The same amount on the opposite side.
    pub fn mirrored(&self) -> Self {
        Self {
            account_code: self.account_code.clone(),
            debit: self.credit,
            credit: self.debit,
            memo: self.memo.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    Draft,
    Posted,
    Reversed,
}

crate::labelled_enum!(VoucherStatus {
    Draft => "draft",
    Posted => "posted",
    Reversed => "reversed",
});

/// Business document that caused a system-generated voucher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum VoucherSource {
    Manual,
    Invoice(Uuid),
    Payment(Uuid),
    Commission(Uuid),
    Payroll(Uuid),
    Reversal(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Voucher {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<Tid>,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    pub description: String,
    pub lines: Vec<VoucherLine>,
    pub status: VoucherStatus,
    #[serde(default = "Voucher::manual_source")]
    pub source: VoucherSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
}

impl Voucher {
    pub fn new(
        voucher_type: VoucherType,
        date: NaiveDate,
        description: impl Into<String>,
        lines: Vec<VoucherLine>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: None,
            voucher_type,
            date,
            description: description.into(),
            lines,
            status: VoucherStatus::Draft,
            source: VoucherSource::Manual,
            posted_at: None,
        }
    }

    pub fn with_source(mut self, source: VoucherSource) -> Self {
        self.source = source;
        self
    }

    pub fn total_debit(&self) -> f64 {
        round_cents(self.lines.iter().map(|line| line.debit).sum())
    }

    pub fn total_credit(&self) -> f64 {
        round_cents(self.lines.iter().map(|line| line.credit).sum())
    }

    pub fn is_balanced(&self) -> bool {
        amounts_match(self.total_debit(), self.total_credit())
    }

    /// Posted and reversed vouchers both contribute to account balances.
    pub fn affects_balances(&self) -> bool {
        matches!(self.status, VoucherStatus::Posted | VoucherStatus::Reversed)
    }

    pub fn reference(&self) -> String {
        self.number
            .as_ref()
            .map(|tid| tid.to_string())
            .unwrap_or_else(|| format!("draft {}", self.id))
    }

    fn manual_source() -> VoucherSource {
        VoucherSource::Manual
    }
}

impl Identifiable for Voucher {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub tax_rate: f64,
}

impl InvoiceItem {
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            tax_rate: 0.0,
        }
    }

    pub fn with_tax(mut self, tax_rate: f64) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn net(&self) -> f64 {
        self.quantity * self.unit_price
    }

    pub fn tax(&self) -> f64 {
        self.net() * self.tax_rate
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    PartiallyPaid,
    Paid,
    Void,
}

crate::labelled_enum!(InvoiceStatus {
    Draft => "draft",
    Issued => "issued",
    PartiallyPaid => "partially_paid",
    Paid => "paid",
    Void => "void",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: Uuid,
    pub number: Tid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<Uuid>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voucher_id: Option<Uuid>,
}

impl Invoice {
    pub fn new(
        number: Tid,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        items: Vec<InvoiceItem>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            tenant_id: None,
            buyer_id: None,
            lease_id: None,
            issue_date,
            due_date,
            items,
            status: InvoiceStatus::Draft,
            amount_paid: 0.0,
            voucher_id: None,
        }
    }

    pub fn for_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn subtotal(&self) -> f64 {
        round_cents(self.items.iter().map(InvoiceItem::net).sum())
    }

    pub fn tax_amount(&self) -> f64 {
        round_cents(self.items.iter().map(InvoiceItem::tax).sum())
    }

    pub fn total_amount(&self) -> f64 {
        round_cents(self.subtotal() + self.tax_amount())
    }

    pub fn outstanding(&self) -> f64 {
        match self.status {
            InvoiceStatus::Draft | InvoiceStatus::Void => 0.0,
            _ => round_cents((self.total_amount() - self.amount_paid).max(0.0)),
        }
    }

    pub fn accepts_payments(&self) -> bool {
        matches!(
            self.status,
            InvoiceStatus::Issued | InvoiceStatus::PartiallyPaid
        )
    }
}

impl Identifiable for Invoice {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    Cheque,
}

crate::labelled_enum!(PaymentMethod {
    Cash => "cash",
    BankTransfer => "bank_transfer",
    Card => "card",
    Cheque => "cheque",
});

impl PaymentMethod {
    /// Receipt voucher type a payment by this method is posted with.
    pub fn receipt_voucher(self) -> VoucherType {
        match self {
            PaymentMethod::Cash => VoucherType::CashReceipt,
            _ => VoucherType::BankReceipt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub date: NaiveDate,
    pub amount: f64,
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voucher_id: Option<Uuid>,
}

impl Payment {
    pub fn new(invoice_id: Uuid, date: NaiveDate, amount: f64, method: PaymentMethod) -> Self {
        Self {
            id: Uuid::new_v4(),
            invoice_id,
            date,
            amount,
            method,
            reference: None,
            voucher_id: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

impl Identifiable for Payment {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Accrued,
    Paid,
}

crate::labelled_enum!(CommissionStatus {
    Accrued => "accrued",
    Paid => "paid",
});

/// Agent fee earned on a deal or sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commission {
    pub id: Uuid,
    pub agent_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<Uuid>,
    pub base_amount: f64,
    pub rate: f64,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub status: CommissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voucher_id: Option<Uuid>,
}

impl Identifiable for Commission {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(category: AccountCategory, subtype: AccountSubtype) -> LedgerAccount {
        LedgerAccount::new("9999", "Probe", category).with_subtype(subtype)
    }

    #[test]
    fn payment_vouchers_credit_their_control_account() {
        let bpv = VoucherType::BankPayment.posting_rule();
        let control = bpv.control.expect("bank payment has a control leg");
        assert_eq!(control.subtype, AccountSubtype::Bank);
        assert_eq!(control.side, Side::Credit);
        assert_eq!(bpv.user_side(), Some(Side::Debit));

        let crv = VoucherType::CashReceipt.posting_rule();
        let control = crv.control.expect("cash receipt has a control leg");
        assert_eq!(control.subtype, AccountSubtype::Cash);
        assert_eq!(control.side, Side::Debit);
        assert_eq!(crv.user_side(), Some(Side::Credit));
    }

    #[test]
    fn receipt_legs_reject_expenses_and_payment_legs_reject_revenue() {
        let receipt = VoucherType::BankReceipt.posting_rule();
        assert!(receipt.allows_user_account(&account(AccountCategory::Revenue, AccountSubtype::General)));
        assert!(!receipt.allows_user_account(&account(AccountCategory::Expense, AccountSubtype::General)));

        let payment = VoucherType::CashPayment.posting_rule();
        assert!(payment.allows_user_account(&account(AccountCategory::Expense, AccountSubtype::General)));
        assert!(!payment.allows_user_account(&account(AccountCategory::Revenue, AccountSubtype::General)));
    }

    #[test]
    fn journal_has_no_control_and_excludes_cash_accounts() {
        let journal = VoucherType::Journal.posting_rule();
        assert!(journal.control.is_none());
        assert!(journal.user_side().is_none());
        assert!(!journal.allows_user_account(&account(AccountCategory::Asset, AccountSubtype::Bank)));
        assert!(journal.allows_user_account(&account(AccountCategory::Asset, AccountSubtype::Receivable)));
    }

    #[test]
    fn voucher_type_accepts_codes_and_labels() {
        assert_eq!(VoucherType::from_code("bpv"), Some(VoucherType::BankPayment));
        assert_eq!(VoucherType::from_code("JV"), Some(VoucherType::Journal));
        assert_eq!(VoucherType::from_code("cash-receipt"), Some(VoucherType::CashReceipt));
        assert_eq!(VoucherType::from_code("XYZ"), None);
    }

    #[test]
    fn invoice_totals_include_tax() {
        let issue = NaiveDate::from_ymd_opt(2025, 11, 19).unwrap();
        let due = NaiveDate::from_ymd_opt(2025, 12, 19).unwrap();
        let mut invoice = Invoice::new(
            Tid::format("INV", 1),
            issue,
            due,
            vec![InvoiceItem::new("Property rental", 1.0, 1000.0).with_tax(0.10)],
        );
        assert_eq!(invoice.subtotal(), 1000.0);
        assert_eq!(invoice.tax_amount(), 100.0);
        assert_eq!(invoice.total_amount(), 1100.0);
        assert_eq!(invoice.outstanding(), 0.0, "drafts carry no receivable");
        invoice.status = InvoiceStatus::Issued;
        invoice.amount_paid = 600.0;
        assert_eq!(invoice.outstanding(), 500.0);
    }

    #[test]
    fn line_side_requires_exactly_one_amount() {
        assert_eq!(VoucherLine::debit("1000", 5.0).side(), Some(Side::Debit));
        assert_eq!(VoucherLine::credit("1000", 5.0).side(), Some(Side::Credit));
        let both = VoucherLine {
            account_code: "1000".into(),
            debit: 1.0,
            credit: 1.0,
            memo: None,
        };
        assert_eq!(both.side(), None);
        assert_eq!(VoucherLine::debit("1000", 0.0).side(), None);
    }
}

use chrono::NaiveDate;

use crate::{
    access_service::AccessService,
    auth_service::{AuthPolicy, AuthService},
    crm_service::CrmService,
    filter::FilterState,
    finance_service::FinanceService,
    hr_service::{HrService, NewEmployee},
    lease_service::{LeaseService, NewLease},
    party_service::PartyService,
    property_service::PropertyService,
    report_service::ReportService,
    storage::workspace_warnings,
    time::FixedClock,
    voucher_service::VoucherService,
    CoreError, VoucherError,
};
use estate_domain::{
    DealStage, InvoiceStatus, LeadStage, PaymentMethod, PropertyKind, TimeInterval, Unit,
    UnitKind, UnitStatus, VoucherLine, VoucherStatus, VoucherType, Workspace, ADMIN_ROLE,
};

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

fn leased_workspace() -> (Workspace, uuid::Uuid) {
    let mut ws = Workspace::new("Harbour Estates");
    let property = PropertyService::add_property(
        &mut ws,
        "Harbour View",
        "HV",
        "1 Quay Street",
        PropertyKind::Residential,
    )
    .expect("add property");
    let unit = PropertyService::add_unit(
        &mut ws,
        Unit::new(property, "A-01", UnitKind::Residential).with_rent(1500.0),
    )
    .expect("add unit");
    let tenant =
        PartyService::add_tenant(&mut ws, "Ines Duarte", "ines@example.com", None).expect("add tenant");
    let lease = LeaseService::create(
        &mut ws,
        NewLease {
            unit_id: unit,
            tenant_id: tenant,
            start_date: date(1, 1),
            end_date: date(12, 31),
            rent: 1500.0,
            deposit: 3000.0,
            billing: TimeInterval::monthly(),
            activate: true,
        },
    )
    .expect("create lease");
    (ws, lease)
}

#[test]
fn rent_cycle_keeps_the_ledger_balanced() {
    let (mut ws, lease) = leased_workspace();
    let clock = FixedClock::on(date(3, 15));

    let invoices = LeaseService::bill_due_rent(&mut ws, lease, date(3, 15), &clock).expect("bill rent");
    assert_eq!(invoices.len(), 3);
    FinanceService::record_payment(&mut ws, invoices[0], 1500.0, PaymentMethod::BankTransfer, date(1, 3), None, &clock)
        .expect("full payment");
    FinanceService::record_payment(&mut ws, invoices[1], 500.0, PaymentMethod::Cash, date(2, 5), None, &clock)
        .expect("partial payment");

    assert_eq!(ws.invoice(invoices[0]).unwrap().status, InvoiceStatus::Paid);
    assert_eq!(ws.invoice(invoices[1]).unwrap().status, InvoiceStatus::PartiallyPaid);
    assert_eq!(FinanceService::balance_of(&ws, "1100"), 2500.0);
    assert_eq!(FinanceService::balance_of(&ws, "1010"), 1500.0);
    assert_eq!(FinanceService::balance_of(&ws, "1000"), 500.0);
    assert_eq!(FinanceService::balance_of(&ws, "4000"), 4500.0);

    let trial = ReportService::trial_balance(&ws);
    assert!(trial.is_balanced());
    let aging = ReportService::aging(&ws, date(3, 15));
    assert_eq!(aging.totals.total, 2500.0);
    assert!(workspace_warnings(&ws).is_empty());

    let references: Vec<String> = ws.vouchers.iter().map(|v| v.reference()).collect();
    assert_eq!(references, ["JV-0001", "JV-0002", "JV-0003", "BRV-0001", "CRV-0001"]);
}

#[test]
fn manual_vouchers_follow_posting_rules_and_reverse_cleanly() {
    let (mut ws, _) = leased_workspace();
    let clock = FixedClock::on(date(2, 1));

    let err = VoucherService::create_and_post(
        &mut ws,
        VoucherType::BankPayment,
        date(2, 1),
        "Plumbing",
        vec![VoucherLine::debit("5300", 250.0), VoucherLine::credit("1000", 250.0)],
        &clock,
    )
    .expect_err("cash account on a bank payment");
    assert!(matches!(err, CoreError::Voucher(VoucherError::MissingControlLeg { .. })));

    let id = VoucherService::create_and_post(
        &mut ws,
        VoucherType::BankPayment,
        date(2, 1),
        "Plumbing",
        vec![VoucherLine::debit("5300", 250.0), VoucherLine::credit("1010", 250.0)],
        &clock,
    )
    .expect("valid bank payment");
    assert_eq!(FinanceService::balance_of(&ws, "5300"), 250.0);

    VoucherService::reverse(&mut ws, id, date(2, 2), &clock).expect("reverse");
    assert_eq!(ws.voucher(id).unwrap().status, VoucherStatus::Reversed);
    assert_eq!(FinanceService::balance_of(&ws, "5300"), 0.0);
    assert_eq!(FinanceService::balance_of(&ws, "1010"), 0.0);
    assert!(VoucherService::reverse(&mut ws, id, date(2, 2), &clock).is_err());
}

#[test]
fn won_deal_pays_its_agent() {
    let (mut ws, _) = leased_workspace();
    let clock = FixedClock::on(date(4, 1));
    let agent = HrService::add_employee(
        &mut ws,
        NewEmployee {
            first_name: "Rui".into(),
            last_name: "Costa".into(),
            email: "rui@example.com".into(),
            position: "Agent".into(),
            department: "Sales".into(),
            start_date: date(1, 1),
            salary: 30_000.0,
        },
    )
    .expect("hire agent");

    let lead = CrmService::add_lead(&mut ws, "Marta", Some("marta@example.com"), None, None, clock.0).expect("lead");
    CrmService::set_lead_stage(&mut ws, lead, LeadStage::Contacted).expect("contact");
    CrmService::set_lead_stage(&mut ws, lead, LeadStage::Qualified).expect("qualify");
    let client = CrmService::convert_lead(&mut ws, lead).expect("convert");
    let deal = CrmService::add_deal(&mut ws, client, "Penthouse", 400_000.0, None).expect("deal");
    CrmService::set_deal_stage(&mut ws, deal, DealStage::Negotiation, date(4, 1)).expect("negotiate");
    CrmService::set_deal_stage(&mut ws, deal, DealStage::ClosedWon, date(4, 2)).expect("win");

    let commission = FinanceService::accrue_commission(
        &mut ws,
        agent,
        Some(deal),
        400_000.0,
        0.02,
        None,
        date(4, 2),
        None,
        &clock,
    )
    .expect("accrue");
    assert_eq!(FinanceService::balance_of(&ws, "2300"), 8000.0);
    FinanceService::pay_commission(&mut ws, commission, date(4, 30), &clock).expect("pay");
    assert_eq!(FinanceService::balance_of(&ws, "2300"), 0.0);
    assert_eq!(FinanceService::balance_of(&ws, "1010"), -8000.0);

    HrService::generate_payroll(&mut ws, date(4, 1), date(4, 30)).expect("generate");
    let entry = ws.payroll[0].id;
    HrService::post_payroll(&mut ws, entry, date(4, 30), &clock).expect("post payroll");
    let summary = ReportService::payroll_summary(&ws, date(4, 1), date(4, 30)).expect("summary");
    assert_eq!(summary.total_net, 2500.0);
    assert_eq!(summary.total_posted, 2500.0);
    assert!(ReportService::trial_balance(&ws).is_balanced());
}

#[test]
fn sold_units_leave_the_occupancy_base() {
    let (mut ws, _) = leased_workspace();
    let property = ws.properties[0].id;
    let spare = PropertyService::add_unit(&mut ws, Unit::new(property, "A-02", UnitKind::Residential)).expect("unit");
    let buyer = PartyService::add_buyer(&mut ws, "Nuno", "nuno@example.com", None).expect("buyer");
    let sale = LeaseService::create_sale(&mut ws, spare, buyer, date(5, 1), 250_000.0).expect("sale");
    assert_eq!(ws.unit(spare).unwrap().status, UnitStatus::Reserved);
    LeaseService::set_sale_status(&mut ws, sale, estate_domain::SaleStatus::Completed).expect("complete");

    let summary = PropertyService::occupancy(&ws);
    assert_eq!(summary.total_units, 2);
    assert_eq!(summary.occupancy_rate, 1.0);
}

#[test]
fn invited_user_logs_in_and_filters_invoices() {
    let (mut ws, lease) = leased_workspace();
    let clock = FixedClock::on(date(6, 1));
    let policy = AuthPolicy::default();
    let admin_role = ws.role_by_name(ADMIN_ROLE).unwrap().id;
    let accountant = ws.role_by_name("Accountant").unwrap().id;
    AccessService::register_user(&mut ws, "Owner", "owner@example.com", "owner-pass", admin_role, &clock)
        .expect("register owner");

    let owner = AuthService::login(&mut ws, "owner@example.com", "owner-pass", "desk", &policy, &clock)
        .expect("owner login");
    let session = AuthService::authenticate(&ws, &owner.token, &policy, &clock).expect("session");
    let link = AccessService::generate_invite(
        &mut ws,
        &session,
        accountant,
        None,
        "https://erp.example.com",
        chrono::Duration::hours(72),
        &clock,
    )
    .expect("invite");
    AccessService::accept_invite(&mut ws, &link.url, "Books", "books@example.com", "books-pass", &clock)
        .expect("accept");
    let books = AuthService::login(&mut ws, "books@example.com", "books-pass", "laptop", &policy, &clock)
        .expect("accountant login");
    let books = AuthService::authenticate(&ws, &books.token, &policy, &clock).expect("accountant session");
    assert!(AccessService::authorize(&ws, &books, estate_domain::Permission::PostVouchers).is_ok());
    assert!(AccessService::authorize(&ws, &books, estate_domain::Permission::ManageHr).is_err());

    LeaseService::bill_due_rent(&mut ws, lease, date(6, 1), &clock).expect("bill");
    let filter = FilterState::from_query([("status", "issued"), ("from", "2025-03-01"), ("limit", "2")])
        .expect("filter");
    let page = filter.apply(&ws.invoices);
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 2);
}

#[test]
fn workspace_survives_a_json_round_trip() {
    let (mut ws, lease) = leased_workspace();
    LeaseService::bill_due_rent(&mut ws, lease, date(1, 1), &FixedClock::on(date(1, 1))).expect("bill");
    let json = serde_json::to_string(&ws).expect("serialize");
    let restored: Workspace = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(restored.vouchers, ws.vouchers);
    assert_eq!(restored.sequences, ws.sequences);
    assert_eq!(restored.accounts.len(), ws.accounts.len());
}

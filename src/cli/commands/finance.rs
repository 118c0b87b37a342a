use chrono::Duration;
use estate_core::{FinanceService, NewInvoice, ServiceResult, VoucherService};
use estate_domain::{
    AccountCategory, AccountSubtype, InvoiceItem, LedgerAccount, PaymentMethod, Permission,
    VoucherLine, VoucherStatus, VoucherType, Workspace,
};
use uuid::Uuid;

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::{parse_amount, parse_label, Args};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::lookup;
use crate::cli::output;
use crate::cli::table::{page_footer, Table, TableColumn};

const PAYMENT_TERMS_DAYS: i64 = 30;

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "account",
            "Maintain the chart of accounts and inspect balances",
            "account list
account add <code> <asset|liability|equity|revenue|expense> <name> [--subtype cash|bank|receivable|payable|general]
account deactivate <code>
account balance <code>
account statement <code>",
            cmd_account,
        ),
        CommandDefinition::new(
            "voucher",
            "Draft, post, and reverse accounting vouchers",
            "voucher draft <type> <dr|cr:account:amount[:memo]>... --desc <text> [--date <date>]
voucher create <type> <dr|cr:account:amount[:memo]>... --desc <text> [--date <date>]
voucher post <voucher>
voucher reverse <voucher> [--date <date>]
voucher remove <voucher>
voucher show <voucher>
voucher list [--status draft|posted|reversed] [--search <text>] [--from <date>] [--to <date>] [--page <n>]
types: BPV bank_payment, BRV bank_receipt, CPV cash_payment, CRV cash_receipt, JV journal",
            cmd_voucher,
        ),
        CommandDefinition::new(
            "invoice",
            "Bill tenants and buyers",
            "invoice create <tenant|buyer-email> <description:qty:price[:tax]>... [--lease <lease>] [--issued <date>] [--due <date>]
invoice issue <invoice>
invoice void <invoice>
invoice show <invoice>
invoice list [--status <status>] [--search <text>] [--from <date>] [--to <date>] [--page <n>]",
            cmd_invoice,
        ),
        CommandDefinition::new(
            "payment",
            "Record payments against invoices",
            "payment record <invoice> <amount> [--method cash|bank_transfer|card|cheque] [--date <date>] [--reference <text>]
payment list",
            cmd_payment,
        ),
        CommandDefinition::new(
            "commission",
            "Accrue and pay agent commissions",
            "commission accrue <agent> <base> <rate|percent%> [--amount <fixed>] [--deal <deal>] [--date <date>] [--desc <text>]
commission pay <commission> [--date <date>]
commission list",
            cmd_commission,
        ),
    ]
}

fn cmd_account(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("list") | None => context.read(Permission::ViewFinance, |ws, _| {
            let balances = FinanceService::account_balances(ws);
            let mut table = Table::new(vec![
                TableColumn::left("Code"),
                TableColumn::left("Name"),
                TableColumn::left("Category"),
                TableColumn::left("Subtype"),
                TableColumn::right("Balance"),
                TableColumn::left("Active"),
            ]);
            for (account, balance) in ws.accounts.iter().zip(&balances) {
                table.push(vec![
                    account.code.clone(),
                    account.name.clone(),
                    account.category.to_string(),
                    account.subtype.to_string(),
                    output::money(balance.balance, &currency),
                    if account.active { "yes".into() } else { "no".into() },
                ]);
            }
            table.print_or("The chart of accounts is empty.");
            Ok(())
        }),
        Some("add") => {
            let code = args.required(0, "code")?;
            let category: AccountCategory = parse_label(args.required(1, "category")?)?;
            let name = args
                .rest(2)
                .ok_or_else(|| CommandError::usage("usage: account add <code> <category> <name>"))?;
            let subtype = args.flag_parsed::<AccountSubtype>("subtype")?;
            context.mutate(Permission::ManageFinance, |ws, _, _| {
                let mut account = LedgerAccount::new(code, &name, category);
                if let Some(subtype) = subtype {
                    account = account.with_subtype(subtype);
                }
                FinanceService::add_account(ws, account)
            })?;
            output::success(format!("Account {} {} added.", code, name));
            Ok(())
        }
        Some("deactivate") => {
            let code = args.required(0, "code")?;
            context.mutate(Permission::ManageFinance, |ws, _, _| {
                FinanceService::deactivate_account(ws, code)
            })?;
            output::success(format!("Account {} deactivated.", code));
            Ok(())
        }
        Some("balance") => {
            let code = args.required(0, "code")?;
            let balance = context.read(Permission::ViewFinance, |ws, _| {
                let account = ws
                    .account(code)
                    .ok_or_else(|| CommandError::usage(format!("no account with code {}", code)))?;
                Ok((account.name.clone(), FinanceService::balance_of(ws, code)))
            })?;
            output::info(format!("{} {}: {}", code, balance.0, output::money(balance.1, &currency)));
            Ok(())
        }
        Some("statement") => {
            let code = args.required(0, "code")?;
            let lines = context.read(Permission::ViewFinance, |ws, _| {
                Ok(FinanceService::account_statement(ws, code)?)
            })?;
            output::section(format!("Statement of {}", code));
            let mut table = Table::new(vec![
                TableColumn::left("Date"),
                TableColumn::left("Voucher"),
                TableColumn::left("Description"),
                TableColumn::right("Debit"),
                TableColumn::right("Credit"),
                TableColumn::right("Balance"),
            ]);
            for line in &lines {
                table.push(vec![
                    line.date.to_string(),
                    line.voucher.clone(),
                    line.description.clone(),
                    amount_cell(line.debit, &currency),
                    amount_cell(line.credit, &currency),
                    output::money(line.balance, &currency),
                ]);
            }
            table.print_or("No postings on this account.");
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown account subcommand `{}`", other))),
    }
}

fn amount_cell(amount: f64, currency: &str) -> String {
    if amount == 0.0 {
        String::new()
    } else {
        output::money(amount, currency)
    }
}

/// Accepts the short code (`BPV`) or the label (`bank_payment`).
fn parse_voucher_type(raw: &str) -> Result<VoucherType, CommandError> {
    VoucherType::from_code(raw).map_or_else(|| parse_label(raw), Ok)
}

/// `dr:1000:250.00[:memo]` or `cr:4000:250.00[:memo]`.
fn parse_voucher_line(raw: &str) -> Result<VoucherLine, CommandError> {
    let mut parts = raw.splitn(4, ':');
    let (side, code, amount) = match (parts.next(), parts.next(), parts.next()) {
        (Some(side), Some(code), Some(amount)) => (side, code, amount),
        _ => {
            return Err(CommandError::usage(format!(
                "voucher line `{}` must look like dr:<account>:<amount>",
                raw
            )))
        }
    };
    let amount = parse_amount("line amount", amount)?;
    let line = match side.to_ascii_lowercase().as_str() {
        "dr" | "debit" => VoucherLine::debit(code, amount),
        "cr" | "credit" => VoucherLine::credit(code, amount),
        other => {
            return Err(CommandError::usage(format!(
                "voucher line side must be dr or cr, not `{}`",
                other
            )))
        }
    };
    Ok(match parts.next() {
        Some(memo) if !memo.trim().is_empty() => line.with_memo(memo.trim()),
        _ => line,
    })
}

fn cmd_voucher(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some(action @ ("draft" | "create")) => {
            let voucher_type = parse_voucher_type(args.required(0, "type")?)?;
            let lines = (1..args.len())
                .filter_map(|index| args.get(index))
                .map(parse_voucher_line)
                .collect::<Result<Vec<_>, _>>()?;
            let description = args
                .flag("desc")
                .ok_or_else(|| CommandError::usage("a voucher needs --desc <text>"))?;
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let post = action == "create";
            let reference = context.mutate(Permission::PostVouchers, |ws, _, clock| {
                let id = if post {
                    VoucherService::create_and_post(ws, voucher_type, date, description, lines, clock)?
                } else {
                    VoucherService::create_draft(ws, voucher_type, date, description, lines)?
                };
                Ok(voucher_reference(ws, id))
            })?;
            if post {
                output::success(format!("Voucher {} posted.", reference));
            } else {
                output::success(format!("Draft {} saved; post it with `voucher post`.", reference));
            }
            Ok(())
        }
        Some("post") => {
            let key = args.required(0, "voucher")?;
            let number = context.mutate(Permission::PostVouchers, |ws, _, clock| {
                let id = lookup::voucher(ws, key)?;
                VoucherService::post(ws, id, clock)
            })?;
            output::success(format!("Voucher posted as {}.", number));
            Ok(())
        }
        Some("reverse") => {
            let key = args.required(0, "voucher")?;
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let reversal = context.mutate(Permission::PostVouchers, |ws, _, clock| {
                let id = lookup::voucher(ws, key)?;
                let reversal = VoucherService::reverse(ws, id, date, clock)?;
                Ok(voucher_reference(ws, reversal))
            })?;
            output::success(format!("Voucher {} reversed by {}.", key, reversal));
            Ok(())
        }
        Some("remove") => {
            let key = args.required(0, "voucher")?;
            context.mutate(Permission::PostVouchers, |ws, _, _| {
                let id = lookup::voucher(ws, key)?;
                VoucherService::remove(ws, id)
            })?;
            output::success(format!("Draft voucher {} removed.", key));
            Ok(())
        }
        Some("show") => {
            let key = args.required(0, "voucher")?;
            context.read(Permission::ViewFinance, |ws, _| {
                let id = lookup::voucher(ws, key)?;
                let voucher = ws
                    .voucher(id)
                    .ok_or_else(|| CommandError::usage(format!("voucher {} vanished", key)))?;
                output::section(format!("Voucher {} ({})", voucher.reference(), voucher.voucher_type));
                output::info(format!("  Date        : {}", voucher.date));
                output::info(format!("  Status      : {}", voucher.status));
                output::info(format!("  Description : {}", voucher.description));
                let mut table = Table::new(vec![
                    TableColumn::left("Account"),
                    TableColumn::left("Name"),
                    TableColumn::right("Debit"),
                    TableColumn::right("Credit"),
                    TableColumn::left("Memo"),
                ]);
                for line in &voucher.lines {
                    table.push(vec![
                        line.account_code.clone(),
                        ws.account(&line.account_code)
                            .map(|account| account.name.clone())
                            .unwrap_or_default(),
                        amount_cell(line.debit, &currency),
                        amount_cell(line.credit, &currency),
                        line.memo.clone().unwrap_or_default(),
                    ]);
                }
                table.push(vec![
                    String::new(),
                    "Total".into(),
                    output::money(voucher.total_debit(), &currency),
                    output::money(voucher.total_credit(), &currency),
                    String::new(),
                ]);
                table.print();
                Ok(())
            })
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            context.read(Permission::ViewFinance, |ws, _| {
                let page = filter.apply(&ws.vouchers);
                let mut table = Table::new(vec![
                    TableColumn::left("Voucher"),
                    TableColumn::left("Type"),
                    TableColumn::left("Date"),
                    TableColumn::left("Description"),
                    TableColumn::right("Amount"),
                    TableColumn::left("Status"),
                ]);
                for voucher in &page.items {
                    table.push(vec![
                        voucher.reference(),
                        voucher.voucher_type.code().to_string(),
                        voucher.date.to_string(),
                        voucher.description.clone(),
                        output::money(voucher.total_debit(), &currency),
                        voucher.status.to_string(),
                    ]);
                }
                table.print_or("No vouchers match.");
                page_footer(&page);
                let drafts = VoucherService::list(ws, Some(VoucherStatus::Draft)).len();
                if drafts > 0 {
                    output::hint(format!("{} draft voucher(s) awaiting posting.", drafts));
                }
                Ok(())
            })
        }
        Some(other) => Err(CommandError::usage(format!("unknown voucher subcommand `{}`", other))),
    }
}

fn voucher_reference(ws: &Workspace, id: Uuid) -> String {
    ws.voucher(id)
        .map(|voucher| voucher.reference())
        .unwrap_or_else(|| lookup::short(id))
}

/// `description:qty:price[:tax]`, where tax is a fraction (`0.05`) or percentage (`5%`).
fn parse_invoice_item(raw: &str) -> Result<InvoiceItem, CommandError> {
    let mut parts: Vec<&str> = raw.split(':').collect();
    if parts.len() < 3 {
        return Err(CommandError::usage(format!(
            "invoice item `{}` must look like rent:1:1200",
            raw
        )));
    }
    let tax = if parts.len() > 3 { parts.pop().map(parse_rate).transpose()? } else { None };
    let price = parse_amount("price", parts.pop().unwrap_or_default())?;
    let quantity = parse_amount("quantity", parts.pop().unwrap_or_default())?;
    let item = InvoiceItem::new(parts.join(":"), quantity, price);
    Ok(match tax {
        Some(tax) => item.with_tax(tax),
        None => item,
    })
}

fn parse_rate(raw: &str) -> Result<f64, CommandError> {
    match raw.trim().strip_suffix('%') {
        Some(percent) => Ok(parse_amount("rate", percent)? / 100.0),
        None => parse_amount("rate", raw),
    }
}

enum Party {
    Tenant(Uuid),
    Buyer(Uuid),
}

fn party(ws: &Workspace, key: &str) -> ServiceResult<Party> {
    match lookup::tenant(ws, key) {
        Ok(id) => Ok(Party::Tenant(id)),
        Err(tenant_err) => lookup::buyer(ws, key).map(Party::Buyer).map_err(|_| tenant_err),
    }
}

fn cmd_invoice(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("create") => {
            let key = args.required(0, "tenant|buyer")?;
            let items = (1..args.len())
                .filter_map(|index| args.get(index))
                .map(parse_invoice_item)
                .collect::<Result<Vec<_>, _>>()?;
            let issue_date = match args.flag_date("issued")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let due_date = match args.flag_date("due")? {
                Some(date) => date,
                None => issue_date + Duration::days(PAYMENT_TERMS_DAYS),
            };
            let lease = args.flag("lease");
            let number = context.mutate(Permission::ManageFinance, |ws, _, _| {
                let (tenant_id, buyer_id) = match party(ws, key)? {
                    Party::Tenant(id) => (Some(id), None),
                    Party::Buyer(id) => (None, Some(id)),
                };
                let lease_id = lease.map(|lease| lookup::lease(ws, lease)).transpose()?;
                let id = FinanceService::create_invoice(
                    ws,
                    NewInvoice {
                        tenant_id,
                        buyer_id,
                        lease_id,
                        issue_date,
                        due_date,
                        items,
                    },
                )?;
                Ok(ws.invoice(id).map(|invoice| invoice.number.to_string()))
            })?;
            output::success(format!(
                "Draft invoice {} created; issue it with `invoice issue`.",
                number.unwrap_or_default()
            ));
            Ok(())
        }
        Some("issue") => {
            let key = args.required(0, "invoice")?;
            let voucher = context.mutate(Permission::ManageFinance, |ws, _, clock| {
                let id = lookup::invoice(ws, key)?;
                let voucher = FinanceService::issue_invoice(ws, id, clock)?;
                Ok(voucher_reference(ws, voucher))
            })?;
            output::success(format!("Invoice {} issued and booked as {}.", key, voucher));
            Ok(())
        }
        Some("void") => {
            let key = args.required(0, "invoice")?;
            if !context.confirm(&format!("Void invoice {}?", key))? {
                output::info("Nothing changed.");
                return Ok(());
            }
            context.mutate(Permission::ManageFinance, |ws, _, clock| {
                let id = lookup::invoice(ws, key)?;
                FinanceService::void_invoice(ws, id, clock)
            })?;
            output::success(format!("Invoice {} voided.", key));
            Ok(())
        }
        Some("show") => {
            let key = args.required(0, "invoice")?;
            context.read(Permission::ViewFinance, |ws, _| {
                let invoice = FinanceService::find_invoice(ws, key)?;
                output::section(format!("Invoice {}", invoice.number));
                output::info(format!("  Billed to   : {}", billed_to(ws, invoice.tenant_id, invoice.buyer_id)));
                output::info(format!("  Issued      : {}", invoice.issue_date));
                output::info(format!("  Due         : {}", invoice.due_date));
                output::info(format!("  Status      : {}", invoice.status));
                let mut table = Table::new(vec![
                    TableColumn::left("Item"),
                    TableColumn::right("Qty"),
                    TableColumn::right("Price"),
                    TableColumn::right("Tax"),
                    TableColumn::right("Net"),
                ]);
                for item in &invoice.items {
                    table.push(vec![
                        item.description.clone(),
                        format!("{}", item.quantity),
                        output::money(item.unit_price, &currency),
                        output::money(item.tax(), &currency),
                        output::money(item.net(), &currency),
                    ]);
                }
                table.print();
                output::info(format!("  Subtotal    : {}", output::money(invoice.subtotal(), &currency)));
                output::info(format!("  Tax         : {}", output::money(invoice.tax_amount(), &currency)));
                output::info(format!("  Total       : {}", output::money(invoice.total_amount(), &currency)));
                output::info(format!("  Paid        : {}", output::money(invoice.amount_paid, &currency)));
                output::info(format!("  Outstanding : {}", output::money(invoice.outstanding(), &currency)));
                Ok(())
            })
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            context.read(Permission::ViewFinance, |ws, _| {
                let page = filter.apply(&ws.invoices);
                let mut table = Table::new(vec![
                    TableColumn::left("Invoice"),
                    TableColumn::left("Billed to"),
                    TableColumn::left("Due"),
                    TableColumn::right("Total"),
                    TableColumn::right("Outstanding"),
                    TableColumn::left("Status"),
                ]);
                for invoice in &page.items {
                    table.push(vec![
                        invoice.number.to_string(),
                        billed_to(ws, invoice.tenant_id, invoice.buyer_id),
                        invoice.due_date.to_string(),
                        output::money(invoice.total_amount(), &currency),
                        output::money(invoice.outstanding(), &currency),
                        invoice.status.to_string(),
                    ]);
                }
                table.print_or("No invoices match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some(other) => Err(CommandError::usage(format!("unknown invoice subcommand `{}`", other))),
    }
}

fn billed_to(ws: &Workspace, tenant_id: Option<Uuid>, buyer_id: Option<Uuid>) -> String {
    tenant_id
        .and_then(|id| ws.tenant(id))
        .map(|tenant| tenant.name.clone())
        .or_else(|| buyer_id.and_then(|id| ws.buyer(id)).map(|buyer| buyer.name.clone()))
        .unwrap_or_else(|| "-".into())
}

fn cmd_payment(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("record") => {
            let invoice = args.required(0, "invoice")?;
            let amount = parse_amount("amount", args.required(1, "amount")?)?;
            let method = args
                .flag_parsed::<PaymentMethod>("method")?
                .unwrap_or(PaymentMethod::BankTransfer);
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let reference = args.flag("reference");
            let receipt = context.mutate(Permission::ManageFinance, |ws, _, clock| {
                let invoice_id = lookup::invoice(ws, invoice)?;
                let payment_id =
                    FinanceService::record_payment(ws, invoice_id, amount, method, date, reference, clock)?;
                Ok(ws
                    .payments
                    .iter()
                    .find(|payment| payment.id == payment_id)
                    .and_then(|payment| payment.voucher_id)
                    .map(|voucher| voucher_reference(ws, voucher)))
            })?;
            output::success(format!(
                "Payment of {} recorded against {} ({}).",
                output::money(amount, &currency),
                invoice,
                receipt.unwrap_or_else(|| method.receipt_voucher().code().to_string())
            ));
            Ok(())
        }
        Some("list") | None => context.read(Permission::ViewFinance, |ws, _| {
            let mut table = Table::new(vec![
                TableColumn::left("Date"),
                TableColumn::left("Invoice"),
                TableColumn::right("Amount"),
                TableColumn::left("Method"),
                TableColumn::left("Voucher"),
                TableColumn::left("Reference"),
            ]);
            for payment in &ws.payments {
                table.push(vec![
                    payment.date.to_string(),
                    ws.invoice(payment.invoice_id)
                        .map(|invoice| invoice.number.to_string())
                        .unwrap_or_default(),
                    output::money(payment.amount, &currency),
                    payment.method.to_string(),
                    payment
                        .voucher_id
                        .map(|voucher| voucher_reference(ws, voucher))
                        .unwrap_or_else(|| "-".into()),
                    payment.reference.clone().unwrap_or_else(|| "-".into()),
                ]);
            }
            table.print_or("No payments.");
            Ok(())
        }),
        Some(other) => Err(CommandError::usage(format!("unknown payment subcommand `{}`", other))),
    }
}

fn cmd_commission(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("accrue") => {
            let agent = args.required(0, "agent")?;
            let base = parse_amount("base", args.required(1, "base")?)?;
            let rate = parse_rate(args.required(2, "rate")?)?;
            let amount = args.flag_amount("amount")?;
            let deal = args.flag("deal");
            let description = args.flag("desc");
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let accrued = context.mutate(Permission::ManageFinance, |ws, _, clock| {
                let agent_id = lookup::employee(ws, agent)?;
                let deal_id = deal.map(|deal| lookup::deal(ws, deal)).transpose()?;
                let id = FinanceService::accrue_commission(
                    ws,
                    agent_id,
                    deal_id,
                    base,
                    rate,
                    amount,
                    date,
                    description,
                    clock,
                )?;
                Ok(ws
                    .commissions
                    .iter()
                    .find(|commission| commission.id == id)
                    .map(|commission| (id, commission.amount)))
            })?;
            if let Some((id, amount)) = accrued {
                output::success(format!(
                    "Commission {} of {} accrued for {}.",
                    lookup::short(id),
                    output::money(amount, &currency),
                    agent
                ));
            }
            Ok(())
        }
        Some("pay") => {
            let key = args.required(0, "commission")?;
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let voucher = context.mutate(Permission::ManageFinance, |ws, _, clock| {
                let id = lookup::commission(ws, key)?;
                let voucher = FinanceService::pay_commission(ws, id, date, clock)?;
                Ok(voucher_reference(ws, voucher))
            })?;
            output::success(format!("Commission {} paid via {}.", key, voucher));
            Ok(())
        }
        Some("list") | None => context.read(Permission::ViewFinance, |ws, _| {
            let mut table = Table::new(vec![
                TableColumn::left("Id"),
                TableColumn::left("Agent"),
                TableColumn::left("Deal"),
                TableColumn::left("Date"),
                TableColumn::right("Base"),
                TableColumn::right("Rate"),
                TableColumn::right("Amount"),
                TableColumn::left("Status"),
            ]);
            for commission in &ws.commissions {
                table.push(vec![
                    lookup::short(commission.id),
                    ws.employee(commission.agent_id)
                        .map(|agent| agent.full_name())
                        .unwrap_or_default(),
                    commission
                        .deal_id
                        .and_then(|deal| ws.deal(deal))
                        .map(|deal| deal.tid.to_string())
                        .unwrap_or_else(|| "-".into()),
                    commission.date.to_string(),
                    output::money(commission.base_amount, &currency),
                    format!("{:.2}%", commission.rate * 100.0),
                    output::money(commission.amount, &currency),
                    commission.status.to_string(),
                ]);
            }
            table.print_or("No commissions.");
            Ok(())
        }),
        Some(other) => Err(CommandError::usage(format!("unknown commission subcommand `{}`", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voucher_lines_parse_side_account_amount_and_memo() {
        let line = parse_voucher_line("dr:1000:1,250.50:April rent").unwrap();
        assert_eq!(line.account_code, "1000");
        assert_eq!(line.debit, 1250.5);
        assert_eq!(line.credit, 0.0);
        assert_eq!(line.memo.as_deref(), Some("April rent"));

        let line = parse_voucher_line("CR:4000:99").unwrap();
        assert_eq!(line.credit, 99.0);
        assert!(line.memo.is_none());

        assert!(parse_voucher_line("dr:1000").is_err());
        assert!(parse_voucher_line("up:1000:5").is_err());
    }

    #[test]
    fn voucher_types_accept_codes_and_labels() {
        assert_eq!(parse_voucher_type("BPV").unwrap(), VoucherType::BankPayment);
        assert_eq!(parse_voucher_type("journal").unwrap(), VoucherType::Journal);
        assert!(parse_voucher_type("XYZ").is_err());
    }

    #[test]
    fn invoice_items_take_optional_tax() {
        let item = parse_invoice_item("Rent:1:1200").unwrap();
        assert_eq!(item.description, "Rent");
        assert_eq!(item.unit_price, 1200.0);
        assert_eq!(item.tax_rate, 0.0);

        let item = parse_invoice_item("Service fee:2:50:5%").unwrap();
        assert_eq!(item.quantity, 2.0);
        assert!((item.tax_rate - 0.05).abs() < 1e-9);

        assert!(parse_invoice_item("Rent").is_err());
    }

    #[test]
    fn rates_accept_fractions_and_percentages() {
        assert!((parse_rate("2.5%").unwrap() - 0.025).abs() < 1e-9);
        assert!((parse_rate("0.03").unwrap() - 0.03).abs() < 1e-9);
    }
}

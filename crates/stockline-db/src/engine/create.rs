//! Sale creation.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use super::{deduct_all, Movement, SaleEngine};
use crate::error::{DbError, SaleError, SaleResult};
use crate::repository::generate_id;
use crate::repository::invoice::InvoiceSequence;
use crate::repository::sale::SaleRepository;
use stockline_core::invoice::parse_invoice_number;
use stockline_core::validation::{validate_sale_request, validate_scope};
use stockline_core::{
    CoreError, LedgerKind, PaymentHistory, PaymentStatus, SaleDetail, SaleItemRequest,
    SaleRequest, SalesRecord, SalesRecordItem, Scope,
};

impl SaleEngine {
    /// Records a sale and deducts its stock, all or nothing.
    ///
    /// `kind` selects the ledger every item is deducted from; it comes from
    /// the caller's resolved role.
    pub async fn create_sale(
        &self,
        scope: &Scope,
        kind: LedgerKind,
        request: SaleRequest,
    ) -> SaleResult<SaleDetail> {
        validate_scope(scope, kind)?;
        validate_sale_request(&request, kind)?;

        let scope_key = scope.key(self.config.invoice_partition);

        let mut tx = self.db.begin_write().await?;
        let outcome = create_in(&mut tx, scope, kind, &scope_key, &request).await;
        let detail = self.finish("create_sale", tx, outcome).await?;

        info!(
            sale_id = %detail.record.id,
            invoice_no = %detail.record.invoice_no,
            ledger = %kind,
            items = detail.items.len(),
            total_amount = detail.record.total_amount,
            paid_amount = detail.record.paid_amount,
            "Sale committed"
        );
        Ok(detail)
    }
}

async fn create_in(
    conn: &mut SqliteConnection,
    scope: &Scope,
    kind: LedgerKind,
    scope_key: &str,
    request: &SaleRequest,
) -> SaleResult<SaleDetail> {
    // 1. Invoice number
    let invoice_no = match request.invoice_no.as_deref().map(str::trim) {
        Some(invoice_no) => {
            if SaleRepository::invoice_exists(&mut *conn, scope_key, invoice_no).await? {
                return Err(CoreError::DuplicateInvoice(invoice_no.to_string()).into());
            }
            // numbers the allocator could also issue push the counter past them;
            // anything else is stored as given
            if let Ok(parsed) = parse_invoice_number(invoice_no) {
                InvoiceSequence::advance_to(&mut *conn, scope_key, parsed.date, parsed.sequence)
                    .await?;
            }
            invoice_no.to_string()
        }
        None => InvoiceSequence::allocate(&mut *conn, scope_key, request.date).await?,
    };

    // 2. Header
    let now = Utc::now();
    let status = PaymentStatus::derive(request.paid(), request.total());
    let record = SalesRecord {
        id: generate_id(),
        tenant_id: scope.tenant_id.clone(),
        organisation_id: scope.organisation_id.clone(),
        branch_id: scope.branch_id.clone(),
        scope_key: scope_key.to_string(),
        invoice_no,
        date: request.date,
        customer_id: request.customer_id.clone(),
        payment_mode: request.payment_mode,
        sub_total: request.sub_total,
        total_amount: request.total_amount,
        value_of_goods: request.value_of_goods,
        total_gst: request.total_gst,
        discount: request.discount,
        paid_amount: request.paid_amount,
        is_paid: status.is_paid,
        is_partially_paid: status.is_partially_paid,
        ledger_kind: kind,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    SaleRepository::insert_record(&mut *conn, &record)
        .await
        .map_err(|err| duplicate_invoice_or(err, &record.invoice_no))?;

    // 3. Items
    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        let item = new_item(&record, kind, line, now);
        SaleRepository::insert_item(&mut *conn, &item).await?;
        items.push(item);
    }

    // 4. Auto-payment
    let mut payments = Vec::new();
    if request.paid_amount > 0 {
        let payment = PaymentHistory {
            id: generate_id(),
            sales_record_id: record.id.clone(),
            amount: request.paid_amount,
            payment_mode: request.payment_mode,
            date: request.date,
            tenant_id: record.tenant_id.clone(),
            organisation_id: record.organisation_id.clone(),
            branch_id: record.branch_id.clone(),
            created_at: now,
        };
        SaleRepository::insert_payment(&mut *conn, &payment).await?;
        payments.push(payment);
    }

    // 5. Stock
    let movements = items
        .iter()
        .map(|item| Movement::of(item, kind))
        .collect::<SaleResult<Vec<_>>>()?;
    deduct_all(kind, &mut *conn, scope, &movements).await?;

    Ok(SaleDetail {
        record,
        items,
        payments,
    })
}

/// Builds a stored item from a request line. Only the reference of the
/// active ledger is kept.
pub(super) fn new_item(
    record: &SalesRecord,
    kind: LedgerKind,
    line: &SaleItemRequest,
    now: DateTime<Utc>,
) -> SalesRecordItem {
    let (stock_id, branch_stock_id) = match kind {
        LedgerKind::Organisation => (line.stock_id.clone(), None),
        LedgerKind::Branch => (None, line.branch_stock_id.clone()),
    };

    SalesRecordItem {
        id: generate_id(),
        sales_record_id: record.id.clone(),
        product_id: line.product_id.clone(),
        stock_id,
        branch_stock_id,
        qty: line.qty,
        loose_qty: line.loose_qty,
        price: line.price,
        mrp: line.mrp,
        amount: line.amount,
        tax_percentage: line.tax_percentage,
        tenant_id: record.tenant_id.clone(),
        organisation_id: record.organisation_id.clone(),
        branch_id: record.branch_id.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// The unique index on `(scope_key, invoice_no)` backs up the explicit check.
fn duplicate_invoice_or(err: DbError, invoice_no: &str) -> SaleError {
    if err.is_unique_on("sales_records.invoice_no") {
        CoreError::DuplicateInvoice(invoice_no.to_string()).into()
    } else {
        err.into()
    }
}

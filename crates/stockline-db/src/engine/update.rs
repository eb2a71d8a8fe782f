//! Sale edits and voids.
//!
//! ```text
//! prior items     request lines          action
//! ───────────     ─────────────          ──────────────────────────
//! it-1 (2, 0)     { id: it-1, (2, 0) }   update, stock unchanged
//! it-2 (0, 5)     { id: it-2, (1, 0) }   update, changed
//! it-3 (1, 0)     (not listed)           delete
//!                 { (0, 4) }             insert
//!
//! RevertAndRededuct: revert it-2 (0, 5) and it-3 (1, 0),
//!                    then deduct it-2 (1, 0) and the new (0, 4).
//! MetadataOnly:      no ledger calls.
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::info;

use super::create::new_item;
use super::{deduct_all, record_scope, revert_all, visible_to, EditStockPolicy, Movement, SaleEngine};
use crate::error::SaleResult;
use crate::repository::sale::SaleRepository;
use stockline_core::validation::{validate_scope, validate_update_request};
use stockline_core::{
    CoreError, LedgerKind, Money, PaymentStatus, SaleDetail, SaleUpdateRequest, SalesRecord,
    SalesRecordItem, Scope, ValidationError,
};

impl SaleEngine {
    /// Edits a committed sale, diffing its items against the request.
    ///
    /// The invoice number and paid amount are kept; the paid flags are
    /// recomputed against the new total. Stock follows
    /// [`EditStockPolicy`].
    pub async fn update_sale(
        &self,
        scope: &Scope,
        kind: LedgerKind,
        sale_id: &str,
        request: SaleUpdateRequest,
    ) -> SaleResult<SaleDetail> {
        validate_scope(scope, kind)?;
        validate_update_request(&request, kind)?;

        let policy = self.config.edit_stock_policy;
        let mut tx = self.db.begin_write().await?;
        let outcome = update_in(&mut tx, scope, kind, sale_id, &request, policy).await;
        let detail = self.finish("update_sale", tx, outcome).await?;

        info!(
            sale_id = %detail.record.id,
            invoice_no = %detail.record.invoice_no,
            items = detail.items.len(),
            total_amount = detail.record.total_amount,
            policy = ?policy,
            "Sale updated"
        );
        Ok(detail)
    }

    /// Voids a sale: every item's stock goes back to its batch and the sale
    /// is soft-deleted, in one transaction. The invoice number stays taken.
    pub async fn void_sale(
        &self,
        scope: &Scope,
        kind: LedgerKind,
        sale_id: &str,
    ) -> SaleResult<SaleDetail> {
        validate_scope(scope, kind)?;

        let mut tx = self.db.begin_write().await?;
        let outcome = void_in(&mut tx, scope, kind, sale_id).await;
        let detail = self.finish("void_sale", tx, outcome).await?;

        info!(
            sale_id = %detail.record.id,
            invoice_no = %detail.record.invoice_no,
            items = detail.items.len(),
            "Sale voided"
        );
        Ok(detail)
    }
}

async fn load_visible(
    conn: &mut SqliteConnection,
    scope: &Scope,
    kind: LedgerKind,
    sale_id: &str,
) -> SaleResult<SalesRecord> {
    match SaleRepository::find_record(&mut *conn, scope, sale_id).await? {
        Some(record) if visible_to(&record, scope, kind) => Ok(record),
        _ => Err(CoreError::SaleNotFound(sale_id.to_string()).into()),
    }
}

async fn update_in(
    conn: &mut SqliteConnection,
    scope: &Scope,
    kind: LedgerKind,
    sale_id: &str,
    request: &SaleUpdateRequest,
    policy: EditStockPolicy,
) -> SaleResult<SaleDetail> {
    let mut record = load_visible(&mut *conn, scope, kind, sale_id).await?;
    if record.ledger_kind != kind {
        return Err(ValidationError::invalid(
            "role",
            format!("sale was recorded against the {} ledger", record.ledger_kind),
        )
        .into());
    }

    let paid = Money::from_minor(record.paid_amount);
    let total = Money::from_minor(request.total_amount);
    if paid > total {
        return Err(ValidationError::BelowPaid { total, paid }.into());
    }

    let prior = SaleRepository::list_items(&mut *conn, &record.id).await?;
    let mut by_id: HashMap<&str, &SalesRecordItem> =
        prior.iter().map(|item| (item.id.as_str(), item)).collect();

    let now = Utc::now();
    let mut updated = Vec::new();
    let mut inserted = Vec::new();
    let mut reverts = Vec::new();
    let mut deducts = Vec::new();

    for line in &request.items {
        match &line.id {
            Some(id) => {
                let old = by_id.remove(id.as_str()).ok_or_else(|| {
                    ValidationError::invalid("items", format!("item {} is not part of sale {}", id, record.id))
                })?;
                let mut item = new_item(&record, kind, &line.item, now);
                item.id = old.id.clone();
                item.created_at = old.created_at;

                if stock_changed(old, &item, kind) {
                    reverts.push(Movement::of(old, kind)?);
                    deducts.push(Movement::of(&item, kind)?);
                }
                updated.push(item);
            }
            None => {
                let item = new_item(&record, kind, &line.item, now);
                deducts.push(Movement::of(&item, kind)?);
                inserted.push(item);
            }
        }
    }

    // whatever is left was dropped from the sale
    let mut removed: Vec<&SalesRecordItem> = by_id.into_values().collect();
    removed.sort_by(|a, b| a.id.cmp(&b.id));
    for old in &removed {
        reverts.push(Movement::of(old, kind)?);
    }

    for item in &updated {
        SaleRepository::update_item(&mut *conn, item).await?;
    }
    for item in &inserted {
        SaleRepository::insert_item(&mut *conn, item).await?;
    }
    for old in &removed {
        SaleRepository::delete_item(&mut *conn, &record.id, &old.id).await?;
    }

    if policy == EditStockPolicy::RevertAndRededuct {
        let stock_scope = record_scope(&record);
        revert_all(kind, &mut *conn, &stock_scope, &reverts).await?;
        deduct_all(kind, &mut *conn, &stock_scope, &deducts).await?;
    }

    let status = PaymentStatus::derive(paid, total);
    record.date = request.date;
    record.customer_id = request.customer_id.clone();
    record.payment_mode = request.payment_mode;
    record.sub_total = request.sub_total;
    record.total_amount = request.total_amount;
    record.value_of_goods = request.value_of_goods;
    record.total_gst = request.total_gst;
    record.discount = request.discount;
    record.is_paid = status.is_paid;
    record.is_partially_paid = status.is_partially_paid;
    record.updated_at = now;
    SaleRepository::update_record(&mut *conn, &record).await?;

    let detail = SaleRepository::load_detail(&mut *conn, record).await?;
    Ok(detail)
}

/// Whether an edited item moves stock differently from its prior version.
fn stock_changed(old: &SalesRecordItem, new: &SalesRecordItem, kind: LedgerKind) -> bool {
    old.batch_id(kind) != new.batch_id(kind) || old.quantity() != new.quantity()
}

async fn void_in(
    conn: &mut SqliteConnection,
    scope: &Scope,
    kind: LedgerKind,
    sale_id: &str,
) -> SaleResult<SaleDetail> {
    let record = load_visible(&mut *conn, scope, kind, sale_id).await?;
    let mut detail = SaleRepository::load_detail(&mut *conn, record).await?;

    // stock goes back to the ledger the sale was deducted from
    let ledger = detail.record.ledger_kind;
    let movements = detail
        .items
        .iter()
        .map(|item| Movement::of(item, ledger))
        .collect::<SaleResult<Vec<_>>>()?;
    revert_all(ledger, &mut *conn, &record_scope(&detail.record), &movements).await?;

    let now = Utc::now();
    SaleRepository::soft_delete(&mut *conn, &detail.record.id, now).await?;
    detail.record.deleted_at = Some(now);
    detail.record.updated_at = now;

    Ok(detail)
}

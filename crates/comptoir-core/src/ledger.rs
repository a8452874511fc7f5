//! # Ticket Stock Ledger
//!
//! Daily history of ticket outcomes and the transitions allowed on it.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   use_ticket ──► USED{code} ──report_used_as_broken──► BROKEN{code,r}  │
//! │      ▲              │   ▲                                   │           │
//! │      │ stock-1      │   └────────── cancel_broken ──────────┘           │
//! │      │              │                (reason dropped)                   │
//! │   stock+1 ◄── return_to_stock                                           │
//! │                     (entry deleted, code stays issued)                  │
//! │                                                                         │
//! │   mark_broken ──► BROKEN{code?, reason}      (stock untouched)          │
//! │                                                                         │
//! │   Reclassification never mutates a row: the old entry is deleted and   │
//! │   a successor with a new id is appended.                               │
//! │                                                                         │
//! │   save report ──► every unsettled row of the day gets report_id        │
//! │                   settled rows are frozen and ignored by DaySummary    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transition checks ([`report_used_as_broken`], [`cancel_broken`],
//! [`check_returnable`], [`check_deletable`]) are shared by the in-memory
//! [`TicketLedger`] and the SQLite repositories, so both refuse the same
//! moves with the same errors.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::code;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{StockSource, StockUpdate, TicketType};
use crate::validation::{validate_positive_amount, ValidationResult};

// =============================================================================
// Entry Kind
// =============================================================================

/// Stored kind of a history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Used,
    Broken,
}

impl EntryKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Used => "used",
            EntryKind::Broken => "broken",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "used" => Ok(EntryKind::Used),
            "broken" => Ok(EntryKind::Broken),
            _ => Err(ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: vec!["used".to_string(), "broken".to_string()],
            }),
        }
    }
}

// =============================================================================
// Broken Reason
// =============================================================================

/// Why a ticket was reported broken.
///
/// The set is closed, but stored rows may carry anything (older data, free
/// text). Those come back as `Unrecognized` and are displayed as stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BrokenReason {
    ComputerFailure,
    InvalidCode,
    NetworkIssue,
    SoftwareCrash,
    PowerOutage,
    HardwareMalfunction,
    Other,
    Unrecognized(String),
}

impl BrokenReason {
    /// Every recognised reason, in dashboard order.
    pub const KNOWN: [BrokenReason; 7] = [
        BrokenReason::ComputerFailure,
        BrokenReason::InvalidCode,
        BrokenReason::NetworkIssue,
        BrokenReason::SoftwareCrash,
        BrokenReason::PowerOutage,
        BrokenReason::HardwareMalfunction,
        BrokenReason::Other,
    ];

    /// The stored value.
    pub fn as_str(&self) -> &str {
        match self {
            BrokenReason::ComputerFailure => "computer_failure",
            BrokenReason::InvalidCode => "invalid_code",
            BrokenReason::NetworkIssue => "network_issue",
            BrokenReason::SoftwareCrash => "software_crash",
            BrokenReason::PowerOutage => "power_outage",
            BrokenReason::HardwareMalfunction => "hardware_malfunction",
            BrokenReason::Other => "other",
            BrokenReason::Unrecognized(raw) => raw,
        }
    }

    /// Human label. Unrecognized values are shown literally.
    pub fn label(&self) -> &str {
        match self {
            BrokenReason::ComputerFailure => "Computer failure",
            BrokenReason::InvalidCode => "Invalid code",
            BrokenReason::NetworkIssue => "Network issue",
            BrokenReason::SoftwareCrash => "Software crash",
            BrokenReason::PowerOutage => "Power outage",
            BrokenReason::HardwareMalfunction => "Hardware malfunction",
            BrokenReason::Other => "Other",
            BrokenReason::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, BrokenReason::Unrecognized(_))
    }

    /// Parses operator input: blank is refused, unknown text is kept.
    pub fn parse_required(raw: Option<&str>) -> ValidationResult<Self> {
        match raw.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => Ok(BrokenReason::from(r)),
            None => Err(ValidationError::required("reason")),
        }
    }
}

impl From<&str> for BrokenReason {
    fn from(raw: &str) -> Self {
        BrokenReason::KNOWN
            .into_iter()
            .find(|known| known.as_str() == raw)
            .unwrap_or_else(|| BrokenReason::Unrecognized(raw.to_string()))
    }
}

impl From<String> for BrokenReason {
    fn from(raw: String) -> Self {
        BrokenReason::from(raw.as_str())
    }
}

impl From<BrokenReason> for String {
    fn from(reason: BrokenReason) -> Self {
        match reason {
            BrokenReason::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// What a history row says happened.
///
/// A BROKEN entry always has a reason; a USED entry never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntry {
    Used {
        code: Option<String>,
    },
    Broken {
        code: Option<String>,
        reason: BrokenReason,
    },
}

impl LedgerEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            LedgerEntry::Used { .. } => EntryKind::Used,
            LedgerEntry::Broken { .. } => EntryKind::Broken,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            LedgerEntry::Used { code } | LedgerEntry::Broken { code, .. } => code.as_deref(),
        }
    }

    pub fn reason(&self) -> Option<&BrokenReason> {
        match self {
            LedgerEntry::Used { .. } => None,
            LedgerEntry::Broken { reason, .. } => Some(reason),
        }
    }

    /// Builds an entry from stored columns.
    ///
    /// This is the single place where legacy rows are normalized: the code is
    /// resolved with [`code::resolve_code`], and a USED row's reason (which
    /// only ever held the legacy code text) is dropped. A BROKEN row without
    /// a reason reads back as [`BrokenReason::Other`].
    pub fn from_stored(
        kind: EntryKind,
        reason: Option<&str>,
        code: Option<&str>,
        ticket_code: Option<&str>,
    ) -> Self {
        let code = code::resolve_code(code, ticket_code, reason);
        match kind {
            EntryKind::Used => LedgerEntry::Used { code },
            EntryKind::Broken => {
                let reason = reason
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(BrokenReason::from)
                    .unwrap_or(BrokenReason::Other);
                LedgerEntry::Broken { code, reason }
            }
        }
    }
}

// =============================================================================
// History Entry
// =============================================================================

/// One append-only row of the daily ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub ticket_id: String,
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub quantity: i64,
    /// Business day, distinct from `created_at`.
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Set once the row is rolled into a saved daily report.
    pub report_id: Option<String>,
}

impl HistoryEntry {
    pub fn new(ticket_id: &str, entry: LedgerEntry, quantity: i64, business_date: NaiveDate) -> Self {
        HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            entry,
            quantity,
            business_date,
            created_at: Utc::now(),
            report_id: None,
        }
    }

    /// The row that replaces this one after a reclassification.
    ///
    /// Same ticket type, quantity and business day; new id and timestamp.
    pub fn successor(&self, entry: LedgerEntry) -> Self {
        HistoryEntry::new(&self.ticket_id, entry, self.quantity, self.business_date)
    }

    pub fn kind(&self) -> EntryKind {
        self.entry.kind()
    }

    pub fn code(&self) -> Option<&str> {
        self.entry.code()
    }

    pub fn is_settled(&self) -> bool {
        self.report_id.is_some()
    }
}

// =============================================================================
// Append Request
// =============================================================================

/// Generic append: `{ticketId, type, quantity, reason?, code?, date}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AppendHistory {
    pub ticket_id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub reason: Option<String>,
    pub code: Option<String>,
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
}

fn default_quantity() -> i64 {
    1
}

impl AppendHistory {
    /// Validates the request and builds the row for `today` when no date
    /// was given.
    pub fn into_entry(self, today: NaiveDate) -> ValidationResult<HistoryEntry> {
        if self.ticket_id.trim().is_empty() {
            return Err(ValidationError::required("ticketId"));
        }
        validate_positive_amount("quantity", self.quantity)?;
        let code = self
            .code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let entry = match self.kind {
            EntryKind::Used => LedgerEntry::Used { code },
            EntryKind::Broken => LedgerEntry::Broken {
                code,
                reason: BrokenReason::parse_required(self.reason.as_deref())?,
            },
        };
        Ok(HistoryEntry::new(
            &self.ticket_id,
            entry,
            self.quantity,
            self.date.unwrap_or(today),
        ))
    }
}

// =============================================================================
// Transitions
// =============================================================================

fn ensure_unsettled(entry: &HistoryEntry) -> CoreResult<()> {
    if entry.is_settled() {
        return Err(CoreError::EntrySettled(entry.id.clone()));
    }
    Ok(())
}

fn ensure_kind(entry: &HistoryEntry, expected: EntryKind) -> CoreResult<()> {
    if entry.kind() != expected {
        return Err(CoreError::InvalidEntryKind {
            entry_id: entry.id.clone(),
            expected,
            actual: entry.kind(),
        });
    }
    Ok(())
}

/// USED → BROKEN, keeping the code. Returns the successor row.
pub fn report_used_as_broken(entry: &HistoryEntry, reason: BrokenReason) -> CoreResult<HistoryEntry> {
    ensure_unsettled(entry)?;
    ensure_kind(entry, EntryKind::Used)?;
    Ok(entry.successor(LedgerEntry::Broken {
        code: entry.code().map(str::to_string),
        reason,
    }))
}

/// BROKEN → USED, keeping the code and dropping the reason.
pub fn cancel_broken(entry: &HistoryEntry) -> CoreResult<HistoryEntry> {
    ensure_unsettled(entry)?;
    ensure_kind(entry, EntryKind::Broken)?;
    Ok(entry.successor(LedgerEntry::Used {
        code: entry.code().map(str::to_string),
    }))
}

/// A USED, unsettled row may be returned to stock.
pub fn check_returnable(entry: &HistoryEntry) -> CoreResult<()> {
    ensure_unsettled(entry)?;
    ensure_kind(entry, EntryKind::Used)
}

/// Any unsettled row may be deleted.
pub fn check_deletable(entry: &HistoryEntry) -> CoreResult<()> {
    ensure_unsettled(entry)
}

// =============================================================================
// Day Summary
// =============================================================================

/// One broken row as the dashboard lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BrokenDetail {
    pub entry_id: String,
    /// Resolved code, or the display fallback.
    pub code: String,
    pub reason: String,
    pub reason_label: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A ticket type's counters for one business day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketDayCounts {
    pub used: i64,
    pub broken: i64,
    pub broken_details: Vec<BrokenDetail>,
}

/// Used/broken counters for a day, computed from history.
///
/// Settled rows are skipped, so once a report is saved the day reads as
/// zero again without any counter being reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub tickets: BTreeMap<String, TicketDayCounts>,
}

impl DaySummary {
    pub fn fold<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a HistoryEntry>,
    {
        let mut summary = DaySummary::default();
        for entry in entries.into_iter().filter(|e| !e.is_settled()) {
            let counts = summary.tickets.entry(entry.ticket_id.clone()).or_default();
            match &entry.entry {
                LedgerEntry::Used { .. } => counts.used += entry.quantity,
                LedgerEntry::Broken { code, reason } => {
                    counts.broken += entry.quantity;
                    counts.broken_details.push(BrokenDetail {
                        entry_id: entry.id.clone(),
                        code: code::display_code(code.as_deref()).to_string(),
                        reason: reason.as_str().to_string(),
                        reason_label: reason.label().to_string(),
                        created_at: entry.created_at,
                    });
                }
            }
        }
        summary
    }

    pub fn used(&self, ticket_id: &str) -> i64 {
        self.tickets.get(ticket_id).map_or(0, |c| c.used)
    }

    pub fn broken(&self, ticket_id: &str) -> i64 {
        self.tickets.get(ticket_id).map_or(0, |c| c.broken)
    }

    /// True when at least one ticket type was used or broken.
    pub fn has_activity(&self) -> bool {
        self.tickets.values().any(|c| c.used > 0 || c.broken > 0)
    }
}

// =============================================================================
// In-Memory Ledger
// =============================================================================

/// Owned snapshot of the ledger for one session.
///
/// Applies the same transitions as the database layer. The dashboard uses
/// it for tentative updates that are reconciled on the next refresh.
#[derive(Debug, Clone, Default)]
pub struct TicketLedger {
    tickets: BTreeMap<String, TicketType>,
    history: Vec<HistoryEntry>,
    stock_updates: Vec<StockUpdate>,
    pools: BTreeMap<String, VecDeque<String>>,
    known_codes: HashSet<String>,
}

impl TicketLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a ticket type.
    pub fn insert_ticket(&mut self, ticket: TicketType) {
        self.tickets.insert(ticket.id.clone(), ticket);
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<&TicketType> {
        self.tickets.get(ticket_id)
    }

    pub fn tickets(&self) -> impl Iterator<Item = &TicketType> {
        self.tickets.values()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn stock_updates(&self) -> &[StockUpdate] {
        &self.stock_updates
    }

    fn ticket_mut(&mut self, ticket_id: &str) -> CoreResult<&mut TicketType> {
        self.tickets
            .get_mut(ticket_id)
            .ok_or_else(|| CoreError::TicketNotFound(ticket_id.to_string()))
    }

    fn entry_index(&self, entry_id: &str) -> CoreResult<usize> {
        self.history
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| CoreError::HistoryEntryNotFound(entry_id.to_string()))
    }

    fn bump_stock(&mut self, ticket_id: &str, amount: i64, source: StockSource) -> CoreResult<StockUpdate> {
        let ticket = self.ticket_mut(ticket_id)?;
        let update = StockUpdate::record(ticket_id, ticket.stock, amount, source);
        ticket.stock = update.new_stock;
        ticket.updated_at = update.created_at;
        self.stock_updates.push(update.clone());
        Ok(update)
    }

    /// Adds `amount` units of stock.
    pub fn add_stock(&mut self, ticket_id: &str, amount: i64) -> CoreResult<StockUpdate> {
        validate_positive_amount("amount", amount)?;
        self.bump_stock(ticket_id, amount, StockSource::Manual)
    }

    /// Puts codes into the pool and raises stock by the number accepted.
    ///
    /// Codes already known to the ledger are skipped. Returns `None` when
    /// nothing new was accepted.
    pub fn import_codes(&mut self, ticket_id: &str, codes: &[String]) -> CoreResult<Option<StockUpdate>> {
        self.ticket_mut(ticket_id)?;
        let fresh: Vec<String> = code::normalize_import(codes)
            .into_iter()
            .filter(|c| !self.known_codes.contains(c))
            .collect();
        if fresh.is_empty() {
            return Ok(None);
        }
        let accepted = fresh.len() as i64;
        self.known_codes.extend(fresh.iter().cloned());
        self.pools.entry(ticket_id.to_string()).or_default().extend(fresh);
        self.bump_stock(ticket_id, accepted, StockSource::Import).map(Some)
    }

    fn issue_code(&mut self, ticket_id: &str) -> String {
        if let Some(code) = self.pools.get_mut(ticket_id).and_then(VecDeque::pop_front) {
            return code;
        }
        loop {
            let candidate = code::generate_code();
            if self.known_codes.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Consumes one ticket and returns its code.
    pub fn use_ticket(&mut self, ticket_id: &str, date: NaiveDate) -> CoreResult<String> {
        let ticket = self.ticket_mut(ticket_id)?;
        if ticket.stock <= 0 {
            return Err(CoreError::OutOfStock {
                ticket_id: ticket_id.to_string(),
            });
        }
        ticket.stock -= 1;
        ticket.updated_at = Utc::now();

        let code = self.issue_code(ticket_id);
        self.history.push(HistoryEntry::new(
            ticket_id,
            LedgerEntry::Used {
                code: Some(code.clone()),
            },
            1,
            date,
        ));
        Ok(code)
    }

    /// Records a breakage without touching stock.
    pub fn mark_broken(
        &mut self,
        ticket_id: &str,
        reason: BrokenReason,
        code: Option<String>,
        date: NaiveDate,
    ) -> CoreResult<&HistoryEntry> {
        self.ticket_mut(ticket_id)?;
        let entry = HistoryEntry::new(ticket_id, LedgerEntry::Broken { code, reason }, 1, date);
        self.history.push(entry);
        Ok(&self.history[self.history.len() - 1])
    }

    /// Generic append, for rows built from an [`AppendHistory`] request.
    pub fn append(&mut self, entry: HistoryEntry) -> CoreResult<&HistoryEntry> {
        self.ticket_mut(&entry.ticket_id)?;
        self.history.push(entry);
        Ok(&self.history[self.history.len() - 1])
    }

    fn replace(&mut self, index: usize, successor: HistoryEntry) -> &HistoryEntry {
        self.history.remove(index);
        self.history.push(successor);
        &self.history[self.history.len() - 1]
    }

    pub fn report_used_as_broken(&mut self, entry_id: &str, reason: BrokenReason) -> CoreResult<&HistoryEntry> {
        let index = self.entry_index(entry_id)?;
        let successor = report_used_as_broken(&self.history[index], reason)?;
        Ok(self.replace(index, successor))
    }

    pub fn cancel_broken(&mut self, entry_id: &str) -> CoreResult<&HistoryEntry> {
        let index = self.entry_index(entry_id)?;
        let successor = cancel_broken(&self.history[index])?;
        Ok(self.replace(index, successor))
    }

    /// Removes a USED row and gives the unit back. The code is not returned
    /// to the pool.
    pub fn return_to_stock(&mut self, entry_id: &str) -> CoreResult<i64> {
        let index = self.entry_index(entry_id)?;
        check_returnable(&self.history[index])?;
        let ticket_id = self.history[index].ticket_id.clone();
        let ticket = self.ticket_mut(&ticket_id)?;
        ticket.stock += 1;
        ticket.updated_at = Utc::now();
        let stock = ticket.stock;
        self.history.remove(index);
        Ok(stock)
    }

    pub fn delete_entry(&mut self, entry_id: &str) -> CoreResult<HistoryEntry> {
        let index = self.entry_index(entry_id)?;
        check_deletable(&self.history[index])?;
        Ok(self.history.remove(index))
    }

    /// Rows of `date`, oldest first.
    pub fn entries_for(&self, date: NaiveDate) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().filter(move |e| e.business_date == date)
    }

    pub fn summary(&self, date: NaiveDate) -> DaySummary {
        DaySummary::fold(self.entries_for(date))
    }

    /// Marks every unsettled row of `date` as belonging to `report_id`.
    /// Returns how many rows were settled.
    pub fn settle(&mut self, date: NaiveDate, report_id: &str) -> usize {
        let mut settled = 0;
        for entry in self
            .history
            .iter_mut()
            .filter(|e| e.business_date == date && e.report_id.is_none())
        {
            entry.report_id = Some(report_id.to_string());
            settled += 1;
        }
        settled
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn ledger_with(stock: i64) -> TicketLedger {
        let mut ticket = TicketType::new("1h", Money::from_minor(500));
        ticket.id = "t1".to_string();
        ticket.stock = stock;
        let mut ledger = TicketLedger::new();
        ledger.insert_ticket(ticket);
        ledger
    }

    #[test]
    fn test_three_uses_then_out_of_stock() {
        let mut ledger = ledger_with(3);
        let mut codes = HashSet::new();
        for _ in 0..3 {
            codes.insert(ledger.use_ticket("t1", day()).unwrap());
        }
        assert_eq!(codes.len(), 3);
        assert_eq!(ledger.ticket("t1").unwrap().stock, 0);
        assert_eq!(ledger.summary(day()).used("t1"), 3);

        let err = ledger.use_ticket("t1", day()).unwrap_err();
        assert!(matches!(err, CoreError::OutOfStock { ticket_id } if ticket_id == "t1"));
        assert_eq!(ledger.history().len(), 3);
    }

    #[test]
    fn test_stock_conservation() {
        let mut ledger = ledger_with(0);
        ledger.add_stock("t1", 5).unwrap();
        let codes: HashSet<String> = (0..5)
            .map(|_| ledger.use_ticket("t1", day()).unwrap())
            .collect();
        assert_eq!(codes.len(), 5);
        assert_eq!(ledger.ticket("t1").unwrap().stock, 0);
        assert_eq!(
            ledger
                .history()
                .iter()
                .filter(|e| e.kind() == EntryKind::Used)
                .count(),
            5
        );
    }

    #[test]
    fn test_add_stock_rejects_non_positive() {
        let mut ledger = ledger_with(2);
        assert!(matches!(
            ledger.add_stock("t1", 0),
            Err(CoreError::Validation(_))
        ));
        assert!(ledger.stock_updates().is_empty());

        let update = ledger.add_stock("t1", 4).unwrap();
        assert_eq!((update.previous_stock, update.new_stock), (2, 6));
    }

    #[test]
    fn test_imported_codes_are_issued_oldest_first() {
        let mut ledger = ledger_with(0);
        let codes = vec!["AAA".to_string(), "BBB".to_string(), "AAA".to_string()];
        let update = ledger.import_codes("t1", &codes).unwrap().unwrap();
        assert_eq!(update.amount, 2);
        assert_eq!(update.source, StockSource::Import);

        assert_eq!(ledger.use_ticket("t1", day()).unwrap(), "AAA");
        assert_eq!(ledger.use_ticket("t1", day()).unwrap(), "BBB");

        // Re-importing known codes adds nothing.
        assert!(ledger.import_codes("t1", &codes).unwrap().is_none());
    }

    #[test]
    fn test_broken_round_trip_keeps_code_and_drops_reason() {
        let mut ledger = ledger_with(1);
        let code = ledger.use_ticket("t1", day()).unwrap();
        let used_id = ledger.history()[0].id.clone();

        let broken = ledger
            .report_used_as_broken(&used_id, BrokenReason::NetworkIssue)
            .unwrap()
            .clone();
        assert_eq!(broken.code(), Some(code.as_str()));
        assert_ne!(broken.id, used_id);
        let summary = ledger.summary(day());
        assert_eq!((summary.used("t1"), summary.broken("t1")), (0, 1));

        let restored = ledger.cancel_broken(&broken.id).unwrap().clone();
        assert_eq!(
            restored.entry,
            LedgerEntry::Used {
                code: Some(code.clone())
            }
        );
        assert_eq!(restored.ticket_id, "t1");
        assert_eq!(restored.business_date, day());
        assert_eq!(ledger.ticket("t1").unwrap().stock, 0);
    }

    #[test]
    fn test_wrong_kind_is_refused() {
        let mut ledger = ledger_with(1);
        let broken_id = ledger
            .mark_broken("t1", BrokenReason::PowerOutage, None, day())
            .unwrap()
            .id
            .clone();

        let err = ledger
            .report_used_as_broken(&broken_id, BrokenReason::Other)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidEntryKind {
                expected: EntryKind::Used,
                actual: EntryKind::Broken,
                ..
            }
        ));
        assert!(ledger.return_to_stock(&broken_id).is_err());
        // mark_broken leaves stock alone
        assert_eq!(ledger.ticket("t1").unwrap().stock, 1);
    }

    #[test]
    fn test_return_to_stock_restores_pre_use_value() {
        let mut ledger = ledger_with(2);
        ledger.use_ticket("t1", day()).unwrap();
        let id = ledger.history()[0].id.clone();

        assert_eq!(ledger.return_to_stock(&id).unwrap(), 2);
        assert!(ledger.history().is_empty());
        assert_eq!(ledger.summary(day()).used("t1"), 0);
    }

    #[test]
    fn test_settled_rows_are_frozen_and_ignored() {
        let mut ledger = ledger_with(2);
        ledger.use_ticket("t1", day()).unwrap();
        let id = ledger.history()[0].id.clone();

        assert_eq!(ledger.settle(day(), "r1"), 1);
        assert!(!ledger.summary(day()).has_activity());
        assert!(matches!(
            ledger.return_to_stock(&id),
            Err(CoreError::EntrySettled(_))
        ));
        assert!(matches!(
            ledger.delete_entry(&id),
            Err(CoreError::EntrySettled(_))
        ));
        // Nothing left to settle.
        assert_eq!(ledger.settle(day(), "r2"), 0);
    }

    #[test]
    fn test_missing_entry() {
        let mut ledger = ledger_with(1);
        assert!(matches!(
            ledger.cancel_broken("nope"),
            Err(CoreError::HistoryEntryNotFound(_))
        ));
        assert!(matches!(
            ledger.use_ticket("t9", day()),
            Err(CoreError::TicketNotFound(_))
        ));
    }

    #[test]
    fn test_from_stored_normalizes_legacy_rows() {
        let used = LedgerEntry::from_stored(EntryKind::Used, Some("Code coupon: ZX81"), None, None);
        assert_eq!(
            used,
            LedgerEntry::Used {
                code: Some("ZX81".to_string())
            }
        );

        let broken = LedgerEntry::from_stored(EntryKind::Broken, Some("le wifi a sauté"), None, Some("K2"));
        assert_eq!(broken.code(), Some("K2"));
        assert_eq!(
            broken.reason().map(BrokenReason::label),
            Some("le wifi a sauté")
        );

        let bare = LedgerEntry::from_stored(EntryKind::Broken, None, None, None);
        assert_eq!(bare.reason(), Some(&BrokenReason::Other));
    }

    #[test]
    fn test_day_summary_details_use_display_fallback() {
        let entries = vec![HistoryEntry::new(
            "t1",
            LedgerEntry::Broken {
                code: None,
                reason: BrokenReason::InvalidCode,
            },
            1,
            day(),
        )];
        let summary = DaySummary::fold(&entries);
        let detail = &summary.tickets["t1"].broken_details[0];
        assert_eq!(detail.code, code::CODE_NOT_AVAILABLE);
        assert_eq!(detail.reason, "invalid_code");
        assert_eq!(detail.reason_label, "Invalid code");
    }

    #[test]
    fn test_append_validation() {
        let request = AppendHistory {
            ticket_id: "t1".to_string(),
            kind: EntryKind::Broken,
            quantity: 1,
            reason: Some("  ".to_string()),
            code: None,
            date: None,
        };
        assert!(matches!(
            request.clone().into_entry(day()),
            Err(ValidationError::Required { .. })
        ));

        let zero = AppendHistory {
            quantity: 0,
            reason: Some("other".to_string()),
            ..request.clone()
        };
        assert!(zero.into_entry(day()).is_err());

        let ok = AppendHistory {
            reason: Some("software_crash".to_string()),
            ..request
        }
        .into_entry(day())
        .unwrap();
        assert_eq!(ok.business_date, day());
        assert_eq!(ok.entry.reason(), Some(&BrokenReason::SoftwareCrash));
    }

    #[test]
    fn test_history_entry_json_is_flat() {
        let entry = HistoryEntry::new(
            "t1",
            LedgerEntry::Broken {
                code: Some("C1".to_string()),
                reason: BrokenReason::Other,
            },
            1,
            day(),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "broken");
        assert_eq!(json["code"], "C1");
        assert_eq!(json["reason"], "other");
        assert_eq!(json["ticketId"], "t1");
        assert_eq!(json["businessDate"], "2024-03-15");
    }
}

//! The reconciliation pass.
//!
//! One pass moves through: pause check, roster load, CRM matching, resume
//! from cursor, then strictly sequential per-entry processing. A fatal
//! geocoding failure records the pause state and ends the pass early; every
//! other per-entry failure is logged and the pass moves on.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};

use geocrm_core::{
    build_canonical_address, normalize_name, AddressComponents, AppConfig, CrmPartner,
    SourceEntry,
};
use geocrm_crm::PartnerDirectory;
use geocrm_db::{NewCustomer, SyncCursorRow, SyncRunCounts, SyncRunStatus};
use geocrm_geocode::Geocoder;

use crate::equipment::parse_equipment;
use crate::error::{EntryError, SyncError};
use crate::matcher::{find_exact_match, find_match, is_found, lookup_names};
use crate::roster::RosterSource;
use crate::store::SyncStore;

/// Candidates shorter than this are not sent to the fuzzy CRM lookup.
const MIN_FUZZY_CANDIDATE_LEN: usize = 3;

/// Street fragments shorter than this are not used for duplicate detection.
const MIN_STREET_FRAGMENT_LEN: usize = 4;

const EQUIPMENT_JOINER: &str = "; ";

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// How long a recorded pause blocks later passes.
    pub cooldown: TimeDelta,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            cooldown: TimeDelta::hours(7),
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let secs = i64::try_from(config.pause_cooldown_secs).unwrap_or(i64::MAX);
        Self {
            cooldown: TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX),
        }
    }
}

/// Process-lifetime state threaded through every pass.
#[derive(Debug, Default)]
pub struct SyncSession {
    /// Set once the first pass of this process has cleared stale pause and
    /// cursor state.
    pub started: bool,
}

impl SyncSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// A pause is still within its cool-down; nothing was done.
    Skipped {
        paused_since: DateTime<Utc>,
        resumes_at: DateTime<Utc>,
    },
    Completed,
    /// A fatal network condition stopped the pass; `reason` was persisted.
    Paused { reason: String },
}

impl PassOutcome {
    fn run_status(&self) -> SyncRunStatus {
        match self {
            PassOutcome::Skipped { .. } => SyncRunStatus::Skipped,
            PassOutcome::Completed => SyncRunStatus::Completed,
            PassOutcome::Paused { .. } => SyncRunStatus::Paused,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassTotals {
    /// Roster entries after fill-down.
    pub entries: usize,
    /// Distinct CRM partners matched.
    pub matched: usize,
    /// Distinct roster names without a CRM partner.
    pub unmatched: usize,
    pub processed: usize,
    pub failed: usize,
}

impl PassTotals {
    fn counts(self) -> SyncRunCounts {
        let clamp = |n: usize| i32::try_from(n).unwrap_or(i32::MAX);
        SyncRunCounts {
            entries_total: clamp(self.entries),
            matched: clamp(self.matched),
            unmatched: clamp(self.unmatched),
            processed: clamp(self.processed),
            failed: clamp(self.failed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub totals: PassTotals,
    /// Roster names that matched no CRM partner.
    pub unmatched: Vec<String>,
    /// Index into the matched list of the cursor entry the pass resumed
    /// after, if any.
    pub resumed_from: Option<usize>,
}

impl PassReport {
    fn skipped(paused_since: DateTime<Utc>, resumes_at: DateTime<Utc>) -> Self {
        Self {
            outcome: PassOutcome::Skipped {
                paused_since,
                resumes_at,
            },
            totals: PassTotals::default(),
            unmatched: Vec::new(),
            resumed_from: None,
        }
    }
}

/// A CRM partner paired with the roster data that selected it. Several
/// roster rows naming the same partner collapse into one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedEntry {
    pub partner: CrmPartner,
    /// The first roster label that matched.
    pub entry_name: String,
    /// Distinct equipment texts of every matching row, joined with `"; "`.
    pub equipment_raw: String,
}

/// Index of the entry the cursor points at: by CRM id, then by normalized
/// roster name.
#[must_use]
pub fn cursor_position(matched: &[MatchedEntry], cursor: &SyncCursorRow) -> Option<usize> {
    cursor
        .last_resolved_id
        .and_then(|id| matched.iter().position(|m| m.partner.id == id))
        .or_else(|| {
            let key = normalize_name(cursor.last_entry_name.as_deref()?);
            matched
                .iter()
                .position(|m| normalize_name(&m.entry_name) == key)
        })
}

fn street_fragment(street: Option<&str>) -> Option<&str> {
    let head = street?.split(',').next()?.trim();
    (head.chars().count() >= MIN_STREET_FRAGMENT_LEN).then_some(head)
}

fn fatal_reason(err: &EntryError) -> String {
    match err {
        EntryError::Geocode(e) => format!("{}: {e}", e.code()),
        EntryError::Db(e) => e.to_string(),
    }
}

/// Owns the collaborators of a pass. Passes never overlap: callers hold the
/// reconciler behind a lock.
pub struct Reconciler<R, D, G, S> {
    roster: R,
    directory: D,
    geocoder: G,
    store: S,
    settings: SyncSettings,
}

impl<R, D, G, S> Reconciler<R, D, G, S>
where
    R: RosterSource,
    D: PartnerDirectory,
    G: Geocoder,
    S: SyncStore,
{
    #[must_use]
    pub fn new(roster: R, directory: D, geocoder: G, store: S, settings: SyncSettings) -> Self {
        Self {
            roster,
            directory,
            geocoder,
            store,
            settings,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one pass at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the roster cannot be read, the exact CRM
    /// lookup fails, or pause/cursor state cannot be read or written.
    pub async fn run_pass(&self, session: &mut SyncSession) -> Result<PassReport, SyncError> {
        self.run_pass_at(session, Utc::now()).await
    }

    /// Runs one pass, judging the pause cool-down against `now`.
    ///
    /// The pass is recorded in `sync_runs` on a best-effort basis.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::run_pass`].
    pub async fn run_pass_at(
        &self,
        session: &mut SyncSession,
        now: DateTime<Utc>,
    ) -> Result<PassReport, SyncError> {
        let run_id = match self.store.start_run().await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "failed to record sync run start");
                None
            }
        };

        let result = self.execute(session, now).await;

        if let Some(id) = run_id {
            let (status, counts, message) = match &result {
                Ok(report) => {
                    let message = match &report.outcome {
                        PassOutcome::Paused { reason } => Some(reason.clone()),
                        _ => None,
                    };
                    (report.outcome.run_status(), report.totals.counts(), message)
                }
                Err(e) => (
                    SyncRunStatus::Failed,
                    SyncRunCounts::default(),
                    Some(e.to_string()),
                ),
            };
            if let Err(e) = self
                .store
                .finish_run(id, status, counts, message.as_deref())
                .await
            {
                tracing::warn!(run_id = id, error = %e, "failed to record sync run result");
            }
        }

        result
    }

    async fn execute(
        &self,
        session: &mut SyncSession,
        now: DateTime<Utc>,
    ) -> Result<PassReport, SyncError> {
        if let Some(skipped) = self.check_pause(session, now).await? {
            return Ok(skipped);
        }

        let entries = self.roster.load()?;
        let (matched, unmatched) = self.match_entries(&entries).await?;

        let mut totals = PassTotals {
            entries: entries.len(),
            matched: matched.len(),
            unmatched: unmatched.len(),
            ..PassTotals::default()
        };

        let cursor = self.store.load_cursor().await?;
        let resumed_from = cursor
            .as_ref()
            .and_then(|cursor| cursor_position(&matched, cursor));
        let start = resumed_from.map_or(0, |idx| idx + 1);

        tracing::info!(
            entries = totals.entries,
            matched = totals.matched,
            unmatched = totals.unmatched,
            start,
            "starting reconciliation"
        );

        for entry in &matched[start.min(matched.len())..] {
            match self.process_entry(entry).await {
                Ok(()) => totals.processed += 1,
                Err(e) if e.is_fatal() => {
                    let reason = fatal_reason(&e);
                    tracing::error!(
                        partner_id = entry.partner.id,
                        entry = %entry.entry_name,
                        error = %e,
                        "fatal network condition, pausing synchronization"
                    );
                    if let Err(store_err) = self.store.set_pause(now, &reason).await {
                        tracing::error!(error = %store_err, "failed to persist pause state");
                    }
                    return Ok(PassReport {
                        outcome: PassOutcome::Paused { reason },
                        totals,
                        unmatched,
                        resumed_from,
                    });
                }
                Err(e) => {
                    totals.failed += 1;
                    tracing::warn!(
                        partner_id = entry.partner.id,
                        entry = %entry.entry_name,
                        error = %e,
                        "entry failed, continuing"
                    );
                }
            }
        }

        self.store.clear_cursor().await?;
        tracing::info!(
            processed = totals.processed,
            failed = totals.failed,
            "reconciliation completed"
        );

        Ok(PassReport {
            outcome: PassOutcome::Completed,
            totals,
            unmatched,
            resumed_from,
        })
    }

    /// Returns a skipped report while a pause is within its cool-down.
    async fn check_pause(
        &self,
        session: &mut SyncSession,
        now: DateTime<Utc>,
    ) -> Result<Option<PassReport>, SyncError> {
        if !session.started {
            self.store.clear_pause().await?;
            self.store.clear_cursor().await?;
            session.started = true;
            tracing::info!("first pass of this process, cleared pause and cursor");
            return Ok(None);
        }

        let Some(pause) = self.store.load_pause().await? else {
            return Ok(None);
        };

        let resumes_at = pause
            .paused_since
            .checked_add_signed(self.settings.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now < resumes_at {
            tracing::info!(
                paused_since = %pause.paused_since,
                reason = %pause.paused_reason,
                %resumes_at,
                "synchronization paused, skipping pass"
            );
            return Ok(Some(PassReport::skipped(pause.paused_since, resumes_at)));
        }

        self.store.clear_pause().await?;
        tracing::info!(
            paused_since = %pause.paused_since,
            "pause cool-down elapsed, resuming"
        );
        Ok(None)
    }

    /// Matches roster entries to CRM partners: one batched exact lookup, then
    /// a fuzzy lookup per still-unmatched name. Returns the matched list in
    /// roster order and the distinct unmatched names.
    async fn match_entries(
        &self,
        entries: &[SourceEntry],
    ) -> Result<(Vec<MatchedEntry>, Vec<String>), SyncError> {
        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for entry in entries {
            for name in lookup_names(&entry.name) {
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }

        let exact = self.directory.find_exact(&names).await?;
        tracing::debug!(requested = names.len(), found = exact.len(), "exact CRM lookup");

        let mut fuzzy_cache: HashMap<String, Option<CrmPartner>> = HashMap::new();
        let mut matched: Vec<MatchedEntry> = Vec::new();
        let mut positions: HashMap<i64, usize> = HashMap::new();
        let mut unmatched: Vec<String> = Vec::new();

        for entry in entries {
            let partner = match find_exact_match(&entry.name, &exact) {
                Some(partner) => Some(partner.clone()),
                None => self.fuzzy_match(&entry.name, &mut fuzzy_cache).await,
            };

            let Some(partner) = partner else {
                if !unmatched.contains(&entry.name) {
                    tracing::info!(entry = %entry.name, "no CRM partner found for roster entry");
                    unmatched.push(entry.name.clone());
                }
                continue;
            };

            let equipment = entry.equipment_raw.trim();
            if let Some(&pos) = positions.get(&partner.id) {
                let existing = &mut matched[pos];
                let already = existing
                    .equipment_raw
                    .split(EQUIPMENT_JOINER)
                    .any(|text| text == equipment);
                if !equipment.is_empty() && !already {
                    if !existing.equipment_raw.is_empty() {
                        existing.equipment_raw.push_str(EQUIPMENT_JOINER);
                    }
                    existing.equipment_raw.push_str(equipment);
                }
            } else {
                positions.insert(partner.id, matched.len());
                matched.push(MatchedEntry {
                    partner,
                    entry_name: entry.name.clone(),
                    equipment_raw: equipment.to_string(),
                });
            }
        }

        Ok((matched, unmatched))
    }

    async fn fuzzy_match(
        &self,
        requested: &str,
        cache: &mut HashMap<String, Option<CrmPartner>>,
    ) -> Option<CrmPartner> {
        let key = normalize_name(requested);
        if let Some(cached) = cache.get(&key) {
            return cached.clone();
        }

        let candidates: Vec<String> = lookup_names(requested)
            .into_iter()
            .filter(|c| c.chars().count() >= MIN_FUZZY_CANDIDATE_LEN)
            .collect();
        let found = match self.directory.find_fuzzy(&candidates).await {
            Ok(found) => find_match(requested, &found).cloned(),
            Err(e) => {
                tracing::warn!(entry = %requested, error = %e, "fuzzy CRM lookup failed");
                None
            }
        };
        cache.insert(key, found.clone());
        found
    }

    /// Geocodes and persists one matched entry, then advances the cursor.
    async fn process_entry(&self, entry: &MatchedEntry) -> Result<(), EntryError> {
        let partner = &entry.partner;
        let components = partner.address_components();
        let address = build_canonical_address(&components).unwrap_or_default();
        let postal_code = partner.postal_digits();

        let geo = self
            .geocoder
            .resolve(&address, postal_code.as_deref())
            .await?;

        let region = partner.region_code.clone().or_else(|| {
            geo.as_ref()
                .and_then(|g| g.normalized_region())
                .map(str::to_string)
        });
        let full_address = build_canonical_address(&AddressComponents {
            region: region.clone(),
            ..components.clone()
        });

        self.report_shared_address(partner, postal_code.as_deref())
            .await;

        let customer = NewCustomer {
            crm_partner_id: partner.id,
            name: partner.name.clone(),
            display_name: partner.display_name.clone(),
            phone: partner.phone.clone(),
            mobile: partner.mobile.clone(),
            email: partner.email.clone(),
            website: partner.website.clone(),
            street: partner.street.clone(),
            street_number: partner.street_number.clone(),
            district: partner.district.clone(),
            city: partner.city.clone(),
            state: region,
            zip: postal_code,
            country: components.country,
            full_address,
            latitude: geo.as_ref().map(|g| g.lat),
            longitude: geo.as_ref().map(|g| g.lng),
        };
        let customer_id = self.store.upsert_customer(&customer).await?;

        if !entry.equipment_raw.trim().is_empty() {
            let items = parse_equipment(&entry.equipment_raw);
            let written = self.store.replace_equipment(customer_id, &items).await?;
            tracing::debug!(customer_id, items = written, "equipment replaced");
        }

        self.store
            .save_cursor(Some(partner.id), Some(&entry.entry_name))
            .await?;

        tracing::info!(
            partner_id = partner.id,
            customer_id,
            geocoded = geo.is_some(),
            "customer synced"
        );
        Ok(())
    }

    /// Logs other stored customers sharing this partner's address. Never
    /// merges and never fails the entry.
    async fn report_shared_address(&self, partner: &CrmPartner, zip: Option<&str>) {
        let candidates = match self
            .store
            .find_address_candidates(
                partner.id,
                zip,
                partner.city.as_deref(),
                street_fragment(partner.street.as_deref()),
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    partner_id = partner.id,
                    error = %e,
                    "duplicate address check failed"
                );
                return;
            }
        };
        if candidates.is_empty() {
            return;
        }

        let names: HashSet<String> = candidates
            .iter()
            .flat_map(|c| [normalize_name(&c.name), normalize_name(&c.display_name)])
            .collect();
        let others: Vec<i64> = candidates.iter().map(|c| c.crm_partner_id).collect();
        if is_found(&partner.display_name, &names) {
            tracing::warn!(
                partner_id = partner.id,
                other_partner_ids = ?others,
                "possible duplicate customer at the same address"
            );
        } else {
            tracing::debug!(
                partner_id = partner.id,
                other_partner_ids = ?others,
                "address shared with other customers"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, name: &str) -> MatchedEntry {
        MatchedEntry {
            partner: CrmPartner {
                id,
                name: name.to_string(),
                display_name: name.to_string(),
                street: None,
                street_number: None,
                district: None,
                city: None,
                region_code: None,
                postal_code: None,
                country: None,
                phone: None,
                mobile: None,
                email: None,
                website: None,
                is_customer: true,
            },
            entry_name: name.to_string(),
            equipment_raw: String::new(),
        }
    }

    fn cursor(id: Option<i64>, name: Option<&str>) -> SyncCursorRow {
        SyncCursorRow {
            last_resolved_id: id,
            last_entry_name: name.map(str::to_string),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cursor_found_by_id_first() {
        let matched = vec![entry(1, "Padaria"), entry(2, "Mercado"), entry(3, "Oficina")];
        assert_eq!(cursor_position(&matched, &cursor(Some(2), Some("Oficina"))), Some(1));
    }

    #[test]
    fn cursor_falls_back_to_normalized_name() {
        let matched = vec![entry(1, "Padaria"), entry(2, "Mercado São José")];
        assert_eq!(
            cursor_position(&matched, &cursor(Some(99), Some("MERCADO SAO JOSE"))),
            Some(1)
        );
        assert_eq!(cursor_position(&matched, &cursor(None, Some("Oficina"))), None);
        assert_eq!(cursor_position(&matched, &cursor(None, None)), None);
    }

    #[test]
    fn street_fragment_uses_text_before_comma() {
        assert_eq!(street_fragment(Some("Rua das Flores, 10")), Some("Rua das Flores"));
        assert_eq!(street_fragment(Some("R. , 10")), None);
        assert_eq!(street_fragment(None), None);
    }

    #[test]
    fn default_cooldown_is_seven_hours() {
        assert_eq!(SyncSettings::default().cooldown, TimeDelta::hours(7));
    }

    #[test]
    fn totals_convert_to_run_counts() {
        let totals = PassTotals {
            entries: 5,
            matched: 3,
            unmatched: 2,
            processed: 2,
            failed: 1,
        };
        assert_eq!(
            totals.counts(),
            SyncRunCounts {
                entries_total: 5,
                matched: 3,
                unmatched: 2,
                processed: 2,
                failed: 1,
            }
        );
    }
}

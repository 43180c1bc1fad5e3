//! # Aggregation Coordinator
//!
//! Runs merge passes: for one group, bring each member's catalog up to date
//! as far as the trigger asks, merge every member catalog into the group's
//! aggregate, commit it and arm the group's next refresh.
//!
//! ## Per-member decisions
//!
//! | sync marker | force remote refresh | member | action |
//! |---|---|---|---|
//! | absent | any | hosted | full rebuild (scan) |
//! | absent | true | remote | full rebuild (scan), then write marker |
//! | present | true | remote | incremental update from the sync source |
//! | otherwise | | | nothing, merge what is there |
//!
//! A member is rebuilt or synced at most once per work item: the
//! `VisitedSet` travels with the work item through every group pass it
//! triggers. Visited members are still merged into each aggregate that
//! contains them, they are just not rebuilt again.
//!
//! ## Failure isolation
//!
//! A member whose catalog cannot be opened, scanned or synced is skipped:
//! the aggregate keeps whatever that member contributed before. Merge
//! failures are logged and the pass carries on. Only a failure to open the
//! group's own aggregate aborts the pass, leaving the committed aggregate
//! untouched. Every catalog opened during a pass is closed before the pass
//! returns; `Catalog`'s `Drop` covers unwinding.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::catalog_manager::CatalogManager;
use crate::registry::StoreRegistry;
use crate::remote::{RemoteSyncSource, UpdateKind};
use crate::scheduler::RefreshScheduler;
use crate::store::{RepositoryKey, RepositoryType};

/// Repositories already processed by the current work item
pub type VisitedSet = HashSet<RepositoryKey>;

/// What a work item did, for callers that want more than the log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Catalogs fully rebuilt from content
    pub scanned: Vec<RepositoryKey>,
    /// Remote catalogs updated from their sync source
    pub synced: Vec<RepositoryKey>,
    /// Remote catalogs the sync source reported as current
    pub up_to_date: Vec<RepositoryKey>,
    /// Members unavailable for this pass
    pub skipped: Vec<RepositoryKey>,
    /// Members merged into each group aggregate, in merge order
    pub merged: BTreeMap<RepositoryKey, Vec<RepositoryKey>>,
    /// Group aggregates committed
    pub committed: Vec<RepositoryKey>,
    /// Group passes abandoned before merging
    pub aborted: Vec<RepositoryKey>,
    /// Timers cancelled
    pub cancelled: Vec<RepositoryKey>,
}

impl PassReport {
    /// Members merged into `group`'s aggregate.
    pub fn merged_into(&self, group: &RepositoryKey) -> &[RepositoryKey] {
        self.merged.get(group).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        *self == PassReport::default()
    }
}

/// Mutable state carried through one work item
#[derive(Debug, Default)]
pub struct PassState {
    pub visited: VisitedSet,
    pub force_remote_refresh: bool,
    /// Repositories that must not be merged (deleted ones)
    pub excluded: HashSet<RepositoryKey>,
    pub report: PassReport,
}

impl PassState {
    pub fn new(force_remote_refresh: bool) -> Self {
        Self {
            force_remote_refresh,
            ..Self::default()
        }
    }
}

enum MemberState {
    Available,
    Unavailable,
}

/// Orchestrates scans and merge passes
pub struct AggregationCoordinator {
    registry: Arc<dyn StoreRegistry>,
    catalogs: CatalogManager,
    remote: Arc<dyn RemoteSyncSource>,
    scheduler: Arc<RefreshScheduler>,
}

impl AggregationCoordinator {
    pub fn new(
        registry: Arc<dyn StoreRegistry>,
        catalogs: CatalogManager,
        remote: Arc<dyn RemoteSyncSource>,
        scheduler: Arc<RefreshScheduler>,
    ) -> Self {
        Self {
            registry,
            catalogs,
            remote,
            scheduler,
        }
    }

    pub fn catalogs(&self) -> &CatalogManager {
        &self.catalogs
    }

    /// A write landed in `key`. Hosted repositories get their debounce
    /// timer armed; writes elsewhere are not indexed.
    pub fn content_written(&self, key: &RepositoryKey, path: &str) {
        if key.repo_type != RepositoryType::Hosted {
            debug!("Ignoring write to non-hosted repository: {} ({})", key, path);
            return;
        }

        if let Err(e) = self.registry.get(key) {
            error!("Failed to retrieve deploy-point for index update: {}. Reason: {}", key, e);
            return;
        }

        if let Err(e) = self.scheduler.schedule_hosted_refresh(&key.name) {
            error!("Failed to schedule index update for deploy-point: {}. Reason: {}", key, e);
        }
    }

    /// Repositories were added or changed.
    ///
    /// Groups get a forced merge pass. Hosted repositories are rescanned;
    /// every concrete repository then cascades to the groups containing it.
    pub fn repositories_added(&self, keys: &[RepositoryKey]) -> PassReport {
        let mut state = PassState::new(true);

        for key in keys {
            if let Err(e) = self.registry.get(key) {
                error!("Failed to update index for: {}. Reason: {}", key, e);
                continue;
            }

            if key.is_group() {
                if !state.visited.contains(key) {
                    self.update_merged(key, &mut state);
                }
                continue;
            }

            if key.repo_type == RepositoryType::Hosted && state.visited.insert(key.clone()) {
                self.scan_into(key, &mut state.report);
            }
            self.update_groups_for(key, &mut state);
        }

        state.report
    }

    /// Repositories of one type were deleted.
    ///
    /// Deleting groups only stops their refresh timers. Deleting concrete
    /// repositories re-merges every group that contained them so the
    /// aggregates drop their entries.
    pub fn repositories_deleted(&self, repo_type: RepositoryType, names: &[String]) -> PassReport {
        let mut state = PassState::new(true);

        if repo_type == RepositoryType::Group {
            for name in names {
                match self.scheduler.cancel_group_refresh(name) {
                    Ok(true) => state.report.cancelled.push(RepositoryKey::group(name)),
                    Ok(false) => {}
                    Err(e) => error!(
                        "Failed to cancel indexer trigger for group: {}. Reason: {}",
                        name, e
                    ),
                }
            }
            return state.report;
        }

        let deleted: Vec<RepositoryKey> = names
            .iter()
            .map(|name| RepositoryKey::new(repo_type, name))
            .collect();
        for key in &deleted {
            state.visited.insert(key.clone());
            state.excluded.insert(key.clone());
        }
        for key in &deleted {
            self.update_groups_for(key, &mut state);
        }

        state.report
    }

    /// A refresh timer fired for `key`.
    ///
    /// Hosted repositories are rescanned and the groups containing them
    /// re-merged. Groups get a merge pass without forced remote refresh.
    pub fn expired(&self, key: &RepositoryKey) -> PassReport {
        if let Err(e) = self.registry.get(key) {
            error!("Failed to update index for: {}. Reason: {}", key, e);
            return PassReport::default();
        }

        match key.repo_type {
            RepositoryType::Hosted => {
                let mut state = PassState::new(true);
                state.visited.insert(key.clone());
                self.scan_into(key, &mut state.report);
                self.update_groups_for(key, &mut state);
                state.report
            }
            RepositoryType::Group => {
                let mut state = PassState::new(false);
                self.update_merged(key, &mut state);
                state.report
            }
            RepositoryType::Remote => {
                debug!("No index refresh defined for expired remote repository: {}", key);
                PassReport::default()
            }
        }
    }

    /// Rebuild one repository's catalog from its content.
    pub fn scan_repository(&self, key: &RepositoryKey) -> PassReport {
        let mut report = PassReport::default();
        self.scan_into(key, &mut report);
        report
    }

    /// Run a merge pass for every not-yet-visited group containing `key`.
    pub fn update_groups_for(&self, key: &RepositoryKey, state: &mut PassState) {
        let groups = match self.registry.groups_containing(key) {
            Ok(groups) => groups,
            Err(e) => {
                error!("Failed to retrieve groups that contain: {}. Reason: {}", key, e);
                return;
            }
        };

        for group in groups {
            if state.visited.contains(&group) {
                continue;
            }
            self.update_merged(&group, state);
        }
    }

    /// One merge pass for `group`.
    pub fn update_merged(&self, group: &RepositoryKey, state: &mut PassState) {
        let Some(mut aggregate) = self.catalogs.open_or_log(group) else {
            state.report.aborted.push(group.clone());
            return;
        };

        let members = match self.registry.ordered_members(&group.name) {
            Ok(members) => members,
            Err(e) => {
                error!(
                    "Failed to retrieve ordered concrete stores in group: {}. Reason: {}",
                    group, e
                );
                state.report.aborted.push(group.clone());
                self.catalogs.close(aggregate);
                return;
            }
        };
        let members: Vec<RepositoryKey> = members
            .into_iter()
            .filter(|m| !state.excluded.contains(m))
            .collect();

        aggregate.retain_sources(&members.iter().cloned().collect());

        let mut merged = Vec::new();
        for member in &members {
            if state.visited.insert(member.clone()) {
                if let MemberState::Unavailable = self.refresh_member(member, state) {
                    state.report.skipped.push(member.clone());
                    continue;
                }
            }

            if !self.catalogs.catalog_exists(member) {
                continue;
            }
            match aggregate.merge_from(member, &self.catalogs.index_dir(member)) {
                Ok(_) => merged.push(member.clone()),
                Err(e) => error!(
                    "Failed to merge index from: {} into group index: {}. Reason: {}",
                    member, group, e
                ),
            }
        }
        state.report.merged.insert(group.clone(), merged);

        match aggregate.commit() {
            Ok(()) => state.report.committed.push(group.clone()),
            Err(e) => error!(
                "Failed to commit index updates for group: {}. Reason: {}",
                group, e
            ),
        }
        self.catalogs.close(aggregate);

        state.visited.insert(group.clone());

        if let Err(e) = self.scheduler.schedule_group_refresh(&group.name) {
            error!(
                "Failed to schedule indexer trigger for group: {}. Reason: {}",
                group.name, e
            );
        }
    }

    /// Bring a member's own catalog up to date as the pass requires.
    fn refresh_member(&self, member: &RepositoryKey, state: &mut PassState) -> MemberState {
        let synced = self.catalogs.has_sync_marker(member);
        let force = state.force_remote_refresh;
        let hosted = member.repo_type == RepositoryType::Hosted;
        let remote = member.repo_type == RepositoryType::Remote;

        let rebuild = !synced && (force || hosted);
        let incremental = synced && force && remote;
        if !rebuild && !incremental {
            return MemberState::Available;
        }

        let Some(mut catalog) = self.catalogs.open_or_log(member) else {
            return MemberState::Unavailable;
        };
        let outcome = if rebuild {
            self.rebuild(&mut catalog, &mut state.report)
        } else {
            self.sync_remote(&mut catalog, &mut state.report)
        };
        self.catalogs.close(catalog);
        outcome
    }

    fn scan_into(&self, key: &RepositoryKey, report: &mut PassReport) {
        let Some(mut catalog) = self.catalogs.open_or_log(key) else {
            report.skipped.push(key.clone());
            return;
        };
        if let MemberState::Unavailable = self.rebuild(&mut catalog, report) {
            report.skipped.push(key.clone());
        }
        self.catalogs.close(catalog);
    }

    fn rebuild(&self, catalog: &mut Catalog, report: &mut PassReport) -> MemberState {
        let key = catalog.key().clone();
        let count = match catalog.scan(self.catalogs.filter()) {
            Ok(count) => count,
            Err(e) => {
                error!("{}. While scanning, encountered error: {}", key, e);
                return MemberState::Unavailable;
            }
        };
        if let Err(e) = catalog.commit() {
            error!("{}", e);
            return MemberState::Unavailable;
        }
        info!("Scanned {} artifacts into index for: {}", count, key);

        if key.repo_type == RepositoryType::Remote {
            if let Some(timestamp) = catalog.timestamp() {
                if let Err(e) = self.catalogs.write_sync_marker(&key, timestamp) {
                    warn!("{}", e);
                }
            }
        }

        report.scanned.push(key);
        MemberState::Available
    }

    fn sync_remote(&self, catalog: &mut Catalog, report: &mut PassReport) -> MemberState {
        let key = catalog.key().clone();
        let current = catalog.timestamp();

        let update = match self.remote.fetch_catalog_update(&key, current) {
            Ok(update) => update,
            Err(e) => {
                error!("Failed to update index for: {}. Reason: {}", key, e);
                return MemberState::Unavailable;
            }
        };

        // An answer stamped with the catalog's own timestamp changes nothing.
        let same_point = update.timestamp.is_some() && update.timestamp == current;
        let full = match update.kind {
            UpdateKind::Full(entries) if !same_point => {
                catalog.replace_entries(entries);
                true
            }
            UpdateKind::Incremental { changed, removed } if !same_point => {
                catalog.apply_changes(changed, &removed);
                false
            }
            _ => {
                if update.timestamp != current {
                    debug!(
                        "Sync source for {} reported no changes at {}",
                        key,
                        display_timestamp(update.timestamp)
                    );
                }
                info!("NO index update for: {}. Index is up-to-date.", key);
                report.up_to_date.push(key);
                return MemberState::Available;
            }
        };

        if let Some(timestamp) = update.timestamp {
            catalog.set_next_timestamp(timestamp);
        }
        if let Err(e) = catalog.commit() {
            error!("Failed to update index for: {}. Reason: {}", key, e);
            return MemberState::Unavailable;
        }
        if let Some(timestamp) = catalog.timestamp() {
            if let Err(e) = self.catalogs.write_sync_marker(&key, timestamp) {
                warn!("{}", e);
            }
        }

        if full {
            info!("FULL index update completed for: {}", key);
        } else {
            info!(
                "INCREMENTAL index update completed for: {} to cover period: {} - {}",
                key,
                display_timestamp(current),
                display_timestamp(update.timestamp)
            );
        }
        report.synced.push(key);
        MemberState::Available
    }
}

fn display_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string())
}

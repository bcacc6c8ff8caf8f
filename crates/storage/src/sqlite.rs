use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, params, params_from_iter};
use serde::Serialize;

use agrodesk_core::{
    Engagement, EngagementFilter, EngagementId, EngagementStats, Hlc, LeadStage, Record,
    StageChange, StageTransition, StaffId, Validate,
    hlc::HlcClock,
    ids::{AuditId, RecordId, TransitionId},
};

use crate::error::StorageError;
use crate::tables::{
    Column, Columns, SqlTable, blob, hlc_value, opt_blob, opt_real, opt_text, read_hlc, read_id,
    read_opt_id, read_stage, to_array,
};
use crate::traits::{AuditAction, AuditEntry, Gateway, Storage};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct SqliteStorage {
    conn: Connection,
    clock: HlcClock,
    actor: Option<StaffId>,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        crate::schema::init_schema(&conn, busy_timeout)?;
        tracing::debug!(path = %path.as_ref().display(), "opened database");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn, DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            clock: HlcClock::new(),
            actor: None,
        }
    }

    fn tick(&mut self) -> Result<Hlc, StorageError> {
        Ok(self.clock.tick()?)
    }
}

fn where_clause(columns: &[Column]) -> String {
    if columns.is_empty() {
        return String::new();
    }
    let predicates: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{name} = ?{}", i + 1))
        .collect();
    format!(" WHERE {}", predicates.join(" AND "))
}

fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(payload).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn append_audit(
    tx: &Transaction,
    table: &str,
    record_id: &[u8; 16],
    action: AuditAction,
    actor: Option<StaffId>,
    at: &Hlc,
    payload: Option<Vec<u8>>,
) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO audit_log (audit_id, table_name, record_id, action, actor_id, at, payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            AuditId::new().as_bytes().as_slice(),
            table,
            record_id.as_slice(),
            action.as_str(),
            opt_blob(actor),
            &at.to_bytes()[..],
            payload,
        ],
    )?;
    Ok(())
}

fn fetch_by_id<R: SqlTable>(conn: &Connection, id: &R::Id) -> Result<Option<R>, StorageError> {
    let sql = format!("SELECT * FROM {} WHERE id = ?1", R::TABLE);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id.as_bytes().as_slice()])?;
    match rows.next()? {
        Some(row) => Ok(Some(R::from_row(row)?)),
        None => Ok(None),
    }
}

fn not_found<R: Record>(id: &R::Id) -> StorageError {
    StorageError::NotFound {
        table: R::TABLE,
        id: id.to_string(),
    }
}

impl<R: SqlTable> Gateway<R> for SqliteStorage {
    fn get_all(&self, filter: &R::Filter) -> Result<Vec<R>, StorageError> {
        let predicates = R::filter_columns(filter);
        let sql = format!(
            "SELECT * FROM {}{} ORDER BY {}",
            R::TABLE,
            where_clause(&predicates),
            R::ORDER_BY
        );
        tracing::debug!(table = R::TABLE, predicates = predicates.len(), "get_all");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(predicates.iter().map(|(_, v)| v)))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(R::from_row(row)?);
        }
        Ok(result)
    }

    fn get_by_id(&self, id: R::Id) -> Result<Option<R>, StorageError> {
        fetch_by_id::<R>(&self.conn, &id)
    }

    fn create(&mut self, draft: R::Draft) -> Result<R, StorageError> {
        draft.validate()?;
        let id = R::Id::generate();
        let hlc = self.tick()?;
        let actor = self.actor;
        let payload = encode_payload(&draft)?;

        let mut columns = vec![("id", blob(&id))];
        columns.extend(R::draft_columns(&draft));
        columns.push(("created_at", hlc_value(&hlc)));
        columns.push(("updated_at", hlc_value(&hlc)));

        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            names.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.transaction()?;
        tx.execute(&sql, params_from_iter(columns.iter().map(|(_, v)| v)))
            .map_err(StorageError::from_write)?;
        append_audit(&tx, R::TABLE, id.as_bytes(), AuditAction::Create, actor, &hlc, Some(payload))?;
        let record = fetch_by_id::<R>(&tx, &id)?.ok_or_else(|| not_found::<R>(&id))?;
        tx.commit()?;

        tracing::debug!(table = R::TABLE, id = %id, "created");
        Ok(record)
    }

    fn update(&mut self, id: R::Id, patch: R::Patch) -> Result<R, StorageError> {
        patch.validate()?;
        let mut columns = R::patch_columns(&patch);
        if columns.is_empty() {
            return fetch_by_id::<R>(&self.conn, &id)?.ok_or_else(|| not_found::<R>(&id));
        }
        let hlc = self.tick()?;
        let actor = self.actor;
        let payload = encode_payload(&patch)?;

        columns.push(("updated_at", hlc_value(&hlc)));
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{name} = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}, version = version + 1 WHERE id = ?{}",
            R::TABLE,
            assignments.join(", "),
            columns.len() + 1
        );
        columns.push(("id", blob(&id)));

        let tx = self.conn.transaction()?;
        let changed = tx
            .execute(&sql, params_from_iter(columns.iter().map(|(_, v)| v)))
            .map_err(StorageError::from_write)?;
        if changed == 0 {
            return Err(not_found::<R>(&id));
        }
        append_audit(&tx, R::TABLE, id.as_bytes(), AuditAction::Update, actor, &hlc, Some(payload))?;
        let record = fetch_by_id::<R>(&tx, &id)?.ok_or_else(|| not_found::<R>(&id))?;
        tx.commit()?;

        tracing::debug!(table = R::TABLE, id = %id, "updated");
        Ok(record)
    }

    fn delete(&mut self, id: R::Id) -> Result<(), StorageError> {
        let hlc = self.tick()?;
        let actor = self.actor;
        let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE);

        let tx = self.conn.transaction()?;
        let changed = tx
            .execute(&sql, params![id.as_bytes().as_slice()])
            .map_err(StorageError::from_write)?;
        if changed == 0 {
            return Err(not_found::<R>(&id));
        }
        append_audit(&tx, R::TABLE, id.as_bytes(), AuditAction::Delete, actor, &hlc, None)?;
        tx.commit()?;

        tracing::debug!(table = R::TABLE, id = %id, "deleted");
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn set_actor(&mut self, actor: Option<StaffId>) {
        self.actor = actor;
    }

    fn actor(&self) -> Option<StaffId> {
        self.actor
    }

    fn apply_stage_change(&mut self, change: &StageChange) -> Result<Engagement, StorageError> {
        change.validate()?;
        let hlc = self.tick()?;
        let actor = change.actor.or(self.actor);
        let id = change.engagement_id;

        let mut columns = Columns::new()
            .set("lead_stage", change.to.as_str().to_string())
            .set("is_active", change.is_active)
            .maybe("total_purchases", change.total_purchases.map(opt_real))
            .maybe("closure_reason", change.closure_reason.clone().map(opt_text))
            .set("updated_at", hlc_value(&hlc))
            .into_vec();
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{name} = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE engagements SET {}, version = version + 1 WHERE id = ?{} AND version = ?{}",
            assignments.join(", "),
            columns.len() + 1,
            columns.len() + 2
        );
        columns.push(("id", blob(&id)));
        columns.push(("version", Value::Integer(change.expected_version)));

        let tx = self.conn.transaction()?;
        let changed = tx
            .execute(&sql, params_from_iter(columns.iter().map(|(_, v)| v)))
            .map_err(StorageError::from_write)?;
        if changed == 0 {
            let exists = fetch_by_id::<Engagement>(&tx, &id)?.is_some();
            return Err(if exists {
                StorageError::VersionConflict {
                    table: Engagement::TABLE,
                    id: id.to_string(),
                    expected: change.expected_version,
                }
            } else {
                not_found::<Engagement>(&id)
            });
        }

        if change.moves_stage() {
            tx.execute(
                "INSERT INTO stage_transitions (id, engagement_id, from_stage, to_stage, actor_id, reason, at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    TransitionId::new().as_bytes().as_slice(),
                    id.as_bytes().as_slice(),
                    change.from.as_str(),
                    change.to.as_str(),
                    opt_blob(actor),
                    change.reason.as_deref(),
                    &hlc.to_bytes()[..],
                ],
            )?;
        }
        append_audit(
            &tx,
            Engagement::TABLE,
            id.as_bytes(),
            AuditAction::StageChange,
            actor,
            &hlc,
            None,
        )?;
        let record = fetch_by_id::<Engagement>(&tx, &id)?.ok_or_else(|| not_found::<Engagement>(&id))?;
        tx.commit()?;

        tracing::debug!(id = %id, from = %change.from, to = %change.to, "stage change applied");
        Ok(record)
    }

    fn stage_history(&self, engagement_id: EngagementId) -> Result<Vec<StageTransition>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, engagement_id, from_stage, to_stage, actor_id, reason, at FROM stage_transitions WHERE engagement_id = ?1 ORDER BY at",
        )?;
        let mut rows = stmt.query(params![engagement_id.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(StageTransition {
                id: read_id(row, "id")?,
                engagement_id: read_id(row, "engagement_id")?,
                from_stage: read_stage(row, "from_stage")?,
                to_stage: read_stage(row, "to_stage")?,
                actor: read_opt_id(row, "actor_id")?,
                reason: row.get("reason")?,
                at: read_hlc(row, "at")?,
            });
        }
        Ok(result)
    }

    fn engagement_stats(&self, filter: &EngagementFilter) -> Result<EngagementStats, StorageError> {
        let predicates = Engagement::filter_columns(filter);
        let sql = format!(
            "SELECT lead_stage, is_active, COUNT(*), COALESCE(SUM(total_purchases), 0.0) FROM engagements{} GROUP BY lead_stage, is_active",
            where_clause(&predicates)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(predicates.iter().map(|(_, v)| v)))?;

        let mut stats = EngagementStats::default();
        let mut by_stage: BTreeMap<LeadStage, u64> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let stage = read_stage(row, "lead_stage")?;
            let is_active: bool = row.get(1)?;
            let count: i64 = row.get(2)?;
            let purchases: f64 = row.get(3)?;
            let count = count as u64;

            stats.total += count;
            if is_active {
                stats.active += count;
            } else {
                stats.inactive += count;
            }
            stats.total_purchases += purchases;
            *by_stage.entry(stage).or_default() += count;
        }
        stats.by_stage = by_stage;
        Ok(stats)
    }

    fn audit_entries(
        &self,
        table: &str,
        record_id: &[u8; 16],
    ) -> Result<Vec<AuditEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT audit_id, table_name, record_id, action, actor_id, at, payload FROM audit_log WHERE table_name = ?1 AND record_id = ?2 ORDER BY rowid",
        )?;
        let mut rows = stmt.query(params![table, record_id.as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let record_id: Vec<u8> = row.get("record_id")?;
            let action: String = row.get("action")?;
            result.push(AuditEntry {
                audit_id: read_id(row, "audit_id")?,
                table: row.get("table_name")?,
                record_id: to_array::<16>(record_id, "record_id")?,
                action: AuditAction::parse(&action)?,
                actor: read_opt_id(row, "actor_id")?,
                at: read_hlc(row, "at")?,
                payload: row.get("payload")?,
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use agrodesk_core::{
        Area, AreaDraft, AreaFilter, AreaPatch, DataSource, EngagementDraft, Farmer, FarmerDraft,
        FarmerFilter, LeadQuality, Product, ProductDraft, Zone, ZoneDraft, ZoneFilter,
    };

    use super::*;

    fn zone(storage: &mut SqliteStorage, code: &str, active: bool) -> Zone {
        storage
            .create(ZoneDraft {
                code: code.into(),
                name: format!("Zone {code}"),
                description: None,
                is_active: active,
            })
            .unwrap()
    }

    fn engagement(storage: &mut SqliteStorage) -> Engagement {
        let farmer: Farmer = storage.create(FarmerDraft::new("Ravi", "9876543210")).unwrap();
        let product: Product = storage
            .create(ProductDraft {
                code: "SEED-1".into(),
                name: "Hybrid Maize".into(),
                category: Some("seed".into()),
                unit: Some("kg".into()),
                is_active: true,
            })
            .unwrap();
        storage
            .create(EngagementDraft::new(farmer.id, product.id, "Rabi 2026", DataSource::Campaign))
            .unwrap()
    }

    #[test]
    fn create_then_read_back() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let created = zone(&mut storage, "N1", true);
        let fetched: Option<Zone> = storage.get_by_id(created.id).unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[test]
    fn filters_are_equality_predicates() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let north = zone(&mut storage, "N1", true);
        let south = zone(&mut storage, "S1", false);
        for (code, zone_id) in [("A1", north.id), ("A2", north.id), ("A3", south.id)] {
            let _: Area = storage
                .create(AreaDraft {
                    zone_id,
                    code: code.into(),
                    name: format!("Area {code}"),
                    description: None,
                    is_active: true,
                })
                .unwrap();
        }

        let active: Vec<Zone> = storage.get_all(&ZoneFilter { is_active: Some(true) }).unwrap();
        assert_eq!(active.len(), 1);
        let in_north: Vec<Area> = storage
            .get_all(&AreaFilter {
                zone_id: Some(north.id),
                is_active: None,
            })
            .unwrap();
        assert_eq!(in_north.len(), 2);
        let all: Vec<Area> = storage.get_all(&AreaFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn update_bumps_timestamp_and_clears_nullable_fields() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let z = zone(&mut storage, "N1", true);
        let area: Area = storage
            .create(AreaDraft {
                zone_id: z.id,
                code: "A1".into(),
                name: "Old".into(),
                description: Some("to clear".into()),
                is_active: true,
            })
            .unwrap();
        let updated: Area = storage
            .update(
                area.id,
                AreaPatch {
                    name: Some("New".into()),
                    description: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "New");
        assert_eq!(updated.description, None);
        assert_eq!(updated.code, "A1");
        assert!(updated.updated_at > area.updated_at);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let missing = agrodesk_core::ZoneId::new();
        let err = Gateway::<Zone>::delete(&mut storage, missing).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { table: "zones", .. }));
        let err = Gateway::<Zone>::update(
            &mut storage,
            missing,
            agrodesk_core::ZonePatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn duplicate_codes_and_dangling_parents_are_constraint_violations() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let z = zone(&mut storage, "N1", true);
        let dup: Result<Zone, _> = storage.create(ZoneDraft {
            code: "N1".into(),
            name: "Again".into(),
            description: None,
            is_active: true,
        });
        assert!(matches!(dup, Err(StorageError::ConstraintViolation(_))));

        let _: Area = storage
            .create(AreaDraft {
                zone_id: z.id,
                code: "A1".into(),
                name: "Child".into(),
                description: None,
                is_active: true,
            })
            .unwrap();
        let err = Gateway::<Zone>::delete(&mut storage, z.id).unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
    }

    #[test]
    fn invalid_drafts_never_reach_the_table() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let mut draft = FarmerDraft::new("Ravi", "12");
        draft.lead_quality = Some(LeadQuality::Hot);
        let err = Gateway::<Farmer>::create(&mut storage, draft).unwrap_err();
        assert_eq!(err.code(), "validation");
        let all: Vec<Farmer> = storage.get_all(&FarmerFilter::default()).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn audit_log_records_actor_and_payload() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let actor = StaffId::new();
        storage.set_actor(Some(actor));
        let z = zone(&mut storage, "N1", true);
        let entries = storage.audit_entries("zones", z.id.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Create);
        assert_eq!(entries[0].actor, Some(actor));
        let draft: ZoneDraft = entries[0].decode_payload().unwrap().unwrap();
        assert_eq!(draft.code, "N1");
    }

    #[test]
    fn stage_change_is_conditional_on_version() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let e = engagement(&mut storage);
        let change = StageChange {
            engagement_id: e.id,
            expected_version: e.version,
            from: e.lead_stage,
            to: LeadStage::Contacted,
            is_active: true,
            total_purchases: None,
            closure_reason: None,
            actor: None,
            reason: Some("first call".into()),
        };
        let moved = storage.apply_stage_change(&change).unwrap();
        assert_eq!(moved.lead_stage, LeadStage::Contacted);
        assert_eq!(moved.version, e.version + 1);

        // Same change computed against the old version loses.
        let err = storage.apply_stage_change(&change).unwrap_err();
        assert!(matches!(err, StorageError::VersionConflict { .. }));

        let history = storage.stage_history(e.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_stage, LeadStage::New);
        assert_eq!(history[0].reason.as_deref(), Some("first call"));
    }

    #[test]
    fn stats_group_by_stage_and_activity() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let e = engagement(&mut storage);
        storage
            .apply_stage_change(&StageChange {
                engagement_id: e.id,
                expected_version: e.version,
                from: e.lead_stage,
                to: LeadStage::Converted,
                is_active: false,
                total_purchases: Some(Some(250.0)),
                closure_reason: None,
                actor: None,
                reason: None,
            })
            .unwrap();
        let stats = storage.engagement_stats(&EngagementFilter::default()).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.inactive, 1);
        assert_eq!(stats.count(LeadStage::Converted), 1);
        assert!((stats.total_purchases - 250.0).abs() < f64::EPSILON);

        let none = storage
            .engagement_stats(&EngagementFilter {
                season: Some("Kharif 1999".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[test]
    fn file_backed_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agrodesk.db");
        let id = {
            let mut storage = SqliteStorage::open(&path).unwrap();
            zone(&mut storage, "N1", true).id
        };
        let storage = SqliteStorage::open(&path).unwrap();
        let zone: Option<Zone> = storage.get_by_id(id).unwrap();
        assert_eq!(zone.map(|z| z.code), Some("N1".to_string()));
    }
}

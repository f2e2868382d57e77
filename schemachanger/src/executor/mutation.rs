// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Applying a stage's metadata mutations inside one catalog transaction
//!
//! Each mutation first compares the catalog with the transition it belongs
//! to. An element this run already moved to the target status was written by
//! an earlier attempt whose checkpoint was lost, and is left alone. An id
//! held by another run, or by a different element, is a collision: the run
//! was planned against a catalog that changed underneath it. Any other
//! status at neither end of the transition means the catalog and the
//! checkpoint disagree, which is an internal error.

use crate::catalog::{CatalogSnapshot, CatalogTxn, TableDescriptor};
use crate::element::{Element, ElementKey, ElementKind, Status, TableId};
use crate::error::{SchemaChangeError, SchemaResult};
use crate::jobs::RunId;
use crate::scheduler::{MutationOp, Stage, Transition};
use std::collections::BTreeMap;

/// Status of `key` in `snapshot`, absent when the element or table is missing
pub fn catalog_status(snapshot: &CatalogSnapshot, key: &ElementKey) -> Status {
    snapshot
        .table(key.table_id)
        .and_then(|t| t.element_status(key))
        .map(|(status, _)| status)
        .unwrap_or(Status::Absent)
}

/// Whether `run_id` already committed every transition of `stage`
pub fn stage_applied(snapshot: &CatalogSnapshot, run_id: RunId, stage: &Stage) -> bool {
    let mutations: Vec<&MutationOp> = stage.mutations().collect();
    mutations.len() == stage.transitions.len()
        && stage
            .transitions
            .iter()
            .zip(mutations)
            .all(|(t, m)| already_applied(snapshot.table(t.key.table_id), run_id, t, m))
}

/// Whether `mutation` took effect in `table` on behalf of `run_id`
///
/// Intermediate statuses count only while the run owns the element. An
/// element added straight to a terminal status must be the one planned.
fn already_applied(
    table: Option<&TableDescriptor>,
    run_id: RunId,
    transition: &Transition,
    mutation: &MutationOp,
) -> bool {
    let found = table.and_then(|t| t.element_status(&transition.key));
    match found {
        None => transition.to == Status::Absent,
        Some((status, _)) if status != transition.to => false,
        Some((_, Some(owner))) => owner == run_id,
        Some((_, None)) => match mutation {
            MutationOp::AddElement { element, .. } => {
                table.and_then(|t| t.element_name(&transition.key)) == Some(element.name())
            }
            _ => matches!(transition.to, Status::Public | Status::Absent),
        },
    }
}

// Tables are created before anything is added to them and removed after
// everything else.
fn apply_order(mutation: &MutationOp) -> u8 {
    match mutation {
        MutationOp::AddElement {
            element: Element::Table(_),
            ..
        } => 0,
        MutationOp::RemoveElement { key } if key.kind == ElementKind::Table => 2,
        _ => 1,
    }
}

/// Descriptors read and written by one stage
struct StageWriter<'t, 'a> {
    txn: &'t mut CatalogTxn<'a>,
    run_id: RunId,
    tables: BTreeMap<TableId, Option<TableDescriptor>>,
    dirty: Vec<TableId>,
}

impl<'t, 'a> StageWriter<'t, 'a> {
    fn table(&mut self, id: TableId) -> SchemaResult<Option<&mut TableDescriptor>> {
        if !self.tables.contains_key(&id) {
            let loaded = self.txn.get_table(id)?;
            self.tables.insert(id, loaded);
        }
        Ok(self.tables.get_mut(&id).and_then(Option::as_mut))
    }

    fn mark_dirty(&mut self, id: TableId) {
        if !self.dirty.contains(&id) {
            self.dirty.push(id);
        }
    }

    fn apply(&mut self, transition: &Transition, mutation: &MutationOp) -> SchemaResult<bool> {
        let key = transition.key;
        let run_id = self.run_id;
        let table = self.table(key.table_id)?.map(|t| &*t);
        if already_applied(table, run_id, transition, mutation) {
            log::debug!("{} already at {}", key, transition.to);
            return Ok(false);
        }
        let (current, holder) = table
            .and_then(|t| t.element_status(&key))
            .unwrap_or((Status::Absent, None));
        if let Some(other) = holder.filter(|owner| *owner != run_id) {
            return Err(SchemaChangeError::Collision(format!(
                "{} is being changed by schema change {}",
                key, other
            )));
        }
        if current != transition.from {
            if let MutationOp::AddElement { element, .. } = mutation {
                return Err(SchemaChangeError::Collision(format!(
                    "{} is already taken, cannot add \"{}\" under that id",
                    key,
                    element.name()
                )));
            }
            return Err(SchemaChangeError::Internal(format!(
                "{} is {} in the catalog, expected {}",
                key, current, transition.from
            )));
        }

        let owner = match transition.to {
            Status::Public | Status::Absent => None,
            _ => Some(run_id),
        };
        match mutation {
            MutationOp::AddElement {
                element: Element::Table(table),
                status,
            } => {
                self.tables.insert(
                    table.table_id,
                    Some(TableDescriptor::new(table.table_id, table.name.clone(), *status, owner)),
                );
                self.txn.reserve_table_id(table.table_id)?;
            }
            MutationOp::AddElement { element, status } => {
                self.require(key)?.add_element(element, *status, owner)?;
            }
            MutationOp::SetStatus { key, status } => {
                self.require(*key)?.set_element_status(key, *status, owner)?;
            }
            MutationOp::RemoveElement { key } if key.kind == ElementKind::Table => {
                self.tables.insert(key.table_id, None);
            }
            MutationOp::RemoveElement { key } => {
                self.require(*key)?.remove_element(key)?;
            }
        }
        self.mark_dirty(key.table_id);
        Ok(true)
    }

    fn require(&mut self, key: ElementKey) -> SchemaResult<&mut TableDescriptor> {
        self.table(key.table_id)?.ok_or_else(|| {
            SchemaChangeError::Internal(format!("table of {} is missing from the catalog", key))
        })
    }

    fn finish(self) -> SchemaResult<()> {
        for id in &self.dirty {
            match self.tables.get(id) {
                Some(Some(desc)) => self.txn.put_table(desc)?,
                _ => self.txn.delete_table(*id)?,
            }
        }
        Ok(())
    }
}

/// Write the mutations of `stage` into `txn`
///
/// Returns how many mutations changed the catalog.
pub fn apply_mutations(txn: &mut CatalogTxn<'_>, run_id: RunId, stage: &Stage) -> SchemaResult<usize> {
    let mut pairs: Vec<(&Transition, &MutationOp)> =
        stage.transitions.iter().zip(stage.mutations()).collect();
    if pairs.len() != stage.transitions.len() {
        return Err(SchemaChangeError::Internal(format!(
            "stage {} has {} transition(s) but {} mutation(s)",
            stage.ordinal,
            stage.transitions.len(),
            pairs.len()
        )));
    }
    pairs.sort_by_key(|(_, m)| apply_order(m));

    let mut writer = StageWriter {
        txn,
        run_id,
        tables: BTreeMap::new(),
        dirty: Vec::new(),
    };
    let mut applied = 0;
    for (transition, mutation) in pairs {
        if writer.apply(transition, mutation)? {
            applied += 1;
        }
    }
    writer.finish()?;
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{self, test_support, Statement};
    use crate::catalog::CatalogStore;
    use crate::config::ClusterSettings;
    use crate::scheduler::{Phase, Plan};
    use crate::storage::{MemoryStorageDriver, StorageDriver};

    fn seeded_store() -> CatalogStore {
        let driver = MemoryStorageDriver::new();
        let store = CatalogStore::new(driver.open_tree("catalog").unwrap());
        let mut txn = store.begin();
        for table in test_support::shop().tables() {
            txn.put_table(table).unwrap();
            txn.reserve_table_id(table.id).unwrap();
        }
        txn.commit().unwrap();
        store
    }

    fn plan(store: &CatalogStore, stmt: &Statement) -> Plan {
        let snapshot = store.snapshot().unwrap();
        let state = builder::build(stmt, &snapshot, &ClusterSettings::default()).unwrap();
        Plan::compute(&state, Phase::Statement).unwrap()
    }

    #[test]
    fn test_reapplying_a_stage_is_a_no_op() {
        let store = seeded_store();
        let stmt = Statement::CreateIndex(builder::CreateIndex {
            table: "orders".into(),
            name: "orders_total_idx".into(),
            columns: vec!["total".into()],
            unique: false,
            if_not_exists: false,
        });
        let plan = plan(&store, &stmt);
        let run = RunId::new();
        let stage = &plan.stages[0];

        let mut txn = store.begin();
        assert_eq!(apply_mutations(&mut txn, run, stage).unwrap(), 1);
        txn.commit().unwrap();
        let snapshot = store.snapshot().unwrap();
        assert!(stage_applied(&snapshot, run, stage));
        assert!(!stage_applied(&snapshot, RunId::new(), stage));
        let key = stage.transitions[0].key;
        let (status, owner) = snapshot.table(key.table_id).unwrap().element_status(&key).unwrap();
        assert_eq!(status, Status::DeleteOnly);
        assert_eq!(owner, Some(run));

        let mut txn = store.begin();
        assert_eq!(apply_mutations(&mut txn, run, stage).unwrap(), 0);
        assert!(!txn.has_writes());
    }

    #[test]
    fn test_stage_of_another_run_collides() {
        let store = seeded_store();
        let stmt = Statement::CreateIndex(builder::CreateIndex {
            table: "orders".into(),
            name: "orders_total_idx".into(),
            columns: vec!["total".into()],
            unique: false,
            if_not_exists: false,
        });
        let plan = plan(&store, &stmt);
        let stage = &plan.stages[0];
        let mut txn = store.begin();
        apply_mutations(&mut txn, RunId::new(), stage).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin();
        let err = apply_mutations(&mut txn, RunId::new(), stage).unwrap_err();
        assert!(matches!(err, SchemaChangeError::Collision(_)), "{err}");
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_table_with_another_name_collides() {
        let store = seeded_store();
        let create = |name: &str| {
            Statement::CreateTable(builder::CreateTable {
                name: name.into(),
                columns: vec![builder::ColumnDef::new("id", crate::eval::ColumnType::Int8).not_null()],
                primary_key: vec!["id".into()],
                checks: vec![],
                if_not_exists: false,
            })
        };
        let alpha = plan(&store, &create("alpha"));
        let beta = plan(&store, &create("beta"));

        let mut txn = store.begin();
        apply_mutations(&mut txn, RunId::new(), &alpha.stages[0]).unwrap();
        txn.commit().unwrap();
        let snapshot = store.snapshot().unwrap();
        assert!(!stage_applied(&snapshot, RunId::new(), &beta.stages[0]));

        let mut txn = store.begin();
        let err = apply_mutations(&mut txn, RunId::new(), &beta.stages[0]).unwrap_err();
        assert!(err.to_string().contains("beta"), "{err}");
    }

    #[test]
    fn test_out_of_order_stage_is_rejected() {
        let store = seeded_store();
        let stmt = Statement::CreateIndex(builder::CreateIndex {
            table: "orders".into(),
            name: "orders_total_idx".into(),
            columns: vec!["total".into()],
            unique: false,
            if_not_exists: false,
        });
        let plan = plan(&store, &stmt);
        let mut txn = store.begin();
        let err = apply_mutations(&mut txn, RunId::new(), &plan.stages[2]).unwrap_err();
        assert!(matches!(err, SchemaChangeError::Internal(_)), "{err}");
    }

    #[test]
    fn test_create_and_drop_table() {
        let store = seeded_store();
        let create = Statement::CreateTable(builder::CreateTable {
            name: "notes".into(),
            columns: vec![builder::ColumnDef::new("id", crate::eval::ColumnType::Int8).not_null()],
            primary_key: vec!["id".into()],
            checks: vec![],
            if_not_exists: false,
        });
        let plan = plan(&store, &create);
        assert_eq!(plan.len(), 1);
        let mut txn = store.begin();
        apply_mutations(&mut txn, RunId::new(), &plan.stages[0]).unwrap();
        txn.commit().unwrap();
        let snapshot = store.snapshot().unwrap();
        let notes = snapshot.table_by_name("notes").unwrap();
        assert_eq!(notes.status, Status::Public);
        assert_eq!(notes.owner, None);
        assert!(notes.primary_index.is_some());
        let notes_id = notes.id;

        let drop = Statement::DropTable(builder::DropTable {
            name: "notes".into(),
            if_exists: false,
            cascade: false,
        });
        let run = RunId::new();
        for stage in &plan_stages(&store, &drop) {
            let mut txn = store.begin();
            apply_mutations(&mut txn, run, stage).unwrap();
            txn.commit().unwrap();
        }
        assert!(store.table(notes_id).unwrap().is_none());
    }

    fn plan_stages(store: &CatalogStore, stmt: &Statement) -> Vec<Stage> {
        plan(store, stmt).stages
    }
}

//! Order/table drift detection and table-side repair
//!
//! Compound operations never roll back, so a crash or a failed second step
//! can leave a table pointing at the wrong order. `check_consistency`
//! reports every such case; `repair_consistency` rewrites the table side.
//! Orders are never modified by a repair.

use serde::Serialize;
use shared::models::{DiningTableUpdate, OrderStatus, TableStatus};
use std::collections::HashMap;

use super::Coordinator;

/// One broken order/table relationship
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Drift {
    /// `occupied` without an `orderId`
    OccupiedWithoutOrder { table_id: i64, number: u32 },
    /// `orderId` on a table that is not `occupied`
    OrderOnFreeTable {
        table_id: i64,
        number: u32,
        order_id: String,
    },
    /// `orderId` naming an order that does not exist
    DanglingOrder {
        table_id: i64,
        number: u32,
        order_id: String,
    },
    /// `orderId` naming a cancelled order
    CancelledOrder {
        table_id: i64,
        number: u32,
        order_id: String,
    },
    /// Several tables referencing one order
    SharedOrder { order_id: String, table_ids: Vec<i64> },
    /// Live order whose (free) table does not reference it
    UnlinkedLiveOrder { order_id: String, table_number: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub tables_checked: usize,
    pub orders_checked: usize,
    pub issues: Vec<Drift>,
    /// Issues fixed by the run that produced this report
    pub repaired: usize,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl Coordinator {
    /// Report drift without touching any store
    pub fn check_consistency(&self) -> ConsistencyReport {
        let tables = self.tables.all();
        let orders = self.orders.all();
        let by_id: HashMap<&str, _> = orders.iter().map(|o| (o.id.as_str(), o)).collect();
        let mut issues = Vec::new();
        let mut holders: HashMap<&str, Vec<i64>> = HashMap::new();

        for table in &tables {
            match (&table.order_id, table.status) {
                (None, TableStatus::Occupied) => issues.push(Drift::OccupiedWithoutOrder {
                    table_id: table.id,
                    number: table.number,
                }),
                (None, _) => {}
                (Some(order_id), status) => {
                    holders.entry(order_id.as_str()).or_default().push(table.id);
                    let drift = if status != TableStatus::Occupied {
                        Some(Drift::OrderOnFreeTable {
                            table_id: table.id,
                            number: table.number,
                            order_id: order_id.clone(),
                        })
                    } else {
                        match by_id.get(order_id.as_str()) {
                            None => Some(Drift::DanglingOrder {
                                table_id: table.id,
                                number: table.number,
                                order_id: order_id.clone(),
                            }),
                            Some(order) if order.status == OrderStatus::Cancelled => {
                                Some(Drift::CancelledOrder {
                                    table_id: table.id,
                                    number: table.number,
                                    order_id: order_id.clone(),
                                })
                            }
                            Some(_) => None,
                        }
                    };
                    issues.extend(drift);
                }
            }
        }

        for (order_id, table_ids) in &holders {
            if table_ids.len() > 1 {
                issues.push(Drift::SharedOrder {
                    order_id: order_id.to_string(),
                    table_ids: table_ids.clone(),
                });
            }
        }

        for order in orders.iter().filter(|o| o.is_live()) {
            if holders.contains_key(order.id.as_str()) {
                continue;
            }
            let free_table = tables
                .iter()
                .find(|t| t.number == order.table_number)
                .is_some_and(|t| t.order_id.is_none() && t.status != TableStatus::Occupied);
            if free_table {
                issues.push(Drift::UnlinkedLiveOrder {
                    order_id: order.id.clone(),
                    table_number: order.table_number,
                });
            }
        }

        if !issues.is_empty() {
            tracing::warn!(count = issues.len(), "Order/table drift detected");
        }
        ConsistencyReport {
            tables_checked: tables.len(),
            orders_checked: orders.len(),
            issues,
            repaired: 0,
        }
    }

    /// Detect drift, then fix the table side of every issue
    pub fn repair_consistency(&self) -> ConsistencyReport {
        let mut report = self.check_consistency();

        for issue in &report.issues {
            let fixed = match issue {
                Drift::OrderOnFreeTable { table_id, .. } => self
                    .tables
                    .apply(*table_id, DiningTableUpdate::default(), Some(None))
                    .is_ok(),
                Drift::OccupiedWithoutOrder { table_id, .. }
                | Drift::DanglingOrder { table_id, .. }
                | Drift::CancelledOrder { table_id, .. } => self.free_table(*table_id),
                Drift::SharedOrder { order_id, table_ids } => {
                    let keep = self.orders.get(order_id).map(|o| o.table_number);
                    table_ids
                        .iter()
                        .filter_map(|id| self.tables.get(*id))
                        .filter(|t| Some(t.number) != keep)
                        .all(|t| self.free_table(t.id))
                }
                Drift::UnlinkedLiveOrder {
                    order_id,
                    table_number,
                } => {
                    let customers = self.orders.get(order_id).map(|o| o.customers).unwrap_or(1);
                    self.tables.occupy(*table_number, order_id, customers).is_ok()
                }
            };
            if fixed {
                report.repaired += 1;
            } else {
                tracing::warn!(issue = ?issue, "Drift could not be repaired");
            }
        }

        if report.repaired > 0 {
            tracing::info!(repaired = report.repaired, "Order/table drift repaired");
        }
        report
    }

    fn free_table(&self, table_id: i64) -> bool {
        self.tables
            .apply(
                table_id,
                DiningTableUpdate {
                    status: Some(TableStatus::Available),
                    customers: Some(0),
                    ..Default::default()
                },
                Some(None),
            )
            .is_ok()
    }
}

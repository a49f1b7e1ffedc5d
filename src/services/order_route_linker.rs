//! Enlace entre paradas del solver y pedidos
//!
//! Resuelve cada id devuelto por el solver contra los pedidos enviados en la
//! misma ejecución. Ids inválidos, desconocidos o repetidos se saltan de uno en
//! uno; ante duplicados gana la primera aparición.

use std::collections::HashSet;
use uuid::Uuid;

use crate::dto::solver_dto::SolverStop;
use crate::models::DeliveryOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MalformedId,
    UnknownOrder,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStop {
    pub raw_id: String,
    pub reason: SkipReason,
}

/// Resultado del enlace: pedidos en orden de visita y paradas descartadas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedStops {
    pub order_ids: Vec<Uuid>,
    pub skipped: Vec<SkippedStop>,
}

impl LinkedStops {
    pub fn is_empty(&self) -> bool {
        self.order_ids.is_empty()
    }
}

pub fn link_stops(stops: &[SolverStop], orders: &[DeliveryOrder]) -> LinkedStops {
    let known: HashSet<Uuid> = orders.iter().map(DeliveryOrder::id).collect();
    let mut seen = HashSet::with_capacity(stops.len());
    let mut linked = LinkedStops::default();

    for stop in stops {
        let reason = match Uuid::parse_str(stop.id.trim()) {
            Err(_) => SkipReason::MalformedId,
            Ok(id) if !known.contains(&id) => SkipReason::UnknownOrder,
            Ok(id) if !seen.insert(id) => SkipReason::Duplicate,
            Ok(id) => {
                linked.order_ids.push(id);
                continue;
            }
        };

        log::warn!("⚠️ Saltando parada '{}' del solver: {:?}", stop.id, reason);
        linked.skipped.push(SkippedStop {
            raw_id: stop.id.clone(),
            reason,
        });
    }

    linked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrganizationId;

    fn orders(n: usize) -> Vec<DeliveryOrder> {
        let org = OrganizationId::new(Uuid::new_v4());
        (0..n).map(|_| DeliveryOrder::new(org, 48.85, 2.35, 3, 5)).collect()
    }

    #[test]
    fn test_links_in_solver_order() {
        let orders = orders(3);
        let stops = vec![
            SolverStop::new(orders[2].id().to_string()),
            SolverStop::new(orders[0].id().to_string()),
        ];

        let linked = link_stops(&stops, &orders);

        assert_eq!(linked.order_ids, vec![orders[2].id(), orders[0].id()]);
        assert!(linked.skipped.is_empty());
    }

    #[test]
    fn test_skips_malformed_and_unknown_ids() {
        let orders = orders(1);
        let stranger = Uuid::new_v4().to_string();
        let stops = vec![
            SolverStop::new("not-a-uuid"),
            SolverStop::new(stranger.clone()),
            SolverStop::new(orders[0].id().to_string()),
        ];

        let linked = link_stops(&stops, &orders);

        assert_eq!(linked.order_ids, vec![orders[0].id()]);
        assert_eq!(
            linked.skipped,
            vec![
                SkippedStop { raw_id: "not-a-uuid".to_string(), reason: SkipReason::MalformedId },
                SkippedStop { raw_id: stranger, reason: SkipReason::UnknownOrder },
            ]
        );
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let orders = orders(2);
        let a = orders[0].id().to_string();
        let b = orders[1].id().to_string();
        let stops = vec![SolverStop::new(a.clone()), SolverStop::new(b), SolverStop::new(a.to_uppercase())];

        let linked = link_stops(&stops, &orders);

        assert_eq!(linked.order_ids, vec![orders[0].id(), orders[1].id()]);
        assert_eq!(linked.skipped.len(), 1);
        assert_eq!(linked.skipped[0].reason, SkipReason::Duplicate);
    }

    #[test]
    fn test_nothing_resolvable_is_empty() {
        let linked = link_stops(&[SolverStop::new("")], &orders(2));
        assert!(linked.is_empty());
    }
}

//! Service tests against the in-memory store and scripted feeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use enerbudget_shared::AppError;
use enerbudget_shared::types::{BudgetId, EnergyTypeId, MeterId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::BudgetingService;
use crate::budget::{BudgetDraft, BudgetError, BudgetStatus, EngineConfig, MeterWeightInput, WeightSource};
use crate::feed::{ActualCost, BillingFeed, DailyConsumption, FeedError, FeedPolicy, PriceFeed};
use crate::store::{BudgetStore, InMemoryBudgetStore};

const ELECTRICITY: EnergyTypeId = EnergyTypeId(1);

#[derive(Default)]
struct StaticPrices {
    prices: HashMap<MeterId, Decimal>,
    daily_kwh: HashMap<MeterId, Decimal>,
    /// Caps the number of recorded days per meter; absent means every day.
    recorded_days: HashMap<MeterId, usize>,
}

impl PriceFeed for StaticPrices {
    async fn unit_price(&self, meter_id: MeterId, _on: NaiveDate) -> Result<Option<Decimal>, FeedError> {
        Ok(self.prices.get(&meter_id).copied())
    }

    async fn historical_consumption(
        &self,
        meter_id: MeterId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyConsumption>, FeedError> {
        let Some(kwh) = self.daily_kwh.get(&meter_id) else {
            return Ok(vec![]);
        };
        let recorded = self.recorded_days.get(&meter_id).copied().unwrap_or(usize::MAX);
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .take(recorded)
            .map(|date| DailyConsumption {
                meter_id,
                date,
                kwh: *kwh,
            })
            .collect())
    }
}

struct ScriptedBilling {
    actuals: Vec<ActualCost>,
    online: AtomicBool,
}

impl ScriptedBilling {
    fn new(actuals: Vec<ActualCost>, online: bool) -> Self {
        Self {
            actuals,
            online: AtomicBool::new(online),
        }
    }
}

impl BillingFeed for ScriptedBilling {
    async fn actual_costs(
        &self,
        meter_ids: &[MeterId],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActualCost>, FeedError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(FeedError::Unavailable("billing offline".to_string()));
        }
        Ok(self
            .actuals
            .iter()
            .filter(|a| meter_ids.contains(&a.meter_id) && a.date >= from && a.date <= to)
            .cloned()
            .collect())
    }
}

type TestService = BudgetingService<InMemoryBudgetStore, StaticPrices, ScriptedBilling>;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fast_policy() -> FeedPolicy {
    FeedPolicy {
        timeout: Duration::from_millis(50),
        max_attempts: 3,
        backoff_base: Duration::from_millis(1),
        stale_ttl: Duration::from_secs(60),
    }
}

fn store_with_meters() -> Arc<InMemoryBudgetStore> {
    let store = InMemoryBudgetStore::new();
    store
        .register_meters(ELECTRICITY, [MeterId(1), MeterId(2)])
        .unwrap();
    Arc::new(store)
}

fn service_with(
    store: Arc<InMemoryBudgetStore>,
    prices: StaticPrices,
    billing: ScriptedBilling,
) -> TestService {
    BudgetingService::new(store, prices, billing, EngineConfig::default(), fast_policy())
}

fn service() -> TestService {
    service_with(
        store_with_meters(),
        StaticPrices::default(),
        ScriptedBilling::new(vec![], true),
    )
}

fn draft(total: Decimal, start: NaiveDate, end: NaiveDate) -> BudgetDraft {
    BudgetDraft {
        parent_budget_id: None,
        energy_type_id: ELECTRICITY,
        name: None,
        total_budget: total,
        period_start: start,
        period_end: end,
        efficiency_tag: None,
        allocations: None,
    }
}

fn child(parent: BudgetId, total: Decimal, start: NaiveDate, end: NaiveDate) -> BudgetDraft {
    BudgetDraft {
        parent_budget_id: Some(parent),
        ..draft(total, start, end)
    }
}

fn weights(pairs: &[(i64, Decimal)]) -> Option<Vec<MeterWeightInput>> {
    Some(
        pairs
            .iter()
            .map(|(id, w)| MeterWeightInput {
                meter_id: MeterId(*id),
                weight: *w,
            })
            .collect(),
    )
}

async fn year_parent(service: &TestService, total: Decimal) -> BudgetId {
    service
        .commit(&draft(total, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_preview_quarter_example_with_prices() {
    let prices = StaticPrices {
        prices: HashMap::from([(MeterId(1), dec!(1444.70))]),
        ..StaticPrices::default()
    };
    let service = service_with(store_with_meters(), prices, ScriptedBilling::new(vec![], true));
    let mut input = draft(dec!(9000000), date(2024, 1, 1), date(2024, 3, 31));
    input.allocations = weights(&[(1, dec!(0.6)), (2, dec!(0.4))]);

    let preview = service.preview(&input).await.unwrap();

    let meters = &preview.meter_allocation_preview;
    assert_eq!(meters[0].allocated_budget, dec!(5400000));
    assert_eq!(meters[1].allocated_budget, dec!(3600000));
    assert_eq!(meters[0].unit_price, Some(dec!(1444.70)));
    assert!(meters[1].estimated_daily_kwh.is_none());
    assert_eq!(
        preview
            .monthly_allocations
            .iter()
            .map(|m| m.allocated_budget)
            .sum::<Decimal>(),
        dec!(9000000)
    );
    // Preview writes nothing.
    assert!(
        service
            .store()
            .list_in_range(date(2024, 1, 1), date(2024, 12, 31))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_preview_derives_weights_from_history() {
    let prices = StaticPrices {
        daily_kwh: HashMap::from([(MeterId(1), dec!(30)), (MeterId(2), dec!(10))]),
        ..StaticPrices::default()
    };
    let service = service_with(store_with_meters(), prices, ScriptedBilling::new(vec![], true));

    let preview = service
        .preview(&draft(dec!(1000), date(2024, 4, 1), date(2024, 4, 30)))
        .await
        .unwrap();

    let meters = &preview.meter_allocation_preview;
    assert_eq!(meters[0].weight, dec!(0.75));
    assert_eq!(meters[0].weight_source, WeightSource::Historical);
    assert_eq!(meters[0].allocated_budget, dec!(750));
    assert_eq!(meters[1].allocated_budget, dec!(250));
}

#[tokio::test]
async fn test_sparse_history_is_averaged_over_the_whole_window() {
    // Meter 1 reports 90 kWh on 10 of the 90 lookback days, meter 2 reports
    // 10 kWh every day: both average 10 kWh per day.
    let prices = StaticPrices {
        daily_kwh: HashMap::from([(MeterId(1), dec!(90)), (MeterId(2), dec!(10))]),
        recorded_days: HashMap::from([(MeterId(1), 10)]),
        ..StaticPrices::default()
    };
    let service = service_with(store_with_meters(), prices, ScriptedBilling::new(vec![], true));

    let preview = service
        .preview(&draft(dec!(1000), date(2024, 4, 1), date(2024, 4, 30)))
        .await
        .unwrap();

    let meters = &preview.meter_allocation_preview;
    assert_eq!(meters[0].weight, dec!(0.5));
    assert_eq!(meters[0].allocated_budget, dec!(500));
    assert_eq!(meters[1].allocated_budget, dec!(500));
}

#[tokio::test]
async fn test_preview_rejects_totals_beyond_the_ceiling() {
    let service = service();

    let err = service
        .preview(&draft(
            dec!(70000000000000000000000000000),
            date(2024, 1, 1),
            date(2024, 3, 31),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, BudgetError::BudgetTooLarge { .. }));
    assert_eq!(AppError::from(err).status_code(), 400);

    let mut heavy_weights = draft(dec!(1000), date(2024, 1, 1), date(2024, 3, 31));
    heavy_weights.allocations = weights(&[(1, Decimal::MAX), (2, Decimal::MAX)]);
    assert!(matches!(
        service.preview(&heavy_weights).await,
        Err(BudgetError::WeightMismatch(_))
    ));
}

#[tokio::test]
async fn test_commit_persists_budget_weights_and_months() {
    let service = service();
    let mut input = draft(dec!(9000000), date(2024, 1, 1), date(2024, 3, 31));
    input.allocations = weights(&[(1, dec!(3)), (2, dec!(2))]);
    input.name = Some("Q1 electricity".to_string());

    let id = service.commit(&input).await.unwrap();

    let store = service.store();
    let budget = store.find_budget(id).await.unwrap().unwrap();
    assert_eq!(budget.name, "Q1 electricity");
    assert!(budget.is_active);

    let rows = store.meter_allocations(id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].weight, dec!(0.6));

    let months = store.monthly_allocations(id).await.unwrap();
    assert_eq!(months.len(), 3);
    assert_eq!(months[1].allocated_budget, dec!(2868131.86));
}

#[tokio::test]
async fn test_child_over_remaining_is_a_conflict() {
    let service = service();
    let parent = year_parent(&service, dec!(12000000)).await;
    service
        .commit(&child(parent, dec!(5000000), date(2024, 1, 1), date(2024, 5, 31)))
        .await
        .unwrap();

    let err = service
        .commit(&child(parent, dec!(7000000.01), date(2024, 6, 1), date(2024, 12, 31)))
        .await
        .unwrap_err();

    assert!(matches!(err, BudgetError::BudgetExceeded { .. }));
    assert_eq!(AppError::from(err).status_code(), 409);
}

#[tokio::test]
async fn test_unknown_parent_is_not_found() {
    let service = service();

    let err = service
        .preview(&child(BudgetId::new(), dec!(1), date(2024, 1, 1), date(2024, 1, 31)))
        .await
        .unwrap_err();

    assert!(matches!(err, BudgetError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_cannot_overdraw_parent() {
    let service = Arc::new(service());
    let parent = year_parent(&service, dec!(1000)).await;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .commit(&child(parent, dec!(600), date(2024, 2, 1), date(2024, 2, 29)))
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => {
                assert_eq!(AppError::from(e).status_code(), 409);
                conflicts += 1;
            }
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(service.store().list_children(parent).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_prepare_next_period_rolls_over_unspent_funds() {
    let service = service();
    let parent = year_parent(&service, dec!(12000000)).await;
    service
        .commit(&child(parent, dec!(3000000), date(2024, 1, 1), date(2024, 3, 31)))
        .await
        .unwrap();
    service
        .commit(&child(parent, dec!(2000000), date(2024, 4, 1), date(2024, 5, 31)))
        .await
        .unwrap();

    let proposal = service
        .prepare_next_period(parent, date(2024, 6, 1))
        .await
        .unwrap();

    assert_eq!(proposal.total_allocated_to_children, dec!(5000000));
    assert_eq!(proposal.available_budget_for_next_period, dec!(7000000));
    assert_eq!(proposal.prepare_next_period_budget, dec!(1000000));

    assert!(matches!(
        service.prepare_next_period(BudgetId::new(), date(2024, 6, 1)).await,
        Err(BudgetError::NotFound(_))
    ));
}

fn january_actuals() -> Vec<ActualCost> {
    vec![
        ActualCost {
            meter_id: MeterId(1),
            date: date(2024, 1, 10),
            cost: dec!(2000000),
            consumption_kwh: dec!(1384.37),
        },
        ActualCost {
            meter_id: MeterId(2),
            date: date(2024, 1, 11),
            cost: dec!(500000),
            consumption_kwh: dec!(346.09),
        },
    ]
}

#[tokio::test]
async fn test_recompute_persists_and_is_idempotent() {
    let service = service_with(
        store_with_meters(),
        StaticPrices::default(),
        ScriptedBilling::new(january_actuals(), true),
    );
    let mut input = draft(dec!(9000000), date(2024, 1, 1), date(2024, 3, 31));
    input.allocations = weights(&[(1, dec!(0.6)), (2, dec!(0.4))]);
    let id = service.commit(&input).await.unwrap();

    let first = service.recompute(id).await.unwrap();
    let second = service.recompute(id).await.unwrap();

    assert!(!first.stale);
    assert_eq!(first.months[0].realization_cost, dec!(2500000));
    assert_eq!(first.months[0].status, BudgetStatus::Warning);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    let persisted = service.store().monthly_allocations(id).await.unwrap();
    assert_eq!(persisted[0].realization_cost, dec!(2500000));
    assert_eq!(persisted[0].allocated_budget, dec!(3065934.06));
}

#[tokio::test]
async fn test_recompute_degrades_when_billing_is_down() {
    let store = store_with_meters();
    let online = service_with(
        Arc::clone(&store),
        StaticPrices::default(),
        ScriptedBilling::new(january_actuals(), true),
    );
    let mut input = draft(dec!(9000000), date(2024, 1, 1), date(2024, 3, 31));
    input.allocations = weights(&[(1, dec!(0.6)), (2, dec!(0.4))]);
    let id = online.commit(&input).await.unwrap();
    let fresh = online.recompute(id).await.unwrap();

    // Same service, feed goes down: cached actuals are served as stale.
    online.billing.inner().online.store(false, Ordering::SeqCst);
    let stale = online.recompute(id).await.unwrap();
    assert!(stale.stale);
    assert_eq!(stale.total_realization, fresh.total_realization);

    // New service with no cache: persisted figures are served as stale.
    let offline = service_with(
        store,
        StaticPrices::default(),
        ScriptedBilling::new(vec![], false),
    );
    let persisted = offline.recompute(id).await.unwrap();
    assert!(persisted.stale);
    assert!(persisted.meters.is_empty());
    assert_eq!(persisted.total_realization, dec!(2500000));
}

#[tokio::test]
async fn test_reparent_rejects_cycles() {
    let service = service();
    let a = year_parent(&service, dec!(1000)).await;
    let b = service
        .commit(&child(a, dec!(500), date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    let err = service.reparent(a, Some(b)).await.unwrap_err();
    assert!(matches!(err, BudgetError::HierarchyCycle { .. }));
    assert!(matches!(AppError::from(err), AppError::Integrity(_)));

    let self_parent = service.reparent(a, Some(a)).await.unwrap_err();
    assert!(matches!(self_parent, BudgetError::HierarchyCycle { .. }));
}

/// Root plus `depth` nested full-year children; returns the chain root first.
async fn nested_chain(service: &TestService, depth: usize) -> Vec<BudgetId> {
    let mut chain = vec![year_parent(service, dec!(1000)).await];
    for _ in 0..depth {
        let parent = *chain.last().unwrap();
        let id = service
            .commit(&child(parent, dec!(1000), date(2024, 1, 1), date(2024, 12, 31)))
            .await
            .unwrap();
        chain.push(id);
    }
    chain
}

#[tokio::test]
async fn test_reparent_walks_deep_chains_to_the_root() {
    let service = service();
    let chain = nested_chain(&service, 70).await;
    let (root, leaf) = (chain[0], chain[70]);

    let err = service.reparent(root, Some(leaf)).await.unwrap_err();
    assert!(matches!(err, BudgetError::HierarchyCycle { .. }));
    let stored = service.store().find_budget(root).await.unwrap().unwrap();
    assert!(stored.parent_budget_id.is_none());

    // A deep chain is not a cycle for an unrelated budget.
    let outsider = year_parent(&service, dec!(500)).await;
    service.reparent(outsider, Some(leaf)).await.unwrap();
    let moved = service.store().find_budget(outsider).await.unwrap().unwrap();
    assert_eq!(moved.parent_budget_id, Some(leaf));
}

#[tokio::test]
async fn test_reparent_checks_funds_and_can_detach() {
    let service = service();
    let small = year_parent(&service, dec!(100)).await;
    let big = year_parent(&service, dec!(1000)).await;
    let budget = service
        .commit(&child(big, dec!(500), date(2024, 2, 1), date(2024, 2, 29)))
        .await
        .unwrap();

    assert!(matches!(
        service.reparent(budget, Some(small)).await,
        Err(BudgetError::BudgetExceeded { .. })
    ));

    service.reparent(budget, None).await.unwrap();
    let moved = service.store().find_budget(budget).await.unwrap().unwrap();
    assert!(moved.parent_budget_id.is_none());
    assert!(service.store().list_children(big).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deactivate_requires_no_active_children() {
    let service = service();
    let parent = year_parent(&service, dec!(1000)).await;
    let kid = service
        .commit(&child(parent, dec!(400), date(2024, 1, 1), date(2024, 1, 31)))
        .await
        .unwrap();

    assert!(matches!(
        service.deactivate(parent).await,
        Err(BudgetError::HasActiveChildren(_))
    ));

    service.deactivate(kid).await.unwrap();
    service.deactivate(parent).await.unwrap();

    assert!(matches!(
        service.deactivate(parent).await,
        Err(BudgetError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deactivate_racing_child_commit_never_orphans_the_child() {
    let service = Arc::new(service());

    for _ in 0..20 {
        let parent = year_parent(&service, dec!(1000)).await;

        let deactivate = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.deactivate(parent).await })
        };
        let commit = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .commit(&child(parent, dec!(100), date(2024, 3, 1), date(2024, 3, 31)))
                    .await
            })
        };

        let deactivated = deactivate.await.unwrap();
        let committed = commit.await.unwrap();

        match (&deactivated, &committed) {
            (Ok(()), Err(BudgetError::NotFound(_)))
            | (Err(BudgetError::HasActiveChildren(_)), Ok(_)) => {}
            other => panic!("inconsistent outcome: {other:?}"),
        }

        let parent_row = service.store().find_budget(parent).await.unwrap().unwrap();
        let children = service.store().list_children(parent).await.unwrap();
        assert!(parent_row.is_active || children.is_empty());
    }
}

#[tokio::test]
async fn test_summary_prorates_budgets_across_years() {
    // 365 days from July 2024, 10 per day.
    let service = service();
    service
        .commit(&draft(dec!(3650), date(2024, 7, 1), date(2025, 6, 30)))
        .await
        .unwrap();

    let first = service.summary(2024, date(2024, 12, 31)).await.unwrap();
    let second = service.summary(2025, date(2025, 12, 31)).await.unwrap();

    assert_eq!(first[0].total_budget, dec!(1840));
    assert_eq!(first[0].remaining_budget, dec!(1840));
    assert_eq!(second[0].total_budget, dec!(1810));
    assert_eq!(first[0].total_budget + second[0].total_budget, dec!(3650));
}

#[tokio::test]
async fn test_summary_per_energy_type() {
    let store = store_with_meters();
    store.register_meters(EnergyTypeId(2), [MeterId(10)]).unwrap();
    let service = service_with(
        store,
        StaticPrices::default(),
        ScriptedBilling::new(january_actuals(), true),
    );
    let electricity = year_parent(&service, dec!(12000000)).await;
    let mut water = draft(dec!(1200), date(2024, 1, 1), date(2024, 12, 31));
    water.energy_type_id = EnergyTypeId(2);
    service.commit(&water).await.unwrap();
    service.recompute(electricity).await.unwrap();

    let summary = service.summary(2024, date(2024, 2, 15)).await.unwrap();

    assert_eq!(summary.len(), 2);
    let power = &summary[0];
    assert_eq!(power.energy_type_id, ELECTRICITY);
    assert_eq!(power.budget_count, 1);
    assert_eq!(power.total_budget, dec!(12000000));
    // January and February allocations of a 366-day year.
    assert_eq!(power.allocated_to_date, dec!(1967213.11));
    assert_eq!(power.realization_cost, dec!(2500000));
    assert_eq!(power.remaining_budget, dec!(9500000));
    assert_eq!(power.status, BudgetStatus::Danger);

    assert_eq!(summary[1].energy_type_id, EnergyTypeId(2));
    assert_eq!(summary[1].realization_cost, Decimal::ZERO);
    assert_eq!(summary[1].status, BudgetStatus::Safe);

    assert!(matches!(
        service.summary(i32::MAX, date(2024, 1, 1)).await,
        Err(BudgetError::InvalidYear(_))
    ));
}

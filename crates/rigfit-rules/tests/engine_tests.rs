use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rigfit_core::{
    CategorySlug, CompatibilityRule, Component, ComponentId, DataType, RuleId, RuleType, SpecificationTemplate,
    TemplateId,
};
use rigfit_rules::{EngineError, EngineOptions, RuleEngine, TimeoutPolicy, MISSING_SPEC_REASON};
use rigfit_storage::{CatalogStats, CatalogStore, CatalogWriter, InMemoryCatalog, StoreError};

fn template(id: &str, category: &str, name: &str, data_type: DataType) -> SpecificationTemplate {
    SpecificationTemplate {
        id: TemplateId::from_str(id),
        category: CategorySlug::new(category),
        name: name.into(),
        data_type,
        enum_values: vec![],
        min_value: None,
        max_value: None,
        is_compatibility_key: true,
    }
}

fn rule(id: &str, rule_type: RuleType, p: &SpecificationTemplate, s: &SpecificationTemplate) -> CompatibilityRule {
    CompatibilityRule {
        id: RuleId::from_str(id),
        primary_category: p.category.clone(),
        secondary_category: s.category.clone(),
        primary_template: p.id.clone(),
        secondary_template: s.id.clone(),
        rule_type,
        compatible_values: vec![],
        min_value: None,
        max_value: None,
    }
}

fn id(s: &str) -> ComponentId {
    ComponentId::from_str(s)
}

/// cpu/motherboard socket match, motherboard/ram allow-list, gpu/psu wattage range.
async fn catalog() -> Arc<InMemoryCatalog> {
    let store = InMemoryCatalog::new();
    let cpu_socket = template("t-cpu-socket", "cpu", "socket", DataType::Socket);
    let mb_socket = template("t-mb-socket", "motherboard", "socket", DataType::Socket);
    let mb_mem = template("t-mb-mem", "motherboard", "memory_type", DataType::MemoryType);
    let ram_type = template("t-ram-type", "ram", "type", DataType::MemoryType);
    let gpu_power = template("t-gpu-power", "gpu", "power_consumption", DataType::Number);
    let psu_watt = template("t-psu-watt", "psu", "wattage", DataType::Number);
    for t in [&cpu_socket, &mb_socket, &mb_mem, &ram_type, &gpu_power, &psu_watt] {
        store.upsert_template(t.clone()).await.unwrap();
    }

    store.upsert_rule(rule("socket", RuleType::ExactMatch, &cpu_socket, &mb_socket)).await.unwrap();
    let mut memory = rule("memory", RuleType::CompatibleValues, &mb_mem, &ram_type);
    memory.compatible_values = vec!["DDR5".into()];
    store.upsert_rule(memory).await.unwrap();
    let mut watts = rule("watts", RuleType::RangeCheck, &gpu_power, &psu_watt);
    watts.min_value = Some(550.0);
    store.upsert_rule(watts).await.unwrap();

    let parts = vec![
        Component::new(id("cpu-am5"), "cpu".into()).with_templated_spec(&cpu_socket, "AM5"),
        Component::new(id("cpu-lga"), "cpu".into()).with_templated_spec(&cpu_socket, "LGA1700"),
        Component::new(id("mb-am5"), "motherboard".into())
            .with_templated_spec(&mb_socket, "AM5")
            .with_templated_spec(&mb_mem, "DDR5"),
        Component::new(id("mb-bare"), "motherboard".into()),
        Component::new(id("ram-ddr5"), "ram".into()).with_templated_spec(&ram_type, "DDR5"),
        Component::new(id("ram-ddr4"), "ram".into()).with_templated_spec(&ram_type, "DDR4"),
        Component::new(id("gpu"), "gpu".into()).with_templated_spec(&gpu_power, "285"),
        Component::new(id("psu-750"), "psu".into()).with_templated_spec(&psu_watt, "750"),
    ];
    for p in parts {
        store.upsert_component(p).await.unwrap();
    }
    Arc::new(store)
}

async fn engine() -> RuleEngine<InMemoryCatalog> {
    RuleEngine::new(catalog().await, EngineOptions::default())
}

/// Delegating store that sleeps before rule fetches and tracks how many run at once.
/// With `slow_products` set, product listings sleep too.
struct SlowCatalog {
    inner: Arc<InMemoryCatalog>,
    delay: Duration,
    fail_rules: bool,
    slow_products: bool,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowCatalog {
    fn new(inner: Arc<InMemoryCatalog>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            fail_rules: false,
            slow_products: false,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CatalogStore for SlowCatalog {
    async fn fetch_component(&self, id: &ComponentId) -> Result<Option<Component>, StoreError> {
        self.inner.fetch_component(id).await
    }

    async fn fetch_components(&self, ids: &[ComponentId]) -> Result<Vec<Component>, StoreError> {
        self.inner.fetch_components(ids).await
    }

    async fn fetch_products_by_category(&self, category: &CategorySlug) -> Result<Vec<Component>, StoreError> {
        if self.slow_products {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.fetch_products_by_category(category).await
    }

    async fn fetch_rules_between(
        &self,
        a: &CategorySlug,
        b: &CategorySlug,
    ) -> Result<Vec<CompatibilityRule>, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_rules {
            return Err(StoreError::backend("connection reset"));
        }
        self.inner.fetch_rules_between(a, b).await
    }

    async fn fetch_templates(&self, category: Option<&CategorySlug>) -> Result<Vec<SpecificationTemplate>, StoreError> {
        self.inner.fetch_templates(category).await
    }

    async fn stats(&self) -> Result<CatalogStats, StoreError> {
        self.inner.stats().await
    }
}

#[tokio::test]
async fn pair_check_reports_first_failure() {
    let engine = engine().await;
    let ok = engine.check_component_compatibility(&id("mb-am5"), &id("cpu-am5")).await.unwrap();
    assert!(ok.is_compatible);
    assert!(ok.reason.is_none());

    let bad = engine.check_component_compatibility(&id("cpu-lga"), &id("mb-am5")).await.unwrap();
    assert!(!bad.is_compatible);
    let reason = bad.reason.unwrap();
    assert!(reason.contains("LGA1700") && reason.contains("AM5"), "{reason}");
}

#[tokio::test]
async fn pair_check_without_rules_is_compatible() {
    let engine = engine().await;
    let result = engine.check_component_compatibility(&id("cpu-lga"), &id("ram-ddr4")).await.unwrap();
    assert!(result.is_compatible);
}

#[tokio::test]
async fn missing_specification_blocks_declarative_pair() {
    let engine = engine().await;
    let result = engine.check_component_compatibility(&id("cpu-am5"), &id("mb-bare")).await.unwrap();
    assert_eq!(result.reason.as_deref(), Some(MISSING_SPEC_REASON));
}

#[tokio::test]
async fn unknown_component_is_an_error() {
    let engine = engine().await;
    let err = engine.check_component_compatibility(&id("cpu-am5"), &id("ghost")).await.unwrap_err();
    assert!(matches!(err, EngineError::ComponentNotFound(ref missing) if missing.as_str() == "ghost"));
}

#[tokio::test]
async fn compatible_components_must_fit_every_selection() {
    let engine = engine().await;
    let boards = engine
        .get_compatible_components(&[id("cpu-am5"), id("ram-ddr5")], &"motherboard".into())
        .await
        .unwrap();
    assert_eq!(boards, vec![id("mb-am5")]);

    let rams = engine.get_compatible_components(&[id("mb-am5")], &"ram".into()).await.unwrap();
    assert_eq!(rams, vec![id("ram-ddr5")]);

    let anything = engine.get_compatible_components(&[], &"cpu".into()).await.unwrap();
    assert_eq!(anything.len(), 2);
}

#[tokio::test]
async fn whole_build_lists_every_failing_pair() {
    let engine = engine().await;
    let build = [id("cpu-am5"), id("mb-am5"), id("ram-ddr4"), id("gpu")];
    let validation = engine.validate_configuration(&build).await.unwrap();
    assert!(!validation.is_compatible);
    assert_eq!(validation.incompatible_components.len(), 1);
    let pair = &validation.incompatible_components[0];
    assert_eq!((pair.component1_id.as_str(), pair.component2_id.as_str()), ("mb-am5", "ram-ddr4"));
    assert!(validation.ruleset_fingerprint.is_some());
}

#[tokio::test]
async fn trivial_builds_are_compatible() {
    let engine = engine().await;
    assert!(engine.validate_configuration(&[]).await.unwrap().is_compatible);
    assert!(engine.validate_configuration(&[id("cpu-lga")]).await.unwrap().is_compatible);
    // a component is never checked against itself
    let dup = engine.validate_configuration(&[id("cpu-lga"), id("cpu-lga")]).await.unwrap();
    assert!(dup.is_compatible);
}

#[tokio::test]
async fn repeated_validation_is_identical() {
    let engine = engine().await;
    let build = [id("cpu-lga"), id("mb-am5"), id("ram-ddr4"), id("gpu"), id("psu-750")];
    let first = engine.validate_configuration(&build).await.unwrap();
    assert_eq!(first.incompatible_components.len(), 2);
    for _ in 0..3 {
        assert_eq!(engine.validate_configuration(&build).await.unwrap(), first);
    }
}

#[tokio::test]
async fn fingerprint_changes_when_a_consulted_rule_changes() {
    let store = catalog().await;
    let engine = RuleEngine::new(Arc::clone(&store), EngineOptions::default());
    let build = [id("gpu"), id("psu-750")];
    let before = engine.validate_configuration(&build).await.unwrap();

    let gpu_power = template("t-gpu-power", "gpu", "power_consumption", DataType::Number);
    let psu_watt = template("t-psu-watt", "psu", "wattage", DataType::Number);
    let mut stricter = rule("watts", RuleType::RangeCheck, &gpu_power, &psu_watt);
    stricter.min_value = Some(800.0);
    store.upsert_rule(stricter).await.unwrap();

    let after = engine.validate_configuration(&build).await.unwrap();
    assert!(before.is_compatible);
    assert!(!after.is_compatible);
    assert_ne!(before.ruleset_fingerprint, after.ruleset_fingerprint);
}

#[tokio::test]
async fn rule_fetches_respect_concurrency_limit() {
    let slow = Arc::new(SlowCatalog::new(catalog().await, Duration::from_millis(20)));
    let options = EngineOptions { max_concurrency: 2, ..EngineOptions::default() };
    let engine = RuleEngine::new(Arc::clone(&slow), options);
    let build = [id("cpu-am5"), id("mb-am5"), id("ram-ddr5"), id("gpu"), id("psu-750")];
    let validation = engine.validate_configuration(&build).await.unwrap();
    assert!(validation.is_compatible);
    let peak = slow.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak {peak}");
}

#[tokio::test]
async fn timeouts_assume_compatible_by_default() {
    let slow = Arc::new(SlowCatalog::new(catalog().await, Duration::from_millis(300)));
    let options = EngineOptions { fetch_timeout: Duration::from_millis(20), ..EngineOptions::default() };
    let engine = RuleEngine::new(slow, options);
    let result = engine.check_component_compatibility(&id("cpu-lga"), &id("mb-am5")).await.unwrap();
    assert!(result.is_compatible);
}

#[tokio::test]
async fn timeouts_can_fail_as_retryable() {
    let slow = Arc::new(SlowCatalog::new(catalog().await, Duration::from_millis(300)));
    let options = EngineOptions {
        fetch_timeout: Duration::from_millis(20),
        on_timeout: TimeoutPolicy::Fail,
        ..EngineOptions::default()
    };
    let engine = RuleEngine::new(slow, options);
    let err = engine
        .validate_configuration(&[id("cpu-lga"), id("mb-am5")])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn store_failures_propagate() {
    let mut slow = SlowCatalog::new(catalog().await, Duration::from_millis(1));
    slow.fail_rules = true;
    let engine = RuleEngine::new(Arc::new(slow), EngineOptions::default());
    let err = engine.check_component_compatibility(&id("cpu-am5"), &id("mb-am5")).await.unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::Backend(_))));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn direct_reads_are_timed() {
    let mut slow = SlowCatalog::new(catalog().await, Duration::from_millis(300));
    slow.slow_products = true;
    let options = EngineOptions { fetch_timeout: Duration::from_millis(20), ..EngineOptions::default() };
    let engine = RuleEngine::new(Arc::new(slow), options);

    let started = std::time::Instant::now();
    let err = engine.fetch_products(&"motherboard".into()).await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_millis(250));

    let cpu = engine.fetch_component(&id("cpu-am5")).await.unwrap();
    assert_eq!(cpu.category.as_str(), "cpu");
    let err = engine.fetch_component(&id("ghost")).await.unwrap_err();
    assert!(matches!(err, EngineError::ComponentNotFound(_)));

    let found = engine.fetch_components(&[id("gpu"), id("psu-750")]).await.unwrap().unwrap();
    assert_eq!(found.len(), 2);
    assert!(engine.fetch_components(&[id("gpu"), id("ghost")]).await.is_err());
}
